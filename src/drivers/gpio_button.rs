use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use linux_embedded_hal::gpio_cdev::{Chip, EventRequestFlags, LineEventHandle, LineRequestFlags};
use log::info;
use tokio::task;

use crate::button::ButtonPin;

pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";
const CONSUMER: &str = "argononed";

/// Button line on the GPIO character device, subscribed to rising edges.
///
/// The kernel read blocks, so edge waits run on the blocking pool. The
/// handle is shared with that pool thread.
#[derive(Debug, Clone)]
pub struct GpioButton {
    events: Arc<Mutex<LineEventHandle>>,
}

impl GpioButton {
    pub fn open(chip: &str, line: u32) -> Result<Self> {
        let mut chip = Chip::new(chip).with_context(|| format!("Failed to open {chip}"))?;
        let handle = chip
            .get_line(line)
            .and_then(|l| {
                l.events(LineRequestFlags::INPUT, EventRequestFlags::RISING_EDGE, CONSUMER)
            })
            .with_context(|| format!("Failed to request GPIO line {line}"))?;
        info!("Watching button on GPIO line {line}");
        Ok(Self {
            events: Arc::new(Mutex::new(handle)),
        })
    }
}

#[async_trait]
impl ButtonPin for GpioButton {
    async fn wait_for_rising_edge(&mut self) -> Result<()> {
        let events = Arc::clone(&self.events);
        task::spawn_blocking(move || {
            let mut handle = events.lock().map_err(|_| anyhow!("GPIO handle lock poisoned"))?;
            handle.get_event().context("Failed to read GPIO event")?;
            Ok(())
        })
        .await
        .context("GPIO wait task failed")?
    }

    fn is_high(&mut self) -> Result<bool> {
        let handle = self
            .events
            .lock()
            .map_err(|_| anyhow!("GPIO handle lock poisoned"))?;
        Ok(handle.get_value().context("Failed to read GPIO level")? == 1)
    }
}
