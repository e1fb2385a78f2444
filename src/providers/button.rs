use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    app_context::AppState,
    button::{ButtonMonitor, ButtonPin},
    drivers::GpioButton,
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Power-button monitor.
///
/// Opens the configured GPIO line unless a pin was handed in, then times
/// pulses and acts on the resulting gestures.
///
/// # Priority and Criticality
///
/// - **Priority**: 8
/// - **Critical**: Yes
pub struct ButtonServiceProvider {
    state: Arc<AppState>,
    pin: Mutex<Option<Box<dyn ButtonPin>>>,
}

impl ButtonServiceProvider {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            pin: Mutex::new(None),
        }
    }

    /// Uses `pin` instead of the GPIO line from the configuration.
    pub fn with_pin(state: Arc<AppState>, pin: Box<dyn ButtonPin>) -> Self {
        Self {
            state,
            pin: Mutex::new(Some(pin)),
        }
    }

    async fn take_pin(&self) -> Result<Box<dyn ButtonPin>> {
        if let Some(pin) = self.pin.lock().await.take() {
            return Ok(pin);
        }
        let config = self.state.config().await;
        let pin = GpioButton::open(&config.button.chip, config.button.pin).with_context(|| {
            format!(
                "Failed to initialize button on {} line {}",
                config.button.chip, config.button.pin
            )
        })?;
        Ok(Box::new(pin))
    }
}

#[async_trait]
impl ServiceProvider for ButtonServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let pin = self.take_pin().await?;
        let poll_interval = self.state.config().await.poll_interval();
        let monitor = ButtonMonitor::new(
            pin,
            self.state.gestures.clone(),
            self.state.fan.clone(),
            self.state.power.clone(),
            poll_interval,
        );

        task_manager
            .spawn_task(self.name().to_string(), move |cancel_token| {
                monitor.run(cancel_token)
            })
            .await
    }

    fn name(&self) -> &'static str {
        "ButtonService"
    }

    fn priority(&self) -> i32 {
        8
    }

    fn is_critical(&self) -> bool {
        true
    }
}
