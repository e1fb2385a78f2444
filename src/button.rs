//! Power-button monitor.
//!
//! The case signals button presses as a high pulse on a GPIO line. The pulse
//! is timed in poll intervals and classified:
//!
//! | poll counts | gesture          |
//! |-------------|------------------|
//! | 2..=3       | reboot           |
//! | 4..=5       | shutdown         |
//! | 6..=7       | switch screen    |
//! | otherwise   | ignored          |

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    event::{Gesture, GestureSender},
    fan_driver::FanDriver,
    power::PowerControl,
};

/// GPIO line carrying the button pulse.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ButtonPin: Send + Sync {
    /// Suspends until the line goes from low to high.
    async fn wait_for_rising_edge(&mut self) -> Result<()>;

    fn is_high(&mut self) -> Result<bool>;
}

/// Maps a pulse width, in poll intervals, to a gesture.
pub fn classify(pulse_width: u32) -> Option<Gesture> {
    match pulse_width {
        2..=3 => Some(Gesture::Reboot),
        4..=5 => Some(Gesture::Shutdown),
        6..=7 => Some(Gesture::SwitchScreen),
        _ => None,
    }
}

pub struct ButtonMonitor {
    pin: Box<dyn ButtonPin>,
    gestures: GestureSender,
    fan: FanDriver,
    power: Arc<dyn PowerControl>,
    poll_interval: Duration,
}

impl ButtonMonitor {
    pub fn new(
        pin: Box<dyn ButtonPin>,
        gestures: GestureSender,
        fan: FanDriver,
        power: Arc<dyn PowerControl>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pin,
            gestures,
            fan,
            power,
            poll_interval,
        }
    }

    /// Times a pulse that has just started.
    async fn measure_pulse(&mut self) -> Result<u32> {
        let mut pulse_width = 1u32;
        sleep(self.poll_interval).await;
        while self.pin.is_high()? {
            sleep(self.poll_interval).await;
            pulse_width = pulse_width.saturating_add(1);
        }
        Ok(pulse_width)
    }

    /// Acts on a classified gesture.
    pub async fn handle(&self, gesture: Gesture) -> Result<()> {
        match gesture {
            Gesture::Reboot | Gesture::Shutdown => {
                // The display learns first; a full channel must not hold
                // up the power action.
                if !self.gestures.emit(Gesture::StopDisplay) {
                    warn!("Display not notified before {gesture:?}");
                }
                self.fan.set_off().await;
                if gesture == Gesture::Reboot {
                    info!("Reboot requested from case button");
                    self.power.reboot().await
                } else {
                    info!("Shutdown requested from case button");
                    self.power.shutdown().await
                }
            }
            Gesture::SwitchScreen => {
                self.gestures.emit(Gesture::SwitchScreen);
                Ok(())
            }
            Gesture::StopDisplay => Ok(()),
        }
    }

    async fn on_edge(&mut self) -> Result<()> {
        let pulse_width = self.measure_pulse().await?;
        debug!("Button pulse of {pulse_width} polls");
        match classify(pulse_width) {
            Some(gesture) => self.handle(gesture).await,
            None => Ok(()),
        }
    }

    /// Watches the pin until cancelled.
    pub async fn run(mut self, cancel_token: CancellationToken) -> Result<()> {
        loop {
            let edge = tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Button monitor cancelled");
                    return Ok(());
                }
                edge = self.pin.wait_for_rising_edge() => edge,
            };

            let outcome = match edge {
                Ok(()) => self.on_edge().await,
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                error!("Button monitor: {e:#}");
                // Keeps a persistently failing line from spinning.
                sleep(self.poll_interval).await;
            }
        }
    }
}
