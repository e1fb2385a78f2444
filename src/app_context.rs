//! Application state shared by the service providers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::{
    config::{Config, ConfigManager},
    drivers::I2cFanBus,
    event::{self, GestureReceiver, GestureSender},
    fan_driver::{FanDriver, SpeedMarker},
    metrics::{MetricSource, SystemMetrics},
    power::{PowerControl, SystemPower},
};

/// Shared application state containing the long-lived components.
///
/// The fan driver handle is shared between the fan loop and the button
/// monitor. The gesture channel is created here once: the button service
/// clones the sender, the display service takes the receiver.
pub struct AppState {
    /// Configuration manager for centralized config handling
    pub config_manager: Arc<ConfigManager>,
    /// Handle to the case fan
    pub fan: FanDriver,
    /// Temperatures and status readings
    pub metrics: Arc<dyn MetricSource>,
    /// Reboot and shutdown actions
    pub power: Arc<dyn PowerControl>,
    /// Writing half of the gesture channel
    pub gestures: GestureSender,
    gesture_receiver: Mutex<Option<GestureReceiver>>,
}

impl AppState {
    /// Builds the state on real hardware.
    ///
    /// Opening the fan controller is the one fatal step: without it the
    /// daemon has nothing to do.
    pub async fn new(config_manager: ConfigManager) -> Result<Self> {
        let config = config_manager.clone_config().await;

        let bus = I2cFanBus::open(config.fan.i2c_bus, config.fan.i2c_address)
            .context("Failed to initialize fan controller")?;
        let marker = SpeedMarker::new(&config.fan.speed_marker);
        let fan = FanDriver::new(Box::new(bus), config.driver_timing(), Some(marker.clone()));

        Ok(Self::with_components(
            config_manager,
            fan,
            Arc::new(SystemMetrics::new(marker)),
            Arc::new(SystemPower),
        ))
    }

    /// Assembles the state from ready-made components.
    pub fn with_components(
        config_manager: ConfigManager,
        fan: FanDriver,
        metrics: Arc<dyn MetricSource>,
        power: Arc<dyn PowerControl>,
    ) -> Self {
        let (gestures, receiver) = event::gesture_channel();
        Self {
            config_manager: Arc::new(config_manager),
            fan,
            metrics,
            power,
            gestures,
            gesture_receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Gets a read-only reference to the current configuration.
    pub async fn config(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config_manager.get().await
    }

    /// Gets the configuration manager.
    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }

    /// Hands out the reading half of the gesture channel. Only the first
    /// caller gets it.
    pub async fn take_gesture_receiver(&self) -> Option<GestureReceiver> {
        self.gesture_receiver.lock().await.take()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::{
        fan_driver::{DriverTiming, MockFanBus},
        metrics::testing::FakeMetrics,
        power::MockPowerControl,
    };
    use std::path::PathBuf;

    /// State over a silent fan bus, canned metrics and a power mock that
    /// accepts anything.
    pub fn state(config: Config) -> Arc<AppState> {
        let mut bus = MockFanBus::new();
        bus.expect_write_byte().returning(|_| Ok(()));
        let mut power = MockPowerControl::new();
        power.expect_reboot().returning(|| Ok(()));
        power.expect_shutdown().returning(|| Ok(()));

        Arc::new(AppState::with_components(
            ConfigManager::new(config, PathBuf::from("/tmp/argononed-test.yml")),
            FanDriver::new(Box::new(bus), DriverTiming::default(), None),
            Arc::new(FakeMetrics::with_temperatures(45.0, &[])),
            Arc::new(power),
        ))
    }
}
