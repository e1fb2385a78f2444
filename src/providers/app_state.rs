//! Application state provider for dependency injection.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use crate::{app_context::AppState, config::ConfigManager, providers::traits::AsyncProvider};

/// Builds the [`AppState`] on the live hardware.
///
/// Opening the fan controller happens here, so a missing I2C bus is
/// reported before any service starts.
pub struct AppStateProvider {
    config_manager: ConfigManager,
}

impl AppStateProvider {
    /// Creates a new AppStateProvider with the given configuration manager.
    pub const fn new(config_manager: ConfigManager) -> Self {
        Self { config_manager }
    }
}

#[async_trait]
impl AsyncProvider<Arc<AppState>> for AppStateProvider {
    async fn provide(&self) -> Result<Arc<AppState>> {
        let app_state = AppState::new(self.config_manager.clone())
            .await
            .with_context(|| {
                format!(
                    "Hardware setup failed (config: {})",
                    self.config_manager.path().display()
                )
            })?;
        info!("Application state ready");
        Ok(Arc::new(app_state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    #[tokio::test]
    async fn missing_fan_bus_is_fatal() {
        let mut config = Config::default();
        config.fan.i2c_bus = Some(250);
        let provider =
            AppStateProvider::new(ConfigManager::new(config, PathBuf::from("/tmp/argon.yml")));

        let err = match provider.provide().await {
            Ok(_) => panic!("fan bus 250 should not exist"),
            Err(e) => e,
        };
        let message = format!("{err:#}");
        assert!(message.contains("fan controller"));
        assert!(message.contains("/dev/i2c-250"));
    }
}
