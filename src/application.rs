//! Application entry point and builder.

use std::sync::Arc;

use crate::{app_context::AppState, config::ConfigManager, coordinator::SystemCoordinator};
use anyhow::{Result, anyhow};

/// The `service` verb: starts the fan, button and display loops and runs
/// them until the process is asked to stop.
///
/// # Example
///
/// ```no_run
/// use argononed::application::Application;
/// use argononed::config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config_manager = config::ConfigManager::load(None).await?;
/// let mut app = Application::builder()
///     .with_config_manager(config_manager)
///     .build()?;
///
/// app.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct Application {
    pub coordinator: SystemCoordinator,
    source: StateSource,
}

enum StateSource {
    /// Hardware is opened from the configuration on start.
    Config(ConfigManager),
    Ready(Arc<AppState>),
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Initializes and starts every service.
    pub async fn start(&mut self) -> Result<()> {
        match &self.source {
            StateSource::Config(config_manager) => {
                self.coordinator.initialize(config_manager.clone()).await?;
            }
            StateSource::Ready(state) => self.coordinator.initialize_with_state(state.clone()),
        }
        self.coordinator.start_all_services().await
    }

    /// Runs the daemon lifecycle: initialize, start services, wait for
    /// SIGINT/SIGTERM, shut down.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;
        self.coordinator.run_main_loop().await
    }
}

/// Builder for [`Application`].
pub struct ApplicationBuilder {
    source: Option<StateSource>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self { source: None }
    }

    /// Opens the hardware described by `config_manager` on start.
    pub fn with_config_manager(mut self, config_manager: ConfigManager) -> Self {
        self.source = Some(StateSource::Config(config_manager));
        self
    }

    /// Runs over an already assembled state.
    pub fn with_state(mut self, state: Arc<AppState>) -> Self {
        self.source = Some(StateSource::Ready(state));
        self
    }

    pub fn build(self) -> Result<Application> {
        let source = self
            .source
            .ok_or_else(|| anyhow!("Configuration manager is required"))?;

        Ok(Application {
            coordinator: SystemCoordinator::new(),
            source,
        })
    }
}
