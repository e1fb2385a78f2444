//! System coordinator for managing service lifecycle and dependency injection.

use std::{future::Future, sync::Arc};

use anyhow::{Context, Result, anyhow};
use log::{error, info, warn};
use tokio::signal::unix::{SignalKind, signal};

use crate::{
    app_context::AppState,
    config::ConfigManager,
    providers::{
        AppStateProvider, AsyncProvider, ButtonServiceProvider, DisplayServiceProvider,
        FanServiceProvider, ServiceProvider,
    },
    task_manager::TaskManager,
};

/// Owns the task manager and the service providers.
///
/// Services are started highest priority first: the fan loop, then the
/// button monitor, then the display. The coordinator then waits for
/// SIGINT or SIGTERM and stops every task.
pub struct SystemCoordinator {
    task_manager: TaskManager,
    shared_state: Option<Arc<AppState>>,
    service_providers: Vec<Box<dyn ServiceProvider>>,
}

impl Default for SystemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCoordinator {
    pub fn new() -> Self {
        Self {
            task_manager: TaskManager::new(),
            shared_state: None,
            service_providers: Vec::new(),
        }
    }

    /// Builds the application state on the hardware and registers the
    /// default services.
    pub async fn initialize(&mut self, config_manager: ConfigManager) -> Result<()> {
        info!("Initializing SystemCoordinator...");

        let state = AppStateProvider::new(config_manager)
            .provide()
            .await
            .context("Failed to initialize application state")?;
        self.initialize_with_state(state);

        info!("SystemCoordinator initialization completed");
        Ok(())
    }

    /// Registers the default services over an already built state.
    pub fn initialize_with_state(&mut self, state: Arc<AppState>) {
        let providers = default_providers(&state);
        self.initialize_with(state, providers);
    }

    /// Registers `providers` over `state`, in priority order.
    pub fn initialize_with(
        &mut self,
        state: Arc<AppState>,
        mut providers: Vec<Box<dyn ServiceProvider>>,
    ) {
        providers.sort_by_key(|b| std::cmp::Reverse(b.priority()));
        self.service_providers = providers;
        self.shared_state = Some(state);

        info!(
            "Registered {} service providers in priority order",
            self.service_providers.len()
        );
    }

    /// Starts all registered services in priority order.
    ///
    /// A critical service that fails to start stops whatever was already
    /// running and fails the call; other failures are logged.
    pub async fn start_all_services(&mut self) -> Result<()> {
        if self.shared_state.is_none() {
            return Err(anyhow!("System not properly initialized"));
        }

        info!(
            "Starting {} services in priority order...",
            self.service_providers.len()
        );

        for provider in &self.service_providers {
            let is_critical = provider.is_critical();

            match provider.start(&mut self.task_manager).await {
                Ok(()) => {
                    info!(
                        "Service '{}' started successfully (priority: {}, critical: {})",
                        provider.name(),
                        provider.priority(),
                        is_critical
                    );
                }
                Err(e) if is_critical => {
                    let name = provider.name();
                    if let Err(stop) = self.task_manager.shutdown_all().await {
                        warn!("Error while stopping started services: {stop:#}");
                    }
                    return Err(e)
                        .with_context(|| format!("Critical service '{name}' failed to start"));
                }
                Err(e) => {
                    warn!(
                        "Non-critical service '{}' failed to start: {:#}",
                        provider.name(),
                        e
                    );
                }
            }
        }

        info!("All critical services started successfully");
        Ok(())
    }

    /// Runs until SIGINT or SIGTERM, then shuts down.
    pub async fn run_main_loop(&mut self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Runs until `shutdown` resolves, then shuts down.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        info!("Starting main loop");

        let reason = shutdown
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("Received {reason}, initiating graceful shutdown...");

        self.shutdown().await;
        info!("Main loop terminated");
        Ok(())
    }

    /// Stops every task. Failures are logged, shutdown carries on.
    async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.task_manager.shutdown_all().await {
            error!("Error during task shutdown: {:#}", e);
        }

        info!("Shutdown complete");
    }

    /// Names of the registered services, in start order.
    pub fn registered_services(&self) -> Vec<&'static str> {
        self.service_providers.iter().map(|p| p.name()).collect()
    }

    #[cfg(test)]
    pub(crate) fn task_manager(&self) -> &TaskManager {
        &self.task_manager
    }
}

fn default_providers(state: &Arc<AppState>) -> Vec<Box<dyn ServiceProvider>> {
    vec![
        Box::new(DisplayServiceProvider::new(state.clone())),
        Box::new(ButtonServiceProvider::new(state.clone())),
        Box::new(FanServiceProvider::new(state.clone())),
    ]
}

/// Resolves with the name of the first termination signal received.
async fn shutdown_signal() -> Result<&'static str> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}
