use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use crate::{
    app_context::AppState, fan_policy::ThresholdSource, providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Temperature/fan control loop.
///
/// Every `fan.interval_seconds` the CPU and disk temperatures are mapped
/// through the threshold tables and the result is applied in damped mode.
/// The tables are re-read from the configuration file on each cycle.
///
/// # Priority and Criticality
///
/// - **Priority**: 10 (highest)
/// - **Critical**: Yes
pub struct FanServiceProvider {
    state: Arc<AppState>,
}

impl FanServiceProvider {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl ServiceProvider for FanServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let interval = state.config().await.fan_interval();
        info!("Fan loop interval {interval:?}");

        task_manager
            .spawn_task(self.name().to_string(), move |cancel_token| async move {
                let thresholds: Arc<dyn ThresholdSource> = state.config_manager.clone();
                state
                    .fan
                    .run_periodic(state.metrics.clone(), thresholds, interval, cancel_token)
                    .await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "FanService"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}
