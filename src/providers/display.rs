use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    app_context::AppState,
    display::{DisplayController, Panel},
    drivers::{OledPanel, i2c_fan::default_bus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Status screen rotation on the case OLED.
///
/// # Priority and Criticality
///
/// - **Priority**: 5
/// - **Critical**: No. A case without the OLED runs fine without it.
pub struct DisplayServiceProvider {
    state: Arc<AppState>,
    panel: Mutex<Option<Box<dyn Panel>>>,
}

impl DisplayServiceProvider {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            panel: Mutex::new(None),
        }
    }

    /// Draws on `panel` instead of opening the OLED.
    pub fn with_panel(state: Arc<AppState>, panel: Box<dyn Panel>) -> Self {
        Self {
            state,
            panel: Mutex::new(Some(panel)),
        }
    }

    async fn take_panel(&self) -> Result<Box<dyn Panel>> {
        if let Some(panel) = self.panel.lock().await.take() {
            return Ok(panel);
        }
        let config = self.state.config().await;
        let bus = config.fan.i2c_bus.unwrap_or_else(default_bus);
        let panel = OledPanel::open(bus, config.oled.i2c_address)
            .context("Failed to initialize OLED")?;
        Ok(Box::new(panel))
    }
}

#[async_trait]
impl ServiceProvider for DisplayServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        // Taken even when disabled so the button side sees a closed channel.
        let gestures = self
            .state
            .take_gesture_receiver()
            .await
            .ok_or_else(|| anyhow!("Gesture receiver already in use"))?;

        let settings = self.state.config().await.display_settings();
        if !settings.enabled {
            info!("OLED disabled in configuration, display service not started");
            return Ok(());
        }

        let panel = self.take_panel().await?;
        let metrics = self.state.metrics.clone();

        task_manager
            .spawn_task(self.name().to_string(), move |cancel_token| {
                DisplayController::new(panel, metrics, gestures, settings).run(cancel_token)
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DisplayService"
    }

    fn priority(&self) -> i32 {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        app_context::testing,
        config::Config,
        display::panel::testing::{Draw, RecordingPanel},
        event::Gesture,
    };
    use std::time::Duration;

    fn clock_only() -> Config {
        let mut config = Config::default();
        config.oled.screens = vec!["clock".into()];
        config
    }

    #[tokio::test(start_paused = true)]
    async fn draws_until_stop_display() {
        let state = testing::state(clock_only());
        let panel = RecordingPanel::default();
        let mut task_manager = TaskManager::new();

        DisplayServiceProvider::with_panel(state.clone(), Box::new(panel.clone()))
            .start(&mut task_manager)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(panel.draws().contains(&Draw::Background(crate::display::Background::Clock)));
        assert!(task_manager.is_running("DisplayService"));

        assert!(state.gestures.emit(Gesture::StopDisplay));
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!task_manager.is_running("DisplayService"));
        let draws = panel.draws();
        assert_eq!(draws[draws.len() - 2..], [Draw::Clear, Draw::Flush]);
        task_manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn disabled_oled_is_skipped() {
        let mut config = clock_only();
        config.oled.enabled = false;
        let state = testing::state(config);
        let mut task_manager = TaskManager::new();

        DisplayServiceProvider::new(state.clone())
            .start(&mut task_manager)
            .await
            .unwrap();

        assert_eq!(task_manager.active_count(), 0);
        assert!(!state.gestures.emit(Gesture::SwitchScreen));
    }

    #[tokio::test]
    async fn second_display_has_no_channel() {
        let state = testing::state(clock_only());
        let mut task_manager = TaskManager::new();
        DisplayServiceProvider::with_panel(state.clone(), Box::new(RecordingPanel::default()))
            .start(&mut task_manager)
            .await
            .unwrap();

        let err = DisplayServiceProvider::with_panel(state, Box::new(RecordingPanel::default()))
            .start(&mut task_manager)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already in use"));
        task_manager.shutdown_all().await.unwrap();
    }
}
