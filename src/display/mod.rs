//! Status screens on the case OLED.
//!
//! The controller owns the panel and the [`ScreenState`]. It wakes once per
//! second, polls the gesture channel without blocking and redraws only when
//! the state machine asks for it.

pub mod format;
pub mod panel;
pub mod screens;
pub mod state;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Local;
use log::{debug, info, warn};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use crate::{event::GestureReceiver, metrics::MetricSource};

pub use format::TemperatureUnit;
pub use panel::{Align, Background, Font, Panel};
pub use state::{DisplayMode, ScreenKind, ScreenState, Step};

use screens::{BandwidthSampler, Frame, RenderContext};

/// Display options read once when the controller starts.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    pub enabled: bool,
    pub screens: Vec<ScreenKind>,
    /// Seconds per screen, 0 for manual switching only.
    pub rotation_secs: u32,
    /// Idle seconds before the panel is powered off, 0 to disable.
    pub screensaver_secs: u32,
    pub unit: TemperatureUnit,
}

pub struct DisplayController {
    panel: Box<dyn Panel>,
    metrics: Arc<dyn MetricSource>,
    gestures: GestureReceiver,
    settings: DisplaySettings,
    tick: Duration,
}

impl DisplayController {
    pub fn new(
        panel: Box<dyn Panel>,
        metrics: Arc<dyn MetricSource>,
        gestures: GestureReceiver,
        settings: DisplaySettings,
    ) -> Self {
        Self {
            panel,
            metrics,
            gestures,
            settings,
            tick: Duration::from_secs(1),
        }
    }

    /// Runs until `StopDisplay` arrives or the token is cancelled.
    pub async fn run(mut self, cancel_token: CancellationToken) -> Result<()> {
        if !self.settings.enabled {
            info!("Display disabled");
            return Ok(());
        }
        let Some(mut state) = ScreenState::new(
            self.settings.screens.clone(),
            self.settings.rotation_secs,
            self.settings.screensaver_secs,
        ) else {
            info!("No screens configured, display idle");
            return Ok(());
        };

        let mut sampler = BandwidthSampler::default();
        sampler.prime(self.metrics.as_ref()).await;
        let mut pending = !self.show(&mut state, &mut sampler).await;

        let mut ticker = interval(self.tick);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Display service cancelled");
                    self.blank();
                    return Ok(());
                }
                _instant = ticker.tick() => {}
            }

            match state.tick(self.gestures.poll()) {
                Step::Render => pending = !self.show(&mut state, &mut sampler).await,
                Step::Idle if pending && state.mode() == DisplayMode::Active => {
                    pending = !self.show(&mut state, &mut sampler).await;
                }
                Step::Idle => {}
                Step::EnterScreensaver => {
                    debug!("Entering screensaver");
                    self.panel.clear();
                    if let Err(e) = self.panel.flush().and_then(|()| self.panel.set_power(false)) {
                        warn!("Failed to power off display: {e:#}");
                    }
                }
                Step::Stop => {
                    info!("Display stopped");
                    self.blank();
                    return Ok(());
                }
            }
        }
    }

    /// Renders the current screen, skipping screens without data. Returns
    /// whether anything was drawn.
    async fn show(&mut self, state: &mut ScreenState, sampler: &mut BandwidthSampler) -> bool {
        for _ in 0..state.screen_count() {
            let kind = state.current();
            let mut ctx = RenderContext {
                metrics: self.metrics.as_ref(),
                unit: self.settings.unit,
                bandwidth: &mut *sampler,
                now: Local::now().naive_local(),
            };
            match screens::render(kind, &mut state.cursor, self.panel.as_mut(), &mut ctx).await {
                Frame::Drawn => {
                    if let Err(e) = self.panel.set_power(true).and_then(|()| self.panel.flush()) {
                        warn!("Failed to update display: {e:#}");
                    }
                    return true;
                }
                Frame::NoData => {
                    debug!("Nothing to show on {kind} screen");
                    state.advance();
                }
            }
        }
        debug!("No screen has data to show");
        false
    }

    fn blank(&mut self) {
        self.panel.clear();
        if let Err(e) = self.panel.flush() {
            warn!("Failed to clear display: {e:#}");
        }
    }
}
