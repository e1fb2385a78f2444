//! Fan driver: write policy, spin-up and last-speed bookkeeping on top of a
//! single-byte fan bus.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::{sync::Mutex, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    fan_policy::{MAX_SPEED, ThresholdSource},
    metrics::MetricSource,
};

/// Byte that tells the case controller that power is about to be cut.
pub const POWER_CUT_SIGNAL: u8 = 0xFF;

/// Hardware channel to the fan controller.
///
/// The controller accepts one byte per transaction: a speed percentage, or
/// [`POWER_CUT_SIGNAL`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FanBus: Send {
    async fn write_byte(&mut self, value: u8) -> Result<()>;
}

/// What this process last told the fan controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanState {
    /// Nothing written since startup.
    #[default]
    Unknown,
    Off,
    Running(u8),
}

impl FanState {
    fn from_speed(speed: u8) -> Self {
        match speed {
            0 => FanState::Off,
            s => FanState::Running(s),
        }
    }

    /// Applied speed, `None` while unknown.
    pub fn speed(self) -> Option<u8> {
        match self {
            FanState::Unknown => None,
            FanState::Off => Some(0),
            FanState::Running(s) => Some(s),
        }
    }

    /// Whether a non-zero write has to be preceded by a spin-up pulse.
    fn is_stopped(self) -> bool {
        matches!(self, FanState::Unknown | FanState::Off | FanState::Running(0))
    }
}

/// How a new speed is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Applied at once, in either direction.
    Instantaneous,
    /// Increases apply at once; reductions wait out the cooldown window.
    Damped,
}

/// Timing knobs of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverTiming {
    pub cooldown: Duration,
    pub spin_up: Duration,
}

impl Default for DriverTiming {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(30),
            spin_up: Duration::from_secs(1),
        }
    }
}

/// File mirroring the last speed written, for other processes to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeedMarker {
    path: PathBuf,
}

impl SpeedMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records `speed`. Failures are logged and otherwise ignored.
    pub async fn record(&self, speed: u8) {
        if let Err(e) = tokio::fs::write(&self.path, speed.to_string()).await {
            warn!("Failed to record fan speed in {}: {e}", self.path.display());
        }
    }

    /// Last recorded speed, `None` when missing or unreadable.
    pub async fn read(&self) -> Option<u8> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;
        let value = content.trim().parse::<f32>().ok()?;
        (value.is_finite() && value >= 0.0).then(|| value.min(f32::from(MAX_SPEED)) as u8)
    }
}

struct Inner {
    bus: Box<dyn FanBus>,
    state: FanState,
    /// Bumped on every successful write; lets a cooling-down loop notice
    /// that someone else moved the fan in the meantime.
    generation: u64,
    marker: Option<SpeedMarker>,
}

impl Inner {
    /// Records a speed the controller accepted.
    async fn mark(&mut self, speed: u8) {
        self.state = FanState::from_speed(speed);
        self.generation += 1;
        if let Some(marker) = &self.marker {
            marker.record(speed).await;
        }
    }
}

/// Shared handle to the fan.
///
/// Cloning is cheap; all clones drive the same bus. The internal lock is
/// held for one write sequence only, never across the loop's sleeps.
///
/// # Example
///
/// ```no_run
/// use argononed::fan_driver::{DriverTiming, FanDriver, FanBus};
///
/// # async fn example(bus: Box<dyn FanBus>) {
/// let fan = FanDriver::new(bus, DriverTiming::default(), None);
/// fan.set_off().await;
/// fan.set_override(60).await;
/// # }
/// ```
#[derive(Clone)]
pub struct FanDriver {
    inner: Arc<Mutex<Inner>>,
    timing: DriverTiming,
}

impl std::fmt::Debug for FanDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanDriver")
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl FanDriver {
    pub fn new(bus: Box<dyn FanBus>, timing: DriverTiming, marker: Option<SpeedMarker>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                bus,
                state: FanState::Unknown,
                generation: 0,
                marker,
            })),
            timing,
        }
    }

    pub async fn state(&self) -> FanState {
        self.inner.lock().await.state
    }

    /// Last speed successfully written, 0 while unknown.
    pub async fn current_speed(&self) -> u8 {
        self.state().await.speed().unwrap_or(0)
    }

    /// Stops the fan. A no-op when it is already known to be off.
    pub async fn set_off(&self) -> u8 {
        self.write(0, false).await
    }

    /// Forces `speed`, bypassing the threshold tables. Always written.
    pub async fn set_override(&self, speed: u8) -> u8 {
        self.write(speed, true).await
    }

    /// Applies `target` according to `mode`.
    ///
    /// In damped mode a reduction is held for the cooldown window; the caller
    /// supplies `reevaluate` to compute a fresh target once the window has
    /// passed. When no fresh target can be had, the held speed stays.
    /// Returns the speed in effect afterwards.
    pub async fn apply<F, Fut>(&self, target: u8, mode: WriteMode, reevaluate: F) -> u8
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<u8>>,
    {
        let target = target.min(MAX_SPEED);
        let (state, generation) = {
            let inner = self.inner.lock().await;
            (inner.state, inner.generation)
        };

        let applied = match (mode, state.speed()) {
            (WriteMode::Damped, Some(applied)) if target < applied => applied,
            _ => return self.write(target, false).await,
        };

        debug!(
            "Holding fan at {applied}% for {:?} before lowering to {target}%",
            self.timing.cooldown
        );
        sleep(self.timing.cooldown).await;
        let Some(fresh) = reevaluate().await else {
            info!("No fresh fan target after cooldown, holding {applied}%");
            return self.current_speed().await;
        };
        let fresh = fresh.min(MAX_SPEED);

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            info!("Fan changed during cooldown, skipping delayed update to {fresh}%");
            return inner.state.speed().unwrap_or(0);
        }
        self.write_locked(&mut inner, fresh, false).await
    }

    /// Sends the power-cut byte. The fan state becomes unknown afterwards.
    pub async fn signal_power_cut(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .bus
            .write_byte(POWER_CUT_SIGNAL)
            .await
            .context("Failed to signal power cut")?;
        inner.state = FanState::Unknown;
        inner.generation += 1;
        info!("Power cut signalled to the case controller");
        Ok(())
    }

    /// One evaluation of the periodic loop: read temperatures, evaluate the
    /// tables and apply the result in damped mode. A failed reading leaves
    /// the fan alone until the next cycle.
    pub async fn run_cycle(
        &self,
        metrics: &dyn MetricSource,
        thresholds: &dyn ThresholdSource,
    ) -> u8 {
        let Some(target) = evaluate(metrics, thresholds).await else {
            return self.current_speed().await;
        };
        self.apply(target, WriteMode::Damped, || evaluate(metrics, thresholds))
            .await
    }

    /// Temperature/fan loop: forces the fan off, then runs a damped cycle
    /// every `interval` until cancelled.
    pub async fn run_periodic(
        &self,
        metrics: Arc<dyn MetricSource>,
        thresholds: Arc<dyn ThresholdSource>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        self.set_off().await;

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Fan loop cancelled");
                    break;
                }
                speed = self.run_cycle(metrics.as_ref(), thresholds.as_ref()) => {
                    debug!("Fan cycle done at {speed}%");
                }
            }

            tokio::select! {
                () = cancel_token.cancelled() => {
                    info!("Fan loop cancelled");
                    break;
                }
                () = sleep(interval) => {}
            }
        }
        Ok(())
    }

    async fn write(&self, target: u8, force: bool) -> u8 {
        let mut inner = self.inner.lock().await;
        self.write_locked(&mut inner, target, force).await
    }

    async fn write_locked(&self, inner: &mut Inner, target: u8, force: bool) -> u8 {
        let target = target.min(MAX_SPEED);
        let previous = inner.state;

        if !force && previous.speed() == Some(target) {
            return target;
        }

        match write_sequence(inner, target, self.timing.spin_up).await {
            Ok(()) => {
                inner.mark(target).await;
                info!("Fan speed set to {target}%");
                target
            }
            Err(e) => {
                error!("Failed to set fan speed to {target}%: {e:#}");
                inner.state.speed().unwrap_or(0)
            }
        }
    }
}

/// Writes `target`, preceded by a full-speed pulse when the fan is stopped.
/// A pulse that went out is recorded even if the final write fails.
async fn write_sequence(inner: &mut Inner, target: u8, spin_up: Duration) -> Result<()> {
    if target > 0 && inner.state.is_stopped() {
        inner
            .bus
            .write_byte(MAX_SPEED)
            .await
            .context("Spin-up write failed")?;
        inner.mark(MAX_SPEED).await;
        sleep(spin_up).await;
    }
    inner.bus.write_byte(target).await
}

/// Fresh target from the current temperatures, `None` when the CPU
/// temperature or the tables cannot be read.
pub async fn evaluate(
    metrics: &dyn MetricSource,
    thresholds: &dyn ThresholdSource,
) -> Option<u8> {
    let cpu = match metrics.cpu_temperature().await {
        Ok(cpu) => cpu,
        Err(e) => {
            warn!("CPU temperature unavailable, keeping fan speed: {e:#}");
            return None;
        }
    };
    let storage = metrics.max_storage_temperature().await;

    match thresholds.fan_tables().await {
        Ok(tables) => {
            let target = tables.target(cpu, storage);
            debug!("CPU {cpu:.1}°C, storage {storage:.1}°C -> {target}%");
            Some(target)
        }
        Err(e) => {
            error!("Fan tables unavailable, keeping fan speed: {e:#}");
            None
        }
    }
}
