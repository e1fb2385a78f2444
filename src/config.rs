//! Configuration management for the argononed daemon.
//!
//! Handles loading, parsing and validation of the YAML file that holds the
//! fan thresholds, display options and hardware wiring.

use crate::{
    display::{DisplaySettings, ScreenKind, TemperatureUnit},
    fan_driver::DriverTiming,
    fan_policy::{FanTables, ThresholdSource, ThresholdTable},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Mapping;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::RwLock;

/// Location the default configuration is written to when none exists.
pub const SYSTEM_CONFIG: &str = "/etc/argononed/config.yml";

/// Main configuration structure for the argononed daemon.
///
/// # Example
///
/// ```yaml
/// version: 1
/// general:
///   temperature_unit: C
/// oled:
///   screen_duration: 30
///   screensaver: 120
///   screens: [clock, cpu, storage, ram, temp, ip]
/// fan:
///   interval_seconds: 60
/// cpu_fan:
///   55.0: 30
///   60.0: 55
///   65.0: 100
/// hdd_fan:
///   40.0: 25
///   50.0: 50
///   60.0: 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    #[serde(default)]
    pub general: GeneralCfg,

    #[serde(default)]
    pub oled: OledCfg,

    #[serde(default)]
    pub fan: FanCfg,

    #[serde(default)]
    pub button: ButtonCfg,

    /// CPU temperature thresholds, `°C: speed %`.
    #[serde(default = "defaults::cpu_fan")]
    pub cpu_fan: Mapping,

    /// Disk temperature thresholds, `°C: speed %`.
    #[serde(default = "defaults::hdd_fan")]
    pub hdd_fan: Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneralCfg {
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    /// Logs at debug level.
    #[serde(default)]
    pub debug: bool,
}

/// Status display options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OledCfg {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Seconds each screen stays up, 0 for manual switching only.
    #[serde(default = "defaults::screen_duration")]
    pub screen_duration: u32,

    /// Idle seconds before the panel turns off, 0 to keep it on.
    #[serde(default = "defaults::screensaver")]
    pub screensaver: u32,

    /// Screen names in rotation order. A space separated string is accepted
    /// as well as a list.
    #[serde(default = "defaults::screens", deserialize_with = "screen_list")]
    pub screens: Vec<String>,

    #[serde(default = "defaults::oled_address")]
    pub i2c_address: u16,
}

impl Default for OledCfg {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            screen_duration: defaults::screen_duration(),
            screensaver: defaults::screensaver(),
            screens: defaults::screens(),
            i2c_address: defaults::oled_address(),
        }
    }
}

/// Fan controller wiring and loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanCfg {
    /// Seconds between temperature checks.
    #[serde(default = "defaults::interval_seconds")]
    pub interval_seconds: u32,

    /// Seconds a lower speed must stay wanted before it is applied.
    #[serde(default = "defaults::cooldown_seconds")]
    pub cooldown_seconds: u32,

    /// Full-speed pulse before starting a stopped fan.
    #[serde(default = "defaults::spin_up_millis")]
    pub spin_up_millis: u64,

    /// I2C bus number, board default when unset.
    #[serde(default)]
    pub i2c_bus: Option<u8>,

    #[serde(default = "defaults::fan_address")]
    pub i2c_address: u16,

    /// File mirroring the last speed written.
    #[serde(default = "defaults::speed_marker")]
    pub speed_marker: PathBuf,
}

impl Default for FanCfg {
    fn default() -> Self {
        Self {
            interval_seconds: defaults::interval_seconds(),
            cooldown_seconds: defaults::cooldown_seconds(),
            spin_up_millis: defaults::spin_up_millis(),
            i2c_bus: None,
            i2c_address: defaults::fan_address(),
            speed_marker: defaults::speed_marker(),
        }
    }
}

/// Power button wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonCfg {
    #[serde(default = "defaults::gpio_chip")]
    pub chip: String,

    /// GPIO line of the button pulse (BCM numbering).
    #[serde(default = "defaults::pin")]
    pub pin: u32,

    #[serde(default = "defaults::poll_interval_millis")]
    pub poll_interval_millis: u64,
}

impl Default for ButtonCfg {
    fn default() -> Self {
        Self {
            chip: defaults::gpio_chip(),
            pin: defaults::pin(),
            poll_interval_millis: defaults::poll_interval_millis(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            general: GeneralCfg::default(),
            oled: OledCfg::default(),
            fan: FanCfg::default(),
            button: ButtonCfg::default(),
            cpu_fan: defaults::cpu_fan(),
            hdd_fan: defaults::hdd_fan(),
        }
    }
}

fn screen_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Screens {
        List(Vec<String>),
        Words(String),
    }

    Ok(match Screens::deserialize(deserializer)? {
        Screens::List(list) => list,
        Screens::Words(words) => words
            .replace('"', "")
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    })
}

impl Config {
    /// Validates the configuration for consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fan.interval_seconds == 0 {
            anyhow::bail!("fan.interval_seconds must be greater than 0");
        }
        if self.button.poll_interval_millis == 0 {
            anyhow::bail!("button.poll_interval_millis must be greater than 0");
        }
        if self.oled.enabled && self.oled.screens.is_empty() {
            warn!("OLED enabled without screens, display will stay idle");
        }
        Ok(())
    }

    /// Threshold tables parsed from `cpu_fan` and `hdd_fan`.
    pub fn fan_tables(&self) -> FanTables {
        FanTables {
            cpu: ThresholdTable::from(&self.cpu_fan),
            storage: ThresholdTable::from(&self.hdd_fan),
        }
    }

    pub fn driver_timing(&self) -> DriverTiming {
        DriverTiming {
            cooldown: Duration::from_secs(u64::from(self.fan.cooldown_seconds)),
            spin_up: Duration::from_millis(self.fan.spin_up_millis),
        }
    }

    pub fn fan_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.fan.interval_seconds))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.button.poll_interval_millis)
    }

    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings {
            enabled: self.oled.enabled,
            screens: self
                .oled
                .screens
                .iter()
                .map(|name| ScreenKind::from_name(name))
                .collect(),
            rotation_secs: self.oled.screen_duration,
            screensaver_secs: self.oled.screensaver,
            unit: self.general.temperature_unit,
        }
    }
}

mod defaults {
    use serde_yaml::{Mapping, Value};
    use std::path::PathBuf;

    fn table(entries: &[(f64, u64)]) -> Mapping {
        entries
            .iter()
            .map(|(t, s)| (Value::from(*t), Value::from(*s)))
            .collect()
    }

    pub fn cpu_fan() -> Mapping {
        table(&[(55.0, 30), (60.0, 55), (65.0, 100)])
    }

    pub fn hdd_fan() -> Mapping {
        table(&[
            (40.0, 25),
            (44.0, 30),
            (46.0, 35),
            (48.0, 40),
            (50.0, 50),
            (52.0, 55),
            (54.0, 60),
            (60.0, 100),
        ])
    }

    pub fn enabled() -> bool {
        true
    }

    pub fn screen_duration() -> u32 {
        30
    }

    pub fn screensaver() -> u32 {
        120
    }

    pub fn screens() -> Vec<String> {
        ["clock", "cpu", "storage", "bandwidth", "raid", "ram", "temp", "ip"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn oled_address() -> u16 {
        0x3c
    }

    pub fn interval_seconds() -> u32 {
        60
    }

    pub fn cooldown_seconds() -> u32 {
        30
    }

    pub fn spin_up_millis() -> u64 {
        1000
    }

    pub fn fan_address() -> u16 {
        0x1a
    }

    pub fn speed_marker() -> PathBuf {
        PathBuf::from("/tmp/fanspeed.txt")
    }

    pub fn gpio_chip() -> String {
        "/dev/gpiochip0".to_string()
    }

    pub fn pin() -> u32 {
        4
    }

    pub fn poll_interval_millis() -> u64 {
        10
    }
}

fn locate_config() -> Option<PathBuf> {
    // 2) ENV
    if let Ok(env_path) = env::var("ARGONONED_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 3) XDG_CONFIG_HOME or $HOME/.config
    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("argononed/config.yml");
        if cfg_dir.exists() {
            return Some(cfg_dir);
        }
    }

    // 4) /etc
    let etc = Path::new(SYSTEM_CONFIG);
    if etc.exists() {
        return Some(etc.to_path_buf());
    }

    None
}

/// Configuration manager that handles both config data and file operations.
///
/// # Example
///
/// ```no_run
/// use argononed::config::ConfigManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// // Load from specific path
/// let config_manager = ConfigManager::load(Some(PathBuf::from("config.yml"))).await?;
///
/// // Load from standard locations, falling back to defaults
/// let config_manager = ConfigManager::load(None).await?;
///
/// let interval = config_manager.get().await.fan.interval_seconds;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Config>>,
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the given config and path.
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            path,
        }
    }

    /// Loads configuration from file or standard locations.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. ARGONONED_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/argononed/config.yml or ~/.config/argononed/config.yml
    /// 4. /etc/argononed/config.yml
    ///
    /// When nothing is found the defaults are used and written to
    /// [`SYSTEM_CONFIG`] if possible.
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let Some(config_path) = path.or_else(locate_config) else {
            info!("No configuration file found, using defaults");
            let manager = Self::new(Config::default(), PathBuf::from(SYSTEM_CONFIG));
            if let Err(e) = manager.save().await {
                warn!("Could not write default configuration: {e:#}");
            }
            return Ok(manager);
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path).await?;

        Ok(Self::new(config, config_path))
    }

    /// Gets a read-only reference to the current configuration.
    pub async fn get(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config.read().await
    }

    /// Returns the path to the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves the current configuration to file.
    pub async fn save(&self) -> Result<()> {
        let config = self.config.read().await;
        self.save_to_path(&config, &self.path).await
    }

    /// Saves configuration to a specific path.
    pub async fn save_to_path(&self, config: &Config, path: &Path) -> Result<()> {
        let config_yaml =
            serde_yaml::to_string(config).context("Failed to serialize configuration")?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let tmp_path = path.with_extension("yml.tmp");
        fs::write(&tmp_path, config_yaml).with_context(|| {
            format!("Failed to write temporary config to {}", tmp_path.display())
        })?;

        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move config to {}", path.display()))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Clones the current configuration.
    pub async fn clone_config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Loads configuration from a specific path (internal helper).
    async fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        if config.version != 1 {
            anyhow::bail!(
                "Unsupported config version {} in file: {}",
                config.version,
                path.display()
            );
        }

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}

#[async_trait]
impl ThresholdSource for ConfigManager {
    /// Re-reads the thresholds from disk so edits apply on the next fan
    /// cycle. A broken file keeps the last good tables.
    async fn fan_tables(&self) -> Result<FanTables> {
        match Self::load_config_from_path(&self.path).await {
            Ok(fresh) => {
                let mut config = self.config.write().await;
                config.cpu_fan = fresh.cpu_fan;
                config.hdd_fan = fresh.hdd_fan;
                Ok(config.fan_tables())
            }
            Err(e) => {
                warn!("Keeping previous fan thresholds: {e:#}");
                Ok(self.config.read().await.fan_tables())
            }
        }
    }
}
