//! System metrics consumed by the fan loop and the status screens.

pub mod parse;
pub mod system;

use anyhow::Result;
use async_trait::async_trait;
use log::warn;

pub use system::SystemMetrics;

/// Temperature reported by one physical disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskTemperature {
    pub device: String,
    pub celsius: f32,
}

/// Utilisation of one CPU core over the sampling window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreUsage {
    pub name: String,
    pub percent: u8,
}

/// Space used on one physical device, summed over its mounted partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUsage {
    pub device: String,
    pub used_kb: u64,
    pub total_kb: u64,
    /// Kernel block device behind a `/dev/mapper/` source.
    pub mapper: Option<String>,
}

impl StorageUsage {
    pub fn percent(&self) -> u8 {
        if self.total_kb == 0 {
            return 0;
        }
        (self.used_kb as f64 * 100.0 / self.total_kb as f64).round().min(100.0) as u8
    }

    /// Name of the entry under `/sys/block` carrying the I/O counters.
    pub fn block_device(&self) -> &str {
        self.mapper.as_deref().unwrap_or(&self.device)
    }
}

/// Cumulative sector counters of one disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskIo {
    pub device: String,
    pub read_sectors: u64,
    pub write_sectors: u64,
}

/// `mdadm --detail` summary of an array.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RaidDetail {
    pub state: String,
    pub level: String,
    pub size_kb: u64,
    pub used_kb: u64,
    pub devices: u32,
    pub active: u32,
    pub working: u32,
    pub failed: u32,
    pub spare: u32,
    /// Rebuild, resync or check progress, empty when idle.
    pub resync: String,
    pub members: Vec<String>,
}

/// One software RAID array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidArray {
    pub name: String,
    pub level: String,
    pub detail: RaidDetail,
}

/// Memory summary in kilobytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_kb: u64,
    /// MemFree + Buffers + Cached.
    pub free_kb: u64,
}

impl MemoryInfo {
    pub fn free_percent(&self) -> u64 {
        if self.total_kb == 0 {
            return 0;
        }
        100 * self.free_kb / self.total_kb
    }

    /// Total rounded to whole gigabytes.
    pub fn total_gb(&self) -> u64 {
        if self.total_kb == 0 {
            return 0;
        }
        (self.total_kb + 512 * 1024) >> 20
    }
}

/// IPv4 address bound to a network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub interface: String,
    pub address: String,
}

/// Source of every system reading the daemon needs.
///
/// Readings that fail return an error; callers decide whether to skip a
/// screen or keep a previous value.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// CPU temperature in °C.
    async fn cpu_temperature(&self) -> Result<f32>;

    /// Temperatures of the disks that report one.
    async fn storage_temperatures(&self) -> Result<Vec<DiskTemperature>>;

    /// Hottest disk in °C, 0 when no disk reports.
    async fn max_storage_temperature(&self) -> f32 {
        match self.storage_temperatures().await {
            Ok(disks) => disks.iter().map(|d| d.celsius).fold(0.0, f32::max),
            Err(e) => {
                warn!("Disk temperatures unavailable: {e:#}");
                0.0
            }
        }
    }

    /// Fan speed last recorded by the fan driver.
    async fn current_fan_speed(&self) -> Option<u8>;

    async fn cpu_usage(&self) -> Result<Vec<CoreUsage>>;

    async fn storage_usage(&self) -> Result<Vec<StorageUsage>>;

    async fn disk_io(&self) -> Result<Vec<DiskIo>>;

    async fn raid_arrays(&self) -> Result<Vec<RaidArray>>;

    async fn memory(&self) -> Result<MemoryInfo>;

    async fn ip_addresses(&self) -> Result<Vec<InterfaceAddress>>;
}
