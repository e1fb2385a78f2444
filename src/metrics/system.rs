//! Linux implementation of [`MetricSource`] over procfs, sysfs and a few
//! standard tools.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use tokio::{fs, process::Command, time::sleep};

use super::{
    CoreUsage, DiskIo, DiskTemperature, InterfaceAddress, MemoryInfo, MetricSource, RaidArray,
    StorageUsage, parse,
};
use crate::fan_driver::SpeedMarker;

const SMARTCTL: &str = "/usr/sbin/smartctl";

/// Reads the live system.
///
/// The proc and sys roots are configurable so the file-backed readings can
/// be exercised against a scratch directory.
#[derive(Debug, Clone)]
pub struct SystemMetrics {
    proc_root: PathBuf,
    sys_root: PathBuf,
    marker: SpeedMarker,
    cpu_sample_window: Duration,
}

impl SystemMetrics {
    pub fn new(marker: SpeedMarker) -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
            marker,
            cpu_sample_window: Duration::from_secs(1),
        }
    }

    pub fn with_roots(
        mut self,
        proc_root: impl Into<PathBuf>,
        sys_root: impl Into<PathBuf>,
    ) -> Self {
        self.proc_root = proc_root.into();
        self.sys_root = sys_root.into();
        self
    }

    async fn read_proc(&self, name: &str) -> Result<String> {
        read(&self.proc_root.join(name)).await
    }

    async fn mdstat(&self) -> parse::MdStat {
        match self.read_proc("mdstat").await {
            Ok(content) => parse::mdstat(&content),
            Err(e) => {
                debug!("No software RAID: {e:#}");
                parse::MdStat::default()
            }
        }
    }
}

async fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Runs a tool and returns its stdout. A non-zero exit is not an error:
/// smartctl and mdadm use exit bits for informational states.
async fn run(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to run {program}"))?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn smart_temperature(device: &str) -> Option<f32> {
    let path = format!("/dev/{device}");
    for args in [
        vec!["-d", "sat", "-n", "standby,0", "-A", path.as_str()],
        vec!["-n", "standby,0", "-A", path.as_str()],
    ] {
        match run(SMARTCTL, &args).await {
            Ok(out) => {
                if let Some(t) = parse::smartctl_temperature(&out) {
                    return Some(t);
                }
            }
            Err(e) => debug!("smartctl on {device}: {e:#}"),
        }
    }
    None
}

#[async_trait]
impl MetricSource for SystemMetrics {
    async fn cpu_temperature(&self) -> Result<f32> {
        let path = self.sys_root.join("class/thermal/thermal_zone0/temp");
        parse::thermal_zone_celsius(&read(&path).await?)
    }

    async fn storage_temperatures(&self) -> Result<Vec<DiskTemperature>> {
        if !Path::new(SMARTCTL).exists() {
            return Ok(Vec::new());
        }
        let disks = parse::lsblk_disks(&run("lsblk", &["-dn", "-o", "NAME,TYPE"]).await?);

        let mut temperatures = Vec::new();
        for device in disks {
            if let Some(celsius) = smart_temperature(&device).await {
                temperatures.push(DiskTemperature { device, celsius });
            }
        }
        Ok(temperatures)
    }

    async fn current_fan_speed(&self) -> Option<u8> {
        self.marker.read().await
    }

    async fn cpu_usage(&self) -> Result<Vec<CoreUsage>> {
        let before = parse::proc_stat_cores(&self.read_proc("stat").await?);
        sleep(self.cpu_sample_window).await;
        let after = parse::proc_stat_cores(&self.read_proc("stat").await?);
        Ok(parse::core_usage(&before, &after))
    }

    async fn storage_usage(&self) -> Result<Vec<StorageUsage>> {
        let mdstat = self.mdstat().await;
        let arrays: Vec<String> = mdstat.arrays.iter().map(|(name, _)| name.clone()).collect();
        let root = run("mount", &[])
            .await
            .ok()
            .and_then(|out| parse::mount_root_source(&out));
        let rows = parse::df_rows(&run("df", &["-k"]).await?);

        let layout = parse::StorageLayout {
            root_source: root.as_deref(),
            raid_arrays: &arrays,
            raid_members: &mdstat.members,
        };
        Ok(parse::group_storage(&rows, &layout, |source| {
            std::fs::read_link(source)
                .ok()
                .and_then(|target| target.file_name().map(|n| n.to_string_lossy().into_owned()))
        }))
    }

    async fn disk_io(&self) -> Result<Vec<DiskIo>> {
        let mut samples = Vec::new();
        for usage in self.storage_usage().await? {
            let path = self
                .sys_root
                .join("block")
                .join(usage.block_device())
                .join("stat");
            match read(&path).await {
                Ok(content) => samples.extend(parse::disk_io(&usage.device, &content)),
                Err(e) => debug!("No I/O counters for {}: {e:#}", usage.device),
            }
        }
        Ok(samples)
    }

    async fn raid_arrays(&self) -> Result<Vec<RaidArray>> {
        let mut arrays = Vec::new();
        for (name, level) in self.mdstat().await.arrays {
            let device = format!("/dev/{name}");
            let detail = parse::mdadm_detail(&run("mdadm", &["-D", device.as_str()]).await?);
            arrays.push(RaidArray {
                name,
                level,
                detail,
            });
        }
        Ok(arrays)
    }

    async fn memory(&self) -> Result<MemoryInfo> {
        let info = parse::meminfo(&self.read_proc("meminfo").await?);
        if info.total_kb == 0 {
            bail!("MemTotal missing from meminfo");
        }
        Ok(info)
    }

    async fn ip_addresses(&self) -> Result<Vec<InterfaceAddress>> {
        Ok(parse::ip_addresses(
            &run("ip", &["-o", "-4", "addr", "show"]).await?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, SystemMetrics) {
        let dir = tempfile::tempdir().unwrap();
        let proc_root = dir.path().join("proc");
        let sys_root = dir.path().join("sys");
        std::fs::create_dir_all(&proc_root).unwrap();
        std::fs::create_dir_all(sys_root.join("class/thermal/thermal_zone0")).unwrap();

        let mut metrics = SystemMetrics::new(SpeedMarker::new(dir.path().join("fanspeed.txt")))
            .with_roots(proc_root, sys_root);
        metrics.cpu_sample_window = Duration::ZERO;
        (dir, metrics)
    }

    #[tokio::test]
    async fn cpu_temperature_from_thermal_zone() {
        let (dir, metrics) = scratch();
        std::fs::write(dir.path().join("sys/class/thermal/thermal_zone0/temp"), "51500\n").unwrap();

        assert_eq!(metrics.cpu_temperature().await.unwrap(), 51.5);
    }

    #[tokio::test]
    async fn missing_thermal_zone_is_an_error() {
        let (_dir, metrics) = scratch();
        assert!(metrics.cpu_temperature().await.is_err());
    }

    #[tokio::test]
    async fn memory_from_meminfo() {
        let (dir, metrics) = scratch();
        std::fs::write(
            dir.path().join("proc/meminfo"),
            "MemTotal: 1000 kB\nMemFree: 200 kB\nBuffers: 50 kB\nCached: 250 kB\n",
        )
        .unwrap();

        let memory = metrics.memory().await.unwrap();
        assert_eq!(memory.free_percent(), 50);
    }

    #[tokio::test]
    async fn memory_without_total_is_an_error() {
        let (dir, metrics) = scratch();
        std::fs::write(dir.path().join("proc/meminfo"), "MemFree: 200 kB\n").unwrap();
        assert!(metrics.memory().await.is_err());
    }

    #[tokio::test]
    async fn cpu_usage_from_proc_stat() {
        let (dir, metrics) = scratch();
        std::fs::write(
            dir.path().join("proc/stat"),
            "cpu0 10 0 10 80 0\ncpu1 0 0 0 100 0\n",
        )
        .unwrap();

        let usage = metrics.cpu_usage().await.unwrap();
        assert_eq!(usage.len(), 2);
        assert!(usage.iter().all(|c| c.percent == 0));
    }

    #[tokio::test]
    async fn fan_speed_comes_from_marker() {
        let (dir, metrics) = scratch();
        assert_eq!(metrics.current_fan_speed().await, None);

        std::fs::write(dir.path().join("fanspeed.txt"), "55").unwrap();
        assert_eq!(metrics.current_fan_speed().await, Some(55));
    }
}
