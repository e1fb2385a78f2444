//! Parsers for the kernel files and tool outputs behind [`SystemMetrics`].
//!
//! Every function here is pure so the formats can be tested without the
//! files or binaries being present.
//!
//! [`SystemMetrics`]: super::SystemMetrics

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use super::{CoreUsage, DiskIo, InterfaceAddress, MemoryInfo, RaidDetail, StorageUsage};

/// `/sys/class/thermal/thermal_zone*/temp` holds millidegrees.
pub fn thermal_zone_celsius(content: &str) -> Result<f32> {
    let milli: i64 = content
        .trim()
        .parse()
        .with_context(|| format!("Invalid thermal zone reading {content:?}"))?;
    Ok(milli as f32 / 1000.0)
}

/// Cumulative jiffies of one CPU line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub total: u64,
    /// idle + iowait
    pub idle: u64,
}

/// Per-core counters from `/proc/stat`, without the aggregate `cpu` line.
pub fn proc_stat_cores(content: &str) -> Vec<(String, CpuTimes)> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            if !name.starts_with("cpu") || name == "cpu" {
                return None;
            }
            let values: Vec<u64> = fields.map_while(|f| f.parse().ok()).collect();
            let total: u64 = values.iter().sum();
            let idle = values.get(3).copied().unwrap_or(0) + values.get(4).copied().unwrap_or(0);
            (total > 0).then(|| (name.to_string(), CpuTimes { total, idle }))
        })
        .collect()
}

/// Usage of every core present in both samples.
pub fn core_usage(before: &[(String, CpuTimes)], after: &[(String, CpuTimes)]) -> Vec<CoreUsage> {
    after
        .iter()
        .filter_map(|(name, b)| {
            let (_, a) = before.iter().find(|(n, _)| n == name)?;
            let total = b.total.saturating_sub(a.total);
            let idle = b.idle.saturating_sub(a.idle);
            let percent = match total {
                0 => 0,
                t => (100 * t.saturating_sub(idle) / t) as u8,
            };
            Some(CoreUsage {
                name: name.clone(),
                percent,
            })
        })
        .collect()
}

/// `/proc/meminfo`; free memory counts buffers and page cache.
pub fn meminfo(content: &str) -> MemoryInfo {
    let mut info = MemoryInfo::default();
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(value) = value.parse::<u64>() else {
            continue;
        };
        match key {
            "MemTotal:" => info.total_kb = value,
            "MemFree:" | "Buffers:" | "Cached:" => info.free_kb += value,
            _ => {}
        }
    }
    info
}

/// One filesystem line of `df -k`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfRow {
    pub source: String,
    pub total_kb: u64,
    pub used_kb: u64,
}

/// Rows of `df -k` whose source is a `/dev/` node.
pub fn df_rows(content: &str) -> Vec<DfRow> {
    content
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 || !fields[0].starts_with("/dev/") || fields[0].len() < 5 {
                return None;
            }
            Some(DfRow {
                source: fields[0].to_string(),
                total_kb: fields[1].parse().ok()?,
                used_kb: fields[2].parse().ok()?,
            })
        })
        .collect()
}

/// Source mounted on `/` according to `mount`.
pub fn mount_root_source(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        (fields.len() >= 3 && fields[2] == "/").then(|| fields[0].to_string())
    })
}

/// Whole-disk name for a partition: `sda1` -> `sda`, `mmcblk0p2` -> `mmcblk0`.
pub fn parent_device(partition: &str) -> &str {
    let keep = if partition.starts_with("sd") || partition.starts_with("hd") {
        partition.len().saturating_sub(1)
    } else {
        partition.len().saturating_sub(2)
    };
    partition.get(..keep).unwrap_or(partition)
}

/// Context needed to group `df` rows per physical device.
#[derive(Debug, Default)]
pub struct StorageLayout<'a> {
    /// Device really mounted on `/` when `df` shows `/dev/root`.
    pub root_source: Option<&'a str>,
    /// Array names such as `md0`; kept as they are.
    pub raid_arrays: &'a [String],
    /// Partitions that belong to an array; dropped.
    pub raid_members: &'a [String],
}

/// Groups `df` rows per physical device, summing partitions.
///
/// `resolve_mapper` maps a `/dev/mapper/` source to its kernel block device
/// (e.g. `dm-0`); such sources are kept under their mapper name.
pub fn group_storage<F>(
    rows: &[DfRow],
    layout: &StorageLayout<'_>,
    resolve_mapper: F,
) -> Vec<StorageUsage>
where
    F: Fn(&str) -> Option<String>,
{
    let mut grouped: BTreeMap<String, StorageUsage> = BTreeMap::new();

    for row in rows {
        let mapper = row
            .source
            .starts_with("/dev/mapper/")
            .then(|| resolve_mapper(&row.source))
            .flatten();

        let source = match (row.source.as_str(), layout.root_source) {
            ("/dev/root", Some(root)) if !root.is_empty() => root,
            (source, _) => source,
        };
        let name = source.rsplit('/').next().unwrap_or(source);

        if layout.raid_members.iter().any(|m| m == name) {
            continue;
        }
        let device = if mapper.is_some() || layout.raid_arrays.iter().any(|a| a == name) {
            name
        } else {
            parent_device(name)
        };

        let entry = grouped
            .entry(device.to_string())
            .or_insert_with(|| StorageUsage {
                device: device.to_string(),
                used_kb: 0,
                total_kb: 0,
                mapper: mapper.clone(),
            });
        entry.used_kb += row.used_kb;
        entry.total_kb += row.total_kb;
    }

    grouped.into_values().collect()
}

/// Arrays listed in `/proc/mdstat`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MdStat {
    /// `(name, level)` per array.
    pub arrays: Vec<(String, String)>,
    /// Member partitions of all arrays.
    pub members: Vec<String>,
}

pub fn mdstat(content: &str) -> MdStat {
    let mut stat = MdStat::default();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 || fields[0] == "Personalities" || fields[1] != ":" {
            continue;
        }
        stat.arrays
            .push((fields[0].to_string(), fields[3].to_string()));
        stat.members.extend(
            fields[4..]
                .iter()
                .map(|m| m.split('[').next().unwrap_or(m).to_string()),
        );
    }
    stat
}

/// `mdadm -D /dev/mdX` output.
pub fn mdadm_detail(content: &str) -> RaidDetail {
    let mut detail = RaidDetail::default();

    for line in content.lines() {
        let line = line.trim();
        if let Some((key, value)) = line.split_once(" : ") {
            let value = value.trim();
            let count = || value.parse::<u32>().unwrap_or(0);
            let leading_kb = || {
                value
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0)
            };
            match key.trim().to_lowercase().as_str() {
                "raid level" => detail.level = value.to_string(),
                "array size" => detail.size_kb = leading_kb(),
                "used dev size" => detail.used_kb = leading_kb(),
                "state" => detail.state = value.to_string(),
                "total devices" => detail.devices = count(),
                "active devices" => detail.active = count(),
                "working devices" => detail.working = count(),
                "failed devices" => detail.failed = count(),
                "spare devices" => detail.spare = count(),
                "rebuild status" | "resync status" | "check status" => {
                    detail.resync = value.to_string()
                }
                _ => {}
            }
        } else {
            // Member table: "Number Major Minor RaidDevice State... /dev/sdX"
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() == 7 {
                detail.members.push(fields[6].to_string());
            }
        }
    }
    detail
}

/// `/sys/block/<dev>/stat`: sectors read (field 3) and written (field 7).
pub fn block_stat_sectors(content: &str) -> Option<(u64, u64)> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() < 11 {
        return None;
    }
    Some((fields[2].parse().ok()?, fields[6].parse().ok()?))
}

/// Wraps [`block_stat_sectors`] into a named sample.
pub fn disk_io(device: &str, content: &str) -> Option<DiskIo> {
    block_stat_sectors(content).map(|(read_sectors, write_sectors)| DiskIo {
        device: device.to_string(),
        read_sectors,
        write_sectors,
    })
}

/// SATA/IDE disks from `lsblk -dn -o NAME,TYPE`.
pub fn lsblk_disks(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let (name, kind) = (fields.next()?, fields.next()?);
            (kind == "disk" && (name.starts_with("sd") || name.starts_with("hd")))
                .then(|| name.to_string())
        })
        .collect()
}

/// Drive temperature from `smartctl -A`.
///
/// Attribute 194, then 190 (raw value column), then a `Temperature:` line
/// as printed for NVMe and SCSI devices.
pub fn smartctl_temperature(content: &str) -> Option<f32> {
    if content.contains("scsi error unsupported scsi opcode") {
        return None;
    }
    let lines: Vec<&str> = content.lines().filter(|l| !l.is_empty()).collect();

    let attribute = ["194", "190"].iter().find_map(|id| {
        let line = lines.iter().find(|l| l.starts_with(id))?;
        line.split_whitespace().nth(9)?.parse::<f32>().ok()
    });

    attribute
        .or_else(|| {
            let line = lines.iter().find(|l| l.starts_with("Temperature:"))?;
            line.split_whitespace().nth(1)?.parse::<f32>().ok()
        })
        .filter(|t| *t > 0.0)
}

/// IPv4 addresses from `ip -o -4 addr show`, skipping loopback and bridges.
pub fn ip_addresses(content: &str) -> Vec<InterfaceAddress> {
    content
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let inet = fields.iter().position(|f| *f == "inet")?;
            let interface = fields.get(1)?.trim_end_matches(':');
            let address = fields.get(inet + 1)?.split('/').next()?;
            (interface != "lo" && !interface.starts_with("br")).then(|| InterfaceAddress {
                interface: interface.to_string(),
                address: address.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn thermal_zone_in_millidegrees() {
        assert_eq!(thermal_zone_celsius("48312\n").unwrap(), 48.312);
        assert!(thermal_zone_celsius("warm").is_err());
    }

    const STAT_A: &str = "\
cpu  100 0 100 800 0 0 0 0 0 0
cpu0 50 0 50 400 0 0 0 0 0 0
cpu1 50 0 50 390 10 0 0 0 0 0
intr 12345
";

    const STAT_B: &str = "\
cpu  200 0 200 1000 0 0 0 0 0 0
cpu0 100 0 100 500 0 0 0 0 0 0
cpu1 50 0 50 490 10 0 0 0 0 0
";

    #[test]
    fn proc_stat_skips_aggregate_and_other_lines() {
        let cores = proc_stat_cores(STAT_A);
        assert_eq!(
            cores,
            vec![
                ("cpu0".to_string(), CpuTimes { total: 500, idle: 400 }),
                ("cpu1".to_string(), CpuTimes { total: 500, idle: 400 }),
            ]
        );
    }

    #[test]
    fn core_usage_from_two_samples() {
        let usage = core_usage(&proc_stat_cores(STAT_A), &proc_stat_cores(STAT_B));
        assert_eq!(
            usage,
            vec![
                CoreUsage { name: "cpu0".into(), percent: 50 },
                CoreUsage { name: "cpu1".into(), percent: 0 },
            ]
        );
    }

    #[test]
    fn core_usage_with_identical_samples_is_zero() {
        let sample = proc_stat_cores(STAT_A);
        assert!(core_usage(&sample, &sample).iter().all(|c| c.percent == 0));
    }

    #[test]
    fn meminfo_sums_free_buffers_cached() {
        let info = meminfo(
            "MemTotal:        3884040 kB\n\
             MemFree:         2000000 kB\n\
             MemAvailable:    3000000 kB\n\
             Buffers:          100000 kB\n\
             Cached:           813030 kB\n",
        );
        assert_eq!(
            info,
            MemoryInfo {
                total_kb: 3_884_040,
                free_kb: 2_913_030
            }
        );
    }

    const DF: &str = "\
Filesystem     1K-blocks    Used Available Use% Mounted on
/dev/root       30000000 9000000  19000000  33% /
devtmpfs          800000       0    800000   0% /dev
/dev/mmcblk0p1    260000   50000    210000  20% /boot
/dev/sda1      100000000 25000000 75000000  25% /mnt/data
/dev/sda2       50000000 25000000 25000000  50% /mnt/backup
/dev/md0       200000000 10000000 190000000  5% /mnt/raid
/dev/mapper/vault 1000   500        500    50% /mnt/vault
";

    #[test]
    fn df_rows_keep_only_dev_sources() {
        let rows = df_rows(DF);
        assert_eq!(rows.len(), 6);
        assert_eq!(
            rows[0],
            DfRow {
                source: "/dev/root".into(),
                total_kb: 30_000_000,
                used_kb: 9_000_000
            }
        );
    }

    #[test]
    fn parent_device_strips_partition_suffix() {
        assert_eq!(parent_device("sda1"), "sda");
        assert_eq!(parent_device("hdb3"), "hdb");
        assert_eq!(parent_device("mmcblk0p2"), "mmcblk0");
        assert_eq!(parent_device("nvme0n1p1"), "nvme0n1");
        assert_eq!(parent_device("x"), "");
    }

    #[test]
    fn group_storage_sums_partitions_per_device() {
        let rows = df_rows(DF);
        let arrays = vec!["md0".to_string()];
        let layout = StorageLayout {
            root_source: Some("/dev/mmcblk0p2"),
            raid_arrays: &arrays,
            raid_members: &[],
        };

        let grouped = group_storage(&rows, &layout, |_| Some("dm-0".to_string()));
        let summary: Vec<(&str, u64, u64, Option<&str>)> = grouped
            .iter()
            .map(|s| (s.device.as_str(), s.used_kb, s.total_kb, s.mapper.as_deref()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("md0", 10_000_000, 200_000_000, None),
                ("mmcblk0", 9_050_000, 30_260_000, None),
                ("sda", 50_000_000, 150_000_000, None),
                ("vault", 500, 1000, Some("dm-0")),
            ]
        );
    }

    #[test]
    fn group_storage_drops_raid_members() {
        let rows = vec![DfRow {
            source: "/dev/sdb1".into(),
            total_kb: 10,
            used_kb: 5,
        }];
        let members = vec!["sdb1".to_string()];
        let layout = StorageLayout {
            raid_members: &members,
            ..StorageLayout::default()
        };
        assert!(group_storage(&rows, &layout, |_| None).is_empty());
    }

    #[test]
    fn mount_root_source_finds_slash() {
        let mount = "sysfs on /sys type sysfs (rw)\n/dev/mmcblk0p2 on / type ext4 (rw,noatime)\n";
        assert_eq!(mount_root_source(mount).as_deref(), Some("/dev/mmcblk0p2"));
        assert_eq!(mount_root_source("proc on /proc type proc"), None);
    }

    const MDSTAT: &str = "\
Personalities : [raid1] [linear]
md0 : active raid1 sdb1[1] sda1[0]
      976630464 blocks super 1.2 [2/2] [UU]
      bitmap: 0/8 pages [0KB], 65536KB chunk

unused devices: <none>
";

    #[test]
    fn mdstat_lists_arrays_and_members() {
        assert_eq!(
            mdstat(MDSTAT),
            MdStat {
                arrays: vec![("md0".into(), "raid1".into())],
                members: vec!["sdb1".into(), "sda1".into()],
            }
        );
    }

    #[test]
    fn mdstat_without_arrays_is_empty() {
        assert_eq!(mdstat("Personalities : \nunused devices: <none>\n"), MdStat::default());
    }

    const MDADM: &str = "\
/dev/md0:
           Version : 1.2
        Raid Level : raid1
        Array Size : 976630464 (931.39 GiB 1000.07 GB)
     Used Dev Size : 976630464 (931.39 GiB 1000.07 GB)
      Raid Devices : 2
     Total Devices : 2
             State : clean, degraded, recovering
    Active Devices : 1
   Working Devices : 2
    Failed Devices : 0
     Spare Devices : 1
    Rebuild Status : 12% complete

    Number   Major   Minor   RaidDevice State
       0       8        1        0      active sync   /dev/sda1
";

    #[test]
    fn mdadm_detail_reads_counters_and_progress() {
        let detail = mdadm_detail(MDADM);
        assert_eq!(detail.level, "raid1");
        assert_eq!(detail.size_kb, 976_630_464);
        assert_eq!(detail.used_kb, 976_630_464);
        assert_eq!(detail.state, "clean, degraded, recovering");
        assert_eq!(
            (detail.devices, detail.active, detail.working, detail.failed, detail.spare),
            (2, 1, 2, 0, 1)
        );
        assert_eq!(detail.resync, "12% complete");
        assert_eq!(detail.members, vec!["/dev/sda1".to_string()]);
    }

    #[test]
    fn block_stat_sector_fields() {
        let stat = "   1234    10  56789   300   4321    20  98765   400    0   500   700";
        assert_eq!(block_stat_sectors(stat), Some((56_789, 98_765)));
        assert_eq!(block_stat_sectors("1 2 3"), None);
        assert_eq!(
            disk_io("sda", stat),
            Some(DiskIo {
                device: "sda".into(),
                read_sectors: 56_789,
                write_sectors: 98_765
            })
        );
    }

    #[test]
    fn lsblk_keeps_sata_disks() {
        let out = "mmcblk0 disk\nsda     disk\nsr0     rom\nnvme0n1 disk\nhdb disk\n";
        assert_eq!(lsblk_disks(out), vec!["sda".to_string(), "hdb".to_string()]);
    }

    #[test]
    fn smartctl_attribute_194() {
        let out = "\
ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE     UPDATED WHEN_FAILED RAW_VALUE
190 Airflow_Temperature_Cel 0x0032   062   052   000    Old_age  Always  -           38
194 Temperature_Celsius     0x0022   038   048   000    Old_age  Always  -           36 (0 20 0)
";
        assert_eq!(smartctl_temperature(out), Some(36.0));
    }

    #[test]
    fn smartctl_falls_back_to_190_then_temperature_line() {
        let airflow = "190 Airflow_Temperature_Cel 0x0032 062 052 000 Old_age Always - 41\n";
        assert_eq!(smartctl_temperature(airflow), Some(41.0));

        let nvme = "SMART/Health Information\nTemperature:                        45 Celsius\n";
        assert_eq!(smartctl_temperature(nvme), Some(45.0));
    }

    #[test]
    fn smartctl_unsupported_device() {
        assert_eq!(
            smartctl_temperature("scsi error unsupported scsi opcode\n194 x x x x x x x x 40"),
            None
        );
        assert_eq!(smartctl_temperature("Device is in STANDBY mode, exit(2)\n"), None);
    }

    #[test]
    fn ip_addresses_skip_loopback_and_bridges() {
        let out = "\
1: lo    inet 127.0.0.1/8 scope host lo\\       valid_lft forever preferred_lft forever
2: eth0    inet 192.168.1.23/24 brd 192.168.1.255 scope global eth0\\       valid_lft 86000sec
3: br0    inet 10.0.0.1/24 scope global br0
4: wlan0    inet 192.168.1.40/24 scope global wlan0
";
        assert_eq!(
            ip_addresses(out),
            vec![
                InterfaceAddress {
                    interface: "eth0".into(),
                    address: "192.168.1.23".into()
                },
                InterfaceAddress {
                    interface: "wlan0".into(),
                    address: "192.168.1.40".into()
                },
            ]
        );
    }
}
