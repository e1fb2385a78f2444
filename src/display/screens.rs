//! Layouts of the individual status screens.
//!
//! Every screen pulls its own data from the [`MetricSource`]. A screen with
//! nothing to show returns [`Frame::NoData`] and the controller moves on.

use anyhow::Result;
use chrono::{Datelike, NaiveDateTime, Timelike};
use log::{debug, warn};
use tokio::time::Instant;

use super::{
    format::{self, TemperatureUnit, kb_string},
    panel::{Align, Background, Font, Panel},
    state::{PageCursor, ScreenCursor, ScreenKind},
};
use crate::metrics::{DiskIo, MetricSource};

/// Left edge of the value column, right of the background artwork.
const VALUE_X: i32 = 54;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Outcome of rendering one screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Drawn,
    NoData,
}

/// Read and write throughput of one disk in KB/s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskBandwidth {
    pub device: String,
    pub read_kb: u64,
    pub write_kb: u64,
}

/// Keeps the previous disk I/O sample so throughput can be derived from the
/// next one.
#[derive(Debug, Default)]
pub struct BandwidthSampler {
    previous: Vec<DiskIo>,
    taken: Option<Instant>,
}

impl BandwidthSampler {
    /// Takes the baseline sample.
    pub async fn prime(&mut self, metrics: &dyn MetricSource) {
        match metrics.disk_io().await {
            Ok(sample) => {
                self.previous = sample;
                self.taken = Some(Instant::now());
            }
            Err(e) => debug!("No baseline disk I/O sample: {e:#}"),
        }
    }

    /// Throughput between the stored sample and `sample`, which then
    /// becomes the stored one.
    pub fn rates(&mut self, sample: Vec<DiskIo>, now: Instant) -> Vec<DiskBandwidth> {
        let span = self
            .taken
            .map(|t| now.saturating_duration_since(t).as_secs_f64())
            .filter(|s| *s > 0.0)
            .unwrap_or(1.0);

        let rates = self
            .previous
            .iter()
            .filter_map(|before| {
                let after = sample.iter().find(|s| s.device == before.device)?;
                let per_second = |sectors: u64| ((sectors / 2) as f64 / span) as u64;
                Some(DiskBandwidth {
                    device: before.device.clone(),
                    read_kb: per_second(after.read_sectors.saturating_sub(before.read_sectors)),
                    write_kb: per_second(after.write_sectors.saturating_sub(before.write_sectors)),
                })
            })
            .collect();

        self.previous = sample;
        self.taken = Some(now);
        rates
    }
}

/// Everything a screen needs besides the panel and its cursor.
pub struct RenderContext<'a> {
    pub metrics: &'a dyn MetricSource,
    pub unit: TemperatureUnit,
    pub bandwidth: &'a mut BandwidthSampler,
    pub now: NaiveDateTime,
}

/// Draws `kind` into the panel buffer. Fetch errors count as no data.
pub async fn render(
    kind: ScreenKind,
    cursor: &mut ScreenCursor,
    panel: &mut dyn Panel,
    ctx: &mut RenderContext<'_>,
) -> Frame {
    let result = match kind {
        ScreenKind::Clock => Ok(clock(panel, ctx.now)),
        ScreenKind::Cpu => cpu(cursor, panel, ctx).await,
        ScreenKind::Storage => storage(cursor, panel, ctx).await,
        ScreenKind::Bandwidth => bandwidth(cursor, panel, ctx).await,
        ScreenKind::Raid => raid(cursor, panel, ctx).await,
        ScreenKind::Ram => ram(panel, ctx).await,
        ScreenKind::Temp => temp(panel, ctx).await,
        ScreenKind::Ip => ip(cursor, panel, ctx).await,
    };
    result.unwrap_or_else(|e| {
        warn!("Error processing information for {kind} display: {e:#}");
        *cursor = ScreenCursor::Empty;
        Frame::NoData
    })
}

fn clock(panel: &mut dyn Panel, now: NaiveDateTime) -> Frame {
    let width = panel.width() - VALUE_X;
    panel.load_background(Background::Clock);

    let month = MONTHS[now.month0() as usize];
    let weekday = WEEKDAYS[now.weekday().num_days_from_monday() as usize];
    panel.write_text_aligned(
        &format!("{month}{:>2}", now.day()),
        VALUE_X,
        8,
        width,
        Align::Center,
        Font::Regular,
    );
    panel.write_text_aligned(weekday, VALUE_X, 24, width, Align::Center, Font::Regular);
    panel.write_text_aligned(
        &format!("{:02}:{:02}", now.hour(), now.minute()),
        VALUE_X,
        40,
        width,
        Align::Center,
        Font::Regular,
    );
    Frame::Drawn
}

async fn cpu(
    cursor: &mut ScreenCursor,
    panel: &mut dyn Panel,
    ctx: &RenderContext<'_>,
) -> Result<Frame> {
    if !matches!(cursor, ScreenCursor::Cpu(c) if c.has_more()) {
        *cursor = ScreenCursor::Cpu(PageCursor::new(ctx.metrics.cpu_usage().await?));
    }
    let ScreenCursor::Cpu(pages) = cursor else {
        return Ok(Frame::NoData);
    };
    let page = pages.next_page(ScreenKind::Cpu.page_size());
    if page.is_empty() {
        return Ok(Frame::NoData);
    }

    let bar_width = panel.width() - VALUE_X - 4;
    panel.load_background(Background::Cpu);
    let mut y = 0;
    for core in page {
        panel.write_text(&format!("{}: {}%", core.name, core.percent), VALUE_X, y, Font::Small);
        panel.fill_rect(VALUE_X, y + 12, bar_width * i32::from(core.percent) / 100, 2);
        y += 16;
    }
    Ok(Frame::Drawn)
}

async fn storage(
    cursor: &mut ScreenCursor,
    panel: &mut dyn Panel,
    ctx: &RenderContext<'_>,
) -> Result<Frame> {
    if !matches!(cursor, ScreenCursor::Storage(c) if c.has_more()) {
        *cursor = ScreenCursor::Storage(PageCursor::new(ctx.metrics.storage_usage().await?));
    }
    let ScreenCursor::Storage(pages) = cursor else {
        return Ok(Frame::NoData);
    };
    let page = pages.next_page(ScreenKind::Storage.page_size());
    if page.is_empty() {
        return Ok(Frame::NoData);
    }

    let width = panel.width();
    panel.load_background(Background::Storage);
    let mut y = 16;
    for usage in page {
        // Right column first so a long name cannot hide the figures.
        panel.write_text_aligned(
            &kb_string(usage.total_kb),
            77,
            y,
            width - 77,
            Align::Right,
            Font::Small,
        );
        panel.write_text_aligned(
            &format!("{}%", usage.percent()),
            50,
            y,
            24,
            Align::Right,
            Font::Small,
        );
        let name: String = usage.device.chars().take(8).collect();
        panel.write_text(&name, 0, y, Font::Small);
        y += 16;
    }
    Ok(Frame::Drawn)
}

async fn bandwidth(
    cursor: &mut ScreenCursor,
    panel: &mut dyn Panel,
    ctx: &mut RenderContext<'_>,
) -> Result<Frame> {
    if !matches!(cursor, ScreenCursor::Bandwidth(c) if c.has_more()) {
        let sample = ctx.metrics.disk_io().await?;
        let rates = ctx.bandwidth.rates(sample, Instant::now());
        *cursor = ScreenCursor::Bandwidth(PageCursor::new(rates));
    }
    let ScreenCursor::Bandwidth(pages) = cursor else {
        return Ok(Frame::NoData);
    };
    let page = pages.next_page(ScreenKind::Bandwidth.page_size());
    if page.is_empty() {
        return Ok(Frame::NoData);
    }

    let width = panel.width();
    panel.clear();
    panel.write_text_aligned("BANDWIDTH", 0, 0, width, Align::Center, Font::Small);
    panel.write_text_aligned("Write", 77, 16, width - 77, Align::Right, Font::Small);
    panel.write_text_aligned("Read", 50, 16, 24, Align::Right, Font::Small);
    panel.write_text("Device", 0, 16, Font::Small);

    let mut y = 32;
    for disk in page {
        panel.write_text_aligned(
            &kb_string(disk.write_kb),
            77,
            y,
            width - 77,
            Align::Right,
            Font::Small,
        );
        panel.write_text_aligned(&kb_string(disk.read_kb), 50, y, 24, Align::Right, Font::Small);
        panel.write_text(&disk.device, 0, y, Font::Small);
        y += 16;
    }
    Ok(Frame::Drawn)
}

async fn raid(
    cursor: &mut ScreenCursor,
    panel: &mut dyn Panel,
    ctx: &RenderContext<'_>,
) -> Result<Frame> {
    if !matches!(cursor, ScreenCursor::Raid(c) if c.has_more()) {
        *cursor = ScreenCursor::Raid(PageCursor::new(ctx.metrics.raid_arrays().await?));
    }
    let ScreenCursor::Raid(pages) = cursor else {
        return Ok(Frame::NoData);
    };
    let Some(array) = pages.next_page(1).first() else {
        return Ok(Frame::NoData);
    };
    let detail = &array.detail;

    panel.load_background(Background::Raid);
    panel.write_text_aligned(&array.name, 0, 0, VALUE_X, Align::Center, Font::Small);
    panel.write_text_aligned(&array.level, 0, 8, VALUE_X, Align::Center, Font::Small);
    panel.write_text_aligned(
        &kb_string(detail.size_kb),
        0,
        56,
        VALUE_X,
        Align::Center,
        Font::Small,
    );

    // "clean, degraded, recovering" shows the most specific part.
    let parts: Vec<&str> = detail.state.split(", ").collect();
    let status = format::capitalize(parts[(parts.len() - 1).min(2)]);
    panel.write_text(&status, VALUE_X, 8, Font::Small);

    if let Some(progress) = detail.resync.split_whitespace().next() {
        let label = if status.eq_ignore_ascii_case("checking") {
            "Progress: "
        } else {
            "Rebuild: "
        };
        panel.write_text(&format!("{label}{progress}"), VALUE_X, 16, Font::Small);
    }

    let devices = detail.devices;
    panel.write_text(&format!("Active:{}/{devices}", detail.active), VALUE_X, 32, Font::Small);
    panel.write_text(&format!("Working:{}/{devices}", detail.working), VALUE_X, 40, Font::Small);
    panel.write_text(&format!("Failed:{}/{devices}", detail.failed), VALUE_X, 48, Font::Small);
    Ok(Frame::Drawn)
}

async fn ram(panel: &mut dyn Panel, ctx: &RenderContext<'_>) -> Result<Frame> {
    let memory = ctx.metrics.memory().await?;
    let width = panel.width() - VALUE_X;

    panel.load_background(Background::Ram);
    panel.write_text_aligned(
        &format!("{}%", memory.free_percent()),
        VALUE_X,
        8,
        width,
        Align::Center,
        Font::Regular,
    );
    panel.write_text_aligned("of", VALUE_X, 24, width, Align::Center, Font::Regular);
    panel.write_text_aligned(
        &format!("{}GB", memory.total_gb()),
        VALUE_X,
        40,
        width,
        Align::Center,
        Font::Regular,
    );
    Ok(Frame::Drawn)
}

/// Height of the thermometer bar for the hottest reading, 40 to 80 °C.
pub fn thermometer_height(celsius: f32) -> i32 {
    const MAX: i32 = 21;
    ((MAX as f32 * (celsius - 40.0) / 40.0) as i32).clamp(1, MAX)
}

async fn temp(panel: &mut dyn Panel, ctx: &RenderContext<'_>) -> Result<Frame> {
    let cpu = ctx.metrics.cpu_temperature().await?;
    let disks = ctx.metrics.storage_temperatures().await.unwrap_or_else(|e| {
        debug!("Disk temperatures unavailable: {e:#}");
        Vec::new()
    });
    let width = panel.width() - VALUE_X;
    let unit = ctx.unit;

    panel.load_background(Background::Temp);
    let hottest = if disks.is_empty() {
        panel.write_text_aligned(
            &format::temperature(cpu, unit),
            VALUE_X,
            24,
            width,
            Align::Center,
            Font::Regular,
        );
        if let Some(speed) = ctx.metrics.current_fan_speed().await {
            panel.write_text_aligned(
                &format!("Fan: {speed}%"),
                VALUE_X,
                48,
                width,
                Align::Center,
                Font::Small,
            );
        }
        cpu
    } else {
        let min = disks.iter().map(|d| d.celsius).fold(f32::MAX, f32::min);
        let max = disks.iter().map(|d| d.celsius).fold(f32::MIN, f32::max);

        panel.write_text(
            &format!("CPU: {}", format::temperature(cpu, unit)),
            VALUE_X,
            8,
            Font::Small,
        );
        let mut y = 24;
        for (label, value) in [("HDD MIN", min), ("HDD MAX", max)] {
            panel.write_text(&format!("{label}:"), VALUE_X, y, Font::Small);
            panel.write_text(
                &format!("     {}", format::temperature(value, unit)),
                VALUE_X,
                y + 8,
                Font::Small,
            );
            y += 16;
        }
        max.max(cpu)
    };

    let height = thermometer_height(hottest);
    panel.fill_rect(24, 20 + (21 - height), 3, height);
    Ok(Frame::Drawn)
}

async fn ip(
    cursor: &mut ScreenCursor,
    panel: &mut dyn Panel,
    ctx: &RenderContext<'_>,
) -> Result<Frame> {
    if !matches!(cursor, ScreenCursor::Ip(c) if c.has_more()) {
        *cursor = ScreenCursor::Ip(PageCursor::new(ctx.metrics.ip_addresses().await?));
    }
    let ScreenCursor::Ip(pages) = cursor else {
        return Ok(Frame::NoData);
    };
    let Some(entry) = pages.next_page(1).first() else {
        return Ok(Frame::NoData);
    };

    let width = panel.width();
    panel.load_background(Background::Ip);
    panel.write_text_aligned(&entry.interface, 0, 0, width, Align::Center, Font::Regular);
    panel.write_text_aligned(&entry.address, 0, 16, width, Align::Center, Font::Regular);
    Ok(Frame::Drawn)
}
