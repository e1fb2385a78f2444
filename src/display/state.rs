//! Screen rotation state machine, driven by a one-second tick.

use std::fmt;

use log::warn;

use crate::{
    event::Gesture,
    metrics::{CoreUsage, InterfaceAddress, RaidArray, StorageUsage},
};

use super::screens::DiskBandwidth;

/// Ticks between data refreshes of a screen that is not rotating.
pub const REFRESH_TICKS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Clock,
    Cpu,
    Storage,
    Bandwidth,
    Raid,
    Ram,
    Temp,
    Ip,
}

impl ScreenKind {
    /// Parses a configured screen name. Unknown names show the clock.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "clock" => ScreenKind::Clock,
            "cpu" => ScreenKind::Cpu,
            "storage" => ScreenKind::Storage,
            "bandwidth" => ScreenKind::Bandwidth,
            "raid" => ScreenKind::Raid,
            "ram" => ScreenKind::Ram,
            "temp" => ScreenKind::Temp,
            "ip" => ScreenKind::Ip,
            other => {
                warn!("Unknown screen '{other}', showing the clock instead");
                ScreenKind::Clock
            }
        }
    }

    /// Items drawn per frame for paged screens.
    pub fn page_size(self) -> usize {
        match self {
            ScreenKind::Cpu => 4,
            ScreenKind::Storage => 3,
            ScreenKind::Bandwidth => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ScreenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScreenKind::Clock => "clock",
            ScreenKind::Cpu => "cpu",
            ScreenKind::Storage => "storage",
            ScreenKind::Bandwidth => "bandwidth",
            ScreenKind::Raid => "raid",
            ScreenKind::Ram => "ram",
            ScreenKind::Temp => "temp",
            ScreenKind::Ip => "ip",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Active,
    Screensaver,
    Stopped,
}

/// Working list of a paged screen plus the offset of the next page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCursor<T> {
    items: Vec<T>,
    offset: usize,
}

impl<T> PageCursor<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, offset: 0 }
    }

    /// Returns the next `size` items and moves past them.
    pub fn next_page(&mut self, size: usize) -> &[T] {
        let start = self.offset.min(self.items.len());
        let end = (start + size.max(1)).min(self.items.len());
        self.offset = end;
        &self.items[start..end]
    }

    pub fn has_more(&self) -> bool {
        self.offset < self.items.len()
    }
}

/// Page cursor of the current screen, empty once consumed or discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ScreenCursor {
    #[default]
    Empty,
    Cpu(PageCursor<CoreUsage>),
    Storage(PageCursor<StorageUsage>),
    Bandwidth(PageCursor<DiskBandwidth>),
    Raid(PageCursor<RaidArray>),
    Ip(PageCursor<InterfaceAddress>),
}

impl ScreenCursor {
    pub fn has_more(&self) -> bool {
        match self {
            ScreenCursor::Empty => false,
            ScreenCursor::Cpu(c) => c.has_more(),
            ScreenCursor::Storage(c) => c.has_more(),
            ScreenCursor::Bandwidth(c) => c.has_more(),
            ScreenCursor::Raid(c) => c.has_more(),
            ScreenCursor::Ip(c) => c.has_more(),
        }
    }
}

/// What the controller has to do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Idle,
    Render,
    EnterScreensaver,
    Stop,
}

#[derive(Debug)]
pub struct ScreenState {
    screens: Vec<ScreenKind>,
    index: usize,
    mode: DisplayMode,
    idle_ticks: u32,
    screen_ticks: u32,
    refresh_ticks: u32,
    rotation: u32,
    screensaver: u32,
    pub cursor: ScreenCursor,
}

impl ScreenState {
    /// Returns `None` for an empty screen list.
    pub fn new(
        screens: Vec<ScreenKind>,
        rotation_secs: u32,
        screensaver_secs: u32,
    ) -> Option<Self> {
        if screens.is_empty() {
            return None;
        }
        Some(Self {
            screens,
            index: 0,
            mode: DisplayMode::Active,
            idle_ticks: 0,
            screen_ticks: 0,
            refresh_ticks: 0,
            rotation: rotation_secs,
            screensaver: screensaver_secs,
            cursor: ScreenCursor::Empty,
        })
    }

    pub fn current(&self) -> ScreenKind {
        self.screens[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn screen_count(&self) -> usize {
        self.screens.len()
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    pub fn screen_ticks(&self) -> u32 {
        self.screen_ticks
    }

    /// Moves to the next screen in the cyclic list and drops its cursor.
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.screens.len();
        self.cursor = ScreenCursor::Empty;
        self.screen_ticks = 0;
        self.refresh_ticks = 0;
    }

    /// Advances the machine by one tick.
    pub fn tick(&mut self, gesture: Option<Gesture>) -> Step {
        if self.mode == DisplayMode::Stopped {
            return Step::Idle;
        }

        match gesture {
            Some(Gesture::StopDisplay) => {
                self.mode = DisplayMode::Stopped;
                return Step::Stop;
            }
            Some(Gesture::SwitchScreen) => {
                self.mode = DisplayMode::Active;
                self.idle_ticks = 0;
                self.advance();
                return Step::Render;
            }
            // Power gestures belong to the button task.
            Some(Gesture::Reboot | Gesture::Shutdown) | None => {}
        }

        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.mode == DisplayMode::Screensaver {
            return Step::Idle;
        }
        if self.screensaver > 0 && self.idle_ticks >= self.screensaver {
            self.mode = DisplayMode::Screensaver;
            return Step::EnterScreensaver;
        }

        self.screen_ticks += 1;
        self.refresh_ticks += 1;
        if self.rotation > 0 && self.screen_ticks >= self.rotation {
            if !self.cursor.has_more() {
                self.advance();
            }
            self.screen_ticks = 0;
            self.refresh_ticks = 0;
            return Step::Render;
        }
        if self.refresh_ticks >= REFRESH_TICKS {
            self.refresh_ticks = 0;
            return Step::Render;
        }
        Step::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn state(screens: &[ScreenKind], rotation: u32, screensaver: u32) -> ScreenState {
        ScreenState::new(screens.to_vec(), rotation, screensaver).unwrap()
    }

    fn idle_for(state: &mut ScreenState, ticks: u32) -> Vec<Step> {
        (0..ticks).map(|_| state.tick(None)).collect()
    }

    #[test]
    fn screen_names_parse_with_clock_fallback() {
        assert_eq!(ScreenKind::from_name("cpu"), ScreenKind::Cpu);
        assert_eq!(ScreenKind::from_name(" RAID "), ScreenKind::Raid);
        assert_eq!(ScreenKind::from_name("weather"), ScreenKind::Clock);
        assert_eq!(ScreenKind::Bandwidth.to_string(), "bandwidth");
    }

    #[test]
    fn empty_list_has_no_state() {
        assert!(ScreenState::new(Vec::new(), 30, 120).is_none());
    }

    #[test]
    fn page_cursor_walks_pages() {
        let mut cursor = PageCursor::new(vec![1, 2, 3, 4, 5]);
        assert_eq!(cursor.next_page(2), &[1, 2]);
        assert!(cursor.has_more());
        assert_eq!(cursor.next_page(2), &[3, 4]);
        assert_eq!(cursor.next_page(2), &[5]);
        assert!(!cursor.has_more());
        assert!(cursor.next_page(2).is_empty());
    }

    #[test]
    fn rotates_after_interval() {
        let mut s = state(&[ScreenKind::Cpu, ScreenKind::Ram], 10, 0);
        let steps = idle_for(&mut s, 10);
        assert!(steps[..9].iter().all(|s| *s == Step::Idle));
        assert_eq!(steps[9], Step::Render);
        assert_eq!(s.current(), ScreenKind::Ram);

        idle_for(&mut s, 10);
        assert_eq!(s.current(), ScreenKind::Cpu);
    }

    #[test]
    fn rotation_shows_remaining_pages_first() {
        let mut s = state(&[ScreenKind::Cpu, ScreenKind::Ram], 5, 0);
        s.cursor = ScreenCursor::Cpu(PageCursor::new(
            (0..6)
                .map(|i| CoreUsage {
                    name: format!("cpu{i}"),
                    percent: 0,
                })
                .collect(),
        ));
        if let ScreenCursor::Cpu(c) = &mut s.cursor {
            c.next_page(4);
        }

        assert_eq!(idle_for(&mut s, 5)[4], Step::Render);
        assert_eq!(s.current(), ScreenKind::Cpu);
    }

    #[test]
    fn zero_rotation_is_manual_only() {
        let mut s = state(&[ScreenKind::Cpu, ScreenKind::Ram], 0, 0);
        idle_for(&mut s, 59);
        assert_eq!(s.current(), ScreenKind::Cpu);
        assert_eq!(s.tick(None), Step::Render);
        assert_eq!(s.current(), ScreenKind::Cpu);

        assert_eq!(s.tick(Some(Gesture::SwitchScreen)), Step::Render);
        assert_eq!(s.current(), ScreenKind::Ram);
    }

    #[test]
    fn refreshes_every_minute_without_rotation() {
        let mut s = state(&[ScreenKind::Clock], 0, 0);
        let steps = idle_for(&mut s, 120);
        let renders: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Step::Render)
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(renders, vec![60, 120]);
    }

    #[test]
    fn enters_screensaver_then_wakes_on_switch() {
        let mut s = state(&[ScreenKind::Cpu, ScreenKind::Storage], 10, 120);
        let steps = idle_for(&mut s, 125);

        assert_eq!(steps[119], Step::EnterScreensaver);
        assert!(steps[120..].iter().all(|s| *s == Step::Idle));
        assert_eq!(s.mode(), DisplayMode::Screensaver);
        // 11 rotations over two screens before the screensaver.
        assert_eq!(s.current(), ScreenKind::Storage);

        assert_eq!(s.tick(Some(Gesture::SwitchScreen)), Step::Render);
        assert_eq!(s.mode(), DisplayMode::Active);
        assert_eq!(s.current(), ScreenKind::Cpu);
        assert_eq!(s.idle_ticks(), 0);
        assert_eq!(s.screen_ticks(), 0);
    }

    #[test]
    fn screensaver_does_not_rotate() {
        let mut s = state(&[ScreenKind::Cpu, ScreenKind::Storage], 10, 5);
        idle_for(&mut s, 5);
        assert_eq!(s.mode(), DisplayMode::Screensaver);
        idle_for(&mut s, 100);
        assert_eq!(s.current(), ScreenKind::Cpu);
    }

    #[test]
    fn switch_discards_cursor() {
        let mut s = state(&[ScreenKind::Ip, ScreenKind::Clock], 10, 0);
        s.cursor = ScreenCursor::Ip(PageCursor::new(vec![InterfaceAddress {
            interface: "eth0".into(),
            address: "10.0.0.2".into(),
        }]));
        s.tick(Some(Gesture::SwitchScreen));
        assert_eq!(s.cursor, ScreenCursor::Empty);
        assert_eq!(s.current(), ScreenKind::Clock);
    }

    #[test]
    fn stop_display_is_terminal() {
        let mut s = state(&[ScreenKind::Clock], 1, 0);
        assert_eq!(s.tick(Some(Gesture::StopDisplay)), Step::Stop);
        assert_eq!(s.mode(), DisplayMode::Stopped);
        assert_eq!(s.tick(Some(Gesture::SwitchScreen)), Step::Idle);
        assert_eq!(s.tick(None), Step::Idle);
    }

    #[test]
    fn stop_display_from_screensaver() {
        let mut s = state(&[ScreenKind::Clock], 0, 1);
        assert_eq!(s.tick(None), Step::EnterScreensaver);
        assert_eq!(s.tick(Some(Gesture::StopDisplay)), Step::Stop);
    }

    #[test]
    fn power_gestures_count_as_idle() {
        let mut s = state(&[ScreenKind::Clock], 0, 2);
        assert_eq!(s.tick(Some(Gesture::Reboot)), Step::Idle);
        assert_eq!(s.tick(Some(Gesture::Shutdown)), Step::EnterScreensaver);
    }

    proptest! {
        #[test]
        fn index_stays_in_range(
            count in 1usize..6,
            rotation in 0u32..5,
            screensaver in 0u32..20,
            gestures in proptest::collection::vec(0u8..4, 0..200),
        ) {
            let mut s = state(&vec![ScreenKind::Clock; count], rotation, screensaver);
            for g in gestures {
                let gesture = match g {
                    0 => None,
                    1 => Some(Gesture::SwitchScreen),
                    2 => Some(Gesture::Reboot),
                    _ => None,
                };
                s.tick(gesture);
                prop_assert!(s.index() < s.screen_count());
                if screensaver > 0 {
                    prop_assert!(
                        s.idle_ticks() <= screensaver || s.mode() == DisplayMode::Screensaver
                    );
                }
            }
        }
    }
}
