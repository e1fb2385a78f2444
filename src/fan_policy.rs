//! Temperature-to-speed lookup policy.
//!
//! A [`ThresholdTable`] maps temperature thresholds to fan-speed percentages.
//! The speed for a temperature is the highest speed among all thresholds at or
//! below it, so the policy never depends on the order the entries were written
//! in.

use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use serde_yaml::{Mapping, Value};

/// Highest speed the fan controller accepts.
pub const MAX_SPEED: u8 = 100;

/// Ordered temperature (°C) to speed (%) thresholds.
///
/// # Example
///
/// ```
/// use argononed::fan_policy::{ThresholdTable, speed_for};
///
/// let table = ThresholdTable::new(vec![(40.0, 25), (44.0, 30), (48.0, 40), (60.0, 100)]);
/// assert_eq!(speed_for(46.0, &table), 30);
/// assert_eq!(speed_for(39.0, &table), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdTable {
    entries: Vec<(f32, u8)>,
}

impl ThresholdTable {
    /// Builds a table, sorting entries by threshold and clamping speeds.
    pub fn new(mut entries: Vec<(f32, u8)>) -> Self {
        entries.retain(|(threshold, _)| !threshold.is_nan());
        for (_, speed) in &mut entries {
            *speed = (*speed).min(MAX_SPEED);
        }
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { entries }
    }

    pub fn entries(&self) -> &[(f32, u8)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&Mapping> for ThresholdTable {
    /// Reads `threshold: speed` pairs from a YAML mapping.
    ///
    /// Entries whose key is not a number or whose value is not a whole
    /// number are skipped individually.
    fn from(mapping: &Mapping) -> Self {
        let entries = mapping
            .iter()
            .filter_map(|(key, value)| match (threshold_of(key), speed_of(value)) {
                (Some(threshold), Some(speed)) => Some((threshold, speed)),
                _ => {
                    warn!("Skipping malformed fan threshold entry {key:?}: {value:?}");
                    None
                }
            })
            .collect();
        Self::new(entries)
    }
}

fn threshold_of(key: &Value) -> Option<f32> {
    match key {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
    .filter(|t| t.is_finite())
}

fn speed_of(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    Some(raw.min(u64::from(MAX_SPEED)) as u8)
}

/// The CPU and storage tables evaluated together by the fan loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanTables {
    pub cpu: ThresholdTable,
    pub storage: ThresholdTable,
}

impl FanTables {
    /// Evaluates both tables and returns the combined demand.
    pub fn target(&self, cpu_temperature: f32, storage_temperature: f32) -> u8 {
        target_speed(
            cpu_temperature,
            &self.cpu,
            storage_temperature,
            &self.storage,
        )
    }
}

/// Supplies the threshold tables for each fan-policy evaluation.
///
/// Implementations are expected to pick up configuration edits, so callers
/// ask again on every cycle instead of caching the result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThresholdSource: Send + Sync {
    async fn fan_tables(&self) -> Result<FanTables>;
}

/// Speed demanded by one heat source at `temperature`.
///
/// Returns the maximum speed among entries whose threshold is at or below the
/// temperature, or 0 when none qualifies.
pub fn speed_for(temperature: f32, table: &ThresholdTable) -> u8 {
    table
        .entries
        .iter()
        .filter(|(threshold, _)| *threshold <= temperature)
        .map(|(_, speed)| *speed)
        .max()
        .unwrap_or(0)
}

/// Combined demand of the CPU and storage heat sources.
///
/// The fan always satisfies the hottest component.
pub fn target_speed(
    cpu_temperature: f32,
    cpu_table: &ThresholdTable,
    storage_temperature: f32,
    storage_table: &ThresholdTable,
) -> u8 {
    speed_for(cpu_temperature, cpu_table).max(speed_for(storage_temperature, storage_table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sample_table() -> ThresholdTable {
        ThresholdTable::new(vec![(40.0, 25), (44.0, 30), (48.0, 40), (60.0, 100)])
    }

    #[test]
    fn speed_for_picks_highest_qualifying_threshold() {
        let table = sample_table();

        assert_eq!(speed_for(46.0, &table), 30);
        assert_eq!(speed_for(39.0, &table), 0);
        assert_eq!(speed_for(60.0, &table), 100);
        assert_eq!(speed_for(61.0, &table), 100);
    }

    #[test]
    fn threshold_is_inclusive() {
        let table = sample_table();
        assert_eq!(speed_for(44.0, &table), 30);
        assert_eq!(speed_for(43.99, &table), 25);
    }

    #[test]
    fn empty_table_yields_zero() {
        assert_eq!(speed_for(90.0, &ThresholdTable::default()), 0);
    }

    #[test]
    fn ties_resolve_to_higher_speed() {
        // A lower threshold carrying a higher speed still wins once reached.
        let table = ThresholdTable::new(vec![(50.0, 80), (55.0, 40)]);
        assert_eq!(speed_for(56.0, &table), 80);
    }

    #[test]
    fn target_speed_takes_hottest_source() {
        let cpu = ThresholdTable::new(vec![(55.0, 30), (60.0, 55), (65.0, 100)]);
        let hdd = ThresholdTable::new(vec![(40.0, 25), (52.0, 55), (60.0, 100)]);

        assert_eq!(target_speed(56.0, &cpu, 53.0, &hdd), 55);
        assert_eq!(target_speed(66.0, &cpu, 30.0, &hdd), 100);
        assert_eq!(target_speed(20.0, &cpu, 20.0, &hdd), 0);
    }

    #[test]
    fn fan_tables_target_combines_both_sources() {
        let tables = FanTables {
            cpu: ThresholdTable::new(vec![(55.0, 30)]),
            storage: ThresholdTable::new(vec![(40.0, 55)]),
        };
        assert_eq!(tables.target(56.0, 41.0), 55);
        assert_eq!(tables.target(56.0, 20.0), 30);
    }

    #[test]
    fn new_sorts_and_clamps_entries() {
        let table = ThresholdTable::new(vec![(60.0, 250), (40.0, 25)]);
        assert_eq!(table.entries(), &[(40.0, 25), (60.0, 100)]);
    }

    #[test]
    fn from_mapping_accepts_numeric_and_string_keys() {
        let mapping: Mapping = serde_yaml::from_str(
            r#"
65.0: 100
"60.0": "55"
55: 30
"#,
        )
        .unwrap();

        let table = ThresholdTable::from(&mapping);
        assert_eq!(table.entries(), &[(55.0, 30), (60.0, 55), (65.0, 100)]);
    }

    #[test]
    fn from_mapping_skips_malformed_entries() {
        let mapping: Mapping = serde_yaml::from_str(
            r#"
hot: 100
50.0: fast
45.0: 40
"#,
        )
        .unwrap();

        let table = ThresholdTable::from(&mapping);
        assert_eq!(table.entries(), &[(45.0, 40)]);
    }

    proptest! {
        #[test]
        fn speed_for_matches_brute_force(
            entries in prop::collection::vec((0.0f32..100.0f32, 0u8..=100u8), 0..12),
            temp in -10.0f32..120.0f32
        ) {
            let table = ThresholdTable::new(entries.clone());
            let expected = entries
                .iter()
                .filter(|(t, _)| *t <= temp)
                .map(|(_, s)| *s)
                .max()
                .unwrap_or(0);
            prop_assert_eq!(speed_for(temp, &table), expected);
        }

        #[test]
        fn speed_for_never_decreases_with_temperature(
            entries in prop::collection::vec((0.0f32..100.0f32, 0u8..=100u8), 0..12),
            low in -10.0f32..120.0f32,
            delta in 0.0f32..50.0f32
        ) {
            let table = ThresholdTable::new(entries);
            prop_assert!(speed_for(low, &table) <= speed_for(low + delta, &table));
        }

        #[test]
        fn speed_for_stays_in_range(
            entries in prop::collection::vec((-50.0f32..150.0f32, any::<u8>()), 0..12),
            temp in -100.0f32..200.0f32
        ) {
            let table = ThresholdTable::new(entries);
            prop_assert!(speed_for(temp, &table) <= MAX_SPEED);
        }
    }
}
