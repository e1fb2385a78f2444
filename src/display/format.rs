//! Text formatting shared by the screens.

use serde::{Deserialize, Serialize};

const SIZE_SUFFIXES: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Unit temperatures are shown in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(self) -> char {
        match self {
            TemperatureUnit::Celsius => 'C',
            TemperatureUnit::Fahrenheit => 'F',
        }
    }
}

/// Formats a kilobyte count with a binary suffix, rounding half up.
///
/// `1536` becomes `"2MB"`, `1000` stays `"1000KB"`.
pub fn kb_string(kb: u64) -> String {
    let mut value = kb;
    let mut remainder = 0;
    let mut suffix = 0;
    while value > 1023 && suffix < SIZE_SUFFIXES.len() - 1 {
        remainder = value & 1023;
        value >>= 10;
        suffix += 1;
    }
    if remainder >= 500 {
        value += 1;
    }
    format!("{value}{}", SIZE_SUFFIXES[suffix])
}

/// Temperature value without unit, truncated to fit the screen columns.
pub fn temperature_value(celsius: f32, unit: TemperatureUnit) -> String {
    let (value, width) = match unit {
        TemperatureUnit::Celsius => (celsius, 4),
        TemperatureUnit::Fahrenheit => (32.0 + 9.0 * celsius / 5.0, 5),
    };
    let mut text = if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    };
    text.truncate(width);
    text
}

/// Temperature with degree sign and unit, e.g. `48.5°C`.
pub fn temperature(celsius: f32, unit: TemperatureUnit) -> String {
    format!("{}°{}", temperature_value(celsius, unit), unit.symbol())
}

/// Upper-cases the first character.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kb_string_picks_suffix_and_rounds() {
        assert_eq!(kb_string(0), "0KB");
        assert_eq!(kb_string(1023), "1023KB");
        assert_eq!(kb_string(1024), "1MB");
        assert_eq!(kb_string(1536), "2MB");
        assert_eq!(kb_string(1524), "2MB");
        assert_eq!(kb_string(1523), "1MB");
        assert_eq!(kb_string(30_000_000), "29GB");
    }

    #[test]
    fn kb_string_caps_at_terabytes() {
        assert_eq!(kb_string(5 << 40), "5120TB");
    }

    #[test]
    fn celsius_is_truncated_to_four_characters() {
        assert_eq!(temperature_value(48.5, TemperatureUnit::Celsius), "48.5");
        assert_eq!(temperature_value(48.0, TemperatureUnit::Celsius), "48.0");
        assert_eq!(temperature_value(48.125, TemperatureUnit::Celsius), "48.1");
        assert_eq!(temperature_value(100.5, TemperatureUnit::Celsius), "100.");
    }

    #[test]
    fn fahrenheit_is_truncated_to_five_characters() {
        assert_eq!(temperature_value(50.0, TemperatureUnit::Fahrenheit), "122.0");
        assert_eq!(temperature_value(48.5, TemperatureUnit::Fahrenheit), "119.3");
    }

    #[test]
    fn temperature_has_degree_and_unit() {
        assert_eq!(temperature(45.0, TemperatureUnit::Celsius), "45.0°C");
        assert_eq!(temperature(45.0, TemperatureUnit::Fahrenheit), "113.0°F");
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("clean"), "Clean");
        assert_eq!(capitalize(""), "");
    }
}
