//! Duration fields, their ranges and the millisecond projection
//!
//! Editing is permissive: out-of-range numbers clamp to the nearest bound and
//! text that is empty or not all digits counts as zero. Nothing here fails.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Milliseconds in one second
pub const MILLIS_PER_SECOND: u64 = 1000;

/// One of the three editable duration fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeField {
    Hours,
    Minutes,
    Seconds,
}

impl TimeField {
    /// Parse a field name as used in request paths
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hours" => Some(Self::Hours),
            "minutes" => Some(Self::Minutes),
            "seconds" => Some(Self::Seconds),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hours => "hours",
            Self::Minutes => "minutes",
            Self::Seconds => "seconds",
        }
    }

    /// Inclusive `(lower, upper)` bounds accepted by this field
    pub fn range(&self) -> (u64, u64) {
        match self {
            Self::Hours => (0, 23),
            // Minutes and seconds accept 60, matching the up/down controls.
            Self::Minutes | Self::Seconds => (0, 60),
        }
    }

    /// Clamp an arbitrary number into the field range without wrapping
    pub fn clamp(&self, value: i64) -> u64 {
        let (lower, upper) = self.range();
        if value < lower as i64 {
            lower
        } else if value > upper as i64 {
            upper
        } else {
            value as u64
        }
    }

    /// Interpret raw text typed into the field.
    ///
    /// Empty or non-digit text is zero. A digit string too large for `i64`
    /// is treated as above the range and clamps to the upper bound.
    pub fn parse_input(&self, text: &str) -> u64 {
        let text = text.trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return self.clamp(0);
        }
        match text.parse::<i64>() {
            Ok(value) => self.clamp(value),
            Err(_) => self.range().1,
        }
    }
}

impl fmt::Display for TimeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw input for a duration field, either a number or text from an input box
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldInput {
    Number(i64),
    Text(String),
}

impl FieldInput {
    /// Resolve the input to a valid value for `field`
    pub fn resolve(&self, field: TimeField) -> u64 {
        match self {
            Self::Number(value) => field.clamp(*value),
            Self::Text(text) => field.parse_input(text),
        }
    }
}

/// The user-specified hours/minutes/seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDuration {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimerDuration {
    /// Largest duration reachable by normalising into valid fields: 23:59:59
    pub const MAX_NORMALIZED_MS: u64 = MILLIS_PER_SECOND * (23 * 3600 + 59 * 60 + 59);

    pub fn new(hours: u64, minutes: u64, seconds: u64) -> Self {
        Self { hours, minutes, seconds }
    }

    pub fn get(&self, field: TimeField) -> u64 {
        match field {
            TimeField::Hours => self.hours,
            TimeField::Minutes => self.minutes,
            TimeField::Seconds => self.seconds,
        }
    }

    pub fn set(&mut self, field: TimeField, value: u64) {
        match field {
            TimeField::Hours => self.hours = value,
            TimeField::Minutes => self.minutes = value,
            TimeField::Seconds => self.seconds = value,
        }
    }

    /// Total length in milliseconds: `1000 * (h*3600 + m*60 + s)`
    pub fn total_millis(&self) -> u64 {
        MILLIS_PER_SECOND * (self.hours * 3600 + self.minutes * 60 + self.seconds)
    }

    /// Normalised fields for `ms`, saturating at 23:59:59
    pub fn from_millis_saturating(ms: u64) -> Self {
        let remaining = RemainingTime::from_millis(ms.min(Self::MAX_NORMALIZED_MS));
        Self::new(remaining.hours, remaining.minutes, remaining.seconds)
    }

    pub fn is_zero(&self) -> bool {
        self.total_millis() == 0
    }
}

impl fmt::Display for TimerDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Display projection of milliseconds left. Sub-second remainders are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingTime {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl RemainingTime {
    pub fn from_millis(ms: u64) -> Self {
        let total_seconds = ms / MILLIS_PER_SECOND;
        Self {
            hours: total_seconds / 3600,
            minutes: (total_seconds % 3600) / 60,
            seconds: (total_seconds % 3600) % 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(TimeField::Hours.clamp(-1), 0);
        assert_eq!(TimeField::Hours.clamp(24), 23);
        assert_eq!(TimeField::Minutes.clamp(61), 60);
        assert_eq!(TimeField::Seconds.clamp(60), 60);
        assert_eq!(TimeField::Seconds.clamp(i64::MIN), 0);
    }

    #[test]
    fn test_parse_input_is_permissive() {
        assert_eq!(TimeField::Minutes.parse_input(""), 0);
        assert_eq!(TimeField::Minutes.parse_input("abc"), 0);
        assert_eq!(TimeField::Minutes.parse_input("-5"), 0);
        assert_eq!(TimeField::Minutes.parse_input("1a"), 0);
        assert_eq!(TimeField::Minutes.parse_input("42"), 42);
        assert_eq!(TimeField::Minutes.parse_input("99"), 60);
        assert_eq!(TimeField::Hours.parse_input("99999999999999999999999"), 23);
    }

    #[test]
    fn test_field_input_untagged() {
        let number: FieldInput = serde_json::from_str("7").unwrap();
        let text: FieldInput = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(number.resolve(TimeField::Seconds), 7);
        assert_eq!(text.resolve(TimeField::Seconds), 7);
    }

    #[test]
    fn test_total_millis() {
        assert_eq!(TimerDuration::new(0, 1, 30).total_millis(), 90_000);
        assert_eq!(TimerDuration::new(23, 60, 60).total_millis(), 87_660_000);
    }

    #[test]
    fn test_from_millis_saturating() {
        assert_eq!(TimerDuration::from_millis_saturating(150_000), TimerDuration::new(0, 2, 30));
        assert_eq!(
            TimerDuration::from_millis_saturating(u64::MAX),
            TimerDuration::new(23, 59, 59)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(TimerDuration::new(1, 2, 3).to_string(), "01:02:03");
    }

    proptest! {
        #[test]
        fn prop_in_range_values_are_kept(n in 0i64..=60) {
            prop_assert_eq!(TimeField::Minutes.clamp(n), n as u64);
            prop_assert_eq!(TimeField::Seconds.clamp(n), n as u64);
        }

        #[test]
        fn prop_out_of_range_values_clamp(n in any::<i64>()) {
            let hours = TimeField::Hours.clamp(n);
            if n < 0 {
                prop_assert_eq!(hours, 0);
            } else if n > 23 {
                prop_assert_eq!(hours, 23);
            } else {
                prop_assert_eq!(hours, n as u64);
            }
        }

        #[test]
        fn prop_total_millis_formula(h in 0u64..=23, m in 0u64..=60, s in 0u64..=60) {
            let duration = TimerDuration::new(h, m, s);
            prop_assert_eq!(duration.total_millis(), 1000 * (h * 3600 + m * 60 + s));
        }

        // 60 is a valid input but normalises on the way back (0:60 -> 1:00).
        #[test]
        fn prop_projection_inverts_total(h in 0u64..=23, m in 0u64..60, s in 0u64..60) {
            let remaining = RemainingTime::from_millis(TimerDuration::new(h, m, s).total_millis());
            prop_assert_eq!(remaining, RemainingTime { hours: h, minutes: m, seconds: s });
        }
    }
}
