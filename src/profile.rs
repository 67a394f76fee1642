//! Body profile inputs for analysis reports (age and sex).

use crate::error::{Result, TuyaError};
use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_AGE: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    #[default]
    Male = 1,
    Female = 2,
}

impl Sex {
    /// Numeric code sent to the analysis endpoint.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for Sex {
    type Error = TuyaError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Sex::Male),
            2 => Ok(Sex::Female),
            other => Err(TuyaError::Config(format!(
                "sex must be 1 (male) or 2 (female), got {}",
                other
            ))),
        }
    }
}

/// Who is standing on the scale.
///
/// With a birth date the age is computed at each measurement's timestamp;
/// otherwise the fixed `age` is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub age: u32,
    pub sex: Sex,
    pub birth_date: Option<NaiveDate>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            age: DEFAULT_AGE,
            sex: Sex::Male,
            birth_date: None,
        }
    }
}

impl UserProfile {
    pub fn new(age: u32, sex: Sex) -> Self {
        Self {
            age,
            sex,
            birth_date: None,
        }
    }

    pub fn with_birth_date(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = Some(birth_date);
        self
    }

    /// Age in whole years at `timestamp_ms` (UTC).
    pub fn age_at(&self, timestamp_ms: i64) -> u32 {
        let Some(birth) = self.birth_date else {
            return self.age;
        };
        match DateTime::from_timestamp_millis(timestamp_ms) {
            Some(at) => age_on(birth, at.date_naive()),
            None => self.age,
        }
    }
}

/// Full years between `birth` and `on`; zero if `on` precedes `birth`.
pub fn age_on(birth: NaiveDate, on: NaiveDate) -> u32 {
    let mut years = on.year() - birth.year();
    if (on.month(), on.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Parse a `YYYY-MM-DD` birth date.
pub fn parse_birth_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| TuyaError::Config(format!("invalid birth date '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_completed_years() {
        let birth = date(1990, 6, 15);
        assert_eq!(age_on(birth, date(2024, 6, 14)), 33);
        assert_eq!(age_on(birth, date(2024, 6, 15)), 34);
        assert_eq!(age_on(birth, date(1980, 1, 1)), 0);
    }

    #[test]
    fn age_at_uses_measurement_time() {
        let profile = UserProfile::default().with_birth_date(date(1990, 6, 15));
        // 2024-06-14T12:00:00Z
        assert_eq!(profile.age_at(1_718_366_400_000), 33);
        // 2024-06-16T12:00:00Z
        assert_eq!(profile.age_at(1_718_539_200_000), 34);
    }

    #[test]
    fn age_falls_back_to_fixed_value() {
        let profile = UserProfile::new(42, Sex::Female);
        assert_eq!(profile.age_at(1_718_366_400_000), 42);
        assert_eq!(profile.sex.code(), 2);
    }

    #[test]
    fn birth_date_parsing() {
        assert_eq!(parse_birth_date("1990-06-15").unwrap(), date(1990, 6, 15));
        assert!(matches!(parse_birth_date("15/06/1990"), Err(TuyaError::Config(_))));
        assert!(Sex::try_from(3).is_err());
        assert_eq!(Sex::try_from(1).unwrap(), Sex::Male);
    }
}
