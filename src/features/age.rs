//! Driver age at race date

use chrono::{NaiveDate, NaiveDateTime};

/// Date input accepted by the age calculator
#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// ISO `YYYY-MM-DD`
    Text(String),
}

impl DateValue {
    fn to_date(&self) -> Option<NaiveDate> {
        match self {
            DateValue::Date(d) => Some(*d),
            DateValue::DateTime(dt) => Some(dt.date()),
            DateValue::Text(s) => parse_iso_date(s),
        }
    }
}

impl From<NaiveDate> for DateValue {
    fn from(d: NaiveDate) -> Self {
        DateValue::Date(d)
    }
}

impl From<&str> for DateValue {
    fn from(s: &str) -> Self {
        DateValue::Text(s.to_string())
    }
}

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // Exactly YYYY-MM-DD; chrono alone would accept unpadded fields
    if s.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Whole days from birth to race. `None` when either date is unreadable.
pub fn age_days(date_of_birth: &DateValue, race_date: &DateValue) -> Option<i64> {
    let dob = date_of_birth.to_date()?;
    let race = race_date.to_date()?;
    Some((race - dob).num_days())
}

/// Convenience for optional text columns
pub fn age_days_from_str(date_of_birth: Option<&str>, race_date: Option<&str>) -> Option<i64> {
    age_days(&date_of_birth?.into(), &race_date?.into())
}

pub fn age_years(days: i64) -> f64 {
    days as f64 / 365.25
}

pub fn age_bracket(days: i64) -> i64 {
    days.div_euclid(365)
}

/// Peak performance window: 23 to 27 years
pub fn is_peak_age(days: i64) -> bool {
    let years = age_years(days);
    (23.0..=27.0).contains(&years)
}

pub fn is_veteran(days: i64, threshold_years: f64) -> bool {
    age_years(days) > threshold_years
}

pub const VETERAN_THRESHOLD_YEARS: f64 = 33.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_days_from_text() {
        let days = age_days(&"1985-01-07".into(), &"2020-07-05".into());
        let expected = (NaiveDate::from_ymd_opt(2020, 7, 5).unwrap()
            - NaiveDate::from_ymd_opt(1985, 1, 7).unwrap())
        .num_days();
        assert_eq!(days, Some(expected));
    }

    #[test]
    fn test_age_days_mixed_inputs() {
        let dob = DateValue::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        let race = DateValue::DateTime(
            NaiveDate::from_ymd_opt(2000, 1, 11)
                .unwrap()
                .and_hms_opt(14, 10, 0)
                .unwrap(),
        );
        assert_eq!(age_days(&dob, &race), Some(10));
    }

    #[test]
    fn test_age_days_invalid() {
        assert_eq!(age_days(&"not-a-date".into(), &"2020-07-05".into()), None);
        assert_eq!(age_days(&"2020-7-5".into(), &"2020-07-05".into()), None);
        assert_eq!(age_days_from_str(None, Some("2020-07-05")), None);
    }

    #[test]
    fn test_age_helpers() {
        let twenty_five = (25.0 * 365.25) as i64;
        assert!(is_peak_age(twenty_five));
        assert!(!is_peak_age((30.0 * 365.25) as i64));
        assert!(is_veteran((35.0 * 365.25) as i64, VETERAN_THRESHOLD_YEARS));
        assert!(!is_veteran(twenty_five, VETERAN_THRESHOLD_YEARS));
        assert_eq!(age_bracket(730), 2);
        assert!((age_years(3652) - 9.998).abs() < 0.01);
    }
}
