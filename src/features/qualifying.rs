//! Qualifying lap times
//!
//! Parses `M:SS.mmm` lap strings and reduces the three sessions to best/worst/mean.

use serde::{Deserialize, Serialize};

/// Qualifying session times as they arrive from ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QualifyingTimes {
    /// Lap strings such as `"1:23.456"`
    Raw {
        q1: Option<String>,
        q2: Option<String>,
        q3: Option<String>,
    },
    /// Already converted to seconds upstream
    Parsed {
        q1: Option<f64>,
        q2: Option<f64>,
        q3: Option<f64>,
    },
}

impl Default for QualifyingTimes {
    fn default() -> Self {
        QualifyingTimes::Parsed {
            q1: None,
            q2: None,
            q3: None,
        }
    }
}

/// Session times in seconds plus aggregates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualifyingSummary {
    pub q1: Option<f64>,
    pub q2: Option<f64>,
    pub q3: Option<f64>,
    pub best: Option<f64>,
    pub worst: Option<f64>,
    pub mean: Option<f64>,
}

impl QualifyingTimes {
    /// Session times in seconds
    pub fn seconds(&self) -> [Option<f64>; 3] {
        match self {
            QualifyingTimes::Raw { q1, q2, q3 } => [
                parse_qualifying_time(q1.as_deref()),
                parse_qualifying_time(q2.as_deref()),
                parse_qualifying_time(q3.as_deref()),
            ],
            QualifyingTimes::Parsed { q1, q2, q3 } => [*q1, *q2, *q3],
        }
    }

    pub fn summary(&self) -> QualifyingSummary {
        let [q1, q2, q3] = self.seconds();
        QualifyingSummary {
            q1,
            q2,
            q3,
            best: best_time(q1, q2, q3),
            worst: worst_time(q1, q2, q3),
            mean: mean_time(q1, q2, q3),
        }
    }
}

/// Parse a lap string of the form `M:SS.mmm` into seconds.
///
/// Any malformed input yields `None`.
pub fn parse_qualifying_time(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() || raw == "nan" || !raw.contains(':') {
        return None;
    }

    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 2 {
        return None;
    }

    let minutes: i64 = parts[0].parse().ok()?;
    let seconds_part = parts[1];

    let total = match seconds_part.split_once('.') {
        Some((secs, frac)) => {
            let secs: i64 = secs.parse().ok()?;
            if !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            // "1:23." reads as a zero fraction
            let frac: f64 = format!("0.{}0", frac).parse().ok()?;
            minutes.checked_mul(60)?.checked_add(secs)? as f64 + frac
        }
        None => {
            let secs: i64 = seconds_part.parse().ok()?;
            minutes.checked_mul(60)?.checked_add(secs)? as f64
        }
    };

    Some(total)
}

fn valid_times(q1: Option<f64>, q2: Option<f64>, q3: Option<f64>) -> Vec<f64> {
    [q1, q2, q3]
        .into_iter()
        .flatten()
        .filter(|t| t.is_finite() && *t > 0.0)
        .collect()
}

pub fn best_time(q1: Option<f64>, q2: Option<f64>, q3: Option<f64>) -> Option<f64> {
    valid_times(q1, q2, q3).into_iter().reduce(f64::min)
}

pub fn worst_time(q1: Option<f64>, q2: Option<f64>, q3: Option<f64>) -> Option<f64> {
    valid_times(q1, q2, q3).into_iter().reduce(f64::max)
}

pub fn mean_time(q1: Option<f64>, q2: Option<f64>, q3: Option<f64>) -> Option<f64> {
    let valid = valid_times(q1, q2, q3);
    if valid.is_empty() {
        return None;
    }
    Some(valid.iter().sum::<f64>() / valid.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|v| (v - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_parse_valid_times() {
        assert!(approx(parse_qualifying_time(Some("1:23.456")), 83.456));
        assert!(approx(parse_qualifying_time(Some("0:59.999")), 59.999));
        assert!(approx(parse_qualifying_time(Some("1:30")), 90.0));
        assert!(approx(parse_qualifying_time(Some("1:23.")), 83.0));
    }

    #[test]
    fn test_parse_overflowing_minutes() {
        assert_eq!(parse_qualifying_time(Some("999999999999999999:00.0")), None);
        assert_eq!(parse_qualifying_time(Some("153722867280912930:08")), None);
    }

    #[test]
    fn test_parse_sentinels_and_garbage() {
        assert_eq!(parse_qualifying_time(None), None);
        assert_eq!(parse_qualifying_time(Some("")), None);
        assert_eq!(parse_qualifying_time(Some("nan")), None);
        assert_eq!(parse_qualifying_time(Some("invalid")), None);
        assert_eq!(parse_qualifying_time(Some("1:2:3")), None);
        assert_eq!(parse_qualifying_time(Some("a:23.4")), None);
        assert_eq!(parse_qualifying_time(Some("1:2x.4")), None);
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(best_time(Some(83.0), None, Some(81.5)), Some(81.5));
        assert_eq!(worst_time(Some(83.0), None, Some(81.5)), Some(83.0));
        assert!(approx(mean_time(Some(83.0), None, Some(81.0)), 82.0));
    }

    #[test]
    fn test_aggregates_ignore_non_positive() {
        assert_eq!(best_time(Some(0.0), Some(-1.0), Some(90.0)), Some(90.0));
        assert_eq!(mean_time(Some(f64::NAN), None, Some(90.0)), Some(90.0));
    }

    #[test]
    fn test_aggregates_all_missing() {
        assert_eq!(best_time(None, None, None), None);
        assert_eq!(worst_time(None, None, None), None);
        assert_eq!(mean_time(None, None, None), None);
    }

    #[test]
    fn test_summary_from_raw_and_parsed() {
        let raw = QualifyingTimes::Raw {
            q1: Some("1:24.000".to_string()),
            q2: Some("nan".to_string()),
            q3: Some("1:22.000".to_string()),
        };
        let summary = raw.summary();
        assert_eq!(summary.q2, None);
        assert!(approx(summary.best, 82.0));
        assert!(approx(summary.mean, 83.0));

        let parsed = QualifyingTimes::Parsed {
            q1: Some(84.0),
            q2: None,
            q3: Some(82.0),
        };
        assert_eq!(parsed.summary(), summary);
    }
}
