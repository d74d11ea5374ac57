//! Split times (gap to the race winner)
//!
//! The adjusted gap is the regression target. Lapped finishers have their gap
//! inflated by laps down, non-finishers fall back to a position penalty, and
//! any remaining holes are filled from neighbouring rows of the same race.

use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::warn;

use crate::models::{RaceKey, RaceResultRecord};

/// Seconds of penalty per finishing place when no gap is known
pub const POSITION_PENALTY_SECONDS: f64 = 2.0;

/// Statuses that count as a classified finish
pub const NO_FAULT_STATUSES: &[&str] = &[
    "Finished", "+1 Lap", "+2 Laps", "+3 Laps", "+4 Laps", "+5 Laps", "+6 Laps", "+8 Laps",
];

pub const DRIVER_FAULT_STATUSES: &[&str] = &[
    "Retired",
    "Withdrew",
    "Collision",
    "Accident",
    "Disqualified",
    "Damage",
    "Spun off",
    "Collision damage",
    "Puncture",
    "Rear wing",
    "Tyre",
    "Front wing",
    "Excluded",
    "Illness",
];

pub const CAR_FAULT_STATUSES: &[&str] = &[
    "Suspension",
    "Wheel",
    "Vibrations",
    "Engine",
    "ERS",
    "Power loss",
    "Water leak",
    "Oil pressure",
    "Hydraulics",
    "Steering",
    "Power Unit",
    "Brakes",
    "Mechanical",
    "Turbo",
    "Battery",
    "Electrical",
    "Gearbox",
    "Wheel nut",
    "Technical",
    "Fuel system",
    "Clutch",
    "Out of fuel",
    "Driveshaft",
    "Transmission",
    "Fuel pressure",
    "Exhaust",
    "Oil leak",
    "Electronics",
    "Drivetrain",
    "Overheating",
    "Water pressure",
    "Radiator",
    "Debris",
    "Throttle",
    "Spark plugs",
    "Brake duct",
    "Seat",
];

/// Finish status category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Finished,
    DriverFault,
    CarFault,
    Other,
}

pub fn classify_status(status: &str) -> StatusClass {
    if NO_FAULT_STATUSES.contains(&status) {
        StatusClass::Finished
    } else if DRIVER_FAULT_STATUSES.contains(&status) {
        StatusClass::DriverFault
    } else if CAR_FAULT_STATUSES.contains(&status) {
        StatusClass::CarFault
    } else {
        StatusClass::Other
    }
}

pub fn is_finished(status: &str) -> bool {
    classify_status(status) == StatusClass::Finished
}

/// Raw and adjusted gap for one result row
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SplitTimes {
    pub split_time: Option<f64>,
    pub filled_split: Option<f64>,
}

/// Laps down parsed from a status like "+2 Laps"
fn laps_down(status: &str) -> Option<u32> {
    if !status.contains("Lap") {
        return None;
    }
    let cleaned = status.replace('+', "");
    let first = cleaned.split_whitespace().next()?;
    if first.is_empty() || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    first.parse().ok()
}

/// Adjust a raw gap for lapped cars, or fall back to the position penalty
pub fn compute_filled_split(
    split: Option<f64>,
    status: &str,
    finish_position: Option<u32>,
) -> Option<f64> {
    match split.filter(|s| !s.is_nan()) {
        Some(split) => match laps_down(status) {
            Some(laps) => Some(split * laps.max(1) as f64),
            None => Some(split),
        },
        None => finish_position.map(|p| p as f64 * POSITION_PENALTY_SECONDS),
    }
}

/// Forward-fill then backward-fill in place
fn fill_gaps(values: &mut [Option<f64>]) {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }
    let mut next = None;
    for value in values.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
}

fn race_split_times(records: &[&RaceResultRecord]) -> Vec<SplitTimes> {
    let winner_time = records
        .iter()
        .find(|r| r.finish_position == Some(1))
        .and_then(|r| r.time_seconds());

    let mut out: Vec<SplitTimes> = records
        .iter()
        .map(|r| {
            let split_time = match (r.time_seconds(), winner_time) {
                (Some(t), Some(w)) => Some(t - w),
                _ => None,
            };
            SplitTimes {
                split_time,
                filled_split: compute_filled_split(split_time, &r.status, r.finish_position),
            }
        })
        .collect();

    let mut filled: Vec<Option<f64>> = out.iter().map(|s| s.filled_split).collect();
    fill_gaps(&mut filled);
    for (split, value) in out.iter_mut().zip(filled) {
        split.filled_split = value;
    }
    out
}

/// Group record indices by race, keeping input order inside each race
pub fn group_by_race(records: &[RaceResultRecord]) -> BTreeMap<RaceKey, Vec<usize>> {
    let mut groups: BTreeMap<RaceKey, Vec<usize>> = BTreeMap::new();
    for (idx, record) in records.iter().enumerate() {
        groups.entry(record.race_key()).or_default().push(idx);
    }
    groups
}

/// Split times for every record, aligned with the input slice.
///
/// Races are processed independently in parallel.
pub fn calculate_split_times(records: &[RaceResultRecord]) -> Vec<SplitTimes> {
    let groups: Vec<(RaceKey, Vec<usize>)> = group_by_race(records).into_iter().collect();

    let per_race: Vec<Vec<(usize, SplitTimes)>> = groups
        .par_iter()
        .map(|(key, indices)| {
            let rows: Vec<&RaceResultRecord> = indices.iter().map(|&i| &records[i]).collect();
            let splits = race_split_times(&rows);
            if splits.iter().all(|s| s.filled_split.is_none()) {
                warn!(
                    "No usable split target for season {} round {} ({} rows)",
                    key.0,
                    key.1,
                    rows.len()
                );
            }
            indices.iter().copied().zip(splits).collect()
        })
        .collect();

    let mut result = vec![SplitTimes::default(); records.len()];
    for (idx, split) in per_race.into_iter().flatten() {
        result[idx] = split;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::qualifying::QualifyingTimes;
    use crate::models::CircuitAttributes;

    fn record(
        round: u32,
        driver: &str,
        position: Option<u32>,
        status: &str,
        time_millis: Option<i64>,
    ) -> RaceResultRecord {
        RaceResultRecord {
            season: 2020,
            round,
            race_name: None,
            driver_id: driver.to_string(),
            driver_name: None,
            constructor_id: "mercedes".to_string(),
            grid: None,
            qual_position: None,
            qualifying: QualifyingTimes::default(),
            finish_position: position,
            status: status.to_string(),
            time_millis,
            points: None,
            age_days: None,
            date_of_birth: None,
            race_date: None,
            weather_raw: None,
            circuit: CircuitAttributes::default(),
        }
    }

    #[test]
    fn test_one_lap_down_unchanged() {
        assert_eq!(compute_filled_split(Some(10.0), "+1 Lap", Some(5)), Some(10.0));
    }

    #[test]
    fn test_lapped_multiplier() {
        assert_eq!(compute_filled_split(Some(10.0), "+3 Laps", Some(12)), Some(30.0));
        assert_eq!(compute_filled_split(Some(4.0), "Finished", Some(2)), Some(4.0));
        // Non-numeric lap status passes through
        assert_eq!(compute_filled_split(Some(4.0), "Lapped", Some(9)), Some(4.0));
    }

    #[test]
    fn test_position_penalty() {
        assert_eq!(compute_filled_split(None, "Engine", Some(18)), Some(36.0));
        assert_eq!(compute_filled_split(None, "Engine", None), None);
    }

    #[test]
    fn test_winner_and_lapped_row() {
        let records = vec![
            record(1, "hamilton", Some(1), "Finished", Some(5_000_000)),
            record(1, "albon", Some(2), "+1 Lap", Some(5_010_000)),
        ];
        let splits = calculate_split_times(&records);
        assert_eq!(splits[0].split_time, Some(0.0));
        assert_eq!(splits[0].filled_split, Some(0.0));
        assert_eq!(splits[1].split_time, Some(10.0));
        assert_eq!(splits[1].filled_split, Some(10.0));
    }

    #[test]
    fn test_groups_are_independent() {
        let records = vec![
            record(1, "hamilton", Some(1), "Finished", Some(5_000_000)),
            record(2, "hamilton", Some(3), "Finished", Some(6_020_000)),
            record(1, "bottas", Some(2), "Finished", Some(5_005_500)),
            record(2, "verstappen", Some(1), "Finished", Some(6_000_000)),
        ];
        let splits = calculate_split_times(&records);
        assert_eq!(splits[2].filled_split, Some(5.5));
        assert_eq!(splits[1].filled_split, Some(20.0));
        assert_eq!(splits[3].filled_split, Some(0.0));
    }

    #[test]
    fn test_missing_winner_uses_penalty() {
        let records = vec![
            record(1, "hamilton", Some(2), "Finished", Some(5_000_000)),
            record(1, "bottas", Some(3), "Finished", Some(5_005_000)),
        ];
        let splits = calculate_split_times(&records);
        assert_eq!(splits[0].split_time, None);
        assert_eq!(splits[0].filled_split, Some(4.0));
        assert_eq!(splits[1].filled_split, Some(6.0));
    }

    #[test]
    fn test_fill_forward_then_backward() {
        let records = vec![
            record(1, "a", None, "Retired", None),
            record(1, "b", Some(1), "Finished", Some(5_000_000)),
            record(1, "c", None, "Engine", None),
        ];
        let splits = calculate_split_times(&records);
        assert_eq!(splits[0].filled_split, Some(0.0));
        assert_eq!(splits[2].filled_split, Some(0.0));
    }

    #[test]
    fn test_empty_group_stays_null() {
        let records = vec![
            record(1, "a", None, "Retired", None),
            record(1, "b", None, "Engine", None),
        ];
        let splits = calculate_split_times(&records);
        assert!(splits.iter().all(|s| s.filled_split.is_none()));
    }

    #[test]
    fn test_deterministic() {
        let records = vec![
            record(1, "hamilton", Some(1), "Finished", Some(5_000_000)),
            record(1, "albon", Some(2), "+2 Laps", Some(5_010_000)),
            record(1, "gasly", None, "Gearbox", None),
        ];
        assert_eq!(calculate_split_times(&records), calculate_split_times(&records));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status("Finished"), StatusClass::Finished);
        assert_eq!(classify_status("+2 Laps"), StatusClass::Finished);
        assert_eq!(classify_status("Collision"), StatusClass::DriverFault);
        assert_eq!(classify_status("Gearbox"), StatusClass::CarFault);
        assert_eq!(classify_status("+7 Laps"), StatusClass::Other);
        assert!(is_finished("+1 Lap"));
        assert!(!is_finished(""));
    }
}
