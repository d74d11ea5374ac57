//! Championship standings
//!
//! Aggregates per-race points into one driver or constructor table per season.
//! Equal totals are ordered by entity id so that tables are reproducible.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::core::points::{PointsSystem, PODIUM_POINTS, WIN_POINTS};
use crate::core::positions::{assign_positions, RaceGrouping};
use crate::error::Result;
use crate::models::{PredictionRow, StandingEntry};

/// Whose championship to aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandingsEntity {
    Driver,
    Constructor,
}

impl StandingsEntity {
    pub fn label(&self) -> &'static str {
        match self {
            StandingsEntity::Driver => "Driver",
            StandingsEntity::Constructor => "Constructor",
        }
    }

    fn id<'a>(&self, row: &'a PredictionRow) -> &'a str {
        match self {
            StandingsEntity::Driver => &row.name,
            StandingsEntity::Constructor => &row.constructor,
        }
    }
}

/// Points scored by one entity in one race
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceScore {
    pub season: i32,
    pub entity_id: String,
    pub points: u32,
}

fn season_table(season: i32, scores: &[&RaceScore]) -> Vec<StandingEntry> {
    let mut by_entity: BTreeMap<&str, StandingEntry> = BTreeMap::new();
    for score in scores {
        let entry = by_entity
            .entry(score.entity_id.as_str())
            .or_insert_with(|| StandingEntry {
                season,
                position: 0,
                entity_id: score.entity_id.clone(),
                total_points: 0,
                wins: 0,
                podiums: 0,
                points_finishes: 0,
                races: 0,
            });
        entry.total_points += score.points;
        entry.races += 1;
        if score.points == WIN_POINTS {
            entry.wins += 1;
        }
        if score.points >= PODIUM_POINTS {
            entry.podiums += 1;
        }
        if score.points > 0 {
            entry.points_finishes += 1;
        }
    }

    // BTreeMap order is entity id ascending; a stable sort keeps it for ties
    let mut table: Vec<StandingEntry> = by_entity.into_values().collect();
    table.sort_by(|a, b| b.total_points.cmp(&a.total_points));
    for (i, entry) in table.iter_mut().enumerate() {
        entry.position = i as u32 + 1;
    }
    table
}

/// Standings per season, seasons ascending, positions 1..N within each
pub fn aggregate_standings(scores: &[RaceScore]) -> Vec<StandingEntry> {
    let mut by_season: BTreeMap<i32, Vec<&RaceScore>> = BTreeMap::new();
    for score in scores {
        by_season.entry(score.season).or_default().push(score);
    }

    let tables: Vec<Vec<StandingEntry>> = by_season
        .into_par_iter()
        .map(|(season, season_scores)| season_table(season, &season_scores))
        .collect();
    tables.into_iter().flatten().collect()
}

/// Standings from ranked prediction rows
pub fn calculate_standings(
    rows: &[PredictionRow],
    entity: StandingsEntity,
    points: &PointsSystem,
) -> Vec<StandingEntry> {
    let scores: Vec<RaceScore> = rows
        .iter()
        .map(|row| RaceScore {
            season: row.season,
            entity_id: entity.id(row).to_string(),
            points: if row.predicted_gap.is_nan() {
                0
            } else {
                points.points_for(row.predicted_position)
            },
        })
        .collect();
    aggregate_standings(&scores)
}

/// Rank each race, then build (driver, constructor) standings
pub fn positions_and_standings(
    rows: &mut [PredictionRow],
    grouping: RaceGrouping,
) -> Result<(Vec<StandingEntry>, Vec<StandingEntry>)> {
    assign_positions(rows, grouping)?;
    let points = PointsSystem::default();
    let drivers = calculate_standings(rows, StandingsEntity::Driver, &points);
    let constructors = calculate_standings(rows, StandingsEntity::Constructor, &points);
    Ok((drivers, constructors))
}

/// Predicted vs actual standing for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandingsComparison {
    pub season: i32,
    pub entity_id: String,
    pub position_pred: u32,
    pub position_actual: u32,
    pub total_points_pred: u32,
    pub total_points_actual: u32,
    pub position_diff: i64,
    pub points_diff: i64,
    pub exact_position: bool,
}

/// Inner join on (season, entity id), in predicted order
pub fn compare_standings(
    predicted: &[StandingEntry],
    actual: &[StandingEntry],
) -> Vec<StandingsComparison> {
    let actual_by_id: BTreeMap<(i32, &str), &StandingEntry> = actual
        .iter()
        .map(|e| ((e.season, e.entity_id.as_str()), e))
        .collect();

    predicted
        .iter()
        .filter_map(|pred| {
            let act = actual_by_id.get(&(pred.season, pred.entity_id.as_str()))?;
            Some(StandingsComparison {
                season: pred.season,
                entity_id: pred.entity_id.clone(),
                position_pred: pred.position,
                position_actual: act.position,
                total_points_pred: pred.total_points,
                total_points_actual: act.total_points,
                position_diff: pred.position as i64 - act.position as i64,
                points_diff: pred.total_points as i64 - act.total_points as i64,
                exact_position: pred.position == act.position,
            })
        })
        .collect()
}

/// Fixed-width text table: position, entity, points, wins
pub fn format_standings_table(
    entries: &[StandingEntry],
    entity: StandingsEntity,
    top_n: Option<usize>,
) -> String {
    let shown = top_n.map_or(entries.len(), |n| n.min(entries.len()));
    let entries = &entries[..shown];

    let width = entries
        .iter()
        .map(|e| e.entity_id.len())
        .max()
        .unwrap_or(0)
        .max(entity.label().len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<width$}  {:>6}  {:>4}",
        "Pos",
        entity.label(),
        "Points",
        "Wins",
        width = width
    );
    for e in entries {
        let _ = writeln!(
            out,
            "{:>3}  {:<width$}  {:>6}  {:>4}",
            e.position,
            e.entity_id,
            e.total_points,
            e.wins,
            width = width
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(season: i32, entity: &str, points: u32) -> RaceScore {
        RaceScore {
            season,
            entity_id: entity.to_string(),
            points,
        }
    }

    fn prediction(round: u32, name: &str, constructor: &str, gap: f64) -> PredictionRow {
        PredictionRow {
            season: 2020,
            round,
            race_name: String::new(),
            name: name.to_string(),
            constructor: constructor.to_string(),
            finish_position: None,
            predicted_gap: gap,
            predicted_position: 0,
        }
    }

    #[test]
    fn test_three_race_totals() {
        let scores = vec![
            score(2020, "A", 25),
            score(2020, "B", 18),
            score(2020, "A", 18),
            score(2020, "B", 25),
            score(2020, "A", 25),
            score(2020, "B", 18),
        ];
        let table = aggregate_standings(&scores);
        assert_eq!(table[0].entity_id, "A");
        assert_eq!(table[0].total_points, 68);
        assert_eq!(table[0].position, 1);
        assert_eq!(table[0].wins, 2);
        assert_eq!(table[0].podiums, 3);
        assert_eq!(table[1].entity_id, "B");
        assert_eq!(table[1].total_points, 61);
        assert_eq!(table[1].races, 3);
    }

    #[test]
    fn test_tie_break_by_entity_id() {
        let scores = vec![score(2020, "zeta", 10), score(2020, "alpha", 10), score(2020, "mid", 12)];
        let table = aggregate_standings(&scores);
        let ids: Vec<&str> = table.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["mid", "alpha", "zeta"]);
        let positions: Vec<u32> = table.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_per_season_tables() {
        let scores = vec![score(2019, "A", 25), score(2020, "A", 1), score(2020, "B", 25)];
        let table = aggregate_standings(&scores);
        assert_eq!(table.len(), 3);
        assert_eq!((table[0].season, table[0].position), (2019, 1));
        assert_eq!((table[1].season, table[1].entity_id.as_str()), (2020, "B"));
        assert_eq!(table[2].position, 2);
    }

    #[test]
    fn test_positions_and_standings() {
        let mut rows = vec![
            prediction(1, "Lewis Hamilton", "mercedes", 0.0),
            prediction(1, "Max Verstappen", "red_bull", 5.5),
            prediction(1, "Valtteri Bottas", "mercedes", 12.3),
            prediction(2, "Lewis Hamilton", "mercedes", 0.0),
            prediction(2, "Max Verstappen", "red_bull", 4.2),
            prediction(2, "Valtteri Bottas", "mercedes", 9.8),
        ];
        let (drivers, constructors) =
            positions_and_standings(&mut rows, RaceGrouping::SeasonRound).unwrap();

        assert_eq!(drivers[0].entity_id, "Lewis Hamilton");
        assert_eq!(drivers[0].total_points, 50);
        assert_eq!(drivers[1].entity_id, "Max Verstappen");
        assert_eq!(drivers[1].total_points, 36);
        assert_eq!(drivers[2].total_points, 30);

        assert_eq!(constructors[0].entity_id, "mercedes");
        assert_eq!(constructors[0].total_points, 80);
        assert_eq!(constructors[0].races, 4);
        assert_eq!(constructors[1].total_points, 36);
    }

    #[test]
    fn test_nan_prediction_scores_nothing() {
        let mut rows = vec![
            prediction(1, "a", "x", 1.0),
            prediction(1, "b", "y", f64::NAN),
        ];
        let (drivers, _) = positions_and_standings(&mut rows, RaceGrouping::SeasonRound).unwrap();
        assert_eq!(rows[1].predicted_position, 2);
        let b = drivers.iter().find(|e| e.entity_id == "b").unwrap();
        assert_eq!(b.total_points, 0);
    }

    #[test]
    fn test_compare_standings() {
        let predicted = aggregate_standings(&[score(2020, "A", 25), score(2020, "B", 18)]);
        let actual = aggregate_standings(&[score(2020, "A", 18), score(2020, "B", 25)]);
        let comparison = compare_standings(&predicted, &actual);
        assert_eq!(comparison.len(), 2);
        assert_eq!(comparison[0].entity_id, "A");
        assert_eq!(comparison[0].position_diff, -1);
        assert_eq!(comparison[0].points_diff, 7);
        assert!(!comparison[0].exact_position);
    }

    #[test]
    fn test_format_standings_table() {
        let table = aggregate_standings(&[score(2020, "hamilton", 25), score(2020, "bottas", 18)]);
        let text = format_standings_table(&table, StandingsEntity::Driver, Some(1));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Driver"));
        assert!(lines[1].contains("hamilton"));
        assert!(lines[1].contains("25"));
    }
}
