//! Post-prediction logic: positions, points, standings

pub mod points;
pub mod positions;
pub mod standings;

// Re-export commonly used types
pub use points::{points_for, points_summary, PointsSummary, PointsSystem};
pub use positions::{assign_positions, compare_positions, rank_min, PositionComparison, RaceGrouping};
pub use standings::{
    aggregate_standings, calculate_standings, compare_standings, format_standings_table,
    positions_and_standings, RaceScore, StandingsComparison, StandingsEntity,
};
