//! Championship points

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Points awarded to places 1..=10
pub const DEFAULT_POINTS: [u32; 10] = [25, 18, 15, 12, 10, 8, 6, 4, 2, 1];

pub const WIN_POINTS: u32 = 25;
/// Third place or better scores at least this much
pub const PODIUM_POINTS: u32 = 15;

/// Points for a finishing position under the default table
pub fn points_for(position: u32) -> u32 {
    match position {
        1..=10 => DEFAULT_POINTS[(position - 1) as usize],
        _ => 0,
    }
}

/// Position → points lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsSystem {
    table: BTreeMap<u32, u32>,
}

impl Default for PointsSystem {
    fn default() -> Self {
        Self::new(
            DEFAULT_POINTS
                .iter()
                .enumerate()
                .map(|(i, p)| (i as u32 + 1, *p)),
        )
    }
}

impl PointsSystem {
    pub fn new(table: impl IntoIterator<Item = (u32, u32)>) -> Self {
        Self {
            table: table.into_iter().collect(),
        }
    }

    pub fn points_for(&self, position: u32) -> u32 {
        self.table.get(&position).copied().unwrap_or(0)
    }

    pub fn apply(&self, positions: &[u32]) -> Vec<u32> {
        positions.iter().map(|p| self.points_for(*p)).collect()
    }
}

/// Distribution of per-race points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointsSummary {
    pub total: u32,
    pub mean: f64,
    pub median: f64,
    pub max: u32,
    pub points_finishes: u32,
    pub podiums: u32,
    pub wins: u32,
}

pub fn points_summary(points: &[u32]) -> PointsSummary {
    if points.is_empty() {
        return PointsSummary::default();
    }

    let mut sorted = points.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    };

    let total: u32 = points.iter().sum();
    PointsSummary {
        total,
        mean: total as f64 / points.len() as f64,
        median,
        max: sorted[sorted.len() - 1],
        points_finishes: points.iter().filter(|&&p| p > 0).count() as u32,
        podiums: points.iter().filter(|&&p| p >= PODIUM_POINTS).count() as u32,
        wins: points.iter().filter(|&&p| p == WIN_POINTS).count() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let points: Vec<u32> = (1..=10).map(points_for).collect();
        assert_eq!(points, vec![25, 18, 15, 12, 10, 8, 6, 4, 2, 1]);
        assert_eq!(points_for(11), 0);
        assert_eq!(points_for(0), 0);
        assert_eq!(points_for(20), 0);
    }

    #[test]
    fn test_points_system_matches_default() {
        let system = PointsSystem::default();
        for position in 0..25 {
            assert_eq!(system.points_for(position), points_for(position));
        }
    }

    #[test]
    fn test_custom_points_system() {
        let sprint = PointsSystem::new([(1, 8), (2, 7), (3, 6)]);
        assert_eq!(sprint.apply(&[1, 3, 4]), vec![8, 6, 0]);
    }

    #[test]
    fn test_points_summary() {
        let summary = points_summary(&[25, 18, 0, 15, 1]);
        assert_eq!(summary.total, 59);
        assert_eq!(summary.max, 25);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.podiums, 3);
        assert_eq!(summary.points_finishes, 4);
        assert!((summary.median - 15.0).abs() < 1e-9);
        assert!((summary.mean - 11.8).abs() < 1e-9);
        assert_eq!(points_summary(&[]), PointsSummary::default());
    }
}
