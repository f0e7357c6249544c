use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashSet;

use crate::db::models::{League, Upset, UpsetType};

/// Summary statistics over a set of upset records.
///
/// Every category in the taxonomy gets a count, zero when absent, so the
/// shape of the output never depends on which upsets happened to occur.
/// Averages and maxima over an empty set are 0.0 by convention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsetStats {
    pub total_upsets: i64,
    /// Distinct winning teams across the filtered set.
    pub unique_upset_teams: i64,
    pub avg_magnitude: f64,
    pub max_magnitude: f64,
    pub spread_upsets: i64,
    pub odds_upsets: i64,
    pub performance_upsets: i64,
    pub historical_upsets: i64,
}

/// Compute summary statistics over in-memory upset records, optionally
/// filtered to one league.
pub fn stats(records: &[Upset], league: Option<League>) -> UpsetStats {
    let filtered: Vec<&Upset> = records
        .iter()
        .filter(|u| league.map_or(true, |l| u.league == l))
        .collect();

    if filtered.is_empty() {
        return UpsetStats::default();
    }

    let winners: HashSet<&str> = filtered.iter().map(|u| u.winner.as_str()).collect();
    let total = filtered.len() as i64;
    let magnitude_sum: f64 = filtered.iter().map(|u| u.upset_magnitude).sum();
    let max_magnitude = filtered
        .iter()
        .map(|u| u.upset_magnitude)
        .fold(0.0_f64, f64::max);

    let count_of = |t: UpsetType| filtered.iter().filter(|u| u.upset_type == t).count() as i64;

    UpsetStats {
        total_upsets: total,
        unique_upset_teams: winners.len() as i64,
        avg_magnitude: magnitude_sum / total as f64,
        max_magnitude,
        spread_upsets: count_of(UpsetType::PointSpread),
        odds_upsets: count_of(UpsetType::Odds),
        performance_upsets: count_of(UpsetType::Performance),
        historical_upsets: count_of(UpsetType::Historical),
    }
}

/// The `limit` most recent upsets, ordered by game date descending with ties
/// broken by creation time descending. The ordering is always computed from
/// the record fields, never taken from storage order.
pub fn recent(records: &[Upset], league: Option<League>, limit: usize) -> Vec<Upset> {
    let mut filtered: Vec<Upset> = records
        .iter()
        .filter(|u| league.map_or(true, |l| u.league == l))
        .cloned()
        .collect();
    filtered.sort_by_key(|u| Reverse((u.game_date, u.created_at)));
    filtered.truncate(limit);
    filtered
}
