use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Leagues the pipeline knows how to process.
///
/// Deliberately a closed enum: provider selection is decided statically per
/// league, never through string-keyed lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    Nfl,
    Nba,
    Mlb,
    Nhl,
}

impl League {
    pub const ALL: [League; 4] = [League::Nfl, League::Nba, League::Mlb, League::Nhl];

    pub fn as_str(&self) -> &'static str {
        match self {
            League::Nfl => "nfl",
            League::Nba => "nba",
            League::Mlb => "mlb",
            League::Nhl => "nhl",
        }
    }

    /// Uppercase tag used in log lines and exported records, e.g. "NBA".
    pub fn tag(&self) -> &'static str {
        match self {
            League::Nfl => "NFL",
            League::Nba => "NBA",
            League::Mlb => "MLB",
            League::Nhl => "NHL",
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown league '{0}' (expected nfl, nba, mlb or nhl)")]
pub struct ParseLeagueError(String);

impl FromStr for League {
    type Err = ParseLeagueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nfl" => Ok(League::Nfl),
            "nba" => Ok(League::Nba),
            "mlb" => Ok(League::Mlb),
            "nhl" => Ok(League::Nhl),
            other => Err(ParseLeagueError(other.to_string())),
        }
    }
}

/// Category assigned to a detected upset. The string forms are stable — they
/// are stored in SQLite and exported to CSV as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsetType {
    PointSpread,
    Odds,
    Performance,
    Historical,
}

impl UpsetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsetType::PointSpread => "point_spread",
            UpsetType::Odds => "odds",
            UpsetType::Performance => "performance",
            UpsetType::Historical => "historical",
        }
    }
}

impl fmt::Display for UpsetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown upset type '{0}'")]
pub struct ParseUpsetTypeError(String);

impl FromStr for UpsetType {
    type Err = ParseUpsetTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "point_spread" => Ok(UpsetType::PointSpread),
            "odds" => Ok(UpsetType::Odds),
            "performance" => Ok(UpsetType::Performance),
            "historical" => Ok(UpsetType::Historical),
            other => Err(ParseUpsetTypeError(other.to_string())),
        }
    }
}

/// Optional pre-game context supplied alongside a game result.
///
/// `historical_significant` is the only field that influences classification;
/// the rest are descriptive and carried into the Upset record verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameContext {
    pub historical_significant: bool,
    pub venue: Option<String>,
    pub weather: Option<String>,
    pub attendance: Option<i64>,
    pub broadcast_network: Option<String>,
    pub quarter: Option<String>,
    pub time_remaining: Option<String>,
}

/// A completed game's facts as fed into the classifier. Constructed fresh per
/// game by the caller and never persisted.
///
/// Sign convention for `point_spread`: positive means the home team is
/// favored by that many points, negative means the away team is favored by
/// `abs(point_spread)`. `odds_before_game` is the decimal odds that were
/// quoted for the side that eventually won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub league: League,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
    pub point_spread: Option<f64>,
    pub odds_before_game: Option<f64>,
    pub context: Option<GameContext>,
}

/// A recorded upset. Immutable once created: corrections are new inserts,
/// the upsets table is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upset {
    pub id: Option<i64>,
    pub league: League,
    /// Date the verdict was computed.
    pub game_date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
    pub winner: String,
    pub loser: String,
    pub upset_type: UpsetType,
    pub upset_reason: String,
    pub point_spread: Option<f64>,
    pub odds_before_game: Option<f64>,
    pub upset_magnitude: f64,
    pub venue: Option<String>,
    pub weather: Option<String>,
    pub attendance: Option<i64>,
    pub broadcast_network: Option<String>,
    pub quarter: Option<String>,
    pub time_remaining: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Upset {
    /// One-line human-readable summary for CLI output and logs.
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} upset {} ({}): {}",
            self.league.tag(),
            self.winner,
            self.loser,
            self.upset_type,
            self.upset_reason
        )
    }
}

/// Normalized player record, common across all league providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Provider-scoped ID, e.g. "thesportsdb:34146370".
    pub id: String,
    pub full_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub league: League,
    pub team: Option<String>,
    pub team_id: Option<String>,
    pub position: Option<String>,
    pub jersey: Option<String>,
    pub nationality: Option<String>,
    /// ISO date string as reported by the provider.
    pub birthdate: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// A reported player injury.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Injury {
    pub id: Option<i64>,
    pub player_name: String,
    pub league: League,
    pub team: Option<String>,
    pub description: Option<String>,
    /// "questionable" | "doubtful" | "out" | "ir"
    pub severity: Option<String>,
    pub active: bool,
    pub reported_at: DateTime<Utc>,
}

/// Season win/loss record for a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub league: League,
    pub team: String,
    pub season: i32,
    pub wins: i32,
    pub losses: i32,
    pub ties: i32,
    pub updated_at: DateTime<Utc>,
}

/// Raw completed-game row as fetched from a provider. Scores are optional
/// because schedule feeds include unplayed games; the ingest loop skips rows
/// without a final score.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedGame {
    pub event_id: String,
    pub league: League,
    pub game_date: Option<NaiveDate>,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub venue: Option<String>,
    pub finished: bool,
}
