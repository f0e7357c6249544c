pub mod mlb_statsapi;
pub mod thesportsdb;

pub use mlb_statsapi::MlbStatsApi;
pub use thesportsdb::TheSportsDb;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::db::models::{CompletedGame, Injury, League, Player};

/// Capability interface every data provider implements. All network I/O,
/// pagination and politeness lives behind it; classification never sees any
/// of that.
#[async_trait]
pub trait SportsDataProvider: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    async fn fetch_players(&self, league: League, season: Option<i32>) -> Result<Vec<Player>>;

    /// Season schedule including final scores for played games.
    async fn fetch_completed_games(&self, league: League, season: i32)
        -> Result<Vec<CompletedGame>>;

    async fn fetch_injuries(&self, league: League) -> Result<Vec<Injury>>;
}

/// Which provider tier to use for a league.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Primary,
    Legacy,
}

#[derive(Debug, Error)]
#[error("unknown source '{0}' (expected primary or legacy)")]
pub struct ParseSourceError(String);

impl FromStr for Source {
    type Err = ParseSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(Source::Primary),
            "legacy" => Ok(Source::Legacy),
            other => Err(ParseSourceError(other.to_string())),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Primary => f.write_str("primary"),
            Source::Legacy => f.write_str("legacy"),
        }
    }
}

/// Closed set of provider implementations. Selection is a static match on
/// league and source — no string-keyed registry, no dynamic module lookup.
pub enum Provider {
    TheSportsDb(TheSportsDb),
    MlbStatsApi(MlbStatsApi),
}

impl Provider {
    /// Pick the provider for a league/source combination. TheSportsDB is the
    /// primary source for every league; only MLB has a legacy provider.
    pub fn for_league(
        league: League,
        source: Source,
        api_key: Option<&str>,
        request_delay_ms: u64,
    ) -> Result<Provider> {
        match (league, source) {
            (_, Source::Primary) => Ok(Provider::TheSportsDb(TheSportsDb::new(
                api_key,
                None,
                request_delay_ms,
            )?)),
            (League::Mlb, Source::Legacy) => {
                Ok(Provider::MlbStatsApi(MlbStatsApi::new(None, request_delay_ms)?))
            }
            (league, Source::Legacy) => {
                anyhow::bail!("no legacy provider available for {}", league)
            }
        }
    }
}

#[async_trait]
impl SportsDataProvider for Provider {
    fn name(&self) -> &str {
        match self {
            Provider::TheSportsDb(p) => p.name(),
            Provider::MlbStatsApi(p) => p.name(),
        }
    }

    async fn fetch_players(&self, league: League, season: Option<i32>) -> Result<Vec<Player>> {
        match self {
            Provider::TheSportsDb(p) => p.fetch_players(league, season).await,
            Provider::MlbStatsApi(p) => p.fetch_players(league, season).await,
        }
    }

    async fn fetch_completed_games(
        &self,
        league: League,
        season: i32,
    ) -> Result<Vec<CompletedGame>> {
        match self {
            Provider::TheSportsDb(p) => p.fetch_completed_games(league, season).await,
            Provider::MlbStatsApi(p) => p.fetch_completed_games(league, season).await,
        }
    }

    async fn fetch_injuries(&self, league: League) -> Result<Vec<Injury>> {
        match self {
            Provider::TheSportsDb(p) => p.fetch_injuries(league).await,
            Provider::MlbStatsApi(p) => p.fetch_injuries(league).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_provider_for_every_league() {
        for league in League::ALL {
            let p = Provider::for_league(league, Source::Primary, None, 0).unwrap();
            assert_eq!(p.name(), "TheSportsDB");
        }
    }

    #[test]
    fn test_legacy_provider_only_for_mlb() {
        let p = Provider::for_league(League::Mlb, Source::Legacy, None, 0).unwrap();
        assert_eq!(p.name(), "MLB-StatsAPI");
        assert!(Provider::for_league(League::Nba, Source::Legacy, None, 0).is_err());
    }

    #[test]
    fn test_source_parsing() {
        assert_eq!("primary".parse::<Source>().unwrap(), Source::Primary);
        assert_eq!("Legacy".parse::<Source>().unwrap(), Source::Legacy);
        assert!("nflverse".parse::<Source>().is_err());
    }
}
