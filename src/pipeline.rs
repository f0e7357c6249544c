use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::db::models::{
    CompletedGame, GameContext, GameResult, League, Player, TeamRecord, Upset,
};
use crate::db::Database;
use crate::providers::{Provider, Source, SportsDataProvider};
use crate::upsets;

/// Orchestrates fetch → normalize → classify → persist runs. All per-item
/// failures are logged and skipped; one bad game or player never aborts a
/// batch.
pub struct Pipeline {
    db: Database,
    api_key: Option<String>,
    request_delay_ms: u64,
}

/// Outcome of an upset-detection sweep.
#[derive(Debug, Default)]
pub struct UpsetRun {
    pub games_checked: usize,
    pub upsets: Vec<Upset>,
}

impl Pipeline {
    pub fn new(db: Database, api_key: Option<String>, request_delay_ms: u64) -> Self {
        Pipeline {
            db,
            api_key,
            request_delay_ms,
        }
    }

    fn provider(&self, league: League, source: Source) -> Result<Provider> {
        Provider::for_league(
            league,
            source,
            self.api_key.as_deref(),
            self.request_delay_ms,
        )
    }

    /// Fetch completed games and record every detected upset. Checks all
    /// leagues concurrently when none is given.
    pub async fn detect_upsets(&self, league: Option<League>, season: i32) -> Result<UpsetRun> {
        let leagues: Vec<League> = match league {
            Some(l) => vec![l],
            None => League::ALL.to_vec(),
        };

        let fetches = leagues.iter().map(|&l| async move {
            let games = match self.provider(l, Source::Primary) {
                Ok(p) => p.fetch_completed_games(l, season).await,
                Err(e) => Err(e),
            };
            (l, games)
        });
        let results = futures_util::future::join_all(fetches).await;

        let mut run = UpsetRun::default();
        for (league, games) in results {
            let games = match games {
                Ok(g) => g,
                Err(e) => {
                    warn!("Fetching {} games failed: {}", league, e);
                    continue;
                }
            };
            info!("[upsets] {}: checking {} games", league.tag(), games.len());
            for record in tally_team_records(&games, season) {
                if let Err(e) = self.db.upsert_team_record(&record) {
                    warn!("Failed to upsert team record: {}", e);
                }
            }
            self.record_upsets(&games, &mut run);
        }
        Ok(run)
    }

    /// Classify each finished game and persist the hits. One malformed game
    /// is logged and skipped; the rest of the batch is always processed.
    ///
    /// Schedule feeds carry no pre-game spread or odds and no historical
    /// flag, so a rule only fires for games where those signals have been
    /// attached upstream.
    fn record_upsets(&self, games: &[CompletedGame], run: &mut UpsetRun) {
        for game in games {
            let Some(result) = game_result_from(game) else {
                continue;
            };
            run.games_checked += 1;
            match upsets::classify(&result, None) {
                Ok(Some(mut upset)) => {
                    match self.db.insert_upset(&upset) {
                        Ok(id) => {
                            upset.id = Some(id);
                            info!("{}", upset.summary());
                            run.upsets.push(upset);
                        }
                        Err(e) => warn!("Failed to insert upset: {}", e),
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    // Bad input from the provider; skip the game, keep the batch.
                    warn!(
                        "Skipping {} vs {}: {}",
                        game.home_team, game.away_team, e
                    );
                }
            }
        }
    }

    /// Fetch and upsert players for a league. Returns the valid rows that
    /// were stored.
    pub async fn ingest_players(
        &self,
        league: League,
        season: Option<i32>,
        source: Source,
    ) -> Result<Vec<Player>> {
        let provider = self.provider(league, source)?;
        info!(
            "[fetch] {} players from {} season={:?}",
            league.tag(),
            provider.name(),
            season
        );
        let fetched = provider.fetch_players(league, season).await?;

        let mut valid = Vec::new();
        for mut player in fetched {
            if player.full_name.trim().is_empty() {
                warn!("Dropping player {} with empty name", player.id);
                continue;
            }
            if player.team.is_none() {
                warn!("Dropping player '{}' with no team", player.full_name);
                continue;
            }
            player.team = player.team.map(|t| clean_team_name(&t));
            valid.push(player);
        }
        self.db.upsert_players(&valid)?;
        Ok(valid)
    }

    /// Fetch and store injuries for one or all leagues.
    pub async fn ingest_injuries(&self, league: Option<League>) -> Result<usize> {
        let leagues: Vec<League> = match league {
            Some(l) => vec![l],
            None => League::ALL.to_vec(),
        };

        let mut stored = 0;
        for league in leagues {
            let injuries = match self.provider(league, Source::Primary) {
                Ok(p) => p.fetch_injuries(league).await,
                Err(e) => Err(e),
            };
            let injuries = match injuries {
                Ok(i) => i,
                Err(e) => {
                    warn!("Fetching {} injuries failed: {}", league, e);
                    continue;
                }
            };
            for injury in &injuries {
                match self.db.insert_injury(injury) {
                    Ok(_) => stored += 1,
                    Err(e) => warn!("Failed to insert injury: {}", e),
                }
            }
            info!("[injuries] {}: processed {}", league.tag(), injuries.len());
        }
        Ok(stored)
    }
}

/// Build a classifier input from a raw provider game. Returns `None` for
/// games that are not finished or have no final score — normal for schedule
/// feeds, not an error.
fn game_result_from(game: &CompletedGame) -> Option<GameResult> {
    if !game.finished {
        return None;
    }
    let (home_score, away_score) = (game.home_score?, game.away_score?);
    Some(GameResult {
        league: game.league,
        home_team: game.home_team.clone(),
        away_team: game.away_team.clone(),
        home_score,
        away_score,
        point_spread: None,
        odds_before_game: None,
        context: Some(GameContext {
            venue: game.venue.clone(),
            ..GameContext::default()
        }),
    })
}

/// Collapse runs of whitespace and trim. Provider team names occasionally
/// carry padding or doubled spaces.
fn clean_team_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive season win/loss/tie records per team from finished games.
fn tally_team_records(games: &[CompletedGame], season: i32) -> Vec<TeamRecord> {
    let mut tallies: HashMap<(League, String), (i32, i32, i32)> = HashMap::new();
    for game in games {
        let (Some(home_score), Some(away_score)) = (game.home_score, game.away_score) else {
            continue;
        };
        if !game.finished {
            continue;
        }
        let home = tallies
            .entry((game.league, game.home_team.clone()))
            .or_default();
        match home_score.cmp(&away_score) {
            std::cmp::Ordering::Greater => home.0 += 1,
            std::cmp::Ordering::Less => home.1 += 1,
            std::cmp::Ordering::Equal => home.2 += 1,
        }
        let away = tallies
            .entry((game.league, game.away_team.clone()))
            .or_default();
        match away_score.cmp(&home_score) {
            std::cmp::Ordering::Greater => away.0 += 1,
            std::cmp::Ordering::Less => away.1 += 1,
            std::cmp::Ordering::Equal => away.2 += 1,
        }
    }

    let now = Utc::now();
    tallies
        .into_iter()
        .map(|((league, team), (wins, losses, ties))| TeamRecord {
            league,
            team,
            season,
            wins,
            losses,
            ties,
            updated_at: now,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(home_score: Option<i32>, away_score: Option<i32>, finished: bool) -> CompletedGame {
        CompletedGame {
            event_id: "thesportsdb:1".into(),
            league: League::Nba,
            game_date: None,
            home_team: "Lakers".into(),
            away_team: "Warriors".into(),
            home_score,
            away_score,
            venue: Some("Crypto.com Arena".into()),
            finished,
        }
    }

    #[test]
    fn test_game_result_from_finished_game() {
        let result = game_result_from(&completed(Some(98), Some(112), true)).unwrap();
        assert_eq!(result.home_score, 98);
        assert_eq!(result.away_score, 112);
        let ctx = result.context.unwrap();
        assert_eq!(ctx.venue.as_deref(), Some("Crypto.com Arena"));
        assert!(!ctx.historical_significant);
    }

    #[test]
    fn test_game_result_skips_unfinished_or_unscored() {
        assert!(game_result_from(&completed(None, None, false)).is_none());
        assert!(game_result_from(&completed(Some(98), None, true)).is_none());
    }

    #[test]
    fn test_clean_team_name() {
        assert_eq!(clean_team_name("  Golden State   Warriors "), "Golden State Warriors");
        assert_eq!(clean_team_name("Lakers"), "Lakers");
    }

    #[test]
    fn test_bad_game_does_not_abort_the_batch() {
        let pipeline = Pipeline::new(Database::open(":memory:").unwrap(), None, 0);
        let mut bad = completed(Some(100), Some(90), true);
        bad.away_team = "Lakers".into(); // same as home_team, rejected by validation
        let mut last = completed(Some(101), Some(99), true);
        last.event_id = "thesportsdb:3".into();
        let games = vec![completed(Some(98), Some(112), true), bad, last];

        let mut run = UpsetRun::default();
        pipeline.record_upsets(&games, &mut run);

        // The malformed middle game is skipped, the one after it still runs.
        assert_eq!(run.games_checked, 3);
        assert!(run.upsets.is_empty());
        assert!(pipeline.db.recent_upsets(None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_tally_team_records() {
        let mut second = completed(Some(101), Some(99), true);
        second.event_id = "thesportsdb:2".into();
        let games = vec![
            completed(Some(98), Some(112), true),
            second,
            completed(None, None, false),
        ];
        let mut records = tally_team_records(&games, 2024);
        records.sort_by(|a, b| a.team.cmp(&b.team));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].team, "Lakers");
        assert_eq!((records[0].wins, records[0].losses), (1, 1));
        assert_eq!(records[1].team, "Warriors");
        assert_eq!((records[1].wins, records[1].losses), (1, 1));
        assert_eq!(records[0].season, 2024);
    }
}
