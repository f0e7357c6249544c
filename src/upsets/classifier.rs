use chrono::Utc;
use thiserror::Error;

use crate::db::models::{GameResult, Upset, UpsetType};

/// Per-league configuration for the performance rule. Passing it at all is
/// what opts the rule in.
#[derive(Debug, Clone)]
pub struct LeagueConfig {
    /// Score margin at or below which a game counts as "closer than
    /// expected".
    pub close_game_margin: i32,
}

impl Default for LeagueConfig {
    fn default() -> Self {
        LeagueConfig {
            close_game_margin: 3,
        }
    }
}

/// Base value the score differential is subtracted from when computing the
/// performance rule's magnitude contribution.
const CLOSE_GAME_MAGNITUDE_BASE: f64 = 5.0;

/// Decimal odds above which the winner was, by definition, not the market
/// favorite. Flat across leagues.
const ODDS_UPSET_THRESHOLD: f64 = 2.0;

/// Flat magnitude contribution of the historical rule.
const HISTORICAL_MAGNITUDE: f64 = 3.0;

/// Validation failure on a classifier input. These are caller bugs, never
/// coerced or guessed around.
#[derive(Debug, Error, PartialEq)]
pub enum ClassifyError {
    #[error("team name must not be empty")]
    EmptyTeamName,
    #[error("home and away team are both '{0}'")]
    IdenticalTeams(String),
    #[error("negative score {score} for {team}")]
    NegativeScore { team: String, score: i32 },
}

/// Rule evaluation accumulator. Each rule runs in fixed priority order and
/// updates it the same way: the first rule to fire owns the type label, the
/// last rule to fire owns the reason, and magnitude is a running max over
/// every contribution.
#[derive(Debug, Default)]
struct Verdict {
    first_type: Option<UpsetType>,
    last_reason: Option<String>,
    magnitude: f64,
}

impl Verdict {
    fn record(&mut self, rule: UpsetType, reason: String, contribution: f64) {
        self.first_type.get_or_insert(rule);
        self.last_reason = Some(reason);
        self.magnitude = self.magnitude.max(contribution);
    }
}

/// Decide whether a finished game qualifies as an upset.
///
/// Pure and deterministic given its inputs, except that `game_date` and
/// `created_at` on the returned record use the evaluation clock. Returns
/// `Ok(None)` for ties and for games where no rule fires; returns an error
/// only for invalid inputs (empty/equal team names, negative scores).
///
/// Four rules are evaluated in fixed priority order — point spread, odds,
/// performance, historical. The performance rule is opt-in: it only runs when
/// a `league_config` is supplied.
pub fn classify(
    game: &GameResult,
    league_config: Option<&LeagueConfig>,
) -> Result<Option<Upset>, ClassifyError> {
    validate(game)?;

    // Tie: winner/loser are undefined, so classification is skipped entirely.
    if game.home_score == game.away_score {
        return Ok(None);
    }

    let home_won = game.home_score > game.away_score;
    let (winner, loser) = if home_won {
        (game.home_team.as_str(), game.away_team.as_str())
    } else {
        (game.away_team.as_str(), game.home_team.as_str())
    };
    let winner_score = game.home_score.max(game.away_score);
    let loser_score = game.home_score.min(game.away_score);

    let mut verdict = Verdict::default();

    // Rule 1: point spread. Note the sign convention quirk: a spread of
    // exactly 0 is handled by the "away favored" branch, so a home win at
    // 0 is not a spread upset but an away win at 0 is.
    if let Some(spread) = game.point_spread {
        if spread > 0.0 && !home_won {
            let margin = spread + f64::from(game.away_score - game.home_score);
            verdict.record(
                UpsetType::PointSpread,
                format!(
                    "Away team {} beat favored home team {} by {} points",
                    game.away_team, game.home_team, margin
                ),
                margin,
            );
        } else if spread <= 0.0 && home_won {
            let margin = spread.abs() + f64::from(game.home_score - game.away_score);
            verdict.record(
                UpsetType::PointSpread,
                format!(
                    "Home team {} beat favored away team {} by {} points",
                    game.home_team, game.away_team, margin
                ),
                margin,
            );
        }
    }

    // Rule 2: decimal odds quoted for the eventual winner. Fires regardless
    // of the spread outcome.
    if let Some(odds) = game.odds_before_game {
        if odds > ODDS_UPSET_THRESHOLD {
            verdict.record(
                UpsetType::Odds,
                format!("{} won with {:.1} odds", winner, odds),
                odds,
            );
        }
    }

    // Rule 3: performance — a game that was closer than expected. Opt-in per
    // call via league_config.
    if let Some(cfg) = league_config {
        let score_diff = winner_score - loser_score;
        if score_diff <= cfg.close_game_margin {
            verdict.record(
                UpsetType::Performance,
                format!("Close game with {} point differential", score_diff),
                (CLOSE_GAME_MAGNITUDE_BASE - f64::from(score_diff)).max(0.0),
            );
        }
    }

    // Rule 4: historical context flag from the caller.
    if game
        .context
        .as_ref()
        .is_some_and(|c| c.historical_significant)
    {
        verdict.record(
            UpsetType::Historical,
            "Historical context suggests this was an upset.".to_string(),
            HISTORICAL_MAGNITUDE,
        );
    }

    let Some(upset_type) = verdict.first_type else {
        return Ok(None);
    };
    let upset_reason = verdict
        .last_reason
        .unwrap_or_default();

    let context = game.context.clone().unwrap_or_default();
    let now = Utc::now();
    Ok(Some(Upset {
        id: None,
        league: game.league,
        game_date: now.date_naive(),
        home_team: game.home_team.clone(),
        away_team: game.away_team.clone(),
        home_score: game.home_score,
        away_score: game.away_score,
        winner: winner.to_string(),
        loser: loser.to_string(),
        upset_type,
        upset_reason,
        point_spread: game.point_spread,
        odds_before_game: game.odds_before_game,
        upset_magnitude: verdict.magnitude,
        venue: context.venue,
        weather: context.weather,
        attendance: context.attendance,
        broadcast_network: context.broadcast_network,
        quarter: context.quarter,
        time_remaining: context.time_remaining,
        created_at: now,
    }))
}

fn validate(game: &GameResult) -> Result<(), ClassifyError> {
    let home = game.home_team.trim();
    let away = game.away_team.trim();
    if home.is_empty() || away.is_empty() {
        return Err(ClassifyError::EmptyTeamName);
    }
    if home == away {
        return Err(ClassifyError::IdenticalTeams(home.to_string()));
    }
    if game.home_score < 0 {
        return Err(ClassifyError::NegativeScore {
            team: game.home_team.clone(),
            score: game.home_score,
        });
    }
    if game.away_score < 0 {
        return Err(ClassifyError::NegativeScore {
            team: game.away_team.clone(),
            score: game.away_score,
        });
    }
    Ok(())
}
