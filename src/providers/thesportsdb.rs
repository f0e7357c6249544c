use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::SportsDataProvider;
use crate::db::models::{CompletedGame, Injury, League, Player};

/// Data provider backed by TheSportsDB v1 API.
/// Docs: <https://www.thesportsdb.com/api.php>
pub struct TheSportsDb {
    http: Client,
    api_key: String,
    /// Base URL for overriding in tests
    base_url: String,
    request_delay: Duration,
}

impl TheSportsDb {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>, request_delay_ms: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(TheSportsDb {
            http,
            // "3" is TheSportsDB's public free-tier key; replace with a paid key for higher limits
            api_key: api_key.unwrap_or("3").to_string(),
            base_url: base_url
                .unwrap_or("https://www.thesportsdb.com/api/v1/json")
                .to_string(),
            request_delay: Duration::from_millis(request_delay_ms),
        })
    }

    /// TheSportsDB numeric league IDs.
    fn league_id(league: League) -> &'static str {
        match league {
            League::Nfl => "4391",
            League::Nba => "4387",
            League::Mlb => "4424",
            League::Nhl => "4380",
        }
    }

    /// League name as used by the player search endpoint.
    fn league_param(league: League) -> &'static str {
        match league {
            League::Nfl => "American football_nfl",
            League::Nba => "Basketball_nba",
            League::Mlb => "Baseball_mlb",
            League::Nhl => "Ice hockey_nhl",
        }
    }

    /// NBA and NHL seasons span two calendar years in TheSportsDB's season
    /// identifiers; NFL and MLB use a single year.
    fn season_param(league: League, season: i32) -> String {
        match league {
            League::Nba | League::Nhl => format!("{}-{}", season, season + 1),
            League::Nfl | League::Mlb => season.to_string(),
        }
    }

    async fn get_json(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let url = format!("{}/{}/{}", self.base_url, self.api_key, endpoint);
        debug!("GET {} {:?}", url, query);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .context("TheSportsDB request failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("TheSportsDB error: {}", resp.status());
        }
        let raw = resp
            .json()
            .await
            .context("Failed to parse TheSportsDB response")?;
        Ok(raw)
    }
}

#[async_trait]
impl SportsDataProvider for TheSportsDb {
    fn name(&self) -> &str {
        "TheSportsDB"
    }

    async fn fetch_players(&self, league: League, _season: Option<i32>) -> Result<Vec<Player>> {
        let raw = self
            .get_json(
                "search_all_players.php",
                &[("l", Self::league_param(league))],
            )
            .await?;
        tokio::time::sleep(self.request_delay).await;
        Ok(parse_players_response(&raw, league))
    }

    async fn fetch_completed_games(
        &self,
        league: League,
        season: i32,
    ) -> Result<Vec<CompletedGame>> {
        let season_str = Self::season_param(league, season);
        let raw = self
            .get_json(
                "eventsseason.php",
                &[("id", Self::league_id(league)), ("s", season_str.as_str())],
            )
            .await?;
        tokio::time::sleep(self.request_delay).await;
        Ok(parse_season_events(&raw, league))
    }

    async fn fetch_injuries(&self, league: League) -> Result<Vec<Injury>> {
        // TheSportsDB has no injury feed on the free tier.
        warn!("Injury data not available from TheSportsDB for {}", league);
        Ok(vec![])
    }
}

fn parse_players_response(raw: &serde_json::Value, league: League) -> Vec<Player> {
    let Some(players) = raw["player"].as_array() else {
        return vec![];
    };

    players
        .iter()
        .filter_map(|p| {
            let id = p["idPlayer"].as_str()?;
            let full_name = p["strPlayer"].as_str()?.trim().to_string();
            if full_name.is_empty() {
                return None;
            }
            let mut parts = full_name.split_whitespace();
            let first_name = parts.next().map(str::to_string);
            let last_name = parts.next_back().map(str::to_string);

            Some(Player {
                id: format!("thesportsdb:{}", id),
                full_name,
                first_name,
                last_name,
                league,
                team: non_empty(p["strTeam"].as_str()),
                team_id: non_empty(p["idTeam"].as_str()),
                position: non_empty(p["strPosition"].as_str()),
                jersey: non_empty(p["strNumber"].as_str()),
                nationality: non_empty(p["strNationality"].as_str()),
                birthdate: non_empty(p["dateBorn"].as_str()),
                height_cm: None,
                weight_kg: None,
                active: true,
                updated_at: Utc::now(),
            })
        })
        .collect()
}

fn parse_season_events(raw: &serde_json::Value, league: League) -> Vec<CompletedGame> {
    let Some(events) = raw["events"].as_array() else {
        return vec![];
    };

    events
        .iter()
        .filter_map(|ev| {
            let event_id = ev["idEvent"].as_str()?.to_string();
            let home_team = ev["strHomeTeam"].as_str()?.to_string();
            let away_team = ev["strAwayTeam"].as_str()?.to_string();
            let home_score = parse_score(&ev["intHomeScore"]);
            let away_score = parse_score(&ev["intAwayScore"]);
            let game_date = ev["dateEvent"]
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            let finished = home_score.is_some() && away_score.is_some();

            Some(CompletedGame {
                event_id: format!("thesportsdb:{}", event_id),
                league,
                game_date,
                home_team,
                away_team,
                home_score,
                away_score,
                venue: non_empty(ev["strVenue"].as_str()),
                finished,
            })
        })
        .collect()
}

/// Scores come back as strings or numbers depending on the endpoint; unplayed
/// games report null or "".
fn parse_score(v: &serde_json::Value) -> Option<i32> {
    v.as_str()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .or_else(|| v.as_i64().map(|n| n as i32))
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_season_events_scored_and_unscored() {
        let raw = json!({
            "events": [
                {
                    "idEvent": "1032721",
                    "strHomeTeam": "Lakers",
                    "strAwayTeam": "Warriors",
                    "intHomeScore": "98",
                    "intAwayScore": "112",
                    "dateEvent": "2024-11-03",
                    "strVenue": "Crypto.com Arena"
                },
                {
                    "idEvent": "1032722",
                    "strHomeTeam": "Celtics",
                    "strAwayTeam": "Knicks",
                    "intHomeScore": null,
                    "intAwayScore": null,
                    "dateEvent": "2025-02-01",
                    "strVenue": ""
                }
            ]
        });
        let games = parse_season_events(&raw, League::Nba);
        assert_eq!(games.len(), 2);

        assert!(games[0].finished);
        assert_eq!(games[0].home_score, Some(98));
        assert_eq!(games[0].away_score, Some(112));
        assert_eq!(games[0].venue.as_deref(), Some("Crypto.com Arena"));
        assert_eq!(
            games[0].game_date,
            NaiveDate::from_ymd_opt(2024, 11, 3)
        );

        assert!(!games[1].finished);
        assert_eq!(games[1].home_score, None);
        assert_eq!(games[1].venue, None);
    }

    #[test]
    fn test_parse_season_events_numeric_scores() {
        let raw = json!({
            "events": [{
                "idEvent": "5",
                "strHomeTeam": "Sabres",
                "strAwayTeam": "Bruins",
                "intHomeScore": 3,
                "intAwayScore": 2,
                "dateEvent": "2024-10-10"
            }]
        });
        let games = parse_season_events(&raw, League::Nhl);
        assert_eq!(games[0].home_score, Some(3));
        assert_eq!(games[0].away_score, Some(2));
    }

    #[test]
    fn test_parse_season_events_missing_payload() {
        assert!(parse_season_events(&json!({"events": null}), League::Nfl).is_empty());
        assert!(parse_season_events(&json!({}), League::Nfl).is_empty());
    }

    #[test]
    fn test_parse_players_response() {
        let raw = json!({
            "player": [
                {
                    "idPlayer": "34146370",
                    "strPlayer": "Stephen Curry",
                    "strTeam": "Golden State Warriors",
                    "idTeam": "134865",
                    "strPosition": "Guard",
                    "strNumber": "30",
                    "strNationality": "United States",
                    "dateBorn": "1988-03-14"
                },
                { "idPlayer": "999", "strPlayer": "   " }
            ]
        });
        let players = parse_players_response(&raw, League::Nba);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, "thesportsdb:34146370");
        assert_eq!(players[0].first_name.as_deref(), Some("Stephen"));
        assert_eq!(players[0].last_name.as_deref(), Some("Curry"));
        assert_eq!(players[0].team.as_deref(), Some("Golden State Warriors"));
        assert_eq!(players[0].jersey.as_deref(), Some("30"));
    }

    #[test]
    fn test_season_param_formats() {
        assert_eq!(TheSportsDb::season_param(League::Nba, 2024), "2024-2025");
        assert_eq!(TheSportsDb::season_param(League::Nhl, 2024), "2024-2025");
        assert_eq!(TheSportsDb::season_param(League::Mlb, 2024), "2024");
        assert_eq!(TheSportsDb::season_param(League::Nfl, 2024), "2024");
    }
}
