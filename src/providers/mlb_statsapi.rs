use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::SportsDataProvider;
use crate::db::models::{CompletedGame, Injury, League, Player};

/// Legacy MLB provider backed by the public MLB Stats API.
/// Docs: <https://statsapi.mlb.com/api/v1>
pub struct MlbStatsApi {
    http: Client,
    /// Base URL for overriding in tests
    base_url: String,
    request_delay: Duration,
}

impl MlbStatsApi {
    pub fn new(base_url: Option<&str>, request_delay_ms: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(MlbStatsApi {
            http,
            base_url: base_url
                .unwrap_or("https://statsapi.mlb.com/api/v1")
                .to_string(),
            request_delay: Duration::from_millis(request_delay_ms),
        })
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {}", url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("MLB Stats API request failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("MLB Stats API error: {}", resp.status());
        }
        let raw = resp
            .json()
            .await
            .context("Failed to parse MLB Stats API response")?;
        Ok(raw)
    }
}

#[async_trait]
impl SportsDataProvider for MlbStatsApi {
    fn name(&self) -> &str {
        "MLB-StatsAPI"
    }

    async fn fetch_players(&self, league: League, _season: Option<i32>) -> Result<Vec<Player>> {
        if league != League::Mlb {
            anyhow::bail!("MLB Stats API only serves MLB, got {}", league);
        }

        let teams_raw = self.get_json("teams?sportId=1").await?;
        let teams = parse_active_teams(&teams_raw);

        let mut players = Vec::new();
        for (team_id, team_name) in teams {
            let roster_raw = self
                .get_json(&format!("teams/{}/roster", team_id))
                .await?;
            players.extend(parse_roster(&roster_raw, team_id, &team_name));
            tokio::time::sleep(self.request_delay).await;
        }
        Ok(players)
    }

    async fn fetch_completed_games(
        &self,
        league: League,
        _season: i32,
    ) -> Result<Vec<CompletedGame>> {
        if league != League::Mlb {
            anyhow::bail!("MLB Stats API only serves MLB, got {}", league);
        }
        let raw = self.get_json("schedule?sportId=1").await?;
        Ok(parse_schedule(&raw))
    }

    async fn fetch_injuries(&self, league: League) -> Result<Vec<Injury>> {
        warn!("Injury data not available from MLB Stats API for {}", league);
        Ok(vec![])
    }
}

fn parse_active_teams(raw: &serde_json::Value) -> Vec<(i64, String)> {
    let Some(teams) = raw["teams"].as_array() else {
        return vec![];
    };
    teams
        .iter()
        .filter(|t| t["active"].as_bool().unwrap_or(false))
        .filter_map(|t| Some((t["id"].as_i64()?, t["name"].as_str()?.to_string())))
        .collect()
}

fn parse_roster(raw: &serde_json::Value, team_id: i64, team_name: &str) -> Vec<Player> {
    let Some(roster) = raw["roster"].as_array() else {
        return vec![];
    };
    roster
        .iter()
        .filter_map(|r| {
            let person = &r["person"];
            let pid = person["id"].as_i64()?;
            let full_name = person["fullName"].as_str()?.to_string();
            Some(Player {
                id: format!("mlb:{}", pid),
                full_name,
                first_name: None,
                last_name: None,
                league: League::Mlb,
                team: Some(team_name.to_string()),
                team_id: Some(team_id.to_string()),
                position: r["position"]["abbreviation"].as_str().map(str::to_string),
                jersey: r["jerseyNumber"]
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                nationality: None,
                birthdate: None,
                height_cm: None,
                weight_kg: None,
                active: true,
                updated_at: Utc::now(),
            })
        })
        .collect()
}

fn parse_schedule(raw: &serde_json::Value) -> Vec<CompletedGame> {
    let Some(dates) = raw["dates"].as_array() else {
        return vec![];
    };

    let mut games = Vec::new();
    for date in dates {
        let game_date = date["date"]
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
        let Some(day_games) = date["games"].as_array() else {
            continue;
        };
        for game in day_games {
            let finished = game["status"]["statusCode"].as_str() == Some("F");
            let Some(game_pk) = game["gamePk"].as_i64() else {
                continue;
            };
            let Some(home_team) = game["teams"]["home"]["team"]["name"].as_str() else {
                continue;
            };
            let Some(away_team) = game["teams"]["away"]["team"]["name"].as_str() else {
                continue;
            };
            games.push(CompletedGame {
                event_id: format!("mlb:{}", game_pk),
                league: League::Mlb,
                game_date,
                home_team: home_team.to_string(),
                away_team: away_team.to_string(),
                home_score: game["teams"]["home"]["score"].as_i64().map(|s| s as i32),
                away_score: game["teams"]["away"]["score"].as_i64().map(|s| s as i32),
                venue: game["venue"]["name"].as_str().map(str::to_string),
                finished,
            });
        }
    }
    games
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_active_teams_filters_inactive() {
        let raw = json!({
            "teams": [
                { "id": 110, "name": "Baltimore Orioles", "active": true },
                { "id": 999, "name": "Defunct Club", "active": false }
            ]
        });
        let teams = parse_active_teams(&raw);
        assert_eq!(teams, vec![(110, "Baltimore Orioles".to_string())]);
    }

    #[test]
    fn test_parse_roster() {
        let raw = json!({
            "roster": [{
                "person": { "id": 665489, "fullName": "Gunnar Henderson" },
                "jerseyNumber": "2",
                "position": { "abbreviation": "SS" }
            }]
        });
        let players = parse_roster(&raw, 110, "Baltimore Orioles");
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, "mlb:665489");
        assert_eq!(players[0].position.as_deref(), Some("SS"));
        assert_eq!(players[0].team.as_deref(), Some("Baltimore Orioles"));
    }

    #[test]
    fn test_parse_schedule_final_and_scheduled() {
        let raw = json!({
            "dates": [{
                "date": "2024-06-10",
                "games": [
                    {
                        "gamePk": 745804,
                        "status": { "statusCode": "F" },
                        "venue": { "name": "Yankee Stadium" },
                        "teams": {
                            "home": { "team": { "name": "New York Yankees" }, "score": 2 },
                            "away": { "team": { "name": "Baltimore Orioles" }, "score": 8 }
                        }
                    },
                    {
                        "gamePk": 745805,
                        "status": { "statusCode": "S" },
                        "teams": {
                            "home": { "team": { "name": "Boston Red Sox" } },
                            "away": { "team": { "name": "Tampa Bay Rays" } }
                        }
                    }
                ]
            }]
        });
        let games = parse_schedule(&raw);
        assert_eq!(games.len(), 2);
        assert!(games[0].finished);
        assert_eq!(games[0].home_score, Some(2));
        assert_eq!(games[0].away_score, Some(8));
        assert_eq!(games[0].venue.as_deref(), Some("Yankee Stadium"));
        assert!(!games[1].finished);
        assert_eq!(games[1].home_score, None);
    }
}
