use anyhow::Result;
use rusqlite::{params, Connection};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub mod models;
use models::*;

use crate::upsets::UpsetStats;

/// Thread-safe SQLite handle (single connection with mutex).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Upsets (append-only) ─────────────────────────────────────────────────

    /// Append an upset record. Upsets are never updated or deleted here;
    /// corrections are new inserts.
    pub fn insert_upset(&self, upset: &Upset) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO upsets (
                league, game_date, home_team, away_team, home_score, away_score,
                winner, loser, upset_type, upset_reason, point_spread,
                odds_before_game, upset_magnitude, venue, weather, attendance,
                broadcast_network, quarter, time_remaining, created_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)",
            params![
                upset.league.as_str(),
                upset.game_date,
                upset.home_team,
                upset.away_team,
                upset.home_score,
                upset.away_score,
                upset.winner,
                upset.loser,
                upset.upset_type.as_str(),
                upset.upset_reason,
                upset.point_spread,
                upset.odds_before_game,
                upset.upset_magnitude,
                upset.venue,
                upset.weather,
                upset.attendance,
                upset.broadcast_network,
                upset.quarter,
                upset.time_remaining,
                upset.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent upsets ordered by game date, then creation time, both
    /// descending. Optionally filtered by league.
    pub fn recent_upsets(&self, league: Option<League>, limit: i64) -> Result<Vec<Upset>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id, league, game_date, home_team, away_team, home_score, away_score,
                    winner, loser, upset_type, upset_reason, point_spread,
                    odds_before_game, upset_magnitude, venue, weather, attendance,
                    broadcast_network, quarter, time_remaining, created_at
             FROM upsets
             {}
             ORDER BY game_date DESC, created_at DESC LIMIT ?1",
            league_clause(league, "WHERE")
        );
        let mut stmt = conn.prepare(&sql)?;
        let upsets = stmt
            .query_map(params![limit], map_upset)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(upsets)
    }

    /// Aggregate upset statistics, matching the in-memory aggregator's
    /// contract: zeroed stats on an empty (filtered) table.
    pub fn upset_stats(&self, league: Option<League>) -> Result<UpsetStats> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT
                COUNT(*),
                COUNT(DISTINCT winner),
                COALESCE(AVG(upset_magnitude), 0),
                COALESCE(MAX(upset_magnitude), 0),
                COUNT(CASE WHEN upset_type = 'point_spread' THEN 1 END),
                COUNT(CASE WHEN upset_type = 'odds' THEN 1 END),
                COUNT(CASE WHEN upset_type = 'performance' THEN 1 END),
                COUNT(CASE WHEN upset_type = 'historical' THEN 1 END)
             FROM upsets {}",
            league_clause(league, "WHERE")
        );
        let stats = conn.query_row(&sql, [], |row| {
            Ok(UpsetStats {
                total_upsets: row.get(0)?,
                unique_upset_teams: row.get(1)?,
                avg_magnitude: row.get(2)?,
                max_magnitude: row.get(3)?,
                spread_upsets: row.get(4)?,
                odds_upsets: row.get(5)?,
                performance_upsets: row.get(6)?,
                historical_upsets: row.get(7)?,
            })
        })?;
        Ok(stats)
    }

    // ── Players ──────────────────────────────────────────────────────────────

    /// Insert or replace player records.
    pub fn upsert_players(&self, players: &[Player]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for p in players {
            tx.execute(
                "INSERT OR REPLACE INTO players (
                    id, full_name, first_name, last_name, league, team, team_id,
                    position, jersey, nationality, birthdate, height_cm,
                    weight_kg, active, updated_at
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                params![
                    p.id,
                    p.full_name,
                    p.first_name,
                    p.last_name,
                    p.league.as_str(),
                    p.team,
                    p.team_id,
                    p.position,
                    p.jersey,
                    p.nationality,
                    p.birthdate,
                    p.height_cm,
                    p.weight_kg,
                    p.active,
                    p.updated_at,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn count_players(&self, league: Option<League>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT COUNT(*) FROM players {}",
            league_clause(league, "WHERE")
        );
        let count = conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(count)
    }

    // ── Injuries ─────────────────────────────────────────────────────────────

    pub fn insert_injury(&self, injury: &Injury) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO injuries (
                player_name, league, team, description, severity, active, reported_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                injury.player_name,
                injury.league.as_str(),
                injury.team,
                injury.description,
                injury.severity,
                injury.active,
                injury.reported_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn active_injuries(&self, league: Option<League>) -> Result<Vec<Injury>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id, player_name, league, team, description, severity, active, reported_at
             FROM injuries WHERE active = 1 {}
             ORDER BY reported_at DESC",
            league_clause(league, "AND")
        );
        let mut stmt = conn.prepare(&sql)?;
        let injuries = stmt
            .query_map([], map_injury)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(injuries)
    }

    // ── Team records ─────────────────────────────────────────────────────────

    pub fn upsert_team_record(&self, record: &TeamRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO team_records (league, team, season, wins, losses, ties, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7)
             ON CONFLICT(league, team, season) DO UPDATE SET
                wins=excluded.wins,
                losses=excluded.losses,
                ties=excluded.ties,
                updated_at=excluded.updated_at",
            params![
                record.league.as_str(),
                record.team,
                record.season,
                record.wins,
                record.losses,
                record.ties,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn team_records(&self, league: League) -> Result<Vec<TeamRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT league, team, season, wins, losses, ties, updated_at
             FROM team_records WHERE league = ?1 ORDER BY wins DESC",
        )?;
        let records = stmt
            .query_map(params![league.as_str()], map_team_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

/// Optional league filter clause. `prefix` is "WHERE" or "AND" depending on
/// where the clause lands in the statement.
fn league_clause(league: Option<League>, prefix: &str) -> String {
    match league {
        Some(l) => format!("{} league = '{}'", prefix, l.as_str()),
        None => String::new(),
    }
}

/// Parse a TEXT column into an enum, surfacing bad stored values as a
/// conversion failure instead of a panic.
fn parse_text_column<T>(idx: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_upset(row: &rusqlite::Row) -> rusqlite::Result<Upset> {
    Ok(Upset {
        id: row.get(0)?,
        league: parse_text_column(1, row.get::<_, String>(1)?)?,
        game_date: row.get(2)?,
        home_team: row.get(3)?,
        away_team: row.get(4)?,
        home_score: row.get(5)?,
        away_score: row.get(6)?,
        winner: row.get(7)?,
        loser: row.get(8)?,
        upset_type: parse_text_column(9, row.get::<_, String>(9)?)?,
        upset_reason: row.get(10)?,
        point_spread: row.get(11)?,
        odds_before_game: row.get(12)?,
        upset_magnitude: row.get(13)?,
        venue: row.get(14)?,
        weather: row.get(15)?,
        attendance: row.get(16)?,
        broadcast_network: row.get(17)?,
        quarter: row.get(18)?,
        time_remaining: row.get(19)?,
        created_at: row.get(20)?,
    })
}

fn map_injury(row: &rusqlite::Row) -> rusqlite::Result<Injury> {
    Ok(Injury {
        id: row.get(0)?,
        player_name: row.get(1)?,
        league: parse_text_column(2, row.get::<_, String>(2)?)?,
        team: row.get(3)?,
        description: row.get(4)?,
        severity: row.get(5)?,
        active: row.get(6)?,
        reported_at: row.get(7)?,
    })
}

fn map_team_record(row: &rusqlite::Row) -> rusqlite::Result<TeamRecord> {
    Ok(TeamRecord {
        league: parse_text_column(0, row.get::<_, String>(0)?)?,
        team: row.get(1)?,
        season: row.get(2)?,
        wins: row.get(3)?,
        losses: row.get(4)?,
        ties: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS players (
    id          TEXT PRIMARY KEY,
    full_name   TEXT NOT NULL,
    first_name  TEXT,
    last_name   TEXT,
    league      TEXT NOT NULL,
    team        TEXT,
    team_id     TEXT,
    position    TEXT,
    jersey      TEXT,
    nationality TEXT,
    birthdate   TEXT,
    height_cm   REAL,
    weight_kg   REAL,
    active      INTEGER NOT NULL DEFAULT 1,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS upsets (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    league            TEXT    NOT NULL,
    game_date         TEXT    NOT NULL,
    home_team         TEXT    NOT NULL,
    away_team         TEXT    NOT NULL,
    home_score        INTEGER NOT NULL,
    away_score        INTEGER NOT NULL,
    winner            TEXT    NOT NULL,
    loser             TEXT    NOT NULL,
    upset_type        TEXT    NOT NULL,
    upset_reason      TEXT    NOT NULL,
    point_spread      REAL,
    odds_before_game  REAL,
    upset_magnitude   REAL    NOT NULL,
    venue             TEXT,
    weather           TEXT,
    attendance        INTEGER,
    broadcast_network TEXT,
    quarter           TEXT,
    time_remaining    TEXT,
    created_at        TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS injuries (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    player_name TEXT    NOT NULL,
    league      TEXT    NOT NULL,
    team        TEXT,
    description TEXT,
    severity    TEXT,
    active      INTEGER NOT NULL DEFAULT 1,
    reported_at TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS team_records (
    league     TEXT    NOT NULL,
    team       TEXT    NOT NULL,
    season     INTEGER NOT NULL,
    wins       INTEGER NOT NULL,
    losses     INTEGER NOT NULL,
    ties       INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT    NOT NULL,
    PRIMARY KEY (league, team, season)
);

CREATE INDEX IF NOT EXISTS idx_upsets_league ON upsets(league);
CREATE INDEX IF NOT EXISTS idx_upsets_date ON upsets(game_date);
CREATE INDEX IF NOT EXISTS idx_upsets_winner ON upsets(winner);
CREATE INDEX IF NOT EXISTS idx_injuries_league ON injuries(league);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upsets::aggregator;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn test_db() -> Database {
        Database::open(":memory:").unwrap()
    }

    fn upset(league: League, winner: &str, upset_type: UpsetType, magnitude: f64) -> Upset {
        Upset {
            id: None,
            league,
            game_date: NaiveDate::from_ymd_opt(2024, 11, 3).unwrap(),
            home_team: "Home".into(),
            away_team: winner.into(),
            home_score: 90,
            away_score: 100,
            winner: winner.into(),
            loser: "Home".into(),
            upset_type,
            upset_reason: "test".into(),
            point_spread: Some(4.5),
            odds_before_game: None,
            upset_magnitude: magnitude,
            venue: Some("Arena".into()),
            weather: None,
            attendance: None,
            broadcast_network: None,
            quarter: None,
            time_remaining: None,
            created_at: Utc.with_ymd_and_hms(2024, 11, 3, 23, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_insert_and_read_back_round_trip() {
        let db = test_db();
        let original = upset(League::Nba, "Warriors", UpsetType::PointSpread, 22.5);
        let id = db.insert_upset(&original).unwrap();
        assert!(id > 0);

        let stored = db.recent_upsets(None, 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, Some(id));
        assert_eq!(stored[0].league, League::Nba);
        assert_eq!(stored[0].upset_type, UpsetType::PointSpread);
        assert_eq!(stored[0].venue.as_deref(), Some("Arena"));
        assert_relative_eq!(stored[0].upset_magnitude, 22.5, epsilon = 1e-9);
    }

    #[test]
    fn test_recent_upsets_ordering_and_limit() {
        let db = test_db();
        let mut older = upset(League::Nba, "A", UpsetType::PointSpread, 1.0);
        older.game_date = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        let newer = upset(League::Nba, "B", UpsetType::PointSpread, 1.0);
        let mut newest = upset(League::Nba, "C", UpsetType::PointSpread, 1.0);
        newest.created_at = newer.created_at + Duration::minutes(5);

        // Insert out of order; reads must not depend on storage order.
        db.insert_upset(&newest).unwrap();
        db.insert_upset(&older).unwrap();
        db.insert_upset(&newer).unwrap();

        let out = db.recent_upsets(None, 2).unwrap();
        let winners: Vec<&str> = out.iter().map(|u| u.winner.as_str()).collect();
        assert_eq!(winners, vec!["C", "B"]);
    }

    #[test]
    fn test_recent_upsets_league_filter() {
        let db = test_db();
        db.insert_upset(&upset(League::Nba, "A", UpsetType::PointSpread, 1.0))
            .unwrap();
        db.insert_upset(&upset(League::Mlb, "B", UpsetType::Odds, 2.5))
            .unwrap();
        let out = db.recent_upsets(Some(League::Mlb), 10).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].winner, "B");
    }

    #[test]
    fn test_upset_stats_empty_table() {
        let db = test_db();
        let s = db.upset_stats(None).unwrap();
        assert_eq!(s.total_upsets, 0);
        assert_relative_eq!(s.avg_magnitude, 0.0, epsilon = 1e-9);
        assert_relative_eq!(s.max_magnitude, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_upset_stats_matches_in_memory_aggregator() {
        let db = test_db();
        let records = vec![
            upset(League::Nba, "Warriors", UpsetType::PointSpread, 22.5),
            upset(League::Nba, "Hornets", UpsetType::Odds, 4.1),
            upset(League::Nba, "Warriors", UpsetType::Performance, 3.0),
            upset(League::Mlb, "Orioles", UpsetType::Historical, 3.0),
        ];
        for u in &records {
            db.insert_upset(u).unwrap();
        }

        for league in [None, Some(League::Nba), Some(League::Nhl)] {
            let sql_stats = db.upset_stats(league).unwrap();
            let mem_stats = aggregator::stats(&records, league);
            assert_eq!(sql_stats.total_upsets, mem_stats.total_upsets);
            assert_eq!(sql_stats.unique_upset_teams, mem_stats.unique_upset_teams);
            assert_eq!(sql_stats.spread_upsets, mem_stats.spread_upsets);
            assert_eq!(sql_stats.odds_upsets, mem_stats.odds_upsets);
            assert_eq!(sql_stats.performance_upsets, mem_stats.performance_upsets);
            assert_eq!(sql_stats.historical_upsets, mem_stats.historical_upsets);
            assert_relative_eq!(sql_stats.avg_magnitude, mem_stats.avg_magnitude, epsilon = 1e-9);
            assert_relative_eq!(sql_stats.max_magnitude, mem_stats.max_magnitude, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_upsert_players_replaces_on_same_id() {
        let db = test_db();
        let mut player = Player {
            id: "thesportsdb:1".into(),
            full_name: "Test Player".into(),
            first_name: None,
            last_name: None,
            league: League::Nfl,
            team: Some("Giants".into()),
            team_id: None,
            position: Some("QB".into()),
            jersey: None,
            nationality: None,
            birthdate: None,
            height_cm: Some(190.0),
            weight_kg: None,
            active: true,
            updated_at: Utc::now(),
        };
        db.upsert_players(std::slice::from_ref(&player)).unwrap();
        player.team = Some("Jets".into());
        db.upsert_players(std::slice::from_ref(&player)).unwrap();
        assert_eq!(db.count_players(Some(League::Nfl)).unwrap(), 1);
    }

    #[test]
    fn test_injury_insert_and_active_filter() {
        let db = test_db();
        let injury = Injury {
            id: None,
            player_name: "Test Player".into(),
            league: League::Nhl,
            team: Some("Sabres".into()),
            description: Some("upper body".into()),
            severity: Some("out".into()),
            active: true,
            reported_at: Utc::now(),
        };
        db.insert_injury(&injury).unwrap();
        let mut healed = injury.clone();
        healed.player_name = "Other Player".into();
        healed.active = false;
        db.insert_injury(&healed).unwrap();

        let active = db.active_injuries(Some(League::Nhl)).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].player_name, "Test Player");
    }

    #[test]
    fn test_team_record_upsert_updates_in_place() {
        let db = test_db();
        let mut record = TeamRecord {
            league: League::Mlb,
            team: "Orioles".into(),
            season: 2024,
            wins: 88,
            losses: 70,
            ties: 0,
            updated_at: Utc::now(),
        };
        db.upsert_team_record(&record).unwrap();
        record.wins = 89;
        db.upsert_team_record(&record).unwrap();

        let records = db.team_records(League::Mlb).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].wins, 89);
    }
}
