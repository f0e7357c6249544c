use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::db::models::{League, Player, Upset};

/// CSV snapshot of upset records. Returns `None` when there is nothing to
/// write. File name is `{league}_upsets.csv`, or `all_upsets.csv` with no
/// league filter.
pub fn export_upsets_csv(
    upsets: &[Upset],
    out_dir: &Path,
    league: Option<League>,
) -> Result<Option<PathBuf>> {
    if upsets.is_empty() {
        return Ok(None);
    }
    let filename = match league {
        Some(l) => format!("{}_upsets.csv", l),
        None => "all_upsets.csv".to_string(),
    };
    let rows: Vec<Vec<String>> = upsets.iter().map(upset_row).collect();
    let path = write_csv(out_dir, &filename, &upset_header(), &rows)?;
    Ok(Some(path))
}

/// CSV snapshot of player records for one league.
pub fn export_players_csv(
    players: &[Player],
    out_dir: &Path,
    league: League,
) -> Result<Option<PathBuf>> {
    if players.is_empty() {
        return Ok(None);
    }
    let rows: Vec<Vec<String>> = players.iter().map(player_row).collect();
    let path = write_csv(
        out_dir,
        &format!("{}_players.csv", league),
        &player_header(),
        &rows,
    )?;
    Ok(Some(path))
}

/// Pretty-printed JSON for the CLI's `--format json` path.
pub fn upsets_to_json(upsets: &[Upset]) -> Result<String> {
    serde_json::to_string_pretty(upsets).context("Failed to serialize upsets")
}

fn write_csv(
    out_dir: &Path,
    filename: &str,
    header: &[String],
    rows: &[Vec<String>],
) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create export dir {}", out_dir.display()))?;
    let path = out_dir.join(filename);
    let mut buf: Vec<u8> = Vec::new();
    write_row(&mut buf, header)?;
    for row in rows {
        write_row(&mut buf, row)?;
    }
    fs::write(&path, buf).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single CSV row with minimal quoting.
fn write_row<W: Write>(mut w: W, row: &[String]) -> std::io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

fn opt_to_string<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn upset_header() -> Vec<String> {
    [
        "league",
        "game_date",
        "home_team",
        "away_team",
        "home_score",
        "away_score",
        "winner",
        "loser",
        "upset_type",
        "upset_reason",
        "point_spread",
        "odds_before_game",
        "upset_magnitude",
        "venue",
        "created_at",
    ]
    .map(String::from)
    .to_vec()
}

fn upset_row(u: &Upset) -> Vec<String> {
    vec![
        u.league.tag().to_string(),
        u.game_date.to_string(),
        u.home_team.clone(),
        u.away_team.clone(),
        u.home_score.to_string(),
        u.away_score.to_string(),
        u.winner.clone(),
        u.loser.clone(),
        u.upset_type.to_string(),
        u.upset_reason.clone(),
        opt_to_string(&u.point_spread),
        opt_to_string(&u.odds_before_game),
        u.upset_magnitude.to_string(),
        opt_to_string(&u.venue),
        u.created_at.to_rfc3339(),
    ]
}

fn player_header() -> Vec<String> {
    [
        "id",
        "full_name",
        "league",
        "team",
        "position",
        "jersey",
        "nationality",
        "birthdate",
        "active",
    ]
    .map(String::from)
    .to_vec()
}

fn player_row(p: &Player) -> Vec<String> {
    vec![
        p.id.clone(),
        p.full_name.clone(),
        p.league.tag().to_string(),
        opt_to_string(&p.team),
        opt_to_string(&p.position),
        opt_to_string(&p.jersey),
        opt_to_string(&p.nationality),
        opt_to_string(&p.birthdate),
        p.active.to_string(),
    ]
}
