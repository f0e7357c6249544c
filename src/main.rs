use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Parser;
use std::path::Path;
use tracing::info;

mod config;
mod db;
mod export;
mod pipeline;
mod providers;
mod upsets;

use config::{Command, Config};
use db::models::League;
use db::Database;
use pipeline::Pipeline;
use providers::Source;
use upsets::UpsetStats;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let pipeline = Pipeline::new(
        db.clone(),
        config.thesportsdb_api_key.clone(),
        config.request_delay_ms,
    );
    let export_dir = Path::new(&config.export_dir);

    match &config.command {
        Command::Fetch {
            league,
            season,
            source,
            include_upsets,
            include_injuries,
        } => {
            let source: Source = source.parse().map_err(anyhow::Error::from)?;
            let leagues = resolve_leagues(league.as_deref())?;

            let mut total_players = 0;
            for lg in &leagues {
                let players = pipeline.ingest_players(*lg, *season, source).await?;
                total_players += players.len();
                if let Some(path) = export::export_players_csv(&players, export_dir, *lg)? {
                    println!(
                        "[result] Saved {} {} players to {}",
                        players.len(),
                        lg.tag(),
                        path.display()
                    );
                }
            }
            println!("[summary] Total players processed: {}", total_players);

            if *include_upsets {
                let one_league = single_league(league.as_deref())?;
                run_upset_detection(&pipeline, one_league, *season, export_dir).await?;
            }
            if *include_injuries {
                let count = pipeline
                    .ingest_injuries(single_league(league.as_deref())?)
                    .await?;
                println!("[result] Processed {} injuries", count);
            }
        }

        Command::Upsets {
            league,
            season,
            show_stats,
        } => {
            let league = single_league(league.as_deref())?;
            run_upset_detection(&pipeline, league, *season, export_dir).await?;
            if *show_stats {
                print_stats(&db.upset_stats(league)?, league);
            }
        }

        Command::Recent {
            league,
            limit,
            format,
        } => {
            let league = single_league(league.as_deref())?;
            let upsets = db.recent_upsets(league, *limit)?;
            if upsets.is_empty() {
                println!("No upsets recorded yet.");
                return Ok(());
            }
            match format.as_str() {
                "json" => println!("{}", export::upsets_to_json(&upsets)?),
                "csv" => {
                    if let Some(path) = export::export_upsets_csv(&upsets, export_dir, league)? {
                        println!("Exported to: {}", path.display());
                    }
                }
                _ => {
                    println!("Recent Upsets ({} found):", upsets.len());
                    for upset in &upsets {
                        println!("  {}", upset.summary());
                    }
                }
            }
        }

        Command::Stats { league } => {
            let league = single_league(league.as_deref())?;
            print_stats(&db.upset_stats(league)?, league);
            println!("Players Tracked: {}", db.count_players(league)?);
            println!("Active Injuries: {}", db.active_injuries(league)?.len());
            if let Some(l) = league {
                println!("Teams Tracked: {}", db.team_records(l)?.len());
            }
        }
    }

    Ok(())
}

async fn run_upset_detection(
    pipeline: &Pipeline,
    league: Option<League>,
    season: Option<i32>,
    export_dir: &Path,
) -> Result<()> {
    let season = season.unwrap_or_else(|| chrono::Utc::now().year());
    let run = pipeline.detect_upsets(league, season).await?;
    if run.upsets.is_empty() {
        println!(
            "[result] No new upsets detected ({} games checked)",
            run.games_checked
        );
        return Ok(());
    }
    let path = export::export_upsets_csv(&run.upsets, export_dir, league)?;
    match path {
        Some(p) => println!(
            "[result] Detected {} upsets across {} games, saved to {}",
            run.upsets.len(),
            run.games_checked,
            p.display()
        ),
        None => println!("[result] Detected {} upsets", run.upsets.len()),
    }
    Ok(())
}

fn print_stats(stats: &UpsetStats, league: Option<League>) {
    match league {
        Some(l) => println!("\n=== Upset Statistics ({}) ===", l.tag()),
        None => println!("\n=== Upset Statistics (All Leagues) ==="),
    }
    println!("Total Upsets: {}", stats.total_upsets);
    println!("Unique Upset Teams: {}", stats.unique_upset_teams);
    println!("Average Magnitude: {:.2}", stats.avg_magnitude);
    println!("Max Magnitude: {:.2}", stats.max_magnitude);
    println!("Spread Upsets: {}", stats.spread_upsets);
    println!("Odds Upsets: {}", stats.odds_upsets);
    println!("Performance Upsets: {}", stats.performance_upsets);
    println!("Historical Upsets: {}", stats.historical_upsets);
}

/// Parse an optional league flag into the set of leagues to process.
fn resolve_leagues(league: Option<&str>) -> Result<Vec<League>> {
    match league {
        Some(s) => {
            let league: League = s.parse().map_err(anyhow::Error::from)?;
            Ok(vec![league])
        }
        None => Ok(League::ALL.to_vec()),
    }
}

fn single_league(league: Option<&str>) -> Result<Option<League>> {
    league
        .map(|s| s.parse::<League>().map_err(anyhow::Error::from))
        .transpose()
        .context("invalid --league")
}
