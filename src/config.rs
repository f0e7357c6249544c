use clap::{Parser, Subcommand};

/// Sports data pipeline with rule-based upset detection
#[derive(Parser, Debug, Clone)]
#[command(name = "upset-pipeline", version, about)]
pub struct Config {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "sports_data.db")]
    pub database_path: String,

    /// Directory for CSV snapshots
    #[arg(long, env = "EXPORT_DIR", default_value = "exports")]
    pub export_dir: String,

    /// TheSportsDB API key (free-tier key used when unset)
    #[arg(long, env = "THESPORTSDB_API_KEY")]
    pub thesportsdb_api_key: Option<String>,

    /// Delay between consecutive provider requests, in milliseconds
    #[arg(long, env = "REQUEST_DELAY_MS", default_value = "200")]
    pub request_delay_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch and store player rosters
    Fetch {
        /// League to process (nfl, nba, mlb, nhl); all configured leagues when omitted
        #[arg(long, short = 'l')]
        league: Option<String>,

        /// Season year, e.g. 2024
        #[arg(long)]
        season: Option<i32>,

        /// Data source tier (primary, legacy)
        #[arg(long, short = 's', default_value = "primary")]
        source: String,

        /// Also run upset detection over completed games
        #[arg(long)]
        include_upsets: bool,

        /// Also fetch injury reports
        #[arg(long)]
        include_injuries: bool,
    },

    /// Detect and record upsets from completed games
    Upsets {
        #[arg(long, short = 'l')]
        league: Option<String>,

        /// Season year; defaults to the current year
        #[arg(long)]
        season: Option<i32>,

        /// Print upset statistics after the run
        #[arg(long)]
        show_stats: bool,
    },

    /// List the most recently recorded upsets
    Recent {
        #[arg(long, short = 'l')]
        league: Option<String>,

        #[arg(long, default_value = "10")]
        limit: i64,

        /// Output format (table, json, csv)
        #[arg(long, short = 'f', default_value = "table")]
        format: String,
    },

    /// Show upset statistics
    Stats {
        #[arg(long, short = 'l')]
        league: Option<String>,
    },
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_path.trim().is_empty() {
            anyhow::bail!("database_path must not be empty");
        }
        if self.request_delay_ms > 60_000 {
            anyhow::bail!("request_delay_ms must be at most 60000");
        }
        if let Command::Recent { limit, format, .. } = &self.command {
            if *limit <= 0 {
                anyhow::bail!("limit must be positive");
            }
            if !matches!(format.as_str(), "table" | "json" | "csv") {
                anyhow::bail!("format must be one of: table, json, csv");
            }
        }
        Ok(())
    }
}
