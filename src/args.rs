use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;

use crate::backend::Backend;
use crate::loader::DEFAULT_BATCH_SIZE;

#[derive(Parser, Debug)]
#[command(term_width = 0)]
pub struct Args {
    /// The operation to run
    #[arg(short, long)]
    pub command: Command,

    /// The storage backend to run against
    #[arg(short, long)]
    pub backend: Backend,

    /// User data file for load-users
    #[arg(long, default_value = "users.txt")]
    pub users_file: PathBuf,

    /// Score data file for load-scores
    #[arg(long, default_value = "userscores.csv")]
    pub scores_file: PathBuf,

    /// Records per pipelined write batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// User id for profile and coordinates
    #[arg(long)]
    pub user_id: Option<String>,

    /// Leaderboard name for top-players
    #[arg(long, default_value = "2")]
    pub leaderboard: String,

    /// Number of players for top-players
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Gender to search for
    #[arg(long, default_value = "female")]
    pub gender: String,

    /// Countries to search in (repeatable)
    #[arg(long = "country", default_values_t = vec!["China".to_string(), "Russia".to_string()])]
    pub countries: Vec<String>,

    /// Lower latitude bound for search
    #[arg(long, default_value = "40.0")]
    pub lat_min: f64,

    /// Upper latitude bound for search
    #[arg(long, default_value = "46.0")]
    pub lat_max: f64,

    /// Store host
    #[arg(long, env = "KVSEED_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Store port
    #[arg(long, env = "KVSEED_PORT", default_value = "6379")]
    pub port: u16,

    /// Store database index
    #[arg(long, env = "KVSEED_DB", default_value = "0")]
    pub db: i64,

    /// Store username
    #[arg(long, env = "KVSEED_USERNAME")]
    pub username: Option<String>,

    /// Store password
    #[arg(long, env = "KVSEED_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Bulk-load the user data file
    LoadUsers,
    /// Bulk-load the score CSV file
    LoadScores,
    /// All fields of one user
    Profile,
    /// Longitude/latitude of one user
    Coordinates,
    /// Keys and last names of users whose id starts with an even digit
    EvenIds,
    /// Indexed search over user profiles
    Search,
    /// Emails of a leaderboard's top players
    TopPlayers,
}
