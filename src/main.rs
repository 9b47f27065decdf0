use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kvseed::args::{Args, Command};
use kvseed::backend::Backend;
use kvseed::loader;
use kvseed::memory::MemoryStore;
use kvseed::queries;
use kvseed::store::{Store, UserFilter};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    let runtime = configure_runtime()?;
    runtime.block_on(run(args))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn configure_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building runtime")
}

async fn run(args: Args) -> Result<()> {
    match args.backend {
        #[cfg(feature = "redis")]
        Backend::Redis => {
            let settings = kvseed::redis::ConnectionSettings {
                host: args.host.clone(),
                port: args.port,
                db: args.db,
                username: args.username.clone(),
                password: args.password.clone(),
            };
            let store = kvseed::redis::RedisStore::connect(&settings).await?;
            store.ping().await.context("store did not answer ping")?;
            dispatch(&store, &args).await
        }
        Backend::Memory => dispatch(&MemoryStore::default(), &args).await,
    }
}

async fn dispatch<S: Store>(store: &S, args: &Args) -> Result<()> {
    match args.command {
        Command::LoadUsers => {
            let report = loader::load_users(store, &args.users_file, args.batch_size).await?;
            println!("{}", report);
        }
        Command::LoadScores => {
            let report = loader::load_scores(store, &args.scores_file, args.batch_size).await?;
            println!("{}", report);
        }
        Command::Profile => {
            let fields = queries::user_profile(store, required_user_id(args)?).await?;
            for (field, value) in fields {
                println!("{}: {}", field, value);
            }
        }
        Command::Coordinates => {
            let coords = queries::user_coordinates(store, required_user_id(args)?).await?;
            println!("{}", serde_json::to_string(&coords)?);
        }
        Command::EvenIds => {
            for (key, last_name) in queries::even_id_last_names(store).await? {
                println!("{} {}", key, last_name);
            }
        }
        Command::Search => {
            let filter = UserFilter {
                gender: Some(args.gender.clone()),
                countries: args.countries.clone(),
                latitude: Some(args.lat_min..=args.lat_max),
            };
            for hit in queries::search_profiles(store, &filter).await? {
                println!("{}", serde_json::to_string(&hit)?);
            }
        }
        Command::TopPlayers => {
            for email in queries::top_player_emails(store, &args.leaderboard, args.top).await? {
                println!("{}", email);
            }
        }
    }
    Ok(())
}

fn required_user_id(args: &Args) -> Result<&str> {
    args.user_id
        .as_deref()
        .context("--user-id is required for this command")
}
