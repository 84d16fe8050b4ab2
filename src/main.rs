mod app;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use review_scheduler::config::CONFIG_FILE_NAME;
use review_scheduler::database::{SqliteStore, StoredClock};
use review_scheduler::export::json::load_catalog;
use review_scheduler::models::{Catalog, LearnerId};
use review_scheduler::{ReviewEngine, SchedulerConfig};

use app::{App, Command};

#[derive(Parser)]
#[command(name = "review-scheduler")]
#[command(about = "Spaced repetition reviews for Korean lessons")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Learner to act as (overrides the config file)
    #[arg(long)]
    learner: Option<String>,

    #[command(subcommand)]
    command: Command,
}

fn load_catalog_or_sample(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => load_catalog(path)
            .with_context(|| format!("loading catalog from {}", path.display())),
        None => Ok(Catalog::sample()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let mut config = SchedulerConfig::load(&config_path)?;
    if let Some(learner) = cli.learner {
        config.learner_id = learner;
    }
    config.validate()?;

    let store = Arc::new(
        SqliteStore::open(&config.database_path)
            .with_context(|| format!("opening {}", config.database_path.display()))?,
    );
    let clock = Arc::new(StoredClock::new(&store));
    let catalog = load_catalog_or_sample(config.catalog_path.as_deref())?;
    tracing::debug!(
        database = %config.database_path.display(),
        learner = %config.learner_id,
        items = catalog.keys().count(),
        "loaded"
    );

    let engine = Arc::new(ReviewEngine::new(store.clone(), clock, &config));
    let app = App::new(
        engine,
        store,
        catalog,
        LearnerId::new(config.learner_id.clone()),
        config.max_write_attempts,
    );
    app.run(cli.command)
}
