//! One-shot cycle runner for an external scheduler (cron). Exits non-zero
//! when any source pipeline failed, so the scheduler can alert.

use anyhow::Result;
use clap::Parser;
use outbreakbot::engine::Engine;
use outbreakbot::{config, db};
use std::path::PathBuf;
use teloxide::Bot;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/outbreakbot.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let engine = Engine::from_config(&cfg, pool, bot)?;

    let report = engine.run_cycle().await;
    if report.failed_sources.is_empty() {
        info!("cycle completed");
        Ok(())
    } else {
        error!(sources = ?report.failed_sources, "cycle completed with failures");
        std::process::exit(1);
    }
}
