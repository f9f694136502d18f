use anyhow::Result;
use clap::Parser;
use outbreakbot::engine::Engine;
use outbreakbot::{config, db, handlers};
use std::path::PathBuf;
use std::time::Duration;
use teloxide::prelude::*;
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
    let engine = Engine::from_config(&cfg, pool.clone(), bot.clone())?;

    // Spawn the in-process cycle loop unless an external scheduler drives
    // the run_cycle binary instead. Ticks are sequential, so cycles never
    // overlap; missed ticks are skipped.
    if cfg.app.cycle_interval_ms > 0 {
        let interval = Duration::from_millis(cfg.app.cycle_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let report = engine.run_cycle().await;
                if !report.failed_sources.is_empty() {
                    error!(sources = ?report.failed_sources, "cycle completed with failures");
                }
            }
        });
    }

    info!("starting telegram bot");
    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let pool = pool.clone();
        async move {
            if let Err(err) = handlers::handle_update(&bot, &pool, &msg).await {
                error!(?err, "failed to handle update");
            }
            respond(())
        }
    })
    .await;

    Ok(())
}
