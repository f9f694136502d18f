//! Telegram command handlers for the subscription bot.

use crate::db;
use crate::kv::{self, keys};
use crate::normalize::canonical_region;
use anyhow::Result;
use sqlx::SqlitePool;
use teloxide::prelude::*;
use tracing::{info, instrument};

const USAGE: &str = "Commands:\n\
/status - current alert level and counts\n\
/regions - regions you can subscribe to\n\
/subscribe <region> - get updates for a region\n\
/unsubscribe <region> - stop updates for a region\n\
/subscriptions - list your subscriptions";

#[instrument(skip_all)]
pub async fn handle_update(bot: &Bot, pool: &SqlitePool, msg: &Message) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id.0;

    let trimmed = text.trim();
    let (command, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (trimmed, ""),
    };

    match command {
        "/start" => {
            let _ = bot
                .send_message(msg.chat.id, format!("Outbreak watch bot.\n\n{}", USAGE))
                .await;
        }
        "/ping" => {
            let _ = bot.send_message(msg.chat.id, "PONG").await;
        }
        "/status" => {
            let reply = status_text(pool).await?;
            let _ = bot.send_message(msg.chat.id, reply).await;
        }
        "/regions" => {
            let names = kv::region_list(pool).await?;
            let reply = if names.is_empty() {
                "No regions known yet. Try again after the next scrape cycle.".to_string()
            } else {
                names.join("\n")
            };
            let _ = bot.send_message(msg.chat.id, reply).await;
        }
        "/subscribe" => {
            if arg.is_empty() {
                let _ = bot
                    .send_message(msg.chat.id, "Usage: /subscribe <region>")
                    .await;
                return Ok(());
            }
            let name = canonical_region(arg);
            let region = db::find_or_create_region(pool, &name).await?;
            let created = db::subscribe(pool, chat_id, region.id).await?;
            info!(chat_id, region = %region.name, created, "subscribe");
            let reply = if created {
                format!("Subscribed to {}.", region.name)
            } else {
                format!("Already subscribed to {}.", region.name)
            };
            let _ = bot.send_message(msg.chat.id, reply).await;
        }
        "/unsubscribe" => {
            if arg.is_empty() {
                let _ = bot
                    .send_message(msg.chat.id, "Usage: /unsubscribe <region>")
                    .await;
                return Ok(());
            }
            let name = canonical_region(arg);
            let reply = match db::find_region(pool, &name).await? {
                None => format!("Unknown region: {}.", name),
                Some(region) => {
                    if db::unsubscribe(pool, chat_id, region.id).await? {
                        format!("Unsubscribed from {}.", region.name)
                    } else {
                        format!("You were not subscribed to {}.", region.name)
                    }
                }
            };
            let _ = bot.send_message(msg.chat.id, reply).await;
        }
        "/subscriptions" => {
            let subs = db::subscriptions_for_chat(pool, chat_id).await?;
            let reply = if subs.is_empty() {
                "No subscriptions. Use /subscribe <region> to add one.".to_string()
            } else {
                subs.iter()
                    .map(|s| s.region_name.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            let _ = bot.send_message(msg.chat.id, reply).await;
        }
        _ if command.starts_with('/') => {
            let _ = bot.send_message(msg.chat.id, "Unknown command.").await;
        }
        _ => {
            let _ = bot.send_message(msg.chat.id, USAGE).await;
        }
    }

    Ok(())
}

async fn status_text(pool: &SqlitePool) -> Result<String> {
    let dorscon = kv::get(pool, keys::DORSCON).await?;
    let confirmed = kv::get_count(pool, keys::CONFIRMED_CASES).await?;
    let total_cases = kv::get_count(pool, keys::TOTAL_CASES).await?;
    let total_deaths = kv::get_count(pool, keys::TOTAL_DEATHS).await?;

    Ok(format!(
        "DORSCON: {}\nConfirmed cases (MOH): {}\nGlobal cases: {}\nGlobal deaths: {}",
        dorscon.as_deref().unwrap_or("unknown"),
        render(confirmed),
        render(total_cases),
        render(total_deaths),
    ))
}

fn render(count: Option<i64>) -> String {
    count
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn status_text_renders_absent_values() {
        let pool = setup_pool().await;
        let text = status_text(&pool).await.unwrap();
        assert!(text.contains("DORSCON: unknown"));
        assert!(text.contains("Global cases: unknown"));

        kv::set(&pool, keys::DORSCON, "Orange").await.unwrap();
        kv::set_count(&pool, keys::TOTAL_CASES, 1234).await.unwrap();
        let text = status_text(&pool).await.unwrap();
        assert!(text.contains("DORSCON: Orange"));
        assert!(text.contains("Global cases: 1234"));
    }
}
