use super::model::{Article, NewsSource, Region, SubscriptionView};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    // Pass through non-sqlite schemes
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }

    // In-memory URLs like sqlite::memory: or sqlite::memory:?cache=shared
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    // Strip prefix and optional //
    let rest = &url["sqlite:".len()..];
    let (_had_slashes, path_with_query) = if let Some(r) = rest.strip_prefix("//") {
        (true, r)
    } else {
        (false, rest)
    };

    // Separate query string if any
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        // nothing to normalize
        return url.to_string();
    }

    // Expand leading ~/ to HOME
    let expanded_path = if let Some(rest) = path_part.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            format!("{}/{}", home.trim_end_matches('/'), rest)
        } else {
            path_part.to_string()
        }
    } else {
        path_part.to_string()
    };

    // Ensure parent directory exists if any
    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    // Rebuild URL, prefer sqlite:// form
    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Idempotent: returns the existing source if the name is already present.
#[instrument(skip_all)]
pub async fn find_or_create_source(pool: &Pool, name: &str) -> Result<NewsSource> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM news_sources WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?
    {
        return Ok(NewsSource {
            id,
            name: name.to_string(),
        });
    }

    let rec = sqlx::query("INSERT INTO news_sources (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(NewsSource {
        id: rec.get("id"),
        name: name.to_string(),
    })
}

/// All article links already stored for a source, for membership testing
/// before insert.
#[instrument(skip_all)]
pub async fn article_links(pool: &Pool, source_id: i64) -> Result<HashSet<String>> {
    let links: Vec<String> = sqlx::query_scalar("SELECT link FROM articles WHERE source_id = ?")
        .bind(source_id)
        .fetch_all(pool)
        .await?;
    Ok(links.into_iter().collect())
}

/// Insert an article if absent by (source, link); no-op when already present.
/// Returns the stored article and whether this call created it.
#[instrument(skip_all)]
pub async fn ensure_article(
    pool: &Pool,
    source_id: i64,
    title: &str,
    link: &str,
    written_at: DateTime<Utc>,
) -> Result<(Article, bool)> {
    let res = sqlx::query(
        "INSERT INTO articles (source_id, title, link, written_at) VALUES (?, ?, ?, ?) \
         ON CONFLICT (source_id, link) DO NOTHING",
    )
    .bind(source_id)
    .bind(title)
    .bind(link)
    .bind(written_at)
    .execute(pool)
    .await?;
    let created = res.rows_affected() > 0;

    // On conflict the stored row wins; re-read it so callers see the
    // persisted title and date, not the re-scraped ones.
    let row = sqlx::query(
        "SELECT id, title, written_at FROM articles WHERE source_id = ? AND link = ?",
    )
    .bind(source_id)
    .bind(link)
    .fetch_one(pool)
    .await?;
    Ok((
        Article {
            id: row.get("id"),
            source_id,
            title: row.get("title"),
            link: link.to_string(),
            written_at: row.get("written_at"),
        },
        created,
    ))
}

#[instrument(skip_all)]
pub async fn count_articles(pool: &Pool, source_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE source_id = ?")
        .bind(source_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Idempotent by name. Callers are expected to canonicalize the name first
/// (see `normalize::canonical_region`).
#[instrument(skip_all)]
pub async fn find_or_create_region(pool: &Pool, name: &str) -> Result<Region> {
    if let Some(region) = find_region(pool, name).await? {
        return Ok(region);
    }

    let rec = sqlx::query("INSERT INTO regions (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(Region {
        id: rec.get("id"),
        name: name.to_string(),
    })
}

#[instrument(skip_all)]
pub async fn find_region(pool: &Pool, name: &str) -> Result<Option<Region>> {
    let row = sqlx::query("SELECT id, name FROM regions WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| Region {
        id: r.get("id"),
        name: r.get("name"),
    }))
}

#[instrument(skip_all)]
pub async fn list_regions(pool: &Pool) -> Result<Vec<Region>> {
    let rows = sqlx::query("SELECT id, name FROM regions ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| Region {
            id: r.get("id"),
            name: r.get("name"),
        })
        .collect())
}

/// Regions whose name matches a SQL LIKE pattern, e.g. `%province%`.
/// LIKE is case-insensitive for ASCII in SQLite.
#[instrument(skip_all)]
pub async fn regions_matching(pool: &Pool, pattern: &str) -> Result<Vec<Region>> {
    let rows = sqlx::query("SELECT id, name FROM regions WHERE name LIKE ? ORDER BY id")
        .bind(pattern)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| Region {
            id: r.get("id"),
            name: r.get("name"),
        })
        .collect())
}

/// Idempotent: subscribing an already-subscribed (chat, region) pair is a
/// no-op. Returns whether a row was created.
#[instrument(skip_all)]
pub async fn subscribe(pool: &Pool, chat_id: i64, region_id: i64) -> Result<bool> {
    let res = sqlx::query(
        "INSERT INTO subscriptions (chat_id, region_id) VALUES (?, ?) \
         ON CONFLICT (chat_id, region_id) DO NOTHING",
    )
    .bind(chat_id)
    .bind(region_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Returns false if no such subscription existed.
#[instrument(skip_all)]
pub async fn unsubscribe(pool: &Pool, chat_id: i64, region_id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM subscriptions WHERE chat_id = ? AND region_id = ?")
        .bind(chat_id)
        .bind(region_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

#[instrument(skip_all)]
pub async fn subscriptions_for_chat(pool: &Pool, chat_id: i64) -> Result<Vec<SubscriptionView>> {
    let rows = sqlx::query(
        "SELECT s.chat_id, s.region_id, r.name AS region_name \
         FROM subscriptions s JOIN regions r ON r.id = s.region_id \
         WHERE s.chat_id = ? ORDER BY r.name",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| SubscriptionView {
            chat_id: r.get("chat_id"),
            region_id: r.get("region_id"),
            region_name: r.get("region_name"),
        })
        .collect())
}

/// Distinct chat ids subscribed to one region.
#[instrument(skip_all)]
pub async fn chats_for_region(pool: &Pool, region_id: i64) -> Result<Vec<i64>> {
    let chats = sqlx::query_scalar(
        "SELECT DISTINCT chat_id FROM subscriptions WHERE region_id = ? ORDER BY chat_id",
    )
    .bind(region_id)
    .fetch_all(pool)
    .await?;
    Ok(chats)
}

/// Distinct chat ids subscribed to any of the given regions. A chat
/// subscribed to several of them appears exactly once.
#[instrument(skip_all)]
pub async fn distinct_chats_for_regions(pool: &Pool, region_ids: &[i64]) -> Result<Vec<i64>> {
    if region_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; region_ids.len()].join(", ");
    let sql = format!(
        "SELECT DISTINCT chat_id FROM subscriptions WHERE region_id IN ({}) ORDER BY chat_id",
        placeholders
    );
    let mut query = sqlx::query_scalar(&sql);
    for id in region_ids {
        query = query.bind(*id);
    }
    let chats = query.fetch_all(pool).await?;
    Ok(chats)
}

/// Distinct chat ids with at least one subscription, for whole-feed
/// summaries.
#[instrument(skip_all)]
pub async fn all_subscribed_chats(pool: &Pool) -> Result<Vec<i64>> {
    let chats = sqlx::query_scalar("SELECT DISTINCT chat_id FROM subscriptions ORDER BY chat_id")
        .fetch_all(pool)
        .await?;
    Ok(chats)
}
