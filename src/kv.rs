//! Key-value store for scalar counters, per-region metric hashes, and the
//! published region list.
//!
//! Key names are the compatibility contract between cycles: scalar globals
//! are namespaced `<SOURCE>.<METRIC>` (e.g. `MOH.DORSCON`), per-region
//! hashes are `BNO.<RegionName>`, and the region list lives under `REGIONS`.
//! A key that has never been written reads back as absent; the engine
//! treats that as "no prior state" and suppresses the diff.

use crate::db::repo::Pool;
use anyhow::Result;
use sqlx::Row;
use tracing::instrument;

/// Well-known keys.
pub mod keys {
    pub const DORSCON: &str = "MOH.DORSCON";
    pub const CONFIRMED_CASES: &str = "MOH.CONFIRMED_CASES";
    pub const TOTAL_CASES: &str = "BNO.TOTAL_CASES";
    pub const TOTAL_DEATHS: &str = "BNO.TOTAL_DEATHS";
    pub const REGIONS: &str = "REGIONS";

    pub fn region_metric(region: &str) -> String {
        format!("BNO.{}", region)
    }
}

/// Last-observed case/death counts and notes for one region. `None` counts
/// mark values the source published in an unparsable form; they compare
/// unequal to every real count, including zero.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionMetric {
    pub cases: Option<i64>,
    pub deaths: Option<i64>,
    pub notes: String,
}

#[instrument(skip_all)]
pub async fn get(pool: &Pool, key: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar("SELECT value FROM kv_entries WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

#[instrument(skip_all)]
pub async fn set(pool: &Pool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO kv_entries (key, value) VALUES (?, ?) \
         ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

/// Typed read for integer counters. A stored value that does not parse is
/// reported as absent rather than as a bogus count.
#[instrument(skip_all)]
pub async fn get_count(pool: &Pool, key: &str) -> Result<Option<i64>> {
    Ok(get(pool, key).await?.and_then(|v| v.parse().ok()))
}

#[instrument(skip_all)]
pub async fn set_count(pool: &Pool, key: &str, value: i64) -> Result<()> {
    set(pool, key, &value.to_string()).await
}

#[instrument(skip_all)]
pub async fn get_region_metric(pool: &Pool, region: &str) -> Result<Option<RegionMetric>> {
    let key = keys::region_metric(region);
    let rows = sqlx::query("SELECT field, value FROM kv_hashes WHERE key = ?")
        .bind(&key)
        .fetch_all(pool)
        .await?;
    if rows.is_empty() {
        return Ok(None);
    }

    let mut metric = RegionMetric::default();
    for row in rows {
        let field: String = row.get("field");
        let value: String = row.get("value");
        match field.as_str() {
            "cases" => metric.cases = value.parse().ok(),
            "deaths" => metric.deaths = value.parse().ok(),
            "notes" => metric.notes = value,
            _ => {}
        }
    }
    Ok(Some(metric))
}

/// Overwrite the stored metric for a region with the latest values. Counts
/// the source published unparsably are stored as empty strings and read
/// back as absent.
#[instrument(skip_all)]
pub async fn set_region_metric(pool: &Pool, region: &str, metric: &RegionMetric) -> Result<()> {
    let key = keys::region_metric(region);
    let mut tx = pool.begin().await?;
    let fields = [
        ("region", region.to_string()),
        ("cases", render_count(metric.cases)),
        ("deaths", render_count(metric.deaths)),
        ("notes", metric.notes.clone()),
    ];
    for (field, value) in fields {
        sqlx::query("INSERT OR REPLACE INTO kv_hashes (key, field, value) VALUES (?, ?, ?)")
            .bind(&key)
            .bind(field)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

fn render_count(count: Option<i64>) -> String {
    count.map(|c| c.to_string()).unwrap_or_default()
}

/// Atomically clear and repopulate the published region list. Used only to
/// drive the bot's region listing; never diffed.
#[instrument(skip_all)]
pub async fn replace_region_list(pool: &Pool, names: &[String]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM kv_list_entries WHERE key = ?")
        .bind(keys::REGIONS)
        .execute(&mut *tx)
        .await?;
    for (pos, name) in names.iter().enumerate() {
        sqlx::query("INSERT INTO kv_list_entries (key, pos, value) VALUES (?, ?, ?)")
            .bind(keys::REGIONS)
            .bind(pos as i64)
            .bind(name)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn region_list(pool: &Pool) -> Result<Vec<String>> {
    let names = sqlx::query_scalar("SELECT value FROM kv_list_entries WHERE key = ? ORDER BY pos")
        .bind(keys::REGIONS)
        .fetch_all(pool)
        .await?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn setup_pool() -> Pool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn scalar_get_set_roundtrip() {
        let pool = setup_pool().await;
        assert_eq!(get(&pool, keys::DORSCON).await.unwrap(), None);

        set(&pool, keys::DORSCON, "Yellow").await.unwrap();
        assert_eq!(
            get(&pool, keys::DORSCON).await.unwrap().as_deref(),
            Some("Yellow")
        );

        set(&pool, keys::DORSCON, "Orange").await.unwrap();
        assert_eq!(
            get(&pool, keys::DORSCON).await.unwrap().as_deref(),
            Some("Orange")
        );
    }

    #[tokio::test]
    async fn typed_count_read() {
        let pool = setup_pool().await;
        assert_eq!(get_count(&pool, keys::CONFIRMED_CASES).await.unwrap(), None);

        set_count(&pool, keys::CONFIRMED_CASES, 18).await.unwrap();
        assert_eq!(
            get_count(&pool, keys::CONFIRMED_CASES).await.unwrap(),
            Some(18)
        );

        // Corrupted value reads back as absent, not as zero.
        set(&pool, keys::CONFIRMED_CASES, "n/a").await.unwrap();
        assert_eq!(get_count(&pool, keys::CONFIRMED_CASES).await.unwrap(), None);
    }

    #[tokio::test]
    async fn region_metric_absent_on_first_run() {
        let pool = setup_pool().await;
        assert!(get_region_metric(&pool, "Hubei Province")
            .await
            .unwrap()
            .is_none());

        let metric = RegionMetric {
            cases: Some(10),
            deaths: Some(1),
            notes: "quarantine".into(),
        };
        set_region_metric(&pool, "Hubei Province", &metric)
            .await
            .unwrap();
        let stored = get_region_metric(&pool, "Hubei Province")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, metric);
    }

    #[tokio::test]
    async fn region_metric_unparsable_counts_stay_absent() {
        let pool = setup_pool().await;
        let metric = RegionMetric {
            cases: None,
            deaths: Some(0),
            notes: String::new(),
        };
        set_region_metric(&pool, "Diamond Princess", &metric)
            .await
            .unwrap();
        let stored = get_region_metric(&pool, "Diamond Princess")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.cases, None);
        assert_eq!(stored.deaths, Some(0));
    }

    #[tokio::test]
    async fn region_list_is_fully_replaced() {
        let pool = setup_pool().await;
        assert!(region_list(&pool).await.unwrap().is_empty());

        replace_region_list(&pool, &["Hubei Province".into(), "Singapore".into()])
            .await
            .unwrap();
        assert_eq!(
            region_list(&pool).await.unwrap(),
            vec!["Hubei Province".to_string(), "Singapore".to_string()]
        );

        replace_region_list(&pool, &["Singapore".into()])
            .await
            .unwrap();
        assert_eq!(
            region_list(&pool).await.unwrap(),
            vec!["Singapore".to_string()]
        );
    }
}
