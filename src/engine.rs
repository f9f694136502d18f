//! The diff-and-notify engine.
//!
//! One cycle fetches every source, normalizes the snapshot, diffs it
//! against stored state, persists the new state, and fans out change
//! messages to the matching subscriber set. Each source pipeline runs on
//! its own task behind a failure boundary: a fetch, parse, or store error
//! is logged and reported per source, never propagated to siblings.
//!
//! Ordering inside a diff step is notify-attempt first, store after. The
//! broadcast itself swallows per-recipient failures, so in-process the
//! store always follows the attempt; a crash between the two re-sends on
//! the next cycle (at-least-once delivery, deduplicated by stored state).

use crate::broadcast::broadcast;
use crate::db::{self, repo::Pool};
use crate::diag::DiagnosticSink;
use crate::gateway::{escape_markdown, Gateway};
use crate::kv::{self, keys, RegionMetric};
use crate::normalize::{self, ArticleRecord};
use crate::sources::{ArticleFetcher, RegionTableFetcher, StatusFetcher};
use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub const NHC_SOURCE: &str = "NHC";
pub const MOH_SOURCE: &str = "MOH";
pub const BNO_SOURCE: &str = "BNO";

/// Pattern selecting the regions whose subscribers receive NHC digests.
const CHINA_REGION_PATTERN: &str = "%province%";
/// Fixed region MOH updates are scoped to.
const MOH_REGION: &str = "Singapore";

#[derive(Clone)]
pub struct Engine {
    pool: Pool,
    gateway: Arc<dyn Gateway>,
    diagnostics: Arc<dyn DiagnosticSink>,
    nhc: Arc<dyn ArticleFetcher>,
    moh: Arc<dyn StatusFetcher>,
    bno: Arc<dyn RegionTableFetcher>,
    send_delay: Duration,
}

/// Per-cycle outcome, for logging and tests.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub failed_sources: Vec<&'static str>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Pool,
        gateway: Arc<dyn Gateway>,
        diagnostics: Arc<dyn DiagnosticSink>,
        nhc: Arc<dyn ArticleFetcher>,
        moh: Arc<dyn StatusFetcher>,
        bno: Arc<dyn RegionTableFetcher>,
        send_delay: Duration,
    ) -> Self {
        Self {
            pool,
            gateway,
            diagnostics,
            nhc,
            moh,
            bno,
            send_delay,
        }
    }

    /// Wire the production collaborators from configuration.
    pub fn from_config(cfg: &crate::config::Config, pool: Pool, bot: teloxide::Bot) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("outbreakbot/0.1")
            .build()
            .context("reqwest client")?;
        Ok(Self::new(
            pool,
            Arc::new(crate::gateway::TelegramGateway::new(bot)),
            Arc::new(crate::diag::LogDiagnostics),
            Arc::new(crate::sources::NhcFetcher::new(
                http.clone(),
                cfg.sources.nhc_url.clone(),
            )),
            Arc::new(crate::sources::MohFetcher::new(
                http.clone(),
                cfg.sources.moh_url.clone(),
            )),
            Arc::new(crate::sources::BnoFetcher::new(
                http,
                cfg.sources.bno_url.clone(),
            )),
            Duration::from_millis(cfg.app.broadcast_delay_ms),
        ))
    }

    /// Run one full cycle. The three pipelines are spawned concurrently so
    /// a hung fetch in one source cannot block the others, then joined
    /// before the cycle completes.
    #[instrument(skip_all)]
    pub async fn run_cycle(&self) -> CycleReport {
        let nhc = {
            let engine = self.clone();
            tokio::spawn(async move { engine.run_nhc().await })
        };
        let moh = {
            let engine = self.clone();
            tokio::spawn(async move { engine.run_moh().await })
        };
        let bno = {
            let engine = self.clone();
            tokio::spawn(async move { engine.run_bno().await })
        };

        let mut report = CycleReport::default();
        for (source, handle) in [(NHC_SOURCE, nhc), (MOH_SOURCE, moh), (BNO_SOURCE, bno)] {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(anyhow::Error::from(join_err)).context("pipeline panicked"),
            };
            if let Err(err) = outcome {
                self.diagnostics.capture(source, &err).await;
                report.failed_sources.push(source);
            }
        }
        info!(failed = report.failed_sources.len(), "cycle finished");
        report
    }

    /// Article-source pipeline: new NHC articles go to subscribers of any
    /// China-province region as one digest.
    #[instrument(skip_all)]
    async fn run_nhc(&self) -> Result<()> {
        let raw = self.nhc.fetch().await.context("NHC fetch failed")?;
        let articles = normalize::normalize_articles(&raw, normalize::NHC_DATE_FORMAT);
        let source = db::find_or_create_source(&self.pool, NHC_SOURCE).await?;

        let regions = db::regions_matching(&self.pool, CHINA_REGION_PATTERN).await?;
        let region_ids: Vec<i64> = regions.iter().map(|r| r.id).collect();
        let chats = db::distinct_chats_for_regions(&self.pool, &region_ids).await?;

        self.ingest_articles(source.id, &articles, &chats).await
    }

    /// Status-source pipeline: MOH articles plus alert-level and
    /// confirmed-case transitions, all scoped to one fixed region.
    #[instrument(skip_all)]
    async fn run_moh(&self) -> Result<()> {
        let raw = self.moh.fetch().await.context("MOH fetch failed")?;
        let status = normalize::normalize_status(&raw);
        let source = db::find_or_create_source(&self.pool, MOH_SOURCE).await?;
        let region = db::find_or_create_region(&self.pool, MOH_REGION).await?;
        let chats = db::chats_for_region(&self.pool, region.id).await?;

        self.ingest_articles(source.id, &status.articles, &chats)
            .await?;

        // Absent prior value means first observation: store, say nothing.
        if status.alert_level.is_empty() {
            warn!("MOH alert level missing from snapshot; keeping stored value");
        } else {
            let prior = kv::get(&self.pool, keys::DORSCON).await?;
            if let Some(prior) = prior.filter(|p| *p != status.alert_level) {
                let msg = format!(
                    "*UPDATE:* The DORSCON level changed from `{}` → `{}`",
                    prior, status.alert_level
                );
                broadcast(self.gateway.as_ref(), &chats, &msg, self.send_delay).await;
            }
            kv::set(&self.pool, keys::DORSCON, &status.alert_level).await?;
        }

        match status.confirmed_cases {
            None => warn!("MOH confirmed-case count missing from snapshot; keeping stored value"),
            Some(current) => {
                let prior = kv::get_count(&self.pool, keys::CONFIRMED_CASES).await?;
                if let Some(prior) = prior.filter(|p| *p != current) {
                    let msg = format!(
                        "*UPDATE:* The MOH's number of confirmed cases changed from `{}` → `{}`",
                        prior, current
                    );
                    broadcast(self.gateway.as_ref(), &chats, &msg, self.send_delay).await;
                }
                kv::set_count(&self.pool, keys::CONFIRMED_CASES, current).await?;
            }
        }
        Ok(())
    }

    /// Metric-list pipeline: per-region case/death diffs, the published
    /// region list, and running totals.
    #[instrument(skip_all)]
    async fn run_bno(&self) -> Result<()> {
        let raw = self.bno.fetch().await.context("BNO fetch failed")?;
        let records = normalize::normalize_region_rows(&raw);

        let names: Vec<String> = records.iter().map(|r| r.region.clone()).collect();
        kv::replace_region_list(&self.pool, &names).await?;

        let mut total_cases = 0i64;
        let mut total_deaths = 0i64;
        for record in &records {
            let region = db::find_or_create_region(&self.pool, &record.region).await?;
            let prior = kv::get_region_metric(&self.pool, &record.region).await?;
            if let Some(prior) = prior.filter(|p| *p != record.metric) {
                let chats = db::chats_for_region(&self.pool, region.id).await?;
                let msg = format!(
                    "REGION: *{}*\n{}",
                    record.region,
                    format_metric_changes(&prior, &record.metric)
                );
                broadcast(self.gateway.as_ref(), &chats, &msg, self.send_delay).await;
            }
            kv::set_region_metric(&self.pool, &record.region, &record.metric).await?;

            total_cases += record.metric.cases.unwrap_or(0);
            total_deaths += record.metric.deaths.unwrap_or(0);
        }

        // Totals get a line only when they changed; equal values are not
        // reported at all.
        let mut lines = Vec::new();
        let prior = kv::get_count(&self.pool, keys::TOTAL_CASES).await?;
        if let Some(prior) = prior.filter(|p| *p != total_cases) {
            lines.push(format!(
                "TOTAL cases: `{}` → `{}` ({})",
                prior,
                total_cases,
                format_diff(prior, total_cases)
            ));
        }
        kv::set_count(&self.pool, keys::TOTAL_CASES, total_cases).await?;

        let prior = kv::get_count(&self.pool, keys::TOTAL_DEATHS).await?;
        if let Some(prior) = prior.filter(|p| *p != total_deaths) {
            lines.push(format!(
                "TOTAL deaths: `{}` → `{}` ({})",
                prior,
                total_deaths,
                format_diff(prior, total_deaths)
            ));
        }
        kv::set_count(&self.pool, keys::TOTAL_DEATHS, total_deaths).await?;

        if !lines.is_empty() {
            let chats = db::all_subscribed_chats(&self.pool).await?;
            broadcast(
                self.gateway.as_ref(),
                &chats,
                &lines.join("\n"),
                self.send_delay,
            )
            .await;
        }
        Ok(())
    }

    /// Shared article step: collect unseen links into one digest, attempt
    /// the notification, then converge stored state for every article (new
    /// or not) so re-ingestion is a no-op.
    async fn ingest_articles(
        &self,
        source_id: i64,
        articles: &[ArticleRecord],
        chats: &[i64],
    ) -> Result<()> {
        let existing = db::article_links(&self.pool, source_id).await?;
        let fresh: Vec<&ArticleRecord> = articles
            .iter()
            .filter(|a| !existing.contains(&a.link))
            .collect();

        if !fresh.is_empty() {
            let digest = fresh
                .iter()
                .map(|a| format_article_bullet(a))
                .collect::<Vec<_>>()
                .join("\n\n");
            broadcast(self.gateway.as_ref(), chats, &digest, self.send_delay).await;
        }

        for article in articles {
            db::ensure_article(
                &self.pool,
                source_id,
                &article.title,
                &article.link,
                article.written_at,
            )
            .await?;
        }
        Ok(())
    }
}

/// Render the signed difference between two counts: `+N`, `-N`, or `=`.
pub fn format_diff(old: i64, new: i64) -> String {
    match new.cmp(&old) {
        Ordering::Greater => format!("+{}", new - old),
        Ordering::Less => format!("-{}", old - new),
        Ordering::Equal => "=".to_string(),
    }
}

fn format_article_bullet(article: &ArticleRecord) -> String {
    format!("[{}]({})", escape_markdown(&article.title), article.link)
}

fn format_count(count: Option<i64>) -> String {
    count.map(|c| c.to_string()).unwrap_or_else(|| "?".into())
}

fn count_diff(old: Option<i64>, new: Option<i64>) -> String {
    match (old, new) {
        (Some(old), Some(new)) => format_diff(old, new),
        _ => "?".to_string(),
    }
}

/// Per-field change lines in fixed order: cases, then deaths, then notes.
pub fn format_metric_changes(old: &RegionMetric, new: &RegionMetric) -> String {
    let mut lines = vec![
        format!(
            "Cases: `{}` → `{}` ({})",
            format_count(old.cases),
            format_count(new.cases),
            count_diff(old.cases, new.cases)
        ),
        format!(
            "Deaths: `{}` → `{}` ({})",
            format_count(old.deaths),
            format_count(new.deaths),
            count_diff(old.deaths, new.deaths)
        ),
    ];
    if !new.notes.is_empty() || !old.notes.is_empty() {
        lines.push(format!("Notes: {}", escape_markdown(&new.notes)));
    }
    lines.join("\n")
}
