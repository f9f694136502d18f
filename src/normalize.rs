//! Pure transforms from raw scraped rows into canonical records.
//!
//! Policy for malformed input, applied per record so one bad row never
//! aborts a batch: missing text becomes an empty string, counts that do not
//! parse become `None` (distinguishable from a real zero), and articles
//! whose date does not parse are skipped with a warning.

use crate::kv::RegionMetric;
use crate::sources::{RawArticle, RawRegionRow, RawStatus};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::warn;

pub const NHC_DATE_FORMAT: &str = "%Y-%m-%d";
pub const MOH_DATE_FORMAT: &str = "%d %b %Y";

/// Reserved aggregate marker; region tables report it as a row but it is
/// not a region.
const TOTAL_MARKER: &str = "TOTAL";

static COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d[\d,]*").unwrap());

/// Alias table patching inconsistent source naming onto one canonical
/// region, so two differently worded names resolve to the same Region row.
static REGION_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Mainland China", "China"),
        ("Hong Kong (China)", "Hong Kong"),
        ("Macau (China)", "Macau"),
        ("Taiwan (China)", "Taiwan"),
        ("Republic of Singapore", "Singapore"),
        ("UAE", "United Arab Emirates"),
        ("UK", "United Kingdom"),
        ("USA", "United States"),
        ("U.S.", "United States"),
    ])
});

/// An article ready for storage: cleaned text, absolute link, parsed date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub title: String,
    pub link: String,
    pub written_at: DateTime<Utc>,
}

/// The MOH snapshot with parsed counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub confirmed_cases: Option<i64>,
    pub alert_level: String,
    pub articles: Vec<ArticleRecord>,
}

/// One canonical region with its latest metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRecord {
    pub region: String,
    pub metric: RegionMetric,
}

/// Collapse runs of whitespace and trim. Scraped text tends to carry the
/// page's indentation.
pub fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the first integer in locale-formatted text ("1,234 cases" →
/// 1234). `None` when there is no parsable number.
pub fn parse_count(text: &str) -> Option<i64> {
    let matched = COUNT_RE.find(text)?;
    matched.as_str().replace(',', "").parse().ok()
}

/// Clean a region name and patch it through the alias table.
pub fn canonical_region(name: &str) -> String {
    let cleaned = clean(name);
    match REGION_ALIASES.get(cleaned.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => cleaned,
    }
}

pub fn normalize_articles(rows: &[RawArticle], date_format: &str) -> Vec<ArticleRecord> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let title = clean(&row.title);
        let link = clean(&row.link);
        if link.is_empty() {
            warn!(%title, "dropping article row without a link");
            continue;
        }
        let date_text = clean(&row.date);
        let Some(written_at) = parse_date(&date_text, date_format) else {
            warn!(date = %date_text, %link, "dropping article row with unparsable date");
            continue;
        };
        out.push(ArticleRecord {
            title,
            link,
            written_at,
        });
    }
    out
}

fn parse_date(text: &str, format: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(text, format).ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

pub fn normalize_status(raw: &RawStatus) -> StatusRecord {
    StatusRecord {
        confirmed_cases: parse_count(&raw.confirmed_cases),
        alert_level: clean(&raw.alert_level),
        articles: normalize_articles(&raw.articles, MOH_DATE_FORMAT),
    }
}

/// Canonicalize region rows: alias-patch names, drop the TOTAL aggregate,
/// and keep the first occurrence of a duplicated region.
pub fn normalize_region_rows(rows: &[RawRegionRow]) -> Vec<RegionRecord> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let region = canonical_region(&row.region);
        if region.is_empty() || region == TOTAL_MARKER {
            continue;
        }
        if !seen.insert(region.clone()) {
            warn!(%region, "dropping duplicate region row");
            continue;
        }
        out.push(RegionRecord {
            region,
            metric: RegionMetric {
                cases: parse_count(&row.cases),
                deaths: parse_count(&row.deaths),
                notes: clean(&row.notes),
            },
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_whitespace() {
        assert_eq!(clean("  Daily\n   briefing \t"), "Daily briefing");
        assert_eq!(clean(""), "");
    }

    #[test]
    fn parse_count_strips_thousands_separators() {
        assert_eq!(parse_count("1,234"), Some(1234));
        assert_eq!(parse_count("24 confirmed"), Some(24));
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count("—"), None);
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn canonical_region_applies_aliases() {
        assert_eq!(canonical_region(" Mainland China "), "China");
        assert_eq!(canonical_region("Hong Kong (China)"), "Hong Kong");
        assert_eq!(canonical_region("Hubei Province"), "Hubei Province");
    }

    #[test]
    fn articles_with_unparsable_dates_are_skipped() {
        let rows = vec![
            RawArticle {
                title: " Daily briefing ".into(),
                link: "http://x/1".into(),
                date: "2020-02-05".into(),
            },
            RawArticle {
                title: "Broken".into(),
                link: "http://x/2".into(),
                date: "soon".into(),
            },
            RawArticle {
                title: "No link".into(),
                link: "  ".into(),
                date: "2020-02-05".into(),
            },
        ];
        let records = normalize_articles(&rows, NHC_DATE_FORMAT);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Daily briefing");
        assert_eq!(records[0].written_at.format("%Y-%m-%d").to_string(), "2020-02-05");
    }

    #[test]
    fn moh_date_format_parses() {
        let rows = vec![RawArticle {
            title: "Advisory".into(),
            link: "http://x/a".into(),
            date: "5 Feb 2020".into(),
        }];
        let records = normalize_articles(&rows, MOH_DATE_FORMAT);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn status_counters_parse_with_sentinels() {
        let status = normalize_status(&RawStatus {
            confirmed_cases: "n/a".into(),
            alert_level: " Orange ".into(),
            articles: vec![],
        });
        assert_eq!(status.confirmed_cases, None);
        assert_eq!(status.alert_level, "Orange");
    }

    #[test]
    fn region_rows_drop_total_and_duplicates() {
        let rows = vec![
            RawRegionRow {
                region: "Hubei Province".into(),
                cases: "1,234".into(),
                deaths: "25".into(),
                notes: " Lockdown ".into(),
            },
            RawRegionRow {
                region: "TOTAL".into(),
                cases: "1,258".into(),
                deaths: "25".into(),
                notes: "".into(),
            },
            RawRegionRow {
                region: " Hubei Province".into(),
                cases: "999".into(),
                deaths: "9".into(),
                notes: "dup".into(),
            },
            RawRegionRow {
                region: "Diamond Princess".into(),
                cases: "—".into(),
                deaths: "0".into(),
                notes: "".into(),
            },
        ];
        let records = normalize_region_rows(&rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].region, "Hubei Province");
        assert_eq!(records[0].metric.cases, Some(1234));
        assert_eq!(records[0].metric.notes, "Lockdown");
        assert_eq!(records[1].metric.cases, None);
        assert_eq!(records[1].metric.deaths, Some(0));
    }
}
