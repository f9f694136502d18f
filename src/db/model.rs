use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One external data provider (NHC, MOH, ...). Created on first reference,
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsSource {
    pub id: i64,
    pub name: String,
}

/// A news article attributed to one source. `link` is the natural key
/// within a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub link: String,
    pub written_at: DateTime<Utc>,
}

/// A geographic bucket subscribers attach to. Name uniqueness is the
/// resolution key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
}

/// A subscription joined with its region name for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionView {
    pub chat_id: i64,
    pub region_id: i64,
    pub region_name: String,
}
