//! Ministry of Health dashboard scraper.
//!
//! The dashboard mixes a status table (label cell followed by a value cell)
//! with a "Latest Updates" article table. We scan cells in document order:
//! the cell after a recognized label holds its value, and any row whose
//! second cell carries a link is treated as an article row.

use super::{FetchError, RawArticle, RawStatus, StatusFetcher};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

const CONFIRMED_LABEL: &str = "Confirmed cases";
const ALERT_LABEL: &str = "DORSCON Level";

pub struct MohFetcher {
    http: Client,
    url: String,
}

impl MohFetcher {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl StatusFetcher for MohFetcher {
    async fn fetch(&self) -> Result<RawStatus, FetchError> {
        let html = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let status = parse_status_page(&html, &self.url)?;
        debug!(
            articles = status.articles.len(),
            "scraped MOH status snapshot"
        );
        Ok(status)
    }
}

fn parse_status_page(html: &str, base: &str) -> Result<RawStatus, FetchError> {
    let document = Html::parse_document(html);
    let cell_sel = Selector::parse("td").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let anchor_sel = Selector::parse("a").unwrap();
    let base_url = Url::parse(base).ok();

    let mut status = RawStatus::default();

    let cells: Vec<String> = document
        .select(&cell_sel)
        .map(|c| c.text().collect())
        .collect();
    for (i, text) in cells.iter().enumerate() {
        if text.contains(CONFIRMED_LABEL) && status.confirmed_cases.is_empty() {
            status.confirmed_cases = cells.get(i + 1).cloned().unwrap_or_default();
        } else if text.contains(ALERT_LABEL) && status.alert_level.is_empty() {
            status.alert_level = cells.get(i + 1).cloned().unwrap_or_default();
        }
    }

    for row in document.select(&row_sel) {
        let row_cells: Vec<_> = row.select(&cell_sel).collect();
        if row_cells.len() < 2 {
            continue;
        }
        let Some(anchor) = row_cells[1].select(&anchor_sel).next() else {
            continue;
        };
        let href = anchor.value().attr("href").unwrap_or_default();
        let link = base_url
            .as_ref()
            .and_then(|b| b.join(href).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| href.to_string());
        status.articles.push(RawArticle {
            title: row_cells[1].text().collect(),
            link,
            date: row_cells[0].text().collect(),
        });
    }

    if status.confirmed_cases.is_empty()
        && status.alert_level.is_empty()
        && status.articles.is_empty()
    {
        return Err(FetchError::Shape(
            "neither status counters nor article rows found".into(),
        ));
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <table>
          <tr><td>Confirmed cases</td><td><span>24</span></td></tr>
          <tr><td>DORSCON Level</td><td><span>Orange</span></td></tr>
        </table>
        <h3>Latest Updates</h3>
        <table>
          <tr><th>Date</th><th>Update</th></tr>
          <tr><td>5 Feb 2020</td><td><a href="/news/precautions">Precautionary measures</a></td></tr>
          <tr><td>4 Feb 2020</td><td><a href="/news/advisory">Health advisory</a></td></tr>
        </table>
    "#;

    #[test]
    fn parses_counters_and_articles() {
        let status = parse_status_page(PAGE, "https://www.moh.gov.sg/2019-ncov-wuhan").unwrap();
        assert_eq!(status.confirmed_cases, "24");
        assert_eq!(status.alert_level, "Orange");
        assert_eq!(status.articles.len(), 2);
        assert_eq!(
            status.articles[0].link,
            "https://www.moh.gov.sg/news/precautions"
        );
        assert_eq!(status.articles[1].date, "4 Feb 2020");
    }

    #[test]
    fn blank_page_is_a_shape_mismatch() {
        let err = parse_status_page("<html></html>", "https://x").unwrap_err();
        assert!(matches!(err, FetchError::Shape(_)));
    }
}
