//! National Health Commission news-list scraper.
//!
//! The page lists articles under `.section-list .list ul li`, each with an
//! anchor and a `.list-date` cell.

use super::{ArticleFetcher, FetchError, RawArticle};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

pub struct NhcFetcher {
    http: Client,
    url: String,
}

impl NhcFetcher {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ArticleFetcher for NhcFetcher {
    async fn fetch(&self) -> Result<Vec<RawArticle>, FetchError> {
        let html = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let articles = parse_article_list(&html, &self.url)?;
        debug!(count = articles.len(), "scraped NHC article rows");
        Ok(articles)
    }
}

fn parse_article_list(html: &str, base: &str) -> Result<Vec<RawArticle>, FetchError> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse(".section-list .list ul li").unwrap();
    let anchor_sel = Selector::parse("a").unwrap();
    let date_sel = Selector::parse(".list-date").unwrap();
    let base_url = Url::parse(base).ok();

    let mut articles = Vec::new();
    for item in document.select(&item_sel) {
        let Some(anchor) = item.select(&anchor_sel).next() else {
            continue;
        };
        let href = anchor.value().attr("href").unwrap_or_default();
        let link = base_url
            .as_ref()
            .and_then(|b| b.join(href).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| href.to_string());
        articles.push(RawArticle {
            title: anchor.text().collect(),
            link,
            date: item
                .select(&date_sel)
                .next()
                .map(|d| d.text().collect())
                .unwrap_or_default(),
        });
    }

    if articles.is_empty() {
        return Err(FetchError::Shape(
            "no article rows under .section-list .list".into(),
        ));
    }
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="section-list"><div class="list"><ul>
          <li><a href="/news/1.shtml">Daily briefing</a><span class="list-date">2020-02-05</span></li>
          <li><a href="/news/2.shtml">Prevention notice</a><span class="list-date">2020-02-04</span></li>
          <li><span class="list-date">2020-02-03</span></li>
        </ul></div></div>
    "#;

    #[test]
    fn parses_rows_and_resolves_links() {
        let articles = parse_article_list(PAGE, "http://en.nhc.gov.cn/news.html").unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Daily briefing");
        assert_eq!(articles[0].link, "http://en.nhc.gov.cn/news/1.shtml");
        assert_eq!(articles[1].date, "2020-02-04");
    }

    #[test]
    fn empty_list_is_a_shape_mismatch() {
        let err = parse_article_list("<html><body></body></html>", "http://x").unwrap_err();
        assert!(matches!(err, FetchError::Shape(_)));
    }
}
