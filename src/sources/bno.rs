//! BNO-style case tracker scraper.
//!
//! The tracker publishes one or more `.wp-block-table` tables whose rows are
//! region, cases, deaths, notes. The first row of each table is a header.

use super::{FetchError, RawRegionRow, RegionTableFetcher};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

pub struct BnoFetcher {
    http: Client,
    url: String,
}

impl BnoFetcher {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RegionTableFetcher for BnoFetcher {
    async fn fetch(&self) -> Result<Vec<RawRegionRow>, FetchError> {
        let html = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let rows = parse_region_tables(&html)?;
        debug!(count = rows.len(), "scraped BNO region rows");
        Ok(rows)
    }
}

fn parse_region_tables(html: &str) -> Result<Vec<RawRegionRow>, FetchError> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse(".wp-block-table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("td").unwrap();

    let mut rows = Vec::new();
    for table in document.select(&table_sel) {
        for row in table.select(&row_sel).skip(1) {
            let mut cells = row.select(&cell_sel).map(|c| c.text().collect::<String>());
            let (Some(region), Some(cases), Some(deaths), Some(notes)) =
                (cells.next(), cells.next(), cells.next(), cells.next())
            else {
                continue;
            };
            rows.push(RawRegionRow {
                region,
                cases,
                deaths,
                notes,
            });
        }
    }

    if rows.is_empty() {
        return Err(FetchError::Shape("no .wp-block-table rows found".into()));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <figure class="wp-block-table"><table>
          <tr><th>Region</th><th>Cases</th><th>Deaths</th><th>Notes</th></tr>
          <tr><td>Hubei Province</td><td>1,234</td><td>25</td><td>Lockdown</td></tr>
          <tr><td>Singapore</td><td>24</td><td>0</td><td></td></tr>
          <tr><td>TOTAL</td><td>1,258</td><td>25</td><td></td></tr>
        </table></figure>
    "#;

    #[test]
    fn parses_rows_skipping_header() {
        let rows = parse_region_tables(PAGE).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].region, "Hubei Province");
        assert_eq!(rows[0].cases, "1,234");
        assert_eq!(rows[1].deaths, "0");
        // The TOTAL aggregate row passes through raw; the normalizer drops it.
        assert_eq!(rows[2].region, "TOTAL");
    }

    #[test]
    fn missing_tables_are_a_shape_mismatch() {
        let err = parse_region_tables("<table></table>").unwrap_err();
        assert!(matches!(err, FetchError::Shape(_)));
    }
}
