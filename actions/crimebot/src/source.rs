use reqwest::blocking::Client;
use std::thread;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::hub::blocking_client;
use crate::types::RawRecord;

/// Paged access to a remote table
pub trait TabularSource {
    /// Fetch up to `limit` records starting at `offset`. An empty page means
    /// there is nothing more.
    fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<RawRecord>>;
}

/// Socrata Open Data (SODA) JSON endpoint for one dataset
pub struct SocrataClient {
    client: Client,
    domain: String,
    dataset_id: String,
    app_token: Option<String>,
}

impl SocrataClient {
    pub fn new(domain: impl Into<String>, dataset_id: impl Into<String>, app_token: Option<String>) -> Self {
        Self {
            client: blocking_client(),
            domain: domain.into(),
            dataset_id: dataset_id.into(),
            app_token,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.socrata_domain.clone(),
            config.socrata_dataset.clone(),
            config.socrata_app_token.clone(),
        )
    }

    /// `domain` may carry its own scheme, e.g. a local mirror on plain http
    fn resource_url(&self) -> String {
        let base = if self.domain.contains("://") {
            self.domain.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.domain)
        };
        format!("{}/resource/{}.json", base, self.dataset_id)
    }
}

impl TabularSource for SocrataClient {
    fn fetch_page(&self, limit: usize, offset: usize) -> Result<Vec<RawRecord>> {
        let limit = limit.to_string();
        let offset = offset.to_string();

        // Ordering by row id keeps pages stable between runs
        let mut request = self.client.get(self.resource_url()).query(&[
            ("$limit", limit.as_str()),
            ("$offset", offset.as_str()),
            ("$order", ":id"),
        ]);
        if let Some(token) = &self.app_token {
            request = request.header("X-App-Token", token);
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Source(format!(
                "{} returned {}: {}",
                self.resource_url(),
                status,
                text
            )));
        }

        Ok(response.json()?)
    }
}

/// Summary of a full paged fetch
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub pages: usize,
}

/// Page through `source` until it returns an empty page, sleeping `delay`
/// between requests
pub fn fetch_all<S: TabularSource + ?Sized>(
    source: &S,
    page_size: usize,
    delay: Duration,
) -> Result<FetchOutcome> {
    let mut records = Vec::new();
    let mut offset = 0;
    let mut pages = 0;

    loop {
        info!(from = offset, to = offset + page_size, "Fetching records");
        let page = source.fetch_page(page_size, offset)?;
        if page.is_empty() {
            break;
        }

        pages += 1;
        records.extend(page);
        offset += page_size;

        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    info!(records = records.len(), pages, "Retrieved records");
    Ok(FetchOutcome { records, pages })
}
