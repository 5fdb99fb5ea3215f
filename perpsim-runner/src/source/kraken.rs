//! Kraken Futures ticker feed.
//!
//! Polls the public `/tickers` endpoint once per call and turns the response
//! into a [`MarketSnapshot`] stamped with the retrieval time. Individual
//! malformed entries are dropped; a malformed envelope is an error.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use perpsim_core::domain::{MarketSnapshot, Ticker};

use super::{SnapshotSource, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://futures.kraken.com/derivatives/api/v3";

/// `/tickers` response envelope.
#[derive(Debug, Deserialize)]
struct TickersResponse {
    result: Option<String>,
    tickers: Option<Vec<Value>>,
    error: Option<String>,
}

pub struct KrakenTickerSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl KrakenTickerSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let url = format!("{}/tickers", base_url.trim_end_matches('/'));
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("perpsim/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| SourceError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Parse a `/tickers` body into a snapshot.
    pub fn parse_response(body: &str, taken_at: DateTime<Utc>) -> Result<MarketSnapshot, SourceError> {
        let resp: TickersResponse = serde_json::from_str(body)
            .map_err(|e| SourceError::Format(format!("invalid JSON: {e}")))?;

        if resp.result.as_deref() == Some("error") {
            return Err(SourceError::Format(format!(
                "exchange error: {}",
                resp.error.as_deref().unwrap_or("unknown")
            )));
        }
        let entries = resp
            .tickers
            .ok_or_else(|| SourceError::Format("missing `tickers` array".into()))?;

        let mut snapshot = MarketSnapshot::new(taken_at);
        for entry in &entries {
            let Some(symbol) = entry.get("symbol").and_then(Value::as_str) else {
                continue;
            };
            match Ticker::deserialize(entry) {
                Ok(ticker) => snapshot.insert(symbol, ticker),
                Err(e) => debug!(symbol, error = %e, "skipping malformed ticker"),
            }
        }
        Ok(snapshot)
    }
}

impl SnapshotSource for KrakenTickerSource {
    fn name(&self) -> &str {
        "kraken_futures"
    }

    fn next_snapshot(&mut self) -> Result<Option<MarketSnapshot>, SourceError> {
        let http_err = |source| SourceError::Http {
            url: self.url.clone(),
            source,
        };
        let response = self.client.get(&self.url).send().map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        let body = response.text().map_err(http_err)?;
        let snapshot = Self::parse_response(&body, Utc::now())?;
        debug!(tickers = snapshot.len(), "fetched snapshot");
        Ok(Some(snapshot))
    }
}
