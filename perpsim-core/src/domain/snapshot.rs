//! Market snapshot — one tick of per-symbol ticker data.
//!
//! Exchange payloads are loosely typed: numbers arrive as JSON numbers, as
//! numeric strings, as `null`, or not at all. Every numeric field is therefore
//! an `Option<f64>` where `None` means "absent". Absence is never coerced to
//! zero; gating code asks [`Ticker::price_usability`] instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-symbol ticker fields consumed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Mark price in quote currency. Absent or non-positive means unpriced.
    #[serde(
        rename = "markPrice",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub mark_price: Option<f64>,

    /// 24h change in percent (7.5 means +7.5%).
    #[serde(
        rename = "change24h",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub change_24h: Option<f64>,

    /// 24h traded volume in quote currency.
    #[serde(
        rename = "volumeQuote",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub volume_quote: Option<f64>,

    /// Current funding rate as a fraction. Positive means longs pay.
    #[serde(
        rename = "fundingRate",
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub funding_rate: Option<f64>,
}

/// Whether a ticker's mark price can drive entries and exits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceUsability {
    Usable(f64),
    Missing,
    NonPositive,
}

impl PriceUsability {
    pub fn price(self) -> Option<f64> {
        match self {
            Self::Usable(p) => Some(p),
            Self::Missing | Self::NonPositive => None,
        }
    }

    pub fn is_usable(self) -> bool {
        matches!(self, Self::Usable(_))
    }
}

impl Ticker {
    /// Ticker with only a mark price set.
    pub fn with_mark(price: f64) -> Self {
        Self {
            mark_price: Some(price),
            ..Self::default()
        }
    }

    pub fn change(mut self, change_24h: f64) -> Self {
        self.change_24h = Some(change_24h);
        self
    }

    pub fn volume(mut self, volume_quote: f64) -> Self {
        self.volume_quote = Some(volume_quote);
        self
    }

    pub fn funding(mut self, funding_rate: f64) -> Self {
        self.funding_rate = Some(funding_rate);
        self
    }

    /// Classify the mark price. Non-finite values never reach here (the
    /// deserializer drops them), but values set in code are checked too.
    pub fn price_usability(&self) -> PriceUsability {
        match self.mark_price {
            None => PriceUsability::Missing,
            Some(p) if p.is_finite() && p > 0.0 => PriceUsability::Usable(p),
            Some(_) => PriceUsability::NonPositive,
        }
    }

    /// Mark price, only when usable.
    pub fn usable_mark_price(&self) -> Option<f64> {
        self.price_usability().price()
    }
}

/// One tick of market data: capture time plus tickers ordered by symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Retrieval time; the ledger's clock for cooldowns and timestamps.
    pub taken_at: DateTime<Utc>,
    /// Tickers keyed by exchange symbol.
    #[serde(default)]
    pub tickers: BTreeMap<String, Ticker>,
}

impl MarketSnapshot {
    pub fn new(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            tickers: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with_ticker(mut self, symbol: impl Into<String>, ticker: Ticker) -> Self {
        self.tickers.insert(symbol.into(), ticker);
        self
    }

    pub fn insert(&mut self, symbol: impl Into<String>, ticker: Ticker) {
        self.tickers.insert(symbol.into(), ticker);
    }

    pub fn get(&self, symbol: &str) -> Option<&Ticker> {
        self.tickers.get(symbol)
    }

    /// Usable mark price for `symbol`, `None` if the symbol is absent or unusable.
    pub fn mark_price(&self, symbol: &str) -> Option<f64> {
        self.tickers.get(symbol).and_then(Ticker::usable_mark_price)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.tickers.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(numeric_value))
}

fn numeric_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}
