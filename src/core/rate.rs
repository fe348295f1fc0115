//! Exchange rate abstractions and core types

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Parameters of a single rate lookup.
#[derive(Clone, PartialEq, Eq)]
pub struct RateQuery {
    pub date: NaiveDate,
    pub token: String,
}

impl RateQuery {
    pub fn new(date: NaiveDate, token: impl Into<String>) -> Self {
        Self {
            date,
            token: token.into(),
        }
    }
}

// Keep the credential out of debug logs.
impl fmt::Debug for RateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateQuery")
            .field("date", &self.date)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Rate payload as returned by the remote service.
///
/// The object is kept exactly as received, key order included. The accessors
/// below only read the keys the service is known to publish and return `None`
/// when they are missing or have an unexpected type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRateResult(Map<String, Value>);

impl ExchangeRateResult {
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Buying rate (`compra`).
    pub fn buy(&self) -> Option<f64> {
        self.0.get("compra").and_then(Value::as_f64)
    }

    /// Selling rate (`venta`).
    pub fn sell(&self) -> Option<f64> {
        self.0.get("venta").and_then(Value::as_f64)
    }

    pub fn currency(&self) -> Option<&str> {
        self.0.get("moneda").and_then(Value::as_str)
    }

    pub fn date(&self) -> Option<&str> {
        self.0.get("fecha").and_then(Value::as_str)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    async fn get_exchange_rate(&self, query: &RateQuery)
    -> Result<ExchangeRateResult, FetchError>;
}
