//! Rate provider abstractions

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Currency code mapped to its rate relative to the anchor currency.
///
/// Replaced wholesale on every successful fetch, never patched in place.
pub type RateTable = HashMap<String, f64>;

/// Currency code mapped to a human-readable display name.
pub type SymbolTable = HashMap<String, String>;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The service could not be reached, timed out, or refused the request.
    #[error("rate provider unavailable: {0}")]
    Unavailable(String),
    /// The service answered, but the payload is unusable.
    #[error("rate provider returned a bad response: {0}")]
    BadResponse(String),
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_symbols(&self) -> Result<SymbolTable, ProviderError>;
    async fn fetch_rates(&self, anchor: &str) -> Result<RateTable, ProviderError>;
}

/// Canonical form for currency codes throughout the crate.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
