pub mod config;
pub mod core;
pub mod log;
pub mod providers;
pub mod store;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::providers::exchange_rates_api::ExchangeRatesApiProvider;
use crate::store::RateStore;

/// Builds a ready-to-use [`RateStore`] from configuration on disk. The
/// embedding presentation layer calls `load()` on it and subscribes for
/// snapshots from there.
pub fn init(config_path: Option<&str>) -> Result<RateStore> {
    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    init_with_config(config)
}

/// Same as [`init`], for callers that assemble configuration themselves.
pub fn init_with_config(config: config::AppConfig) -> Result<RateStore> {
    info!("Initializing exchange rate store");
    debug!("Loaded config: {config:#?}");

    let provider = ExchangeRatesApiProvider::new(&config.provider)?;
    Ok(RateStore::new(Arc::new(provider), &config))
}
