//! Process-wide exchange rate state: the only mutation path into rates,
//! symbols, fetch lifecycle, and the user's conversion selection.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::core::convert::{self, Conversion, ConvertError};
use crate::core::provider::{RateProvider, RateTable, SymbolTable, normalize_code};
use crate::providers::util::with_retry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

/// The user's current conversion intent. Base and target may legitimately
/// name currencies that are not (yet) present in the rate table.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub base: String,
    pub target: String,
    pub amount: Option<f64>,
}

/// One entry for a currency picker, derived from the symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyOption {
    pub code: String,
    pub name: String,
}

/// A consistent view of the whole store, published as one value so readers
/// never observe a partial update.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub rates: RateTable,
    pub symbols: SymbolTable,
    pub status: FetchStatus,
    pub error: Option<String>,
    pub selection: Selection,
    pub last_updated: Option<DateTime<Utc>>,
}

pub struct RateStore {
    provider: Arc<dyn RateProvider>,
    anchor: String,
    retries: usize,
    retry_delay_ms: u64,
    /// Bumped at every `load`; a fetch whose generation is no longer current
    /// has been superseded and its result is dropped on arrival.
    generation: AtomicU64,
    state: watch::Sender<Snapshot>,
}

impl RateStore {
    pub fn new(provider: Arc<dyn RateProvider>, config: &AppConfig) -> Self {
        let initial = Snapshot {
            rates: RateTable::new(),
            symbols: SymbolTable::new(),
            status: FetchStatus::Idle,
            error: None,
            selection: Selection {
                base: normalize_code(&config.base_currency),
                target: normalize_code(&config.target_currency),
                amount: None,
            },
            last_updated: None,
        };
        let (state, _) = watch::channel(initial);

        RateStore {
            provider,
            anchor: normalize_code(&config.anchor),
            retries: config.provider.retries,
            retry_delay_ms: config.provider.retry_delay_ms,
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Fetches symbols and rates concurrently and applies the outcome as one
    /// transition. Both fetches must succeed; the first error wins otherwise,
    /// leaving any previously loaded tables untouched.
    ///
    /// Reloading while a fetch is in flight supersedes it rather than
    /// cancelling it: the superseded result is discarded when it arrives, so
    /// the store always reflects the most recently initiated load.
    pub async fn load(&self) -> FetchStatus {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // Both transitions check the generation under the channel lock, so a
        // load that was superseded before it even flipped to pending cannot
        // overwrite a newer load's state.
        self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.status = FetchStatus::Pending;
            s.error = None;
            true
        });
        debug!(generation, anchor = %self.anchor, "Loading rates");

        let fetched = tokio::try_join!(
            with_retry(
                || self.provider.fetch_symbols(),
                self.retries,
                self.retry_delay_ms,
            ),
            with_retry(
                || self.provider.fetch_rates(&self.anchor),
                self.retries,
                self.retry_delay_ms,
            ),
        );

        let mut status = FetchStatus::Pending;
        self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(generation, "Discarding superseded fetch result");
                status = s.status;
                return false;
            }
            match fetched {
                Ok((symbols, rates)) => {
                    debug!(
                        symbols = symbols.len(),
                        rates = rates.len(),
                        "Rates loaded"
                    );
                    s.symbols = symbols;
                    s.rates = rates;
                    s.status = FetchStatus::Succeeded;
                    s.last_updated = Some(Utc::now());
                }
                Err(err) => {
                    warn!(error = %err, "Rate fetch failed");
                    s.status = FetchStatus::Failed;
                    s.error = Some(err.to_string());
                }
            }
            status = s.status;
            true
        });
        status
    }

    pub fn set_base_currency(&self, code: &str) {
        let code = normalize_code(code);
        self.state.send_modify(|s| s.selection.base = code);
    }

    pub fn set_target_currency(&self, code: &str) {
        let code = normalize_code(code);
        self.state.send_modify(|s| s.selection.target = code);
    }

    /// Updates the amount to convert. Negative or non-finite values are
    /// ignored and the previous amount kept; `None` clears it.
    pub fn set_amount(&self, amount: Option<f64>) {
        self.state.send_if_modified(|s| {
            if let Some(value) = amount
                && !(value.is_finite() && value >= 0.0)
            {
                warn!(value, "Ignoring invalid amount");
                return false;
            }
            s.selection.amount = amount;
            true
        });
    }

    /// Exchanges base and target in one transition.
    pub fn swap(&self) {
        self.state
            .send_modify(|s| std::mem::swap(&mut s.selection.base, &mut s.selection.target));
    }

    /// Runs the conversion engine over the current selection and rate table.
    pub fn convert(&self) -> Result<Conversion, ConvertError> {
        let s = self.state.borrow();
        convert::convert(s.selection.amount, &s.selection.base, &s.selection.target, &s.rates)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    pub fn rates(&self) -> RateTable {
        self.state.borrow().rates.clone()
    }

    pub fn symbols(&self) -> SymbolTable {
        self.state.borrow().symbols.clone()
    }

    pub fn selection(&self) -> Selection {
        self.state.borrow().selection.clone()
    }

    pub fn status(&self) -> FetchStatus {
        self.state.borrow().status
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Timestamp of the last successful fetch, if any.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.borrow().last_updated
    }

    /// Code-sorted picker entries built from the symbol table.
    pub fn currency_options(&self) -> Vec<CurrencyOption> {
        let mut options: Vec<CurrencyOption> = self
            .state
            .borrow()
            .symbols
            .iter()
            .map(|(code, name)| CurrencyOption {
                code: code.clone(),
                name: name.clone(),
            })
            .collect();
        options.sort_by(|a, b| a.code.cmp(&b.code));
        options
    }

    /// Subscribes to store changes. Every committed mutation publishes a new
    /// snapshot; rejected mutations publish nothing.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }
}
