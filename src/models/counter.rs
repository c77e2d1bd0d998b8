//! Counter ledger domain models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key of the shared configuration value. Never usable as a counter name.
pub const VALUE_PER_CLICK_KEY: &str = "valuePerClick";

/// Value per click used when none has been stored
pub const DEFAULT_VALUE_PER_CLICK: f64 = 0.5;

/// Per-name click counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCounter {
    /// Unique counter name (exact match, case-sensitive)
    pub name: String,

    /// Current state
    #[serde(flatten)]
    pub state: CounterState,
}

impl NamedCounter {
    /// Create a fresh counter with zero clicks
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: CounterState::default(),
        }
    }
}

/// Count and last click time of a counter, as exposed by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterState {
    /// Number of clicks since creation or last reset
    pub count: u64,

    /// Time of the latest click (None after creation or reset)
    pub last_clicked_at: Option<DateTime<Utc>>,
}

/// Snapshot of all counters keyed by name
pub type CounterMap = BTreeMap<String, CounterState>;

/// Shared ledger configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSettings {
    /// Reward per click shared by all counters
    pub value_per_click: f64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            value_per_click: DEFAULT_VALUE_PER_CLICK,
        }
    }
}

/// Body of `POST /api/add`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AddNameRequest {
    pub name: String,
}
