//! Counter ledger
//!
//! Named click counters plus the shared `valuePerClick` setting. Each
//! operation is a single atomic change against the database.

use std::sync::Arc;

use chrono::Utc;

use crate::database::Database;
use crate::error::{DbError, LedgerError};
use crate::models::{CounterMap, LedgerSettings, NamedCounter, VALUE_PER_CLICK_KEY};

/// Counter ledger service
pub struct Ledger<D: Database> {
    db: Arc<D>,
    default_value_per_click: f64,
}

impl<D: Database> Ledger<D> {
    /// Create a ledger; `default_value_per_click` applies until a value is stored
    pub fn new(db: Arc<D>, default_value_per_click: f64) -> Self {
        Self {
            db,
            default_value_per_click,
        }
    }

    /// Snapshot of every counter keyed by name
    pub async fn list_counters(&self) -> Result<CounterMap, LedgerError> {
        let counters = self.db.list_counters().await?;

        Ok(counters
            .into_iter()
            .filter(|c| c.name != VALUE_PER_CLICK_KEY)
            .map(|c| (c.name, c.state))
            .collect())
    }

    /// Current settings, falling back to the default when none are stored
    pub async fn get_config(&self) -> Result<LedgerSettings, LedgerError> {
        let value_per_click = self
            .db
            .get_value_per_click()
            .await?
            .unwrap_or(self.default_value_per_click);

        Ok(LedgerSettings { value_per_click })
    }

    /// Overwrite the value per click
    pub async fn set_config(&self, settings: LedgerSettings) -> Result<LedgerSettings, LedgerError> {
        self.db
            .set_value_per_click(settings.value_per_click)
            .await?;

        tracing::info!(value_per_click = settings.value_per_click, "Config updated");
        Ok(settings)
    }

    /// Create a zeroed counter
    pub async fn add_counter(&self, name: &str) -> Result<NamedCounter, LedgerError> {
        if name.is_empty() {
            return Err(LedgerError::InvalidName("name must not be empty".into()));
        }
        if name == VALUE_PER_CLICK_KEY {
            return Err(LedgerError::ReservedName(name.to_string()));
        }

        match self.db.insert_counter(name).await {
            Ok(()) => {
                tracing::info!(name = %name, "Counter added");
                Ok(NamedCounter::new(name))
            }
            Err(DbError::ConstraintViolation(_)) => Err(LedgerError::NameExists(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Add one click to a counter and stamp the click time
    pub async fn increment(&self, name: &str) -> Result<NamedCounter, LedgerError> {
        if name == VALUE_PER_CLICK_KEY {
            return Err(LedgerError::NameNotFound(name.to_string()));
        }

        match self.db.increment_counter(name, Utc::now()).await {
            Ok(counter) => {
                tracing::debug!(name = %name, count = counter.state.count, "Counter incremented");
                Ok(counter)
            }
            Err(DbError::NotFound) => Err(LedgerError::NameNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Zero every counter; the settings are left untouched
    pub async fn reset(&self) -> Result<u64, LedgerError> {
        let reset = self.db.reset_counters().await?;

        tracing::info!(counters = reset, "Counters reset");
        Ok(reset)
    }

    /// Remove a counter
    pub async fn delete_counter(&self, name: &str) -> Result<(), LedgerError> {
        if name == VALUE_PER_CLICK_KEY {
            return Err(LedgerError::NameNotFound(name.to_string()));
        }

        match self.db.delete_counter(name).await {
            Ok(()) => {
                tracing::info!(name = %name, "Counter deleted");
                Ok(())
            }
            Err(DbError::NotFound) => Err(LedgerError::NameNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
