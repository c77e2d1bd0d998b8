//! Domain models for click-ledger
//!
//! This module contains the core domain models used throughout the application.

pub mod counter;
pub mod user;

// Re-export commonly used types
pub use counter::{
    AddNameRequest, CounterMap, CounterState, LedgerSettings, NamedCounter,
    DEFAULT_VALUE_PER_CLICK, VALUE_PER_CLICK_KEY,
};
pub use user::{Credentials, Identity, LoginResponse, Session, User};
