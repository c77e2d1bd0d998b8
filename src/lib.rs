//! click-ledger - A session-authenticated click counter ledger
//!
//! This crate provides an HTTP/JSON service that tracks per-name click
//! counters and a shared reward value, with username/password login gating
//! every mutating operation.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod server;
