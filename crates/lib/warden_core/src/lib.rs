//! # warden_core
//!
//! Session and token lifecycle for Warden: credentials, bearer tokens, the
//! per-user token ledger and the record store behind them.

pub mod auth;
pub mod context;
pub mod geo;
pub mod ledger;
pub mod models;
pub mod records;
pub mod useragent;

pub use context::AuthContext;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
