//! Scorekeeping backend for the Skull King card game.
//!
//! This facade crate re-exports the workspace crates for convenient access.
//!
//! ## Crate Organization
//!
//! - [`core`] — Identifiers, constants, and runtime bootstrapping
//! - [`database`] — Connection pool, transactions, and schema DDL
//! - [`auth`] — Identity reconciliation, account linking, and sessions
//! - [`server`] — Configuration, rate limiting, and route assembly

pub use sk_core         as core;
pub use sk_database     as database;
pub use sk_auth         as auth;
pub use sk_server       as server;
