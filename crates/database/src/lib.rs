//! PostgreSQL connectivity for the identity store.
//!
//! Connection pooling, scoped transactions, and schema DDL for the
//! tables that back users and their linked provider identities.
//!
//! ## Connectivity
//!
//! - [`Postgres`] — Bounded pool of dedicated connections
//! - [`Tx`] — Transaction guard that owns one connection
//!
//! ## Schema
//!
//! - [`Schema`] — Table metadata and DDL generation
//! - [`violation`] — Constraint name of a unique violation
//!
//! ## Table Names
//!
//! Constants for all persistent entities.
mod pool;
mod traits;
mod tx;

pub use pool::*;
pub use traits::*;
pub use tx::*;

/// PostgreSQL error type alias.
pub type PgErr = tokio_postgres::Error;

/// Failures of pool operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Postgres(#[from] PgErr),
    #[error("connection pool is closed")]
    Closed,
}

/// Returns the violated constraint when `err` is a unique violation (SQLSTATE 23505).
pub fn violation(err: &PgErr) -> Option<&str> {
    err.as_db_error()
        .filter(|db| *db.code() == tokio_postgres::error::SqlState::UNIQUE_VIOLATION)
        .and_then(|db| db.constraint())
}

/// Table for registered user accounts.
#[rustfmt::skip]
pub const USERS:      &str = "users";
/// Table for OAuth provider identities bound to users.
#[rustfmt::skip]
pub const IDENTITIES: &str = "user_provider_identities";
