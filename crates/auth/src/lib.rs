//! OAuth identity reconciliation, account linking, and sessions.
//!
//! Every provider callback is resolved to exactly one member inside a
//! single transaction: an existing provider identity, the member that
//! asked to link, the member owning the email, or a new registration.
//!
//! ## Domain Types
//!
//! - [`Member`] — Registered account
//! - [`Identity`] — Provider account bound to a member
//! - [`External`] — Identity asserted by a provider for one callback
//! - [`Patch`] — Partial profile update
//!
//! ## Storage
//!
//! - [`IdentityStore`] — Transactional store operations
//! - [`Backend`] — Transaction source, with [`atomic`] as the scoped guard
//! - [`Memory`] — In-process backend
//!
//! ## Reconciliation
//!
//! - [`reconcile`] — Provider callback to member
//! - [`accounts`] — Profile, linked accounts, unlinking
//! - [`username`] — Username derivation
//!
//! ## Sessions
//!
//! - [`Session`] — Principal, linking intent, and OAuth state
//! - [`Crypto`] — Signed session payloads
//! - [`Claims`] — Session wire format
mod claims;
mod crypto;
mod dto;
mod engine;
mod error;
mod external;
mod identity;
mod member;
mod memory;
mod patch;
mod provider;
mod session;
mod snapshot;
mod store;
mod visibility;
pub mod accounts;
pub mod username;

pub use claims::*;
pub use crypto::*;
pub use dto::*;
pub use engine::*;
pub use error::*;
pub use external::*;
pub use identity::*;
pub use member::*;
pub use memory::*;
pub use patch::*;
pub use provider::*;
pub use session::*;
pub use snapshot::*;
pub use store::*;
pub use visibility::*;

#[cfg(feature = "database")]
mod repository;

#[cfg(feature = "server")]
mod google;
#[cfg(feature = "server")]
mod handlers;
#[cfg(feature = "server")]
mod middleware;
#[cfg(feature = "server")]
pub use google::*;
#[cfg(feature = "server")]
pub use handlers::*;
#[cfg(feature = "server")]
pub use middleware::*;
