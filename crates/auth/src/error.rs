/// Failures reported by an [`IdentityStore`](crate::IdentityStore).
///
/// Unique-constraint violations arrive already classified, so callers
/// match on variants instead of inspecting database error codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("username is already taken")]
    UsernameTaken,
    #[error("email is already registered")]
    EmailTaken,
    #[error("provider identity is already linked")]
    IdentityConflict,
    #[error("user already has an identity for this provider")]
    ProviderSlotTaken,
    #[error("cannot remove the last linked identity")]
    LastIdentity,
    #[error("invalid input: {0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Database(String),
}

#[cfg(feature = "database")]
impl From<sk_database::PgErr> for StoreError {
    fn from(e: sk_database::PgErr) -> Self {
        match sk_database::violation(&e) {
            Some("uq_users_username") => Self::UsernameTaken,
            Some("uq_users_email") => Self::EmailTaken,
            Some("uq_identities_provider") => Self::IdentityConflict,
            Some("uq_identities_user_provider") => Self::ProviderSlotTaken,
            Some(other) => Self::Database(format!("unique violation on {}", other)),
            None => Self::Database(e.to_string()),
        }
    }
}

#[cfg(feature = "database")]
impl From<sk_database::DbError> for StoreError {
    fn from(e: sk_database::DbError) -> Self {
        match e {
            sk_database::DbError::Postgres(e) => Self::from(e),
            e => Self::Database(e.to_string()),
        }
    }
}

/// Conflicts the caller can act on. Each carries a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    #[error("this {provider} account is already linked to a different user")]
    Linked { provider: String },
    #[error("this {provider} account was linked by a concurrent sign-in, please try again")]
    Race { provider: String },
    #[error("a different {provider} account is already linked to this user; unlink it first")]
    Occupied { provider: String },
    #[error("that username is already taken")]
    UsernameTaken,
    #[error("an account with that email already exists")]
    EmailTaken,
    #[error("cannot unlink your only sign-in method")]
    LastIdentity,
}

/// Failures of reconciliation, account settings, and the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Conflict(#[from] Conflict),
    #[error("transaction failed: {0}")]
    Transaction(StoreError),
    #[error("invariant violated: {0}")]
    Invariant(&'static str),
    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("not authenticated")]
    Unauthenticated,
    #[error("{0}")]
    Invalid(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("provider error: {0}")]
    Provider(String),
}

impl AuthError {
    /// Wraps a store failure that has no more specific meaning to the caller.
    pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| match source {
            StoreError::Invalid(message) => Self::Invalid(message),
            source => Self::Store { context, source },
        }
    }
    /// Message safe to show to the client.
    pub fn public(&self) -> String {
        match self {
            Self::Conflict(c) => c.to_string(),
            Self::NotFound(what) => format!("{} not found", what),
            Self::Unauthenticated => "authentication required".to_string(),
            Self::Invalid(message) => message.clone(),
            Self::Provider(_) => "could not complete sign-in with the provider".to_string(),
            _ => "an internal error occurred, please try again later".to_string(),
        }
    }
}

#[cfg(feature = "server")]
impl actix_web::ResponseError for AuthError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            Self::Conflict(Conflict::LastIdentity) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
    fn error_response(&self) -> actix_web::HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("request failed: {}", self);
        }
        actix_web::HttpResponse::build(self.status_code()).json(crate::Envelope::<()>::failure(self.public()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internals_are_not_exposed() {
        let e = AuthError::Transaction(StoreError::Database("connection reset by peer".into()));
        assert!(!e.public().contains("connection"));
        let e = AuthError::Invariant("user missing after branch");
        assert!(!e.public().contains("branch"));
    }
    #[test]
    fn conflicts_are_actionable() {
        let e = AuthError::from(Conflict::Linked { provider: "google".into() });
        assert_eq!(e.public(), "this google account is already linked to a different user");
        let e = AuthError::from(Conflict::Occupied { provider: "google".into() });
        assert!(e.public().contains("unlink it first"));
    }
    #[test]
    fn invalid_input_passes_through_store_context() {
        let e = AuthError::store("amend")(StoreError::Invalid("bad theme".into()));
        assert!(matches!(e, AuthError::Invalid(ref m) if m == "bad theme"));
        let e = AuthError::store("amend")(StoreError::Database("boom".into()));
        assert!(matches!(e, AuthError::Store { context: "amend", .. }));
    }
}
