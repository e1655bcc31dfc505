use super::*;
use sk_core::ID;
use sk_core::Unique;
use std::time::SystemTime;

/// Binding of one provider account to exactly one [`Member`].
///
/// The pair `(provider, subject)` is globally unique, and a member holds
/// at most one identity per provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    id: ID<Self>,
    user: ID<Member>,
    provider: String,
    subject: String,
    snapshot: Snapshot,
    created: SystemTime,
    updated: SystemTime,
}

impl Identity {
    /// New binding of `external` to `user`.
    pub fn bind(user: ID<Member>, external: &External) -> Self {
        let now = SystemTime::now();
        Self {
            id: ID::default(),
            user,
            provider: external.provider().to_string(),
            subject: external.subject().to_string(),
            snapshot: external.snapshot(),
            created: now,
            updated: now,
        }
    }
    pub fn user(&self) -> ID<Member> {
        self.user
    }
    pub fn provider(&self) -> &str {
        &self.provider
    }
    pub fn subject(&self) -> &str {
        &self.subject
    }
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
    pub fn created(&self) -> SystemTime {
        self.created
    }
    pub fn updated(&self) -> SystemTime {
        self.updated
    }
    pub(crate) fn refresh(&mut self, snapshot: Snapshot, at: SystemTime) {
        self.snapshot = snapshot;
        self.updated = at;
    }
}

impl Unique for Identity {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(feature = "database")]
mod schema {
    use super::*;
    use sk_database::*;

    /// Column list matching [`Identity::from`] for a row.
    pub const IDENTITY_COLUMNS: &str = "id, user_id, provider_name, provider_user_id, provider_email, provider_display_name, provider_avatar_url, created_at, updated_at";

    impl From<&tokio_postgres::Row> for Identity {
        fn from(row: &tokio_postgres::Row) -> Self {
            Self {
                id: ID::from(row.get::<_, uuid::Uuid>(0)),
                user: ID::from(row.get::<_, uuid::Uuid>(1)),
                provider: row.get(2),
                subject: row.get(3),
                snapshot: Snapshot {
                    email: row.get(4),
                    name: row.get(5),
                    avatar: row.get(6),
                },
                created: row.get(7),
                updated: row.get(8),
            }
        }
    }

    impl Schema for Identity {
        fn name() -> &'static str {
            IDENTITIES
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                IDENTITIES,
                " (
                    id                      UUID PRIMARY KEY,
                    user_id                 UUID NOT NULL REFERENCES ",
                USERS,
                "(id) ON DELETE CASCADE,
                    provider_name           VARCHAR(50) NOT NULL,
                    provider_user_id        VARCHAR(255) NOT NULL,
                    provider_email          VARCHAR(255),
                    provider_display_name   VARCHAR(255),
                    provider_avatar_url     TEXT,
                    created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    CONSTRAINT uq_identities_provider UNIQUE (provider_name, provider_user_id),
                    CONSTRAINT uq_identities_user_provider UNIQUE (user_id, provider_name)
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_identities_user ON ",
                IDENTITIES,
                " (user_id);"
            )
        }
    }
}
#[cfg(feature = "database")]
pub use schema::IDENTITY_COLUMNS;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_copies_external() {
        let user = ID::<Member>::default();
        let ext = External::new("google", "g1").with_email("a@x.com");
        let identity = Identity::bind(user, &ext);
        assert_eq!(identity.user(), user);
        assert_eq!(identity.provider(), "google");
        assert_eq!(identity.subject(), "g1");
        assert_eq!(identity.snapshot().email.as_deref(), Some("a@x.com"));
    }
}
