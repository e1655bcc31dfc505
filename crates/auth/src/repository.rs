use super::*;
use sk_core::ID;
use sk_core::Unique;
use sk_database::*;
use tokio_postgres::types::ToSql;

impl Backend for Postgres {
    type Tx = Tx;
    async fn begin(&self) -> Result<Tx, StoreError> {
        Postgres::begin(self).await.map_err(StoreError::from)
    }
    async fn commit(&self, tx: Tx) -> Result<(), StoreError> {
        tx.commit().await.map_err(StoreError::from)
    }
    async fn rollback(&self, tx: Tx) -> Result<(), StoreError> {
        tx.rollback().await.map_err(StoreError::from)
    }
}

/// Runs one statement under a savepoint so its failure leaves the
/// enclosing transaction usable.
async fn softly(tx: &Tx, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, StoreError> {
    tx.batch_execute("SAVEPOINT soft").await?;
    match tx.execute(sql, params).await {
        Ok(n) => {
            tx.batch_execute("RELEASE SAVEPOINT soft").await?;
            Ok(n)
        }
        Err(e) => {
            tx.batch_execute("ROLLBACK TO SAVEPOINT soft").await?;
            Err(StoreError::from(e))
        }
    }
}

impl IdentityStore for Tx {
    async fn identity(&self, provider: &str, subject: &str) -> Result<Option<Identity>, StoreError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ",
                IDENTITY_COLUMNS,
                " FROM ",
                IDENTITIES,
                " WHERE provider_name = $1 AND provider_user_id = $2"
            ),
            &[&provider, &subject],
        )
        .await
        .map(|opt| opt.as_ref().map(Identity::from))
        .map_err(StoreError::from)
    }

    async fn identities(&self, user: ID<Member>) -> Result<Vec<Identity>, StoreError> {
        self.query(
            const_format::concatcp!(
                "SELECT ",
                IDENTITY_COLUMNS,
                " FROM ",
                IDENTITIES,
                " WHERE user_id = $1 ORDER BY provider_name"
            ),
            &[&user.inner()],
        )
        .await
        .map(|rows| rows.iter().map(Identity::from).collect())
        .map_err(StoreError::from)
    }

    async fn attach(&self, identity: &Identity) -> Result<ID<Identity>, StoreError> {
        let snapshot = identity.snapshot();
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                IDENTITIES,
                " (id, user_id, provider_name, provider_user_id, provider_email, provider_display_name, provider_avatar_url, created_at, updated_at)",
                " VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
            ),
            &[
                &identity.id().inner(),
                &identity.user().inner(),
                &identity.provider(),
                &identity.subject(),
                &snapshot.email,
                &snapshot.name,
                &snapshot.avatar,
                &identity.created(),
                &identity.updated(),
            ],
        )
        .await?;
        log::info!("attached {} identity to user {}", identity.provider(), identity.user());
        Ok(identity.id())
    }

    async fn refresh(&self, identity: ID<Identity>, snapshot: &Snapshot) -> Result<(), StoreError> {
        let n = softly(
            self,
            const_format::concatcp!(
                "UPDATE ",
                IDENTITIES,
                " SET provider_email = $1, provider_display_name = $2, provider_avatar_url = $3, updated_at = NOW()",
                " WHERE id = $4"
            ),
            &[&snapshot.email, &snapshot.name, &snapshot.avatar, &identity.inner()],
        )
        .await?;
        match n {
            0 => Err(StoreError::NotFound("identity")),
            _ => Ok(()),
        }
    }

    async fn detach(&self, user: ID<Member>, provider: &str) -> Result<(), StoreError> {
        let owned = self
            .query_one(
                const_format::concatcp!(
                    "SELECT COUNT(*) FROM (SELECT 1 FROM ",
                    IDENTITIES,
                    " WHERE user_id = $1 FOR UPDATE) AS owned"
                ),
                &[&user.inner()],
            )
            .await?
            .get::<_, i64>(0);
        if owned <= 1 {
            log::warn!("refusing to detach the last identity of user {}", user);
            return Err(StoreError::LastIdentity);
        }
        let n = self
            .execute(
                const_format::concatcp!(
                    "DELETE FROM ",
                    IDENTITIES,
                    " WHERE user_id = $1 AND provider_name = $2"
                ),
                &[&user.inner(), &provider],
            )
            .await?;
        match n {
            0 => Err(StoreError::NotFound("identity")),
            _ => {
                log::info!("detached {} identity from user {}", provider, user);
                Ok(())
            }
        }
    }

    async fn member(&self, id: ID<Member>) -> Result<Option<Member>, StoreError> {
        self.query_opt(
            const_format::concatcp!("SELECT ", MEMBER_COLUMNS, " FROM ", USERS, " WHERE id = $1"),
            &[&id.inner()],
        )
        .await
        .map(|opt| opt.as_ref().map(Member::from))
        .map_err(StoreError::from)
    }

    async fn member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError> {
        self.query_opt(
            const_format::concatcp!("SELECT ", MEMBER_COLUMNS, " FROM ", USERS, " WHERE email = $1"),
            &[&email],
        )
        .await
        .map(|opt| opt.as_ref().map(Member::from))
        .map_err(StoreError::from)
    }

    async fn register(&self, member: &Member) -> Result<ID<Member>, StoreError> {
        if member.username().trim().is_empty() {
            return Err(StoreError::Invalid("username cannot be empty".to_string()));
        }
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                USERS,
                " (id, username, email, display_name, avatar_url, stats_privacy, created_at, updated_at)",
                " VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            ),
            &[
                &member.id().inner(),
                &member.username(),
                &member.email(),
                &member.display(),
                &member.avatar(),
                &member.visibility().as_str(),
                &member.created(),
                &member.updated(),
            ],
        )
        .await?;
        log::info!("registered user {} ({})", member.id(), member.username());
        Ok(member.id())
    }

    async fn touch(&self, user: ID<Member>) -> Result<(), StoreError> {
        let n = softly(
            self,
            const_format::concatcp!(
                "UPDATE ",
                USERS,
                " SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1"
            ),
            &[&user.inner()],
        )
        .await?;
        match n {
            0 => Err(StoreError::NotFound("user")),
            _ => Ok(()),
        }
    }

    async fn amend(&self, user: ID<Member>, patch: &Patch) -> Result<(), StoreError> {
        let n = self
            .execute(
                const_format::concatcp!(
                    "UPDATE ",
                    USERS,
                    " SET display_name  = COALESCE($2, display_name),",
                    "     avatar_url    = COALESCE($3, avatar_url),",
                    "     stats_privacy = COALESCE($4, stats_privacy),",
                    "     ui_theme      = COALESCE($5, ui_theme),",
                    "     color_theme   = COALESCE($6, color_theme),",
                    "     updated_at    = NOW()",
                    " WHERE id = $1"
                ),
                &[
                    &user.inner(),
                    &patch.display_name,
                    &patch.avatar_url,
                    &patch.stats_privacy.map(|v| v.as_str()),
                    &patch.ui_theme,
                    &patch.color_theme,
                ],
            )
            .await?;
        match n {
            0 => Err(StoreError::NotFound("user")),
            _ => {
                log::debug!("amended profile of user {}", user);
                Ok(())
            }
        }
    }
}
