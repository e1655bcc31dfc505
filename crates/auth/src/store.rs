use super::*;
use sk_core::ID;

/// Identity store operations, executed inside one transaction.
///
/// Lookups report absence as `Ok(None)`. Mutations report absence as
/// [`StoreError::NotFound`] and constraint violations as the matching
/// typed variant.
#[allow(async_fn_in_trait)]
pub trait IdentityStore {
    /// Finds the identity bound to `(provider, subject)`.
    async fn identity(&self, provider: &str, subject: &str) -> Result<Option<Identity>, StoreError>;
    /// Lists a member's identities ordered by provider name.
    async fn identities(&self, user: ID<Member>) -> Result<Vec<Identity>, StoreError>;
    /// Inserts a new identity. Fails with `IdentityConflict` if the
    /// provider account is taken, else `ProviderSlotTaken` if the member
    /// already holds an identity for that provider.
    async fn attach(&self, identity: &Identity) -> Result<ID<Identity>, StoreError>;
    /// Replaces the provider snapshot of an identity.
    async fn refresh(&self, identity: ID<Identity>, snapshot: &Snapshot) -> Result<(), StoreError>;
    /// Removes a member's identity for `provider`, refusing to remove the last one.
    async fn detach(&self, user: ID<Member>, provider: &str) -> Result<(), StoreError>;
    async fn member(&self, id: ID<Member>) -> Result<Option<Member>, StoreError>;
    async fn member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError>;
    /// Inserts a new member. Fails with `UsernameTaken` or `EmailTaken`.
    async fn register(&self, member: &Member) -> Result<ID<Member>, StoreError>;
    /// Stamps the member's last login with the current time.
    async fn touch(&self, user: ID<Member>) -> Result<(), StoreError>;
    /// Applies a validated profile patch.
    async fn amend(&self, user: ID<Member>, patch: &Patch) -> Result<(), StoreError>;
}

/// Source of transactions for an [`IdentityStore`].
///
/// Dropping a transaction without calling [`commit`](Backend::commit)
/// or [`rollback`](Backend::rollback) must discard its writes.
#[allow(async_fn_in_trait)]
pub trait Backend {
    type Tx: IdentityStore;
    async fn begin(&self) -> Result<Self::Tx, StoreError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;
}

/// Runs `body` in one transaction. Commits only when `body` returns `Ok`.
///
/// An `Err` rolls back explicitly. A panic or a cancelled future drops
/// the transaction, which the backend rolls back. A failed commit fails
/// the whole call.
pub async fn atomic<B, T, F>(backend: &B, body: F) -> Result<T, AuthError>
where
    B: Backend,
    F: AsyncFnOnce(&B::Tx) -> Result<T, AuthError>,
{
    let tx = backend.begin().await.map_err(AuthError::Transaction)?;
    match body(&tx).await {
        Ok(value) => {
            backend.commit(tx).await.map_err(AuthError::Transaction)?;
            Ok(value)
        }
        Err(e) => {
            log::warn!("rolling back transaction: {}", e);
            if let Err(rb) = backend.rollback(tx).await {
                log::error!("rollback failed: {}", rb);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commits_on_success() {
        let memory = Memory::default();
        let member = Member::new(ID::default(), "ada".into(), None);
        let id = atomic(&memory, async |tx| {
            tx.register(&member).await.map_err(AuthError::store("register"))
        })
        .await
        .unwrap();
        assert_eq!(id, sk_core::Unique::id(&member));
        assert_eq!(memory.counts().await, (1, 0));
    }
    #[tokio::test]
    async fn rolls_back_on_error() {
        let memory = Memory::default();
        let member = Member::new(ID::default(), "ada".into(), None);
        let result = atomic(&memory, async |tx| {
            tx.register(&member).await.map_err(AuthError::store("register"))?;
            Err::<(), _>(AuthError::Invariant("forced"))
        })
        .await;
        assert!(matches!(result, Err(AuthError::Invariant("forced"))));
        assert_eq!(memory.counts().await, (0, 0));
    }
    #[tokio::test]
    async fn failed_commit_fails_the_call() {
        let memory = Memory::default();
        memory.inject(Fault::Commit);
        let member = Member::new(ID::default(), "ada".into(), None);
        let result = atomic(&memory, async |tx| {
            tx.register(&member).await.map_err(AuthError::store("register"))
        })
        .await;
        assert!(matches!(result, Err(AuthError::Transaction(_))));
        assert_eq!(memory.counts().await, (0, 0));
    }
}
