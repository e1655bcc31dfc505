//! Account settings: profile, linked providers, and unlinking.
use super::*;
use sk_core::ID;

/// Current profile of `user`.
pub async fn profile<B: Backend>(backend: &B, user: ID<Member>) -> Result<Member, AuthError> {
    atomic(backend, async |tx| {
        tx.member(user)
            .await
            .map_err(AuthError::store("fetch user"))?
            .ok_or(AuthError::NotFound("user"))
    })
    .await
}

/// Provider identities bound to `user`, ordered by provider name.
pub async fn linked<B: Backend>(backend: &B, user: ID<Member>) -> Result<Vec<Identity>, AuthError> {
    atomic(backend, async |tx| {
        tx.identities(user)
            .await
            .map_err(AuthError::store("list identities"))
    })
    .await
}

/// Removes the `provider` identity of `user`, keeping at least one.
pub async fn unlink<B: Backend>(backend: &B, user: ID<Member>, provider: &str) -> Result<(), AuthError> {
    atomic(backend, async |tx| {
        tx.detach(user, provider).await.map_err(|e| match e {
            StoreError::LastIdentity => AuthError::from(Conflict::LastIdentity),
            StoreError::NotFound(what) => AuthError::NotFound(what),
            e => AuthError::store("detach identity")(e),
        })
    })
    .await?;
    log::info!("user {} unlinked {}", user, provider);
    Ok(())
}

/// Applies `patch` to the profile of `user` and returns the result.
/// An empty patch changes nothing.
pub async fn amend<B: Backend>(backend: &B, user: ID<Member>, patch: Patch) -> Result<Member, AuthError> {
    let patch = patch.validate().map_err(AuthError::store("validate patch"))?;
    atomic(backend, async |tx| {
        if patch.is_empty() {
            log::debug!("empty profile patch for user {}", user);
        } else {
            tx.amend(user, &patch).await.map_err(|e| match e {
                StoreError::NotFound(what) => AuthError::NotFound(what),
                e => AuthError::store("amend profile")(e),
            })?;
        }
        tx.member(user)
            .await
            .map_err(AuthError::store("fetch user"))?
            .ok_or(AuthError::NotFound("user"))
    })
    .await
}
