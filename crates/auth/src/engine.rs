use super::*;
use sk_core::ID;
use sk_core::Unique;

/// Branch taken by a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Provider attached to the member that asked for it.
    Linked,
    /// Member re-linked a provider it already owns.
    Relinked,
    /// Known provider account signed in.
    Returning,
    /// Unknown provider account attached to the member owning its email.
    Merged,
    /// New member created.
    Registered,
}

impl Flow {
    pub fn linking(&self) -> bool {
        matches!(self, Self::Linked | Self::Relinked)
    }
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone)]
pub struct Outcome {
    member: Member,
    flow: Flow,
}

impl Outcome {
    pub fn member(&self) -> &Member {
        &self.member
    }
    pub fn flow(&self) -> Flow {
        self.flow
    }
    /// Frontend page to land on: settings after linking, home otherwise.
    pub fn redirect(&self, frontend: &str) -> String {
        let base = frontend.trim_end_matches('/');
        match self.flow.linking() {
            true => format!("{}/settings", base),
            false => format!("{}/", base),
        }
    }
}

/// Resolves a provider callback to a member and signs it into `session`.
///
/// Resolution order is exact provider identity, then linking intent,
/// then email owner, then a new registration. All store work runs in
/// one transaction. The linking intent is consumed whatever the result,
/// and `session` gains a principal only after the commit succeeds.
pub async fn reconcile<B: Backend>(
    backend: &B,
    external: &External,
    session: &mut Session,
) -> Result<Outcome, AuthError> {
    let target = session.intent(external.provider());
    let outcome = atomic(backend, async |tx| {
        let (user, flow) = match target {
            Some(target) => link(tx, target, external).await?,
            None => login(tx, external).await?,
        };
        if let Err(e) = tx.touch(user).await {
            log::warn!("could not update last login of user {}: {}", user, e);
        }
        let member = tx
            .member(user)
            .await
            .map_err(AuthError::store("fetch user"))?
            .ok_or_else(|| {
                log::error!("user {} vanished during reconciliation", user);
                AuthError::Invariant("resolved user missing after reconciliation")
            })?;
        Ok(Outcome { member, flow })
    })
    .await?;
    session.authenticate(outcome.member());
    log::info!(
        "{} sign-in resolved to user {} ({:?})",
        external.provider(),
        outcome.member().id(),
        outcome.flow()
    );
    Ok(outcome)
}

async fn link<S: IdentityStore>(
    tx: &S,
    target: ID<Member>,
    external: &External,
) -> Result<(ID<Member>, Flow), AuthError> {
    let found = tx
        .identity(external.provider(), external.subject())
        .await
        .map_err(AuthError::store("find identity"))?;
    match found {
        Some(identity) if identity.user() == target => {
            tx.refresh(identity.id(), &external.snapshot())
                .await
                .map_err(AuthError::store("refresh identity"))?;
            Ok((target, Flow::Relinked))
        }
        Some(identity) => {
            log::warn!(
                "{} account already owned by user {}, refusing link to user {}",
                external.provider(),
                identity.user(),
                target
            );
            Err(linked(external))
        }
        None => {
            tx.attach(&Identity::bind(target, external))
                .await
                .map_err(|e| match e {
                    StoreError::IdentityConflict => linked(external),
                    StoreError::ProviderSlotTaken => occupied(external),
                    e => AuthError::store("attach identity")(e),
                })?;
            Ok((target, Flow::Linked))
        }
    }
}

async fn login<S: IdentityStore>(
    tx: &S,
    external: &External,
) -> Result<(ID<Member>, Flow), AuthError> {
    let found = tx
        .identity(external.provider(), external.subject())
        .await
        .map_err(AuthError::store("find identity"))?;
    if let Some(identity) = found {
        if let Err(e) = tx.refresh(identity.id(), &external.snapshot()).await {
            log::warn!("could not refresh {} identity snapshot: {}", external.provider(), e);
        }
        return Ok((identity.user(), Flow::Returning));
    }
    let owner = match external.email() {
        Some(email) => tx
            .member_by_email(email)
            .await
            .map_err(AuthError::store("find user by email"))?,
        None => None,
    };
    let (user, flow) = match owner {
        Some(member) => (member.id(), Flow::Merged),
        None => (register(tx, external).await?, Flow::Registered),
    };
    tx.attach(&Identity::bind(user, external))
        .await
        .map_err(|e| match e {
            StoreError::IdentityConflict => {
                log::error!("{} identity appeared between lookup and insert", external.provider());
                AuthError::from(Conflict::Race {
                    provider: external.provider().to_string(),
                })
            }
            StoreError::ProviderSlotTaken => {
                log::warn!(
                    "user {} already holds a different {} identity",
                    user,
                    external.provider()
                );
                occupied(external)
            }
            e => AuthError::store("attach identity")(e),
        })?;
    Ok((user, flow))
}

/// One creation attempt. Taken usernames or emails surface as conflicts.
async fn register<S: IdentityStore>(tx: &S, external: &External) -> Result<ID<Member>, AuthError> {
    let username = username::candidate(external.handle(), external.email());
    tx.register(&Member::register(username, external))
        .await
        .map_err(|e| match e {
            StoreError::UsernameTaken => AuthError::from(Conflict::UsernameTaken),
            StoreError::EmailTaken => AuthError::from(Conflict::EmailTaken),
            e => AuthError::store("create user")(e),
        })
}

fn occupied(external: &External) -> AuthError {
    AuthError::from(Conflict::Occupied {
        provider: external.provider().to_string(),
    })
}

fn linked(external: &External) -> AuthError {
    AuthError::from(Conflict::Linked {
        provider: external.provider().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google(subject: &str) -> External {
        External::new("google", subject)
    }

    async fn signin(memory: &Memory, external: &External) -> (Outcome, Session) {
        let mut session = Session::default();
        let outcome = reconcile(memory, external, &mut session).await.unwrap();
        (outcome, session)
    }

    #[tokio::test]
    async fn fresh_identity_registers() {
        let memory = Memory::default();
        let ext = google("g1").with_email("a@x.com");
        let (outcome, session) = signin(&memory, &ext).await;
        assert_eq!(outcome.flow(), Flow::Registered);
        assert_eq!(memory.counts().await, (1, 1));
        let member = outcome.member();
        assert!(member.username().starts_with("user_"));
        assert_eq!(member.email(), Some("a@x.com"));
        assert!(member.login().is_some());
        assert_eq!(memory.identities().await[0].user(), member.id());
        assert_eq!(session.user(), Some(member.id()));
    }
    #[tokio::test]
    async fn returning_identity_signs_in() {
        let memory = Memory::default();
        let ext = google("g1").with_email("a@x.com");
        let (first, _) = signin(&memory, &ext).await;
        let (second, session) = signin(&memory, &ext).await;
        assert_eq!(second.flow(), Flow::Returning);
        assert_eq!(second.member().id(), first.member().id());
        assert_eq!(memory.counts().await, (1, 1));
        assert!(second.member().login() >= first.member().login());
        assert_eq!(session.user(), Some(first.member().id()));
    }
    #[tokio::test]
    async fn returning_identity_refreshes_snapshot() {
        let memory = Memory::default();
        signin(&memory, &google("g1").with_name("Ada")).await;
        signin(&memory, &google("g1").with_name("Ada L")).await;
        let identity = memory.identities().await.remove(0);
        assert_eq!(identity.snapshot().name.as_deref(), Some("Ada L"));
    }
    #[tokio::test]
    async fn matching_email_merges() {
        let memory = Memory::default();
        let (first, _) = signin(&memory, &External::new("github", "h1").with_email("a@x.com")).await;
        let (second, session) = signin(&memory, &google("g2").with_email("a@x.com")).await;
        assert_eq!(second.flow(), Flow::Merged);
        assert_eq!(second.member().id(), first.member().id());
        assert_eq!(memory.counts().await, (1, 2));
        assert_eq!(session.user(), Some(first.member().id()));
    }
    #[tokio::test]
    async fn provider_identity_beats_email() {
        let memory = Memory::default();
        let (owner, _) = signin(&memory, &google("g1").with_email("old@x.com")).await;
        let (other, _) = signin(&memory, &External::new("github", "h1").with_email("new@x.com")).await;
        let (again, _) = signin(&memory, &google("g1").with_email("new@x.com")).await;
        assert_eq!(again.flow(), Flow::Returning);
        assert_eq!(again.member().id(), owner.member().id());
        assert_ne!(again.member().id(), other.member().id());
        assert_eq!(memory.counts().await, (2, 2));
    }
    #[tokio::test]
    async fn unmatched_email_registers() {
        let memory = Memory::default();
        signin(&memory, &google("g1").with_email("a@x.com")).await;
        let (second, _) = signin(&memory, &google("g2").with_email("b@x.com")).await;
        assert_eq!(second.flow(), Flow::Registered);
        assert_eq!(memory.counts().await, (2, 2));
    }
    #[tokio::test]
    async fn link_attaches_to_target() {
        let memory = Memory::default();
        let (owner, mut session) = signin(&memory, &External::new("github", "h1")).await;
        session.link(owner.member().id(), "google");
        let outcome = reconcile(&memory, &google("g3").with_email("other@x.com"), &mut session)
            .await
            .unwrap();
        assert_eq!(outcome.flow(), Flow::Linked);
        assert_eq!(outcome.member().id(), owner.member().id());
        assert_eq!(memory.counts().await, (1, 2));
        assert_eq!(session.linking(), None);
        assert_eq!(outcome.redirect("http://app/"), "http://app/settings");
    }
    #[tokio::test]
    async fn link_to_foreign_identity_conflicts() {
        let memory = Memory::default();
        let (u1, _) = signin(&memory, &External::new("github", "h1")).await;
        let (u2, _) = signin(&memory, &google("g3")).await;
        let mut session = Session::default();
        session.authenticate(u1.member());
        session.link(u1.member().id(), "google");
        let result = reconcile(&memory, &google("g3"), &mut session).await;
        assert!(matches!(result, Err(AuthError::Conflict(Conflict::Linked { .. }))));
        assert_eq!(session.linking(), None);
        assert_eq!(session.user(), Some(u1.member().id()));
        let identities = memory.identities().await;
        assert_eq!(identities.len(), 2);
        assert!(identities.iter().any(|i| i.subject() == "g3" && i.user() == u2.member().id()));
        assert!(!identities.iter().any(|i| i.provider() == "google" && i.user() == u1.member().id()));
    }
    #[tokio::test]
    async fn relink_is_idempotent() {
        let memory = Memory::default();
        let (owner, _) = signin(&memory, &External::new("github", "h1")).await;
        for name in ["Ada", "Ada L"] {
            let mut session = Session::default();
            session.link(owner.member().id(), "google");
            reconcile(&memory, &google("g1").with_name(name), &mut session)
                .await
                .unwrap();
        }
        let identities = memory.identities().await;
        assert_eq!(identities.len(), 2);
        let bound = identities.iter().find(|i| i.provider() == "google").unwrap();
        assert_eq!(bound.user(), owner.member().id());
        assert_eq!(bound.snapshot().name.as_deref(), Some("Ada L"));
        let mut session = Session::default();
        session.link(owner.member().id(), "google");
        let third = reconcile(&memory, &google("g1"), &mut session).await.unwrap();
        assert_eq!(third.flow(), Flow::Relinked);
    }
    #[tokio::test]
    async fn mismatched_intent_falls_back_to_login() {
        let memory = Memory::default();
        let (owner, _) = signin(&memory, &External::new("github", "h1")).await;
        let mut session = Session::default();
        session.link(owner.member().id(), "discord");
        let outcome = reconcile(&memory, &google("g9"), &mut session).await.unwrap();
        assert_eq!(outcome.flow(), Flow::Registered);
        assert_ne!(outcome.member().id(), owner.member().id());
        assert_eq!(session.linking(), None);
        assert_eq!(outcome.redirect("http://app"), "http://app/");
    }
    #[tokio::test]
    async fn failure_after_registration_leaves_nothing() {
        let memory = Memory::default();
        memory.inject(Fault::Attach);
        let mut session = Session::default();
        let result = reconcile(&memory, &google("g1").with_email("a@x.com"), &mut session).await;
        assert!(matches!(result, Err(AuthError::Store { .. })));
        assert_eq!(memory.counts().await, (0, 0));
        assert_eq!(session, Session::default());
    }
    #[tokio::test]
    async fn failed_commit_establishes_no_session() {
        let memory = Memory::default();
        memory.inject(Fault::Commit);
        let mut session = Session::default();
        let result = reconcile(&memory, &google("g1"), &mut session).await;
        assert!(matches!(result, Err(AuthError::Transaction(_))));
        assert_eq!(session.user(), None);
        memory.heal();
        assert_eq!(memory.counts().await, (0, 0));
    }
    #[tokio::test]
    async fn last_login_failure_is_tolerated() {
        let memory = Memory::default();
        memory.inject(Fault::Touch);
        let (outcome, session) = signin(&memory, &google("g1")).await;
        assert_eq!(outcome.member().login(), None);
        assert_eq!(session.user(), Some(outcome.member().id()));
    }
    #[tokio::test]
    async fn login_refresh_failure_is_tolerated() {
        let memory = Memory::default();
        signin(&memory, &google("g1")).await;
        memory.inject(Fault::Refresh);
        let (outcome, _) = signin(&memory, &google("g1")).await;
        assert_eq!(outcome.flow(), Flow::Returning);
    }
    #[tokio::test]
    async fn relink_refresh_failure_is_fatal() {
        let memory = Memory::default();
        let (owner, _) = signin(&memory, &google("g1")).await;
        memory.inject(Fault::Refresh);
        let mut session = Session::default();
        session.link(owner.member().id(), "google");
        let result = reconcile(&memory, &google("g1"), &mut session).await;
        assert!(matches!(result, Err(AuthError::Store { .. })));
        assert_eq!(session.user(), None);
    }
    #[tokio::test]
    async fn taken_username_surfaces_conflict() {
        let memory = Memory::default();
        signin(&memory, &google("g1").with_nickname("ada_lovelace")).await;
        let mut session = Session::default();
        let result = reconcile(&memory, &google("g2").with_nickname("Ada Lovelace"), &mut session).await;
        assert!(matches!(result, Err(AuthError::Conflict(Conflict::UsernameTaken))));
        assert_eq!(memory.counts().await, (1, 1));
    }
    #[tokio::test]
    async fn linking_a_second_account_of_a_held_provider_is_occupied() {
        let memory = Memory::default();
        let (owner, _) = signin(&memory, &google("g1")).await;
        let mut session = Session::default();
        session.link(owner.member().id(), "google");
        let result = reconcile(&memory, &google("g5"), &mut session).await;
        match result {
            Err(AuthError::Conflict(conflict)) => {
                assert_eq!(conflict, Conflict::Occupied { provider: "google".into() });
                assert!(conflict.to_string().contains("unlink it first"));
            }
            other => panic!("expected occupied conflict, got {:?}", other.map(|o| o.flow())),
        }
        let identities = memory.identities().await;
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].subject(), "g1");
    }
    #[tokio::test]
    async fn email_merge_into_held_provider_is_occupied_not_a_race() {
        let memory = Memory::default();
        signin(&memory, &google("g1").with_email("a@x.com")).await;
        for _ in 0..2 {
            let mut session = Session::default();
            let result = reconcile(&memory, &google("g2").with_email("a@x.com"), &mut session).await;
            assert!(matches!(
                result,
                Err(AuthError::Conflict(Conflict::Occupied { ref provider })) if provider == "google"
            ));
            assert_eq!(session.user(), None);
        }
        assert_eq!(memory.counts().await, (1, 1));
    }

    /// Backend whose identity lookups miss, so an attach can collide with
    /// an identity committed after the lookup.
    struct Stale(Memory);
    struct StaleTx(MemoryTx);

    impl Backend for Stale {
        type Tx = StaleTx;
        async fn begin(&self) -> Result<StaleTx, StoreError> {
            self.0.begin().await.map(StaleTx)
        }
        async fn commit(&self, tx: StaleTx) -> Result<(), StoreError> {
            self.0.commit(tx.0).await
        }
        async fn rollback(&self, tx: StaleTx) -> Result<(), StoreError> {
            self.0.rollback(tx.0).await
        }
    }

    impl IdentityStore for StaleTx {
        async fn identity(&self, _: &str, _: &str) -> Result<Option<Identity>, StoreError> {
            Ok(None)
        }
        async fn identities(&self, user: ID<Member>) -> Result<Vec<Identity>, StoreError> {
            self.0.identities(user).await
        }
        async fn attach(&self, identity: &Identity) -> Result<ID<Identity>, StoreError> {
            self.0.attach(identity).await
        }
        async fn refresh(&self, identity: ID<Identity>, snapshot: &Snapshot) -> Result<(), StoreError> {
            self.0.refresh(identity, snapshot).await
        }
        async fn detach(&self, user: ID<Member>, provider: &str) -> Result<(), StoreError> {
            self.0.detach(user, provider).await
        }
        async fn member(&self, id: ID<Member>) -> Result<Option<Member>, StoreError> {
            self.0.member(id).await
        }
        async fn member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError> {
            self.0.member_by_email(email).await
        }
        async fn register(&self, member: &Member) -> Result<ID<Member>, StoreError> {
            self.0.register(member).await
        }
        async fn touch(&self, user: ID<Member>) -> Result<(), StoreError> {
            self.0.touch(user).await
        }
        async fn amend(&self, user: ID<Member>, patch: &Patch) -> Result<(), StoreError> {
            self.0.amend(user, patch).await
        }
    }

    #[tokio::test]
    async fn identity_claimed_after_lookup_is_a_race() {
        let memory = Memory::default();
        signin(&memory, &google("g1")).await;
        let stale = Stale(memory.clone());
        let mut session = Session::default();
        let result = reconcile(&stale, &google("g1"), &mut session).await;
        assert!(matches!(
            result,
            Err(AuthError::Conflict(Conflict::Race { ref provider })) if provider == "google"
        ));
        assert_eq!(memory.counts().await, (1, 1));
        assert_eq!(session.user(), None);
    }
    #[tokio::test]
    async fn failed_registration_leaves_nothing() {
        let memory = Memory::default();
        memory.inject(Fault::Register);
        let mut session = Session::default();
        let result = reconcile(&memory, &google("g1").with_email("a@x.com"), &mut session).await;
        assert!(matches!(result, Err(AuthError::Store { context: "create user", .. })));
        assert_eq!(memory.counts().await, (0, 0));
    }
    #[tokio::test]
    async fn begin_failure_is_a_transaction_error() {
        let memory = Memory::default();
        memory.inject(Fault::Begin);
        let mut session = Session::default();
        let result = reconcile(&memory, &google("g1"), &mut session).await;
        assert!(matches!(result, Err(AuthError::Transaction(_))));
    }
}
