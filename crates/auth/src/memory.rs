use super::*;
use sk_core::ID;
use sk_core::Unique;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::SystemTime;
use tokio::sync::OwnedMutexGuard;

/// Store operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Begin,
    Register,
    Attach,
    Refresh,
    Touch,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    members: BTreeMap<ID<Member>, Member>,
    identities: BTreeMap<ID<Identity>, Identity>,
}

/// In-process [`Backend`] with the same contract as PostgreSQL.
///
/// Transactions are serialized: each holds the table lock from `begin`
/// until it finishes, and writes to a private copy that replaces the
/// tables only on commit. Unique constraints and the owner foreign key
/// are enforced on write.
#[derive(Clone, Default)]
pub struct Memory {
    tables: Arc<tokio::sync::Mutex<Tables>>,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

/// Open transaction on a [`Memory`] backend.
pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    scratch: Mutex<Tables>,
    faults: Arc<Mutex<HashSet<Fault>>>,
}

impl Memory {
    /// Makes every later call of `fault` fail.
    pub fn inject(&self, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(fault);
        }
    }
    pub fn heal(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }
    /// Committed `(members, identities)` row counts.
    pub async fn counts(&self) -> (usize, usize) {
        let tables = self.tables.lock().await;
        (tables.members.len(), tables.identities.len())
    }
    pub async fn members(&self) -> Vec<Member> {
        self.tables.lock().await.members.values().cloned().collect()
    }
    pub async fn identities(&self) -> Vec<Identity> {
        self.tables.lock().await.identities.values().cloned().collect()
    }
}

impl MemoryTx {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.scratch
            .lock()
            .map_err(|_| StoreError::Database("memory tables poisoned".to_string()))
    }
    fn check(&self, fault: Fault) -> Result<(), StoreError> {
        check(&self.faults, fault)
    }
}

fn check(faults: &Mutex<HashSet<Fault>>, fault: Fault) -> Result<(), StoreError> {
    match faults.lock() {
        Ok(faults) if faults.contains(&fault) => {
            Err(StoreError::Database(format!("injected fault: {:?}", fault)))
        }
        _ => Ok(()),
    }
}

impl Backend for Memory {
    type Tx = MemoryTx;
    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        check(&self.faults, Fault::Begin)?;
        let guard = self.tables.clone().lock_owned().await;
        let scratch = Mutex::new(guard.clone());
        Ok(MemoryTx {
            guard,
            scratch,
            faults: self.faults.clone(),
        })
    }
    async fn commit(&self, mut tx: MemoryTx) -> Result<(), StoreError> {
        tx.check(Fault::Commit)?;
        let scratch = std::mem::take(&mut *tx.tables()?);
        *tx.guard = scratch;
        Ok(())
    }
    async fn rollback(&self, tx: MemoryTx) -> Result<(), StoreError> {
        drop(tx);
        Ok(())
    }
}

impl IdentityStore for MemoryTx {
    async fn identity(&self, provider: &str, subject: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self
            .tables()?
            .identities
            .values()
            .find(|i| i.provider() == provider && i.subject() == subject)
            .cloned())
    }
    async fn identities(&self, user: ID<Member>) -> Result<Vec<Identity>, StoreError> {
        let mut owned = self
            .tables()?
            .identities
            .values()
            .filter(|i| i.user() == user)
            .cloned()
            .collect::<Vec<_>>();
        owned.sort_by(|a, b| a.provider().cmp(b.provider()));
        Ok(owned)
    }
    async fn attach(&self, identity: &Identity) -> Result<ID<Identity>, StoreError> {
        self.check(Fault::Attach)?;
        let mut tables = self.tables()?;
        if !tables.members.contains_key(&identity.user()) {
            return Err(StoreError::Database(
                "identity owner does not exist".to_string(),
            ));
        }
        let same = tables
            .identities
            .values()
            .filter(|i| i.provider() == identity.provider());
        if same.clone().any(|i| i.subject() == identity.subject()) {
            return Err(StoreError::IdentityConflict);
        }
        if same.clone().any(|i| i.user() == identity.user()) {
            return Err(StoreError::ProviderSlotTaken);
        }
        tables.identities.insert(identity.id(), identity.clone());
        log::info!("attached {} identity to user {}", identity.provider(), identity.user());
        Ok(identity.id())
    }
    async fn refresh(&self, identity: ID<Identity>, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.check(Fault::Refresh)?;
        self.tables()?
            .identities
            .get_mut(&identity)
            .map(|i| i.refresh(snapshot.clone(), SystemTime::now()))
            .ok_or(StoreError::NotFound("identity"))
    }
    async fn detach(&self, user: ID<Member>, provider: &str) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let owned = tables.identities.values().filter(|i| i.user() == user).count();
        if owned <= 1 {
            log::warn!("refusing to detach the last identity of user {}", user);
            return Err(StoreError::LastIdentity);
        }
        let target = tables
            .identities
            .values()
            .find(|i| i.user() == user && i.provider() == provider)
            .map(Identity::id)
            .ok_or(StoreError::NotFound("identity"))?;
        tables.identities.remove(&target);
        log::info!("detached {} identity from user {}", provider, user);
        Ok(())
    }
    async fn member(&self, id: ID<Member>) -> Result<Option<Member>, StoreError> {
        Ok(self.tables()?.members.get(&id).cloned())
    }
    async fn member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError> {
        Ok(self
            .tables()?
            .members
            .values()
            .find(|m| m.email() == Some(email))
            .cloned())
    }
    async fn register(&self, member: &Member) -> Result<ID<Member>, StoreError> {
        if member.username().trim().is_empty() {
            return Err(StoreError::Invalid("username cannot be empty".to_string()));
        }
        self.check(Fault::Register)?;
        let mut tables = self.tables()?;
        if tables.members.values().any(|m| m.username() == member.username()) {
            return Err(StoreError::UsernameTaken);
        }
        if member.email().is_some() && tables.members.values().any(|m| m.email() == member.email()) {
            return Err(StoreError::EmailTaken);
        }
        tables.members.insert(member.id(), member.clone());
        log::info!("registered user {} ({})", member.id(), member.username());
        Ok(member.id())
    }
    async fn touch(&self, user: ID<Member>) -> Result<(), StoreError> {
        self.check(Fault::Touch)?;
        self.tables()?
            .members
            .get_mut(&user)
            .map(|m| m.touch(SystemTime::now()))
            .ok_or(StoreError::NotFound("user"))
    }
    async fn amend(&self, user: ID<Member>, patch: &Patch) -> Result<(), StoreError> {
        self.tables()?
            .members
            .get_mut(&user)
            .map(|m| m.apply(patch, SystemTime::now()))
            .ok_or(StoreError::NotFound("user"))
    }
}
