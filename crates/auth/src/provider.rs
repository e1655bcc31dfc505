use super::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// OAuth authorization-code provider.
///
/// Performs the handshake that precedes reconciliation: builds the
/// consent URL and trades a callback code for an [`External`].
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Name used in routes and stored on identities.
    fn name(&self) -> &str;
    /// Consent page URL carrying `state`.
    fn authorize(&self, state: &str) -> String;
    /// Exchanges a callback `code` for the provider's view of the user.
    async fn exchange(&self, code: &str) -> Result<External, AuthError>;
}

/// Configured providers keyed by name.
#[derive(Clone, Default)]
pub struct Providers {
    inner: BTreeMap<String, Arc<dyn Provider>>,
}

impl Providers {
    pub fn with(mut self, provider: impl Provider + 'static) -> Self {
        log::info!("registered oauth provider ({})", provider.name());
        self.inner.insert(provider.name().to_string(), Arc::new(provider));
        self
    }
    pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>, AuthError> {
        self.inner
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::Invalid(format!("unsupported provider: {}", name)))
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
