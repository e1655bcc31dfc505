use super::*;
use sk_core::ID;
use sk_core::Unique;

/// Authenticated user recorded in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    id: ID<Member>,
    name: String,
}

impl Principal {
    pub fn new(id: ID<Member>, name: String) -> Self {
        Self { id, name }
    }
    pub fn id(&self) -> ID<Member> {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-client state carried between requests.
///
/// Holds two independent payloads: the authenticated principal, and a
/// single-use linking intent naming the member that asked to attach a
/// provider. The OAuth `state` nonce rides along for CSRF protection.
/// Raw linking fields are kept as received so a half-written intent
/// can be detected and discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    principal: Option<Principal>,
    linking_user: Option<String>,
    linking_provider: Option<String>,
    nonce: Option<String>,
}

impl Session {
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }
    pub fn user(&self) -> Option<ID<Member>> {
        self.principal.as_ref().map(Principal::id)
    }
    /// Records the authenticated member and drops any linking intent.
    pub fn authenticate(&mut self, member: &Member) {
        self.principal = Some(Principal::new(member.id(), member.label().to_string()));
        self.clear_linking();
    }
    pub fn logout(&mut self) {
        *self = Self::default();
    }

    /// Pending linking intent as `(user, provider)`, if fully present.
    pub fn linking(&self) -> Option<(&str, &str)> {
        self.linking_user
            .as_deref()
            .zip(self.linking_provider.as_deref())
    }
    pub fn link(&mut self, user: ID<Member>, provider: &str) {
        self.linking_user = Some(user.to_string());
        self.linking_provider = Some(provider.to_string());
    }
    pub fn clear_linking(&mut self) {
        self.linking_user = None;
        self.linking_provider = None;
    }
    /// Consumes the linking intent and returns its target member when it
    /// was issued for `provider`. Any other intent is discarded.
    pub fn intent(&mut self, provider: &str) -> Option<ID<Member>> {
        let user = self.linking_user.take();
        let wanted = self.linking_provider.take();
        match (user, wanted) {
            (None, None) => None,
            (Some(user), Some(wanted)) if wanted == provider => match user.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("discarding linking intent with malformed user id");
                    None
                }
            },
            (Some(_), Some(wanted)) => {
                log::warn!(
                    "linking intent for {} does not match callback from {}; treating as sign-in",
                    wanted,
                    provider
                );
                None
            }
            _ => {
                log::warn!("discarding partially populated linking intent; treating as sign-in");
                None
            }
        }
    }

    /// Issues a fresh OAuth `state` value and remembers it.
    pub fn challenge(&mut self) -> String {
        let nonce = rand::random::<[u8; sk_core::NONCE_BYTES]>()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<String>();
        self.nonce = Some(nonce.clone());
        nonce
    }
    /// Consumes the stored `state` and reports whether `state` matches it.
    pub fn verify(&mut self, state: &str) -> bool {
        self.nonce.take().is_some_and(|nonce| nonce == state)
    }
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        let principal = claims
            .user_id
            .as_deref()
            .and_then(|id| id.parse().ok())
            .map(|id| Principal::new(id, claims.user_name.unwrap_or_default()));
        Self {
            principal,
            linking_user: claims.linking_user_id_for_provider,
            linking_provider: claims.linking_provider_name,
            nonce: claims.oauth_state,
        }
    }
}

impl From<&Session> for Claims {
    fn from(session: &Session) -> Self {
        Claims::new(
            session.principal.as_ref().map(|p| p.id().to_string()),
            session.principal.as_ref().map(|p| p.name().to_string()),
            session.linking_provider.clone(),
            session.linking_user.clone(),
            session.nonce.clone(),
        )
    }
}
