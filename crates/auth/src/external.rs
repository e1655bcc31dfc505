use super::*;

/// Identity asserted by an OAuth provider for one callback.
///
/// Never persisted as such. The engine consumes it once and binds it
/// to a [`Member`] through an [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct External {
    provider: String,
    subject: String,
    email: Option<String>,
    name: Option<String>,
    nickname: Option<String>,
    avatar: Option<String>,
}

impl External {
    pub fn new(provider: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            subject: subject.into(),
            email: None,
            name: None,
            nickname: None,
            avatar: None,
        }
    }
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }
    pub fn provider(&self) -> &str {
        &self.provider
    }
    /// Provider-scoped user id.
    pub fn subject(&self) -> &str {
        &self.subject
    }
    pub fn email(&self) -> Option<&str> {
        filled(&self.email)
    }
    pub fn name(&self) -> Option<&str> {
        filled(&self.name)
    }
    pub fn nickname(&self) -> Option<&str> {
        filled(&self.nickname)
    }
    pub fn avatar(&self) -> Option<&str> {
        filled(&self.avatar)
    }
    /// Seed for username generation: nickname, then full name.
    pub fn handle(&self) -> &str {
        self.nickname().or(self.name()).unwrap_or_default()
    }
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            email: self.email().map(String::from),
            name: self.name().map(String::from),
            avatar: self.avatar().map(String::from),
        }
    }
}

fn filled(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
