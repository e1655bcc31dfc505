use super::*;
use serde::Deserialize;
use serde::Serialize;
use sk_core::Unique;

/// Response body shared by every endpoint.
#[derive(Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
}

impl<T> Envelope<T> {
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }
    /// Success without a payload.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: message.into(),
        }
    }
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub stats_privacy: Visibility,
    pub ui_theme: Option<String>,
    pub color_theme: Option<String>,
}

impl From<&Member> for UserInfo {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id().to_string(),
            username: member.username().to_string(),
            email: member.email().map(String::from),
            display_name: member.display().map(String::from),
            avatar_url: member.avatar().map(String::from),
            stats_privacy: member.visibility(),
            ui_theme: member.ui_theme().map(String::from),
            color_theme: member.color_theme().map(String::from),
        }
    }
}

#[derive(Serialize)]
pub struct LinkedAccount {
    pub provider_name: String,
    pub provider_email: Option<String>,
    pub provider_display_name: Option<String>,
    pub provider_avatar_url: Option<String>,
    pub linked_at: u64,
}

impl From<&Identity> for LinkedAccount {
    fn from(identity: &Identity) -> Self {
        let snapshot = identity.snapshot();
        Self {
            provider_name: identity.provider().to_string(),
            provider_email: snapshot.email.clone(),
            provider_display_name: snapshot.name.clone(),
            provider_avatar_url: snapshot.avatar.clone(),
            linked_at: identity
                .created()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
pub struct ThemeRequest {
    #[serde(default)]
    pub ui_theme: String,
    #[serde(default)]
    pub color_theme: String,
}

/// Query string of a provider callback.
#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
