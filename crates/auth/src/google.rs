use super::*;

const AUTHORIZE: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN: &str = "https://oauth2.googleapis.com/token";
const USERINFO: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

/// Google sign-in over the OAuth 2.0 authorization-code flow.
pub struct Google {
    id: String,
    secret: String,
    callback: String,
    http: reqwest::Client,
}

#[derive(serde::Deserialize)]
struct Token {
    access_token: String,
}

#[derive(serde::Deserialize)]
struct Userinfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl Google {
    /// `base` is the public URL of this API, used to build the callback.
    pub fn new(id: String, secret: String, base: &str) -> Self {
        Self {
            id,
            secret,
            callback: format!("{}/api/auth/google/callback", base.trim_end_matches('/')),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for Google {
    fn name(&self) -> &str {
        "google"
    }
    fn authorize(&self, state: &str) -> String {
        url::Url::parse_with_params(
            AUTHORIZE,
            &[
                ("client_id", self.id.as_str()),
                ("redirect_uri", self.callback.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("access_type", "online"),
                ("prompt", "select_account"),
            ],
        )
        .map(String::from)
        .unwrap_or_else(|_| AUTHORIZE.to_string())
    }
    async fn exchange(&self, code: &str) -> Result<External, AuthError> {
        let token = self
            .http
            .post(TOKEN)
            .form(&[
                ("code", code),
                ("client_id", self.id.as_str()),
                ("client_secret", self.secret.as_str()),
                ("redirect_uri", self.callback.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::Provider(format!("google token exchange failed: {}", e)))?
            .json::<Token>()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid google token response: {}", e)))?;
        let info = self
            .http
            .get(USERINFO)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::Provider(format!("google userinfo request failed: {}", e)))?
            .json::<Userinfo>()
            .await
            .map_err(|e| AuthError::Provider(format!("invalid google userinfo response: {}", e)))?;
        let mut external = External::new("google", info.sub);
        if let Some(email) = info.email {
            external = external.with_email(email);
        }
        if let Some(name) = info.name {
            external = external.with_name(name);
        }
        if let Some(picture) = info.picture {
            external = external.with_avatar(picture);
        }
        Ok(external)
    }
}
