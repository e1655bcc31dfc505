use super::*;
use actix_web::FromRequest;
use actix_web::HttpRequest;
use actix_web::cookie::Cookie;
use actix_web::cookie::SameSite;
use actix_web::dev::Payload;
use actix_web::web;
use sk_core::SESSION_COOKIE;
use std::future::Ready;

/// Cookie transport for [`Session`]s.
pub struct Sessions {
    crypto: Crypto,
    secure: bool,
}

impl Sessions {
    pub fn new(secret: &[u8], secure: bool) -> Self {
        Self {
            crypto: Crypto::new(secret),
            secure,
        }
    }
    /// Session carried by the request. Missing, tampered, or expired
    /// cookies read as an empty session.
    pub fn read(&self, req: &HttpRequest) -> Session {
        req.cookie(SESSION_COOKIE)
            .and_then(|cookie| {
                self.crypto
                    .open(cookie.value())
                    .inspect_err(|e| log::debug!("ignoring unreadable session cookie: {}", e))
                    .ok()
            })
            .unwrap_or_default()
    }
    pub fn write(&self, session: &Session) -> Result<Cookie<'static>, AuthError> {
        Ok(self.cookie(self.crypto.seal(session)?))
    }
    /// Cookie that expires the session in the browser.
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = self.cookie(String::new());
        cookie.make_removal();
        cookie
    }
    fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, value)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(actix_web::cookie::time::Duration::seconds(
                Crypto::duration().as_secs() as i64,
            ))
            .finish()
    }
}

/// Base URL of the web frontend that callbacks redirect to.
#[derive(Clone)]
pub struct Frontend(pub String);

/// Extractor for requests from a signed-in member.
pub struct Auth(pub Principal);

impl Auth {
    pub fn principal(&self) -> &Principal {
        &self.0
    }
    pub fn user(&self) -> sk_core::ID<Member> {
        self.0.id()
    }
}

impl FromRequest for Auth {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;
    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        std::future::ready(
            req.app_data::<web::Data<Sessions>>()
                .ok_or_else(|| AuthError::Session("session transport not configured".to_string()))
                .map(|sessions| sessions.read(req))
                .and_then(|session| session.principal().cloned().ok_or(AuthError::Unauthenticated))
                .map(Auth),
        )
    }
}
