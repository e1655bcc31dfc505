use super::*;

/// Signs and verifies session payloads (HS256).
pub struct Crypto {
    encoding: jsonwebtoken::EncodingKey,
    decoding: jsonwebtoken::DecodingKey,
}

impl Crypto {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: jsonwebtoken::EncodingKey::from_secret(secret),
            decoding: jsonwebtoken::DecodingKey::from_secret(secret),
        }
    }
    pub fn encode(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&jsonwebtoken::Header::default(), claims, &self.encoding)
    }
    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &jsonwebtoken::Validation::default())
            .map(|data| data.claims)
    }
    pub fn seal(&self, session: &Session) -> Result<String, AuthError> {
        self.encode(&Claims::from(session))
            .map_err(|e| AuthError::Session(e.to_string()))
    }
    /// Restores a session. Tampered or expired payloads are rejected.
    pub fn open(&self, token: &str) -> Result<Session, AuthError> {
        self.decode(token)
            .map(Session::from)
            .map_err(|e| AuthError::Session(e.to_string()))
    }
    pub const fn duration() -> std::time::Duration {
        sk_core::SESSION_MAX_AGE
    }
}
