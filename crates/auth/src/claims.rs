/// Wire form of a [`Session`](crate::Session) inside the signed cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linking_provider_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linking_user_id_for_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(
        user_id: Option<String>,
        user_name: Option<String>,
        linking_provider_name: Option<String>,
        linking_user_id_for_provider: Option<String>,
        oauth_state: Option<String>,
    ) -> Self {
        let now = now();
        Self {
            user_id,
            user_name,
            linking_provider_name,
            linking_user_id_for_provider,
            oauth_state,
            iat: now,
            exp: now + sk_core::SESSION_MAX_AGE.as_secs() as i64,
        }
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_claims_live_thirty_days() {
        let claims = Claims::new(None, None, None, None, None);
        assert!(claims.iat <= now());
        assert_eq!(claims.exp - claims.iat, 30 * 86400);
    }
    #[test]
    fn absent_fields_are_omitted() {
        let claims = Claims::new(Some("u".into()), None, None, None, None);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["user_id"], "u");
        assert!(json.get("linking_provider_name").is_none());
    }
}
