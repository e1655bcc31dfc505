//! Username derivation from provider profiles.
//!
//! Candidates are not checked against the store. Uniqueness is enforced
//! by the `uq_users_username` constraint and surfaces as
//! [`Conflict::UsernameTaken`](crate::Conflict::UsernameTaken).
use sk_core::USERNAME_MAX;
use sk_core::USERNAME_MIN;
use sk_core::USERNAME_PADDED;

/// Lowercases, maps separators to `_`, drops everything outside
/// `[a-z0-9_]`, collapses and trims underscores, and caps the length.
/// Results shorter than [`USERNAME_MIN`] become `user_` plus 8 random hex digits.
pub fn sanitize(raw: &str) -> String {
    let mapped = raw
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '.' | '-' => '_',
            c => c,
        })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect::<String>();
    let mut sanitized = mapped
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if sanitized.len() > USERNAME_MAX {
        sanitized.truncate(USERNAME_MAX);
        sanitized = sanitized.trim_matches('_').to_string();
    }
    if sanitized.len() < USERNAME_MIN {
        return fallback();
    }
    sanitized
}

/// Username candidate from a display handle, else the email's local part.
/// Generic or very short results get a random 4-digit hex suffix.
pub fn candidate(base: &str, email: Option<&str>) -> String {
    let base = Some(base)
        .filter(|b| !b.trim().is_empty())
        .or_else(|| email.and_then(|e| e.split('@').next()))
        .filter(|b| !b.trim().is_empty());
    let username = match base {
        None => sanitize(&fallback()),
        Some(base) => {
            let sanitized = sanitize(base);
            if sanitized == "user" || sanitized.len() < USERNAME_PADDED {
                sanitize(&format!("{}_{:04x}", sanitized, rand::random::<u16>()))
            } else {
                sanitized
            }
        }
    };
    log::debug!("generated username candidate ({})", username);
    username
}

fn fallback() -> String {
    format!("user_{:08x}", rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_fallback(s: &str) -> bool {
        s.len() == 13
            && s.starts_with("user_")
            && s[5..].chars().all(|c| c.is_ascii_hexdigit())
    }

    #[test]
    fn sanitize_maps_separators() {
        assert_eq!(sanitize("Ada Lovelace"), "ada_lovelace");
        assert_eq!(sanitize("ada.b-c"), "ada_b_c");
    }
    #[test]
    fn sanitize_strips_and_collapses() {
        assert_eq!(sanitize("__Ada!!  ##Love__"), "ada_love");
        assert_eq!(sanitize("Zoë Ångström"), "zo_ngstrm");
    }
    #[test]
    fn sanitize_truncates_without_trailing_underscore() {
        let long = format!("{}_{}", "a".repeat(29), "bbbb");
        let s = sanitize(&long);
        assert_eq!(s, "a".repeat(29));
        assert!(s.len() <= USERNAME_MAX);
    }
    #[test]
    fn sanitize_falls_back_when_short() {
        assert!(is_fallback(&sanitize("a!")));
        assert!(is_fallback(&sanitize("")));
        assert!(is_fallback(&sanitize("___")));
    }
    #[test]
    fn candidate_prefers_base() {
        assert_eq!(candidate("Ada Lovelace", Some("zz@x.com")), "ada_lovelace");
    }
    #[test]
    fn candidate_uses_email_local_part() {
        assert_eq!(candidate("  ", Some("grace.hopper@navy.mil")), "grace_hopper");
    }
    #[test]
    fn candidate_pads_short_names() {
        let s = candidate("", Some("abc@x.com"));
        assert!(s.starts_with("abc_"));
        assert_eq!(s.len(), 8);
    }
    #[test]
    fn candidate_pads_generic_user() {
        let s = candidate("User", None);
        assert!(s.starts_with("user_"));
        assert_eq!(s.len(), 9);
    }
    #[test]
    fn candidate_without_any_base_is_random() {
        assert!(is_fallback(&candidate("", None)));
        assert!(is_fallback(&candidate("", Some("@x.com"))));
    }
}
