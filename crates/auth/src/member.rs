use super::*;
use sk_core::ID;
use sk_core::Unique;
use std::time::SystemTime;

/// Registered account, independent of any sign-in provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    id: ID<Self>,
    username: String,
    email: Option<String>,
    display: Option<String>,
    avatar: Option<String>,
    visibility: Visibility,
    ui_theme: Option<String>,
    color_theme: Option<String>,
    created: SystemTime,
    updated: SystemTime,
    login: Option<SystemTime>,
}

impl Member {
    pub fn new(id: ID<Self>, username: String, email: Option<String>) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            username,
            email,
            display: None,
            avatar: None,
            visibility: Visibility::default(),
            ui_theme: None,
            color_theme: None,
            created: now,
            updated: now,
            login: None,
        }
    }
    /// Fresh account seeded from the provider's profile.
    pub fn register(username: String, external: &External) -> Self {
        let mut member = Self::new(ID::default(), username, external.email().map(String::from));
        member.display = external.name().map(String::from);
        member.avatar = external.avatar().map(String::from);
        member
    }
    pub fn username(&self) -> &str {
        &self.username
    }
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
    pub fn display(&self) -> Option<&str> {
        self.display.as_deref()
    }
    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }
    pub fn ui_theme(&self) -> Option<&str> {
        self.ui_theme.as_deref()
    }
    pub fn color_theme(&self) -> Option<&str> {
        self.color_theme.as_deref()
    }
    pub fn created(&self) -> SystemTime {
        self.created
    }
    pub fn updated(&self) -> SystemTime {
        self.updated
    }
    pub fn login(&self) -> Option<SystemTime> {
        self.login
    }
    /// Name shown in the session: display name when set, else username.
    pub fn label(&self) -> &str {
        self.display
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.username)
    }
    pub(crate) fn touch(&mut self, at: SystemTime) {
        self.login = Some(at);
        self.updated = at;
    }
    pub(crate) fn apply(&mut self, patch: &Patch, at: SystemTime) {
        if let Some(display) = patch.display_name.as_ref() {
            self.display = Some(display.clone());
        }
        if let Some(avatar) = patch.avatar_url.as_ref() {
            self.avatar = Some(avatar.clone());
        }
        if let Some(visibility) = patch.stats_privacy {
            self.visibility = visibility;
        }
        if let Some(theme) = patch.ui_theme.as_ref() {
            self.ui_theme = Some(theme.clone());
        }
        if let Some(theme) = patch.color_theme.as_ref() {
            self.color_theme = Some(theme.clone());
        }
        self.updated = at;
    }
}

impl Unique for Member {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(feature = "database")]
mod schema {
    use super::*;
    use sk_database::*;

    /// Column list matching [`Member::from`] for a row.
    pub const MEMBER_COLUMNS: &str = "id, username, email, display_name, avatar_url, stats_privacy, ui_theme, color_theme, created_at, updated_at, last_login_at";

    impl From<&tokio_postgres::Row> for Member {
        fn from(row: &tokio_postgres::Row) -> Self {
            Self {
                id: ID::from(row.get::<_, uuid::Uuid>(0)),
                username: row.get(1),
                email: row.get(2),
                display: row.get(3),
                avatar: row.get(4),
                // guarded by the CHECK constraint
                visibility: row.get::<_, &str>(5).parse().unwrap_or_default(),
                ui_theme: row.get(6),
                color_theme: row.get(7),
                created: row.get(8),
                updated: row.get(9),
                login: row.get(10),
            }
        }
    }

    impl Schema for Member {
        fn name() -> &'static str {
            USERS
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                USERS,
                " (
                    id              UUID PRIMARY KEY,
                    username        VARCHAR(50) NOT NULL,
                    email           VARCHAR(255),
                    display_name    VARCHAR(100),
                    avatar_url      TEXT,
                    stats_privacy   VARCHAR(20) NOT NULL DEFAULT 'public',
                    ui_theme        VARCHAR(50),
                    color_theme     VARCHAR(50),
                    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    last_login_at   TIMESTAMPTZ,
                    CONSTRAINT uq_users_username UNIQUE (username),
                    CONSTRAINT uq_users_email UNIQUE (email),
                    CONSTRAINT ck_users_stats_privacy CHECK (stats_privacy IN ('private', 'friends_only', 'public'))
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_users_last_login ON ",
                USERS,
                " (last_login_at);"
            )
        }
    }
}
#[cfg(feature = "database")]
pub use schema::MEMBER_COLUMNS;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_falls_back_to_username() {
        let member = Member::new(ID::default(), "ada".into(), None);
        assert_eq!(member.label(), "ada");
        let ext = External::new("google", "g1").with_name("Ada Lovelace");
        let member = Member::register("ada".into(), &ext);
        assert_eq!(member.label(), "Ada Lovelace");
    }
    #[test]
    fn register_copies_provider_profile() {
        let ext = External::new("google", "g1")
            .with_email("a@x.com")
            .with_avatar("https://img/a.png");
        let member = Member::register("a".into(), &ext);
        assert_eq!(member.email(), Some("a@x.com"));
        assert_eq!(member.avatar(), Some("https://img/a.png"));
        assert_eq!(member.visibility(), Visibility::Public);
        assert_eq!(member.login(), None);
    }
    #[test]
    fn apply_leaves_absent_fields_alone() {
        let mut member = Member::new(ID::default(), "ada".into(), None);
        let patch = Patch {
            stats_privacy: Some(Visibility::Private),
            ..Patch::default()
        };
        member.apply(&patch, SystemTime::now());
        assert_eq!(member.visibility(), Visibility::Private);
        assert_eq!(member.display(), None);
        assert_eq!(member.username(), "ada");
    }
}
