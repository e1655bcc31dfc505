/// Who may view a member's game statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    FriendsOnly,
    #[default]
    Public,
}

impl Visibility {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::FriendsOnly => "friends_only",
            Self::Public => "public",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Visibility {
    type Err = crate::StoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "friends_only" => Ok(Self::FriendsOnly),
            "public" => Ok(Self::Public),
            other => Err(crate::StoreError::Invalid(format!(
                "invalid stats privacy value: {}",
                other
            ))),
        }
    }
}
