/// Provider-supplied profile fields copied onto an identity at each sign-in.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
}
