use serde::Serialize;

/// A signed-in user as one browser knows it. `access_token` is what the
/// backend checks on every write; it never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    #[serde(skip)]
    pub access_token: String,
}

impl Session {
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.user_id)
    }
}

/// Broadcast by a backend when it stops honouring a token: sign-out,
/// expiry, or a 401 from the hosted service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnded {
    pub access_token: String,
}
