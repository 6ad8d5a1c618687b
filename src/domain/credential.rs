use std::fmt;

/// Bearer token plus the identity it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub user_id: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            token: token.into(),
            user_id,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}
