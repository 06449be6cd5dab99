use telar_auth::UserId;

/// Authenticated principal for a request, derived from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    user_id: UserId,
    username: String,
    role: Option<String>,
    superuser: bool,
}

impl CurrentUser {
    pub fn new(user_id: UserId, username: String, role: Option<String>, superuser: bool) -> Self {
        Self {
            user_id,
            username,
            role,
            superuser,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn is_superuser(&self) -> bool {
        self.superuser
    }
}
