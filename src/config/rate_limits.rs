use std::time::{SystemTime, UNIX_EPOCH};

/// Unauthenticated actions throttled per client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Login,
    Register,
}

impl AuthAction {
    pub fn from_request(path: &str, method: &str) -> Option<Self> {
        match (path, method) {
            ("/auth/login", "POST") => Some(Self::Login),
            ("/auth/register", "POST") => Some(Self::Register),
            _ => None,
        }
    }

    pub fn as_key(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }
}

/// Length of one rate-limit window; `AUTH_ATTEMPTS_PER_HOUR` is counted per window.
pub const AUTH_WINDOW_SECONDS: u64 = 3600;

/// Index of the fixed window containing the current instant.
pub fn current_window(window_seconds: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    now / window_seconds
}
