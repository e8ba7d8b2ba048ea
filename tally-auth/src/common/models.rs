use chrono::{serde::ts_seconds, DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Session persisted after sign-in
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn access_token(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
