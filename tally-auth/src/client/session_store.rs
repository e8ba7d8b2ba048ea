use crate::common::StoredSession;
use crate::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::PathBuf;

const EXPIRY_BUFFER: Duration = Duration::minutes(5);

pub struct SessionStore {
    session_path: PathBuf,
}

impl SessionStore {
    pub fn new() -> Result<Self, AuthError> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| AuthError::Configuration("Could not find cache directory".to_string()))?
            .join("tally");

        Self::in_dir(cache_dir)
    }

    /// Store the session file inside `dir`, creating it if needed
    pub fn in_dir(dir: PathBuf) -> Result<Self, AuthError> {
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                AuthError::SessionStorage(format!("Failed to create cache directory: {}", e))
            })?;
        }

        Ok(Self {
            session_path: dir.join("session.json"),
        })
    }

    pub fn save_session(&self, session: &StoredSession) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(session)?;

        fs::write(&self.session_path, json)
            .map_err(|e| AuthError::SessionStorage(format!("Failed to save session: {}", e)))?;

        // Set permissions to 0600 (read/write for owner only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.session_path)
                .map_err(|e| {
                    AuthError::SessionStorage(format!("Failed to get file permissions: {}", e))
                })?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.session_path, perms).map_err(|e| {
                AuthError::SessionStorage(format!("Failed to set file permissions: {}", e))
            })?;
        }

        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<StoredSession>, AuthError> {
        if !self.session_path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.session_path)
            .map_err(|e| AuthError::SessionStorage(format!("Failed to read session: {}", e)))?;

        let session: StoredSession = serde_json::from_str(&json)?;
        Ok(Some(session))
    }

    pub fn delete_session(&self) -> Result<(), AuthError> {
        if self.session_path.exists() {
            fs::remove_file(&self.session_path)
                .map_err(|e| AuthError::SessionStorage(format!("Failed to delete session: {}", e)))?;
        }
        Ok(())
    }
}

/// Sessions count as expired five minutes early so a save never starts on a dying token
pub fn is_expired(session: &StoredSession, now: DateTime<Utc>) -> bool {
    session.expires_at <= (now + EXPIRY_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: DateTime<Utc>) -> StoredSession {
        StoredSession {
            user_id: "user-1".to_string(),
            email: Some("me@example.com".to_string()),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at,
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        std::env::temp_dir().join(format!(
            "tally-auth-{}-{}-{}",
            name,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn expiry_includes_buffer() {
        let now = Utc::now();
        assert!(is_expired(&session(now + Duration::minutes(4)), now));
        assert!(!is_expired(&session(now + Duration::minutes(30)), now));
    }

    #[test]
    fn save_load_delete_session() {
        let dir = scratch_dir("roundtrip");
        let store = SessionStore::in_dir(dir.clone()).unwrap();
        assert!(store.load_session().unwrap().is_none());

        let expires_at = Utc::now() + Duration::hours(1);
        store.save_session(&session(expires_at)).unwrap();

        let loaded = store.load_session().unwrap().unwrap();
        assert_eq!(loaded.user_id, "user-1");
        assert_eq!(loaded.expires_at.timestamp(), expires_at.timestamp());

        store.delete_session().unwrap();
        assert!(store.load_session().unwrap().is_none());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let printed = format!("{:?}", session(Utc::now()));
        assert!(!printed.contains("access\""));
        assert!(printed.contains("[redacted]"));
    }
}
