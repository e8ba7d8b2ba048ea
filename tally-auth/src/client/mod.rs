mod config;
mod session_store;

pub use config::Settings;
pub use session_store::SessionStore;

use crate::common::StoredSession;
use crate::error::AuthError;
use chrono::Utc;
use secrecy::SecretString;

/// The signed-in user, if any, as seen by the data layer
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    session: Option<StoredSession>,
}

impl AuthState {
    pub fn signed_out() -> Self {
        Self { session: None }
    }

    pub fn from_session(session: StoredSession) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn active_session(&self) -> Result<&StoredSession, AuthError> {
        let session = self.session.as_ref().ok_or(AuthError::NoSession)?;
        if session_store::is_expired(session, Utc::now()) {
            return Err(AuthError::SessionExpired {
                user_id: session.user_id.clone(),
            });
        }
        Ok(session)
    }

    /// Owner id stamped on created rows
    pub fn current_user_id(&self) -> Result<&str, AuthError> {
        self.active_session().map(|s| s.user_id.as_str())
    }

    pub fn access_token(&self) -> Result<SecretString, AuthError> {
        self.active_session().map(|s| s.access_token())
    }

    pub fn is_signed_in(&self) -> bool {
        self.active_session().is_ok()
    }
}

/// Load settings and the persisted session.
///
/// A missing session is not an error here; callers that create rows get
/// `AuthError::NoSession` from `current_user_id`.
pub fn load_auth_state() -> Result<(Settings, AuthState), AuthError> {
    let settings = Settings::new()?;
    settings.validate().map_err(AuthError::Configuration)?;

    let store = SessionStore::new()?;
    let state = match store.load_session()? {
        Some(session) => {
            tracing::debug!("Loaded session for user {}", session.user_id);
            AuthState::from_session(session)
        }
        None => {
            tracing::info!("No stored session found");
            AuthState::signed_out()
        }
    };

    Ok((settings, state))
}
