// Types shared by the session store and its callers
pub mod common;

mod client;
mod error;

pub use client::{load_auth_state, AuthState, SessionStore, Settings};
pub use common::StoredSession;
pub use error::AuthError;

/// Path of the shared `config.toml`, overridable with `TALLY_CONFIG`
pub fn config_path() -> String {
    std::env::var("TALLY_CONFIG").unwrap_or_else(|_| "config.toml".to_string())
}
