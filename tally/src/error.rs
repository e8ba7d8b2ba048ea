use crate::identity::RowKey;
use tally_api::StoreApiError;
use tally_auth::AuthError;
use thiserror::Error;

/// Failure of a single remote call, kept as text so it can be reported per row and cloned
/// into commit reports
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("not signed in: {0}")]
    Auth(String),

    #[error("store returned no row for the insert")]
    EmptyInsert,

    #[error("depends on {0}, which was not created")]
    ParentNotCreated(RowKey),
}

impl From<StoreApiError> for StoreError {
    fn from(err: StoreApiError) -> Self {
        match err {
            StoreApiError::Rest(status, detail) => StoreError::Rejected {
                status: status.as_u16(),
                message: detail.to_string(),
            },
            e => StoreError::Unavailable(e.to_string()),
        }
    }
}

impl From<AuthError> for StoreError {
    fn from(err: AuthError) -> Self {
        StoreError::Auth(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// A pending change that cannot be committed as it stands
    #[error("{row}: {reason}")]
    Validation { row: RowKey, reason: String },

    #[error("a save is already in progress")]
    Concurrency,

    #[error("{row}: {source}")]
    Remote {
        row: RowKey,
        #[source]
        source: StoreError,
    },
}

impl LedgerError {
    pub fn validation(row: &RowKey, reason: impl Into<String>) -> Self {
        LedgerError::Validation {
            row: row.clone(),
            reason: reason.into(),
        }
    }

    pub fn remote(row: &RowKey, source: StoreError) -> Self {
        LedgerError::Remote {
            row: row.clone(),
            source,
        }
    }

    /// The row this error is about, if it is row-specific
    pub fn row(&self) -> Option<&RowKey> {
        match self {
            LedgerError::Validation { row, .. } | LedgerError::Remote { row, .. } => Some(row),
            LedgerError::Concurrency => None,
        }
    }
}
