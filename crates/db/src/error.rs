use thiserror::Error;

/// Failure of a store operation, after the access-control layer has had its say.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("permission denied: {0}")]
    Denied(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
}

impl StoreError {
    /// Maps uniqueness and trigger aborts of a write to `Conflict`, anything
    /// else to `Database`.
    pub fn from_write(err: sqlx::Error, conflict: impl Into<String>) -> Self {
        if is_conflict(&err) {
            StoreError::Conflict(conflict.into())
        } else {
            StoreError::Database(err)
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

fn is_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            // RAISE(ABORT, ...) in a trigger surfaces as a generic constraint error.
            db_err.is_unique_violation()
                || db_err.message().contains("already linked")
                || db_err.code().as_deref() == Some("1811")
        }
        _ => false,
    }
}
