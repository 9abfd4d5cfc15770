//! Storage error handling
//!
//! Typed errors for store, migration and exchange operations, with a split
//! between messages that may be shown to the user and internals that only
//! belong in the log.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::EditError;

/// Which collection a missing record was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Project,
    Asset,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Project => f.write_str("Project"),
            RecordKind::Asset => f.write_str("Asset"),
        }
    }
}

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Referenced project or asset id has no record
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: i64 },

    /// Malformed or unsupported input document
    #[error("Invalid document: {0}")]
    Validation(String),

    /// A project uuid collided with an existing one
    #[error("Project already exists (uuid {uuid})")]
    ConstraintViolation { uuid: String },

    /// A step inside an atomic multi-collection operation failed; nothing was applied
    #[error("{operation} failed and was rolled back: {source}")]
    Transaction {
        operation: &'static str,
        #[source]
        source: Box<StoreError>,
    },

    /// In-memory edit rejected
    #[error(transparent)]
    Edit(#[from] EditError),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn not_found_project(id: i64) -> Self {
        StoreError::NotFound {
            kind: RecordKind::Project,
            id,
        }
    }

    pub fn not_found_asset(id: i64) -> Self {
        StoreError::NotFound {
            kind: RecordKind::Asset,
            id,
        }
    }

    /// Wrap an error raised inside a transaction body
    ///
    /// Already-wrapped errors are passed through so nesting never doubles up.
    pub fn in_transaction(operation: &'static str, error: StoreError) -> Self {
        match error {
            StoreError::Transaction { .. } => error,
            other => StoreError::Transaction {
                operation,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through transaction wrappers
    pub fn root_cause(&self) -> &StoreError {
        match self {
            StoreError::Transaction { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), StoreError::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.root_cause(), StoreError::Validation(_))
    }

    /// Whether the raw message is safe and useful to show to a user
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self.root_cause(),
            StoreError::NotFound { .. }
                | StoreError::Validation(_)
                | StoreError::ConstraintViolation { .. }
                | StoreError::Edit(_)
        )
    }

    /// Message suitable for a dialog
    ///
    /// Database and I/O internals collapse into `fallback`; the full error is
    /// expected to be logged by the caller.
    pub fn user_message(&self, fallback: &str) -> String {
        if self.is_user_facing() {
            self.root_cause().to_string()
        } else {
            fallback.to_string()
        }
    }
}

/// Map a rusqlite error raised by an insert on `projects` to the store taxonomy
pub(crate) fn map_project_insert(error: rusqlite::Error, uuid: &str) -> StoreError {
    match &error {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::ConstraintViolation {
                uuid: uuid.to_string(),
            }
        }
        _ => StoreError::Database(error),
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
