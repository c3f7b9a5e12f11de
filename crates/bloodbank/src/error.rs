//! Error types for bloodbank.
//!
//! Business failures (validation, credentials, stock) are distinct variants so
//! the presentation layer can report them and let the user retry. Storage,
//! configuration and I/O failures carry their underlying source.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::BloodGroup;

/// The main error type for bloodbank operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Business Errors ===
    /// A form field is missing or malformed.
    #[error("{message}")]
    Validation {
        /// User-facing description of the problem.
        message: String,
    },

    /// An account with this name already exists.
    #[error("user '{name}' already exists")]
    DuplicateUser {
        /// The requested account name.
        name: String,
    },

    /// Name and password do not match a stored account.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A business action was attempted without a logged-in session.
    #[error("login required")]
    NotAuthenticated,

    /// A collect transaction asked for more units than are in stock.
    #[error("insufficient {blood_group} blood units: requested {requested}, available {available}")]
    InsufficientStock {
        /// The blood group being collected.
        blood_group: BloodGroup,
        /// Units requested.
        requested: i64,
        /// Units currently in stock.
        available: i64,
    },

    /// No inventory record exists for the blood group.
    #[error("no inventory found for {blood_group} blood group")]
    UnknownBloodGroup {
        /// The blood group with no record.
        blood_group: BloodGroup,
    },

    // === Storage Errors ===
    /// The document store could not be opened or stopped responding.
    #[error("document store unavailable at {path}: {source}")]
    StoreUnavailable {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A store query failed.
    #[error("database query failed: {0}")]
    Store(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// A stored document does not have the expected shape.
    #[error("invalid document in '{collection}': {message}")]
    InvalidDocument {
        /// Collection the document belongs to.
        collection: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for bloodbank operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a validation error for an empty required field.
    #[must_use]
    pub fn required(field: &str) -> Self {
        Self::validation(format!("{field} is required"))
    }

    /// Create an invalid document error.
    #[must_use]
    pub fn invalid_document(collection: &str, message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            collection: collection.to_string(),
            message: message.into(),
        }
    }

    /// Check if this is a business failure the user can correct and retry.
    ///
    /// Everything else is an infrastructure problem.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::DuplicateUser { .. }
                | Self::InvalidCredentials
                | Self::NotAuthenticated
                | Self::InsufficientStock { .. }
                | Self::UnknownBloodGroup { .. }
        )
    }

    /// Check if this error is a validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
