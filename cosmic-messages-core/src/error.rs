//! Error handling for the conversation pipeline
//!
//! All fallible operations in this crate return [`Result`], an alias for
//! `Result<T, MessagesError>`. Underlying library errors are converted with
//! `thiserror`'s `#[from]`, so `?` works across store, serialization and I/O
//! boundaries.
//!
//! ## Error Categories
//!
//! ### Data access
//! The message store could not be reached or rejected the query. These errors
//! are recoverable: the list keeps showing the last good snapshot and the
//! caller may retry.
//!
//! ### Cancellation
//! A newer request superseded this one. Never shown to the user.
//!
//! ### Translation
//! Failures of the translation pipeline (no service, unsupported pair, text
//! already in the target language).
//!
//! Note that an empty store is *not* an error: it yields an empty snapshot
//! and the UI renders its empty state.
//!
//! ```rust
//! use cosmic_messages_core::MessagesError;
//!
//! let error = MessagesError::DataAccess("store offline".to_string());
//! assert!(error.is_recoverable());
//! assert_eq!(error.to_string(), "Data access error: store offline");
//! ```

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, MessagesError>;

/// Errors that can occur in the conversation pipeline
#[derive(Error, Debug)]
pub enum MessagesError {
    /// The message store is unreachable or the query was malformed
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// SQLite error from the persistent store
    ///
    /// Automatically converted from `rusqlite::Error`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error (database directory creation, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while decoding an SMS packet body
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request was superseded or explicitly cancelled
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Translation engine failure
    #[error("Translation error: {0}")]
    Translation(String),

    /// Neither engine can translate between the two languages
    #[error("Unsupported language pair: {source_language} -> {target_language}")]
    UnsupportedLanguagePair {
        source_language: String,
        target_language: String,
    },

    /// Automatic translation skipped because the text is already in the target language
    #[error("Text is already in {0}")]
    AlreadyInTargetLanguage(String),

    /// No usable translation engine for the current preferences
    #[error("No translation service available")]
    NoTranslationService,

    /// Nothing to translate
    #[error("No text to translate")]
    EmptyText,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MessagesError {
    /// Build a data access error with context
    pub fn data_access(context: &str, error: impl std::fmt::Display) -> Self {
        MessagesError::DataAccess(format!("{}: {}", context, error))
    }

    /// Check if the operation may succeed when retried
    ///
    /// Store failures are transient from the list's point of view: the last
    /// good snapshot stays visible and the next refresh tries again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MessagesError::DataAccess(_)
                | MessagesError::Database(_)
                | MessagesError::Io(_)
                | MessagesError::Translation(_)
        )
    }

    /// Check if this error is a cancellation that should be dropped silently
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MessagesError::Cancelled(_))
    }

    /// Get a message suitable for an error indicator in the UI
    pub fn user_message(&self) -> String {
        match self {
            MessagesError::DataAccess(_) | MessagesError::Database(_) => {
                "Could not load conversations. Showing last known list.".to_string()
            }
            MessagesError::Io(e) => format!("I/O error: {}.", e),
            MessagesError::Json(e) => format!("Data format error: {}.", e),
            MessagesError::Cancelled(msg) => format!("Operation cancelled: {}.", msg),
            MessagesError::Translation(msg) => format!("Translation failed: {}.", msg),
            MessagesError::UnsupportedLanguagePair {
                source_language,
                target_language,
            } => format!(
                "Translation from {} to {} is not supported.",
                source_language, target_language
            ),
            MessagesError::AlreadyInTargetLanguage(lang) => {
                format!("Message is already in {}.", lang)
            }
            MessagesError::NoTranslationService => {
                "No translation service available. Download offline models or configure online translation."
                    .to_string()
            }
            MessagesError::EmptyText => "No text to translate.".to_string(),
            MessagesError::Configuration(msg) => {
                format!("Configuration error: {}. Check your settings.", msg)
            }
        }
    }
}
