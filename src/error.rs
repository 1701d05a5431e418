//! Error types for store construction and misuse.
//!
//! Callback failures (a panicking subscriber, a middleware hook returning
//! `Err`) never surface here: they are isolated and logged at the call site.
//! [`Error`] only carries caller-misuse failures, returned at the point of
//! misuse.

use thiserror::Error;

/// Boxed error returned by fallible middleware hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The crate's error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A key subscription named a key the record does not have.
    #[error("unknown key `{key}` for record `{record}`")]
    UnknownKey {
        /// The requested key name.
        key: &'static str,
        /// Type name of the record.
        record: &'static str,
    },

    /// Two middleware entries in one pipeline share a name.
    #[error("duplicate middleware name `{0}`")]
    DuplicateMiddleware(String),

    /// Configuration is invalid or missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration could not be parsed as TOML.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// A specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, Error>;
