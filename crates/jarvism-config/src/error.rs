//! Error types for configuration loading and the generic config tree

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur while loading or walking a configuration tree
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading a configuration file
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// YAML (or other producer) failed to yield a tree
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    /// A node had a different shape than the schema expects
    #[error("in {at}: expected {expected} but found {found}")]
    TypeMismatch {
        at: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A mapping key that is not a plain scalar
    #[error("in {at}: mapping keys must be scalars")]
    NonScalarKey { at: String },

    /// A YAML construct the tree model does not carry
    #[error("in {at}: unsupported value: {what}")]
    Unsupported { at: String, what: String },

    /// Required environment variable is missing
    #[error("Env ${0} is not set!")]
    EnvNotSet(&'static str),
}
