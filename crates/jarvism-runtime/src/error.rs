//! Errors surfaced by the execution engine

use jarvism_ast::AstError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Ast(#[from] AstError),

    #[error(transparent)]
    Config(#[from] jarvism_config::ConfigError),

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// A flow was requested for an entity that resolves no build
    #[error("no build resolved for {0}!")]
    NoBuild(String),
}

impl RuntimeError {
    pub fn io(path: impl std::fmt::Display, err: std::io::Error) -> RuntimeError {
        RuntimeError::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}
