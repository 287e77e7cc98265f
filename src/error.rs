//! Crate-level error type

use crate::config::ConfigError;
use crate::script::ScriptError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by Tandem's fallible entry points
#[derive(Debug, Error)]
pub enum TandemError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("script error: {0}")]
    Script(#[from] ScriptError),
}

pub type TandemResult<T> = Result<T, TandemError>;
