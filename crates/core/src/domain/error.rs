// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Unknown target kind: {0}")]
    UnknownTargetKind(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
