//! costctl error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CtlError {
    #[error("config error: {0}")]
    Config(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CtlResult<T> = Result<T, CtlError>;
