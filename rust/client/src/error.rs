use std::path::PathBuf;

use crate::vault::MIN_PASSWORD_LEN;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("out of range: {0}")]
    OutOfRange(String),
    #[error("invalid tick spacing: {0}")]
    InvalidSpacing(i32),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("amount overflow: {0}")]
    AmountOverflow(String),
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,
    #[error("key file already exists: {}", .0.display())]
    FileAlreadyExists(PathBuf),
    #[error("key file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("corrupt key file: {0}")]
    CorruptKeyFile(String),
    #[error("invalid password")]
    WrongPassword,
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("serde error: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serde(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

impl From<csv::Error> for ClientError {
    fn from(err: csv::Error) -> Self {
        ClientError::Serde(err.to_string())
    }
}
