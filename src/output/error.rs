// ABOUTME: Error types for output emission operations
// ABOUTME: Defines errors raised while configuring or writing emitted lines

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Invalid output destination '{destination}': {reason}")]
    InvalidDestination { destination: String, reason: String },

    #[error("Write error: {message}")]
    WriteError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OutputError>;
