use std::io::ErrorKind;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BlockcolError {
    #[error("Cannot write an empty vector")]
    EmptyVectorError,
    #[error("Format error: {0}")]
    FormatError(String),
    #[error("Corrupt block: {0}")]
    CorruptBlock(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Cannot parse config: {0}")]
    ConfigParsingError(String),
}

impl From<std::io::Error> for BlockcolError {
    fn from(err: std::io::Error) -> Self {
        // A short read means the column claims more bytes than the stream holds.
        if err.kind() == ErrorKind::UnexpectedEof {
            BlockcolError::FormatError(format!("truncated stream: {err}"))
        } else {
            BlockcolError::IoError(err.to_string())
        }
    }
}
