//! Error types for the SMTP server

use thiserror::Error;

use crate::smtp::response::Reply;
use crate::smtp::storage::StorageError;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid command")]
    InvalidCommand,

    #[error("Missing {keyword} parameter")]
    MissingParameter { keyword: &'static str },

    #[error("Malformed {keyword} parameter")]
    MalformedParameter { keyword: &'static str },

    #[error("Invalid address")]
    InvalidAddress,

    #[error("No sender specified")]
    NoSender,

    #[error("No recipients specified")]
    NoRecipients,

    #[error("Message body ended before the terminating dot")]
    TruncatedBody,

    #[error("Failed to store message: {0}")]
    StorageFailed(#[from] StorageError),
}

impl SmtpError {
    /// Whether the session can carry on after this error.
    ///
    /// Transport failures are fatal: the peer may be gone, so no reply is
    /// attempted and the connection is dropped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SmtpError::Io(_) | SmtpError::TruncatedBody)
    }

    /// Maps a recoverable error to the reply sent to the client
    pub fn reply(&self) -> Reply {
        let message = match self {
            SmtpError::Io(_) | SmtpError::TruncatedBody => "connection error".to_owned(),
            SmtpError::InvalidCommand => "invalid command".to_owned(),
            SmtpError::MissingParameter { keyword } => format!("missing {keyword}"),
            SmtpError::MalformedParameter { keyword } => format!("invalid {keyword}"),
            SmtpError::InvalidAddress => "invalid address".to_owned(),
            SmtpError::NoSender => "no sender".to_owned(),
            SmtpError::NoRecipients => "no recipients".to_owned(),
            SmtpError::StorageFailed(_) => "failed to store message".to_owned(),
        };
        Reply::new(500, message)
    }
}
