//! Centralized error types for mimemail.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mimemail library.
#[derive(Error, Debug)]
pub enum MailError {
    /// Neither a `Sender` nor a `From` address is set on the message.
    #[error("Message has neither a From nor a Sender address")]
    NoSender,

    /// An address was added under a role that is not a recognized header.
    #[error("'{0}' is not a valid address field (use: Sender, From, To, Cc, Bcc, ReplyTo or FollowupTo)")]
    InvalidField(String),

    /// A pinned multipart boundary is outside the RFC 2046 syntax.
    #[error("'{0}' is not a valid multipart boundary (1-70 characters from the RFC 2046 set)")]
    InvalidBoundary(String),

    /// Key material could not be parsed or has the wrong type.
    #[error("Invalid key material: {0}")]
    KeyParse(String),

    /// A private key could not be unlocked with the given passphrase.
    #[error("Could not unlock private key: {0}")]
    KeyDecrypt(String),

    /// Writing to the destination failed. Partial output must be discarded.
    #[error("Failed to write message: {0}")]
    Serialization(#[source] std::io::Error),

    /// Dialing, negotiating or delivering to the mail server failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Reading attachment content from a caller-supplied reader failed.
    #[error("Failed to read attachment '{name}': {source}")]
    Attachment {
        name: String,
        source: std::io::Error,
    },

    /// The configuration is incomplete or inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Bare `io::Error`s only come from writing a message out, so `?` on them
/// yields `Serialization`. Reads go through [`MailError::io`].
impl From<std::io::Error> for MailError {
    fn from(source: std::io::Error) -> Self {
        Self::Serialization(source)
    }
}
