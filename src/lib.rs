//! `mimemail`: compose MIME email and seal it in PGP/MIME envelopes.
//!
//! This crate provides the core library for assembling messages with a
//! canonical header layout, encrypting them into RFC 3156 envelopes, and
//! handing the result to an SMTP server.

pub mod config;
pub mod crypt;
pub mod error;
pub mod mime;
pub mod model;
pub mod transport;

pub use crypt::{prepare_recipient, prepare_signer, PgpOptions, Recipient, Signer};
pub use error::{MailError, Result};
pub use mime::Message;
pub use model::{AddressRole, Mailbox, Part};
pub use transport::{send_encrypted, send_message, SmtpTransport, Transport};
