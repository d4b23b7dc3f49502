//! MIME wire format: header fields, multipart bodies and whole messages.

pub mod header;
pub mod message;
pub mod multipart;

pub use message::Message;
