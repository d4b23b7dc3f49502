//! Building blocks of a message: addresses and body parts.

pub mod address;
pub mod part;

pub use address::{AddressRole, Addresses, Mailbox};
pub use part::Part;
