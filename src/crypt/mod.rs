//! PGP/MIME encryption pipeline (RFC 3156).
//!
//! Keys are parsed and used through the `pgp` crate; this module owns the
//! layering: ASCII armor around an encrypt(+sign) layer, and the envelope
//! that carries the result.

pub mod armor;
pub mod envelope;
pub mod keys;
pub mod writer;

use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use serde::{Deserialize, Serialize};

pub use envelope::write_envelope;
pub use keys::{prepare_recipient, prepare_signer, Recipient, Signer};
pub use writer::{open_cipher_writer, open_sign_writer, CipherWriter, WriteClose, WriterState};

/// Symmetric cipher for the encrypted data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherAlgorithm {
    #[default]
    Aes128,
    Aes192,
    Aes256,
}

impl CipherAlgorithm {
    pub(crate) fn to_pgp(self) -> SymmetricKeyAlgorithm {
        match self {
            CipherAlgorithm::Aes128 => SymmetricKeyAlgorithm::AES128,
            CipherAlgorithm::Aes192 => SymmetricKeyAlgorithm::AES192,
            CipherAlgorithm::Aes256 => SymmetricKeyAlgorithm::AES256,
        }
    }
}

/// Hash used for signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub(crate) fn to_pgp(self) -> HashAlgorithm {
        match self {
            DigestAlgorithm::Sha256 => HashAlgorithm::SHA2_256,
            DigestAlgorithm::Sha384 => HashAlgorithm::SHA2_384,
            DigestAlgorithm::Sha512 => HashAlgorithm::SHA2_512,
        }
    }
}

/// Algorithm choices passed explicitly to every encrypt/sign call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PgpOptions {
    pub cipher: CipherAlgorithm,
    pub digest: DigestAlgorithm,
}
