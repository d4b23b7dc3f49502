//! Layered writers for the encryption pipeline.
//!
//! A cipher writer is two layers: [`SealWriter`] collects plaintext and turns
//! it into OpenPGP packets, [`ArmorWriter`] turns those packets into ASCII
//! armor on the destination. Closing the outer layer closes the inner one.

use std::io::{self, Write};

use pgp::ser::Serialize;
use pgp::Message as PgpMessage;
use tracing::{debug, warn};

use super::armor::ArmorWriter;
use super::keys::{Recipient, Signer};
use super::PgpOptions;
use crate::error::{MailError, Result};

/// A writer that has to be explicitly finished.
///
/// `close` emits whatever trailer the layer owes (final packets, armor
/// footer) and then closes the layer below. Closing twice is a no-op.
pub trait WriteClose: Write {
    fn close(&mut self) -> io::Result<()>;
}

impl<T: WriteClose + ?Sized> WriteClose for &mut T {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<T: WriteClose + ?Sized> WriteClose for Box<T> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Lifecycle of a layered writer. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Open,
    Writing,
    Closed,
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "write after close")
}

fn pgp_error(e: pgp::errors::Error) -> io::Error {
    io::Error::other(e.to_string())
}

#[derive(Debug, Clone, Copy)]
enum Seal<'k> {
    Encrypt {
        recipient: &'k Recipient,
        signer: Option<&'k Signer>,
    },
    Sign {
        signer: &'k Signer,
    },
}

/// Encrypt (and optionally sign) everything written, into `inner`.
///
/// Plaintext is held in memory until [`close`](WriteClose::close), where the
/// packets are built and written in one go.
pub struct SealWriter<'k, W: WriteClose> {
    inner: W,
    seal: Seal<'k>,
    options: PgpOptions,
    plaintext: Vec<u8>,
    state: WriterState,
}

/// Encryption layer wrapped in ASCII armor.
pub type CipherWriter<'k, W> = SealWriter<'k, ArmorWriter<W>>;

impl<'k, W: WriteClose> SealWriter<'k, W> {
    /// Encrypt to `recipient`, signing first when `signer` is given.
    pub fn encrypt(
        inner: W,
        recipient: &'k Recipient,
        signer: Option<&'k Signer>,
        options: &PgpOptions,
    ) -> Self {
        Self::with_seal(inner, Seal::Encrypt { recipient, signer }, options)
    }

    /// Sign only. The output is a signed literal message, not encrypted.
    pub fn sign(inner: W, signer: &'k Signer, options: &PgpOptions) -> Self {
        Self::with_seal(inner, Seal::Sign { signer }, options)
    }

    fn with_seal(inner: W, seal: Seal<'k>, options: &PgpOptions) -> Self {
        Self {
            inner,
            seal,
            options: *options,
            plaintext: Vec::new(),
            state: WriterState::Open,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    fn seal(&self) -> io::Result<PgpMessage> {
        let mut rng = rand::thread_rng();
        let literal = PgpMessage::new_literal_bytes("", &self.plaintext);
        let digest = self.options.digest.to_pgp();

        match self.seal {
            Seal::Sign { signer } => literal
                .sign(&mut rng, signer.key(), || signer.passphrase(), digest)
                .map_err(pgp_error),
            Seal::Encrypt { recipient, signer } => {
                let msg = match signer {
                    Some(signer) => literal
                        .sign(&mut rng, signer.key(), || signer.passphrase(), digest)
                        .map_err(pgp_error)?,
                    None => literal,
                };
                let cipher = self.options.cipher.to_pgp();
                let key = recipient.key();
                match recipient.encryption_subkey() {
                    Some(i) => msg.encrypt_to_keys_seipdv1(
                        &mut rng,
                        cipher,
                        &[&key.public_subkeys[i].key],
                    ),
                    None => msg.encrypt_to_keys_seipdv1(&mut rng, cipher, &[&key.primary_key]),
                }
                .map_err(pgp_error)
            }
        }
    }
}

impl<W: WriteClose> Write for SealWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state == WriterState::Closed {
            return Err(closed_error());
        }
        self.state = WriterState::Writing;
        self.plaintext.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: WriteClose> WriteClose for SealWriter<'_, W> {
    fn close(&mut self) -> io::Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.state = WriterState::Closed;

        let message = self.seal()?;
        message.to_writer(&mut self.inner).map_err(pgp_error)?;
        debug!(plaintext = self.plaintext.len(), "Sealed message");
        self.plaintext.clear();
        self.inner.close()
    }
}

impl<W: WriteClose> Drop for SealWriter<'_, W> {
    fn drop(&mut self) {
        if self.state != WriterState::Closed && !std::thread::panicking() {
            warn!(
                buffered = self.plaintext.len(),
                "Cipher writer dropped without close; output is truncated"
            );
        }
    }
}

/// Start an armored encryption stream on `dest`.
///
/// The armor header is written immediately. Everything written to the
/// returned writer is encrypted to `recipient` (signed by `signer` when
/// given) once it is closed.
pub fn open_cipher_writer<'k, W: Write>(
    dest: W,
    recipient: &'k Recipient,
    signer: Option<&'k Signer>,
    options: &PgpOptions,
) -> Result<CipherWriter<'k, W>> {
    let armor = ArmorWriter::new(dest).map_err(MailError::Serialization)?;
    Ok(SealWriter::encrypt(armor, recipient, signer, options))
}

/// Start an armored signing stream on `dest`.
pub fn open_sign_writer<'k, W: Write>(
    dest: W,
    signer: &'k Signer,
    options: &PgpOptions,
) -> Result<CipherWriter<'k, W>> {
    let armor = ArmorWriter::new(dest).map_err(MailError::Serialization)?;
    Ok(SealWriter::sign(armor, signer, options))
}
