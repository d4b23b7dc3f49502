//! The message assembler: address map, subject and ordered parts, serialized
//! into a canonical `multipart/mixed` message.

use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::crypt::envelope::write_envelope;
use crate::crypt::keys::{Recipient, Signer};
use crate::crypt::PgpOptions;
use crate::error::{MailError, Result};
use crate::mime::header::{
    encode_unstructured, param_value, write_field, CONTENT_TYPE, MIME_VERSION, SUBJECT,
};
use crate::mime::multipart::{is_valid_boundary, random_boundary, MultipartWriter};
use crate::model::address::{AddressRole, Addresses, Mailbox};
use crate::model::part::Part;

pub const MIME_MULTIPART_MIXED: &str = "multipart/mixed";

/// A MIME email message.
///
/// Build it up with addresses, a subject and parts, then [`serialize`] it as
/// many times as needed. Every call picks a fresh boundary unless one was
/// pinned with [`pin_boundary`], in which case the output is byte-identical
/// for an unchanged message.
///
/// A message is not meant to be shared between threads while it is being
/// mutated or serialized.
///
/// [`serialize`]: Message::serialize
/// [`pin_boundary`]: Message::pin_boundary
#[derive(Debug, Clone, Default)]
pub struct Message {
    addresses: Addresses,
    subject: String,
    parts: Vec<Part>,
    boundary: Option<String>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Addresses ───────────────────────────────────────────────

    pub fn addresses(&self) -> &Addresses {
        &self.addresses
    }

    pub fn add_address(&mut self, role: AddressRole, mailbox: Mailbox) {
        self.addresses.add(role, mailbox);
    }

    pub fn add_person(&mut self, role: AddressRole, name: &str, address: &str) {
        self.addresses.add(role, Mailbox::new(name, address));
    }

    /// Add a mailbox under a role given by name (`"To"`, `"Reply-To"`, …).
    ///
    /// Fails with `InvalidField` for anything outside the seven known roles.
    pub fn add_address_by_name(&mut self, role: &str, mailbox: Mailbox) -> Result<()> {
        self.addresses.add_by_name(role, mailbox)
    }

    pub fn sender(&mut self, name: &str, address: &str) {
        self.add_person(AddressRole::Sender, name, address);
    }

    pub fn from(&mut self, name: &str, address: &str) {
        self.add_person(AddressRole::From, name, address);
    }

    pub fn to(&mut self, name: &str, address: &str) {
        self.add_person(AddressRole::To, name, address);
    }

    pub fn cc(&mut self, name: &str, address: &str) {
        self.add_person(AddressRole::Cc, name, address);
    }

    pub fn bcc(&mut self, name: &str, address: &str) {
        self.add_person(AddressRole::Bcc, name, address);
    }

    pub fn reply_to(&mut self, name: &str, address: &str) {
        self.add_person(AddressRole::ReplyTo, name, address);
    }

    pub fn followup_to(&mut self, name: &str, address: &str) {
        self.add_person(AddressRole::FollowupTo, name, address);
    }

    /// Address used as the SMTP envelope sender: first `Sender`, else first
    /// `From`, else `NoSender`.
    pub fn effective_sender(&self) -> Result<String> {
        self.addresses
            .effective_sender()
            .map(|m| m.address.clone())
    }

    /// Every To, Cc and Bcc address, in that order.
    pub fn recipients(&self) -> Vec<String> {
        self.addresses.recipients()
    }

    // ── Subject & parts ─────────────────────────────────────────

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Append a part. It is serialized after every part added before it.
    pub fn add_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Attach the file at `path`, optionally under a different name.
    pub fn add_file(&mut self, path: impl AsRef<Path>, name: Option<&str>) -> Result<()> {
        let part = Part::file(path, name)?;
        self.add_part(part);
        Ok(())
    }

    /// Attach everything read from `reader` under `name`.
    pub fn add_reader<R: Read>(&mut self, name: &str, reader: R) -> Result<()> {
        let part = Part::attachment(name, reader)?;
        self.add_part(part);
        Ok(())
    }

    /// Append a `text/plain` part and return it so a body can be written into it.
    pub fn plain_text_body(&mut self) -> &mut Part {
        self.push_and_get(Part::plain_text())
    }

    /// Append a `text/html` part and return it so a body can be written into it.
    pub fn html_body(&mut self) -> &mut Part {
        self.push_and_get(Part::html())
    }

    fn push_and_get(&mut self, part: Part) -> &mut Part {
        self.parts.push(part);
        let last = self.parts.len() - 1;
        &mut self.parts[last]
    }

    // ── Boundary ────────────────────────────────────────────────

    /// Use `boundary` for every following serialization instead of a random one.
    ///
    /// Boundaries outside the RFC 2046 syntax (see
    /// [`is_valid_boundary`](crate::mime::multipart::is_valid_boundary)) fail
    /// with `InvalidBoundary` and leave the current setting unchanged. The
    /// caller is responsible for picking one that cannot occur in the parts.
    pub fn pin_boundary(&mut self, boundary: impl Into<String>) -> Result<()> {
        let boundary = boundary.into();
        if !is_valid_boundary(&boundary) {
            return Err(MailError::InvalidBoundary(boundary));
        }
        self.boundary = Some(boundary);
        Ok(())
    }

    /// Go back to a fresh random boundary per serialization.
    pub fn unpin_boundary(&mut self) {
        self.boundary = None;
    }

    pub fn pinned_boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    // ── Serialization ───────────────────────────────────────────

    /// Write the complete message: header block and `multipart/mixed` body.
    ///
    /// Output already written when an error occurs stays in `w`; the caller
    /// must discard it.
    pub fn serialize<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let boundary = self.boundary.clone().unwrap_or_else(random_boundary);
        debug!(
            parts = self.parts.len(),
            boundary = %boundary,
            pinned = self.boundary.is_some(),
            "Serializing message"
        );
        self.write_header_block(w)?;
        self.write_body(w, &boundary)?;
        Ok(())
    }

    /// The complete message as bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.serialize(&mut out)?;
        Ok(out)
    }

    /// Address fields, `Subject` and `MIME-Version`, in fixed order.
    pub(crate) fn write_header_block<W: Write + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        for (name, value) in self.addresses.header_fields() {
            write_field(w, name, &value)?;
        }
        if !self.subject.is_empty() {
            write_field(w, SUBJECT, &encode_unstructured(&self.subject))?;
        }
        write_field(w, MIME_VERSION, "1.0")
    }

    fn write_body<W: Write + ?Sized>(&self, w: &mut W, boundary: &str) -> std::io::Result<()> {
        write_field(
            w,
            CONTENT_TYPE,
            &format!("{MIME_MULTIPART_MIXED}; boundary={}", param_value(boundary)),
        )?;
        w.write_all(b"\r\n")?;

        let mut mpw = MultipartWriter::new(w, boundary);
        for part in &self.parts {
            mpw.write_part(part.headers(), part.body())?;
        }
        mpw.close()
    }

    // ── Encryption ──────────────────────────────────────────────

    /// Write this message as a PGP/MIME encrypted envelope into `w`.
    pub fn write_encrypted<W: Write>(
        &self,
        w: &mut W,
        recipient: &Recipient,
        signer: Option<&Signer>,
        options: &PgpOptions,
    ) -> Result<()> {
        write_envelope(w, self, recipient, signer, options)
    }

    /// This message as PGP/MIME encrypted envelope bytes.
    pub fn encrypt(
        &self,
        recipient: &Recipient,
        signer: Option<&Signer>,
        options: &PgpOptions,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_encrypted(&mut out, recipient, signer, options)?;
        Ok(out)
    }
}
