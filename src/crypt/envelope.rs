//! RFC 3156 `multipart/encrypted` envelope around a serialized message.

use std::io::Write;

use tracing::debug;

use super::keys::{Recipient, Signer};
use super::writer::{open_cipher_writer, WriteClose};
use super::PgpOptions;
use crate::error::{MailError, Result};
use crate::mime::header::{write_field, CONTENT_TYPE};
use crate::mime::message::Message;
use crate::mime::multipart::{random_boundary, MultipartWriter};
use crate::model::part::Part;

pub const MIME_MULTIPART_ENCRYPTED: &str = "multipart/encrypted";
pub const PGP_PROTOCOL: &str = "application/pgp-encrypted";

/// Write `message` as an encrypted envelope into `w`.
///
/// The envelope repeats the message header block in the clear, then carries
/// a version part and an armored ciphertext part. The ciphertext decrypts to
/// exactly what [`Message::serialize`] produces, header block included.
pub fn write_envelope<W: Write + ?Sized>(
    w: &mut W,
    message: &Message,
    recipient: &Recipient,
    signer: Option<&Signer>,
    options: &PgpOptions,
) -> Result<()> {
    let boundary = random_boundary();
    debug!(
        boundary = %boundary,
        signed = signer.is_some(),
        cipher = ?options.cipher,
        "Writing encrypted envelope"
    );

    message.write_header_block(w)?;
    write_field(
        w,
        CONTENT_TYPE,
        &format!("{MIME_MULTIPART_ENCRYPTED}; protocol=\"{PGP_PROTOCOL}\"; boundary=\"{boundary}\""),
    )?;
    w.write_all(b"\r\n")?;

    let mut mpw = MultipartWriter::new(w, boundary);

    let version = Part::pgp_version();
    mpw.write_part(version.headers(), version.body())?;

    let encrypted = Part::pgp_encrypted();
    let dest = mpw.create_part(encrypted.headers())?;
    let mut cipher = open_cipher_writer(dest, recipient, signer, options)?;
    message.serialize(&mut cipher)?;
    cipher.close().map_err(MailError::Serialization)?;
    drop(cipher);

    mpw.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::keys::prepare_recipient;

    const RECIPIENT_PUBLIC: &str = include_str!("../../tests/fixtures/recipient_public.asc");

    fn message() -> Message {
        let mut m = Message::new();
        m.from("Alice", "a@x.com");
        m.to("Bob", "b@y.com");
        m.set_subject("Quarterly numbers");
        m.plain_text_body().write_all(b"see attached").unwrap();
        m
    }

    #[test]
    fn test_envelope_layout() {
        let recipient = prepare_recipient(RECIPIENT_PUBLIC).unwrap();
        let mut out = Vec::new();
        write_envelope(&mut out, &message(), &recipient, None, &PgpOptions::default()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with(
            "From: Alice <a@x.com>\r\nTo: Bob <b@y.com>\r\nSubject: Quarterly numbers\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: multipart/encrypted; protocol=\"application/pgp-encrypted\"; boundary=\""
        ));

        let boundary = text
            .split("boundary=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap();
        assert_eq!(boundary.len(), 60);

        let control = format!(
            "\r\n\r\n--{boundary}\r\nContent-Description: PGP/MIME version identification\r\n\
             Content-Type: application/pgp-encrypted\r\n\r\nVersion: 1\r\n"
        );
        assert!(text.contains(&control));

        let cipher_part = format!(
            "\r\n--{boundary}\r\nContent-Description: OpenPGP encrypted message\r\n\
             Content-Disposition: inline; filename=\"encrypted.asc\"\r\n\
             Content-Type: application/octet-stream; name=\"encrypted.asc\"\r\n\r\n\
             -----BEGIN PGP MESSAGE-----\n\n"
        );
        assert!(text.contains(&cipher_part));
        assert!(text.ends_with(&format!("-----END PGP MESSAGE-----\n\r\n--{boundary}--\r\n")));
        assert!(!text.contains("see attached"));
    }

    /// Accepts `remaining` bytes, then fails every write.
    struct FailAfter {
        remaining: usize,
    }

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.remaining == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "full"));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_anywhere_is_serialization_error() {
        let recipient = prepare_recipient(RECIPIENT_PUBLIC).unwrap();
        let m = message();
        let mut full = Vec::new();
        write_envelope(&mut full, &m, &recipient, None, &PgpOptions::default()).unwrap();
        let text = String::from_utf8(full).unwrap();
        let offset = |needle: &str| text.find(needle).unwrap();

        // Header block, version part, armor header, ciphertext, armor
        // trailer and closing delimiter.
        let cut_points = [
            0,
            10,
            offset("Content-Type: multipart/encrypted"),
            offset("Version: 1"),
            offset("-----BEGIN PGP MESSAGE-----") + 5,
            offset("-----BEGIN PGP MESSAGE-----") + 60,
            offset("-----END PGP MESSAGE-----") + 5,
            text.len() - 10,
        ];
        for n in cut_points {
            let mut w = FailAfter { remaining: n };
            let err = write_envelope(&mut w, &m, &recipient, None, &PgpOptions::default())
                .unwrap_err();
            assert!(matches!(err, MailError::Serialization(_)), "cut at {n}: {err:?}");
        }
    }

    #[test]
    fn test_fresh_outer_boundary_each_call() {
        let recipient = prepare_recipient(RECIPIENT_PUBLIC).unwrap();
        let mut m = message();
        m.pin_boundary("inner").unwrap();
        let a = m.encrypt(&recipient, None, &PgpOptions::default()).unwrap();
        let b = m.encrypt(&recipient, None, &PgpOptions::default()).unwrap();
        assert_ne!(a, b);
    }
}
