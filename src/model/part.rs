//! A single MIME part: header fields plus an opaque body.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{MailError, Result};
use crate::mime::header::{
    param_value, Headers, CONTENT_DESCRIPTION, CONTENT_DISPOSITION, CONTENT_TRANSFER_ENCODING,
    CONTENT_TYPE,
};

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_HTML: &str = "text/html";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
pub const MIME_PGP_ENCRYPTED: &str = "application/pgp-encrypted";
pub const CHARSET_UTF8: &str = "utf-8";

/// Base64 body lines are wrapped at this many columns (RFC 2045 §6.8).
const BASE64_LINE: usize = 76;

/// Raw bytes encoded per base64 line.
const BASE64_CHUNK: usize = BASE64_LINE / 4 * 3;

/// Header fields plus a byte body.
///
/// A part always carries exactly one `Content-Type`. Bodies can be filled
/// through the [`Write`] impl before the part is appended to a message;
/// after that the message owns it and never changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    headers: Headers,
    body: Vec<u8>,
}

impl Part {
    /// A part with the given `Content-Type` and an empty body.
    pub fn new(content_type: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.set(CONTENT_TYPE, content_type);
        Self {
            headers,
            body: Vec::new(),
        }
    }

    /// A text part, e.g. `text("plain", "utf-8")` → `text/plain; charset=utf-8`.
    pub fn text(subtype: &str, charset: &str) -> Self {
        Self::new(format!("text/{subtype}; charset={charset}"))
    }

    /// `Content-Type: text/plain; charset=utf-8`
    pub fn plain_text() -> Self {
        Self::new(format!("{MIME_TEXT}; charset={CHARSET_UTF8}"))
    }

    /// `Content-Type: text/html; charset=utf-8`
    pub fn html() -> Self {
        Self::new(format!("{MIME_HTML}; charset={CHARSET_UTF8}"))
    }

    /// Build an attachment by base64-encoding everything read from `reader`.
    ///
    /// The reader is consumed and dropped before returning, on success and
    /// on failure.
    pub fn attachment<R: Read>(name: &str, mut reader: R) -> Result<Self> {
        let mut raw = Vec::new();
        reader
            .read_to_end(&mut raw)
            .map_err(|source| MailError::Attachment {
                name: name.to_string(),
                source,
            })?;
        drop(reader);

        let mut part = Self::new(MIME_OCTET_STREAM);
        part.headers.set(CONTENT_TRANSFER_ENCODING, "base64");
        part.headers
            .set(CONTENT_DISPOSITION, format!("attachment; filename={}", param_value(name)));
        part.body = encode_base64_lines(&raw);
        Ok(part)
    }

    /// Attach the file at `path`, named `name` or the file's own name.
    pub fn file(path: impl AsRef<Path>, name: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MailError::io(path, e))?;
        let name = match name {
            Some(n) => n.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "attachment".to_string()),
        };
        tracing::debug!(path = %path.display(), name = %name, "Attaching file");
        Self::attachment(&name, file).map_err(|e| match e {
            MailError::Attachment { source, .. } => MailError::io(path, source),
            other => other,
        })
    }

    /// The PGP/MIME version identification part (RFC 3156 §4).
    pub fn pgp_version() -> Self {
        let mut part = Self::new(MIME_PGP_ENCRYPTED);
        part.headers
            .set(CONTENT_DESCRIPTION, "PGP/MIME version identification");
        part.body.extend_from_slice(b"Version: 1\r\n");
        part
    }

    /// Headers of the part that carries the armored ciphertext.
    pub fn pgp_encrypted() -> Self {
        let mut part = Self::new(format!("{MIME_OCTET_STREAM}; name=\"encrypted.asc\""));
        part.headers
            .set(CONTENT_DESCRIPTION, "OpenPGP encrypted message");
        part.headers
            .set(CONTENT_DISPOSITION, "inline; filename=\"encrypted.asc\"");
        part
    }

    /// Replace every value of a header. Setting `Content-Type` replaces the
    /// single existing value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Append a header value.
    ///
    /// `Content-Type` is single-valued, so appending to it replaces it.
    pub fn add_header(&mut self, name: &str, value: impl Into<String>) {
        if self.headers.contains(name) && name.eq_ignore_ascii_case(CONTENT_TYPE) {
            self.headers.set(name, value);
        } else {
            self.headers.add(name, value);
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn content_type(&self) -> &str {
        self.headers.get(CONTENT_TYPE).unwrap_or(MIME_OCTET_STREAM)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Write for Part {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Base64 with CRLF line breaks every 76 columns. Empty input yields an
/// empty body.
fn encode_base64_lines(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() * 4 / 3 + raw.len() / BASE64_CHUNK * 2 + 4);
    for chunk in raw.chunks(BASE64_CHUNK) {
        out.extend_from_slice(STANDARD.encode(chunk).as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(body: &[u8]) -> Vec<u8> {
        let text: String = String::from_utf8(body.to_vec())
            .unwrap()
            .split("\r\n")
            .collect();
        STANDARD.decode(text).unwrap()
    }

    #[test]
    fn test_plain_text_content_type() {
        let p = Part::plain_text();
        assert_eq!(p.content_type(), "text/plain; charset=utf-8");
        assert_eq!(Part::text("calendar", "us-ascii").content_type(), "text/calendar; charset=us-ascii");
    }

    #[test]
    fn test_write_fills_body() {
        let mut p = Part::html();
        write!(p, "<p>{}</p>", "hi").unwrap();
        assert_eq!(p.body(), b"<p>hi</p>");
    }

    #[test]
    fn test_content_type_stays_single() {
        let mut p = Part::plain_text();
        p.add_header("content-type", "text/html");
        p.set_header("Content-Type", "text/x-other");
        assert_eq!(p.headers().get_all("Content-Type").len(), 1);
        assert_eq!(p.content_type(), "text/x-other");
    }

    #[test]
    fn test_attachment_headers() {
        let p = Part::attachment("report.pdf", &b"%PDF"[..]).unwrap();
        assert_eq!(p.header("Content-Type"), Some("application/octet-stream"));
        assert_eq!(p.header("Content-Transfer-Encoding"), Some("base64"));
        assert_eq!(
            p.header("Content-Disposition"),
            Some("attachment; filename=report.pdf")
        );
    }

    #[test]
    fn test_attachment_filename_is_quoted_when_needed() {
        let p = Part::attachment("my report (final).pdf", &b"%PDF"[..]).unwrap();
        assert_eq!(
            p.header("Content-Disposition"),
            Some("attachment; filename=\"my report (final).pdf\"")
        );
        let p = Part::attachment("a\r\nX-Injected: 1", &b""[..]).unwrap();
        assert_eq!(
            p.header("Content-Disposition"),
            Some("attachment; filename=\"aX-Injected: 1\"")
        );
    }

    #[test]
    fn test_attachment_roundtrip_lengths() {
        for len in [0usize, 1, 2, 3, 56, 57, 58, 114, 1000] {
            let data: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();
            let p = Part::attachment("blob.bin", data.as_slice()).unwrap();
            assert_eq!(decode(p.body()), data, "length {len}");
            for line in p.body().split(|b| *b == b'\n') {
                assert!(line.len() <= BASE64_LINE + 1);
            }
        }
    }

    #[test]
    fn test_attachment_empty_body() {
        let p = Part::attachment("empty", io::empty()).unwrap();
        assert!(p.body().is_empty());
    }

    #[test]
    fn test_attachment_reader_failure() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
            }
        }
        let err = Part::attachment("x", Broken).unwrap_err();
        assert!(matches!(err, MailError::Attachment { name, .. } if name == "x"));
    }

    #[test]
    fn test_file_attachment_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let p = Part::file(&path, None).unwrap();
        assert_eq!(
            p.header("Content-Disposition"),
            Some("attachment; filename=notes.txt")
        );
        assert_eq!(decode(p.body()), b"hello");

        let renamed = Part::file(&path, Some("other.txt")).unwrap();
        assert_eq!(
            renamed.header("Content-Disposition"),
            Some("attachment; filename=other.txt")
        );
    }

    #[test]
    fn test_file_attachment_missing() {
        let err = Part::file("/nonexistent/really/not/here", None).unwrap_err();
        assert!(matches!(err, MailError::Io { .. }));
    }

    #[test]
    fn test_pgp_version_part() {
        let p = Part::pgp_version();
        assert_eq!(p.content_type(), "application/pgp-encrypted");
        assert_eq!(p.body(), b"Version: 1\r\n");
    }
}
