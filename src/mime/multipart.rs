//! Multipart body writer (RFC 2046 §5.1).

use std::io::{self, Write};

use rand::RngCore;

use crate::mime::header::Headers;

/// Random bytes per boundary; hex encoding doubles the length.
const BOUNDARY_BYTES: usize = 30;

/// Generate a fresh 60 character hex boundary.
///
/// Long enough that it never shows up inside part content, so parts are not
/// scanned for collisions.
pub fn random_boundary() -> String {
    let mut raw = [0u8; BOUNDARY_BYTES];
    rand::thread_rng().fill_bytes(&mut raw);
    raw.iter().map(|b| format!("{b:02x}")).collect()
}

/// `true` if `boundary` is usable: 1 to 70 characters from the RFC 2046
/// `bchars` set, not ending in a space.
pub fn is_valid_boundary(boundary: &str) -> bool {
    !boundary.is_empty()
        && boundary.len() <= 70
        && !boundary.ends_with(' ')
        && boundary
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c))
}

/// Writes delimiters and part headers around bodies written by the caller.
///
/// ```text
/// --B\r\n headers \r\n body
/// \r\n--B\r\n headers \r\n body
/// \r\n--B--\r\n
/// ```
pub struct MultipartWriter<'a, W: Write + ?Sized> {
    w: &'a mut W,
    boundary: String,
    parts: usize,
}

impl<'a, W: Write + ?Sized> MultipartWriter<'a, W> {
    pub fn new(w: &'a mut W, boundary: impl Into<String>) -> Self {
        Self {
            w,
            boundary: boundary.into(),
            parts: 0,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Start a new part and return the destination for its body.
    pub fn create_part(&mut self, headers: &Headers) -> io::Result<&mut W> {
        if self.parts > 0 {
            self.w.write_all(b"\r\n")?;
        }
        write!(self.w, "--{}\r\n", self.boundary)?;
        headers.write_to(&mut *self.w)?;
        self.w.write_all(b"\r\n")?;
        self.parts += 1;
        Ok(&mut *self.w)
    }

    /// Write a whole part in one call.
    pub fn write_part(&mut self, headers: &Headers, body: &[u8]) -> io::Result<()> {
        self.create_part(headers)?.write_all(body)
    }

    /// Write the closing delimiter.
    pub fn close(self) -> io::Result<()> {
        if self.parts > 0 {
            self.w.write_all(b"\r\n")?;
        }
        write!(self.w, "--{}--\r\n", self.boundary)
    }
}
