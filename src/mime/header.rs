//! RFC 5322 header fields: canonical names, encoded-words (RFC 2047) and
//! the per-part header map.

use std::collections::BTreeMap;
use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_TRANSFER_ENCODING: &str = "Content-Transfer-Encoding";
pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_DESCRIPTION: &str = "Content-Description";
pub const MIME_VERSION: &str = "MIME-Version";
pub const SUBJECT: &str = "Subject";

/// Longest raw chunk per encoded-word: 45 bytes → 60 base64 chars, which
/// keeps `=?utf-8?b?...?=` within the 75 character limit.
const ENCODED_WORD_CHUNK: usize = 45;

/// Canonical form of a header name: first letter and every letter after a
/// hyphen upper-cased, the rest lower-cased (`content-type` → `Content-Type`).
///
/// `MIME-Version` is kept as the RFC spells it.
pub fn canonical_key(name: &str) -> String {
    let name = name.trim();
    if name.eq_ignore_ascii_case(MIME_VERSION) {
        return MIME_VERSION.to_string();
    }
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}

/// Encode `text` as one or more RFC 2047 `B` encoded-words.
///
/// Words are split on character boundaries and joined with a folding
/// whitespace.
pub fn encode_word(text: &str) -> String {
    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in text.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_CHUNK {
            words.push(format!("=?utf-8?b?{}?=", STANDARD.encode(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() || words.is_empty() {
        words.push(format!("=?utf-8?b?{}?=", STANDARD.encode(chunk.as_bytes())));
    }
    words.join("\r\n ")
}

/// `true` if `value` is an RFC 2045 token: printable ASCII with no space
/// and none of the `tspecials`.
pub fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c))
}

/// A parameter value for a structured field such as `Content-Type`.
///
/// Tokens are written bare. Anything else becomes a quoted-string with `"`
/// and `\` escaped. Control characters are dropped and non-ASCII text is
/// carried as encoded-words inside the quotes.
pub fn param_value(value: &str) -> String {
    if is_token(value) {
        return value.to_string();
    }
    let clean: String = value.chars().filter(|c| !c.is_control()).collect();
    let text = if clean.is_ascii() {
        clean
    } else {
        encode_word(&clean).replace("\r\n ", " ")
    };
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Value of an unstructured field such as `Subject`: ASCII is kept verbatim,
/// anything else becomes encoded-words. Line breaks are never passed through.
pub fn encode_unstructured(text: &str) -> String {
    let flat: String = text.chars().map(|c| if c == '\r' || c == '\n' { ' ' } else { c }).collect();
    if flat.is_ascii() {
        flat
    } else {
        encode_word(&flat)
    }
}

/// Write a single `Name: value` line terminated by CRLF.
pub fn write_field<W: Write + ?Sized>(w: &mut W, name: &str, value: &str) -> std::io::Result<()> {
    write!(w, "{name}: {value}\r\n")
}

/// Header fields of one MIME part, keyed by canonical name.
///
/// Emission order is the sorted order of the names; insertion order within a
/// part carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: BTreeMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value of `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(canonical_key(name), vec![value.into()]);
    }

    /// Append another value for `name`.
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.fields
            .entry(canonical_key(name))
            .or_default()
            .push(value.into());
    }

    /// First value of `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&canonical_key(name))
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Every value of `name`.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.fields
            .get(&canonical_key(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&canonical_key(name))
    }

    /// `(name, value)` pairs in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Write every field as a header line. Does not write the blank line.
    pub fn write_to<W: Write + ?Sized>(&self, w: &mut W) -> std::io::Result<()> {
        for (name, value) in self.iter() {
            write_field(w, name, value)?;
        }
        Ok(())
    }
}
