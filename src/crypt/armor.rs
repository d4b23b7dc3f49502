//! Streaming ASCII armor encoder (RFC 4880 §6.2).
//!
//! Output layout, LF line endings:
//!
//! ```text
//! -----BEGIN PGP MESSAGE-----
//!
//! <base64, 64 columns>
//! =<base64 CRC-24>
//! -----END PGP MESSAGE-----
//! ```

use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::writer::{closed_error, WriteClose, WriterState};

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// Raw bytes per armored line: 48 bytes → 64 base64 columns.
const LINE_BYTES: usize = 48;

const LABEL: &str = "PGP MESSAGE";

/// Feed `data` into a running CRC-24.
pub fn crc24_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// CRC-24 of `data` as used by the armor checksum line.
pub fn crc24(data: &[u8]) -> u32 {
    crc24_update(CRC24_INIT, data)
}

/// The outer layer of a cipher writer.
///
/// The header line is written on construction, full lines as data arrives,
/// and the remainder, checksum and footer only on [`close`](WriteClose::close).
pub struct ArmorWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
    crc: u32,
    state: WriterState,
}

impl<W: Write> ArmorWriter<W> {
    /// Write the armor header to `inner` and return the encoder.
    pub fn new(mut inner: W) -> io::Result<Self> {
        writeln!(inner, "-----BEGIN {LABEL}-----\n")?;
        Ok(Self {
            inner,
            pending: Vec::with_capacity(LINE_BYTES),
            crc: CRC24_INIT,
            state: WriterState::Open,
        })
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    fn write_line(&mut self, raw: &[u8]) -> io::Result<()> {
        let mut line = STANDARD.encode(raw);
        line.push('\n');
        self.inner.write_all(line.as_bytes())
    }
}

impl<W: Write> Write for ArmorWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state == WriterState::Closed {
            return Err(closed_error());
        }
        self.state = WriterState::Writing;
        self.crc = crc24_update(self.crc, buf);

        let mut rest = buf;
        if !self.pending.is_empty() {
            let take = (LINE_BYTES - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == LINE_BYTES {
                let line = std::mem::take(&mut self.pending);
                self.write_line(&line)?;
            }
        }
        while rest.len() >= LINE_BYTES {
            self.write_line(&rest[..LINE_BYTES])?;
            rest = &rest[LINE_BYTES..];
        }
        self.pending.extend_from_slice(rest);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> WriteClose for ArmorWriter<W> {
    fn close(&mut self) -> io::Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.state = WriterState::Closed;
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.write_line(&line)?;
        }
        let crc = self.crc.to_be_bytes();
        writeln!(self.inner, "={}", STANDARD.encode(&crc[1..]))?;
        writeln!(self.inner, "-----END {LABEL}-----")?;
        self.inner.flush()
    }
}
