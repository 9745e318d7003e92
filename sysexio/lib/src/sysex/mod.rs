//! SysEx framing over a fragmented byte stream.
//!
//! Frames look like `0xF0, vendor, filler, model, ...payload..., 0xF7`.

mod accumulator;
mod splitter;

pub use accumulator::*;
pub use splitter::*;

use bytes::Bytes;

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// `0xF0, vendor, filler, model`
pub const SYSEX_HEADER_LEN: usize = 4;

/// Vendor and model ids a session listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysexHeader {
    pub vendor: u8,
    pub model: u8,
}

impl Default for SysexHeader {
    fn default() -> Self {
        Self {
            vendor: 0x33,
            model: 0x09,
        }
    }
}

impl SysexHeader {
    pub fn start_marker(&self) -> [u8; 2] {
        [SYSEX_START, self.vendor]
    }
}

/// A complete frame, both markers included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysexFrame {
    bytes: Bytes,
}

impl SysexFrame {
    fn from_slice(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() > SYSEX_HEADER_LEN);
        Self {
            bytes: Bytes::copy_from_slice(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn vendor(&self) -> u8 {
        self.bytes[1]
    }

    pub fn model(&self) -> u8 {
        self.bytes[3]
    }

    /// Bytes between the header and the terminator.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[SYSEX_HEADER_LEN..self.bytes.len() - 1]
    }
}

impl std::fmt::Display for SysexFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.bytes.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
