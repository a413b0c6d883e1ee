//! Load/parse-path error type.
//!
//! A plain enum + hand-written `Display`, no `thiserror`: runtime
//! instruction-level faults never reach this type (they are handled
//! CPU-locally), this only covers the boundary the CLI surfaces to the user.

use std::fmt;

/// Errors that can occur while loading a program image or configuring a run.
#[derive(Debug)]
pub enum LoadError {
    /// Underlying I/O error (file not found, permission denied, etc).
    Io(std::io::Error),
    /// The requested CPU mode isn't one of the four supported cores.
    UnknownCpuMode(String),
    /// `--load-addr`/`--entry` placed the image (partially) outside the
    /// addressable window for the selected CPU.
    AddressOutOfRange { addr: u64, len: usize, limit: u64 },
    /// A chip-player file had a bad magic number or unsupported version.
    BadFormat(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::UnknownCpuMode(mode) => write!(f, "unknown CPU mode: {mode}"),
            Self::AddressOutOfRange { addr, len, limit } => write!(
                f,
                "load address 0x{addr:06X} + {len} bytes exceeds address space (limit 0x{limit:06X})"
            ),
            Self::BadFormat(msg) => write!(f, "bad file format: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
