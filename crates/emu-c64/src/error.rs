//! Error taxonomy for the "invalid input" class of failure: bad ROM
//! images, truncated loader files, and snapshot format mismatches. These
//! are the only failures the core returns to a caller; everything else
//! (breakpoint, jam, host halt) is reported asynchronously on the
//! [`crate::message`] queue instead, and an internal invariant violation
//! is a `panic!`, never a `Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("{name} ROM must be {expected} bytes, got {actual}")]
    RomSize {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("PRG file too short (need at least 3 bytes, got {0})")]
    PrgTooShort(usize),

    #[error("snapshot too short to contain a header")]
    SnapshotTruncated,

    #[error("snapshot magic mismatch: expected {expected:08X}, got {actual:08X}")]
    SnapshotMagic { expected: u32, actual: u32 },

    #[error("snapshot major version {actual} incompatible with supported {expected}")]
    SnapshotVersion { expected: u8, actual: u8 },

    #[error("snapshot block {name} truncated or missing its end sentinel")]
    SnapshotBlock { name: &'static str },
}
