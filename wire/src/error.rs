//! Error types for wire transcoding.

use thiserror::Error;

/// Error type for encode and decode operations.
///
/// Every failure while walking a message is reported through this enum; a
/// malformed or hostile peer message always degrades to one of these
/// variants, never a panic.
#[derive(Error, Debug)]
pub enum Error {
    // Capacity and bounds
    #[error("arena exhausted: {needed} bytes requested, {remaining} remaining")]
    OutOfCapacity { needed: usize, remaining: usize },
    #[error("message truncated: {needed} bytes requested, {remaining} remaining")]
    OutOfBounds { needed: usize, remaining: usize },
    #[error("end of handle stream")]
    EndOfHandles,
    #[error("too many handles in message: {0}")]
    TooManyHandles(usize),

    // Recursion
    #[error("maximum nesting depth exceeded")]
    MaxDepthExceeded,

    // Envelope format
    #[error("invalid envelope byte count: {0}")]
    InvalidEnvelopeByteCount(u32),
    #[error("invalid envelope handle count: {0}")]
    InvalidEnvelopeHandleCount(u16),
    #[error("invalid envelope inline bit: {0:#x}")]
    InvalidInlineBit(u16),

    // Exactness (checked after the root callback returns)
    #[error("{0} message bytes not consumed")]
    ExtraBytes(usize),
    #[error("{0} handles not consumed")]
    ExtraHandles(usize),

    // Content validation
    #[error("non-zero padding at offset {0}")]
    NonZeroPadding(usize),
    #[error("invalid boolean: {0:#x}")]
    InvalidBool(u8),
    #[error("invalid presence marker: {0:#x}")]
    InvalidPresence(u64),
    #[error("absent value for required field")]
    RequiredFieldAbsent,
    #[error("invalid utf-8 in string")]
    InvalidUtf8,
    #[error("invalid magic number: {0}")]
    InvalidMagic(u8),

    // Handle validation
    #[error("handle kind mismatch: expected {expected}, received {received}")]
    WrongHandleKind { expected: u32, received: u32 },
    #[error("handle missing rights: {missing:#x}")]
    MissingRights { missing: u32 },

    // Raised by per-type callbacks
    #[error("invalid data in {0}: {1}")]
    InvalidData(String, String), // context, message
}
