//! The transactional header preceding every message body on a channel.

use crate::Error;
use bytes::{Buf, BufMut};

/// The wire-format revision this engine speaks.
pub const MAGIC: u8 = 1;

/// Encoded size of a [`MessageHeader`], in bytes.
pub const HEADER_SIZE: usize = 16;

/// The fixed 16-byte header carried before a message body.
///
/// `txid` correlates a response with its request (zero for one-way
/// messages), `ordinal` identifies the method, and the magic byte pins the
/// wire-format revision so incompatible peers fail fast. The flag bytes are
/// reserved for the dispatch layer and pass through this engine opaquely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub txid: u32,
    pub flags: [u8; 3],
    pub magic: u8,
    pub ordinal: u64,
}

impl MessageHeader {
    /// A header for a message with the given transaction id and method
    /// ordinal, stamped with the current wire-format revision.
    pub fn new(txid: u32, ordinal: u64) -> Self {
        Self {
            txid,
            flags: [0; 3],
            magic: MAGIC,
            ordinal,
        }
    }

    /// Writes the header to `buf`.
    ///
    /// Panics if `buf` lacks [`HEADER_SIZE`] bytes of capacity.
    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.txid);
        buf.put_slice(&self.flags);
        buf.put_u8(self.magic);
        buf.put_u64_le(self.ordinal);
    }

    /// Reads and validates a header from `buf`.
    pub fn read(buf: &mut impl Buf) -> Result<Self, Error> {
        if buf.remaining() < HEADER_SIZE {
            return Err(Error::OutOfBounds {
                needed: HEADER_SIZE,
                remaining: buf.remaining(),
            });
        }
        let txid = buf.get_u32_le();
        let mut flags = [0u8; 3];
        buf.copy_to_slice(&mut flags);
        let magic = buf.get_u8();
        let ordinal = buf.get_u64_le();
        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        Ok(Self {
            txid,
            flags,
            magic,
            ordinal,
        })
    }
}
