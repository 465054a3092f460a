//! The envelope codec.
//!
//! Every extensible field (a table field, a union payload) is wrapped in
//! an 8-byte envelope recording how many bytes and handles its payload
//! occupies and whether the payload is inlined in the envelope itself or
//! laid out-of-line after it. The counts let a receiver that does not
//! recognize the field skip its bytes and close its handles without
//! interpreting either, which is what keeps old readers compatible with new
//! writers.
//!
//! Wire layout: `num_bytes: u32 LE`, `num_handles: u16 LE`, `flags: u16 LE`.
//! `flags` is `0` (out-of-line) or [`INLINE_FLAG`] (payload in the first 4
//! bytes of the envelope); anything else is rejected. An all-zero envelope
//! marks an absent field.

use crate::{
    codec::{Decode, Encode},
    decode::Decoder,
    depth::Depth,
    encode::Encoder,
    position::{Position, ALIGNMENT},
    Error,
};

/// Size of an envelope header on the wire, in bytes.
pub const ENVELOPE_SIZE: usize = 8;

/// The `flags` value marking an inlined payload.
pub const INLINE_FLAG: u16 = 1;

/// Payloads up to this many bytes are inlined into the envelope.
pub const INLINE_CAPACITY: usize = 4;

/// A validated envelope header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Bytes occupied by the payload. Forced to [`INLINE_CAPACITY`] for
    /// inlined payloads.
    pub num_bytes: u32,
    /// Handles carried by the payload.
    pub num_handles: u16,
    /// Whether the payload lives in the envelope's own trailing bytes.
    pub inlined: bool,
}

/// Encodes one envelope at `pos`, inlining the payload when it fits.
///
/// `None` writes the absent envelope. For present payloads the byte and
/// handle counts are measured while the payload encodes and patched into
/// the header afterwards.
pub fn encode_envelope<T: Encode, D: Depth>(
    value: Option<&mut T>,
    encoder: &mut Encoder<'_>,
    pos: Position,
    depth: D,
) -> Result<(), Error> {
    let Some(value) = value else {
        encoder.put(pos, 0u64);
        return Ok(());
    };

    let depth = depth.increment()?;
    let handles_before = encoder.handles_staged();
    if T::INLINE_SIZE <= INLINE_CAPACITY {
        // Zeroes the payload area and sets the inline flag in one write.
        encoder.put(pos, (INLINE_FLAG as u64) << 48);
        value.encode(encoder, pos, depth)?;
    } else {
        let bytes_before = encoder.allocated();
        let body = encoder.alloc(T::INLINE_SIZE)?;
        value.encode(encoder, body, depth)?;
        let num_bytes = u32::try_from(encoder.allocated() - bytes_before)
            .map_err(|_| Error::InvalidEnvelopeByteCount(u32::MAX))?;
        encoder.put(pos, num_bytes);
    }
    let num_handles = u16::try_from(encoder.handles_staged() - handles_before)
        .map_err(|_| Error::InvalidEnvelopeHandleCount(u16::MAX))?;
    encoder.put(pos.offset(4), num_handles);
    Ok(())
}

/// Reads and validates the envelope header at `pos`.
///
/// Returns `None` for an absent envelope. Out-of-line byte counts must be
/// multiples of the wire alignment; `flags` must be `0` or [`INLINE_FLAG`].
pub fn decode_envelope_header(
    decoder: &Decoder<'_>,
    pos: Position,
) -> Result<Option<Envelope>, Error> {
    let mut num_bytes = decoder.get::<u32>(pos);
    let num_handles = decoder.get::<u16>(pos.offset(4));
    let inlined = match decoder.get::<u16>(pos.offset(6)) {
        0 => false,
        INLINE_FLAG => true,
        other => return Err(Error::InvalidInlineBit(other)),
    };
    if inlined {
        num_bytes = INLINE_CAPACITY as u32;
    }
    if num_bytes == 0 && num_handles == 0 {
        return Ok(None);
    }
    if !inlined && num_bytes % ALIGNMENT as u32 != 0 {
        return Err(Error::InvalidEnvelopeByteCount(num_bytes));
    }
    Ok(Some(Envelope {
        num_bytes,
        num_handles,
        inlined,
    }))
}

/// Decodes the envelope at `pos` into a `T` the receiver's schema knows.
///
/// Returns `None` for an absent envelope. The payload must occupy exactly
/// the bytes and handles the header declared, and its placement (inline or
/// out-of-line) must match what `T`'s size dictates.
pub fn decode_envelope<T: Decode, D: Depth>(
    decoder: &mut Decoder<'_>,
    pos: Position,
    depth: D,
) -> Result<Option<T>, Error> {
    let Some(envelope) = decode_envelope_header(decoder, pos)? else {
        return Ok(None);
    };
    if envelope.inlined != (T::INLINE_SIZE <= INLINE_CAPACITY) {
        return Err(Error::InvalidInlineBit(envelope.inlined as u16));
    }

    let depth = depth.increment()?;
    let handles_before = decoder.handles_taken();
    let value = if envelope.inlined {
        decoder.check_padding(
            pos.offset(T::INLINE_SIZE),
            INLINE_CAPACITY - T::INLINE_SIZE,
        )?;
        T::decode(decoder, pos, depth)?
    } else {
        let bytes_before = decoder.consumed();
        let body = decoder.alloc(T::INLINE_SIZE)?;
        let value = T::decode(decoder, body, depth)?;
        let consumed = decoder.consumed() - bytes_before;
        if consumed != envelope.num_bytes as usize {
            return Err(Error::InvalidEnvelopeByteCount(envelope.num_bytes));
        }
        value
    };
    let taken = decoder.handles_taken() - handles_before;
    if taken != envelope.num_handles as usize {
        return Err(Error::InvalidEnvelopeHandleCount(envelope.num_handles));
    }
    Ok(Some(value))
}

/// Skips the envelope at `pos` without interpreting its payload.
///
/// The payload bytes are stepped over and exactly `num_handles` handles are
/// closed, so an unknown field can neither desynchronize the walk nor leak
/// the handles it carried.
pub fn decode_unknown_envelope<D: Depth>(
    decoder: &mut Decoder<'_>,
    pos: Position,
    depth: D,
) -> Result<(), Error> {
    let Some(envelope) = decode_envelope_header(decoder, pos)? else {
        return Ok(());
    };
    if !envelope.inlined {
        depth.increment()?;
        decoder.alloc(envelope.num_bytes as usize)?;
    }
    decoder.close_next_handles(envelope.num_handles as usize)
}
