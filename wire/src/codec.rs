//! The transcode callback contract and wire building blocks for leaf types.
//!
//! Generated per-type code implements [`Encode`] and [`Decode`]; the engine
//! invokes the root implementation once per message, and implementations
//! call back into the coder (`alloc`, handle consumption, envelopes) for
//! every nested object, charging one level of depth per out-of-line hop.
//!
//! The impls in this module cover the leaf shapes every schema bottoms out
//! in: little-endian scalars, validated booleans, and the presence-marked
//! out-of-line forms (strings, vectors, boxed structs).

use crate::{
    decode::Decoder,
    depth::Depth,
    encode::Encoder,
    position::Position,
    Error,
};

/// Marks an out-of-line object as present.
pub const PRESENT: u64 = u64::MAX;
/// Marks an out-of-line object as absent.
pub const ABSENT: u64 = 0;

/// Marks a handle field as carrying a handle.
pub const HANDLE_PRESENT: u32 = u32::MAX;
/// Marks a handle field as empty.
pub const HANDLE_ABSENT: u32 = 0;

/// A type that can be encoded into a message.
///
/// `encode` must write every byte of
/// `[pos, pos + INLINE_SIZE)` it does not deliberately leave as zero
/// padding, and must charge `depth` one level for every out-of-line object
/// it allocates. Handles are moved out of `self` as they are staged, which
/// is why encoding takes `&mut self`.
pub trait Encode {
    /// Size of the inline portion of the encoded object, in bytes.
    const INLINE_SIZE: usize;

    /// Encodes this value at `pos`, which the caller has allocated with room
    /// for `INLINE_SIZE` bytes.
    fn encode<D: Depth>(
        &mut self,
        encoder: &mut Encoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<(), Error>;
}

/// A type that can be decoded from a message.
///
/// `decode` must validate every byte of `[pos, pos + INLINE_SIZE)` and must
/// charge `depth` one level for every out-of-line object it claims.
pub trait Decode: Sized {
    /// Size of the inline portion of the encoded object, in bytes.
    const INLINE_SIZE: usize;

    /// Decodes a value from `pos`, which the caller has verified holds
    /// `INLINE_SIZE` bytes.
    fn decode<D: Depth>(
        decoder: &mut Decoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<Self, Error>;
}

/// A fixed-size scalar with a little-endian wire representation.
pub trait Primitive: Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Writes the value to the front of `buf`.
    fn put(self, buf: &mut [u8]);

    /// Reads a value from the front of `buf`.
    fn get(buf: &[u8]) -> Self;
}

// Implements `Primitive`, `Encode`, and `Decode` for a scalar type. Every
// bit pattern of these types is valid, so decoding needs no validation.
macro_rules! impl_primitive {
    ($type:ty) => {
        impl Primitive for $type {
            const SIZE: usize = std::mem::size_of::<$type>();

            #[inline]
            fn put(self, buf: &mut [u8]) {
                buf[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn get(buf: &[u8]) -> Self {
                Self::from_le_bytes(buf[..Self::SIZE].try_into().unwrap())
            }
        }

        impl Encode for $type {
            const INLINE_SIZE: usize = std::mem::size_of::<$type>();

            #[inline]
            fn encode<D: Depth>(
                &mut self,
                encoder: &mut Encoder<'_>,
                pos: Position,
                _depth: D,
            ) -> Result<(), Error> {
                encoder.put(pos, *self);
                Ok(())
            }
        }

        impl Decode for $type {
            const INLINE_SIZE: usize = std::mem::size_of::<$type>();

            #[inline]
            fn decode<D: Depth>(
                decoder: &mut Decoder<'_>,
                pos: Position,
                _depth: D,
            ) -> Result<Self, Error> {
                Ok(decoder.get(pos))
            }
        }
    };
}
impl_primitive!(u8);
impl_primitive!(u16);
impl_primitive!(u32);
impl_primitive!(u64);
impl_primitive!(i8);
impl_primitive!(i16);
impl_primitive!(i32);
impl_primitive!(i64);
impl_primitive!(f32);
impl_primitive!(f64);

impl Encode for bool {
    const INLINE_SIZE: usize = 1;

    #[inline]
    fn encode<D: Depth>(
        &mut self,
        encoder: &mut Encoder<'_>,
        pos: Position,
        _depth: D,
    ) -> Result<(), Error> {
        encoder.put(pos, *self as u8);
        Ok(())
    }
}

impl Decode for bool {
    const INLINE_SIZE: usize = 1;

    #[inline]
    fn decode<D: Depth>(
        decoder: &mut Decoder<'_>,
        pos: Position,
        _depth: D,
    ) -> Result<Self, Error> {
        match decoder.get::<u8>(pos) {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidBool(other)),
        }
    }
}

/// Reads and validates the count/presence header of an out-of-line
/// collection, returning the element count.
fn decode_collection_header(
    decoder: &mut Decoder<'_>,
    pos: Position,
) -> Result<usize, Error> {
    let count = decoder.get::<u64>(pos);
    match decoder.get::<u64>(pos.offset(8)) {
        PRESENT => {}
        ABSENT => return Err(Error::RequiredFieldAbsent),
        other => return Err(Error::InvalidPresence(other)),
    }
    usize::try_from(count).map_err(|_| Error::OutOfBounds {
        needed: usize::MAX,
        remaining: decoder.remaining(),
    })
}

impl Encode for String {
    const INLINE_SIZE: usize = 16;

    fn encode<D: Depth>(
        &mut self,
        encoder: &mut Encoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<(), Error> {
        encoder.put(pos, self.len() as u64);
        encoder.put(pos.offset(8), PRESENT);
        depth.increment()?;
        let body = encoder.alloc(self.len())?;
        encoder.write_slice(body, self.as_bytes());
        Ok(())
    }
}

impl Decode for String {
    const INLINE_SIZE: usize = 16;

    fn decode<D: Depth>(
        decoder: &mut Decoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<Self, Error> {
        let len = decode_collection_header(decoder, pos)?;
        depth.increment()?;
        let body = decoder.alloc(len)?;
        let bytes = decoder.bytes(body, len);
        Ok(std::str::from_utf8(bytes)
            .map_err(|_| Error::InvalidUtf8)?
            .to_owned())
    }
}

impl<T: Encode> Encode for Vec<T> {
    const INLINE_SIZE: usize = 16;

    fn encode<D: Depth>(
        &mut self,
        encoder: &mut Encoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<(), Error> {
        debug_assert!(T::INLINE_SIZE > 0);
        encoder.put(pos, self.len() as u64);
        encoder.put(pos.offset(8), PRESENT);
        let depth = depth.increment()?;
        let body = encoder.alloc_array(self.len(), T::INLINE_SIZE)?;
        for (i, item) in self.iter_mut().enumerate() {
            item.encode(encoder, body.offset(i * T::INLINE_SIZE), depth)?;
        }
        Ok(())
    }
}

impl<T: Decode> Decode for Vec<T> {
    const INLINE_SIZE: usize = 16;

    fn decode<D: Depth>(
        decoder: &mut Decoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<Self, Error> {
        debug_assert!(T::INLINE_SIZE > 0);
        let count = decode_collection_header(decoder, pos)?;
        let depth = depth.increment()?;
        let body = decoder.alloc_array(count, T::INLINE_SIZE)?;
        // The bounds check above caps `count` at the buffer length, so this
        // reservation cannot be driven past the message size.
        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            items.push(T::decode(decoder, body.offset(i * T::INLINE_SIZE), depth)?);
        }
        Ok(items)
    }
}

impl<T: Encode> Encode for Option<Box<T>> {
    const INLINE_SIZE: usize = 8;

    fn encode<D: Depth>(
        &mut self,
        encoder: &mut Encoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<(), Error> {
        let Some(inner) = self else {
            encoder.put(pos, ABSENT);
            return Ok(());
        };
        encoder.put(pos, PRESENT);
        let depth = depth.increment()?;
        let body = encoder.alloc(T::INLINE_SIZE)?;
        inner.encode(encoder, body, depth)
    }
}

impl<T: Decode> Decode for Option<Box<T>> {
    const INLINE_SIZE: usize = 8;

    fn decode<D: Depth>(
        decoder: &mut Decoder<'_>,
        pos: Position,
        depth: D,
    ) -> Result<Self, Error> {
        match decoder.get::<u64>(pos) {
            ABSENT => Ok(None),
            PRESENT => {
                let depth = depth.increment()?;
                let body = decoder.alloc(T::INLINE_SIZE)?;
                Ok(Some(Box::new(T::decode(decoder, body, depth)?)))
            }
            other => Err(Error::InvalidPresence(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, encode, CodingConfig, Extent};

    fn roundtrip<T: Encode + Decode + Clone + PartialEq + std::fmt::Debug>(value: T) {
        let mut arena = vec![0u8; 4096];
        let mut extents = Vec::new();
        let mut handles = Vec::new();
        let mut input = value.clone();
        encode(
            &CodingConfig::EMPTY,
            &mut input,
            &mut arena,
            &mut extents,
            &mut handles,
        )
        .unwrap();

        let total: usize = extents.iter().map(|e| e.len).sum();
        let decoded = decode::<T>(&CodingConfig::EMPTY, &arena[..total], &mut []).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn test_scalars() {
        roundtrip(0u8);
        roundtrip(0xA5u8);
        roundtrip(u16::MAX);
        roundtrip(0xDEAD_BEEFu32);
        roundtrip(u64::MAX);
        roundtrip(-1i8);
        roundtrip(i16::MIN);
        roundtrip(-42i32);
        roundtrip(i64::MIN);
        roundtrip(1.5f32);
        roundtrip(-2.25f64);
    }

    #[test]
    fn test_scalar_layout() {
        let mut arena = vec![0u8; 8];
        let mut extents = Vec::new();
        let mut handles = Vec::new();
        encode(
            &CodingConfig::EMPTY,
            &mut 0x0102_0304u32,
            &mut arena,
            &mut extents,
            &mut handles,
        )
        .unwrap();
        assert_eq!(extents, vec![Extent { offset: 0, len: 8 }]);
        assert_eq!(&arena[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&arena[4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_bool() {
        roundtrip(true);
        roundtrip(false);

        let mut buf = [0u8; 8];
        buf[0] = 2;
        assert!(matches!(
            decode::<bool>(&CodingConfig::EMPTY, &buf, &mut []),
            Err(Error::InvalidBool(2))
        ));
    }

    #[test]
    fn test_string() {
        roundtrip(String::new());
        roundtrip("hi".to_owned());
        roundtrip("a string long enough to span padding".to_owned());
    }

    #[test]
    fn test_string_invalid_utf8() {
        // Header claims 2 bytes, body holds an invalid sequence.
        let mut buf = Vec::new();
        buf.extend_from_slice(&2u64.to_le_bytes());
        buf.extend_from_slice(&PRESENT.to_le_bytes());
        buf.extend_from_slice(&[0xFF, 0xFE, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(
            decode::<String>(&CodingConfig::EMPTY, &buf, &mut []),
            Err(Error::InvalidUtf8)
        ));
    }

    #[test]
    fn test_string_absent_required() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&ABSENT.to_le_bytes());
        assert!(matches!(
            decode::<String>(&CodingConfig::EMPTY, &buf, &mut []),
            Err(Error::RequiredFieldAbsent)
        ));
    }

    #[test]
    fn test_invalid_presence_marker() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&3u64.to_le_bytes());
        assert!(matches!(
            decode::<String>(&CodingConfig::EMPTY, &buf, &mut []),
            Err(Error::InvalidPresence(3))
        ));
    }

    #[test]
    fn test_vectors() {
        roundtrip::<Vec<u8>>(vec![]);
        roundtrip(vec![1u8, 2, 3]);
        roundtrip(vec![0x1111u16, 0x2222, 0x3333]);
        roundtrip(vec![vec![1u8], vec![], vec![2, 3]]);
        roundtrip(vec!["one".to_owned(), String::new(), "three".to_owned()]);
    }

    #[test]
    fn test_vector_count_lie() {
        // Header claims more elements than the message has bytes for.
        let mut buf = Vec::new();
        buf.extend_from_slice(&1_000_000u64.to_le_bytes());
        buf.extend_from_slice(&PRESENT.to_le_bytes());
        assert!(matches!(
            decode::<Vec<u64>>(&CodingConfig::EMPTY, &buf, &mut []),
            Err(Error::OutOfBounds { .. })
        ));

        // A count chosen to overflow count * stride must also fail cleanly.
        let mut buf = Vec::new();
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        buf.extend_from_slice(&PRESENT.to_le_bytes());
        assert!(matches!(
            decode::<Vec<u64>>(&CodingConfig::EMPTY, &buf, &mut []),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_boxed() {
        roundtrip::<Option<Box<u32>>>(None);
        roundtrip::<Option<Box<u32>>>(Some(Box::new(77)));
        roundtrip::<Option<Box<Vec<u8>>>>(Some(Box::new(vec![9, 8, 7])));
    }
}
