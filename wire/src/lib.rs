//! Transcode typed messages to and from the channel wire format.
//!
//! # Overview
//!
//! This crate is the transcoding engine of the ferry messaging layer: it
//! turns an in-memory typed value into a scatter-gather byte stream plus an
//! out-of-band handle array ready for a kernel channel write, and validates
//! and reconstructs a typed value from a received byte buffer and handle
//! array. Input is assumed hostile: malformed messages degrade to typed
//! errors, never to memory unsafety, unbounded recursion, or leaked
//! handles.
//!
//! Per-type layout knowledge lives in generated code that implements
//! [`Encode`] and [`Decode`]; the engine owns allocation, bounds and
//! padding checks, nesting-depth accounting, envelope framing for
//! extensible fields, handle movement and validation, and the exactness
//! guarantee that every received byte and handle is consumed exactly once.
//!
//! # Example
//!
//! ```
//! use ferry_wire::{
//!     decode, encode, CodingConfig, Decode, Decoder, Depth, Encode, Encoder, Error, Position,
//! };
//!
//! // The shape of code a schema compiler would emit for a two-field struct.
//! #[derive(Debug, Clone, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! impl Encode for Point {
//!     const INLINE_SIZE: usize = 8;
//!
//!     fn encode<D: Depth>(
//!         &mut self,
//!         encoder: &mut Encoder<'_>,
//!         pos: Position,
//!         depth: D,
//!     ) -> Result<(), Error> {
//!         self.x.encode(encoder, pos, depth)?;
//!         self.y.encode(encoder, pos.offset(4), depth)
//!     }
//! }
//!
//! impl Decode for Point {
//!     const INLINE_SIZE: usize = 8;
//!
//!     fn decode<D: Depth>(
//!         decoder: &mut Decoder<'_>,
//!         pos: Position,
//!         depth: D,
//!     ) -> Result<Self, Error> {
//!         Ok(Self {
//!             x: <i32 as Decode>::decode(decoder, pos, depth)?,
//!             y: <i32 as Decode>::decode(decoder, pos.offset(4), depth)?,
//!         })
//!     }
//! }
//!
//! let mut arena = [0u8; 64];
//! let mut extents = Vec::new();
//! let mut handles = Vec::new();
//! let mut value = Point { x: -3, y: 9 };
//! encode(&CodingConfig::EMPTY, &mut value, &mut arena, &mut extents, &mut handles)?;
//!
//! // The extents, concatenated, are the byte stream a transport would send.
//! let len: usize = extents.iter().map(|e| e.len).sum();
//! let decoded: Point = decode(&CodingConfig::EMPTY, &arena[..len], &mut [])?;
//! assert_eq!(decoded, Point { x: -3, y: 9 });
//! # Ok::<(), ferry_wire::Error>(())
//! ```

pub mod codec;
pub mod config;
pub mod decode;
pub mod depth;
pub mod encode;
pub mod envelope;
pub mod error;
pub mod handle;
pub mod header;
pub mod position;

// Re-export main types and traits
pub use codec::{Decode, Encode, Primitive, ABSENT, HANDLE_ABSENT, HANDLE_PRESENT, PRESENT};
pub use config::{CodingConfig, HandleConstraint};
pub use decode::{decode, decode_unchecked, decode_with, Decoder};
pub use depth::{Checked, Depth, Unchecked, MAX_DEPTH};
pub use encode::{encode, encode_unchecked, encode_with, gather, Encoder, Extent};
pub use envelope::{
    decode_envelope, decode_envelope_header, decode_unknown_envelope, encode_envelope, Envelope,
    ENVELOPE_SIZE, INLINE_CAPACITY, INLINE_FLAG,
};
pub use error::Error;
pub use handle::{
    Handle, HandleDisposition, HandleInfo, HandleKind, Rights, MAX_MESSAGE_HANDLES,
};
pub use header::{MessageHeader, HEADER_SIZE, MAGIC};
pub use position::{align_up, Position, ALIGNMENT};
