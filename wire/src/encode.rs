//! Message encoding.
//!
//! An [`Encoder`] bump-allocates 8-byte-aligned extents out of a
//! caller-supplied arena and records them in a scatter-gather extent list;
//! the concatenation of the extents, in order, is the logical byte stream a
//! transport puts on the channel (e.g. with a vectored write). Handles are
//! moved out of the value being encoded into a parallel output array, paired
//! with disposition metadata taken from the message's [`CodingConfig`].

use crate::{
    codec::{Encode, HANDLE_ABSENT, HANDLE_PRESENT},
    config::CodingConfig,
    depth::{Checked, Depth, Unchecked},
    handle::{Handle, HandleDisposition, MAX_MESSAGE_HANDLES},
    position::{align_up, Position},
    Error, Primitive,
};

/// One extent of the scatter-gather output: `len` bytes of the arena
/// starting at `offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub offset: usize,
    pub len: usize,
}

/// Yields the byte slices named by `extents`, in stream order.
pub fn gather<'a>(arena: &'a [u8], extents: &'a [Extent]) -> impl Iterator<Item = &'a [u8]> {
    extents.iter().map(|e| &arena[e.offset..e.offset + e.len])
}

/// Encoding state for one message.
///
/// Bound to caller-supplied buffers for the duration of a single
/// [`encode_with`] call; nothing here escapes the call.
#[derive(Debug)]
pub struct Encoder<'a> {
    /// Static metadata for the message type being encoded.
    config: &'a CodingConfig,

    /// Backing buffer the byte stream is written into. The caller sizes it
    /// for the message being encoded.
    arena: &'a mut [u8],

    /// Bytes of the arena handed out so far.
    used: usize,

    /// Extents allocated so far, in stream order.
    extents: &'a mut Vec<Extent>,

    /// Handles moved out of the value so far, with their dispositions.
    handles: &'a mut Vec<HandleDisposition>,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(
        config: &'a CodingConfig,
        arena: &'a mut [u8],
        extents: &'a mut Vec<Extent>,
        handles: &'a mut Vec<HandleDisposition>,
    ) -> Self {
        Self {
            config,
            arena,
            used: 0,
            extents,
            handles,
        }
    }

    /// The message type's coding metadata.
    pub fn config(&self) -> &CodingConfig {
        self.config
    }

    /// Total bytes allocated so far.
    pub fn allocated(&self) -> usize {
        self.used
    }

    /// Arena bytes still available.
    pub fn remaining(&self) -> usize {
        self.arena.len() - self.used
    }

    /// Number of handles staged so far.
    pub fn handles_staged(&self) -> usize {
        self.handles.len()
    }

    /// Reserves `size` bytes rounded up to the wire alignment, returning the
    /// position of the new extent.
    ///
    /// The extent is zeroed, so padding the per-type callback does not write
    /// is deterministically zero on the wire.
    pub fn alloc(&mut self, size: usize) -> Result<Position, Error> {
        let remaining = self.remaining();
        let padded = align_up(size).ok_or(Error::OutOfCapacity {
            needed: size,
            remaining,
        })?;
        if padded > remaining {
            return Err(Error::OutOfCapacity {
                needed: padded,
                remaining,
            });
        }
        let offset = self.used;
        self.used += padded;
        if padded > 0 {
            self.arena[offset..self.used].fill(0);
            self.extents.push(Extent {
                offset,
                len: padded,
            });
        }
        Ok(Position(offset))
    }

    /// Reserves an array of `count` elements of `stride` bytes each.
    pub fn alloc_array(&mut self, count: usize, stride: usize) -> Result<Position, Error> {
        let total = count.checked_mul(stride).ok_or(Error::OutOfCapacity {
            needed: usize::MAX,
            remaining: self.remaining(),
        })?;
        self.alloc(total)
    }

    /// Writes a scalar at `pos`.
    ///
    /// Panics if `pos` is outside the extent it was allocated for.
    #[inline]
    pub fn put<T: Primitive>(&mut self, pos: Position, value: T) {
        value.put(&mut self.arena[pos.0..pos.0 + T::SIZE]);
    }

    /// Writes raw bytes at `pos`.
    ///
    /// Panics if `pos` is outside the extent it was allocated for.
    pub fn write_slice(&mut self, pos: Position, bytes: &[u8]) {
        self.arena[pos.0..pos.0 + bytes.len()].copy_from_slice(bytes);
    }

    /// Writes the presence marker at `pos` and stages `handle` for sending,
    /// with disposition metadata from the message's config.
    ///
    /// The handle is moved into the output array; it stays owned by the
    /// caller's buffers (never closed by the engine) whether or not the
    /// overall encode succeeds.
    pub fn push_handle(&mut self, pos: Position, handle: Handle) -> Result<(), Error> {
        if self.handles.len() == MAX_MESSAGE_HANDLES {
            return Err(Error::TooManyHandles(self.handles.len() + 1));
        }
        self.put(pos, HANDLE_PRESENT);
        let constraint = self.config.constraint(self.handles.len());
        self.handles.push(HandleDisposition {
            handle,
            kind: constraint.kind,
            rights: constraint.rights,
        });
        Ok(())
    }

    /// Writes the absence marker for an optional handle field at `pos`.
    pub fn push_absent_handle(&mut self, pos: Position) {
        self.put(pos, HANDLE_ABSENT);
    }
}

/// Encodes `value` into `arena`, producing extents and handles in the
/// caller's output buffers, with the depth accounting chosen by `D`.
///
/// The output buffers are cleared before any work. On success `extents`
/// names the byte stream and `handles` holds the moved handles with their
/// dispositions. On failure whatever was staged remains in the output
/// buffers for the caller to discard; the engine does not close handles on
/// the encode path, so a failed encode can be retried by rebuilding the
/// value from the staged handles if the caller wishes.
pub fn encode_with<T: Encode, D: Depth>(
    config: &CodingConfig,
    value: &mut T,
    arena: &mut [u8],
    extents: &mut Vec<Extent>,
    handles: &mut Vec<HandleDisposition>,
) -> Result<(), Error> {
    extents.clear();
    handles.clear();
    let mut encoder = Encoder::new(config, arena, extents, handles);
    let root = encoder.alloc(T::INLINE_SIZE)?;
    value.encode(&mut encoder, root, D::initial())
}

/// [`encode_with`] with depth checking, the right default for any message
/// shape that can nest.
pub fn encode<T: Encode>(
    config: &CodingConfig,
    value: &mut T,
    arena: &mut [u8],
    extents: &mut Vec<Extent>,
    handles: &mut Vec<HandleDisposition>,
) -> Result<(), Error> {
    encode_with::<T, Checked>(config, value, arena, extents, handles)
}

/// [`encode_with`] without depth accounting, for message types whose schema
/// proves a bounded shape.
pub fn encode_unchecked<T: Encode>(
    config: &CodingConfig,
    value: &mut T,
    arena: &mut [u8],
    extents: &mut Vec<Extent>,
    handles: &mut Vec<HandleDisposition>,
) -> Result<(), Error> {
    encode_with::<T, Unchecked>(config, value, arena, extents, handles)
}
