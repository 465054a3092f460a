//! Message decoding.
//!
//! A [`Decoder`] walks a complete received byte buffer with a bounds-checked
//! allocation cursor and consumes received handles in order, validating each
//! against the message's [`CodingConfig`]. Decoding is exact: a message that
//! leaves bytes or handles unconsumed is rejected. Whatever handles the walk
//! does not move into the decoded value (because a field failed, an unknown
//! field was skipped, or the message over-supplied them) are closed before
//! the call returns, so an error can never leak a kernel resource.

use crate::{
    codec::{Decode, HANDLE_ABSENT, HANDLE_PRESENT},
    config::CodingConfig,
    depth::{Checked, Depth, Unchecked},
    handle::{Handle, HandleInfo},
    position::{align_up, Position},
    Error, Primitive,
};

/// Decoding state for one message.
///
/// Bound to the received buffers for the duration of a single
/// [`decode_with`] call; nothing here escapes the call.
#[derive(Debug)]
pub struct Decoder<'a> {
    /// Static metadata for the message type being decoded.
    config: &'a CodingConfig,

    /// The complete received byte stream.
    buf: &'a [u8],

    /// Bytes consumed so far; the next out-of-line object begins here.
    consumed: usize,

    /// Received handles in arrival order. Slots are taken as the walk
    /// consumes them.
    handles: &'a mut [Option<HandleInfo>],

    /// Index of the next handle to consume.
    next_handle: usize,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(
        config: &'a CodingConfig,
        buf: &'a [u8],
        handles: &'a mut [Option<HandleInfo>],
    ) -> Self {
        Self {
            config,
            buf,
            consumed: 0,
            handles,
            next_handle: 0,
        }
    }

    /// The message type's coding metadata.
    pub fn config(&self) -> &CodingConfig {
        self.config
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.consumed
    }

    /// Number of handles consumed so far.
    pub fn handles_taken(&self) -> usize {
        self.next_handle
    }

    /// Advances the cursor past `size` bytes rounded up to the wire
    /// alignment, returning the position of the claimed extent.
    ///
    /// Fails if the extent would run past the end of the received buffer;
    /// the arithmetic is checked, so a hostile size cannot wrap the cursor.
    /// The padding bytes introduced by rounding must be zero on the wire.
    pub fn alloc(&mut self, size: usize) -> Result<Position, Error> {
        let remaining = self.remaining();
        let padded = align_up(size).ok_or(Error::OutOfBounds {
            needed: size,
            remaining,
        })?;
        if padded > remaining {
            return Err(Error::OutOfBounds {
                needed: padded,
                remaining,
            });
        }
        let offset = self.consumed;
        self.consumed += padded;
        if self.buf[offset + size..self.consumed].iter().any(|b| *b != 0) {
            return Err(Error::NonZeroPadding(offset + size));
        }
        Ok(Position(offset))
    }

    /// Claims an array of `count` elements of `stride` bytes each.
    pub fn alloc_array(&mut self, count: usize, stride: usize) -> Result<Position, Error> {
        let total = count.checked_mul(stride).ok_or(Error::OutOfBounds {
            needed: usize::MAX,
            remaining: self.remaining(),
        })?;
        self.alloc(total)
    }

    /// Reads a scalar at `pos`.
    ///
    /// Panics if `pos` is outside the extent it was allocated for.
    #[inline]
    pub fn get<T: Primitive>(&self, pos: Position) -> T {
        T::get(&self.buf[pos.0..pos.0 + T::SIZE])
    }

    /// Reads `len` raw bytes at `pos`. The returned slice borrows the input
    /// buffer, not the decoder, so it stays usable while decoding continues.
    ///
    /// Panics if `pos` is outside the extent it was allocated for.
    pub fn bytes(&self, pos: Position, len: usize) -> &'a [u8] {
        let buf: &'a [u8] = self.buf;
        &buf[pos.0..pos.0 + len]
    }

    /// Checks that `len` bytes at `pos` are zero.
    pub fn check_padding(&self, pos: Position, len: usize) -> Result<(), Error> {
        if self.buf[pos.0..pos.0 + len].iter().any(|b| *b != 0) {
            return Err(Error::NonZeroPadding(pos.0));
        }
        Ok(())
    }

    /// Consumes the handle for a required handle field at `pos`.
    ///
    /// Reads the presence marker, takes the next handle from the stream, and
    /// validates its arrived metadata against the config's constraint for
    /// this position. A handle that fails validation is closed immediately.
    pub fn take_handle(&mut self, pos: Position) -> Result<Handle, Error> {
        match self.get::<u32>(pos) {
            HANDLE_PRESENT => self.next_present_handle(),
            HANDLE_ABSENT => Err(Error::RequiredFieldAbsent),
            other => Err(Error::InvalidPresence(other as u64)),
        }
    }

    /// Consumes the handle for an optional handle field at `pos`.
    pub fn take_optional_handle(&mut self, pos: Position) -> Result<Option<Handle>, Error> {
        match self.get::<u32>(pos) {
            HANDLE_PRESENT => self.next_present_handle().map(Some),
            HANDLE_ABSENT => Ok(None),
            other => Err(Error::InvalidPresence(other as u64)),
        }
    }

    fn next_present_handle(&mut self) -> Result<Handle, Error> {
        let index = self.next_handle;
        let info = self
            .handles
            .get_mut(index)
            .and_then(Option::take)
            .ok_or(Error::EndOfHandles)?;
        self.next_handle = index + 1;
        let constraint = self.config.constraint(index);
        info.check(constraint.kind, constraint.rights)?;
        Ok(info.handle)
    }

    /// Closes the next `count` handles in the stream without validating
    /// them. Used when skipping unknown fields that carry handles.
    pub fn close_next_handles(&mut self, count: usize) -> Result<(), Error> {
        for _ in 0..count {
            self.handles
                .get_mut(self.next_handle)
                .and_then(Option::take)
                .ok_or(Error::EndOfHandles)?;
            self.next_handle += 1;
        }
        Ok(())
    }

    /// Closes every handle the walk has not consumed.
    fn close_remaining(&mut self) {
        for slot in self.handles[self.next_handle..].iter_mut() {
            slot.take();
        }
        self.next_handle = self.handles.len();
    }

    /// Applies the exactness checks and the error-path handle drain.
    fn finish<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                self.close_remaining();
                return Err(e);
            }
        };
        let leftover = self.remaining();
        if leftover > 0 {
            self.close_remaining();
            return Err(Error::ExtraBytes(leftover));
        }
        let unused = self.handles[self.next_handle..]
            .iter()
            .filter(|slot| slot.is_some())
            .count();
        if unused > 0 {
            self.close_remaining();
            return Err(Error::ExtraHandles(unused));
        }
        Ok(value)
    }
}

/// Decodes a `T` from a received byte buffer and handle array, with the
/// depth accounting chosen by `D`.
///
/// Every byte and every handle of the input must be consumed exactly once;
/// trailing bytes or unconsumed handles are errors. By the time this
/// returns, every handle slot has been emptied: moved into the returned
/// value on success, closed otherwise. (A value discarded because the
/// exactness checks failed closes its own handles when it drops.)
pub fn decode_with<T: Decode, D: Depth>(
    config: &CodingConfig,
    bytes: &[u8],
    handles: &mut [Option<HandleInfo>],
) -> Result<T, Error> {
    let mut decoder = Decoder::new(config, bytes, handles);
    let result = decoder
        .alloc(T::INLINE_SIZE)
        .and_then(|root| T::decode(&mut decoder, root, D::initial()));
    decoder.finish(result)
}

/// [`decode_with`] with depth checking, the right default for anything
/// received from a peer.
pub fn decode<T: Decode>(
    config: &CodingConfig,
    bytes: &[u8],
    handles: &mut [Option<HandleInfo>],
) -> Result<T, Error> {
    decode_with::<T, Checked>(config, bytes, handles)
}

/// [`decode_with`] without depth accounting, for message types whose schema
/// proves a bounded shape.
pub fn decode_unchecked<T: Decode>(
    config: &CodingConfig,
    bytes: &[u8],
    handles: &mut [Option<HandleInfo>],
) -> Result<T, Error> {
    decode_with::<T, Unchecked>(config, bytes, handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{HandleKind, Rights};
    use std::os::fd::OwnedFd;
    use std::os::unix::net::UnixStream;

    fn no_handles() -> [Option<HandleInfo>; 0] {
        []
    }

    fn received_handle() -> (HandleInfo, UnixStream) {
        let (a, b) = UnixStream::pair().unwrap();
        (
            HandleInfo {
                handle: Handle::from(OwnedFd::from(a)),
                kind: HandleKind::ANY,
                rights: Rights::SAME,
            },
            b,
        )
    }

    fn peer_closed(peer: &mut UnixStream) -> bool {
        use std::io::Read;
        peer.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 1];
        matches!(peer.read(&mut buf), Ok(0))
    }

    #[test]
    fn test_alloc_bounds() {
        let buf = [0u8; 16];
        let mut handles = no_handles();
        let mut dec = Decoder::new(&CodingConfig::EMPTY, &buf, &mut handles);

        let a = dec.alloc(5).unwrap();
        assert_eq!(a.get(), 0);
        assert_eq!(dec.consumed(), 8);
        assert!(matches!(
            dec.alloc(9),
            Err(Error::OutOfBounds {
                needed: 16,
                remaining: 8
            })
        ));

        // Hostile sizes near usize::MAX must not wrap the cursor.
        assert!(matches!(dec.alloc(usize::MAX), Err(Error::OutOfBounds { .. })));
        assert!(matches!(
            dec.alloc_array(usize::MAX / 4, 8),
            Err(Error::OutOfBounds { .. })
        ));
        assert_eq!(dec.consumed(), 8);
    }

    #[test]
    fn test_alloc_padding_validated() {
        let mut buf = [0u8; 8];
        buf[5] = 1; // inside the padding of a 5-byte alloc
        let mut handles = no_handles();
        let mut dec = Decoder::new(&CodingConfig::EMPTY, &buf, &mut handles);
        assert!(matches!(dec.alloc(5), Err(Error::NonZeroPadding(5))));
    }

    #[test]
    fn test_exactness_extra_bytes() {
        let buf = [0u8; 24];
        let mut handles = no_handles();
        let err = decode::<u64>(&CodingConfig::EMPTY, &buf, &mut handles).unwrap_err();
        assert!(matches!(err, Error::ExtraBytes(16)));
    }

    #[test]
    fn test_exactness_extra_handles_closed() {
        let buf = 7u64.to_le_bytes();
        let (info, mut peer) = received_handle();
        let mut handles = [Some(info)];
        let err = decode::<u64>(&CodingConfig::EMPTY, &buf, &mut handles).unwrap_err();
        assert!(matches!(err, Error::ExtraHandles(1)));
        assert!(handles[0].is_none());
        assert!(peer_closed(&mut peer));
    }

    #[test]
    fn test_error_drains_handles() {
        // Root alloc fails (buffer shorter than the inline size); the
        // received handle must still be closed by the time decode returns.
        let buf = [0u8; 4];
        let (info, mut peer) = received_handle();
        let mut handles = [Some(info)];
        let err = decode::<u64>(&CodingConfig::EMPTY, &buf, &mut handles).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));
        assert!(handles[0].is_none());
        assert!(peer_closed(&mut peer));
    }

    #[test]
    fn test_close_next_handles_exhaustion() {
        let buf = [0u8; 8];
        let (info, mut peer) = received_handle();
        let mut handles = [Some(info)];
        let mut dec = Decoder::new(&CodingConfig::EMPTY, &buf, &mut handles);
        assert!(matches!(
            dec.close_next_handles(2),
            Err(Error::EndOfHandles)
        ));
        // The first of the two was closed before the stream ran out.
        assert!(peer_closed(&mut peer));
    }

    #[test]
    fn test_take_handle_markers() {
        let mut buf = [0u8; 8];
        buf[..4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        buf[4..].copy_from_slice(&2u32.to_le_bytes());

        let (info, _peer) = received_handle();
        let mut handles = [Some(info)];
        let mut dec = Decoder::new(&CodingConfig::EMPTY, &buf, &mut handles);
        let pos = dec.alloc(8).unwrap();

        let h = dec.take_handle(pos).unwrap();
        assert_eq!(dec.handles_taken(), 1);
        drop(h);

        assert!(matches!(
            dec.take_optional_handle(pos.offset(4)),
            Err(Error::InvalidPresence(2))
        ));
    }

    #[test]
    fn test_take_handle_absent() {
        let buf = [0u8; 8];
        let mut handles = no_handles();
        let mut dec = Decoder::new(&CodingConfig::EMPTY, &buf, &mut handles);
        let pos = dec.alloc(8).unwrap();
        assert!(matches!(
            dec.take_handle(pos),
            Err(Error::RequiredFieldAbsent)
        ));
        assert!(dec.take_optional_handle(pos.offset(4)).unwrap().is_none());
    }

    #[test]
    fn test_constraint_violation_closes_handle() {
        static CONFIG: CodingConfig = CodingConfig {
            handles: &[crate::config::HandleConstraint {
                kind: HandleKind(9),
                rights: Rights::SAME,
            }],
        };

        let mut buf = [0u8; 8];
        buf[..4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());

        let (a, mut peer) = UnixStream::pair().unwrap();
        let mut handles = [Some(HandleInfo {
            handle: Handle::from(OwnedFd::from(a)),
            kind: HandleKind(8),
            rights: Rights::SAME,
        })];
        let mut dec = Decoder::new(&CONFIG, &buf, &mut handles);
        let pos = dec.alloc(8).unwrap();
        assert!(matches!(
            dec.take_handle(pos),
            Err(Error::WrongHandleKind {
                expected: 9,
                received: 8
            })
        ));
        assert!(peer_closed(&mut peer));
    }
}
