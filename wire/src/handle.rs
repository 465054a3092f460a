//! Owned handles and the metadata that rides beside them on the wire.
//!
//! Handles are kernel resources (file descriptors) passed out-of-band with a
//! message. They are scarce and leak-prone, so the engine only ever moves
//! them: [`Handle`] is a move-only newtype over an owned descriptor, and
//! dropping one closes it. Alongside every handle travels a pair of metadata
//! words, the kind of object the sender claims to be transferring and the
//! rights it intends to grant, which the receiver validates against its own
//! expectations before the handle is released into a decoded value.

use crate::Error;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

/// The maximum number of handles a single message may carry.
pub const MAX_MESSAGE_HANDLES: usize = 64;

/// An owned kernel handle.
///
/// Move-only; the descriptor is closed when the handle is dropped. The
/// engine never duplicates a handle: encoding moves handles out of the
/// value into the output array, and decoding moves them from the input array
/// into the value (or closes them, if the walk fails first).
#[derive(Debug)]
pub struct Handle(OwnedFd);

impl Handle {
    /// The raw descriptor number, for transports performing the actual send.
    ///
    /// Ownership is not affected; the handle still closes on drop.
    pub fn as_raw(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl From<OwnedFd> for Handle {
    fn from(fd: OwnedFd) -> Self {
        Self(fd)
    }
}

impl From<Handle> for OwnedFd {
    fn from(handle: Handle) -> OwnedFd {
        handle.0
    }
}

/// The kind of kernel object a handle refers to, as declared on the wire.
///
/// Kind values are assigned by the schema layer; the engine only compares
/// them. [`HandleKind::ANY`] matches every kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandleKind(pub u32);

impl HandleKind {
    /// Matches any kind, on either side of the comparison.
    pub const ANY: Self = Self(0);
}

/// The rights a handle carries, as a bitmask declared on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rights(pub u32);

impl Rights {
    /// Transfer the handle with whatever rights it already has; matches any
    /// expectation, on either side of the comparison.
    pub const SAME: Self = Self(1 << 31);

    /// Returns true if every bit of `other` is present in `self`.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A handle staged for sending, paired with the metadata the sender intends.
#[derive(Debug)]
pub struct HandleDisposition {
    pub handle: Handle,
    pub kind: HandleKind,
    pub rights: Rights,
}

/// A received handle, paired with the metadata that arrived beside it.
#[derive(Debug)]
pub struct HandleInfo {
    pub handle: Handle,
    pub kind: HandleKind,
    pub rights: Rights,
}

impl HandleInfo {
    /// Validates the received metadata against the receiver's expectation.
    ///
    /// Kinds must agree unless either side is [`HandleKind::ANY`]. The
    /// received rights must include every expected right unless either side
    /// is [`Rights::SAME`]; surplus received rights are accepted as-is,
    /// since a descriptor cannot be narrowed in transit.
    pub(crate) fn check(&self, expected_kind: HandleKind, expected_rights: Rights) -> Result<(), Error> {
        if expected_kind != HandleKind::ANY
            && self.kind != HandleKind::ANY
            && expected_kind != self.kind
        {
            return Err(Error::WrongHandleKind {
                expected: expected_kind.0,
                received: self.kind.0,
            });
        }
        if expected_rights != Rights::SAME
            && self.rights != Rights::SAME
            && !self.rights.contains(expected_rights)
        {
            return Err(Error::MissingRights {
                missing: expected_rights.0 & !self.rights.0,
            });
        }
        Ok(())
    }
}
