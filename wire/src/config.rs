//! Per-message-type coding metadata.

use crate::handle::{HandleKind, Rights};

/// The expected kind and rights for one handle position in a message.
#[derive(Clone, Copy, Debug)]
pub struct HandleConstraint {
    pub kind: HandleKind,
    pub rights: Rights,
}

impl HandleConstraint {
    /// Accepts any handle.
    pub const UNCONSTRAINED: Self = Self {
        kind: HandleKind::ANY,
        rights: Rights::SAME,
    };
}

/// Static metadata for one message type, supplied by the schema layer.
///
/// The engine reads it in two places: when staging a handle for sending it
/// takes the disposition metadata from the constraint table, and when
/// consuming a received handle it validates the arrived metadata against the
/// same table. Constraints are indexed by the order handles are encountered
/// during the walk; positions beyond the table are unconstrained.
///
/// The engine never mutates a config and holds it only for the duration of
/// one transcode call.
#[derive(Clone, Copy, Debug)]
pub struct CodingConfig {
    /// Handle constraints in encounter order.
    pub handles: &'static [HandleConstraint],
}

impl CodingConfig {
    /// A config for message types that carry no handles.
    pub const EMPTY: Self = Self { handles: &[] };

    /// The constraint for the `index`-th handle in the message.
    pub(crate) fn constraint(&self, index: usize) -> HandleConstraint {
        self.handles
            .get(index)
            .copied()
            .unwrap_or(HandleConstraint::UNCONSTRAINED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_lookup() {
        static CONFIG: CodingConfig = CodingConfig {
            handles: &[HandleConstraint {
                kind: HandleKind(7),
                rights: Rights(3),
            }],
        };
        assert_eq!(CONFIG.constraint(0).kind, HandleKind(7));
        assert_eq!(CONFIG.constraint(1).kind, HandleKind::ANY);
        assert_eq!(CONFIG.constraint(1).rights, Rights::SAME);
        assert_eq!(CodingConfig::EMPTY.constraint(0).kind, HandleKind::ANY);
    }
}
