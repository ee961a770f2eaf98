//! Strong, zero-cost arena handles for mesh records.
//!
//! Elements, nodes and vertices live in arenas owned by
//! [`MultiGrid`](crate::topology::multigrid::MultiGrid). Every cross
//! reference between records (corner, neighbor, father, son, list link) is
//! one of these handles instead of a pointer, so removing a record never
//! invalidates the handles of the others.
//!
//! Each handle wraps a `NonZeroU32`; 0 is reserved so that `Option<Handle>`
//! costs no extra space. The arena slot of a handle is `raw - 1`.

use std::{fmt, num::NonZeroU32};

macro_rules! arena_handle {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Handle for arena slot `index`.
            ///
            /// # Panics
            ///
            /// Panics if `index` does not fit in a `u32` handle.
            #[inline]
            pub fn from_index(index: usize) -> Self {
                let raw = u32::try_from(index + 1).expect("arena index exceeds u32 handle range");
                // index + 1 is never zero
                $name(NonZeroU32::new(raw).expect("handle must be non-zero"))
            }

            /// Arena slot of this handle.
            #[inline]
            pub const fn index(self) -> usize {
                (self.0.get() - 1) as usize
            }

            /// Raw handle value (slot + 1); doubles as the local object id.
            #[inline]
            pub const fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.get()).finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $label, self.get())
            }
        }
    };
}

arena_handle!(
    /// Handle of an element record.
    ElementId,
    "e"
);
arena_handle!(
    /// Handle of a node record (one level's instance of a vertex).
    NodeId,
    "n"
);
arena_handle!(
    /// Handle of a vertex record (coordinates shared across levels).
    VertexId,
    "v"
);

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_eq_size;

    assert_eq_size!(ElementId, u32);
    assert_eq_size!(Option<ElementId>, u32);
    assert_eq_size!(Option<NodeId>, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips() {
        let e = ElementId::from_index(0);
        assert_eq!(e.get(), 1);
        assert_eq!(e.index(), 0);
        assert_eq!(NodeId::from_index(41).index(), 41);
    }

    #[test]
    fn formatting() {
        let v = VertexId::from_index(6);
        assert_eq!(format!("{v}"), "v7");
        assert_eq!(format!("{v:?}"), "VertexId(7)");
    }

    #[test]
    fn ordering_follows_slots() {
        assert!(ElementId::from_index(1) < ElementId::from_index(2));
    }
}
