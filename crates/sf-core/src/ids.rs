//! Strongly typed, zero-cost identifier wrappers.
//!
//! All IDs are `Copy + Ord + Hash` so they can be used as map keys and sorted
//! collection elements without ceremony.  Ordering matters: every
//! deterministic tie-break in the engine ("lowest vehicle id", "lowest
//! node-id path") compares these wrappers directly.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID", equal to `MAX`.
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            /// Returns the `INVALID` sentinel so uninitialized IDs are visibly invalid.
            #[inline(always)]
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$name> for usize {
            #[inline(always)]
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Index of a vehicle in the fleet inventory.
    pub struct VehicleId(u32);
}

typed_id! {
    /// Index of a graph node.
    pub struct NodeId(u32);
}

typed_id! {
    /// Index of a directed graph edge.
    pub struct EdgeId(u32);
}

typed_id! {
    /// Order identifier, assigned sequentially on submission.
    pub struct OrderId(u32);
}

typed_id! {
    /// No-fly zone identifier.  Never reused: a changed zone gets a new id.
    pub struct ZoneId(u32);
}

typed_id! {
    /// Index of a vehicle profile in the profile registry.
    pub struct ProfileId(u16);
}
