//! Replication priorities and the per-element control word.
//!
//! The replication middleware tags every local copy of an object with a
//! [`Priority`]. An element stores its priority together with a few status
//! flags in a [`ControlWord`]; the packed `u16` form exists only for
//! serialisation and is validated on decode.

use std::fmt;

/// Replication priority of a local object copy.
///
/// Variants are ordered by strength: when two directives target the same
/// rank, the stronger priority wins.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, serde::Serialize,
    serde::Deserialize,
)]
pub enum Priority {
    /// Second-order ghost ("ghost of a ghost"); carries no data the owner relies on.
    VGhost,
    /// Read-only neighbor replica inside the one-layer overlap.
    Ghost,
    /// Owned copy on a partition border (shared with another Master copy).
    Border,
    /// Authoritative owning copy.
    #[default]
    Master,
}

impl Priority {
    const ALL: [Priority; 4] = [
        Priority::VGhost,
        Priority::Ghost,
        Priority::Border,
        Priority::Master,
    ];

    /// Master and Border copies own data; ghosts do not.
    pub fn is_owner(self) -> bool {
        matches!(self, Priority::Master | Priority::Border)
    }

    /// Ghost or VGhost.
    pub fn is_ghost(self) -> bool {
        !self.is_owner()
    }

    /// Numeric code used in the packed control word.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Decode a priority code; `None` for codes outside the enum.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::VGhost => "VGhost",
            Priority::Ghost => "Ghost",
            Priority::Border => "Border",
            Priority::Master => "Master",
        };
        f.write_str(s)
    }
}

/// Named status flags of an element.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u16)]
pub enum ElementFlag {
    /// At least one side lies on the domain boundary.
    Boundary = 1 << 0,
    /// Element was created by refinement (has a father).
    Refined = 1 << 1,
    /// Planner found a side neighbor destined for the local rank.
    LocalNeighbor = 1 << 2,
}

const PRIORITY_BITS: u16 = 0b11;
const FLAG_SHIFT: u16 = 2;
const FLAG_MASK: u16 = 0b111;

/// Priority plus status flags of one element.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ControlWord {
    priority: Priority,
    flags: u16,
}

impl ControlWord {
    /// Control word with the given priority and no flags.
    pub fn new(priority: Priority) -> Self {
        Self { priority, flags: 0 }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    /// Whether `flag` is set.
    pub fn has(&self, flag: ElementFlag) -> bool {
        self.flags & flag as u16 != 0
    }

    /// Set or clear `flag`.
    pub fn set(&mut self, flag: ElementFlag, on: bool) {
        if on {
            self.flags |= flag as u16;
        } else {
            self.flags &= !(flag as u16);
        }
    }

    /// Packed form: bits 0..2 priority, bits 2..5 flags.
    pub fn to_bits(self) -> u16 {
        self.priority.code() | (self.flags << FLAG_SHIFT)
    }

    /// Decode a packed control word, rejecting unknown bits.
    pub fn from_bits(bits: u16) -> Option<Self> {
        if bits >> FLAG_SHIFT & !FLAG_MASK != 0 {
            return None;
        }
        let priority = Priority::from_code(bits & PRIORITY_BITS)?;
        Some(Self {
            priority,
            flags: (bits >> FLAG_SHIFT) & FLAG_MASK,
        })
    }
}

/// Transient per-node decision on the node's auxiliary data.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum VectorOwnership {
    /// Keep the auxiliary data on this rank.
    Keep,
    /// Drop the auxiliary data at the end of the transfer session.
    #[default]
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_strength_order() {
        assert!(Priority::Master > Priority::Border);
        assert!(Priority::Border > Priority::Ghost);
        assert!(Priority::Ghost > Priority::VGhost);
        assert!(Priority::Border.is_owner());
        assert!(Priority::VGhost.is_ghost());
    }

    #[test]
    fn fresh_control_word_is_an_unflagged_master() {
        let cw = ControlWord::default();
        assert_eq!(cw.priority(), Priority::Master);
        assert_eq!(cw, ControlWord::new(Priority::Master));
        assert_eq!(cw.to_bits(), Priority::Master.code());
    }

    #[test]
    fn flags_are_independent() {
        let mut cw = ControlWord::new(Priority::Master);
        cw.set(ElementFlag::Boundary, true);
        cw.set(ElementFlag::LocalNeighbor, true);
        cw.set(ElementFlag::Boundary, false);
        assert!(!cw.has(ElementFlag::Boundary));
        assert!(cw.has(ElementFlag::LocalNeighbor));
        assert!(!cw.has(ElementFlag::Refined));
        assert_eq!(cw.priority(), Priority::Master);
    }

    #[test]
    fn packed_form_is_validated() {
        let mut cw = ControlWord::new(Priority::Ghost);
        cw.set(ElementFlag::Refined, true);
        let bits = cw.to_bits();
        assert_eq!(ControlWord::from_bits(bits), Some(cw));
        assert_eq!(ControlWord::from_bits(1 << 10), None);
    }
}
