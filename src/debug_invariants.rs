//! Opt-in structural checks on mesh containers.
//!
//! Checks always run in debug builds. Release builds run them only with
//! the `strict-invariants` or `check-invariants` feature.

use crate::mesh_error::MeshDistribError;

/// Whether [`debug_invariants!`] checks are compiled in.
pub const CHECKS_ENABLED: bool = cfg!(any(
    debug_assertions,
    feature = "strict-invariants",
    feature = "check-invariants"
));

/// A container whose structural invariants can be verified on demand.
pub trait DebugInvariants {
    /// All invariants, first violation as the error.
    fn validate_invariants(&self) -> Result<(), MeshDistribError>;

    /// Panic on the first violation when checks are enabled.
    fn debug_assert_invariants(&self) {
        if CHECKS_ENABLED {
            if let Err(e) = self.validate_invariants() {
                panic!("[invariants] {}: {e}", std::any::type_name::<Self>());
            }
        }
    }
}

/// Evaluate a `Result`-returning check and panic with `ctx` on error.
///
/// The check is not evaluated at all when checks are disabled.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $($ctx:tt)*) => {
        if $crate::debug_invariants::CHECKS_ENABLED {
            if let Err(e) = $check {
                $crate::log::error!("{}: {}", format_args!($($ctx)*), e);
                panic!("[invariants] {}: {}", format_args!($($ctx)*), e);
            }
        }
    };
}
