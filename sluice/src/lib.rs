//! Aggregate crate that re-exports the main components for downstream users.

pub use sluice_core as core;
pub use sluice_exec as exec;
pub use sluice_strategy as strategy;

/// Convenience prelude to pull commonly used items into scope.
pub mod prelude {
    pub use sluice_core::*;
    pub use sluice_exec::*;
    pub use sluice_strategy::*;
}
