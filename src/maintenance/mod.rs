//! Periodic maintenance of the mirrored state.

pub mod background_cleanup;

pub use background_cleanup::{BackgroundCleanup, CleanupStats};
