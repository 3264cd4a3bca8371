//! # Kiln Core
//!
//! Shared foundation for the Kiln asset pipeline:
//! - **Math**: bounds types, comparison thresholds and tolerant vector helpers
//! - **Diagnostics**: injected message sinks used by every build stage

pub mod diagnostics;
pub mod math;

pub use diagnostics::{CollectingDiagnostics, Diagnostics, LogDiagnostics, Severity};
pub use math::{Aabb, BoxSphereBounds};
