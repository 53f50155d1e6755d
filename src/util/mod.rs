//! Shared utility modules.

pub mod deadline;
pub mod simd;
