//! Foundation module - shared building blocks
//!
//! - Spatial math for poses and anchors
//! - Processing budgets and fixed-cadence ticking
//! - Single-slot handoffs between pacing domains
//! - Logger setup

pub mod math;
pub mod time;
pub mod handoff;
pub mod logging;
