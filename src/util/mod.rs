//! Utility types and functions shared across the crate.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math re-exports from glam and grid helpers

mod error;
mod math;

pub use error::*;
pub use math::*;
