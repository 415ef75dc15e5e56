//! Strategic allocation math utilities.

pub mod math;

pub use math::distribution::*;
pub use math::stable::*;
