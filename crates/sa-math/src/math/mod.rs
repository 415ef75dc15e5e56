//! Core math modules.

pub mod distribution;
pub mod stable;
