//! Decision selection on top of inference results.

pub mod meu;

pub use meu::{best_choice, recommend, RankedOption, Recommendation};
