//! Derivation of relative cell-population frequencies.

pub mod frequency;

pub use frequency::{derive_frequencies, relative_frequencies, sample_frequencies};
