//! Edit distance computation.
//!
//! Optimal string alignment distance: insertions, deletions, substitutions
//! and transpositions of adjacent characters each cost 1. Characters are
//! compared as Unicode scalar values, so `"ñ"` and `"n"` differ by one
//! substitution.

pub use strsim::osa_distance as edit_distance;
