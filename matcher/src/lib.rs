//! # Lexicon Matcher
//!
//! Approximate matching of lexical forms for "did you mean" style lookups.
//!
//! ## Features
//!
//! - **Edit Distance**: Optimal string alignment distance over Unicode scalar values
//! - **Closest Forms**: Rank arbitrary items by the distance of an extracted key
//! - **Options**: Optionally include prefixed forms and the next-closest band
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Approximate Matcher                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  items ──► key extractor ──► edit_distance ──► closest bands    │
//! │                                   │                             │
//! │                                   ▼                             │
//! │                            MatchOptions                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod distance;
pub mod matcher;

pub use distance::edit_distance;
pub use matcher::{MatchOptions, find_closest_forms};
