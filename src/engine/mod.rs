//! Selection and settlement engine.
//!
//! `analyzer` turns raw fixtures into a tier-appropriate pick;
//! `settlement` grades settled fixtures against their final score.

pub mod analyzer;
pub mod settlement;

pub use analyzer::{Analysis, MatchAnalyzer, PickRng};
pub use settlement::resolve;
