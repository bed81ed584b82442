//! Query compilation: semantic specs to SQL, and rollup routing.

pub mod generator;
pub mod preagg_match;

pub use generator::{QuerySpec, SqlGenerator};
pub use preagg_match::find_matching_preagg;
