//! State module for tracking classification progress
//!
//! # Components
//!
//! - `Category`: the bucket an image ends up in, and the score thresholds that pick it

mod category;

// Re-export main types
pub use category::{Category, MAYBE_THRESHOLD, PEPE_THRESHOLD};
