//! Utility functions for string and time formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_age, format_timestamp, mask_secret};
