//! Utility functions for string comparison and truncation.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{eq_ignore_case, truncate_bytes};
