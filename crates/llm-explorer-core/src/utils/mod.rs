//! Utility functions for string formatting.

pub mod format;

pub use format::{format_age, format_bytes, format_date, truncate_string};
