//! Utility functions for amount formatting and time.

pub mod formatting;
pub mod helpers;

pub use formatting::{format_minor_units, parse_major_units, truncate_id};
pub use helpers::current_timestamp;
