//! Utility functions for timestamp handling.

pub mod timestamps;

pub use timestamps::{display_stamp, file_stamp, iso_timestamp, now, Timestamp};
