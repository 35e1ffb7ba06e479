mod format;

pub use format::{format_duration_ms, format_target, format_timestamp};
