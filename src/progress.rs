use std::time::Duration;

use indicatif::ProgressStyle;

pub fn steady_tick_duration() -> Duration {
    Duration::from_millis(75)
}

/// Bar for downloads with a known length.
pub fn style_bar() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{percent:>3}%[{bar:60.cyan/blue}] {bytes:>8}/{total_bytes} {bytes_per_sec} {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#|-")
}

/// Spinner for downloads whose length the server didn't tell us.
pub fn style_spinner() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner} {bytes:>8} {bytes_per_sec} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
