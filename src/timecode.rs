//! `m:ss` time text, as typed into the trim box.

use crate::controls::TrimWindow;
use crate::error::StudioError;

/// Parse `m:ss` into seconds. Minutes may have any number of digits;
/// seconds are exactly two digits below 60.
pub fn parse_time(text: &str) -> Result<f64, StudioError> {
    let malformed = || StudioError::MalformedTimeRange(text.to_string());
    let (minutes, seconds) = text.trim().split_once(':').ok_or_else(malformed)?;
    if minutes.is_empty()
        || !minutes.bytes().all(|b| b.is_ascii_digit())
        || seconds.len() != 2
        || !seconds.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }
    let minutes: u32 = minutes.parse().map_err(|_| malformed())?;
    let seconds: u32 = seconds.parse().map_err(|_| malformed())?;
    if seconds >= 60 {
        return Err(malformed());
    }
    Ok(minutes as f64 * 60.0 + seconds as f64)
}

/// Parse `m:ss-m:ss` against a source of `duration` seconds and return the
/// range as `(cut_start, cut_end)` percentages.
pub fn parse_time_range(text: &str, duration: f64) -> Result<(f64, f64), StudioError> {
    let (start, end) = text
        .split_once('-')
        .ok_or_else(|| StudioError::MalformedTimeRange(text.to_string()))?;
    let start = parse_time(start).map_err(|_| StudioError::MalformedTimeRange(text.to_string()))?;
    let end = parse_time(end).map_err(|_| StudioError::MalformedTimeRange(text.to_string()))?;
    if !(duration > 0.0) || start >= end || end > duration {
        return Err(StudioError::InvalidTrimWindow { start, end });
    }
    Ok((start / duration * 100.0, end / duration * 100.0))
}

/// Format seconds as `m:ss`, rounding down to the whole second.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

pub fn format_time_range(window: TrimWindow) -> String {
    format!("{}-{}", format_time(window.start), format_time(window.end))
}
