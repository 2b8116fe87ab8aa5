/// Selected time range in seconds, `start <= end`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Creates a range, returning [None] for non-finite or reversed bounds.
    pub fn new(start: f64, end: f64) -> Option<Self> {
        if start.is_finite() && end.is_finite() && start >= 0.0 && start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Converts the range into offset space of a track with `duration` seconds.
    pub fn to_offsets(&self, duration: f64) -> OffsetRange {
        OffsetRange {
            start: time_to_offset(self.start, duration),
            end: time_to_offset(self.end, duration),
        }
    }
}

/// Range expressed as fractions of the plotted waveform width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OffsetRange {
    pub start: f64,
    pub end: f64,
}

impl OffsetRange {
    /// Zero width range at `offset`.
    pub fn at(offset: f64) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn to_time(&self, duration: f64) -> TimeRange {
        TimeRange {
            start: offset_to_time(self.start, duration),
            end: offset_to_time(self.end, duration),
        }
    }

    /// Width of the range when plotted `width` pixels wide.
    pub fn pixel_width(&self, width: f64) -> f64 {
        (self.end - self.start) * width
    }
}

/// Duration used for offset math: missing, zero or broken durations count as one second.
pub fn effective_duration(duration: Option<f64>) -> f64 {
    match duration {
        Some(duration) if duration.is_finite() && duration > 0.0 => duration,
        _ => 1.0,
    }
}

pub fn time_to_offset(time: f64, duration: f64) -> f64 {
    time / duration
}

pub fn offset_to_time(offset: f64, duration: f64) -> f64 {
    offset * duration
}

/// Maps a horizontal pixel position to an offset, clamped to the viewport edges.
pub fn pixel_to_offset(x: f64, width: f64) -> f64 {
    if width <= 0.0 || !x.is_finite() {
        return 0.0;
    }
    (x / width).clamp(0.0, 1.0)
}

/// Formats seconds as `MM:SS`.
pub fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = (seconds % 60.0).floor() as u64;
    format!("{minutes:02}:{rest:02}")
}

pub fn format_time_range(range: &TimeRange) -> String {
    format!("{} - {}", format_time(range.start), format_time(range.end))
}
