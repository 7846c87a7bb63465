use serde::{Deserialize, Serialize};

/// Minutes since midnight — the only time-of-day type.
pub type Minutes = u16;

/// One calendar day in minutes. A range may end here ("24:00") but never past it.
pub const MINUTES_PER_DAY: Minutes = 1440;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    InvalidFormat(String),
    CrossesMidnight { start: Minutes, duration_min: u32 },
}

impl std::fmt::Display for TimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeError::InvalidFormat(s) => write!(f, "invalid clock time: {s:?} (expected HH:MM)"),
            TimeError::CrossesMidnight { start, duration_min } => write!(
                f,
                "range starting at {} with duration {duration_min}min extends past midnight",
                format_clock(*start)
            ),
        }
    }
}

impl std::error::Error for TimeError {}

/// Parse a strict `HH:MM` clock string into minutes since midnight.
/// Two digits, colon, two digits; hour 0–23, minute 0–59.
pub fn parse_clock(clock: &str) -> Result<Minutes, TimeError> {
    let bytes = clock.as_bytes();
    let invalid = || TimeError::InvalidFormat(clock.to_string());
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(invalid());
    }
    if !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || !bytes[3].is_ascii_digit()
        || !bytes[4].is_ascii_digit()
    {
        return Err(invalid());
    }
    let hour = (bytes[0] - b'0') as Minutes * 10 + (bytes[1] - b'0') as Minutes;
    let minute = (bytes[3] - b'0') as Minutes * 10 + (bytes[4] - b'0') as Minutes;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok(hour * 60 + minute)
}

/// Format minutes since midnight as `HH:MM`. A range end of exactly 24:00 is
/// representable; anything past that is rejected upstream by `booking_range`.
pub fn format_clock(minutes: Minutes) -> String {
    debug_assert!(minutes <= MINUTES_PER_DAY, "minute offset past end of day");
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Half-open range `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Minutes,
    pub end: Minutes,
}

impl TimeRange {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "TimeRange start must be before end");
        Self { start, end }
    }

    pub fn duration_min(&self) -> u32 {
        (self.end - self.start) as u32
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Derive the `[start, end)` range of a booking from its start time and
/// duration. Cross-midnight ranges are an error, never wrapped or clamped.
pub fn booking_range(start: Minutes, duration_min: u32) -> Result<TimeRange, TimeError> {
    debug_assert!(duration_min > 0);
    let end = start as u32 + duration_min;
    if end > MINUTES_PER_DAY as u32 {
        return Err(TimeError::CrossesMidnight { start, duration_min });
    }
    Ok(TimeRange::new(start, end as Minutes))
}

/// Candidate booking start times from open (inclusive) to close (exclusive).
pub fn generate_slots(open: Minutes, close: Minutes, step_min: Minutes) -> Vec<Minutes> {
    debug_assert!(step_min > 0);
    let mut slots = Vec::new();
    let mut t = open;
    while t < close {
        slots.push(t);
        t += step_min;
    }
    slots
}
