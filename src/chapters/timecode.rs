/// Millisecond offsets to and from human-readable timecodes
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimecodeError {
    #[error("Empty timecode")]
    Empty,

    #[error("Invalid timecode: {0}")]
    Invalid(String),

    #[error("Timecode component out of range: {0}")]
    OutOfRange(String),
}

/// Format an offset as `HH:MM:SS.mmm`; hours are not wrapped
pub fn format_offset(offset_ms: u64) -> String {
    let hours = offset_ms / 3_600_000;
    let minutes = (offset_ms % 3_600_000) / 60_000;
    let seconds = (offset_ms % 60_000) / 1000;
    let millis = offset_ms % 1000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

/// Parse a user-supplied offset.
///
/// Accepts `HH:MM:SS.mmm`, `MM:SS(.mmm)`, `SS(.mmm)` and `<n>ms`.
pub fn parse_offset(input: &str) -> Result<u64, TimecodeError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TimecodeError::Empty);
    }

    if let Some(millis) = input.strip_suffix("ms") {
        return millis
            .trim()
            .parse::<u64>()
            .map_err(|_| TimecodeError::Invalid(input.to_string()));
    }

    let (clock, fraction) = match input.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (input, None),
    };

    let millis = match fraction {
        Some(fraction) => parse_fraction(fraction).ok_or_else(|| TimecodeError::Invalid(input.to_string()))?,
        None => 0,
    };

    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() > 3 {
        return Err(TimecodeError::Invalid(input.to_string()));
    }

    let mut values = Vec::with_capacity(parts.len());
    for part in &parts {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(TimecodeError::Invalid(input.to_string()));
        }
        // Digits only, so a parse failure means the value does not fit
        let value: u64 = part
            .parse()
            .map_err(|_| TimecodeError::OutOfRange(input.to_string()))?;
        values.push(value);
    }

    // Leading component may be unbounded, the others are base 60
    for value in values.iter().skip(1) {
        if *value >= 60 {
            return Err(TimecodeError::OutOfRange(input.to_string()));
        }
    }

    values
        .iter()
        .try_fold(0u64, |acc, value| acc.checked_mul(60)?.checked_add(*value))
        .and_then(|seconds| seconds.checked_mul(1000)?.checked_add(millis))
        .ok_or_else(|| TimecodeError::OutOfRange(input.to_string()))
}

/// Interpret up to three fractional digits as milliseconds ("5" is 500 ms)
fn parse_fraction(fraction: &str) -> Option<u64> {
    if fraction.is_empty() || fraction.len() > 3 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{:0<3}", fraction);
    padded.parse().ok()
}
