//! ISO-8601 duration parsing (`PT1H2M3S`, `P1DT30M`, `P0D`).
//!
//! Only fixed-length designators are accepted: weeks, days, hours, minutes
//! and seconds. Years and months have no fixed length in seconds and are
//! rejected.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("duration must start with 'P': {0:?}")]
    MissingPrefix(String),
    #[error("duration has no components: {0:?}")]
    Empty(String),
    #[error("unsupported designator '{designator}' in {input:?}")]
    UnsupportedDesignator { designator: char, input: String },
    #[error("invalid number in {0:?}")]
    InvalidNumber(String),
}

/// Parses an ISO-8601 duration into seconds.
pub fn parse_iso8601_duration(input: &str) -> Result<f64, DurationParseError> {
    let body = input
        .strip_prefix('P')
        .ok_or_else(|| DurationParseError::MissingPrefix(input.to_string()))?;

    let mut seconds = 0.0;
    let mut in_time = false;
    let mut components = 0;
    let mut number = String::new();

    for c in body.chars() {
        match c {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' | '.' | ',' => number.push(if c == ',' { '.' } else { c }),
            designator => {
                let unit = match (in_time, designator) {
                    (false, 'W') => 604_800.0,
                    (false, 'D') => 86_400.0,
                    (true, 'H') => 3_600.0,
                    (true, 'M') => 60.0,
                    (true, 'S') => 1.0,
                    _ => {
                        return Err(DurationParseError::UnsupportedDesignator {
                            designator,
                            input: input.to_string(),
                        });
                    }
                };
                let value: f64 = number
                    .parse()
                    .map_err(|_| DurationParseError::InvalidNumber(input.to_string()))?;
                seconds += value * unit;
                components += 1;
                number.clear();
            }
        }
    }

    if !number.is_empty() {
        return Err(DurationParseError::InvalidNumber(input.to_string()));
    }
    if components == 0 {
        return Err(DurationParseError::Empty(input.to_string()));
    }
    Ok(seconds)
}
