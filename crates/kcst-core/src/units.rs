//! Human-readable duration and byte-size parsing.
//!
//! Durations are a sequence of `<number><unit>` pairs (`90m`, `1h30m`, `1.5h`, `28d`)
//! with units `ms`, `s`, `m`, `h`, `d`. A bare `0` is accepted.
//!
//! Sizes are `<integer>[unit]` with binary (`KiB`, `MiB`, `GiB`) or decimal
//! (`KB`, `MB`, `GB`) units, or plain bytes (`B` or no suffix). Units are case-insensitive.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitParseError {
    #[error("empty value")]
    Empty,

    #[error("invalid number in '{0}'")]
    InvalidNumber(String),

    #[error("missing unit in '{0}'")]
    MissingUnit(String),

    #[error("unknown unit '{unit}' in '{input}'")]
    UnknownUnit { unit: String, input: String },

    #[error("value '{0}' is out of range")]
    OutOfRange(String),
}

fn duration_unit_secs(unit: &str) -> Option<f64> {
    match unit {
        "ms" => Some(0.001),
        "s" => Some(1.0),
        "m" => Some(60.0),
        "h" => Some(3600.0),
        "d" => Some(86_400.0),
        _ => None,
    }
}

/// Parse a duration such as `1h`, `28d`, `1h30m` or `1.5h`.
pub fn parse_duration(input: &str) -> Result<Duration, UnitParseError> {
    let s = input.trim().to_lowercase();
    if s.is_empty() {
        return Err(UnitParseError::Empty);
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = s.as_str();

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(UnitParseError::InvalidNumber(input.to_string()));
        }
        let (number, after) = rest.split_at(number_len);
        let value: f64 = number
            .parse()
            .map_err(|_| UnitParseError::InvalidNumber(input.to_string()))?;

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, next) = after.split_at(unit_len);
        if unit.is_empty() {
            return Err(UnitParseError::MissingUnit(input.to_string()));
        }
        let multiplier = duration_unit_secs(unit).ok_or_else(|| UnitParseError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        let part = Duration::try_from_secs_f64(value * multiplier)
            .map_err(|_| UnitParseError::OutOfRange(input.to_string()))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| UnitParseError::OutOfRange(input.to_string()))?;
        rest = next;
    }

    Ok(total)
}

/// Parse a byte size such as `100MiB`, `5 GB` or `4096`.
pub fn parse_size(input: &str) -> Result<u64, UnitParseError> {
    let s = input.trim().to_uppercase();
    if s.is_empty() {
        return Err(UnitParseError::Empty);
    }

    // Longest suffixes first so "MIB" is not read as "B".
    const UNITS: [(&str, u64); 7] = [
        ("GIB", 1024 * 1024 * 1024),
        ("MIB", 1024 * 1024),
        ("KIB", 1024),
        ("GB", 1000 * 1000 * 1000),
        ("MB", 1000 * 1000),
        ("KB", 1000),
        ("B", 1),
    ];

    let (number, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, multiplier)| s.strip_suffix(suffix).map(|n| (n, *multiplier)))
        .unwrap_or((s.as_str(), 1));

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| UnitParseError::InvalidNumber(input.to_string()))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| UnitParseError::OutOfRange(input.to_string()))
}

/// Format a byte count using binary units, e.g. `1.5 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0usize;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}iB", bytes as f64 / div as f64, prefix)
}
