//! Decoding of raw text cells into typed values.
//!
//! Upstream exports sometimes write integer columns as floats (`"1234.0"`) when the column
//! also holds nulls, so integral float text is accepted. Anything else that does not parse
//! is treated as null.

/// `Some` with the trimmed text, or `None` for null or whitespace-only cells
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Signed integer cell
pub fn parse_int(value: Option<&str>) -> Option<i64> {
    let text = non_blank(value)?;
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    let f = text.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Non-negative count cell. Negative values are not counts and decode as null.
pub fn parse_count(value: Option<&str>) -> Option<u64> {
    parse_int(value).and_then(|n| u64::try_from(n).ok())
}
