//! Utility functions for parsing request input

use std::time::Duration;

use crate::error::{Error, Result};

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration string such as `"300ms"`, `"1.5s"`, `"2m"` or `"1h30m"`
///
/// Accepts a sequence of decimal numbers, each with an optional fraction and a
/// unit suffix (`ns`, `us`/`µs`/`μs`, `ms`, `s`, `m`, `h`). A bare `"0"` is allowed.
/// Negative durations are rejected.
///
/// # Errors
///
/// Returns [`Error::Validation`] when the string is empty, malformed, uses an
/// unknown unit, is negative, or does not fit in a [`Duration`] of `u64` nanoseconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = |reason: &str| Error::Validation(format!("invalid duration {input:?}: {reason}"));

    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest.starts_with('-') {
        return Err(invalid("must not be negative"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid("empty"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_digits, after_int) = rest.split_at(int_len);

        let (frac_digits, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };
        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err(invalid("expected a number"));
        }

        let unit_len = after_number
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after_number.len());
        let (unit, remaining) = after_number.split_at(unit_len);
        let scale = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 60 * 60 * NANOS_PER_SEC,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit")),
        };

        let whole = if int_digits.is_empty() {
            0
        } else {
            int_digits
                .parse::<u128>()
                .map_err(|_| invalid("number too large"))?
        };
        let mut component = whole
            .checked_mul(scale)
            .ok_or_else(|| invalid("overflow"))?;

        // Digits beyond nanosecond precision cannot change the result
        let frac_digits = &frac_digits[..frac_digits.len().min(18)];
        if !frac_digits.is_empty() {
            let numerator = frac_digits
                .parse::<u128>()
                .map_err(|_| invalid("bad fraction"))?;
            let denominator = 10u128.pow(frac_digits.len() as u32);
            component += numerator * scale / denominator;
        }

        total = total
            .checked_add(component)
            .ok_or_else(|| invalid("overflow"))?;
        rest = remaining;
    }

    let nanos = u64::try_from(total).map_err(|_| invalid("overflow"))?;
    Ok(Duration::from_nanos(nanos))
}
