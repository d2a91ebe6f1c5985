//! ISO-8601 duration strings (`P30D`, `PT1H30M`, `P1Y2M3DT4H5M6S`, `P2W`).
//!
//! `release_after` is stored verbatim; this module only checks that a value is
//! well formed and gives an approximate length for logging. Years count as 365
//! days and months as 30.

use std::sync::OnceLock;

use chrono::TimeDelta;
use regex::Regex;

use crate::error::{ActionError, Result};

static DURATION_RE: OnceLock<Regex> = OnceLock::new();

fn duration_re() -> &'static Regex {
    DURATION_RE.get_or_init(|| {
        Regex::new(
            r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:(T)(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
        )
        .unwrap()
    })
}

const DAY: i64 = 24 * 60 * 60;

/// Parse an ISO-8601 duration, returning its approximate length.
pub fn parse_iso8601(s: &str) -> Result<TimeDelta> {
    let invalid = || ActionError::Validation(format!("'{s}' is not an ISO-8601 duration"));
    let caps = duration_re().captures(s).ok_or_else(invalid)?;

    let int = |i: usize| -> Result<i64> {
        caps.get(i)
            .map(|m| m.as_str().parse::<i64>().map_err(|_| invalid()))
            .transpose()
            .map(|v| v.unwrap_or(0))
    };

    let date_parts = [1usize, 2, 3, 4];
    let time_parts = [6usize, 7, 8];
    let has_date = date_parts.iter().any(|&i| caps.get(i).is_some());
    let has_time = time_parts.iter().any(|&i| caps.get(i).is_some());
    // "P" alone and a dangling "T" are both malformed.
    if (!has_date && !has_time) || (caps.get(5).is_some() && !has_time) {
        return Err(invalid());
    }

    let seconds: f64 = caps
        .get(8)
        .map(|m| m.as_str().parse::<f64>().map_err(|_| invalid()))
        .transpose()?
        .unwrap_or(0.0);

    let whole = int(1)?
        .checked_mul(365 * DAY)
        .and_then(|t| int(2).ok()?.checked_mul(30 * DAY)?.checked_add(t))
        .and_then(|t| int(3).ok()?.checked_mul(7 * DAY)?.checked_add(t))
        .and_then(|t| int(4).ok()?.checked_mul(DAY)?.checked_add(t))
        .and_then(|t| int(6).ok()?.checked_mul(3600)?.checked_add(t))
        .and_then(|t| int(7).ok()?.checked_mul(60)?.checked_add(t))
        .and_then(|t| t.checked_add(seconds.trunc() as i64))
        .ok_or_else(invalid)?;

    let millis = (seconds.fract() * 1000.0).round() as i64;
    TimeDelta::try_seconds(whole)
        .and_then(|d| d.checked_add(&TimeDelta::milliseconds(millis)))
        .ok_or_else(invalid)
}
