//! SAML `xs:dateTime` handling.

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, TimeDelta, Timelike, Utc};

use crate::error::{SamlError, SamlResult};

/// Formats an instant as UTC with at most millisecond precision.
///
/// Trailing zeros of the fraction are dropped, so a whole second is written
/// without a fraction at all (`2024-01-01T00:00:00Z`).
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    let millis = instant.nanosecond() / 1_000_000 % 1000;
    if millis == 0 {
        return instant.to_rfc3339_opts(SecondsFormat::Secs, true);
    }
    let formatted = instant.to_rfc3339_opts(SecondsFormat::Millis, true);
    // "...ss.mmmZ": strip zeros before the zone designator.
    let (body, _) = formatted.split_at(formatted.len() - 1);
    format!("{}Z", body.trim_end_matches('0'))
}

/// Parses an `xs:dateTime`, reading values without a zone as UTC.
///
/// # Errors
///
/// Returns [`SamlError::InvalidTimestamp`] if `value` is not a date-time.
/// Years outside `0000..=9999` are rejected.
pub fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    let value = value.trim();
    let instant = match DateTime::parse_from_rfc3339(value) {
        Ok(instant) => instant.with_timezone(&Utc),
        Err(_) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| SamlError::InvalidTimestamp(format!("{value:?}: {e}")))?,
    };
    if !(0..=9999).contains(&instant.year()) {
        return Err(SamlError::InvalidTimestamp(format!(
            "{value:?}: year out of range"
        )));
    }
    Ok(instant)
}

/// Returns `instant + by`, or `None` if the result is not representable.
#[must_use]
pub fn after(instant: DateTime<Utc>, by: TimeDelta) -> Option<DateTime<Utc>> {
    instant.checked_add_signed(by)
}

/// Returns `instant - by`, or `None` if the result is not representable.
#[must_use]
pub fn before(instant: DateTime<Utc>, by: TimeDelta) -> Option<DateTime<Utc>> {
    instant.checked_sub_signed(by)
}

/// Converts a protocol time limit to a `chrono` delta.
#[must_use]
pub fn delta(limit: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(limit).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_trims_fraction() {
        let whole = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(format_instant(whole), "2024-03-01T12:30:00Z");

        let fraction = whole + chrono::Duration::milliseconds(120);
        assert_eq!(format_instant(fraction), "2024-03-01T12:30:00.12Z");

        let sub_milli = whole + chrono::Duration::microseconds(999);
        assert_eq!(format_instant(sub_milli), "2024-03-01T12:30:00Z");
    }

    #[test]
    fn parse_accepts_zones_and_naive_values() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_instant("2024-03-01T12:30:00Z").unwrap(), expected);
        assert_eq!(parse_instant("2024-03-01T14:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_instant("2024-03-01T12:30:00").unwrap(), expected);
        assert_eq!(
            parse_instant("2024-03-01T12:30:00.250Z").unwrap(),
            expected + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn parse_rejects_out_of_range_years() {
        for value in ["+262142-12-31T23:59:59", "-0001-01-01T00:00:00", "10000-01-01T00:00:00"] {
            assert!(
                matches!(parse_instant(value), Err(SamlError::InvalidTimestamp(_))),
                "{value} accepted"
            );
        }
        assert!(parse_instant("9999-12-31T23:59:59Z").is_ok());
    }

    #[test]
    fn shifting_past_the_range_is_none() {
        assert_eq!(after(DateTime::<Utc>::MAX_UTC, TimeDelta::seconds(1)), None);
        assert_eq!(before(DateTime::<Utc>::MIN_UTC, TimeDelta::seconds(1)), None);
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            after(at, TimeDelta::seconds(90)),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 31, 30).unwrap())
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_instant("yesterday"),
            Err(SamlError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn format_then_parse_keeps_millis() {
        let instant = Utc.with_ymd_and_hms(2030, 12, 31, 23, 59, 59).unwrap()
            + chrono::Duration::milliseconds(7);
        assert_eq!(parse_instant(&format_instant(instant)).unwrap(), instant);
    }

    #[test]
    fn limits_convert_to_deltas() {
        assert_eq!(delta(crate::types::MAX_ISSUE_DELAY), TimeDelta::seconds(90));
        assert_eq!(delta(std::time::Duration::MAX), TimeDelta::MAX);
    }
}
