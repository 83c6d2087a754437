//! Time handling for ensemble time axes.
//!
//! Ensemble timestamps arrive as epoch milliseconds and are turned into whole
//! hour offsets from a reference time (midnight of the current day).
//!
//! The day boundary is UTC unless a fixed offset is given; with UTC the "0h"
//! tick for a Central European location falls at 01:00 or 02:00 local time.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

const MS_PER_HOUR: i64 = 3_600_000;

/// Midnight (UTC) of the day containing `now`.
pub fn reference_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(now)
}

/// Instant of local midnight, at a fixed `offset` from UTC, on the local day
/// containing `now`.
pub fn reference_midnight_at(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    now.with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Whole hours from `reference` to the epoch-millisecond timestamp `ts_ms`.
///
/// Floors toward negative infinity, so 30 minutes before the reference is
/// hour -1.
pub fn hours_since(reference: DateTime<Utc>, ts_ms: f64) -> i64 {
    let delta = ts_ms.floor() as i64 - reference.timestamp_millis();
    delta.div_euclid(MS_PER_HOUR)
}

/// Axis label for an hour offset: `"+{d}d {h}h"`, or `"{h}h"` within the
/// reference day.
pub fn tick_label(hours: i64) -> String {
    let days = hours.div_euclid(24);
    let rem = hours.rem_euclid(24);
    if days != 0 {
        format!("+{}d {}h", days, rem)
    } else {
        format!("{}h", rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_reference_midnight() {
        assert_eq!(reference_midnight(at(2024, 3, 5, 17, 42)), at(2024, 3, 5, 0, 0));
    }

    #[test]
    fn test_hours_since_floors() {
        let reference = at(2024, 3, 5, 0, 0);
        let ms = |dt: DateTime<Utc>| dt.timestamp_millis() as f64;
        assert_eq!(hours_since(reference, ms(at(2024, 3, 5, 0, 0))), 0);
        assert_eq!(hours_since(reference, ms(at(2024, 3, 5, 5, 59))), 5);
        assert_eq!(hours_since(reference, ms(at(2024, 3, 6, 3, 0))), 27);
        assert_eq!(hours_since(reference, ms(at(2024, 3, 4, 23, 30))), -1);
    }

    #[test]
    fn test_tick_label() {
        assert_eq!(tick_label(0), "0h");
        assert_eq!(tick_label(21), "21h");
        assert_eq!(tick_label(24), "+1d 0h");
        assert_eq!(tick_label(51), "+2d 3h");
        assert_eq!(tick_label(-3), "+-1d 21h");
    }

    #[test]
    fn test_reference_midnight_at_offset() {
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(reference_midnight_at(at(2024, 3, 10, 23, 30), east), at(2024, 3, 10, 22, 0));
        assert_eq!(reference_midnight_at(at(2024, 3, 10, 21, 0), east), at(2024, 3, 9, 22, 0));

        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(reference_midnight_at(at(2024, 3, 10, 3, 0), west), at(2024, 3, 9, 5, 0));

        let utc = FixedOffset::east_opt(0).unwrap();
        let now = at(2024, 3, 10, 13, 45);
        assert_eq!(reference_midnight_at(now, utc), reference_midnight(now));
    }
}
