//! Resolve local Toronto wall-clock timestamps to absolute instants.
//!
//! The portal exports local times that switch between EST and EDT. The fall
//! repeated hour is reported as one (two-hour) interval, so ambiguous times
//! are resolved to standard time. Only the post-2007 North American rules are
//! modelled.

use time::macros::offset;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, Weekday};

pub const EST: UtcOffset = offset!(-5);
pub const EDT: UtcOffset = offset!(-4);

pub fn eastern_offset(ts: PrimitiveDateTime) -> UtcOffset {
    let year = ts.year();
    let (Some(spring), Some(fall)) = (
        first_sunday(year, Month::March).map(|d| d + Duration::days(7)),
        first_sunday(year, Month::November),
    ) else {
        return EST;
    };

    // 02:00 local on the spring date, and the start of the repeated 01:00 hour in the fall.
    let dst_start = PrimitiveDateTime::new(spring, Time::MIDNIGHT + Duration::hours(2));
    let dst_end = PrimitiveDateTime::new(fall, Time::MIDNIGHT + Duration::hours(1));

    if ts >= dst_start && ts < dst_end {
        EDT
    } else {
        EST
    }
}

pub fn to_offset_datetime(ts: PrimitiveDateTime) -> OffsetDateTime {
    ts.assume_offset(eastern_offset(ts))
}

fn first_sunday(year: i32, month: Month) -> Option<Date> {
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let ahead = (7 - i64::from(first.weekday().number_days_from_sunday())) % 7;
    let d = first + Duration::days(ahead);
    debug_assert_eq!(d.weekday(), Weekday::Sunday);
    Some(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn winter_is_standard_time() {
        assert_eq!(eastern_offset(datetime!(2019-01-15 12:00)), EST);
    }

    #[test]
    fn summer_is_daylight_time() {
        assert_eq!(eastern_offset(datetime!(2019-07-15 12:00)), EDT);
    }

    #[test]
    fn spring_forward_boundary() {
        // 2019-03-10 was the second Sunday of March.
        assert_eq!(eastern_offset(datetime!(2019-03-10 01:00)), EST);
        assert_eq!(eastern_offset(datetime!(2019-03-10 03:00)), EDT);
    }

    #[test]
    fn ambiguous_fall_hour_resolves_to_standard_time() {
        // 2019-11-03 was the first Sunday of November.
        assert_eq!(eastern_offset(datetime!(2019-11-03 00:00)), EDT);
        assert_eq!(eastern_offset(datetime!(2019-11-03 01:00)), EST);
        assert_eq!(eastern_offset(datetime!(2019-11-03 02:00)), EST);
    }

    #[test]
    fn converts_to_utc_instant() {
        let odt = to_offset_datetime(datetime!(2019-07-15 12:00));
        assert_eq!(odt.to_offset(UtcOffset::UTC).hour(), 16);
    }
}
