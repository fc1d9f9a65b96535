//! Ontario statutory holidays, which are billed off-peak all day.

use time::{Date, Duration, Month, Weekday};

/// All holiday dates for `year`, including weekday observances of holidays
/// that fall on a weekend. Sorted, may contain both the calendar date and
/// the observed date.
pub fn ontario_holidays(year: i32) -> Vec<Date> {
    let mut days: Vec<Date> = Vec::with_capacity(14);

    let fixed = |month: Month, day: u8| Date::from_calendar_date(year, month, day).ok();

    if let Some(d) = fixed(Month::January, 1) {
        days.push(d);
        days.extend(observed_monday(d));
    }
    if year >= 2008 {
        days.extend(nth_weekday(year, Month::February, Weekday::Monday, 3));
    }
    if let Some(easter) = easter_sunday(year) {
        days.push(easter - Duration::days(2));
    }
    days.extend(victoria_day(year));
    if let Some(d) = fixed(Month::July, 1) {
        days.push(d);
        days.extend(observed_monday(d));
    }
    days.extend(nth_weekday(year, Month::August, Weekday::Monday, 1));
    days.extend(nth_weekday(year, Month::September, Weekday::Monday, 1));
    days.extend(nth_weekday(year, Month::October, Weekday::Monday, 2));
    if let (Some(christmas), Some(boxing)) = (fixed(Month::December, 25), fixed(Month::December, 26)) {
        days.push(christmas);
        days.push(boxing);
        days.extend(christmas_observances(christmas));
    }

    days.sort();
    days.dedup();
    days
}

pub fn is_ontario_holiday(date: Date) -> bool {
    ontario_holidays(date.year()).binary_search(&date).is_ok()
}

fn observed_monday(d: Date) -> Option<Date> {
    match d.weekday() {
        Weekday::Saturday => Some(d + Duration::days(2)),
        Weekday::Sunday => Some(d + Duration::days(1)),
        _ => None,
    }
}

// Christmas and Boxing Day shift together: both land on the next free weekdays.
fn christmas_observances(christmas: Date) -> Vec<Date> {
    match christmas.weekday() {
        // Sat 25 -> Mon 27, Sun 26 -> Tue 28
        Weekday::Saturday => vec![christmas + Duration::days(2), christmas + Duration::days(3)],
        // Sun 25 -> Tue 27 (Mon 26 is Boxing Day itself)
        Weekday::Sunday => vec![christmas + Duration::days(2)],
        // Fri 25, Sat 26 -> Mon 28
        Weekday::Friday => vec![christmas + Duration::days(3)],
        _ => Vec::new(),
    }
}

/// `n`-th (1-based) `weekday` of the month.
fn nth_weekday(year: i32, month: Month, weekday: Weekday, n: u8) -> Option<Date> {
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let offset = (7 + i64::from(weekday.number_days_from_monday())
        - i64::from(first.weekday().number_days_from_monday()))
        % 7;
    let d = first + Duration::days(offset + 7 * i64::from(n.saturating_sub(1)));
    (d.month() == month).then_some(d)
}

/// Monday preceding May 25.
fn victoria_day(year: i32) -> Option<Date> {
    let may_24 = Date::from_calendar_date(year, Month::May, 24).ok()?;
    Some(may_24 - Duration::days(i64::from(may_24.weekday().number_days_from_monday())))
}

/// Gregorian Easter (anonymous Gregorian algorithm).
fn easter_sunday(year: i32) -> Option<Date> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    Date::from_calendar_date(year, month, u8::try_from(day).ok()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn easter_dates_match_known_years() {
        assert_eq!(easter_sunday(2019), Some(date!(2019 - 04 - 21)));
        assert_eq!(easter_sunday(2024), Some(date!(2024 - 03 - 31)));
        assert_eq!(easter_sunday(2025), Some(date!(2025 - 04 - 20)));
    }

    #[test]
    fn ontario_2019_calendar() {
        let days = ontario_holidays(2019);
        for d in [
            date!(2019 - 01 - 01),
            date!(2019 - 02 - 18),
            date!(2019 - 04 - 19),
            date!(2019 - 05 - 20),
            date!(2019 - 07 - 01),
            date!(2019 - 08 - 05),
            date!(2019 - 09 - 02),
            date!(2019 - 10 - 14),
            date!(2019 - 12 - 25),
            date!(2019 - 12 - 26),
        ] {
            assert!(days.contains(&d), "missing {d}");
        }
        assert_eq!(days.len(), 10);
    }

    #[test]
    fn victoria_day_when_may_24_is_monday() {
        // 2021-05-24 was a Monday.
        assert_eq!(victoria_day(2021), Some(date!(2021 - 05 - 24)));
    }

    #[test]
    fn weekend_holidays_get_observed_weekday() {
        // Canada Day 2018 fell on a Sunday.
        assert!(is_ontario_holiday(date!(2018 - 07 - 02)));
        // Christmas 2021 fell on a Saturday.
        assert!(is_ontario_holiday(date!(2021 - 12 - 27)));
        assert!(is_ontario_holiday(date!(2021 - 12 - 28)));
        // Christmas 2022 fell on a Sunday; Boxing Day Monday, observed Christmas Tuesday.
        assert!(is_ontario_holiday(date!(2022 - 12 - 26)));
        assert!(is_ontario_holiday(date!(2022 - 12 - 27)));
    }

    #[test]
    fn family_day_starts_in_2008() {
        assert!(!is_ontario_holiday(date!(2007 - 02 - 19)));
        assert!(is_ontario_holiday(date!(2008 - 02 - 18)));
    }

    #[test]
    fn ordinary_weekday_is_not_a_holiday() {
        assert!(!is_ontario_holiday(date!(2019 - 11 - 05)));
    }
}
