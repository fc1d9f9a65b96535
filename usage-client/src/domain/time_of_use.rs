use serde::Serialize;
use time::{Month, PrimitiveDateTime, Weekday};

use super::holidays::is_ontario_holiday;

/// Ontario time-of-use price period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TimeOfUse {
    #[serde(rename = "On-peak")]
    OnPeak,
    #[serde(rename = "Mid-peak")]
    MidPeak,
    #[serde(rename = "Off-peak")]
    OffPeak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Winter,
    Summer,
}

impl Season {
    /// November through April is winter.
    pub fn of(month: Month) -> Self {
        match month {
            Month::November | Month::December | Month::January | Month::February | Month::March | Month::April => {
                Season::Winter
            }
            _ => Season::Summer,
        }
    }
}

impl TimeOfUse {
    pub const ALL: [TimeOfUse; 3] = [TimeOfUse::OnPeak, TimeOfUse::MidPeak, TimeOfUse::OffPeak];

    /// Classify a local interval start.
    ///
    /// Weekends, holidays and 19:00-07:00 are always off-peak. The morning
    /// (07-11) and evening (17-19) shoulders are on-peak in winter and
    /// mid-peak in summer; midday (11-17) is the reverse.
    pub fn classify(ts: PrimitiveDateTime) -> Self {
        let hour = ts.hour();
        let weekend = matches!(ts.weekday(), Weekday::Saturday | Weekday::Sunday);

        if weekend || !(7..19).contains(&hour) || is_ontario_holiday(ts.date()) {
            return TimeOfUse::OffPeak;
        }

        let winter = Season::of(ts.month()) == Season::Winter;
        let shoulder = (7..11).contains(&hour) || (17..19).contains(&hour);

        match (shoulder, winter) {
            (true, true) | (false, false) => TimeOfUse::OnPeak,
            (true, false) | (false, true) => TimeOfUse::MidPeak,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeOfUse::OnPeak => "On-peak",
            TimeOfUse::MidPeak => "Mid-peak",
            TimeOfUse::OffPeak => "Off-peak",
        }
    }

    /// Chart colour, matching the provider's bill.
    pub fn color(self) -> &'static str {
        match self {
            TimeOfUse::OnPeak => "#cb5b29",
            TimeOfUse::MidPeak => "#fac90a",
            TimeOfUse::OffPeak => "#98c23c",
        }
    }
}

impl std::fmt::Display for TimeOfUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
