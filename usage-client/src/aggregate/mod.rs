use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use time::{Date, PrimitiveDateTime};

use crate::domain::usage_record::format_local;
use crate::domain::{TimeOfUse, UsageRecord};

/// Width of the time bins on the chart's x axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBin {
    #[default]
    Hourly,
    Daily,
    Monthly,
    Yearly,
}

impl TimeBin {
    pub const ALL: [TimeBin; 4] = [TimeBin::Hourly, TimeBin::Daily, TimeBin::Monthly, TimeBin::Yearly];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeBin::Hourly => "hourly",
            TimeBin::Daily => "daily",
            TimeBin::Monthly => "monthly",
            TimeBin::Yearly => "yearly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeBin::Hourly => "Hourly",
            TimeBin::Daily => "Daily",
            TimeBin::Monthly => "Monthly",
            TimeBin::Yearly => "Yearly",
        }
    }

    /// Vega-Lite `timeUnit` used to label the axis; `None` keeps raw timestamps.
    pub fn vega_time_unit(self) -> Option<&'static str> {
        match self {
            TimeBin::Hourly => None,
            TimeBin::Daily => Some("yearmonthdate"),
            TimeBin::Monthly => Some("yearmonth"),
            TimeBin::Yearly => Some("year"),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseChoiceError {
    kind: &'static str,
    value: String,
}

impl FromStr for TimeBin {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeBin::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseChoiceError {
                kind: "time bin",
                value: s.to_string(),
            })
    }
}

/// Quantity plotted on the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cost,
    Quantity,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Cost, Metric::Quantity];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Cost => "cost",
            Metric::Quantity => "quantity",
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            Metric::Cost => "Cost",
            Metric::Quantity => "Quantity",
        }
    }

    pub fn axis_title(self) -> &'static str {
        match self {
            Metric::Cost => "Cost ($)",
            Metric::Quantity => "Quantity (kW h)",
        }
    }
}

impl FromStr for Metric {
    type Err = ParseChoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseChoiceError {
                kind: "metric",
                value: s.to_string(),
            })
    }
}

/// Summed usage for one (bin, time-of-use) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageBucket {
    #[serde(serialize_with = "serialize_local")]
    pub start: PrimitiveDateTime,
    pub time_of_use: TimeOfUse,
    pub quantity_kwh: f64,
    pub cost: Option<f64>,
    pub records: usize,
}

fn serialize_local<S: Serializer>(ts: &PrimitiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_local(*ts))
}

/// Truncate `ts` to the start of its bin.
pub fn bin_start(ts: PrimitiveDateTime, bin: TimeBin) -> PrimitiveDateTime {
    let date = ts.date();
    match bin {
        TimeBin::Hourly => date.with_hms(ts.hour(), 0, 0).unwrap_or(ts),
        TimeBin::Daily => date.midnight(),
        TimeBin::Monthly => Date::from_calendar_date(date.year(), date.month(), 1)
            .map(Date::midnight)
            .unwrap_or(ts),
        TimeBin::Yearly => Date::from_ordinal_date(date.year(), 1)
            .map(Date::midnight)
            .unwrap_or(ts),
    }
}

/// Group records by (bin start, time-of-use), summing quantity and cost.
///
/// Hourly keeps one bucket per record, in input order. Other bins are ordered
/// by start, then On/Mid/Off. A bucket's cost is `None` only if none of its
/// records had one.
pub fn aggregate(records: &[UsageRecord], bin: TimeBin) -> Vec<UsageBucket> {
    if bin == TimeBin::Hourly {
        return records
            .iter()
            .map(|r| UsageBucket {
                start: r.ts,
                time_of_use: TimeOfUse::classify(r.ts),
                quantity_kwh: r.quantity_kwh,
                cost: r.cost,
                records: 1,
            })
            .collect();
    }

    let mut groups: BTreeMap<(PrimitiveDateTime, TimeOfUse), UsageBucket> = BTreeMap::new();
    for r in records {
        let start = bin_start(r.ts, bin);
        let tou = TimeOfUse::classify(r.ts);
        let bucket = groups.entry((start, tou)).or_insert_with(|| UsageBucket {
            start,
            time_of_use: tou,
            quantity_kwh: 0.0,
            cost: None,
            records: 0,
        });
        bucket.quantity_kwh += r.quantity_kwh;
        if let Some(c) = r.cost {
            bucket.cost = Some(bucket.cost.unwrap_or(0.0) + c);
        }
        bucket.records += 1;
    }

    groups.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TouShare {
    pub time_of_use: TimeOfUse,
    pub quantity_kwh: f64,
    pub share: f64,
}

/// Totals over a whole dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSummary {
    pub records: usize,
    #[serde(serialize_with = "serialize_opt_local")]
    pub first: Option<PrimitiveDateTime>,
    #[serde(serialize_with = "serialize_opt_local")]
    pub last: Option<PrimitiveDateTime>,
    pub total_kwh: f64,
    pub total_cost: f64,
    pub by_time_of_use: Vec<TouShare>,
}

fn serialize_opt_local<S: Serializer>(ts: &Option<PrimitiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
    match ts {
        Some(ts) => s.serialize_some(&format_local(*ts)),
        None => s.serialize_none(),
    }
}

pub fn summarize(records: &[UsageRecord]) -> UsageSummary {
    let total_kwh: f64 = records.iter().map(|r| r.quantity_kwh).sum();
    let total_cost: f64 = records.iter().filter_map(|r| r.cost).sum();

    let by_time_of_use = TimeOfUse::ALL
        .into_iter()
        .map(|tou| {
            let kwh: f64 = records
                .iter()
                .filter(|r| TimeOfUse::classify(r.ts) == tou)
                .map(|r| r.quantity_kwh)
                .sum();
            TouShare {
                time_of_use: tou,
                quantity_kwh: kwh,
                share: if total_kwh > 0.0 { kwh / total_kwh } else { 0.0 },
            }
        })
        .collect();

    UsageSummary {
        records: records.len(),
        first: records.iter().map(|r| r.ts).min(),
        last: records.iter().map(|r| r.ts).max(),
        total_kwh,
        total_cost,
        by_time_of_use,
    }
}
