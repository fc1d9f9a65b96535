use time::format_description::FormatItem;
use time::macros::{datetime, format_description};
use time::{OffsetDateTime, PrimitiveDateTime};

use super::eastern_time;

/// One interval of metered consumption as exported by the portal.
///
/// `ts` is the local (Toronto) wall-clock start of the interval. Daily
/// exports carry midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub ts: PrimitiveDateTime,
    pub quantity_kwh: f64,
    pub cost: Option<f64>,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum UsageError {
    #[error("quantity must be a non-negative number, got {0}")]
    InvalidQuantity(f64),
    #[error("cost must be a non-negative number, got {0}")]
    InvalidCost(f64),
    #[error("timestamp {0} out of allowed range")]
    TimestampOutOfRange(PrimitiveDateTime),
}

impl UsageRecord {
    pub fn new(ts: PrimitiveDateTime, quantity_kwh: f64, cost: Option<f64>) -> Self {
        Self {
            ts,
            quantity_kwh,
            cost,
        }
    }

    /// Rules:
    /// - quantity and cost must be finite and non-negative.
    /// - ts must be within [2000-01-01, 2100-01-01).
    pub fn validate(&self) -> Result<(), UsageError> {
        if !self.quantity_kwh.is_finite() || self.quantity_kwh < 0.0 {
            return Err(UsageError::InvalidQuantity(self.quantity_kwh));
        }

        if let Some(cost) = self.cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(UsageError::InvalidCost(cost));
            }
        }

        let min_ts = datetime!(2000-01-01 00:00:00);
        let max_ts = datetime!(2100-01-01 00:00:00);

        if self.ts < min_ts || self.ts >= max_ts {
            return Err(UsageError::TimestampOutOfRange(self.ts));
        }

        Ok(())
    }

    /// The interval start as an absolute instant in Toronto time.
    pub fn instant(&self) -> OffsetDateTime {
        eastern_time::to_offset_datetime(self.ts)
    }

    /// `YYYY-MM-DDTHH:MM:SS` without offset, read as local time by browsers.
    pub fn local_iso(&self) -> String {
        format_local(self.ts)
    }
}

const LOCAL_ISO: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

pub fn format_local(ts: PrimitiveDateTime) -> String {
    // Every component is present on a PrimitiveDateTime, so this cannot fail.
    ts.format(LOCAL_ISO).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_validation_accepts_valid_record() {
        let rec = UsageRecord::new(datetime!(2024-01-01 00:00:00), 1.0, Some(0.12));
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn usage_validation_accepts_missing_cost() {
        let rec = UsageRecord::new(datetime!(2024-01-01 00:00:00), 0.0, None);
        assert!(rec.validate().is_ok());
    }

    #[test]
    fn usage_validation_rejects_negative_quantity() {
        let rec = UsageRecord::new(datetime!(2024-01-01 00:00:00), -0.1, None);
        assert_eq!(rec.validate(), Err(UsageError::InvalidQuantity(-0.1)));
    }

    #[test]
    fn usage_validation_rejects_nan_cost() {
        let rec = UsageRecord::new(datetime!(2024-01-01 00:00:00), 1.0, Some(f64::NAN));
        assert!(matches!(rec.validate(), Err(UsageError::InvalidCost(_))));
    }

    #[test]
    fn usage_validation_rejects_out_of_range_ts() {
        let rec = UsageRecord::new(datetime!(1800-01-01 00:00:00), 1.0, None);
        assert!(matches!(
            rec.validate(),
            Err(UsageError::TimestampOutOfRange(_))
        ));
    }

    #[test]
    fn local_iso_is_zero_padded() {
        let rec = UsageRecord::new(datetime!(2019-03-05 07:00:00), 1.0, None);
        assert_eq!(rec.local_iso(), "2019-03-05T07:00:00");
    }

    #[test]
    fn format_local_pads_every_component() {
        assert_eq!(format_local(datetime!(2021-01-02 03:04:05)), "2021-01-02T03:04:05");
    }

    #[test]
    fn instant_carries_eastern_offset() {
        let rec = UsageRecord::new(datetime!(2019-07-05 07:00:00), 1.0, None);
        assert_eq!(rec.instant().offset(), eastern_time::EDT);
    }
}
