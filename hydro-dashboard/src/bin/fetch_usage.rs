use std::io;

use time::format_description::well_known::Rfc3339;
use time::UtcOffset;

use anyhow::Result;
use hydro_dashboard::{
    config::AppConfig,
    load_dataset, observability,
};
use usage_client::{TimeOfUse, UsageRecord};

const HEADER: [&str; 5] = ["date", "timestamp_utc", "quantity_kwh", "cost", "time_of_use"];

fn usage_row(record: &UsageRecord, tou: TimeOfUse) -> Result<[String; 5], time::error::Format> {
    Ok([
        record.local_iso(),
        record.instant().to_offset(UtcOffset::UTC).format(&Rfc3339)?,
        record.quantity_kwh.to_string(),
        record.cost.map(|c| c.to_string()).unwrap_or_default(),
        tou.label().to_string(),
    ])
}

/// Fetch once and print the usage records as CSV on stdout.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let credentials = cfg.credentials()?;

    let dataset = load_dataset(&cfg, credentials.as_ref()).await?;

    let mut wtr = csv::Writer::from_writer(io::stdout().lock());
    wtr.write_record(HEADER)?;
    for (record, tou) in dataset.rows() {
        wtr.write_record(usage_row(record, tou)?)?;
    }
    wtr.flush()?;

    tracing::info!(records = dataset.records.len(), "usage written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn row_carries_utc_instant() {
        let rec = UsageRecord::new(datetime!(2019-11-05 08:00), 0.75, Some(0.15));
        let row = usage_row(&rec, TimeOfUse::classify(rec.ts)).unwrap();
        assert_eq!(row[0], "2019-11-05T08:00:00");
        assert_eq!(row[1], "2019-11-05T13:00:00Z");
        assert_eq!(row[4], "On-peak");
    }

    #[test]
    fn summer_row_uses_daylight_offset() {
        let rec = UsageRecord::new(datetime!(2019-07-05 22:00), 1.0, None);
        let row = usage_row(&rec, TimeOfUse::classify(rec.ts)).unwrap();
        assert_eq!(row[1], "2019-07-06T02:00:00Z");
        assert_eq!(row[3], "");
    }
}
