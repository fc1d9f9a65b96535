use dom_query::{Document, Selection};
use serde_json::Value;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};
use usage_client::UsageRecord;

use super::ScrapeError;

const DATETIME_FORMATS: &[&[FormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]:[second]"),
    format_description!("[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]"),
];

const DATE_FORMATS: &[&[FormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day]"),
    format_description!("[month padding:none]/[day padding:none]/[year]"),
];

/// Parse whatever the usage endpoint returned into records.
///
/// The export is normally CSV. HTML is accepted when it embeds the figures
/// either as a JSON `<script>` payload or as a table with `Date` and
/// `Quantity` columns. A login page, a page without usage markup, or usage
/// markup without rows is an error; this never returns an empty `Vec`.
pub fn parse_usage_document(body: &str) -> Result<Vec<UsageRecord>, ScrapeError> {
    let trimmed = body.trim_start_matches('\u{feff}').trim_start();
    if trimmed.is_empty() {
        return Err(ScrapeError::NoUsageData("empty response body".to_string()));
    }

    if trimmed.starts_with('<') {
        parse_html(trimmed)
    } else {
        parse_csv(trimmed)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<PrimitiveDateTime> {
    let s = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| PrimitiveDateTime::parse(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| Date::parse(s, f).ok())
                .map(Date::midnight)
        })
}

/// Numbers may carry a currency sign, thousands separators or a unit.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c.is_whitespace())
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned.parse().ok()
}

fn build_record(row: usize, date: &str, quantity: &str, cost: Option<&str>) -> Result<UsageRecord, ScrapeError> {
    let invalid = |column: &'static str, value: &str| ScrapeError::InvalidValue {
        row,
        column,
        value: value.to_string(),
    };

    let ts = parse_timestamp(date).ok_or_else(|| invalid("date", date))?;
    let quantity_kwh = parse_number(quantity).ok_or_else(|| invalid("quantity", quantity))?;
    let cost = match cost.map(str::trim) {
        None | Some("") => None,
        Some(c) => Some(parse_number(c).ok_or_else(|| invalid("cost", c))?),
    };

    Ok(UsageRecord::new(ts, quantity_kwh, cost))
}

fn column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
}

fn parse_csv(body: &str) -> Result<Vec<UsageRecord>, ScrapeError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| ScrapeError::UnexpectedMarkup(format!("failed to read CSV headers: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let (Some(date_idx), Some(qty_idx)) = (column(&headers, &["Date"]), column(&headers, &["Quantity"])) else {
        return Err(ScrapeError::UnexpectedMarkup(format!(
            "CSV export lacks Date/Quantity columns (found: {})",
            headers.join(", ")
        )));
    };
    let cost_idx = column(&headers, &["Cost"]);

    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = i + 1;
        let record = result
            .map_err(|e| ScrapeError::UnexpectedMarkup(format!("failed to read CSV row {row}: {e}")))?;

        // Trailing blank lines come through as a single empty field.
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let date = record.get(date_idx).unwrap_or("");
        let quantity = record.get(qty_idx).unwrap_or("");
        let cost = cost_idx.and_then(|idx| record.get(idx));
        records.push(build_record(row, date, quantity, cost)?);
    }

    non_empty(records, "CSV export has a header but no rows")
}

fn parse_html(body: &str) -> Result<Vec<UsageRecord>, ScrapeError> {
    let doc = Document::from(body);

    if doc.select(r#"input[type="password"]"#).length() > 0 {
        return Err(ScrapeError::UnexpectedMarkup(
            "received a login page instead of usage data".to_string(),
        ));
    }

    let payload = parse_json_payloads(&doc)?;
    let empty_payload = match payload {
        Some(records) if !records.is_empty() => return Ok(records),
        Some(_) => true,
        None => false,
    };

    if let Some(records) = parse_usage_table(&doc)? {
        return non_empty(records, "usage table has no rows");
    }

    if empty_payload {
        return Err(ScrapeError::NoUsageData("embedded usage payload is empty".to_string()));
    }

    Err(ScrapeError::UnexpectedMarkup(
        "page contains neither a usage table nor an embedded usage payload".to_string(),
    ))
}

fn non_empty(records: Vec<UsageRecord>, what: &str) -> Result<Vec<UsageRecord>, ScrapeError> {
    if records.is_empty() {
        Err(ScrapeError::NoUsageData(what.to_string()))
    } else {
        Ok(records)
    }
}

/// First `<script type="application/json">` that holds a non-empty array of
/// usage objects, either bare or under a `usage`/`data` key. `Some(vec![])`
/// when only empty payloads were found.
fn parse_json_payloads(doc: &Document) -> Result<Option<Vec<UsageRecord>>, ScrapeError> {
    let mut saw_empty = false;
    for node in doc.select(r#"script[type="application/json"]"#).nodes() {
        let script = Selection::from(*node);
        let text = script.text();
        let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
            continue;
        };

        let rows = match &value {
            Value::Array(rows) => rows,
            Value::Object(map) => match map
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("usage") || k.eq_ignore_ascii_case("data"))
            {
                Some((_, Value::Array(rows))) => rows,
                _ => continue,
            },
            _ => continue,
        };

        if rows.is_empty() {
            saw_empty = true;
            continue;
        }
        if !rows.iter().all(looks_like_usage) {
            continue;
        }

        let records = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let get = |names: &[&str]| json_field(row, names);
                let date = get(&["date", "ts"]).unwrap_or_default();
                let quantity = get(&["quantity", "usage", "kwh"]).unwrap_or_default();
                let cost = get(&["cost"]);
                build_record(i + 1, &date, &quantity, cost.as_deref())
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Some(records));
    }

    Ok(saw_empty.then(Vec::new))
}

fn looks_like_usage(row: &Value) -> bool {
    json_field(row, &["date", "ts"]).is_some() && json_field(row, &["quantity", "usage", "kwh"]).is_some()
}

fn json_field(row: &Value, names: &[&str]) -> Option<String> {
    let obj = row.as_object()?;
    let (_, v) = obj
        .iter()
        .find(|(k, _)| names.iter().any(|n| k.eq_ignore_ascii_case(n)))?;
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First table whose header row names a date and a quantity column.
fn parse_usage_table(doc: &Document) -> Result<Option<Vec<UsageRecord>>, ScrapeError> {
    for node in doc.select("table").nodes() {
        let table = Selection::from(*node);
        let rows: Vec<Vec<String>> = table
            .select("tr")
            .nodes()
            .iter()
            .map(|tr| {
                Selection::from(*tr)
                    .select("th, td")
                    .nodes()
                    .iter()
                    .map(|cell| Selection::from(*cell).text().trim().to_string())
                    .collect()
            })
            .collect();

        let Some((headers, body)) = rows.split_first() else {
            continue;
        };
        let (Some(date_idx), Some(qty_idx)) = (
            column(headers, &["Date"]),
            column(headers, &["Quantity", "Usage", "Usage (kWh)", "kWh"]),
        ) else {
            continue;
        };
        let cost_idx = column(headers, &["Cost", "Cost ($)"]);

        let records = body
            .iter()
            .enumerate()
            .filter(|(_, cells)| !cells.iter().all(String::is_empty))
            .map(|(i, cells)| {
                let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("");
                build_record(i + 1, cell(date_idx), cell(qty_idx), cost_idx.map(cell))
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Some(records));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const EXPORT_CSV: &str = "\
Account,Meter,Date,Duration,Quantity,Unit,Cost
123,M1,2019-11-03 00:00:00,3600,0.52,kWh,0.04
123,M1,2019-11-03 01:00:00,7200,1.10,kWh,0.09
123,M1,2019-11-04 08:00:00,3600,0.75,kWh,$0.15
";

    #[test]
    fn parses_portal_csv_export() {
        let records = parse_usage_document(EXPORT_CSV).unwrap();
        let pairs: Vec<(PrimitiveDateTime, f64)> = records.iter().map(|r| (r.ts, r.quantity_kwh)).collect();
        assert_eq!(
            pairs,
            vec![
                (datetime!(2019-11-03 00:00), 0.52),
                (datetime!(2019-11-03 01:00), 1.10),
                (datetime!(2019-11-04 08:00), 0.75),
            ]
        );
        assert_eq!(records[2].cost, Some(0.15));
    }

    #[test]
    fn csv_without_cost_column_has_no_cost() {
        let records = parse_usage_document("Date,Quantity\n2019-11-03,12.5\n\n").unwrap();
        assert_eq!(records, vec![UsageRecord::new(datetime!(2019-11-03 0:00), 12.5, None)]);
    }

    #[test]
    fn csv_missing_quantity_column_is_unexpected_markup() {
        let err = parse_usage_document("Date,Amount\n2019-11-03,1\n").unwrap_err();
        assert!(matches!(err, ScrapeError::UnexpectedMarkup(_)));
    }

    #[test]
    fn csv_header_only_is_no_usage_data() {
        let err = parse_usage_document("Date,Quantity,Cost\n").unwrap_err();
        assert!(matches!(err, ScrapeError::NoUsageData(_)));
    }

    #[test]
    fn csv_bad_quantity_names_row_and_column() {
        let err = parse_usage_document("Date,Quantity\n2019-11-03,1\n2019-11-04,n/a\n").unwrap_err();
        match err {
            ScrapeError::InvalidValue { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "quantity");
                assert_eq!(value, "n/a");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    const USAGE_TABLE_PAGE: &str = r#"
        <html><body>
          <table class="nav"><tr><td>Home</td><td>Bills</td></tr></table>
          <table id="usage">
            <thead><tr><th>Date</th><th>Usage (kWh)</th><th>Cost ($)</th></tr></thead>
            <tbody>
              <tr><td>11/01/2019</td><td>14.2</td><td>$1.87</td></tr>
              <tr><td>11/02/2019</td><td>1,012.0</td><td></td></tr>
            </tbody>
          </table>
        </body></html>
    "#;

    #[test]
    fn parses_usage_table_fixture() {
        let records = parse_usage_document(USAGE_TABLE_PAGE).unwrap();
        assert_eq!(
            records,
            vec![
                UsageRecord::new(datetime!(2019-11-01 0:00), 14.2, Some(1.87)),
                UsageRecord::new(datetime!(2019-11-02 0:00), 1012.0, None),
            ]
        );
    }

    const JSON_PAYLOAD_PAGE: &str = r#"
        <html><head>
          <script type="application/json" id="config">{"locale": "en-CA"}</script>
          <script type="application/json" id="usage-data">
            {"usage": [
              {"date": "2019-11-05T07:00:00", "quantity": 0.8, "cost": 0.11},
              {"date": "2019-11-05T08:00:00", "quantity": "0.6"}
            ]}
          </script>
        </head><body><div id="chart"></div></body></html>
    "#;

    #[test]
    fn parses_embedded_json_payload() {
        let records = parse_usage_document(JSON_PAYLOAD_PAGE).unwrap();
        assert_eq!(
            records,
            vec![
                UsageRecord::new(datetime!(2019-11-05 07:00), 0.8, Some(0.11)),
                UsageRecord::new(datetime!(2019-11-05 08:00), 0.6, None),
            ]
        );
    }

    #[test]
    fn empty_payload_does_not_hide_usage_table() {
        let html = r#"<html><head>
            <script type="application/json">{"data": []}</script>
          </head><body><table>
            <tr><th>Date</th><th>Quantity</th></tr>
            <tr><td>2019-11-05</td><td>3.5</td></tr>
          </table></body></html>"#;
        let records = parse_usage_document(html).unwrap();
        assert_eq!(records, vec![UsageRecord::new(datetime!(2019-11-05 0:00), 3.5, None)]);
    }

    #[test]
    fn empty_payload_alone_is_no_usage_data() {
        let html = r#"<html><script type="application/json">{"usage": []}</script></html>"#;
        assert!(matches!(
            parse_usage_document(html),
            Err(ScrapeError::NoUsageData(_))
        ));
    }

    #[test]
    fn login_page_is_not_usage_data() {
        let html = r#"<html><form name="aspnetForm"><input type="password" name="p"></form></html>"#;
        assert!(matches!(
            parse_usage_document(html),
            Err(ScrapeError::UnexpectedMarkup(_))
        ));
    }

    #[test]
    fn page_without_usage_markup_fails() {
        let html = "<html><body><p>Your usage will be available soon.</p></body></html>";
        assert!(matches!(
            parse_usage_document(html),
            Err(ScrapeError::UnexpectedMarkup(_))
        ));
    }

    #[test]
    fn empty_usage_table_is_no_usage_data() {
        let html = "<table><tr><th>Date</th><th>Quantity</th></tr></table>";
        assert!(matches!(
            parse_usage_document(html),
            Err(ScrapeError::NoUsageData(_))
        ));
    }

    #[test]
    fn empty_body_is_no_usage_data() {
        assert!(matches!(
            parse_usage_document("  \n"),
            Err(ScrapeError::NoUsageData(_))
        ));
    }

    #[test]
    fn number_and_timestamp_formats() {
        assert_eq!(parse_number("$1,234.50"), Some(1234.5));
        assert_eq!(parse_number("0.42 kWh"), Some(0.42));
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_timestamp("2019-11-03 01:00"), Some(datetime!(2019-11-03 01:00)));
        assert_eq!(parse_timestamp("7/4/2019 9:00"), Some(datetime!(2019-07-04 09:00)));
        assert_eq!(parse_timestamp("2019-11-03"), Some(datetime!(2019-11-03 0:00)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
