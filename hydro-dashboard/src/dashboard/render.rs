//! Server-side HTML for the dashboard. The chart itself is a Vega-Lite spec
//! rendered in the browser by vega-embed.

use std::fmt::Write;

use serde_json::{json, Value};
use usage_client::{aggregate, Metric, TimeBin, TimeOfUse, UsageBucket};

use crate::sinks::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct View {
    pub metric: Metric,
    pub bin: TimeBin,
    pub show_table: bool,
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Vega-Lite bar chart: time on x, the metric on y, stacked by time-of-use.
/// Zoom and pan are bound to the x scale only.
pub fn chart_spec(buckets: &[UsageBucket], view: View) -> Value {
    let values: Vec<Value> = buckets
        .iter()
        .map(|b| {
            json!({
                "Time": usage_client::format_local(b.start),
                "Time-of-use": b.time_of_use.label(),
                "Quantity": b.quantity_kwh,
                "Cost": b.cost,
            })
        })
        .collect();

    let mut x = json!({ "field": "Time", "type": "temporal", "title": "Time" });
    if let Some(unit) = view.bin.vega_time_unit() {
        x["timeUnit"] = json!(unit);
    }

    json!({
        "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
        "width": "container",
        "height": 400,
        "data": { "values": values },
        "mark": "bar",
        "params": [{
            "name": "zoom",
            "select": { "type": "interval", "encodings": ["x"] },
            "bind": "scales"
        }],
        "encoding": {
            "x": x,
            "y": {
                "field": view.metric.field(),
                "type": "quantitative",
                "title": view.metric.axis_title()
            },
            "color": {
                "field": "Time-of-use",
                "type": "nominal",
                "scale": {
                    "domain": TimeOfUse::ALL.map(TimeOfUse::label),
                    "range": TimeOfUse::ALL.map(TimeOfUse::color)
                }
            },
            "tooltip": [
                { "field": "Time", "type": "temporal" },
                { "field": "Cost", "type": "quantitative" },
                { "field": "Quantity", "type": "quantitative" }
            ]
        }
    })
}

/// JSON safe to inline in a `<script>` element.
fn script_json(v: &Value) -> String {
    v.to_string().replace("</", "<\\/")
}

fn query(view: View, refresh: bool) -> String {
    let mut q = format!("?metric={}&bin={}", view.metric.as_str(), view.bin.as_str());
    if view.show_table {
        q.push_str("&table=true");
    }
    if refresh {
        q.push_str("&refresh=true");
    }
    q
}

fn sidebar(view: View) -> String {
    let mut html = String::from(r#"<aside><form method="get" action="/">"#);

    html.push_str("<fieldset><legend>Which quantity to plot on the vertical axis?</legend>");
    for m in Metric::ALL {
        let checked = if m == view.metric { " checked" } else { "" };
        let _ = write!(
            html,
            r#"<label><input type="radio" name="metric" value="{}"{checked}> {}</label><br>"#,
            m.as_str(),
            escape(m.axis_title())
        );
    }
    html.push_str("</fieldset>");

    html.push_str("<fieldset><legend>In what intervals should time be binned?</legend>");
    for b in TimeBin::ALL {
        let checked = if b == view.bin { " checked" } else { "" };
        let _ = write!(
            html,
            r#"<label><input type="radio" name="bin" value="{}"{checked}> {}</label><br>"#,
            b.as_str(),
            b.label()
        );
    }
    html.push_str("</fieldset>");

    let checked = if view.show_table { " checked" } else { "" };
    let _ = write!(
        html,
        r#"<label><input type="checkbox" name="table" value="true"{checked}> Show data table</label>"#
    );
    html.push_str(r#"<p><button type="submit">Update</button></p></form>"#);
    let _ = write!(html, r#"<p><a href="/{}">Reload data from the portal</a></p></aside>"#, query(view, true));
    html
}

fn summary_line(dataset: &Dataset) -> String {
    let s = dataset.summary();
    let span = match (s.first, s.last) {
        (Some(first), Some(last)) => format!(
            " from {} to {}",
            usage_client::format_local(first),
            usage_client::format_local(last)
        ),
        _ => String::new(),
    };
    let shares: Vec<String> = s
        .by_time_of_use
        .iter()
        .map(|t| format!("{} {:.0}%", t.time_of_use, t.share * 100.0))
        .collect();

    format!(
        "{} readings{span}: {:.1} kWh, ${:.2}. {}.",
        s.records,
        s.total_kwh,
        s.total_cost,
        shares.join(", ")
    )
}

fn data_table(dataset: &Dataset) -> String {
    let mut html = String::from(
        "<table><thead><tr><th>Date</th><th>Cost</th><th>Quantity</th><th>Time-of-use</th></tr></thead><tbody>",
    );
    for (r, tou) in dataset.rows() {
        let cost = r.cost.map(|c| format!("{c:.2}")).unwrap_or_default();
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{cost}</td><td>{:.3}</td><td>{tou}</td></tr>",
            r.local_iso(),
            r.quantity_kwh
        );
    }
    html.push_str("</tbody></table>");
    html
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="https://cdn.jsdelivr.net/npm/vega@5"></script>
<script src="https://cdn.jsdelivr.net/npm/vega-lite@5"></script>
<script src="https://cdn.jsdelivr.net/npm/vega-embed@6"></script>
<style>
body {{ font-family: sans-serif; margin: 0; display: flex; }}
aside {{ width: 18rem; padding: 1rem; background: #f0f2f6; min-height: 100vh; }}
main {{ flex: 1; padding: 1rem 2rem; }}
#chart {{ width: 100%; }}
table {{ border-collapse: collapse; font-size: 0.9rem; }}
td, th {{ padding: 0.2rem 0.6rem; border-bottom: 1px solid #ddd; text-align: right; }}
.error {{ color: #a00; white-space: pre-wrap; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title)
    )
}

pub fn dashboard_page(title: &str, dataset: &Dataset, view: View) -> String {
    let buckets = aggregate(&dataset.records, view.bin);
    let spec = chart_spec(&buckets, view);

    let mut main = format!(
        "<main><h1>{}</h1><p>Visualizes data from Toronto Hydro usage.</p><p>{}</p><div id=\"chart\"></div>",
        escape(title),
        escape(&summary_line(dataset))
    );
    let _ = write!(
        main,
        "<script>vegaEmbed('#chart', {}, {{ actions: false }});</script>",
        script_json(&spec)
    );
    if view.show_table {
        main.push_str(&data_table(dataset));
    }
    main.push_str("</main>");

    layout(title, &format!("{}{main}", sidebar(view)))
}

pub fn error_page(title: &str, message: &str, view: View) -> String {
    let main = format!(
        "<main><h1>{}</h1><h2>Could not load usage data</h2><p class=\"error\">{}</p><p><a href=\"/{}\">Try again</a></p></main>",
        escape(title),
        escape(message),
        query(view, true)
    );
    layout(title, &format!("{}{main}", sidebar(view)))
}
