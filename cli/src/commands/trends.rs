use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use glucose_core::GlucoseService;
use glucose_core::trends::TrendStats;
use glucose_core::units::format_value;

use super::helpers::{context_label, format_time, parse_window, prefs};

#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Context")]
    context: String,
}

pub(crate) async fn cmd_trends(
    service: &GlucoseService,
    range: &str,
    from: Option<String>,
    to: Option<String>,
    json: bool,
) -> Result<()> {
    let window = parse_window(range, from, to)?;
    let report = service.trends(window).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let unit = report.unit;
    println!(
        "{} ({} to {})",
        window.label(),
        format_time(report.start),
        format_time(report.end)
    );

    let TrendStats::Summary {
        avg,
        min,
        max,
        count,
    } = report.stats
    else {
        eprintln!("No data for this period.");
        return Ok(());
    };

    let language = prefs(service).await?.language;
    let rows: Vec<PointRow> = report
        .points
        .iter()
        .map(|p| PointRow {
            time: format_time(p.timestamp),
            value: format_value(p.value, unit),
            context: context_label(p.context, language).to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(1)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!(
        "{count} reading(s)  avg {}  min {}  max {}  ({unit})",
        format_value(avg, unit),
        format_value(min, unit),
        format_value(max, unit),
    );

    Ok(())
}
