use anyhow::Result;

use glucose_core::GlucoseService;
use glucose_core::trends::TrendStats;
use glucose_core::units::{format_value, to_display};

use super::helpers::{
    context_label, direction_label, format_time, prefs, print_reading_table, status_label,
};

pub(crate) async fn cmd_history(service: &GlucoseService, json: bool) -> Result<()> {
    let days = service.history().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&days)?);
    } else if days.is_empty() {
        eprintln!("No readings yet. Use `glucose log <value>` to record one.");
    } else {
        let language = prefs(service).await?.language;
        for day in &days {
            println!("{}", day.date.format("%A, %Y-%m-%d"));
            print_reading_table(&day.readings, language);
            println!();
        }
    }

    Ok(())
}

pub(crate) async fn cmd_dashboard(service: &GlucoseService, json: bool) -> Result<()> {
    let dashboard = service.dashboard().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
        return Ok(());
    }

    let language = prefs(service).await?.language;
    let unit = dashboard.unit;
    match dashboard.name.as_deref() {
        Some(name) => println!("Hello, {name}"),
        None => println!("Hello"),
    }

    let Some(latest) = &dashboard.latest else {
        eprintln!("No readings yet. Use `glucose log <value>` to record one.");
        return Ok(());
    };
    println!();
    println!(
        "Latest: {} {unit} {} {} ({}, {})",
        format_value(latest.reading.value, unit),
        latest.direction.arrow(),
        direction_label(latest.direction, language),
        context_label(latest.reading.context, language),
        status_label(latest.status, language),
    );
    println!("  at {}", format_time(latest.reading.timestamp));
    println!(
        "  Target: {}-{} {unit}",
        format_value(to_display(dashboard.target_range.min, unit), unit),
        format_value(to_display(dashboard.target_range.max, unit), unit),
    );

    println!();
    match dashboard.today {
        TrendStats::NoData => println!("Today: no readings"),
        TrendStats::Summary {
            avg,
            min,
            max,
            count,
        } => println!(
            "Today: {count} reading(s), avg {} / min {} / max {} {unit}",
            format_value(avg, unit),
            format_value(min, unit),
            format_value(max, unit),
        ),
    }

    println!();
    println!("Recent:");
    print_reading_table(&dashboard.recent, language);

    Ok(())
}
