use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use glucose_core::GlucoseService;
use glucose_core::models::{GlucoseUnit, Language, RangeStatus, ReadingContext};
use glucose_core::trends::{DisplayReading, TimeWindow, TrendDirection};
use glucose_core::units::format_value;

/// Display preferences read once per command.
#[derive(Clone, Copy)]
pub(crate) struct Prefs {
    pub unit: GlucoseUnit,
    pub language: Language,
}

pub(crate) async fn prefs(service: &GlucoseService) -> Result<Prefs> {
    let settings = service.settings().await?;
    Ok(Prefs {
        unit: settings.preferred_unit,
        language: settings.language,
    })
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a reading time into epoch milliseconds. Accepts "now", "HH:MM"
/// (today) or a local date and time. Defaults to now.
pub(crate) fn parse_timestamp(input: Option<String>) -> Result<i64> {
    let now = Local::now();
    let Some(s) = input else {
        return Ok(now.timestamp_millis());
    };
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return Ok(now.timestamp_millis());
    }

    let naive = if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        now.date_naive().and_time(time)
    } else {
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .with_context(|| {
                format!("Invalid time '{s}'. Use now, HH:MM or YYYY-MM-DD HH:MM")
            })?
    };

    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("Time '{s}' does not exist in the local time zone"))?;
    Ok(local.timestamp_millis())
}

/// Parse `--range` or a `--from`/`--to` pair into a window.
pub(crate) fn parse_window(
    range: &str,
    from: Option<String>,
    to: Option<String>,
) -> Result<TimeWindow> {
    if let Some(from) = from {
        let start = parse_date(Some(from))?;
        let end = parse_date(to)?;
        if start > end {
            eprintln!("Note: --from {start} is after --to {end}; the window is empty");
        }
        return Ok(TimeWindow::Custom { start, end });
    }

    let r = range.trim().to_lowercase();
    if r == "today" {
        return Ok(TimeWindow::Today);
    }
    if let Some(n) = r.strip_suffix('d') {
        return Ok(TimeWindow::LastDays {
            days: parse_count(n, range, MAX_RANGE_DAYS, "days")?,
        });
    }
    if let Some(n) = r.strip_suffix('m') {
        return Ok(TimeWindow::LastMonths {
            months: parse_count(n, range, MAX_RANGE_MONTHS, "months")?,
        });
    }
    bail!("Invalid range '{range}'. Use today, 7d, 30d, 6m")
}

/// One hundred years either way.
const MAX_RANGE_DAYS: u32 = 36_525;
const MAX_RANGE_MONTHS: u32 = 1_200;

fn parse_count(n: &str, range: &str, max: u32, what: &str) -> Result<u32> {
    let count: u32 = n
        .parse()
        .with_context(|| format!("Invalid range '{range}'. Use today, 7d, 30d, 6m"))?;
    if count == 0 {
        bail!("Range must cover at least one day or month");
    }
    if count > max {
        bail!("Range '{range}' is too long (at most {max} {what})");
    }
    Ok(count)
}

pub(crate) fn format_time(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .unwrap_or_default()
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

pub(crate) fn read_photo(path: &Path) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read photo: {}", path.display()))?;
    if bytes.is_empty() {
        bail!("Photo file is empty: {}", path.display());
    }
    Ok(bytes)
}

pub(crate) fn context_label(context: ReadingContext, language: Language) -> &'static str {
    match language {
        Language::En => match context {
            ReadingContext::Fasting => "Fasting",
            ReadingContext::PreMeal => "Pre-meal",
            ReadingContext::PostMeal => "Post-meal",
            ReadingContext::PostMeal1h => "1h after meal",
            ReadingContext::PostMeal2h => "2h after meal",
            ReadingContext::Bedtime => "Bedtime",
            ReadingContext::Other => "Other",
        },
        Language::Zh => match context {
            ReadingContext::Fasting => "空腹",
            ReadingContext::PreMeal => "餐前",
            ReadingContext::PostMeal => "餐后",
            ReadingContext::PostMeal1h => "餐后1小时",
            ReadingContext::PostMeal2h => "餐后2小时",
            ReadingContext::Bedtime => "睡前",
            ReadingContext::Other => "其他",
        },
    }
}

pub(crate) fn status_label(status: RangeStatus, language: Language) -> &'static str {
    match language {
        Language::En => status.as_str(),
        Language::Zh => match status {
            RangeStatus::Low => "偏低",
            RangeStatus::InRange => "正常",
            RangeStatus::High => "偏高",
        },
    }
}

pub(crate) fn direction_label(direction: TrendDirection, language: Language) -> &'static str {
    match (language, direction) {
        (Language::En, TrendDirection::Rising) => "rising",
        (Language::En, TrendDirection::Falling) => "falling",
        (Language::En, TrendDirection::Steady) => "steady",
        (Language::Zh, TrendDirection::Rising) => "上升",
        (Language::Zh, TrendDirection::Falling) => "下降",
        (Language::Zh, TrendDirection::Steady) => "平稳",
    }
}

pub(crate) fn print_reading_table(readings: &[DisplayReading], language: Language) {
    #[derive(Tabled)]
    struct ReadingRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Value")]
        value: String,
        #[tabled(rename = "Context")]
        context: String,
        #[tabled(rename = "Notes")]
        notes: String,
        #[tabled(rename = "Photo")]
        photo: String,
    }

    let rows: Vec<ReadingRow> = readings
        .iter()
        .map(|r| ReadingRow {
            id: r.id.clone(),
            time: format_time(r.timestamp),
            value: format!("{} {}", format_value(r.value, r.unit), r.unit),
            context: context_label(r.context, language).to_string(),
            notes: r.notes.as_deref().map(|n| truncate(n, 30)).unwrap_or_default(),
            photo: if r.has_image { "yes".into() } else { String::new() },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
