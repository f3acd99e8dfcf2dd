//! Time-window filtering and summaries over stored readings.
//!
//! Everything here is pure: callers pass the readings, the display unit and
//! the current instant.

use chrono::{DateTime, Duration, Local, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::models::{GlucoseUnit, RangeStatus, Reading, ReadingContext, TargetRange};
use crate::units;

/// Readings within this many mg/dL of the previous one count as steady.
pub const STEADY_BAND_MGDL: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TimeWindow {
    /// Local midnight to the end of the current local day.
    Today,
    /// Rolling window ending now.
    LastDays { days: u32 },
    /// Rolling window ending now.
    LastMonths { months: u32 },
    /// Whole local days from `start` through `end`.
    Custom { start: NaiveDate, end: NaiveDate },
}

impl TimeWindow {
    /// Inclusive bounds of the window.
    #[must_use]
    pub fn bounds(&self, now: DateTime<Local>) -> (DateTime<Local>, DateTime<Local>) {
        match *self {
            Self::Today => {
                let today = now.date_naive();
                (start_of_day(today), end_of_day(today))
            }
            Self::LastDays { days } => (days_before(now, i64::from(days)), now),
            Self::LastMonths { months } => {
                let start = now.checked_sub_months(Months::new(months)).map_or_else(
                    || days_before(now, 30 * i64::from(months)),
                    |start| start.max(window_floor()),
                );
                (start, now)
            }
            Self::Custom { start, end } => (
                start_of_day(clamp_date(start)),
                end_of_day(clamp_date(end)),
            ),
        }
    }

    #[must_use]
    pub fn bounds_millis(&self, now: DateTime<Local>) -> (i64, i64) {
        let (start, end) = self.bounds(now);
        (start.timestamp_millis(), end.timestamp_millis())
    }

    #[must_use]
    pub fn label(&self) -> String {
        match *self {
            Self::Today => "today".to_string(),
            Self::LastDays { days } => format!("last {days} days"),
            Self::LastMonths { months } => format!("last {months} months"),
            Self::Custom { start, end } => format!("{start} to {end}"),
        }
    }
}

/// 0001-01-01T00:00:00Z. Rolling windows reaching past it start here.
pub const EARLIEST_WINDOW_MILLIS: i64 = -62_135_596_800_000;

fn window_floor() -> DateTime<Local> {
    DateTime::<Utc>::from_timestamp_millis(EARLIEST_WINDOW_MILLIS)
        .unwrap_or_default()
        .with_timezone(&Local)
}

/// `now` minus `days`, clamped to `EARLIEST_WINDOW_MILLIS`.
fn days_before(now: DateTime<Local>, days: i64) -> DateTime<Local> {
    let floor = window_floor();
    Duration::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .map_or(floor, |start| start.max(floor))
}

/// Custom window dates are kept within years 1 to 9999 so local day
/// arithmetic stays inside chrono's range.
fn clamp_date(date: NaiveDate) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN);
    let last = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX);
    date.clamp(first, last)
}

/// The first instant of `date` in local time. When midnight is skipped by
/// a DST change the day starts at the first valid local time after it.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> DateTime<Local> {
    let midnight = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .unwrap_or_else(|| Local.from_utc_datetime(&midnight))
}

/// The last millisecond of `date` in local time.
#[must_use]
pub fn end_of_day(date: NaiveDate) -> DateTime<Local> {
    let next = date
        .succ_opt()
        .map_or_else(|| start_of_day(date) + Duration::hours(24), start_of_day);
    next - Duration::milliseconds(1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub id: String,
    pub timestamp: i64,
    pub context: ReadingContext,
    /// In the report's display unit.
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum TrendStats {
    /// The window holds no readings. Distinct from a window of zeros.
    NoData,
    Summary {
        avg: f64,
        min: f64,
        max: f64,
        count: usize,
    },
}

impl TrendStats {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return Self::NoData;
        }
        Self::Summary {
            avg: units::round1(sum / count as f64),
            min,
            max,
            count,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub window: TimeWindow,
    pub unit: GlucoseUnit,
    /// Inclusive window bounds, epoch milliseconds.
    pub start: i64,
    pub end: i64,
    pub points: Vec<TrendPoint>,
    pub stats: TrendStats,
}

/// Filter `readings` to `window`, sort them oldest first, convert them to
/// `unit` and summarize the converted values.
#[must_use]
pub fn query_range(
    readings: &[Reading],
    window: &TimeWindow,
    unit: GlucoseUnit,
    now: DateTime<Local>,
) -> TrendReport {
    let (start, end) = window.bounds_millis(now);
    let mut included: Vec<&Reading> = readings
        .iter()
        .filter(|r| (start..=end).contains(&r.timestamp))
        .collect();
    included.sort_by_key(|r| r.timestamp);

    let points: Vec<TrendPoint> = included
        .into_iter()
        .map(|r| TrendPoint {
            id: r.id.clone(),
            timestamp: r.timestamp,
            context: r.context,
            value: r.display_value(unit),
        })
        .collect();
    let stats = TrendStats::from_values(points.iter().map(|p| p.value));

    TrendReport {
        window: *window,
        unit,
        start,
        end,
        points,
        stats,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Steady,
}

impl TrendDirection {
    /// Compare two canonical values.
    #[must_use]
    pub fn between(previous: f64, latest: f64) -> Self {
        let diff = latest - previous;
        if diff > STEADY_BAND_MGDL {
            Self::Rising
        } else if diff < -STEADY_BAND_MGDL {
            Self::Falling
        } else {
            Self::Steady
        }
    }

    #[must_use]
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Rising => "↑",
            Self::Falling => "↓",
            Self::Steady => "→",
        }
    }
}

/// One reading prepared for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayReading {
    pub id: String,
    pub timestamp: i64,
    pub context: ReadingContext,
    pub value: f64,
    pub unit: GlucoseUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub has_image: bool,
}

impl DisplayReading {
    #[must_use]
    pub fn new(reading: &Reading, unit: GlucoseUnit) -> Self {
        Self {
            id: reading.id.clone(),
            timestamp: reading.timestamp,
            context: reading.context,
            value: reading.display_value(unit),
            unit,
            notes: reading.notes.clone(),
            has_image: reading.has_image(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestSnapshot {
    pub reading: DisplayReading,
    pub direction: TrendDirection,
    pub status: RangeStatus,
}

fn newest_first(readings: &[Reading]) -> Vec<&Reading> {
    let mut sorted: Vec<&Reading> = readings.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
    sorted
}

/// The most recent reading with its direction relative to the one before
/// it. Direction is judged on canonical values.
#[must_use]
pub fn latest_snapshot(
    readings: &[Reading],
    unit: GlucoseUnit,
    target: &TargetRange,
) -> Option<LatestSnapshot> {
    let sorted = newest_first(readings);
    let latest = sorted.first()?;
    let direction = sorted
        .get(1)
        .map_or(TrendDirection::Steady, |prev| {
            TrendDirection::between(prev.value, latest.value)
        });
    Some(LatestSnapshot {
        reading: DisplayReading::new(latest, unit),
        direction,
        status: target.classify(latest.value),
    })
}

/// The `limit` most recent readings, newest first.
#[must_use]
pub fn recent(readings: &[Reading], unit: GlucoseUnit, limit: usize) -> Vec<DisplayReading> {
    newest_first(readings)
        .into_iter()
        .take(limit)
        .map(|r| DisplayReading::new(r, unit))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub readings: Vec<DisplayReading>,
}

/// Readings grouped by local calendar day, newest day first and newest
/// reading first within each day.
#[must_use]
pub fn group_by_day(readings: &[Reading], unit: GlucoseUnit) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    for reading in newest_first(readings) {
        let date = reading.local_time().date_naive();
        let display = DisplayReading::new(reading, unit);
        match groups.last_mut() {
            Some(group) if group.date == date => group.readings.push(display),
            _ => groups.push(DayGroup {
                date,
                readings: vec![display],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadingImage;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn reading(id: &str, value: f64, timestamp: i64) -> Reading {
        Reading {
            id: id.to_string(),
            value,
            timestamp,
            context: ReadingContext::Fasting,
            notes: None,
            image: ReadingImage::None,
        }
    }

    fn noon_today() -> DateTime<Local> {
        let today = Local::now().date_naive();
        start_of_day(today) + Duration::hours(12)
    }

    #[test]
    fn test_today_includes_midnight_excludes_millisecond_before() {
        let now = noon_today();
        let midnight = start_of_day(now.date_naive()).timestamp_millis();
        let readings = vec![
            reading("at-midnight", 100.0, midnight),
            reading("just-before", 200.0, midnight - 1),
        ];

        let report = query_range(&readings, &TimeWindow::Today, GlucoseUnit::MgDl, now);
        let ids: Vec<&str> = report.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["at-midnight"]);
    }

    #[test]
    fn test_today_includes_end_of_day_and_future_entries() {
        let now = noon_today();
        let end = end_of_day(now.date_naive()).timestamp_millis();
        let readings = vec![
            reading("tonight", 110.0, now.timestamp_millis() + 60 * 60 * 1000),
            reading("last-ms", 120.0, end),
            reading("tomorrow", 130.0, end + 1),
        ];

        let report = query_range(&readings, &TimeWindow::Today, GlucoseUnit::MgDl, now);
        let ids: Vec<&str> = report.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["tonight", "last-ms"]);
    }

    #[test]
    fn test_last_seven_days_scenario() {
        let now = Local::now();
        let t = now.timestamp_millis();
        let readings = vec![
            reading("two", 90.0, t - 2 * DAY_MS),
            reading("ten", 150.0, t - 10 * DAY_MS),
            reading("forty", 200.0, t - 40 * DAY_MS),
        ];

        let report = query_range(
            &readings,
            &TimeWindow::LastDays { days: 7 },
            GlucoseUnit::MgDl,
            now,
        );
        assert_eq!(report.points.len(), 1);
        assert_eq!(report.points[0].id, "two");
        assert_eq!(
            report.stats,
            TrendStats::Summary {
                avg: 90.0,
                min: 90.0,
                max: 90.0,
                count: 1
            }
        );
    }

    #[test]
    fn test_rolling_window_boundaries_are_inclusive() {
        let now = Local::now();
        let (start, end) = TimeWindow::LastDays { days: 7 }.bounds_millis(now);
        let readings = vec![
            reading("start", 100.0, start),
            reading("end", 100.0, end),
            reading("before", 100.0, start - 1),
            reading("after", 100.0, end + 1),
        ];
        let report = query_range(
            &readings,
            &TimeWindow::LastDays { days: 7 },
            GlucoseUnit::MgDl,
            now,
        );
        let ids: Vec<&str> = report.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["start", "end"]);
    }

    #[test]
    fn test_last_months_window() {
        let now = Local::now();
        let t = now.timestamp_millis();
        let readings = vec![
            reading("recent", 100.0, t - 20 * DAY_MS),
            reading("old", 100.0, t - 200 * DAY_MS),
        ];
        let report = query_range(
            &readings,
            &TimeWindow::LastMonths { months: 6 },
            GlucoseUnit::MgDl,
            now,
        );
        assert_eq!(report.points.len(), 1);
        assert_eq!(report.points[0].id, "recent");
    }

    #[test]
    fn test_custom_range_covers_whole_days_and_sorts() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        let first = start_of_day(start).timestamp_millis();
        let last = end_of_day(end).timestamp_millis();
        let readings = vec![
            reading("late", 180.0, last),
            reading("early", 90.0, first),
            reading("outside", 300.0, last + 1),
        ];

        let report = query_range(
            &readings,
            &TimeWindow::Custom { start, end },
            GlucoseUnit::MgDl,
            Local::now(),
        );
        let ids: Vec<&str> = report.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["early", "late"]);
        assert_eq!(
            report.stats,
            TrendStats::Summary {
                avg: 135.0,
                min: 90.0,
                max: 180.0,
                count: 2
            }
        );
    }

    #[test]
    fn test_reversed_custom_range_is_empty() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let readings = vec![reading(
            "a",
            100.0,
            start_of_day(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()).timestamp_millis(),
        )];
        let report = query_range(
            &readings,
            &TimeWindow::Custom { start, end },
            GlucoseUnit::MgDl,
            Local::now(),
        );
        assert!(report.stats.is_empty());
    }

    #[test]
    fn test_empty_window_is_no_data_not_zero() {
        let report = query_range(&[], &TimeWindow::Today, GlucoseUnit::MgDl, Local::now());
        assert!(report.points.is_empty());
        assert_eq!(report.stats, TrendStats::NoData);
        let json = serde_json::to_value(report.stats).unwrap();
        assert_eq!(json["status"], "no-data");
        assert!(json.get("avg").is_none());
    }

    #[test]
    fn test_zero_value_is_data() {
        let now = Local::now();
        let readings = vec![reading("zero", 0.0, now.timestamp_millis())];
        let report = query_range(
            &readings,
            &TimeWindow::LastDays { days: 1 },
            GlucoseUnit::MgDl,
            now,
        );
        assert_eq!(
            report.stats,
            TrendStats::Summary {
                avg: 0.0,
                min: 0.0,
                max: 0.0,
                count: 1
            }
        );
    }

    #[test]
    fn test_stats_use_display_unit() {
        let now = Local::now();
        let t = now.timestamp_millis();
        let readings = vec![reading("a", 90.0, t - 1000), reading("b", 126.0, t)];
        let report = query_range(
            &readings,
            &TimeWindow::LastDays { days: 1 },
            GlucoseUnit::MmolL,
            now,
        );
        let values: Vec<f64> = report.points.iter().map(|p| p.value).collect();
        assert_eq!(values, [5.0, 7.0]);
        assert_eq!(
            report.stats,
            TrendStats::Summary {
                avg: 6.0,
                min: 5.0,
                max: 7.0,
                count: 2
            }
        );
    }

    #[test]
    fn test_average_rounded_to_one_decimal() {
        let stats = TrendStats::from_values([100.0, 101.0, 101.0]);
        assert_eq!(
            stats,
            TrendStats::Summary {
                avg: 100.7,
                min: 100.0,
                max: 101.0,
                count: 3
            }
        );
    }

    #[test]
    fn test_direction_thresholds() {
        assert_eq!(TrendDirection::between(100.0, 106.0), TrendDirection::Rising);
        assert_eq!(TrendDirection::between(100.0, 105.0), TrendDirection::Steady);
        assert_eq!(TrendDirection::between(100.0, 95.0), TrendDirection::Steady);
        assert_eq!(TrendDirection::between(100.0, 94.0), TrendDirection::Falling);
    }

    #[test]
    fn test_latest_snapshot_uses_timestamp_order() {
        let readings = vec![
            reading("newest", 150.0, 3000),
            reading("oldest", 100.0, 1000),
            reading("middle", 120.0, 2000),
        ];
        let snapshot =
            latest_snapshot(&readings, GlucoseUnit::MgDl, &TargetRange::default()).unwrap();
        assert_eq!(snapshot.reading.id, "newest");
        assert_eq!(snapshot.direction, TrendDirection::Rising);
        assert_eq!(snapshot.status, RangeStatus::High);
    }

    #[test]
    fn test_latest_snapshot_single_and_empty() {
        assert!(latest_snapshot(&[], GlucoseUnit::MgDl, &TargetRange::default()).is_none());
        let snapshot = latest_snapshot(
            &[reading("only", 100.0, 1)],
            GlucoseUnit::MmolL,
            &TargetRange::default(),
        )
        .unwrap();
        assert_eq!(snapshot.direction, TrendDirection::Steady);
        assert_eq!(snapshot.reading.value, 5.6);
        assert_eq!(snapshot.status, RangeStatus::InRange);
    }

    #[test]
    fn test_recent_limits_and_orders() {
        let readings: Vec<Reading> = (0..5)
            .map(|i| reading(&format!("r{i}"), 100.0, i64::from(i) * 1000))
            .collect();
        let ids: Vec<String> = recent(&readings, GlucoseUnit::MgDl, 3)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["r4", "r3", "r2"]);
    }

    #[test]
    fn test_group_by_day() {
        let day1 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let d1 = start_of_day(day1) + Duration::hours(8);
        let d2 = start_of_day(day2) + Duration::hours(8);
        let readings = vec![
            reading("d1-morning", 95.0, d1.timestamp_millis()),
            reading("d2-morning", 99.0, d2.timestamp_millis()),
            reading("d1-evening", 140.0, (d1 + Duration::hours(10)).timestamp_millis()),
        ];

        let groups = group_by_day(&readings, GlucoseUnit::MgDl);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date, day2);
        assert_eq!(groups[1].date, day1);
        let day1_ids: Vec<&str> = groups[1].readings.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(day1_ids, ["d1-evening", "d1-morning"]);
    }

    #[test]
    fn test_huge_rolling_windows_clamp_instead_of_overflowing() {
        let now = Local::now();
        let t = now.timestamp_millis();
        let readings = vec![
            reading("ancient", 80.0, -50_000_000_000_000),
            reading("recent", 120.0, t - DAY_MS),
        ];

        for window in [
            TimeWindow::LastDays { days: u32::MAX },
            TimeWindow::LastMonths { months: 100_000_000 },
            TimeWindow::LastMonths { months: u32::MAX },
        ] {
            let (start, end) = window.bounds_millis(now);
            assert_eq!(start, EARLIEST_WINDOW_MILLIS, "{window:?}");
            assert_eq!(end, t);
            let report = query_range(&readings, &window, GlucoseUnit::MgDl, now);
            assert_eq!(report.points.len(), 2, "{window:?}");
        }
    }

    #[test]
    fn test_extreme_custom_dates_clamp_instead_of_overflowing() {
        let window = TimeWindow::Custom {
            start: NaiveDate::MIN,
            end: NaiveDate::MAX,
        };
        let now = Local::now();
        let readings = vec![reading("now", 100.0, now.timestamp_millis())];
        let report = query_range(&readings, &window, GlucoseUnit::MgDl, now);
        assert_eq!(report.points.len(), 1);
        let last = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        assert_eq!(report.end, end_of_day(last).timestamp_millis());
    }

    #[test]
    fn test_end_of_day_is_one_ms_before_next_midnight() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let next = day.succ_opt().unwrap();
        assert_eq!(
            end_of_day(day).timestamp_millis() + 1,
            start_of_day(next).timestamp_millis()
        );
    }
}
