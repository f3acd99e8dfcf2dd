use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::GlucoseResult;
use crate::models::{
    EditReading, GlucoseUnit, NewReading, Reading, Settings, TargetRange, parse_reading_value,
};
use crate::settings::{self, SettingUpdate};
use crate::store::Store;
use crate::trends::{
    self, DayGroup, DisplayReading, LatestSnapshot, TimeWindow, TrendReport, TrendStats,
};

/// How many readings the dashboard lists under the latest one.
pub const DASHBOARD_RECENT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub unit: GlucoseUnit,
    pub target_range: TargetRange,
    pub latest: Option<LatestSnapshot>,
    pub today: TrendStats,
    pub recent: Vec<DisplayReading>,
}

/// The interface front ends call. Values cross it in the user's preferred
/// unit and are stored in mg/dL.
pub struct GlucoseService {
    store: Store,
}

impl GlucoseService {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self::from_store(Store::new(db_path))
    }

    #[must_use]
    pub fn new_in_memory() -> Self {
        Self::from_store(Store::in_memory())
    }

    #[must_use]
    pub fn from_store(store: Store) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    // --- Readings ---

    pub async fn log_reading(&self, new: NewReading) -> GlucoseResult<Reading> {
        let settings = self.store.get_settings().await?;
        let value = parse_reading_value(&new.value, settings.preferred_unit)?;
        let reading = Reading {
            id: Uuid::new_v4().to_string(),
            value,
            timestamp: new.timestamp,
            context: new.context,
            notes: clean_notes(new.notes),
            image: new.image.into(),
        };
        self.store.add_or_replace(&reading).await?;
        info!(id = %reading.id, value = reading.value, context = %reading.context, "logged reading");
        Ok(reading)
    }

    /// Apply `edit` to the reading with `id`. Returns `None` when no such
    /// reading exists.
    pub async fn edit_reading(&self, id: &str, edit: EditReading) -> GlucoseResult<Option<Reading>> {
        let Some(mut reading) = self.store.get_reading(id).await? else {
            debug!(id, "edit of unknown reading");
            return Ok(None);
        };
        if let Some(raw) = edit.value {
            let unit = self.store.get_settings().await?.preferred_unit;
            reading.value = parse_reading_value(&raw, unit)?;
        }
        if let Some(timestamp) = edit.timestamp {
            reading.timestamp = timestamp;
        }
        if let Some(context) = edit.context {
            reading.context = context;
        }
        if let Some(notes) = edit.notes {
            reading.notes = clean_notes(notes);
        }
        if let Some(image) = edit.image {
            reading.image = image.into();
        }
        self.store.add_or_replace(&reading).await?;
        info!(id, "edited reading");
        Ok(Some(reading))
    }

    pub async fn delete_reading(&self, id: &str) -> GlucoseResult<bool> {
        let removed = self.store.delete_reading(id).await?;
        if removed {
            info!(id, "deleted reading");
        }
        Ok(removed)
    }

    pub async fn get_reading(&self, id: &str) -> GlucoseResult<Option<Reading>> {
        self.store.get_reading(id).await
    }

    /// Every reading grouped by local day, newest first, in the preferred
    /// unit.
    pub async fn history(&self) -> GlucoseResult<Vec<DayGroup>> {
        let unit = self.store.get_settings().await?.preferred_unit;
        let readings = self.store.list_readings_by_date().await?;
        Ok(trends::group_by_day(&readings, unit))
    }

    // --- Derived views ---

    pub async fn dashboard(&self) -> GlucoseResult<Dashboard> {
        self.dashboard_at(Local::now()).await
    }

    pub async fn dashboard_at(&self, now: DateTime<Local>) -> GlucoseResult<Dashboard> {
        let settings = self.store.get_settings().await?;
        let readings = self.store.list_readings_by_date().await?;
        let unit = settings.preferred_unit;
        let today = trends::query_range(&readings, &TimeWindow::Today, unit, now);
        Ok(Dashboard {
            latest: trends::latest_snapshot(&readings, unit, &settings.target_range),
            today: today.stats,
            recent: trends::recent(&readings, unit, DASHBOARD_RECENT),
            name: settings.name,
            unit,
            target_range: settings.target_range,
        })
    }

    pub async fn trends(&self, window: TimeWindow) -> GlucoseResult<TrendReport> {
        self.trends_at(window, Local::now()).await
    }

    pub async fn trends_at(
        &self,
        window: TimeWindow,
        now: DateTime<Local>,
    ) -> GlucoseResult<TrendReport> {
        let unit = self.store.get_settings().await?.preferred_unit;
        let readings = self.store.list_readings_by_date().await?;
        Ok(trends::query_range(&readings, &window, unit, now))
    }

    // --- Settings ---

    pub async fn settings(&self) -> GlucoseResult<Settings> {
        self.store.get_settings().await
    }

    pub async fn update_setting(&self, update: SettingUpdate) -> GlucoseResult<Settings> {
        settings::update_field(&self.store, update).await
    }
}

fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}
