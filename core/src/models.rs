use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GlucoseError, GlucoseResult};
use crate::units;

/// Upper bound accepted from user input, in mg/dL.
pub const MAX_CANONICAL_VALUE: f64 = 1000.0;

/// Fixed key of the singleton settings record.
pub const SETTINGS_KEY: &str = "user-settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GlucoseUnit {
    /// Canonical unit; every stored value is in mg/dL.
    #[default]
    #[serde(rename = "mg/dL")]
    MgDl,
    #[serde(rename = "mmol/L")]
    MmolL,
}

impl GlucoseUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MgDl => "mg/dL",
            Self::MmolL => "mmol/L",
        }
    }
}

impl fmt::Display for GlucoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlucoseUnit {
    type Err = GlucoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mg/dl" | "mgdl" | "mg" => Ok(Self::MgDl),
            "mmol/l" | "mmoll" | "mmol" => Ok(Self::MmolL),
            _ => Err(GlucoseError::invalid(format!(
                "Invalid unit '{s}'. Use 'mg/dL' or 'mmol/L'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingContext {
    #[default]
    Fasting,
    PreMeal,
    /// Legal tag with no dedicated input path; older records may carry it.
    PostMeal,
    #[serde(rename = "post-meal-1h")]
    PostMeal1h,
    #[serde(rename = "post-meal-2h")]
    PostMeal2h,
    Bedtime,
    Other,
}

impl ReadingContext {
    pub const ALL: [ReadingContext; 7] = [
        Self::Fasting,
        Self::PreMeal,
        Self::PostMeal,
        Self::PostMeal1h,
        Self::PostMeal2h,
        Self::Bedtime,
        Self::Other,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fasting => "fasting",
            Self::PreMeal => "pre-meal",
            Self::PostMeal => "post-meal",
            Self::PostMeal1h => "post-meal-1h",
            Self::PostMeal2h => "post-meal-2h",
            Self::Bedtime => "bedtime",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ReadingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingContext {
    type Err = GlucoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
                GlucoseError::invalid(format!(
                    "Invalid context '{s}'. Must be one of: {}",
                    names.join(", ")
                ))
            })
    }
}

/// A single glucose log entry. `value` is always mg/dL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    pub value: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub context: ReadingContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Photo owned by this reading; dropped together with it.
    #[serde(skip)]
    pub image: ReadingImage,
}

/// Photo state of a reading. List queries report `Stored` without loading
/// the bytes; single-reading lookups return `Loaded`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReadingImage {
    #[default]
    None,
    /// A photo exists in storage but was not fetched. Writing the reading
    /// back leaves it in place.
    Stored,
    Loaded(Vec<u8>),
}

impl ReadingImage {
    #[must_use]
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::None)
    }

    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Loaded(data) => Some(data),
            _ => None,
        }
    }
}

impl From<Option<Vec<u8>>> for ReadingImage {
    fn from(data: Option<Vec<u8>>) -> Self {
        data.map_or(Self::None, Self::Loaded)
    }
}

impl Reading {
    #[must_use]
    pub fn local_time(&self) -> DateTime<Local> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .unwrap_or_default()
            .with_timezone(&Local)
    }

    #[must_use]
    pub fn display_value(&self, unit: GlucoseUnit) -> f64 {
        units::to_display(self.value, unit)
    }

    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image.is_present()
    }
}

/// User input for a new reading; `value` is in the active display unit.
#[derive(Debug, Clone, Default)]
pub struct NewReading {
    pub value: String,
    pub timestamp: i64,
    pub context: ReadingContext,
    pub notes: Option<String>,
    pub image: Option<Vec<u8>>,
}

/// Changes to an existing reading. `None` leaves a field untouched;
/// `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default)]
pub struct EditReading {
    pub value: Option<String>,
    pub timestamp: Option<i64>,
    pub context: Option<ReadingContext>,
    pub notes: Option<Option<String>>,
    pub image: Option<Option<Vec<u8>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
}

impl Default for TargetRange {
    fn default() -> Self {
        Self {
            min: 70.0,
            max: 140.0,
        }
    }
}

impl TargetRange {
    #[must_use]
    pub fn classify(&self, canonical: f64) -> RangeStatus {
        if canonical < self.min {
            RangeStatus::Low
        } else if canonical > self.max {
            RangeStatus::High
        } else {
            RangeStatus::InRange
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RangeStatus {
    Low,
    InRange,
    High,
}

impl RangeStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::InRange => "in range",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Zh => "zh",
        }
    }
}

impl FromStr for Language {
    type Err = GlucoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "zh" | "chinese" | "中文" => Ok(Self::Zh),
            _ => Err(GlucoseError::invalid(format!(
                "Invalid language '{s}'. Use 'en' or 'zh'"
            ))),
        }
    }
}

/// The singleton preferences record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub target_range: TargetRange,
    pub preferred_unit: GlucoseUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Language,
}

/// Parse a raw value typed in `unit` and normalize it to mg/dL.
pub fn parse_reading_value(input: &str, unit: GlucoseUnit) -> GlucoseResult<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(GlucoseError::invalid("Reading value must not be empty"));
    }
    let value: f64 = trimmed.parse().map_err(|_| {
        GlucoseError::invalid(format!("Invalid reading value '{trimmed}'. Use a number"))
    })?;
    if !value.is_finite() {
        return Err(GlucoseError::invalid("Reading value must be a finite number"));
    }
    if value < 0.0 {
        return Err(GlucoseError::invalid("Reading value must not be negative"));
    }
    let canonical = units::to_canonical(value, unit);
    if canonical > MAX_CANONICAL_VALUE {
        return Err(GlucoseError::invalid(format!(
            "Reading value {trimmed} {unit} is out of range (max {} {unit})",
            units::format_value(units::to_display(MAX_CANONICAL_VALUE, unit), unit)
        )));
    }
    Ok(canonical)
}

pub fn validate_target_range(range: &TargetRange) -> GlucoseResult<()> {
    if !range.min.is_finite() || !range.max.is_finite() {
        return Err(GlucoseError::invalid("Target range bounds must be finite"));
    }
    if range.min < 0.0 {
        return Err(GlucoseError::invalid("Target range must not be negative"));
    }
    if range.min > range.max {
        return Err(GlucoseError::invalid(format!(
            "Target range minimum ({}) must not exceed maximum ({})",
            range.min, range.max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_round_trips_through_str() {
        for context in ReadingContext::ALL {
            assert_eq!(context.as_str().parse::<ReadingContext>().unwrap(), context);
        }
    }

    #[test]
    fn test_context_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReadingContext::PostMeal1h).unwrap(),
            "\"post-meal-1h\""
        );
        assert_eq!(
            serde_json::to_string(&ReadingContext::PreMeal).unwrap(),
            "\"pre-meal\""
        );
        let legacy: ReadingContext = serde_json::from_str("\"post-meal\"").unwrap();
        assert_eq!(legacy, ReadingContext::PostMeal);
    }

    #[test]
    fn test_invalid_context() {
        assert!("brunch".parse::<ReadingContext>().is_err());
        assert!("".parse::<ReadingContext>().is_err());
    }

    #[test]
    fn test_unit_parsing_is_lenient() {
        assert_eq!("mg/dL".parse::<GlucoseUnit>().unwrap(), GlucoseUnit::MgDl);
        assert_eq!("MMOL/L".parse::<GlucoseUnit>().unwrap(), GlucoseUnit::MmolL);
        assert_eq!("mmol".parse::<GlucoseUnit>().unwrap(), GlucoseUnit::MmolL);
        assert!("mg".parse::<GlucoseUnit>().is_ok());
        assert!("kg".parse::<GlucoseUnit>().is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.preferred_unit, GlucoseUnit::MgDl);
        assert_eq!(settings.target_range, TargetRange { min: 70.0, max: 140.0 });
        assert!(settings.name.is_none());
        assert_eq!(settings.language, Language::En);
    }

    #[test]
    fn test_settings_wire_shape() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["preferredUnit"], "mg/dL");
        assert_eq!(json["targetRange"]["min"], 70.0);
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_settings_without_language_reads_as_english() {
        let settings: Settings = serde_json::from_str(
            r#"{"targetRange":{"min":80,"max":130},"preferredUnit":"mmol/L","name":"Ada"}"#,
        )
        .unwrap();
        assert_eq!(settings.language, Language::En);
        assert_eq!(settings.preferred_unit, GlucoseUnit::MmolL);
        assert_eq!(settings.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_reading_json_omits_image() {
        let reading = Reading {
            id: "r1".to_string(),
            value: 100.0,
            timestamp: 0,
            context: ReadingContext::Bedtime,
            notes: None,
            image: ReadingImage::Loaded(vec![1, 2, 3]),
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert!(json.get("image").is_none());
        assert_eq!(json["context"], "bedtime");
    }

    #[test]
    fn test_parse_reading_value_canonical() {
        assert_eq!(parse_reading_value("126", GlucoseUnit::MgDl).unwrap(), 126.0);
        assert_eq!(parse_reading_value(" 99.6 ", GlucoseUnit::MgDl).unwrap(), 100.0);
        assert_eq!(parse_reading_value("0", GlucoseUnit::MgDl).unwrap(), 0.0);
    }

    #[test]
    fn test_parse_reading_value_derived_is_normalized() {
        assert_eq!(parse_reading_value("7.0", GlucoseUnit::MmolL).unwrap(), 126.0);
        assert_eq!(parse_reading_value("5.5", GlucoseUnit::MmolL).unwrap(), 99.0);
    }

    #[test]
    fn test_parse_reading_value_rejects_bad_input() {
        for input in ["", "abc", "NaN", "inf", "-5", "1001"] {
            let err = parse_reading_value(input, GlucoseUnit::MgDl).unwrap_err();
            assert!(matches!(err, GlucoseError::InvalidInput(_)), "{input}");
        }
        assert!(parse_reading_value("60", GlucoseUnit::MmolL).is_err());
    }

    #[test]
    fn test_target_range_classify() {
        let range = TargetRange::default();
        assert_eq!(range.classify(69.0), RangeStatus::Low);
        assert_eq!(range.classify(70.0), RangeStatus::InRange);
        assert_eq!(range.classify(140.0), RangeStatus::InRange);
        assert_eq!(range.classify(141.0), RangeStatus::High);
    }

    #[test]
    fn test_validate_target_range() {
        assert!(validate_target_range(&TargetRange::default()).is_ok());
        assert!(validate_target_range(&TargetRange { min: 150.0, max: 100.0 }).is_err());
        assert!(validate_target_range(&TargetRange { min: -1.0, max: 100.0 }).is_err());
        assert!(validate_target_range(&TargetRange { min: f64::NAN, max: 100.0 }).is_err());
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert_eq!("zh".parse::<Language>().unwrap(), Language::Zh);
        assert!("fr".parse::<Language>().is_err());
    }
}
