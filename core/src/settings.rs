//! Partial updates of the singleton settings record.

use tracing::info;

use crate::error::GlucoseResult;
use crate::models::{GlucoseUnit, Language, Settings, TargetRange, validate_target_range};
use crate::store::Store;

/// A change to exactly one settings field.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingUpdate {
    TargetRange(TargetRange),
    PreferredUnit(GlucoseUnit),
    /// `None` or a blank name clears it.
    Name(Option<String>),
    Language(Language),
}

impl SettingUpdate {
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::TargetRange(_) => "targetRange",
            Self::PreferredUnit(_) => "preferredUnit",
            Self::Name(_) => "name",
            Self::Language(_) => "language",
        }
    }

    /// Replace the named field of `settings`, leaving the rest untouched.
    #[must_use]
    pub fn apply(self, settings: Settings) -> Settings {
        match self {
            Self::TargetRange(target_range) => Settings {
                target_range,
                ..settings
            },
            Self::PreferredUnit(preferred_unit) => Settings {
                preferred_unit,
                ..settings
            },
            Self::Name(name) => Settings {
                name: name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                ..settings
            },
            Self::Language(language) => Settings {
                language,
                ..settings
            },
        }
    }

    fn validate(&self) -> GlucoseResult<()> {
        match self {
            Self::TargetRange(range) => validate_target_range(range),
            _ => Ok(()),
        }
    }
}

/// Apply `update` to the stored settings (or the defaults when none are
/// stored yet) and persist the result as a single storage operation.
pub async fn update_field(store: &Store, update: SettingUpdate) -> GlucoseResult<Settings> {
    update.validate()?;
    let field = update.field();
    let settings = store.modify_settings(move |current| update.apply(current)).await?;
    info!(field, "updated setting");
    Ok(settings)
}
