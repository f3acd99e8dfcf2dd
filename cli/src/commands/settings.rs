use anyhow::Result;

use glucose_core::GlucoseService;
use glucose_core::models::{GlucoseUnit, Language, Settings, TargetRange};
use glucose_core::settings::SettingUpdate;
use glucose_core::units::{format_value, to_display};

fn print_settings(settings: &Settings) {
    let unit = settings.preferred_unit;
    println!("Name:     {}", settings.name.as_deref().unwrap_or("-"));
    println!("Unit:     {unit}");
    println!("Language: {}", settings.language.as_str());
    println!(
        "Target:   {}-{} {unit}",
        format_value(to_display(settings.target_range.min, unit), unit),
        format_value(to_display(settings.target_range.max, unit), unit),
    );
}

async fn apply(service: &GlucoseService, update: SettingUpdate, json: bool) -> Result<()> {
    let settings = service.update_setting(update).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        println!("Settings updated");
        print_settings(&settings);
    }
    Ok(())
}

pub(crate) async fn cmd_settings_show(service: &GlucoseService, json: bool) -> Result<()> {
    let settings = service.settings().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        print_settings(&settings);
    }
    Ok(())
}

pub(crate) async fn cmd_settings_unit(
    service: &GlucoseService,
    unit: &str,
    json: bool,
) -> Result<()> {
    let unit: GlucoseUnit = unit.parse()?;
    apply(service, SettingUpdate::PreferredUnit(unit), json).await
}

pub(crate) async fn cmd_settings_name(
    service: &GlucoseService,
    name: Option<String>,
    json: bool,
) -> Result<()> {
    apply(service, SettingUpdate::Name(name), json).await
}

pub(crate) async fn cmd_settings_language(
    service: &GlucoseService,
    language: &str,
    json: bool,
) -> Result<()> {
    let language: Language = language.parse()?;
    apply(service, SettingUpdate::Language(language), json).await
}

pub(crate) async fn cmd_settings_target(
    service: &GlucoseService,
    min: f64,
    max: f64,
    json: bool,
) -> Result<()> {
    apply(
        service,
        SettingUpdate::TargetRange(TargetRange { min, max }),
        json,
    )
    .await
}
