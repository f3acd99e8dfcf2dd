use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use glucose_core::GlucoseService;
use glucose_core::models::{EditReading, NewReading, Reading, ReadingContext, ReadingImage};
use glucose_core::trends::DisplayReading;
use glucose_core::units::format_value;

use super::helpers::{
    Prefs, context_label, format_time, json_error, parse_timestamp, prefs, read_photo,
};

fn print_reading(verb: &str, reading: &Reading, prefs: Prefs) {
    let shown = DisplayReading::new(reading, prefs.unit);
    println!(
        "{verb} {} {} ({}) at {}",
        format_value(shown.value, shown.unit),
        shown.unit,
        context_label(shown.context, prefs.language),
        format_time(shown.timestamp)
    );
    println!("  ID: {}", shown.id);
    if let Some(ref n) = shown.notes {
        println!("  Notes: {n}");
    }
    if shown.has_image {
        println!("  Photo attached");
    }
}

pub(crate) async fn cmd_log(
    service: &GlucoseService,
    value: &str,
    context: &str,
    at: Option<String>,
    notes: Option<String>,
    photo: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let context: ReadingContext = context.parse()?;
    let timestamp = parse_timestamp(at)?;
    let image = photo.as_deref().map(read_photo).transpose()?;

    let reading = service
        .log_reading(NewReading {
            value: value.to_string(),
            timestamp,
            context,
            notes,
            image,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reading)?);
    } else {
        print_reading("Logged", &reading, prefs(service).await?);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_edit(
    service: &GlucoseService,
    id: &str,
    value: Option<String>,
    context: Option<&str>,
    at: Option<String>,
    notes: Option<Option<String>>,
    photo: Option<PathBuf>,
    remove_photo: bool,
    json: bool,
) -> Result<()> {
    let context = context.map(str::parse::<ReadingContext>).transpose()?;
    let timestamp = at.map(|s| parse_timestamp(Some(s))).transpose()?;
    let image = if remove_photo {
        Some(None)
    } else {
        photo.as_deref().map(read_photo).transpose()?.map(Some)
    };

    let edit = EditReading {
        value,
        timestamp,
        context,
        notes,
        image,
    };
    if edit.value.is_none()
        && edit.timestamp.is_none()
        && edit.context.is_none()
        && edit.notes.is_none()
        && edit.image.is_none()
    {
        bail!("Nothing to update. Provide --value, --context, --at, --notes or --photo");
    }

    let Some(reading) = service.edit_reading(id, edit).await? else {
        if json {
            println!("{}", json_error(&format!("No reading with ID {id}")));
            return Ok(());
        }
        bail!("No reading with ID {id}");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&reading)?);
    } else {
        print_reading("Updated", &reading, prefs(service).await?);
    }

    Ok(())
}

pub(crate) async fn cmd_delete(service: &GlucoseService, id: &str, json: bool) -> Result<()> {
    let deleted = service.delete_reading(id).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": deleted }));
    } else if deleted {
        println!("Deleted reading {id}");
    } else {
        eprintln!("No reading with ID {id}");
    }

    Ok(())
}

pub(crate) async fn cmd_photo(
    service: &GlucoseService,
    id: &str,
    output: &Path,
    json: bool,
) -> Result<()> {
    let Some(reading) = service.get_reading(id).await? else {
        if json {
            println!("{}", json_error(&format!("No reading with ID {id}")));
            return Ok(());
        }
        bail!("No reading with ID {id}");
    };
    let ReadingImage::Loaded(image) = reading.image else {
        if json {
            println!("{}", json_error(&format!("Reading {id} has no photo")));
            return Ok(());
        }
        bail!("Reading {id} has no photo");
    };

    std::fs::write(output, &image)
        .with_context(|| format!("Failed to write photo: {}", output.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "id": id, "path": output.display().to_string(), "bytes": image.len() })
        );
    } else {
        println!("Saved photo ({} bytes) to {}", image.len(), output.display());
    }

    Ok(())
}
