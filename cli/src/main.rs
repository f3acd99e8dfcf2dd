mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_dashboard, cmd_delete, cmd_edit, cmd_history, cmd_log, cmd_photo, cmd_settings_language,
    cmd_settings_name, cmd_settings_show, cmd_settings_target, cmd_settings_unit, cmd_trends,
};
use crate::config::Config;
use glucose_core::GlucoseService;

#[derive(Parser)]
#[command(
    name = "glucose",
    version,
    about = "A personal blood glucose log",
    long_about = "Record blood glucose readings, browse history and view trends.\n\n\
                  Values are entered and shown in your preferred unit (mg/dL or mmol/L)\n\
                  and always stored in mg/dL."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a glucose reading
    Log {
        /// Reading value in your preferred unit
        value: String,
        /// Context: fasting, pre-meal, post-meal-1h, post-meal-2h, bedtime, other
        #[arg(short, long, default_value = "fasting")]
        context: String,
        /// When the reading was taken ("now", "HH:MM", or "YYYY-MM-DD HH:MM")
        #[arg(long)]
        at: Option<String>,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Attach a photo from a file
        #[arg(long, value_name = "PATH")]
        photo: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a reading
    Edit {
        /// Reading ID
        id: String,
        /// New value in your preferred unit
        #[arg(long)]
        value: Option<String>,
        /// New context
        #[arg(short, long)]
        context: Option<String>,
        /// New time ("now", "HH:MM", or "YYYY-MM-DD HH:MM")
        #[arg(long)]
        at: Option<String>,
        /// Replace the notes
        #[arg(long, conflicts_with = "clear_notes")]
        notes: Option<String>,
        /// Remove the notes
        #[arg(long)]
        clear_notes: bool,
        /// Replace the photo with a file
        #[arg(long, value_name = "PATH", conflicts_with = "remove_photo")]
        photo: Option<PathBuf>,
        /// Remove the photo
        #[arg(long)]
        remove_photo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a reading and its photo
    Delete {
        /// Reading ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show all readings grouped by day
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the latest reading, today's summary and recent readings
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show readings and min/avg/max over a time window
    Trends {
        /// Window: today, 7d, 30d, 6m (or any Nd / Nm)
        #[arg(short, long, default_value = "7d", conflicts_with_all = ["from", "to"])]
        range: String,
        /// Custom window start (YYYY-MM-DD or today/yesterday)
        #[arg(long)]
        from: Option<String>,
        /// Custom window end (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long, requires = "from")]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a reading's photo to a file
    Photo {
        /// Reading ID
        id: String,
        /// Destination file
        output: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// View or change preferences
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the display unit: mg/dL or mmol/L
    Unit {
        unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set your name (omit to clear it)
    Name {
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the language: en or zh
    Language {
        language: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the target range in mg/dL
    Target {
        min: f64,
        max: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    debug!(db = %config.db_path.display(), "using database");
    let service = GlucoseService::new(&config.db_path);

    match cli.command {
        Commands::Log {
            value,
            context,
            at,
            notes,
            photo,
            json,
        } => cmd_log(&service, &value, &context, at, notes, photo, json).await,
        Commands::Edit {
            id,
            value,
            context,
            at,
            notes,
            clear_notes,
            photo,
            remove_photo,
            json,
        } => {
            let notes = if clear_notes { Some(None) } else { notes.map(Some) };
            cmd_edit(
                &service,
                &id,
                value,
                context.as_deref(),
                at,
                notes,
                photo,
                remove_photo,
                json,
            )
            .await
        }
        Commands::Delete { id, json } => cmd_delete(&service, &id, json).await,
        Commands::History { json } => cmd_history(&service, json).await,
        Commands::Dashboard { json } => cmd_dashboard(&service, json).await,
        Commands::Trends {
            range,
            from,
            to,
            json,
        } => cmd_trends(&service, &range, from, to, json).await,
        Commands::Photo { id, output, json } => cmd_photo(&service, &id, &output, json).await,
        Commands::Settings { command } => match command {
            SettingsCommands::Show { json } => cmd_settings_show(&service, json).await,
            SettingsCommands::Unit { unit, json } => cmd_settings_unit(&service, &unit, json).await,
            SettingsCommands::Name { name, json } => cmd_settings_name(&service, name, json).await,
            SettingsCommands::Language { language, json } => {
                cmd_settings_language(&service, &language, json).await
            }
            SettingsCommands::Target { min, max, json } => {
                cmd_settings_target(&service, min, max, json).await
            }
        },
    }
}
