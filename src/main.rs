//! EMR Editor - command-line front end
//!
//! Inspects and manages the locally saved document and the page setup.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use emr_editor::{AppConfig, EmrApp, SaveStatus};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "emr-editor")]
#[command(version)]
#[command(about = "Manage the locally saved medical-record document and page setup", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show save state and autosave settings (default)
    Status,

    /// Show page size, margins and content area
    Geometry,

    /// Replace the saved document with the contents of a file
    Import {
        /// Document file (serialized rich text)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the saved document
    Export,

    /// Delete the saved document
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    tracing::info!("Starting EMR Editor...");

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Using default config: {:#}", e);
        AppConfig::default()
    });
    let app = EmrApp::with_file_storage(config)?;
    // A broken store must not block `clear` or `import` from repairing it
    let restored = app.restore().await.unwrap_or_else(|e| {
        tracing::error!("Could not restore saved content: {:#}", e);
        false
    });

    match cli.command.unwrap_or(Command::Status) {
        Command::Status => print_status(&app, restored),
        Command::Geometry => println!("{}", app.geometry_report()),
        Command::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read file: {}", file.display()))?;
            app.editor.set_content(content);
            app.editor
                .save_content()
                .await
                .with_context(|| format!("Failed to save {}", file.display()))?;
            println!("Saved at {}", app.editor.formatted_last_saved());
        }
        Command::Export => {
            if !restored {
                bail!("No saved content");
            }
            print!("{}", app.editor.content());
        }
        Command::Clear => {
            app.editor.clear_saved_content().await?;
            println!("Cleared saved content");
        }
    }

    Ok(())
}

fn print_status(app: &EmrApp, restored: bool) {
    let status = match app.editor.save_status() {
        SaveStatus::Saved => "saved",
        SaveStatus::Saving => "saving",
        SaveStatus::Unsaved => "unsaved",
    };
    println!("Status: {status}");
    println!("Last saved: {}", app.editor.formatted_last_saved());
    if restored {
        println!("Content: {} bytes", app.editor.content().len());
    }
    println!(
        "Autosave: {} (every {}s)",
        if app.editor.auto_save_enabled() { "on" } else { "off" },
        app.editor.auto_save_interval()
    );
}
