// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! room-volume - export room volumes for web viewers
//!
//! Reads a JSON room document, rebuilds every room's closed shell as a
//! triangle mesh and writes:
//!
//! - `manifest.txt` - room count and per-room buffer ranges
//! - `rooms.bin` - f32 millimetre coordinates followed by u16 indices
//! - `shapes.json` - display shapes with the room parameter dictionary
//!
//! Settings come from `ROOM_VOLUME_*` environment variables, then the
//! document's own unit, then command-line flags.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use room_volume_export::{ExportConfig, ExportSession, LengthUnit, RoomDocument};

#[derive(Parser)]
#[command(name = "room-volume")]
#[command(about = "Export room volumes as compact meshes", long_about = None)]
struct Cli {
    /// Room document (JSON)
    model: PathBuf,

    /// Directory for the exported artifacts
    #[arg(short, long, default_value = "room-volume-out")]
    output_dir: PathBuf,

    /// Build meshes on a single thread
    #[arg(long)]
    sequential: bool,

    /// Length unit of the document's coordinates (feet, inches, metres, millimetres)
    #[arg(short, long)]
    unit: Option<LengthUnit>,

    /// Print skipped and degraded rooms as JSON lines
    #[arg(long)]
    diagnostics: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,room_volume_export=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let file = File::open(&cli.model)
        .with_context(|| format!("failed to open {}", cli.model.display()))?;
    let document = RoomDocument::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to read room document {}", cli.model.display()))?;

    let mut config = ExportConfig::from_env();
    if let Some(unit) = document.unit {
        config.unit = unit;
    }
    if let Some(id) = &document.application_id {
        config.application_id = id.clone();
    }
    if let Some(unit) = cli.unit {
        config.unit = unit;
    }
    if cli.sequential {
        config.parallel = false;
    }

    tracing::info!(
        model = %cli.model.display(),
        rooms = document.rooms.len(),
        unit = ?config.unit,
        tolerance_mm = config.tolerance_mm,
        target = ?config.target,
        fallback = ?config.fallback,
        "Starting room-volume"
    );

    let mut session = ExportSession::new(config).context("invalid export configuration")?;
    session
        .process(&document.rooms)
        .context("export session aborted")?;
    let output = session.finish();

    output
        .write_to(&cli.output_dir)
        .with_context(|| format!("failed to write {}", cli.output_dir.display()))?;

    if cli.diagnostics {
        for diagnostic in &output.diagnostics {
            println!("{}", serde_json::to_string(diagnostic)?);
        }
    }

    println!(
        "{} of {} room{} exported ({} vertices, {} triangles) to {}",
        output.stats.rooms_exported,
        output.stats.rooms_total,
        room_volume_export::encoder::plural_suffix(output.stats.rooms_total),
        output.stats.vertices,
        output.stats.triangles,
        cli.output_dir.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "room-volume",
            "model.json",
            "--output-dir",
            "out",
            "--sequential",
            "--unit",
            "metres",
        ]);
        assert_eq!(cli.model, PathBuf::from("model.json"));
        assert_eq!(cli.output_dir, PathBuf::from("out"));
        assert!(cli.sequential);
        assert_eq!(cli.unit, Some(LengthUnit::Metres));
        assert!(!cli.diagnostics);
    }
}
