//! Writes loaded timesteps back out: snapshot summaries in the configured
//! serialization format, plus optional CSV tables.

use anyhow::{Context, Result};
use log::{error, info};
use mcds_common::Snapshot;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::series::TimeSeries;
use crate::tracks::CellTracks;

/// Writes `snapshots` to `<base>_snapshots.<ext>` in `format` and returns the path.
///
/// Unknown formats fall back to JSON with an error logged.
pub fn save_snapshots(snapshots: &[Snapshot], base: &Path, format: &str) -> Result<PathBuf> {
    match format {
        "json" => write_json(snapshots, base),
        "bincode" => {
            // Binary format (compact, Rust-only)
            let filename = with_suffix(base, "_snapshots.bin");
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename.display()))?;
            bincode::serialize_into(BufWriter::new(file), snapshots)
                .context("Error serializing snapshots to bincode")?;
            info!("{} snapshots saved to {} (binary format)", snapshots.len(), filename.display());
            Ok(filename)
        }
        "messagepack" => {
            // MessagePack format (compact and cross-platform)
            let filename = with_suffix(base, "_snapshots.msgpack");
            let file = File::create(&filename)
                .with_context(|| format!("Error creating snapshot file '{}'", filename.display()))?;
            let mut writer = BufWriter::new(file);
            rmp_serde::encode::write(&mut writer, snapshots)
                .context("Error serializing snapshots to MessagePack")?;
            writer.flush()?;
            info!("{} snapshots saved to {} (MessagePack format)", snapshots.len(), filename.display());
            Ok(filename)
        }
        _ => {
            error!("Unknown output format: {}. Using JSON instead.", format);
            write_json(snapshots, base)
        }
    }
}

fn write_json(snapshots: &[Snapshot], base: &Path) -> Result<PathBuf> {
    let filename = with_suffix(base, "_snapshots.json");
    let json_string = serde_json::to_string(snapshots).context("Error serializing snapshots to JSON")?;
    std::fs::write(&filename, json_string.as_bytes())
        .with_context(|| format!("Error writing snapshot JSON to file '{}'", filename.display()))?;
    info!("{} snapshots saved to {}", snapshots.len(), filename.display());
    Ok(filename)
}

/// Writes one `<base>_<manifest stem>_cells.csv` per timestep.
pub fn save_cell_tables(series: &TimeSeries, base: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(series.len());
    for timestep in series {
        let stem = timestep
            .manifest_path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let filename = with_suffix(base, &format!("_{}_cells.csv", stem));
        timestep
            .cell_table()
            .save_csv(&filename)
            .with_context(|| format!("Error saving CSV file '{}'", filename.display()))?;
        written.push(filename);
    }
    info!("Cell tables saved for {} timesteps.", written.len());
    Ok(written)
}

/// Writes every cell track to `<base>_tracks.csv`.
pub fn save_tracks(tracks: &CellTracks, base: &Path) -> Result<PathBuf> {
    let filename = with_suffix(base, "_tracks.csv");
    let file = File::create(&filename)
        .with_context(|| format!("Error creating track file '{}'", filename.display()))?;
    tracks
        .write_csv(BufWriter::new(file))
        .with_context(|| format!("Error saving CSV file '{}'", filename.display()))?;
    info!("Tracks for {} cells saved to {}", tracks.len(), filename.display());
    Ok(filename)
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
