use anyhow::Result;
use clap::Parser;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use mcds_common::LoaderConfig;
use mcds_loader::{export, CellTracks, LoadError, TimeSeries};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the loader's config.toml
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the output directory named in the config
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting MultiCellDS loader...");

    // --- Load Configuration ---
    let mut config = LoaderConfig::load(&args.config)?;
    if let Some(dir) = args.output_dir {
        config.input.output_dir = dir;
    }
    debug!("Loader settings: {:#?}", config.loader);
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Load Timesteps ---
    let start_time = Instant::now();
    let series = match TimeSeries::load(
        &config.input.output_dir,
        &config.input.manifest_prefix,
        &config.loader,
        config.output.parallel,
    ) {
        Ok(series) => series,
        Err(e) => {
            error!("Error loading timesteps from '{}': {}", config.input.output_dir.display(), e);
            anyhow::bail!("Failed to load time series.");
        }
    };
    info!(
        "Loaded {} timesteps in {:.3} seconds.",
        series.len(),
        start_time.elapsed().as_secs_f64()
    );
    if series.is_empty() {
        warn!(
            "No '{}########.xml' manifests found in '{}'.",
            config.input.manifest_prefix,
            config.input.output_dir.display()
        );
    }
    for timestep in &series {
        debug!(
            "{} | t = {} {} | {} cells | substrates: {:?}",
            timestep.manifest_path().display(),
            timestep.time(),
            timestep.metadata().current_time.units,
            timestep.cells().len(),
            timestep.substrate_names()
        );
    }

    // --- Save Exports ---
    let base = PathBuf::from(&config.output.base_filename);
    if config.output.save_summary {
        let format = config.output.format.as_deref().unwrap_or("json");
        let snapshots: Vec<_> = series.iter().map(|t| t.snapshot()).collect();
        export::save_snapshots(&snapshots, &base, format)?;
    } else {
        info!("Skipping saving snapshots as per config (save_summary is false).");
    }

    if config.output.save_cells_csv {
        export::save_cell_tables(&series, &base)?;
    } else {
        info!("Skipping saving cell tables as per config.");
    }

    if config.output.save_tracks_csv {
        match CellTracks::from_series(&series) {
            Ok(tracks) => {
                export::save_tracks(&tracks, &base)?;
            }
            Err(LoadError::MissingCellField(field)) => {
                warn!("Cannot build cell tracks: field '{}' is not recorded.", field);
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        info!("Skipping saving cell tracks as per config.");
    }

    info!("Loading Complete.");
    Ok(())
}
