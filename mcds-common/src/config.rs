use serde::{Deserialize, Serialize};
use anyhow::Result;
use std::path::{Path, PathBuf};

// Where the simulator wrote its output, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InputConfig {
    pub output_dir: PathBuf,
    #[serde(default = "default_manifest_prefix")]
    pub manifest_prefix: String, // Manifests are named <prefix>########.xml
}

// Knobs for reading a single timestep
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoaderSettings {
    /// `simplified_data` blocks whose `source` attribute differs are skipped.
    #[serde(default = "default_cell_source")]
    pub cell_source: String,
    #[serde(default = "default_mesh_variable")]
    pub mesh_variable: String,
    #[serde(default = "default_microenvironment_variable")]
    pub microenvironment_variable: String,
    #[serde(default = "default_cells_variable")]
    pub cells_variable: String,
    /// Tolerance used when matching voxel centers to axis values.
    #[serde(default = "default_coordinate_tolerance")]
    pub coordinate_tolerance: f64,
    /// Largest difference between per-axis spacings before a warning is logged.
    #[serde(default = "default_spacing_tolerance")]
    pub spacing_tolerance: f64,
}

// Configuration for export settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_summary: bool,
    #[serde(default)]
    pub save_cells_csv: bool,
    #[serde(default)]
    pub save_tracks_csv: bool, // One row per (cell, timestep) position sample
    pub format: Option<String>, // Summary format: "json", "bincode", "messagepack"
    #[serde(default = "default_parallel")]
    pub parallel: bool, // Load timesteps on the rayon pool
}

fn default_manifest_prefix() -> String {
    "output".to_string()
}

fn default_cell_source() -> String {
    "PhysiCell".to_string()
}

fn default_mesh_variable() -> String {
    "mesh".to_string()
}

fn default_microenvironment_variable() -> String {
    "multiscale_microenvironment".to_string()
}

fn default_cells_variable() -> String {
    "cells".to_string()
}

fn default_coordinate_tolerance() -> f64 {
    1e-10
}

fn default_spacing_tolerance() -> f64 {
    1e-10
}

fn default_parallel() -> bool {
    true
}

// Implement default for LoaderSettings if the entire section might be missing
impl Default for LoaderSettings {
    fn default() -> Self {
        LoaderSettings {
            cell_source: default_cell_source(),
            mesh_variable: default_mesh_variable(),
            microenvironment_variable: default_microenvironment_variable(),
            cells_variable: default_cells_variable(),
            coordinate_tolerance: default_coordinate_tolerance(),
            spacing_tolerance: default_spacing_tolerance(),
        }
    }
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoaderConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub loader: LoaderSettings,
    pub output: OutputConfig,
}

impl LoaderConfig {
    /// Loads the loader configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;

        Ok(config)
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: LoaderConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;

        // --- Validation ---
        if config.input.manifest_prefix.is_empty() {
            anyhow::bail!("manifest_prefix must not be empty.");
        }
        if !(config.loader.coordinate_tolerance > 0.0) {
            anyhow::bail!("coordinate_tolerance must be positive.");
        }
        if !(config.loader.spacing_tolerance >= 0.0) {
            anyhow::bail!("spacing_tolerance must not be negative.");
        }
        if let Some(format) = config.output.format.as_deref() {
            if !matches!(format, "json" | "bincode" | "messagepack") {
                anyhow::bail!("Unknown output format '{}'. Expected json, bincode or messagepack.", format);
            }
        }

        Ok(config)
    }
}
