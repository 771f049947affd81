//! A run's worth of timesteps discovered in one output directory.

use log::{debug, info};
use mcds_common::LoaderSettings;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, Result};
use crate::timestep::Timestep;

/// True for `<prefix>` followed by one or more digits and `.xml`.
fn is_manifest_name(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".xml"))
        .map_or(false, |digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Manifest file names in `output_dir`, sorted by name.
pub fn discover_manifests<P: AsRef<Path>>(output_dir: P, prefix: &str) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    let entries = std::fs::read_dir(output_dir).map_err(|source| LoadError::ManifestIo {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::ManifestIo {
            path: output_dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_manifest_name(&name, prefix) {
            names.push(PathBuf::from(name));
        }
    }
    names.sort();
    debug!("Found {} manifests in {}", names.len(), output_dir.display());
    Ok(names)
}

/// Every timestep of a run, ordered by manifest name.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    output_dir: PathBuf,
    timesteps: Vec<Timestep>,
}

impl TimeSeries {
    /// Discovers and loads every `<prefix>########.xml` manifest under `output_dir`.
    ///
    /// With `parallel` set, timesteps load concurrently on the rayon pool. The
    /// first failure aborts the whole series.
    pub fn load<P: AsRef<Path>>(
        output_dir: P,
        prefix: &str,
        settings: &LoaderSettings,
        parallel: bool,
    ) -> Result<Self> {
        let output_dir = output_dir.as_ref();
        let manifests = discover_manifests(output_dir, prefix)?;
        info!(
            "Loading {} timesteps from {} ({}).",
            manifests.len(),
            output_dir.display(),
            if parallel { "parallel" } else { "serial" }
        );

        let timesteps = if parallel {
            manifests
                .par_iter()
                .map(|name| Timestep::load_with(name, output_dir, settings))
                .collect::<Result<Vec<_>>>()?
        } else {
            manifests
                .iter()
                .map(|name| Timestep::load_with(name, output_dir, settings))
                .collect::<Result<Vec<_>>>()?
        };

        Ok(TimeSeries {
            output_dir: output_dir.to_path_buf(),
            timesteps,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Timestep> {
        self.timesteps.get(idx)
    }

    /// Simulation time of each timestep, in load order.
    pub fn times(&self) -> Vec<f64> {
        self.timesteps.iter().map(Timestep::time).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Timestep> {
        self.timesteps.iter()
    }

    pub fn timesteps(&self) -> &[Timestep] {
        &self.timesteps
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a Timestep;
    type IntoIter = std::slice::Iter<'a, Timestep>;

    fn into_iter(self) -> Self::IntoIter {
        self.timesteps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_name_filter() {
        assert!(is_manifest_name("output00000003.xml", "output"));
        assert!(!is_manifest_name("output.xml", "output"));
        assert!(!is_manifest_name("output00000003_cells.mat", "output"));
        assert!(!is_manifest_name("initial.xml", "output"));
        assert!(!is_manifest_name("output0000000a.xml", "output"));
    }

    #[test]
    fn test_discover_sorts_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["output00000002.xml", "output00000000.xml", "final.xml", "output00000001.xml"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let found = discover_manifests(dir.path(), "output").unwrap();
        assert_eq!(
            found,
            vec![
                PathBuf::from("output00000000.xml"),
                PathBuf::from("output00000001.xml"),
                PathBuf::from("output00000002.xml"),
            ]
        );
    }

    #[test]
    fn test_empty_directory_loads_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let series = TimeSeries::load(dir.path(), "output", &LoaderSettings::default(), true).unwrap();
        assert!(series.is_empty());
        assert!(series.times().is_empty());
    }
}
