//! Typed records for one timestep of MultiCellDS output.
//!
//! Everything here is built once by the loader and never mutated afterwards.

use crate::vecmath::Point3;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// A numeric value paired with the unit string the manifest declared for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub units: String,
}

impl Measurement {
    pub fn new(value: f64, units: impl Into<String>) -> Self {
        Measurement { value, units: units.into() }
    }
}

/// Simulation clock and unit information from the manifest's `metadata` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Simulated time at which the timestep was written.
    pub current_time: Measurement,
    /// Wall-clock time the simulator had been running.
    pub current_runtime: Measurement,
    /// Units of every spatial coordinate in the mesh and the cell table.
    pub spatial_units: String,
}

/// Rectilinear voxel mesh.
///
/// Axis coordinates are kept in file order (ascending). The flat voxel arrays
/// keep the order of the mesh matrix file, which is not necessarily row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub x_coordinates: Vec<f64>,
    pub y_coordinates: Vec<f64>,
    pub z_coordinates: Vec<f64>,
    /// Voxel centers, one `[x, y, z]` per voxel.
    pub voxel_centers: Vec<[f64; 3]>,
    /// Voxel volumes, parallel to `voxel_centers`.
    pub voxel_volumes: Vec<f64>,
}

impl Mesh {
    /// Shape of every per-voxel array: `(ny, nx, nz)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.y_coordinates.len(), self.x_coordinates.len(), self.z_coordinates.len())
    }

    /// Number of voxels implied by the axes.
    pub fn voxel_count(&self) -> usize {
        let (ny, nx, nz) = self.shape();
        nx * ny * nz
    }

    /// Lower corner of the grid of voxel centers.
    pub fn min_corner(&self) -> Point3 {
        Point3::new(
            axis_min(&self.x_coordinates),
            axis_min(&self.y_coordinates),
            axis_min(&self.z_coordinates),
        )
    }

    /// Upper corner of the grid of voxel centers.
    pub fn max_corner(&self) -> Point3 {
        Point3::new(
            axis_max(&self.x_coordinates),
            axis_max(&self.y_coordinates),
            axis_max(&self.z_coordinates),
        )
    }

    /// Center of voxel `(i, j, k)` where `i` indexes x, `j` y and `k` z.
    pub fn voxel_center(&self, i: usize, j: usize, k: usize) -> Point3 {
        Point3::new(self.x_coordinates[i], self.y_coordinates[j], self.z_coordinates[k])
    }

    /// Outer product of the three axes, Cartesian (`xy`) indexing: element
    /// `[j, i, k]` of each array holds the coordinate of voxel `(i, j, k)`.
    pub fn meshgrid(&self) -> (Array3<f64>, Array3<f64>, Array3<f64>) {
        let shape = self.shape();
        let xx = Array3::from_shape_fn(shape, |(_, i, _)| self.x_coordinates[i]);
        let yy = Array3::from_shape_fn(shape, |(j, _, _)| self.y_coordinates[j]);
        let zz = Array3::from_shape_fn(shape, |(_, _, k)| self.z_coordinates[k]);
        (xx, yy, zz)
    }
}

fn axis_min(axis: &[f64]) -> f64 {
    axis.iter().copied().fold(f64::INFINITY, f64::min)
}

fn axis_max(axis: &[f64]) -> f64 {
    axis.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// One diffusing substrate defined over the mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuumVariable {
    pub name: String,
    pub units: String,
    /// Concentrations indexed `[j, i, k]`, shape `(ny, nx, nz)`.
    pub data: Array3<f64>,
    pub diffusion_coefficient: Measurement,
    pub decay_rate: Measurement,
}

/// Per-agent fields for one timestep, in label declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscreteCells {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl DiscreteCells {
    /// Pairs field names with their columns. Returns `None` when the two lists
    /// differ in length or the columns differ in length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Option<Self> {
        if names.len() != columns.len() {
            return None;
        }
        if let Some(first) = columns.first() {
            if columns.iter().any(|c| c.len() != first.len()) {
                return None;
            }
        }
        Some(DiscreteCells { names, columns })
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> &[String] {
        &self.names
    }

    /// Column for `name`, if present.
    pub fn field(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Iterates `(name, column)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter().map(Vec::as_slice))
    }
}
