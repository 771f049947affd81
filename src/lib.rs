//! Loader for MultiCellDS simulation snapshots.
//!
//! A snapshot is an XML manifest plus MATLAB Level 4 matrix files holding the
//! voxel mesh, substrate concentrations and per-cell fields. [`Timestep`]
//! loads one snapshot; [`TimeSeries`] loads every snapshot of a run.

pub mod cells;
pub mod error;
pub mod export;
pub mod grid;
pub mod manifest;
pub mod matlab;
pub mod series;
pub mod timestep;
pub mod tracks;

pub use cells::{CellRow, CellTable};
pub use error::{LoadError, Result};
pub use grid::{Spacing, VoxelIndex, VoxelLookup};
pub use manifest::Manifest;
pub use matlab::MatrixError;
pub use series::TimeSeries;
pub use timestep::Timestep;
pub use tracks::{CellTracks, TrackPoint};

pub use mcds_common::{
    ContinuumVariable, DiscreteCells, LoaderSettings, Measurement, Mesh, Metadata, Point3, Snapshot,
};
