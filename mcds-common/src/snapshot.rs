use serde::{Serialize, Deserialize};

/// Summary statistics for one substrate field at one timestep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstrateSummary {
    pub name: String,
    pub units: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// A compact record of one loaded timestep, written out by the exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Manifest file name the timestep was loaded from.
    pub manifest: String,
    /// The simulation time at which the timestep was written.
    pub time: f64,
    pub time_units: String,
    /// Number of agents in the cell table.
    pub cell_count: usize,
    /// Number of voxels in the mesh.
    pub voxel_count: usize,
    /// One entry per declared substrate, in declaration order.
    pub substrates: Vec<SubstrateSummary>,
}
