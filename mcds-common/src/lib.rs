pub mod config;
pub mod model;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{LoaderConfig, InputConfig, LoaderSettings, OutputConfig};
pub use model::{ContinuumVariable, DiscreteCells, Measurement, Mesh, Metadata};
pub use snapshot::{Snapshot, SubstrateSummary};
pub use vecmath::{Point3, clamp};
