use log::{debug, info, warn};
use mcds_common::{
    ContinuumVariable, DiscreteCells, LoaderSettings, Mesh, Metadata, Point3, Snapshot, SubstrateSummary,
};
use ndarray::{Array2, Array3, Axis};
use std::path::{Path, PathBuf};

use crate::cells::CellTable;
use crate::error::{LoadError, Result};
use crate::grid::{self, Spacing, VoxelIndex, VoxelLookup};
use crate::manifest::Manifest;
use crate::matlab;

/// Rows 0-2 of the mesh and microenvironment matrices hold voxel centers,
/// row 3 voxel volumes; substrate rows follow.
const VOXEL_HEADER_ROWS: usize = 4;

/// All output of a single simulation timestep.
///
/// Built in one pass by [`Timestep::load`] and immutable afterwards. Loading
/// another timestep means constructing another value.
#[derive(Debug, Clone)]
pub struct Timestep {
    manifest_path: PathBuf,
    metadata: Metadata,
    mesh: Mesh,
    spacing: Spacing,
    substrates: Vec<ContinuumVariable>,
    cells: DiscreteCells,
}

impl Timestep {
    /// Loads `xml_file` (relative to `output_dir`) with default settings.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(xml_file: P, output_dir: Q) -> Result<Self> {
        Self::load_with(xml_file, output_dir, &LoaderSettings::default())
    }

    /// Loads `xml_file` (relative to `output_dir`) and every matrix file it references.
    pub fn load_with<P: AsRef<Path>, Q: AsRef<Path>>(
        xml_file: P,
        output_dir: Q,
        settings: &LoaderSettings,
    ) -> Result<Self> {
        let output_dir = output_dir.as_ref();
        let xml_path = output_dir.join(xml_file.as_ref());

        info!("Reading {}", xml_path.display());
        let manifest = Manifest::from_file(&xml_path, &settings.cell_source)?;

        let mesh = read_mesh(&manifest, &xml_path, output_dir, settings)?;
        let spacing = grid::mesh_spacing(&mesh, settings.spacing_tolerance);
        let substrates = read_substrates(&manifest, &mesh, &xml_path, output_dir, settings)?;
        let cells = read_cells(&manifest, &xml_path, output_dir, settings)?;

        Ok(Timestep {
            manifest_path: xml_path,
            metadata: manifest.metadata,
            mesh,
            spacing,
            substrates,
            cells,
        })
    }

    // --- Metadata ---

    /// Path of the manifest this timestep was loaded from.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Current simulation time, in `metadata().current_time.units`.
    pub fn time(&self) -> f64 {
        self.metadata.current_time.value
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    // --- Mesh ---

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Full 3-D meshgrid of voxel centers `(xx, yy, zz)`, each shaped `(ny, nx, nz)`.
    pub fn mesh_grid(&self) -> (Array3<f64>, Array3<f64>, Array3<f64>) {
        self.mesh.meshgrid()
    }

    /// x and y meshgrids of the first z plane, each shaped `(ny, nx)`.
    pub fn mesh_grid_2d(&self) -> (Array2<f64>, Array2<f64>) {
        let (xx, yy, _) = self.mesh.meshgrid();
        (
            xx.index_axis(Axis(2), 0).to_owned(),
            yy.index_axis(Axis(2), 0).to_owned(),
        )
    }

    /// Voxel centers in file order as a `3 x n` matrix.
    pub fn linear_voxels(&self) -> Array2<f64> {
        Array2::from_shape_fn((3, self.mesh.voxel_centers.len()), |(axis, voxel)| {
            self.mesh.voxel_centers[voxel][axis]
        })
    }

    /// Voxel volumes, parallel to [`Timestep::linear_voxels`].
    pub fn voxel_volumes(&self) -> &[f64] {
        &self.mesh.voxel_volumes
    }

    /// Distance between voxel centers along each axis.
    pub fn mesh_spacing(&self) -> Spacing {
        self.spacing
    }

    /// Voxel containing `point`, clamping out-of-bounds coordinates with a warning.
    pub fn containing_voxel(&self, point: Point3) -> VoxelIndex {
        self.locate(point).index
    }

    /// Like [`Timestep::containing_voxel`] but also reports whether clamping happened.
    pub fn locate(&self, point: Point3) -> VoxelLookup {
        grid::locate_voxel(&self.mesh, &self.spacing, point)
    }

    // --- Microenvironment ---

    /// Substrate names in declaration order.
    pub fn substrate_names(&self) -> Vec<&str> {
        self.substrates.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn substrates(&self) -> &[ContinuumVariable] {
        &self.substrates
    }

    pub fn substrate(&self, name: &str) -> Result<&ContinuumVariable> {
        self.substrates
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| LoadError::UnknownSubstrate(name.to_string()))
    }

    /// Concentrations of `name` over the whole mesh, shaped `(ny, nx, nz)`.
    pub fn concentrations(&self, name: &str) -> Result<&Array3<f64>> {
        Ok(&self.substrate(name)?.data)
    }

    /// Concentrations of `name` on the z plane at `z_slice`, shaped `(ny, nx)`.
    ///
    /// `z_slice` must equal one of the mesh's z coordinates exactly.
    pub fn concentration_plane(&self, name: &str, z_slice: f64) -> Result<Array2<f64>> {
        let k = self
            .mesh
            .z_coordinates
            .iter()
            .position(|&z| z == z_slice)
            .ok_or(LoadError::ZSliceNotFound(z_slice))?;
        let data = self.concentrations(name)?;
        Ok(data.index_axis(Axis(2), k).to_owned())
    }

    /// Concentration of every substrate in the voxel containing `point`,
    /// in the order of [`Timestep::substrate_names`].
    pub fn concentrations_at(&self, point: Point3) -> Vec<f64> {
        let idx = self.containing_voxel(point).array_index();
        self.substrates.iter().map(|s| s.data[idx]).collect()
    }

    // --- Cells ---

    pub fn cells(&self) -> &DiscreteCells {
        &self.cells
    }

    /// Names of all per-cell fields.
    pub fn cell_variables(&self) -> &[String] {
        self.cells.field_names()
    }

    /// All cells as a table.
    pub fn cell_table(&self) -> CellTable {
        CellTable::from_cells(&self.cells)
    }

    /// Cells whose position lies strictly inside the voxel containing `point`.
    pub fn cell_table_at(&self, point: Point3) -> Result<CellTable> {
        for field in ["position_x", "position_y", "position_z"] {
            if self.cells.field(field).is_none() {
                return Err(LoadError::MissingCellField(field.to_string()));
            }
        }
        let idx = self.containing_voxel(point);
        let center = self.mesh.voxel_center(idx.i, idx.j, idx.k);
        let half = self.spacing.as_point().scale(0.5);

        Ok(self.cell_table().filter(|row| {
            match (row.get("position_x"), row.get("position_y"), row.get("position_z")) {
                (Some(x), Some(y), Some(z)) => Point3::new(x, y, z).strictly_within(center, half),
                _ => false,
            }
        }))
    }

    // --- Summary ---

    /// Compact summary of this timestep for export.
    pub fn snapshot(&self) -> Snapshot {
        let manifest = self
            .manifest_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let substrates = self
            .substrates
            .iter()
            .map(|s| {
                let count = s.data.len().max(1) as f64;
                SubstrateSummary {
                    name: s.name.clone(),
                    units: s.units.clone(),
                    min: s.data.iter().copied().fold(f64::INFINITY, f64::min),
                    max: s.data.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    mean: s.data.sum() / count,
                }
            })
            .collect();
        Snapshot {
            manifest,
            time: self.time(),
            time_units: self.metadata.current_time.units.clone(),
            cell_count: self.cells.len(),
            voxel_count: self.mesh.voxel_count(),
            substrates,
        }
    }
}

/// Loads `variable` from a file named in the manifest, tagging failures with both paths.
fn read_referenced(xml_path: &Path, file: &Path, variable: &str) -> Result<Array2<f64>> {
    let matrix = matlab::load_matrix(file, variable).map_err(|source| LoadError::ReferencedFile {
        xml: xml_path.to_path_buf(),
        file: file.to_path_buf(),
        source,
    })?;
    info!("Reading {}", file.display());
    Ok(matrix)
}

fn read_mesh(manifest: &Manifest, xml_path: &Path, output_dir: &Path, settings: &LoaderSettings) -> Result<Mesh> {
    let declared = &manifest.mesh;
    let voxel_path = output_dir.join(&declared.voxel_file);
    let matrix = read_referenced(xml_path, &voxel_path, &settings.mesh_variable)?;

    let voxel_count = declared.x_coordinates.len() * declared.y_coordinates.len() * declared.z_coordinates.len();
    if matrix.nrows() < VOXEL_HEADER_ROWS {
        return Err(LoadError::shape(
            format!("mesh matrix '{}' rows", voxel_path.display()),
            VOXEL_HEADER_ROWS,
            matrix.nrows(),
        ));
    }
    if matrix.ncols() != voxel_count {
        return Err(LoadError::shape(
            format!("mesh matrix '{}' voxel count", voxel_path.display()),
            voxel_count,
            matrix.ncols(),
        ));
    }

    let voxel_centers = matrix
        .columns()
        .into_iter()
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    let voxel_volumes = matrix.row(3).to_vec();

    Ok(Mesh {
        x_coordinates: declared.x_coordinates.clone(),
        y_coordinates: declared.y_coordinates.clone(),
        z_coordinates: declared.z_coordinates.clone(),
        voxel_centers,
        voxel_volumes,
    })
}

/// Grid position of every voxel in file order, found by matching its center
/// against the axes. Voxel order in the matrix files is not guaranteed to be
/// row-major, so values are placed through this map rather than reshaped.
fn voxel_placement(mesh: &Mesh, tolerance: f64) -> Result<Vec<VoxelIndex>> {
    let (ny, nx, nz) = mesh.shape();
    let mut seen = Array3::from_elem((ny, nx, nz), false);
    let mut placement = Vec::with_capacity(mesh.voxel_centers.len());

    for (vox_idx, center) in mesh.voxel_centers.iter().enumerate() {
        let lookup = |axis: &[f64], value: f64, label: &str| {
            grid::axis_index(axis, value, tolerance).ok_or_else(|| {
                LoadError::shape(
                    format!("voxel {} {} center", vox_idx, label),
                    "a mesh axis coordinate",
                    value,
                )
            })
        };
        let i = lookup(&mesh.x_coordinates, center[0], "x")?;
        let j = lookup(&mesh.y_coordinates, center[1], "y")?;
        let k = lookup(&mesh.z_coordinates, center[2], "z")?;

        let index = VoxelIndex::new(i, j, k);
        let slot = &mut seen[index.array_index()];
        if *slot {
            return Err(LoadError::shape(
                format!("voxel {} placement", vox_idx),
                "a unique grid position",
                format!("({}, {}, {}) already filled", i, j, k),
            ));
        }
        *slot = true;
        placement.push(index);
    }
    Ok(placement)
}

fn read_substrates(
    manifest: &Manifest,
    mesh: &Mesh,
    xml_path: &Path,
    output_dir: &Path,
    settings: &LoaderSettings,
) -> Result<Vec<ContinuumVariable>> {
    let data_path = output_dir.join(&manifest.data_file);
    let matrix = read_referenced(xml_path, &data_path, &settings.microenvironment_variable)?;

    // One row per declared variable, in declaration order, after the voxel rows.
    let expected_rows = VOXEL_HEADER_ROWS + manifest.variables.len();
    if matrix.nrows() != expected_rows {
        return Err(LoadError::shape(
            format!("microenvironment matrix '{}' rows", data_path.display()),
            expected_rows,
            matrix.nrows(),
        ));
    }
    if matrix.ncols() != mesh.voxel_count() {
        return Err(LoadError::shape(
            format!("microenvironment matrix '{}' voxel count", data_path.display()),
            mesh.voxel_count(),
            matrix.ncols(),
        ));
    }

    let placement = voxel_placement(mesh, settings.coordinate_tolerance)?;

    let mut substrates = Vec::with_capacity(manifest.variables.len());
    for (si, variable) in manifest.variables.iter().enumerate() {
        debug!("Parsing {} data", variable.name);
        let row = matrix.row(VOXEL_HEADER_ROWS + si);
        let mut data = Array3::zeros(mesh.shape());
        for (index, value) in placement.iter().zip(row.iter()) {
            data[index.array_index()] = *value;
        }
        if data.iter().any(|v: &f64| !v.is_finite()) {
            warn!("Substrate '{}' contains non-finite concentrations.", variable.name);
        }
        substrates.push(ContinuumVariable {
            name: variable.name.clone(),
            units: variable.units.clone(),
            data,
            diffusion_coefficient: variable.diffusion_coefficient.clone(),
            decay_rate: variable.decay_rate.clone(),
        });
    }
    Ok(substrates)
}

fn read_cells(
    manifest: &Manifest,
    xml_path: &Path,
    output_dir: &Path,
    settings: &LoaderSettings,
) -> Result<DiscreteCells> {
    let names = manifest.cells.field_names()?;
    let cell_path = output_dir.join(&manifest.cells.file);
    let matrix = read_referenced(xml_path, &cell_path, &settings.cells_variable)?;

    // The n-th expanded label owns the n-th matrix row.
    if matrix.nrows() < names.len() {
        return Err(LoadError::shape(
            format!("cell matrix '{}' rows", cell_path.display()),
            names.len(),
            matrix.nrows(),
        ));
    }
    if matrix.nrows() > names.len() {
        warn!(
            "Cell matrix '{}' has {} rows but only {} labelled fields; extra rows ignored.",
            cell_path.display(),
            matrix.nrows(),
            names.len()
        );
    }

    let columns: Vec<Vec<f64>> = (0..names.len()).map(|row| matrix.row(row).to_vec()).collect();
    debug!("Loaded {} cells with {} fields", matrix.ncols(), names.len());
    DiscreteCells::new(names, columns)
        .ok_or_else(|| LoadError::shape("cell fields", "one column per label", "ragged columns"))
}
