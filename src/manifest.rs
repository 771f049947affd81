//! Per-timestep MultiCellDS manifest.
//!
//! The XML is first deserialized into loose `Raw*` mirrors where every node is
//! optional, then walked node by node into a typed [`Manifest`]. Each step of
//! the walk names the node it needed, so a missing element surfaces as
//! `LoadError::MissingNode("microenvironment/domain/mesh/voxels/filename")`
//! instead of a default value.

use log::debug;
use mcds_common::{Measurement, Metadata};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, Result};

/// Suffixes appended to labels whose declared size exceeds one.
const COMPONENT_SUFFIXES: [&str; 3] = ["_x", "_y", "_z"];

// --- Raw XML mirror -------------------------------------------------------

#[derive(Deserialize, Debug, Default)]
struct RawDocument {
    metadata: Option<RawMetadata>,
    microenvironment: Option<RawMicroenvironment>,
    cellular_information: Option<RawCellularInformation>,
}

#[derive(Deserialize, Debug)]
struct RawMetadata {
    current_time: Option<RawText>,
    current_runtime: Option<RawText>,
}

/// Leaf element: optional attributes plus text content.
#[derive(Deserialize, Debug, Default)]
struct RawText {
    units: Option<String>,
    delimiter: Option<String>,
    size: Option<String>,
    #[serde(rename = "$value")]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawMicroenvironment {
    #[serde(rename = "domain", default)]
    domains: Vec<RawDomain>,
}

#[derive(Deserialize, Debug)]
struct RawDomain {
    mesh: Option<RawMesh>,
    variables: Option<RawVariables>,
    data: Option<RawFileRef>,
}

#[derive(Deserialize, Debug)]
struct RawMesh {
    units: Option<String>,
    x_coordinates: Option<RawText>,
    y_coordinates: Option<RawText>,
    z_coordinates: Option<RawText>,
    voxels: Option<RawFileRef>,
}

#[derive(Deserialize, Debug)]
struct RawFileRef {
    filename: Option<RawText>,
}

#[derive(Deserialize, Debug)]
struct RawVariables {
    #[serde(rename = "variable", default)]
    variables: Vec<RawVariable>,
}

#[derive(Deserialize, Debug)]
struct RawVariable {
    name: Option<String>,
    units: Option<String>,
    physical_parameter_set: Option<RawParameterSet>,
}

#[derive(Deserialize, Debug)]
struct RawParameterSet {
    diffusion_coefficient: Option<RawText>,
    decay_rate: Option<RawText>,
}

#[derive(Deserialize, Debug)]
struct RawCellularInformation {
    cell_populations: Option<RawCellPopulations>,
}

#[derive(Deserialize, Debug)]
struct RawCellPopulations {
    #[serde(rename = "cell_population", default)]
    populations: Vec<RawCellPopulation>,
}

#[derive(Deserialize, Debug)]
struct RawCellPopulation {
    custom: Option<RawCustom>,
}

#[derive(Deserialize, Debug)]
struct RawCustom {
    #[serde(rename = "simplified_data", default)]
    simplified_data: Vec<RawSimplifiedData>,
}

#[derive(Deserialize, Debug)]
struct RawSimplifiedData {
    source: Option<String>,
    labels: Option<RawLabels>,
    filename: Option<RawText>,
}

#[derive(Deserialize, Debug)]
struct RawLabels {
    #[serde(rename = "label", default)]
    labels: Vec<RawText>,
}

// --- Typed manifest -------------------------------------------------------

/// Mesh geometry declared in the manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDeclaration {
    pub units: String,
    pub x_coordinates: Vec<f64>,
    pub y_coordinates: Vec<f64>,
    pub z_coordinates: Vec<f64>,
    /// Matrix file holding voxel centers (rows 0-2) and volumes (row 3).
    pub voxel_file: PathBuf,
}

/// One declared substrate. Its values live in row `4 + position` of the
/// microenvironment matrix, where `position` is its declaration index.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: String,
    pub units: String,
    pub diffusion_coefficient: Measurement,
    pub decay_rate: Measurement,
}

/// A `label` entry of the cell `simplified_data` block.
#[derive(Debug, Clone, PartialEq)]
pub struct CellLabel {
    pub name: String,
    pub size: usize,
}

/// The cell `simplified_data` block selected by its `source` attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CellDeclaration {
    pub labels: Vec<CellLabel>,
    pub file: PathBuf,
}

impl CellDeclaration {
    /// Expands labels into field names, one per cell-matrix row.
    ///
    /// Spaces become underscores; a label of size `n > 1` expands to
    /// `n` names suffixed `_x`, `_y`, `_z`.
    pub fn field_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for label in &self.labels {
            let fixed = label.name.replace(' ', "_");
            match label.size {
                1 => names.push(fixed),
                n if n <= COMPONENT_SUFFIXES.len() => {
                    names.extend(COMPONENT_SUFFIXES[..n].iter().map(|s| format!("{}{}", fixed, s)));
                }
                n => {
                    return Err(LoadError::invalid(
                        "simplified_data/labels/label/@size",
                        &n.to_string(),
                        format!("label '{}' has no component suffixes beyond _z", label.name),
                    ))
                }
            }
        }
        Ok(names)
    }
}

/// Everything a timestep's XML declares, before any matrix file is read.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub metadata: Metadata,
    pub mesh: MeshDeclaration,
    pub variables: Vec<VariableDeclaration>,
    /// Shared microenvironment matrix (centers, volumes, one row per variable).
    pub data_file: PathBuf,
    pub cells: CellDeclaration,
}

impl Manifest {
    /// Reads and walks the manifest at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P, cell_source: &str) -> Result<Self> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path).map_err(|source| LoadError::ManifestIo {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawDocument = serde_xml_rs::from_str(&xml).map_err(|e| LoadError::ManifestSyntax {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_raw(raw, cell_source)
    }

    /// Walks manifest XML held in memory.
    pub fn parse(xml: &str, cell_source: &str) -> Result<Self> {
        let raw: RawDocument = serde_xml_rs::from_str(xml).map_err(|e| LoadError::ManifestSyntax {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        Self::from_raw(raw, cell_source)
    }

    fn from_raw(raw: RawDocument, cell_source: &str) -> Result<Self> {
        let metadata_node = required(raw.metadata.as_ref(), "metadata")?;
        let current_time = measurement(metadata_node.current_time.as_ref(), "metadata/current_time")?;
        let current_runtime = measurement(metadata_node.current_runtime.as_ref(), "metadata/current_runtime")?;

        let microenvironment = required(raw.microenvironment.as_ref(), "microenvironment")?;
        let domain = required(microenvironment.domains.first(), "microenvironment/domain")?;

        let mesh = mesh_declaration(required(domain.mesh.as_ref(), "microenvironment/domain/mesh")?)?;

        let metadata = Metadata {
            current_time,
            current_runtime,
            spatial_units: mesh.units.clone(),
        };

        let variables_node = required(domain.variables.as_ref(), "microenvironment/domain/variables")?;
        let variables = variables_node
            .variables
            .iter()
            .map(variable_declaration)
            .collect::<Result<Vec<_>>>()?;
        for (idx, variable) in variables.iter().enumerate() {
            if variables[..idx].iter().any(|v| v.name == variable.name) {
                return Err(LoadError::invalid(
                    "microenvironment/domain/variables/variable/@name",
                    &variable.name,
                    "substrate names must be unique",
                ));
            }
        }

        let data_node = required(domain.data.as_ref(), "microenvironment/domain/data")?;
        let data_file = file_reference(data_node, "microenvironment/domain/data/filename")?;

        let cells = cell_declaration(raw.cellular_information.as_ref(), cell_source)?;

        debug!(
            "Manifest declares {} substrates, {} cell labels, mesh {}x{}x{}",
            variables.len(),
            cells.labels.len(),
            mesh.x_coordinates.len(),
            mesh.y_coordinates.len(),
            mesh.z_coordinates.len()
        );

        Ok(Manifest { metadata, mesh, variables, data_file, cells })
    }
}

// --- Schema walk ----------------------------------------------------------

fn required<'a, T>(node: Option<&'a T>, path: &str) -> Result<&'a T> {
    node.ok_or_else(|| LoadError::MissingNode(path.to_string()))
}

fn attribute<'a>(value: &'a Option<String>, path: &str) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| LoadError::MissingNode(path.to_string()))
}

fn text<'a>(node: &'a RawText, path: &str) -> Result<&'a str> {
    node.text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| LoadError::MissingNode(format!("{}/text()", path)))
}

fn parse_number(value: &str, path: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| LoadError::invalid(path, value, e.to_string()))
}

fn measurement(node: Option<&RawText>, path: &str) -> Result<Measurement> {
    let node = required(node, path)?;
    let value = parse_number(text(node, path)?, path)?;
    let units = attribute(&node.units, &format!("{}/@units", path))?;
    Ok(Measurement::new(value, units))
}

fn file_reference(node: &RawFileRef, path: &str) -> Result<PathBuf> {
    let filename = required(node.filename.as_ref(), path)?;
    Ok(PathBuf::from(text(filename, path)?))
}

/// Splits an axis on its declared delimiter, keeping file order.
fn axis_coordinates(node: Option<&RawText>, path: &str) -> Result<Vec<f64>> {
    let node = required(node, path)?;
    let delimiter = attribute(&node.delimiter, &format!("{}/@delimiter", path))?;
    let raw = text(node, path)?;
    let values = if delimiter.trim().is_empty() {
        raw.split_whitespace()
            .map(|token| parse_number(token, path))
            .collect::<Result<Vec<_>>>()?
    } else {
        raw.split(delimiter)
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| parse_number(token, path))
            .collect::<Result<Vec<_>>>()?
    };
    if values.is_empty() {
        return Err(LoadError::invalid(path, raw, "axis has no coordinates"));
    }
    Ok(values)
}

fn mesh_declaration(node: &RawMesh) -> Result<MeshDeclaration> {
    let base = "microenvironment/domain/mesh";
    let units = attribute(&node.units, &format!("{}/@units", base))?.to_string();
    let x_coordinates = axis_coordinates(node.x_coordinates.as_ref(), &format!("{}/x_coordinates", base))?;
    let y_coordinates = axis_coordinates(node.y_coordinates.as_ref(), &format!("{}/y_coordinates", base))?;
    let z_coordinates = axis_coordinates(node.z_coordinates.as_ref(), &format!("{}/z_coordinates", base))?;
    let voxels = required(node.voxels.as_ref(), &format!("{}/voxels", base))?;
    let voxel_file = file_reference(voxels, &format!("{}/voxels/filename", base))?;
    Ok(MeshDeclaration { units, x_coordinates, y_coordinates, z_coordinates, voxel_file })
}

fn variable_declaration(node: &RawVariable) -> Result<VariableDeclaration> {
    let base = "microenvironment/domain/variables/variable";
    let name = attribute(&node.name, &format!("{}/@name", base))?.to_string();
    // Older manifests omit the units attribute on the variable itself.
    let units = node.units.clone().unwrap_or_default();
    let params_path = format!("{}[@name='{}']/physical_parameter_set", base, name);
    let params = required(node.physical_parameter_set.as_ref(), &params_path)?;
    let diffusion_coefficient = measurement(
        params.diffusion_coefficient.as_ref(),
        &format!("{}/diffusion_coefficient", params_path),
    )?;
    let decay_rate = measurement(params.decay_rate.as_ref(), &format!("{}/decay_rate", params_path))?;
    Ok(VariableDeclaration { name, units, diffusion_coefficient, decay_rate })
}

fn cell_declaration(node: Option<&RawCellularInformation>, cell_source: &str) -> Result<CellDeclaration> {
    let mut path = String::from("cellular_information");
    let info = required(node, &path)?;
    path.push_str("/cell_populations");
    let populations = required(info.cell_populations.as_ref(), &path)?;
    path.push_str("/cell_population");
    let population = required(populations.populations.first(), &path)?;
    path.push_str("/custom");
    let custom = required(population.custom.as_ref(), &path)?;
    path.push_str(&format!("/simplified_data[@source='{}']", cell_source));
    // Blocks from other sources describe other data and are skipped.
    let data = required(
        custom
            .simplified_data
            .iter()
            .find(|d| d.source.as_deref() == Some(cell_source)),
        &path,
    )?;

    let labels_node = required(data.labels.as_ref(), &format!("{}/labels", path))?;
    let label_path = format!("{}/labels/label", path);
    let labels = labels_node
        .labels
        .iter()
        .map(|label| {
            let name = text(label, &label_path)?.to_string();
            let size_text = attribute(&label.size, &format!("{}/@size", label_path))?;
            let size = size_text
                .trim()
                .parse::<usize>()
                .map_err(|e| LoadError::invalid(&format!("{}/@size", label_path), size_text, e.to_string()))?;
            if size == 0 {
                return Err(LoadError::invalid(&format!("{}/@size", label_path), size_text, "size must be at least 1"));
            }
            Ok(CellLabel { name, size })
        })
        .collect::<Result<Vec<_>>>()?;

    let filename = required(data.filename.as_ref(), &format!("{}/filename", path))?;
    let file = PathBuf::from(text(filename, &format!("{}/filename", path))?);
    Ok(CellDeclaration { labels, file })
}
