//! Errors raised while loading or querying a timestep.

use std::path::PathBuf;
use thiserror::Error;

use crate::matlab::MatrixError;

/// Everything that can go wrong while building or querying a [`crate::Timestep`].
#[derive(Debug, Error)]
pub enum LoadError {
    /// The manifest could not be read from disk.
    #[error("Failed to read manifest '{path}': {source}")]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The manifest is not well-formed XML.
    #[error("Failed to parse manifest '{path}': {message}")]
    ManifestSyntax { path: PathBuf, message: String },
    /// A required node or attribute is absent.
    #[error("Missing required node '{0}' in manifest")]
    MissingNode(String),
    /// A node is present but its content cannot be interpreted.
    #[error("Invalid value '{value}' at '{path}': {reason}")]
    InvalidValue {
        path: String,
        value: String,
        reason: String,
    },
    /// A matrix file named by the manifest cannot be opened or decoded.
    #[error("No such file or directory: '{file}' referenced in '{xml}': {source}")]
    ReferencedFile {
        xml: PathBuf,
        file: PathBuf,
        #[source]
        source: MatrixError,
    },
    /// Matrix contents disagree with what the manifest declares.
    #[error("Shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: String,
        found: String,
    },
    #[error("Unknown substrate '{0}'")]
    UnknownSubstrate(String),
    /// A concentration plane was requested at a z value that is not a mesh plane.
    #[error("Specified z_slice {0} not in z_coordinates")]
    ZSliceNotFound(f64),
    #[error("Cell field '{0}' is not present in this timestep")]
    MissingCellField(String),
}

impl LoadError {
    /// Builds an `InvalidValue` error.
    pub fn invalid(path: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            path: path.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Builds a `ShapeMismatch` error.
    pub fn shape(context: impl Into<String>, expected: impl ToString, found: impl ToString) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
