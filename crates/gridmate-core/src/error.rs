//! Error type shared by the gridmate library crates.
//!
//! [`GridError`] covers everything the model, codecs and solvers can raise.
//! The tool server maps each variant onto its own closed error taxonomy, so
//! variants here are kept distinct rather than collapsed into strings.

use std::path::PathBuf;

use thiserror::Error;

use crate::ElementKind;

#[derive(Error, Debug)]
pub enum GridError {
    /// I/O errors other than a missing file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported file format '{extension}' (supported: {supported})")]
    UnsupportedFormat { extension: String, supported: String },

    /// Codec failures while reading or writing a network file
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{kind} {index} does not exist")]
    InvalidReference { kind: ElementKind, index: usize },

    #[error("{kind} {index} is still referenced by {referenced_by}")]
    StillReferenced {
        kind: ElementKind,
        index: usize,
        referenced_by: String,
    },

    #[error("unknown {kind} standard type '{name}'")]
    UnknownStdType { kind: &'static str, name: String },

    /// Rejected input values (non-positive voltage, unknown enum value, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Numerical or topological failure inside a solve
    #[error("Solver error: {0}")]
    Solver(String),
}

pub type GridResult<T> = Result<T, GridError>;

impl GridError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GridError::Validation(msg.into())
    }

    pub fn solver(msg: impl Into<String>) -> Self {
        GridError::Solver(msg.into())
    }
}
