//! Error types for the routing engine.

use std::fmt;

/// Main error type for engine operations.
#[derive(Debug)]
pub enum EngineError {
    /// Malformed input: out-of-range H3 resolution, NaN coordinates,
    /// bad request parameters, or an edge ID outside the encodable range.
    InvalidArg(String),

    /// Source or target edge not present in the edge metadata.
    EdgeNotFound(u32),

    /// Search exhausted all frontiers without meeting.
    NoPath,

    /// Dataset name not present in the registry.
    DatasetNotFound(String),

    /// Columnar input is missing a required column or has a wrong type.
    SchemaMismatch(String),

    /// Delimited-text or columnar input could not be decoded.
    ParseError(String),

    /// Input contained zero usable records.
    EmptyDataset,

    /// Invariant violation during path reconstruction.
    InternalError(String),

    /// File I/O error.
    Io(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidArg(msg) => {
                write!(f, "Invalid argument: {msg}")
            }
            EngineError::EdgeNotFound(edge) => {
                write!(f, "Edge {edge} not found")
            }
            EngineError::NoPath => {
                write!(f, "No path found")
            }
            EngineError::DatasetNotFound(name) => {
                write!(f, "Dataset '{name}' not loaded")
            }
            EngineError::SchemaMismatch(msg) => {
                write!(f, "Schema mismatch: {msg}")
            }
            EngineError::ParseError(msg) => {
                write!(f, "Parse error: {msg}")
            }
            EngineError::EmptyDataset => {
                write!(f, "Input contained no records")
            }
            EngineError::InternalError(msg) => {
                write!(f, "Internal error: {msg}")
            }
            EngineError::Io(err) => {
                write!(f, "I/O error: {err}")
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
