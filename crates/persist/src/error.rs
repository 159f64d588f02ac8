use std::path::PathBuf;

use nestgrid_kernel::KernelError;

/// Failure to turn a document into a world, or a world into a document.
/// No partially built world is ever returned alongside one of these.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("malformed world document: {0}")]
    Format(#[from] serde_json::Error),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document does not describe a valid world: {0}")]
    Structure(#[from] KernelError),
    #[error("format version {found} is not supported (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },
    #[error("sub-grid at {location} has neither an inline grid nor a resolvable source")]
    MissingGrid { location: nestgrid_common::GridItem },
    #[error("{direction} mark at index {index} is outside an edge of length {length}")]
    MarkOutOfRange {
        index: i32,
        direction: nestgrid_common::Direction,
        length: i32,
    },
    #[error("sub-grid source {0} refers back to itself")]
    SourceCycle(PathBuf),
}
