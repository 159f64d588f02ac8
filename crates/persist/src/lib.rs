//! Persistence: world documents, external sub-grid sources, checkpoints.
//!
//! # Invariants
//! - A document either loads completely or not at all.
//! - `load(serialize(world))` reproduces every grid, marking, and entity
//!   state (identities are fresh).
//! - Checkpoints are deep copies and verifiable against their hash.

mod checkpoint;
mod codec;
pub mod document;
mod error;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use codec::{load, load_file, save_file, serialize, to_document};
pub use error::LoadError;

pub fn crate_info() -> &'static str {
    "nestgrid-persist v0.1.0"
}
