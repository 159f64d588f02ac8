//! Authoring: placing and removing entities, marking edges, undo/redo.
//!
//! # Invariants
//! - Every edit is reversible; undo restores the exact entity identities.
//! - Sub-grids are built by loading documents, not by editing.

mod editor;

pub use editor::{EditCommand, EditError, Editor, Mark, Tool};

pub fn crate_info() -> &'static str {
    "nestgrid-author v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("author"));
    }
}
