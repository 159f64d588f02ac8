//! Rendering adapter: renderer-agnostic interface over world state.
//!
//! # Invariants
//! - Renderers never mutate the world; they only read committed state.
//! - Output derives from world state and view alone.

mod renderer;
mod summary;

pub use renderer::{RenderError, RenderView, Renderer, TextRenderer, glyph};
pub use summary::WorldSummary;

pub fn crate_info() -> &'static str {
    "nestgrid-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
