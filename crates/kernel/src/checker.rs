//! Pre-run validation of export/pad markings.

use nestgrid_common::Direction;

use crate::grid::Grid;
use crate::world::{GridId, World};

/// A marking inconsistency. Non-fatal: reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyFault {
    #[error("{a} edge has {a_count} marked indices but {b} edge has {b_count}")]
    UnbalancedEdges {
        a: Direction,
        a_count: usize,
        b: Direction,
        b_count: usize,
    },
    #[error("{marked} axis is marked but the {empty} axis has no extent")]
    MissingExtent {
        marked: &'static str,
        empty: &'static str,
    },
}

/// Receives every fault a [`Checker`] finds.
pub trait FaultListener: Send + Sync {
    fn on_fault(&self, grid: Option<GridId>, fault: &TopologyFault);
}

impl<F> FaultListener for F
where
    F: Fn(Option<GridId>, &TopologyFault) + Send + Sync,
{
    fn on_fault(&self, grid: Option<GridId>, fault: &TopologyFault) {
        self(grid, fault)
    }
}

#[derive(Default)]
pub struct Checker {
    listeners: Vec<Box<dyn FaultListener>>,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: impl FaultListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Every fault in one grid's markings.
    pub fn faults(grid: &Grid) -> Vec<TopologyFault> {
        let count = |d: Direction| grid.marked_indices(d).len();
        let mut faults = Vec::new();
        for (a, b) in [
            (Direction::Left, Direction::Right),
            (Direction::Up, Direction::Down),
        ] {
            if count(a) != count(b) {
                faults.push(TopologyFault::UnbalancedEdges {
                    a,
                    a_count: count(a),
                    b,
                    b_count: count(b),
                });
            }
        }
        let horizontal = count(Direction::Left) + count(Direction::Right);
        let vertical = count(Direction::Up) + count(Direction::Down);
        if horizontal > 0 && vertical == 0 {
            faults.push(TopologyFault::MissingExtent {
                marked: "horizontal",
                empty: "vertical",
            });
        } else if vertical > 0 && horizontal == 0 {
            faults.push(TopologyFault::MissingExtent {
                marked: "vertical",
                empty: "horizontal",
            });
        }
        faults
    }

    /// `true` when the grid is clean. Faults go to the listeners.
    pub fn check(&self, grid: &Grid) -> bool {
        self.report(None, Self::faults(grid))
    }

    /// Check every grid in the arena. The root grid is checked too, though
    /// its markings only matter for what leaves the world.
    pub fn check_world(&self, world: &World) -> bool {
        let mut clean = true;
        for (id, grid) in world.grids() {
            clean &= self.report(Some(id), Self::faults(grid));
        }
        clean
    }

    fn report(&self, grid: Option<GridId>, faults: Vec<TopologyFault>) -> bool {
        for fault in &faults {
            tracing::warn!(?grid, "topology fault: {fault}");
            for listener in &self.listeners {
                listener.on_fault(grid, fault);
            }
        }
        faults.is_empty()
    }
}
