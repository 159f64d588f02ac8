use nestgrid_common::{Direction, GridItem};
use nestgrid_kernel::{Condition, EntityRef, GridId, KernelError, Simulatable, World};

/// What a placement creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Barrier,
    ConditionalBarrier(Condition),
    SplitExplorer(Direction),
    RandomExplorer(Direction),
    /// Heading comes from the editor's configured weak explorer direction.
    WeakExplorer,
}

/// An edge marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Export,
    Pad,
}

/// An editing command that can be applied to the world and reversed.
///
/// Each command carries enough context to undo itself.
#[derive(Debug, Clone)]
pub enum EditCommand {
    /// Put entities into a grid. Undo = remove them.
    Place {
        grid: GridId,
        entities: Vec<Simulatable>,
    },
    /// Take entities out of a grid. Undo = put them back, same identities.
    Remove {
        grid: GridId,
        entities: Vec<Simulatable>,
    },
    /// Change one edge index. Undo = restore the old marking.
    SetMark {
        grid: GridId,
        index: i32,
        direction: Direction,
        old: Option<Mark>,
        new: Option<Mark>,
    },
}

impl EditCommand {
    /// Produce the inverse command (for undo).
    pub fn inverse(&self) -> Self {
        match self {
            Self::Place { grid, entities } => Self::Remove {
                grid: *grid,
                entities: entities.clone(),
            },
            Self::Remove { grid, entities } => Self::Place {
                grid: *grid,
                entities: entities.clone(),
            },
            Self::SetMark {
                grid,
                index,
                direction,
                old,
                new,
            } => Self::SetMark {
                grid: *grid,
                index: *index,
                direction: *direction,
                old: *new,
                new: *old,
            },
        }
    }
}

/// Errors from edit operations. A failed edit changes nothing.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error("an equal entity already occupies {0}")]
    Occupied(GridItem),
    #[error("nothing to remove at {0}")]
    Empty(GridItem),
    #[error("sub-grid at {0} cannot be edited")]
    SubGrid(GridItem),
    #[error("edge index {index} is outside the {direction} edge of length {length}")]
    IndexOutOfRange {
        index: i32,
        direction: Direction,
        length: i32,
    },
}

/// Editor with undo/redo support for world authoring.
///
/// Tracks every edit in undo/redo stacks. Every authoring operation is
/// reversible via `undo()` and re-applicable via `redo()`.
pub struct Editor {
    weak_direction: Direction,
    undo_stack: Vec<EditCommand>,
    redo_stack: Vec<EditCommand>,
}

impl Editor {
    /// `weak_direction` is the heading given to every placed weak explorer.
    pub fn new(weak_direction: Direction) -> Self {
        Self {
            weak_direction,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn weak_direction(&self) -> Direction {
        self.weak_direction
    }

    pub fn set_weak_direction(&mut self, direction: Direction) {
        self.weak_direction = direction;
    }

    pub fn build(&self, tool: Tool, location: GridItem) -> Simulatable {
        match tool {
            Tool::Barrier => Simulatable::barrier(location),
            Tool::ConditionalBarrier(condition) => {
                Simulatable::conditional_barrier(location, condition)
            }
            Tool::SplitExplorer(d) => Simulatable::split_explorer(location, d),
            Tool::RandomExplorer(d) => Simulatable::random_explorer(location, d),
            Tool::WeakExplorer => Simulatable::weak_explorer(location, self.weak_direction),
        }
    }

    /// Place a new entity and push to undo stack.
    pub fn place(
        &mut self,
        world: &mut World,
        grid: GridId,
        tool: Tool,
        location: GridItem,
    ) -> Result<Simulatable, EditError> {
        let entity = self.build(tool, location);
        let placed = entity.clone();
        if world.add(grid, entity)?.is_none() {
            return Err(EditError::Occupied(location));
        }
        tracing::debug!(?grid, %location, kind = placed.kind().name(), "placed");
        self.record(EditCommand::Place {
            grid,
            entities: vec![placed.clone()],
        });
        Ok(placed)
    }

    /// Remove everything at `location` and push to undo stack.
    pub fn remove_at(
        &mut self,
        world: &mut World,
        grid: GridId,
        location: GridItem,
    ) -> Result<usize, EditError> {
        let present = world.grid(grid)?.get_at_strict_location(location);
        if present.is_empty() {
            return Err(EditError::Empty(location));
        }
        if present.iter().any(|e| e.as_sub_grid().is_some()) {
            return Err(EditError::SubGrid(location));
        }
        let removed = world.remove_at(grid, location)?;
        tracing::debug!(?grid, %location, count = removed.len(), "removed");
        let count = removed.len();
        self.record(EditCommand::Remove {
            grid,
            entities: removed,
        });
        Ok(count)
    }

    /// Set or clear the marking of one edge index and push to undo stack.
    pub fn set_mark(
        &mut self,
        world: &mut World,
        grid: GridId,
        index: i32,
        direction: Direction,
        mark: Option<Mark>,
    ) -> Result<(), EditError> {
        let target = world.grid(grid)?;
        let length = target.edge_length(direction);
        if !(0..length).contains(&index) {
            return Err(EditError::IndexOutOfRange {
                index,
                direction,
                length,
            });
        }
        let old = if target.is_export(index, direction) {
            Some(Mark::Export)
        } else if target.is_pad(index, direction) {
            Some(Mark::Pad)
        } else {
            None
        };
        let command = EditCommand::SetMark {
            grid,
            index,
            direction,
            old,
            new: mark,
        };
        apply_command(world, &command)?;
        self.record(command);
        Ok(())
    }

    /// Undo the last edit. Returns true if an operation was undone.
    pub fn undo(&mut self, world: &mut World) -> Result<bool, EditError> {
        let Some(cmd) = self.undo_stack.pop() else {
            return Ok(false);
        };
        if let Err(e) = apply_command(world, &cmd.inverse()) {
            self.undo_stack.push(cmd);
            return Err(e);
        }
        self.redo_stack.push(cmd);
        Ok(true)
    }

    /// Redo the last undone edit. Returns true if an operation was redone.
    pub fn redo(&mut self, world: &mut World) -> Result<bool, EditError> {
        let Some(cmd) = self.redo_stack.pop() else {
            return Ok(false);
        };
        if let Err(e) = apply_command(world, &cmd) {
            self.redo_stack.push(cmd);
            return Err(e);
        }
        self.undo_stack.push(cmd);
        Ok(true)
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn record(&mut self, command: EditCommand) {
        self.undo_stack.push(command);
        self.redo_stack.clear();
    }
}

fn apply_command(world: &mut World, cmd: &EditCommand) -> Result<(), EditError> {
    match cmd {
        EditCommand::Place { grid, entities } => {
            for entity in entities {
                world.add(*grid, entity.clone())?;
            }
        }
        EditCommand::Remove { grid, entities } => {
            for entity in entities {
                world.remove(EntityRef {
                    grid: *grid,
                    entity: entity.id(),
                });
            }
        }
        EditCommand::SetMark {
            grid,
            index,
            direction,
            new,
            ..
        } => match new {
            Some(Mark::Export) => world.set_export(*grid, *index, *direction, true)?,
            Some(Mark::Pad) => world.set_pad(*grid, *index, *direction, true)?,
            None => {
                world.set_export(*grid, *index, *direction, false)?;
                world.set_pad(*grid, *index, *direction, false)?;
            }
        },
    }
    Ok(())
}
