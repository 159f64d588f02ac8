use std::path::{Path, PathBuf};

use nestgrid_common::{Direction, GridItem};
use nestgrid_kernel::{GridId, Kind, Simulatable, World};

use crate::document::{EdgeMarks, EntityDoc, FORMAT_VERSION, GridDoc, WorldDoc};
use crate::error::LoadError;

/// Parse a world document. Sub-grids must carry their child grid inline;
/// use [`load_file`] to resolve `source` references.
pub fn load(text: &str) -> Result<World, LoadError> {
    let doc: WorldDoc = serde_json::from_str(text)?;
    build(&doc, &mut Resolver::Inline)
}

/// Serialize a world as a pretty-printed document with every child grid
/// inline. Recorded `source` paths are kept alongside.
pub fn serialize(world: &World) -> Result<String, LoadError> {
    Ok(serde_json::to_string_pretty(&to_document(world)?)?)
}

/// Load a document from disk, resolving `source` references relative to the
/// file that names them.
pub fn load_file(path: impl AsRef<Path>) -> Result<World, LoadError> {
    let path = path.as_ref();
    let doc: WorldDoc = serde_json::from_str(&read(path)?)?;
    let mut resolver = Resolver::Files {
        stack: vec![canonical(path)?],
    };
    let world = build(&doc, &mut resolver)?;
    tracing::info!(
        path = %path.display(),
        grids = world.grid_count(),
        entities = world.entity_count(),
        "world loaded"
    );
    Ok(world)
}

pub fn save_file(world: &World, path: impl AsRef<Path>) -> Result<(), LoadError> {
    let path = path.as_ref();
    let text = serialize(world)?;
    std::fs::write(path, text).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "world saved");
    Ok(())
}

/// Build the document for `world`.
pub fn to_document(world: &World) -> Result<WorldDoc, LoadError> {
    Ok(WorldDoc {
        format_version: FORMAT_VERSION,
        seed: world.seed(),
        grid: grid_doc(world, world.root())?,
    })
}

fn grid_doc(world: &World, id: GridId) -> Result<GridDoc, LoadError> {
    let grid = world.grid(id)?;
    let mut exports = EdgeMarks::default();
    let mut pads = EdgeMarks::default();
    for d in Direction::ALL {
        *exports.get_mut(d) = grid.exports(d).iter().copied().collect();
        *pads.get_mut(d) = grid.pads(d).iter().copied().collect();
    }
    let entities = grid
        .simulatables()
        .map(|e| entity_doc(world, e))
        .collect::<Result<_, _>>()?;
    Ok(GridDoc {
        width: grid.width(),
        height: grid.height(),
        exports,
        pads,
        entities,
    })
}

fn entity_doc(world: &World, entity: &Simulatable) -> Result<EntityDoc, LoadError> {
    let location = entity.location();
    let direction = entity.direction().unwrap_or(Direction::Right);
    Ok(match entity.kind() {
        Kind::Barrier => EntityDoc::Barrier { location },
        Kind::ConditionalBarrier(condition) => EntityDoc::ConditionalBarrier {
            location,
            condition: *condition,
        },
        Kind::SplitExplorer => EntityDoc::SplitExplorer {
            location,
            direction,
        },
        Kind::RandomExplorer => EntityDoc::RandomExplorer {
            location,
            direction,
        },
        Kind::WeakExplorer => EntityDoc::WeakExplorer {
            location,
            direction,
        },
        Kind::SubGrid(sub) => EntityDoc::SubGrid {
            location,
            source: sub.source().map(str::to_string),
            grid: Some(Box::new(grid_doc(world, sub.child())?)),
        },
    })
}

/// How `source` references are satisfied.
enum Resolver {
    /// In-memory text: only inline child grids are accepted.
    Inline,
    /// Files currently being loaded, outermost first.
    Files { stack: Vec<PathBuf> },
}

fn build(doc: &WorldDoc, resolver: &mut Resolver) -> Result<World, LoadError> {
    if doc.format_version != FORMAT_VERSION {
        return Err(LoadError::SchemaMismatch {
            found: doc.format_version,
            expected: FORMAT_VERSION,
        });
    }
    let mut world = World::with_seed(doc.grid.width, doc.grid.height, doc.seed)?;
    let root = world.root();
    fill(&mut world, root, &doc.grid, resolver)?;
    Ok(world)
}

fn fill(
    world: &mut World,
    id: GridId,
    doc: &GridDoc,
    resolver: &mut Resolver,
) -> Result<(), LoadError> {
    for d in Direction::ALL {
        let length = world.grid(id)?.edge_length(d);
        let mut marks = doc.exports.get(d).iter().chain(doc.pads.get(d));
        if let Some(&index) = marks.find(|i| !(0..length).contains(*i)) {
            return Err(LoadError::MarkOutOfRange {
                index,
                direction: d,
                length,
            });
        }
        for &index in doc.exports.get(d) {
            world.set_export(id, index, d, true)?;
        }
        for &index in doc.pads.get(d) {
            world.set_pad(id, index, d, true)?;
        }
    }
    for entity in &doc.entities {
        match entity {
            EntityDoc::SubGrid {
                location,
                source,
                grid,
            } => {
                let child = match (grid, source) {
                    (Some(inline), _) => {
                        let child = world.create_grid(inline.width, inline.height)?;
                        fill(world, child, inline, resolver)?;
                        child
                    }
                    (None, Some(source)) => resolve(world, source, *location, resolver)?,
                    (None, None) => return Err(LoadError::MissingGrid { location: *location }),
                };
                world.add_sub_grid(id, *location, child, source.clone())?;
            }
            other => {
                let Some(entity) = simulatable(other) else {
                    continue;
                };
                if world.add(id, entity)?.is_none() {
                    tracing::debug!(location = %other.location(), "dropped duplicate entity");
                }
            }
        }
    }
    Ok(())
}

fn resolve(
    world: &mut World,
    source: &str,
    location: GridItem,
    resolver: &mut Resolver,
) -> Result<GridId, LoadError> {
    let Resolver::Files { stack } = resolver else {
        return Err(LoadError::MissingGrid { location });
    };
    let base = stack
        .last()
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let path = canonical(&base.join(source))?;
    if stack.contains(&path) {
        return Err(LoadError::SourceCycle(path));
    }
    let doc: WorldDoc = serde_json::from_str(&read(&path)?)?;
    if doc.format_version != FORMAT_VERSION {
        return Err(LoadError::SchemaMismatch {
            found: doc.format_version,
            expected: FORMAT_VERSION,
        });
    }
    tracing::debug!(path = %path.display(), "resolving sub-grid source");
    stack.push(path);
    let child = world.create_grid(doc.grid.width, doc.grid.height)?;
    let filled = fill(world, child, &doc.grid, resolver);
    if let Resolver::Files { stack } = resolver {
        stack.pop();
    }
    filled.map(|()| child)
}

/// Everything but sub-grids, which need their child built first.
fn simulatable(doc: &EntityDoc) -> Option<Simulatable> {
    Some(match *doc {
        EntityDoc::Barrier { location } => Simulatable::barrier(location),
        EntityDoc::ConditionalBarrier {
            location,
            condition,
        } => Simulatable::conditional_barrier(location, condition),
        EntityDoc::SplitExplorer {
            location,
            direction,
        } => Simulatable::split_explorer(location, direction),
        EntityDoc::RandomExplorer {
            location,
            direction,
        } => Simulatable::random_explorer(location, direction),
        EntityDoc::WeakExplorer {
            location,
            direction,
        } => Simulatable::weak_explorer(location, direction),
        EntityDoc::SubGrid { .. } => return None,
    })
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn canonical(path: &Path) -> Result<PathBuf, LoadError> {
    path.canonicalize().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}
