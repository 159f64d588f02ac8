use nestgrid_common::{Direction, GridItem};
use nestgrid_kernel::{Grid, GridId, KernelError, Sprite, World};

/// What to draw.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderView {
    /// Grid to draw. The root grid when unset.
    pub grid: Option<GridId>,
    /// Frame the grid with its edge markings.
    pub border: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer reads world state and a view configuration, then produces
/// output. It never mutates the world.
pub trait Renderer {
    type Output;

    fn render(&self, world: &World, view: &RenderView) -> Result<Self::Output, RenderError>;
}

/// One character per cell, highest y on the first line.
///
/// Cells show the highest-priority entity present; the border marks exported
/// indices with `E` and padded ones with `P`.
#[derive(Debug, Default)]
pub struct TextRenderer {
    /// Prepend a tick/seed/entity header.
    pub header: bool,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self { header: true }
    }

    pub fn bare() -> Self {
        Self { header: false }
    }
}

impl Renderer for TextRenderer {
    type Output = String;

    fn render(&self, world: &World, view: &RenderView) -> Result<String, RenderError> {
        let id = view.grid.unwrap_or_else(|| world.root());
        let grid = world.grid(id)?;
        tracing::trace!(grid = id.0, border = view.border, "rendering text frame");
        let mut out = String::new();
        if self.header {
            out.push_str(&format!(
                "=== grid {} {}x{} (tick={}, seed={}) ===\n",
                id.0,
                grid.width(),
                grid.height(),
                world.tick(),
                world.seed()
            ));
            out.push_str(&format!("Entities: {}\n", grid.len()));
        }

        let cells = cell_glyphs(grid);
        let row_len = grid.width() as usize;
        if view.border {
            out.push_str(&edge_row(grid, Direction::Up));
        }
        for y in (0..grid.height()).rev() {
            if view.border {
                out.push(mark_glyph(grid, y, Direction::Left, '|'));
            }
            let start = y as usize * row_len;
            out.extend(&cells[start..start + row_len]);
            if view.border {
                out.push(mark_glyph(grid, y, Direction::Right, '|'));
            }
            out.push('\n');
        }
        if view.border {
            out.push_str(&edge_row(grid, Direction::Down));
        }
        Ok(out)
    }
}

/// Glyphs in row-major order from y = 0.
fn cell_glyphs(grid: &Grid) -> Vec<char> {
    let width = grid.width() as usize;
    let mut cells = vec![('.', None::<u8>); width * grid.height() as usize];
    for entity in grid.simulatables() {
        let anchor = entity.location();
        for cell in entity.footprint_cells() {
            let wrapped = grid.wrap(cell);
            let slot = &mut cells[wrapped.y as usize * width + wrapped.x as usize];
            let priority = entity.priority();
            if slot.1.is_some_and(|p| p >= priority) {
                continue;
            }
            let offset = GridItem::new(cell.x - anchor.x, cell.y - anchor.y);
            *slot = (glyph(entity.sprite(grid, offset)), Some(priority));
        }
    }
    cells.into_iter().map(|(c, _)| c).collect()
}

fn edge_row(grid: &Grid, direction: Direction) -> String {
    let mut row = String::from("+");
    row.extend((0..grid.width()).map(|x| mark_glyph(grid, x, direction, '-')));
    row.push_str("+\n");
    row
}

fn mark_glyph(grid: &Grid, index: i32, direction: Direction, plain: char) -> char {
    if grid.is_export(index, direction) {
        'E'
    } else if grid.is_pad(index, direction) {
        'P'
    } else {
        plain
    }
}

/// Character for one sprite.
pub fn glyph(sprite: Sprite) -> char {
    let arrow = |d: Direction, [up, down, left, right]: [char; 4]| match d {
        Direction::Up => up,
        Direction::Down => down,
        Direction::Left => left,
        Direction::Right => right,
    };
    match sprite {
        Sprite::Barrier => '#',
        Sprite::ConditionalBarrier { blocking: true } => '%',
        Sprite::ConditionalBarrier { blocking: false } => ':',
        Sprite::SplitExplorer(d) => arrow(d, ['^', 'v', '<', '>']),
        Sprite::RandomExplorer(d) => arrow(d, ['A', 'V', '{', '}']),
        Sprite::WeakExplorer(d) => arrow(d, ['u', 'd', 'l', 'r']),
        Sprite::SubGrid { .. } => '@',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestgrid_kernel::{Condition, Simulatable};

    fn render(world: &World, view: RenderView) -> String {
        TextRenderer::bare().render(world, &view).unwrap()
    }

    #[test]
    fn empty_world_with_header() {
        let world = World::new(3, 2).unwrap();
        let output = TextRenderer::new()
            .render(&world, &RenderView::default())
            .unwrap();
        assert!(output.contains("tick=0"));
        assert!(output.contains("Entities: 0"));
        assert!(output.ends_with("...\n...\n"));
    }

    #[test]
    fn rows_run_from_top_down() {
        let mut world = World::new(3, 2).unwrap();
        let root = world.root();
        world.add(root, Simulatable::barrier(GridItem::new(0, 1))).unwrap();
        world
            .add(root, Simulatable::split_explorer(GridItem::new(2, 0), Direction::Right))
            .unwrap();
        assert_eq!(render(&world, RenderView::default()), "#..\n..>\n");
    }

    #[test]
    fn explorers_draw_over_barriers() {
        let mut world = World::new(1, 1).unwrap();
        let root = world.root();
        world
            .add(root, Simulatable::weak_explorer(GridItem::new(0, 0), Direction::Up))
            .unwrap();
        world.add(root, Simulatable::barrier(GridItem::new(0, 0))).unwrap();
        assert_eq!(render(&world, RenderView::default()), "u\n");
    }

    #[test]
    fn conditional_barrier_shows_its_state() {
        let mut world = World::new(2, 1).unwrap();
        let root = world.root();
        world
            .add(
                root,
                Simulatable::conditional_barrier(GridItem::new(0, 0), Condition::False),
            )
            .unwrap();
        world
            .add(
                root,
                Simulatable::conditional_barrier(GridItem::new(1, 0), Condition::True),
            )
            .unwrap();
        assert_eq!(render(&world, RenderView::default()), "%:\n");
    }

    #[test]
    fn border_shows_markings() {
        let mut world = World::new(2, 2).unwrap();
        let root = world.root();
        world.set_export(root, 0, Direction::Up, true).unwrap();
        world.set_pad(root, 1, Direction::Left, true).unwrap();
        let view = RenderView {
            grid: None,
            border: true,
        };
        assert_eq!(render(&world, view), "+E-+\nP..|\n|..|\n+--+\n");
    }

    #[test]
    fn sub_grid_footprint_and_child_view() {
        let mut world = World::new(4, 3).unwrap();
        let root = world.root();
        let mut child = Grid::new(2, 2).unwrap();
        child.set_export(0, Direction::Up, true);
        child.set_export(1, Direction::Up, true);
        world.embed(root, GridItem::new(1, 1), child).unwrap();
        assert_eq!(render(&world, RenderView::default()), "....\n.@@.\n....\n");

        let child = world.descendants(root)[0];
        let view = RenderView {
            grid: Some(child),
            border: true,
        };
        assert_eq!(render(&world, view), "+EE+\n|..|\n|..|\n+--+\n");
    }

    #[test]
    fn unknown_grid_is_an_error() {
        let world = World::new(1, 1).unwrap();
        let view = RenderView {
            grid: Some(GridId(42)),
            border: false,
        };
        assert!(TextRenderer::new().render(&world, &view).is_err());
    }

    #[test]
    fn wide_rows_render_in_place() {
        let mut world = World::new(50_000, 2).unwrap();
        let root = world.root();
        world
            .add(root, Simulatable::barrier(GridItem::new(49_999, 1)))
            .unwrap();
        let output = render(&world, RenderView::default());
        let top = output.lines().next().unwrap();
        assert_eq!(top.chars().last(), Some('#'));
        assert_eq!(top.chars().filter(|c| *c == '#').count(), 1);
    }

    #[test]
    fn every_direction_has_a_glyph() {
        let glyphs: Vec<char> = Direction::ALL
            .into_iter()
            .map(|d| glyph(Sprite::RandomExplorer(d)))
            .collect();
        assert_eq!(glyphs.len(), 4);
        assert!(glyphs.iter().all(|c| !c.is_whitespace()));
    }
}
