use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use nestgrid_author::{Editor, Mark, Tool};
use nestgrid_common::{Direction, GridItem};
use nestgrid_kernel::{Checker, Condition, Grid, GridId, World};
use nestgrid_persist::CheckpointStore;
use nestgrid_render::{RenderView, Renderer, TextRenderer, WorldSummary};
use nestgrid_sim::{SimConfig, Simulator, StepMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nestgrid", about = "CLI tool for nestgrid worlds")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Load a world and report topology faults
    Check { path: PathBuf },
    /// Print a world as text
    Render {
        path: PathBuf,
        /// Grid to draw instead of the root
        #[arg(short, long)]
        grid: Option<u64>,
        /// Frame the grid with its edge markings
        #[arg(short, long)]
        border: bool,
    },
    /// Place one entity and save the result
    Place {
        path: PathBuf,
        #[arg(value_enum)]
        kind: PlaceKind,
        x: i32,
        y: i32,
        /// Heading for explorers
        #[arg(short, long, default_value = "right")]
        direction: Direction,
        /// Grid to edit instead of the root
        #[arg(short, long)]
        grid: Option<u64>,
        /// Write here instead of overwriting the input
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Simulate a world for a number of steps
    Run {
        path: PathBuf,
        /// YAML simulation settings
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Steps to run (overrides `max_steps`)
        #[arg(short, long)]
        steps: Option<u64>,
        /// Steps per second; zero or less runs unpaced
        #[arg(short, long)]
        rate: Option<f64>,
        /// Force both phases onto the calling thread
        #[arg(long)]
        serial: bool,
        /// Override the world seed
        #[arg(long)]
        seed: Option<u64>,
        /// Run even when the topology check fails
        #[arg(long)]
        force: bool,
        /// Save the final world here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Build a small nested world, step it and show each frame
    Demo {
        /// Number of steps to show
        #[arg(short, long, default_value = "8")]
        steps: u64,
        /// RNG seed
        #[arg(short = 'S', long, default_value = "42")]
        seed: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PlaceKind {
    Barrier,
    Split,
    Random,
    Weak,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("nestgrid v{}", env!("CARGO_PKG_VERSION"));
            println!("kernel: tick={}", World::new(1, 1)?.tick());
            println!("sim: {}", nestgrid_sim::crate_info());
            println!("persist: {}", nestgrid_persist::crate_info());
            println!("author: {}", nestgrid_author::crate_info());
            println!("render: {}", nestgrid_render::crate_info());
        }
        Commands::Check { path } => {
            let world = load(&path)?;
            println!("{}", WorldSummary::of(&world));
            if !checker().check_world(&world) {
                bail!("{} has topology faults", path.display());
            }
            println!("topology OK");
        }
        Commands::Render { path, grid, border } => {
            let world = load(&path)?;
            let view = RenderView {
                grid: grid.map(GridId),
                border,
            };
            print!("{}", TextRenderer::new().render(&world, &view)?);
        }
        Commands::Place {
            path,
            kind,
            x,
            y,
            direction,
            grid,
            out,
        } => {
            let mut world = load(&path)?;
            let grid = grid.map(GridId).unwrap_or_else(|| world.root());
            let tool = match kind {
                PlaceKind::Barrier => Tool::Barrier,
                PlaceKind::Split => Tool::SplitExplorer(direction),
                PlaceKind::Random => Tool::RandomExplorer(direction),
                PlaceKind::Weak => Tool::WeakExplorer,
            };
            let mut editor = Editor::new(direction);
            let placed = editor.place(&mut world, grid, tool, GridItem::new(x, y))?;
            let target = out.unwrap_or(path);
            nestgrid_persist::save_file(&world, &target)?;
            println!(
                "placed {} at {} -> {}",
                placed.kind().name(),
                placed.location(),
                target.display()
            );
        }
        Commands::Run {
            path,
            config,
            steps,
            rate,
            serial,
            seed,
            force,
            out,
        } => {
            let mut config = match config {
                Some(config) => SimConfig::from_yaml_file(&config)?,
                None => SimConfig::default(),
            };
            if let Some(steps) = steps {
                config.max_steps = Some(steps);
            }
            config.max_steps.get_or_insert(100);
            if let Some(rate) = rate {
                config.steps_per_second = rate;
            }
            if serial {
                config.semantic_step = StepMode::Serial;
                config.state_switch_step = StepMode::Serial;
            }
            if seed.is_some() {
                config.seed = seed;
            }

            let world = load(&path)?;
            if !checker().check_world(&world) {
                if !force {
                    bail!("{} has topology faults (use --force to run anyway)", path.display());
                }
                tracing::warn!("running despite topology faults");
            }

            let mut sim = Simulator::new(world, config)?;
            sim.start()?;
            sim.join();
            println!("{}", sim.stats());

            let shared = sim.world();
            let world = shared
                .read()
                .map_err(|_| anyhow::anyhow!("world lock poisoned"))?;
            println!("{}", WorldSummary::of(&world));
            if let Some(out) = out {
                nestgrid_persist::save_file(&world, &out)?;
            }
        }
        Commands::Demo { steps, seed } => demo(steps, seed)?,
    }

    Ok(())
}

fn load(path: &Path) -> anyhow::Result<World> {
    nestgrid_persist::load_file(path).with_context(|| format!("loading {}", path.display()))
}

fn checker() -> Checker {
    let mut checker = Checker::new();
    checker.add_listener(|grid: Option<GridId>, fault: &nestgrid_kernel::TopologyFault| {
        match grid {
            Some(grid) => println!("grid {}: {fault}", grid.0),
            None => println!("{fault}"),
        }
    });
    checker
}

fn demo(steps: u64, seed: u64) -> anyhow::Result<()> {
    let config = SimConfig {
        steps_per_second: 0.0,
        seed: Some(seed),
        weak_explorer_direction: Direction::Down,
        ..SimConfig::default()
    };
    let mut world = World::with_seed(9, 7, seed)?;
    let root = world.root();
    let mut editor = Editor::new(config.weak_explorer_direction);

    for y in 0..7 {
        editor.place(&mut world, root, Tool::Barrier, GridItem::new(6, y))?;
    }
    editor.place(
        &mut world,
        root,
        Tool::SplitExplorer(Direction::Right),
        GridItem::new(1, 3),
    )?;
    editor.place(
        &mut world,
        root,
        Tool::RandomExplorer(Direction::Up),
        GridItem::new(8, 0),
    )?;
    editor.place(
        &mut world,
        root,
        Tool::ConditionalBarrier(Condition::NotBlockExists {
            location: GridItem::new(0, 0),
        }),
        GridItem::new(3, 5),
    )?;
    editor.place(&mut world, root, Tool::WeakExplorer, GridItem::new(3, 6))?;

    let mut child = Grid::new(3, 3)?;
    for index in 0..3 {
        child.set_export(index, Direction::Left, true);
        child.set_export(index, Direction::Up, true);
    }
    world.embed(root, GridItem::new(3, 1), child)?;
    let child = *world
        .descendants(root)
        .first()
        .context("sub-grid was not embedded")?;
    editor.set_mark(&mut world, child, 1, Direction::Right, Some(Mark::Pad))?;

    let renderer = TextRenderer::new();
    let view = RenderView {
        grid: None,
        border: true,
    };
    let mut checkpoints = CheckpointStore::new();
    checkpoints.take(&world);
    print!("{}", renderer.render(&world, &view)?);

    let sim = Simulator::new(world, config)?;
    for _ in 0..steps {
        sim.step_once()?;
        let shared = sim.world();
        let world = shared
            .read()
            .map_err(|_| anyhow::anyhow!("world lock poisoned"))?;
        print!("{}", renderer.render(&world, &view)?);
    }

    let shared = sim.world();
    let mut world = shared
        .write()
        .map_err(|_| anyhow::anyhow!("world lock poisoned"))?;
    println!("{}", WorldSummary::of(&world));
    if let Some(start) = checkpoints.get(0) {
        start.restore_into(&mut world);
        println!("rolled back to tick {}", world.tick());
    }
    if editor.undo(&mut world)? {
        println!("undid pad marking, {} edits left", editor.undo_count());
    }
    Ok(())
}
