//! Levels: a map template, a start state, a block palette and a par count.
//!
//! Levels are read-only once built. Every run works on copies of the template,
//! so the same level can be replayed any number of times.
//!
//! On disk a level is a TOML file:
//!
//! ```toml
//! id = 1
//! name = "First Steps"
//! description = "Use forward to reach the goal."
//! par = 3
//! facing = "right"
//! allowed = ["forward"]
//! map = "ST PA PA GO"
//! ```
//!
//! See [`crate::world::load_grid_from_string`] for the map codes.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    Direction, InstructionKind, Position, Program,
    interpreter::{Execution, Interpreter, RunWarning, TraceEntry, run},
    map::Grid,
    score::score,
    world::{AgentState, MapError, Tile, TileKind, grid_to_string, load_grid_from_string},
};

#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("invalid level file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("level {id}: start ({x}, {y}) is outside the grid or on a wall")]
    BadStart { id: u32, x: usize, y: usize },
    #[error("level {id}: par must be at least 1")]
    ZeroPar { id: u32 },
    #[error("level {id}: no instructions are allowed")]
    NoBlocks { id: u32 },
    #[error("duplicate level id {0}")]
    DuplicateId(u32),
}

/// Serialized form of a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelFile {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub par: usize,
    #[serde(default = "default_facing")]
    pub facing: Direction,
    pub allowed: Vec<InstructionKind>,
    pub map: String,
}

fn default_facing() -> Direction {
    Direction::Right
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Level {
    id: u32,
    name: String,
    description: String,
    grid: Grid<Tile>,
    start: AgentState,
    allowed: BTreeSet<InstructionKind>,
    par: usize,
}

/// Outcome of playing a program on a level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub level_id: u32,
    pub success: bool,
    pub stars: u8,
    pub final_agent: AgentState,
    pub trace: Vec<TraceEntry>,
    pub warnings: Vec<RunWarning>,
}

impl RunResult {
    /// Scores a finished execution. Useful when the caller drove the
    /// [`Interpreter`] itself.
    pub fn from_execution(level: &Level, program_len: usize, execution: Execution) -> Self {
        let (success, stars) = score(&execution.agent, level, program_len);
        info!(level = level.id, success, stars, steps = execution.trace.len(), "run scored");
        RunResult {
            level_id: level.id,
            success,
            stars,
            final_agent: execution.agent,
            trace: execution.trace,
            warnings: execution.warnings,
        }
    }
}

impl Level {
    /// Builds and validates a level.
    ///
    /// The start must be in bounds and not on a wall, `par` must be positive and
    /// at least one instruction kind must be allowed. A level without a goal
    /// tile is accepted but can never be passed.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        grid: Grid<Tile>,
        start: AgentState,
        allowed: impl IntoIterator<Item = InstructionKind>,
        par: usize,
    ) -> Result<Self, LevelError> {
        let Position { x, y } = start.position;
        if grid.get(x, y).is_none_or(Tile::is_wall) {
            return Err(LevelError::BadStart { id, x, y });
        }
        if par == 0 {
            return Err(LevelError::ZeroPar { id });
        }
        let allowed: BTreeSet<_> = allowed.into_iter().collect();
        if allowed.is_empty() {
            return Err(LevelError::NoBlocks { id });
        }
        if grid.find(|tile| tile.kind == TileKind::Goal).is_none() {
            warn!(level = id, "level has no goal tile and cannot be completed");
        }

        Ok(Level {
            id,
            name: name.into(),
            description: String::new(),
            grid,
            start,
            allowed,
            par,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn from_file(file: LevelFile) -> Result<Self, LevelError> {
        let (grid, start) = load_grid_from_string(&file.map)?;
        Ok(Level::new(
            file.id,
            file.name,
            grid,
            AgentState::new(start, file.facing),
            file.allowed,
            file.par,
        )?
        .with_description(file.description))
    }

    pub fn from_toml_str(source: &str) -> Result<Self, LevelError> {
        Level::from_file(toml::from_str(source)?)
    }

    /// Reads a level from a TOML file.
    pub fn load(path: &Path) -> Result<Self, LevelError> {
        let source = fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Level::from_toml_str(&source)
    }

    pub fn to_file(&self) -> LevelFile {
        LevelFile {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            par: self.par,
            facing: self.start.facing,
            allowed: self.allowed.iter().copied().collect(),
            map: grid_to_string(&self.grid),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The untouched map template.
    pub fn grid(&self) -> &Grid<Tile> {
        &self.grid
    }

    pub fn start(&self) -> &AgentState {
        &self.start
    }

    pub fn allowed(&self) -> impl Iterator<Item = InstructionKind> + '_ {
        self.allowed.iter().copied()
    }

    pub fn par(&self) -> usize {
        self.par
    }

    pub fn is_allowed(&self, kind: InstructionKind) -> bool {
        self.allowed.contains(&kind)
    }

    /// Indices of instructions whose kind is not in this level's palette.
    ///
    /// The interpreter runs such programs anyway; enforcing the palette is up
    /// to whoever builds the program.
    pub fn disallowed(&self, program: &Program) -> Vec<usize> {
        program
            .instructions()
            .iter()
            .enumerate()
            .filter(|(_, instruction)| !self.is_allowed(instruction.kind()))
            .map(|(index, _)| index)
            .collect()
    }

    /// A step-by-step interpreter over fresh copies of the start state.
    pub fn interpreter<'p>(&self, program: &'p Program) -> Interpreter<'p> {
        Interpreter::new(program, self.start, self.grid.clone())
    }

    /// Runs `program` to completion and scores it.
    pub fn play(&self, program: &Program) -> RunResult {
        debug!(level = self.id, instructions = program.len(), "playing level");
        let execution = run(program, &self.start, &self.grid);
        RunResult::from_execution(self, program.len(), execution)
    }
}

const BUILTIN_LEVELS: [&str; 6] = [
    include_str!("../levels/01_first_steps.toml"),
    include_str!("../levels/02_the_turn.toml"),
    include_str!("../levels/03_collect.toml"),
    include_str!("../levels/04_simple_maze.toml"),
    include_str!("../levels/05_long_hall.toml"),
    include_str!("../levels/06_until_the_wall.toml"),
];

/// The levels shipped with the game, in play order.
pub fn builtin_levels() -> Result<Vec<Level>, LevelError> {
    BUILTIN_LEVELS
        .iter()
        .map(|source| Level::from_toml_str(source))
        .collect()
}

/// Loads every `*.toml` file in `dir`, sorted by level id.
pub fn load_levels_dir(dir: &Path) -> Result<Vec<Level>, LevelError> {
    let io_err = |source: std::io::Error| LevelError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut levels = BTreeMap::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.extension().is_none_or(|ext| ext != "toml") {
            continue;
        }
        let level = Level::load(&path)?;
        debug!(id = level.id, path = %path.display(), "loaded level");
        let id = level.id;
        if levels.insert(id, level).is_some() {
            return Err(LevelError::DuplicateId(id));
        }
    }
    Ok(levels.into_values().collect())
}

/// Merges `extra` into `base`; an extra level replaces a base level with the
/// same id. The result is sorted by id.
pub fn merge_levels(base: Vec<Level>, extra: Vec<Level>) -> Vec<Level> {
    let mut by_id: BTreeMap<u32, Level> = base.into_iter().map(|l| (l.id, l)).collect();
    for level in extra {
        by_id.insert(level.id, level);
    }
    by_id.into_values().collect()
}
