use serde::{Deserialize, Serialize};

use crate::{Direction, Position, map::Grid};

/// The static kind of a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    #[default]
    Path,
    Wall,
    Goal,
    Start,
}

/// One cell of a level.
///
/// The item flag is independent of the kind, so a path (or goal) tile can
/// carry a collectible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    #[serde(default)]
    pub item: bool,
}

impl Tile {
    pub const fn new(kind: TileKind) -> Self {
        Tile { kind, item: false }
    }

    pub const fn with_item(kind: TileKind) -> Self {
        Tile { kind, item: true }
    }

    #[inline]
    pub fn is_wall(&self) -> bool {
        self.kind == TileKind::Wall
    }
}

/// Where the agent is, which way it faces, and whether it carries an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentState {
    pub position: Position,
    pub facing: Direction,
    #[serde(default)]
    pub holds_item: bool,
}

impl AgentState {
    pub const fn new(position: Position, facing: Direction) -> Self {
        AgentState {
            position,
            facing,
            holds_item: false,
        }
    }
}

/// True iff `(x, y)` is inside the grid and not a wall.
pub fn is_passable(grid: &Grid<Tile>, x: usize, y: usize) -> bool {
    grid.get(x, y).is_some_and(|tile| !tile.is_wall())
}

/// True iff `(x, y)` is inside the grid and carries an item.
pub fn has_item(grid: &Grid<Tile>, x: usize, y: usize) -> bool {
    grid.get(x, y).is_some_and(|tile| tile.item)
}

/// Errors from parsing the textual map format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("Map string is empty.")]
    Empty,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown map code '{code}' at position ({x}, {y}).")]
    UnknownCode { code: String, x: usize, y: usize },
    #[error("Multiple start positions ('ST') found.")]
    MultipleStarts,
    #[error("No start position ('ST') found in map.")]
    NoStart,
}

/// Parses a map of whitespace-separated two-letter codes, one row per line.
///
/// | code | tile              |
/// |------|-------------------|
/// | `ST` | start             |
/// | `PA` | path              |
/// | `WL` | wall              |
/// | `GO` | goal              |
/// | `IT` | path with an item |
/// | `GI` | goal with an item |
///
/// Returns the grid together with the position of the single `ST` tile.
pub fn load_grid_from_string(map: &str) -> Result<(Grid<Tile>, Position), MapError> {
    let lines: Vec<&str> = map
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(MapError::Empty);
    }

    let mut rows = Vec::with_capacity(lines.len());
    let mut start = None;
    let mut width = 0;

    for (y, line) in lines.iter().enumerate() {
        let codes: Vec<&str> = line.split_whitespace().collect();
        if y == 0 {
            width = codes.len();
        } else if codes.len() != width {
            return Err(MapError::RaggedRow {
                row: y,
                expected: width,
                found: codes.len(),
            });
        }

        let mut row = Vec::with_capacity(width);
        for (x, code) in codes.iter().enumerate() {
            let tile = match code.to_ascii_uppercase().as_str() {
                "ST" => {
                    if start.is_some() {
                        return Err(MapError::MultipleStarts);
                    }
                    start = Some(Position::new(x, y));
                    Tile::new(TileKind::Start)
                }
                "PA" => Tile::new(TileKind::Path),
                "WL" => Tile::new(TileKind::Wall),
                "GO" => Tile::new(TileKind::Goal),
                "IT" => Tile::with_item(TileKind::Path),
                "GI" => Tile::with_item(TileKind::Goal),
                _ => {
                    return Err(MapError::UnknownCode {
                        code: (*code).to_string(),
                        x,
                        y,
                    });
                }
            };
            row.push(tile);
        }
        rows.push(row);
    }

    let start = start.ok_or(MapError::NoStart)?;
    // Every line holds at least one code after trimming, so rows are never empty.
    let grid = Grid::from_rows(rows).map_err(|_| MapError::Empty)?;
    Ok((grid, start))
}

/// Renders a grid back into the textual map format.
pub fn grid_to_string(grid: &Grid<Tile>) -> String {
    grid.rows()
        .map(|row| {
            row.iter()
                .map(|tile| match (tile.kind, tile.item) {
                    (TileKind::Start, _) => "ST",
                    (TileKind::Wall, _) => "WL",
                    (TileKind::Path, false) => "PA",
                    (TileKind::Path, true) => "IT",
                    (TileKind::Goal, false) => "GO",
                    (TileKind::Goal, true) => "GI",
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
