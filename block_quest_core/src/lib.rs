use serde::{Deserialize, Serialize};

pub mod condition;
pub mod interpreter;
pub mod level;
pub mod map;
pub mod program;
pub mod progress;
pub mod score;
pub mod step;
pub mod world;

pub use condition::{Condition, evaluate};
pub use interpreter::{Execution, Interpreter, RunWarning, TraceEntry, run};
pub use level::{Level, LevelError, RunResult, builtin_levels};
pub use program::{Action, Instruction, InstructionKind, Program, ProgramParseError};
pub use progress::Progress;
pub use score::score;
pub use step::execute_step;
pub use world::{AgentState, Tile, TileKind, has_item, is_passable};

/// Represents a 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Returns the position one cell away in `direction`, or `None` if that
    /// would leave the non-negative quadrant. Upper bounds are the grid's concern.
    pub fn offset(self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

/// The way the agent is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    /// Rotates 90° clockwise: up → right → down → left → up.
    pub fn turn_right(self) -> Self {
        match self {
            Direction::Up => Direction::Right,
            Direction::Right => Direction::Down,
            Direction::Down => Direction::Left,
            Direction::Left => Direction::Up,
        }
    }

    /// Rotates 90° counter-clockwise.
    pub fn turn_left(self) -> Self {
        match self {
            Direction::Up => Direction::Left,
            Direction::Left => Direction::Down,
            Direction::Down => Direction::Right,
            Direction::Right => Direction::Up,
        }
    }

    /// Unit step as `(dx, dy)`, with y growing downward.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    #[test]
    fn four_turns_restore_facing() {
        for dir in ALL {
            let right = dir.turn_right().turn_right().turn_right().turn_right();
            let left = dir.turn_left().turn_left().turn_left().turn_left();
            assert_eq!(right, dir);
            assert_eq!(left, dir);
        }
    }

    #[test]
    fn right_then_left_is_identity() {
        for dir in ALL {
            assert_eq!(dir.turn_right().turn_left(), dir);
            assert_eq!(dir.turn_left().turn_right(), dir);
        }
    }

    #[test]
    fn offset_stops_at_origin() {
        let origin = Position::new(0, 0);
        assert_eq!(origin.offset(Direction::Up), None);
        assert_eq!(origin.offset(Direction::Left), None);
        assert_eq!(origin.offset(Direction::Down), Some(Position::new(0, 1)));
        assert_eq!(origin.offset(Direction::Right), Some(Position::new(1, 0)));
    }
}
