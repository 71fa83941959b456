use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    map::Grid,
    world::{AgentState, Tile, TileKind, is_passable},
};

/// Guards a `while` loop. Evaluated against live state before every iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The cell ahead of the agent is inside the grid and not a wall.
    PathAhead,
    /// The agent is not standing on a goal tile.
    NotAtGoal,
}

/// Evaluates `condition` for the agent on `grid`. Never mutates either.
pub fn evaluate(condition: Condition, agent: &AgentState, grid: &Grid<Tile>) -> bool {
    match condition {
        Condition::PathAhead => grid
            .neighbor(agent.position, agent.facing)
            .is_some_and(|ahead| is_passable(grid, ahead.x, ahead.y)),
        Condition::NotAtGoal => grid
            .get(agent.position.x, agent.position.y)
            .is_none_or(|tile| tile.kind != TileKind::Goal),
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Condition::PathAhead => "path_ahead",
            Condition::NotAtGoal => "not_at_goal",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown condition '{0}'")]
pub struct UnknownCondition(pub String);

impl FromStr for Condition {
    type Err = UnknownCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path_ahead" | "pathahead" => Ok(Condition::PathAhead),
            "not_at_goal" | "notatgoal" => Ok(Condition::NotAtGoal),
            _ => Err(UnknownCondition(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, Position, world::load_grid_from_string};

    fn agent(x: usize, y: usize, facing: Direction) -> AgentState {
        AgentState::new(Position::new(x, y), facing)
    }

    #[test]
    fn path_ahead_sees_walls_and_edges() {
        let (grid, _) = load_grid_from_string("ST PA WL").unwrap();
        assert!(evaluate(Condition::PathAhead, &agent(0, 0, Direction::Right), &grid));
        assert!(!evaluate(Condition::PathAhead, &agent(1, 0, Direction::Right), &grid));
        assert!(!evaluate(Condition::PathAhead, &agent(0, 0, Direction::Left), &grid));
        assert!(!evaluate(Condition::PathAhead, &agent(0, 0, Direction::Up), &grid));
    }

    #[test]
    fn not_at_goal_checks_current_tile() {
        let (grid, _) = load_grid_from_string("ST GO").unwrap();
        assert!(evaluate(Condition::NotAtGoal, &agent(0, 0, Direction::Right), &grid));
        assert!(!evaluate(Condition::NotAtGoal, &agent(1, 0, Direction::Right), &grid));
    }

    #[test]
    fn parses_both_spellings() {
        assert_eq!("PathAhead".parse(), Ok(Condition::PathAhead));
        assert_eq!("not_at_goal".parse(), Ok(Condition::NotAtGoal));
        assert!("soon".parse::<Condition>().is_err());
    }
}
