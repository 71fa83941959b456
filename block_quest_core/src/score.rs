use crate::{
    Level, Position,
    world::{AgentState, TileKind},
};

/// Decides whether a finished run passed and how many stars it earned.
///
/// The run passes when the agent stands on the level's goal tile and, if the
/// level template contains any item, carries one. The goal is the first goal
/// tile in row-major order; a level without one can never be passed.
///
/// Stars compare `program_len` (top-level instructions, wrappers count once)
/// with the level's par: 3 at or under par, 2 up to two over, 1 beyond that,
/// and 0 for a failed run.
pub fn score(final_agent: &AgentState, level: &Level, program_len: usize) -> (bool, u8) {
    let success = goal_position(level).is_some_and(|goal| {
        final_agent.position == goal && (final_agent.holds_item || !level_requires_item(level))
    });
    (success, stars(success, program_len, level.par()))
}

fn goal_position(level: &Level) -> Option<Position> {
    level.grid().find(|tile| tile.kind == TileKind::Goal)
}

fn level_requires_item(level: &Level) -> bool {
    level.grid().iter().any(|tile| tile.item)
}

fn stars(success: bool, program_len: usize, par: usize) -> u8 {
    match success {
        false => 0,
        true if program_len <= par => 3,
        true if program_len <= par + 2 => 2,
        true => 1,
    }
}
