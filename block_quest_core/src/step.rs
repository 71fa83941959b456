use crate::{
    Action, Position,
    map::Grid,
    world::{AgentState, Tile, is_passable},
};

/// Applies a single atomic action and returns the resulting agent and grid.
///
/// Neither input is modified. The returned grid is always a fresh copy, so a
/// caller holding on to an earlier grid (for a trace or a replay) never sees it
/// change. Blocked moves and pickups on empty tiles leave the state as is.
///
/// This is the only place where world state changes. A presentation layer may
/// call it directly once per animation tick instead of going through
/// [`crate::run`].
pub fn execute_step(
    agent: &AgentState,
    action: Action,
    grid: &Grid<Tile>,
) -> (AgentState, Grid<Tile>) {
    let mut next_agent = *agent;
    let mut next_grid = grid.clone();

    match action {
        Action::Forward => {
            if let Some(target) = grid.neighbor(agent.position, agent.facing) {
                if is_passable(grid, target.x, target.y) {
                    next_agent.position = target;
                }
            }
        }
        Action::TurnLeft => next_agent.facing = agent.facing.turn_left(),
        Action::TurnRight => next_agent.facing = agent.facing.turn_right(),
        Action::Pickup => {
            let Position { x, y } = agent.position;
            if let Some(tile) = next_grid.get_mut(x, y) {
                if tile.item {
                    tile.item = false;
                    next_agent.holds_item = true;
                }
            }
        }
    }

    (next_agent, next_grid)
}
