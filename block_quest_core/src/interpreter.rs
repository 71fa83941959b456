//! Drives a [`Program`] against a world, one atomic step at a time.
//!
//! Programs are flat lists in which a `repeat` or `while` wrapper applies to
//! exactly the instruction right after it. The driver is an explicit cursor
//! over the instruction index rather than a recursive walk:
//!
//! * a simple instruction runs once and the cursor moves by one;
//! * a wrapper whose next instruction is simple runs that instruction and the
//!   cursor then skips both;
//! * a wrapper at the end of the program, or followed by another wrapper, is a
//!   no-op and the cursor moves by one. Wrappers never nest.
//!
//! Nothing here fails. Blocked moves are no-ops, malformed wrappers are
//! skipped, and a `while` loop that reaches its ceiling simply stops. The last
//! two are reported as [`RunWarning`]s.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    Action, Condition, Instruction, Program, evaluate,
    map::Grid,
    step::execute_step,
    world::{AgentState, Tile},
};

/// One executed atomic action and the agent state right after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Index of the top-level instruction that produced this step. For a
    /// wrapped instruction this is the wrapper's index.
    pub index: usize,
    pub action: Action,
    pub agent: AgentState,
}

/// Recoverable oddities seen during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// A `while` loop hit its ceiling while its condition still held.
    IterationLimit { index: usize, max_iterations: u32 },
    /// A wrapper is the last instruction of the program.
    DanglingWrapper { index: usize },
    /// A wrapper is followed by another wrapper.
    NestedWrapper { index: usize },
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::IterationLimit {
                index,
                max_iterations,
            } => write!(
                f,
                "instruction {}: while loop stopped after {max_iterations} iterations",
                index + 1
            ),
            RunWarning::DanglingWrapper { index } => {
                write!(f, "instruction {}: loop has nothing to repeat", index + 1)
            }
            RunWarning::NestedWrapper { index } => write!(
                f,
                "instruction {}: loop cannot wrap another loop and was skipped",
                index + 1
            ),
        }
    }
}

/// Final state of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub agent: AgentState,
    pub grid: Grid<Tile>,
    pub trace: Vec<TraceEntry>,
    pub warnings: Vec<RunWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// About to look at the instruction at this index.
    At(usize),
    Repeating {
        index: usize,
        action: Action,
        remaining: u32,
    },
    Looping {
        index: usize,
        action: Action,
        condition: Condition,
        max_iterations: u32,
        done: u32,
    },
    Finished,
}

/// Step-by-step program driver.
///
/// Each call to [`Interpreter::step`] (or [`Iterator::next`]) performs exactly
/// one atomic action, so a caller can pace execution however it likes and
/// inspect the world in between. Dropping the interpreter abandons the run.
#[derive(Debug, Clone)]
pub struct Interpreter<'p> {
    program: &'p Program,
    agent: AgentState,
    grid: Grid<Tile>,
    cursor: Cursor,
    trace: Vec<TraceEntry>,
    warnings: Vec<RunWarning>,
}

impl<'p> Interpreter<'p> {
    /// Starts a run from the given working state. The caller hands over its
    /// own copies; level templates should be cloned before this point.
    pub fn new(program: &'p Program, agent: AgentState, grid: Grid<Tile>) -> Self {
        Interpreter {
            program,
            agent,
            grid,
            cursor: Cursor::At(0),
            trace: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn agent(&self) -> &AgentState {
        &self.agent
    }

    pub fn grid(&self) -> &Grid<Tile> {
        &self.grid
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn warnings(&self) -> &[RunWarning] {
        &self.warnings
    }

    pub fn is_finished(&self) -> bool {
        self.cursor == Cursor::Finished
    }

    /// Index of the top-level instruction being executed, if any.
    pub fn current_index(&self) -> Option<usize> {
        match self.cursor {
            Cursor::At(index)
            | Cursor::Repeating { index, .. }
            | Cursor::Looping { index, .. } => {
                (index < self.program.len()).then_some(index)
            }
            Cursor::Finished => None,
        }
    }

    /// Performs the next atomic action. Returns `None` once the program is
    /// exhausted; further calls keep returning `None`.
    pub fn step(&mut self) -> Option<TraceEntry> {
        loop {
            match self.cursor {
                Cursor::Finished => return None,
                Cursor::At(index) => {
                    let Some(instruction) = self.program.get(index) else {
                        debug!(steps = self.trace.len(), "program finished");
                        self.cursor = Cursor::Finished;
                        return None;
                    };

                    let wrapped = match instruction {
                        Instruction::Repeat { count } => {
                            self.wrapper_target(index).map(|action| Cursor::Repeating {
                                index,
                                action,
                                remaining: count.get(),
                            })
                        }
                        Instruction::While {
                            condition,
                            max_iterations,
                        } => self.wrapper_target(index).map(|action| Cursor::Looping {
                            index,
                            action,
                            condition,
                            max_iterations: max_iterations.get(),
                            done: 0,
                        }),
                        simple => {
                            if let Some(action) = simple.as_action() {
                                self.cursor = Cursor::At(index + 1);
                                return Some(self.apply(index, action));
                            }
                            None
                        }
                    };
                    self.cursor = wrapped.unwrap_or(Cursor::At(index + 1));
                }
                Cursor::Repeating {
                    index,
                    action,
                    remaining,
                } => {
                    if remaining == 0 {
                        self.cursor = Cursor::At(index + 2);
                        continue;
                    }
                    self.cursor = Cursor::Repeating {
                        index,
                        action,
                        remaining: remaining - 1,
                    };
                    return Some(self.apply(index, action));
                }
                Cursor::Looping {
                    index,
                    action,
                    condition,
                    max_iterations,
                    done,
                } => {
                    if !evaluate(condition, &self.agent, &self.grid) {
                        self.cursor = Cursor::At(index + 2);
                        continue;
                    }
                    if done >= max_iterations {
                        warn!(index, max_iterations, %condition, "while loop hit its iteration ceiling");
                        self.warnings.push(RunWarning::IterationLimit {
                            index,
                            max_iterations,
                        });
                        self.cursor = Cursor::At(index + 2);
                        continue;
                    }
                    self.cursor = Cursor::Looping {
                        index,
                        action,
                        condition,
                        max_iterations,
                        done: done + 1,
                    };
                    return Some(self.apply(index, action));
                }
            }
        }
    }

    /// Runs the remaining steps and returns the final state.
    pub fn finish(mut self) -> Execution {
        while self.step().is_some() {}
        Execution {
            agent: self.agent,
            grid: self.grid,
            trace: self.trace,
            warnings: self.warnings,
        }
    }

    /// The simple instruction a wrapper at `index` governs, if there is one.
    fn wrapper_target(&mut self, index: usize) -> Option<Action> {
        match self.program.get(index + 1) {
            Some(next) => {
                let action = next.as_action();
                if action.is_none() {
                    warn!(index, "loop wraps another loop; skipping it");
                    self.warnings.push(RunWarning::NestedWrapper { index });
                }
                action
            }
            None => {
                warn!(index, "loop at end of program; skipping it");
                self.warnings.push(RunWarning::DanglingWrapper { index });
                None
            }
        }
    }

    fn apply(&mut self, index: usize, action: Action) -> TraceEntry {
        let (agent, grid) = execute_step(&self.agent, action, &self.grid);
        self.agent = agent;
        self.grid = grid;

        let entry = TraceEntry {
            index,
            action,
            agent,
        };
        debug!(
            index,
            %action,
            x = agent.position.x,
            y = agent.position.y,
            facing = ?agent.facing,
            "step"
        );
        self.trace.push(entry);
        entry
    }
}

impl Iterator for Interpreter<'_> {
    type Item = TraceEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

/// Runs `program` to completion on copies of the initial agent and grid.
pub fn run(program: &Program, initial_agent: &AgentState, initial_grid: &Grid<Tile>) -> Execution {
    Interpreter::new(program, *initial_agent, initial_grid.clone()).finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, Position, world::load_grid_from_string};

    fn corridor(map: &str) -> (Grid<Tile>, AgentState) {
        let (grid, start) = load_grid_from_string(map).unwrap();
        (grid, AgentState::new(start, Direction::Right))
    }

    fn program(src: &str) -> Program {
        src.parse().unwrap()
    }

    #[test]
    fn simple_instructions_run_in_order() {
        let (grid, agent) = corridor("ST PA PA GO");
        let result = run(&program("forward; forward; left"), &agent, &grid);

        assert_eq!(result.agent.position, Position::new(2, 0));
        assert_eq!(result.agent.facing, Direction::Up);
        let indices: Vec<usize> = result.trace.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn repeat_runs_target_count_times_and_skips_it() {
        let (grid, agent) = corridor("ST PA PA PA PA");
        let result = run(&program("repeat 2; forward; right"), &agent, &grid);

        assert_eq!(result.agent.position, Position::new(2, 0));
        assert_eq!(result.agent.facing, Direction::Down);
        let steps: Vec<(usize, Action)> =
            result.trace.iter().map(|e| (e.index, e.action)).collect();
        assert_eq!(
            steps,
            vec![
                (0, Action::Forward),
                (0, Action::Forward),
                (2, Action::TurnRight)
            ]
        );
    }

    #[test]
    fn wrapper_at_end_is_noop() {
        let (grid, agent) = corridor("ST PA");
        let result = run(&program("forward; repeat 4"), &agent, &grid);

        assert_eq!(result.trace.len(), 1);
        assert_eq!(result.agent.position, Position::new(1, 0));
        assert_eq!(
            result.warnings,
            vec![RunWarning::DanglingWrapper { index: 1 }]
        );
    }

    #[test]
    fn wrapper_before_wrapper_is_skipped_and_inner_runs() {
        let (grid, agent) = corridor("ST PA PA PA PA PA");
        let result = run(&program("repeat 3; repeat 2; forward"), &agent, &grid);

        // Only the inner repeat has effect.
        assert_eq!(result.agent.position, Position::new(2, 0));
        assert!(result.trace.iter().all(|e| e.index == 1));
        assert_eq!(result.warnings, vec![RunWarning::NestedWrapper { index: 0 }]);
    }

    #[test]
    fn while_stops_when_condition_fails() {
        let (grid, agent) = corridor("ST PA PA WL");
        let result = run(&program("while path_ahead 10; forward"), &agent, &grid);

        assert_eq!(result.agent.position, Position::new(2, 0));
        assert_eq!(result.trace.len(), 2);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn while_ceiling_warns_and_continues() {
        let (grid, agent) = corridor("ST PA PA PA PA");
        let result = run(&program("while path_ahead 2; forward; left"), &agent, &grid);

        assert_eq!(result.agent.position, Position::new(2, 0));
        assert_eq!(result.agent.facing, Direction::Up);
        assert_eq!(
            result.warnings,
            vec![RunWarning::IterationLimit {
                index: 0,
                max_iterations: 2
            }]
        );
    }

    #[test]
    fn while_with_false_condition_runs_nothing() {
        let (grid, agent) = corridor("ST GO PA");
        let on_goal = AgentState::new(Position::new(1, 0), agent.facing);
        let result = run(&program("while not_at_goal 5; forward"), &on_goal, &grid);
        assert!(result.trace.is_empty());
        assert_eq!(result.agent, on_goal);
    }

    #[test]
    fn runaway_turning_loop_is_bounded() {
        let (grid, agent) = corridor("ST");
        let result = run(&program("while not_at_goal 7; right"), &agent, &grid);
        assert_eq!(result.trace.len(), 7);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn stepping_matches_run() {
        let (grid, agent) = corridor("ST PA IT GO");
        let prog = program("repeat 2; forward; pickup; forward");
        let full = run(&prog, &agent, &grid);

        let mut interp = Interpreter::new(&prog, agent, grid.clone());
        assert_eq!(interp.current_index(), Some(0));
        let mut entries = Vec::new();
        while let Some(entry) = interp.step() {
            assert_eq!(*interp.agent(), entry.agent);
            entries.push(entry);
        }
        assert!(interp.is_finished());
        assert_eq!(interp.current_index(), None);
        assert_eq!(interp.step(), None);
        assert_eq!(entries, full.trace);
        assert_eq!(interp.finish(), full);
    }

    #[test]
    fn empty_program_finishes_immediately() {
        let (grid, agent) = corridor("ST");
        let result = run(&Program::default(), &agent, &grid);
        assert_eq!(result.agent, agent);
        assert!(result.trace.is_empty());
    }

    #[test]
    fn blocked_forward_still_traced() {
        let (grid, agent) = corridor("ST WL");
        let result = run(&Program::new(vec![Instruction::Forward]), &agent, &grid);
        assert_eq!(result.trace.len(), 1);
        assert_eq!(result.trace[0].agent.position, Position::new(0, 0));
    }
}
