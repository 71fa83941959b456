//! End-to-end behaviour of the interpreter and scorer.
//!
//! Covers:
//! - the reference scenarios (straight corridor, repeat, blocked start)
//! - star thresholds and item gating
//! - while-loop ceilings
//! - determinism and wall safety over random programs
//! - the built-in catalog and level directory loading

use std::fs;

use block_quest_core::{
    Action, AgentState, Condition, Direction, Instruction, InstructionKind, Level, LevelError,
    Position, Program, RunWarning, TileKind, builtin_levels, execute_step,
    level::load_levels_dir, map::Grid, run, world::load_grid_from_string,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

const ALL_KINDS: [InstructionKind; 6] = [
    InstructionKind::Forward,
    InstructionKind::TurnLeft,
    InstructionKind::TurnRight,
    InstructionKind::Pickup,
    InstructionKind::Repeat,
    InstructionKind::While,
];

fn level(map: &str, facing: Direction, par: usize) -> Level {
    let (grid, start) = load_grid_from_string(map).expect("valid map");
    Level::new(1, "test", grid, AgentState::new(start, facing), ALL_KINDS, par)
        .expect("valid level")
}

fn program(source: &str) -> Program {
    source.parse().expect("valid program")
}

fn random_instruction(rng: &mut StdRng) -> Instruction {
    match rng.random_range(0..6) {
        0 => Instruction::Forward,
        1 => Instruction::TurnLeft,
        2 => Instruction::TurnRight,
        3 => Instruction::Pickup,
        4 => Instruction::repeat(rng.random_range(1..5)).expect("positive"),
        _ => {
            let condition = if rng.random_bool(0.5) {
                Condition::PathAhead
            } else {
                Condition::NotAtGoal
            };
            Instruction::while_(condition, rng.random_range(1..12)).expect("positive")
        }
    }
}

fn random_program(rng: &mut StdRng) -> Program {
    let len = rng.random_range(0..14);
    (0..len).map(|_| random_instruction(rng)).collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Reference scenarios
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn straight_corridor_three_forwards() {
    let level = level("ST PA PA GO", Direction::Right, 3);
    let result = level.play(&program("forward; forward; forward"));

    assert_eq!(result.final_agent.position, Position::new(3, 0));
    assert_eq!(result.final_agent.facing, Direction::Right);
    assert!(result.success);
    assert_eq!(result.stars, 3);
    assert_eq!(result.trace.len(), 3);
}

#[test]
fn repeat_matches_unrolled_program() {
    let level = level("ST PA PA GO", Direction::Right, 3);
    let unrolled = level.play(&program("forward; forward; forward"));
    let looped = level.play(&program("repeat 3; forward"));

    assert_eq!(looped.final_agent, unrolled.final_agent);
    assert_eq!(looped.success, unrolled.success);
    assert_eq!(looped.stars, unrolled.stars);
    assert_eq!(looped.trace.len(), 3);
}

#[test]
fn forward_into_wall_stays_at_start() {
    let level = level("ST WL\nPA GO", Direction::Right, 3);
    let result = level.play(&program("forward"));

    assert_eq!(result.final_agent.position, Position::new(0, 0));
    assert!(!result.success);
    assert_eq!(result.stars, 0);
    assert_eq!(result.trace.len(), 1, "blocked moves are still traced");
}

#[test]
fn forward_off_the_edge_is_noop() {
    let level = level("ST PA GO", Direction::Up, 3);
    let result = level.play(&program("forward; left; forward"));
    assert_eq!(result.final_agent.position, Position::new(0, 0));
    assert_eq!(result.final_agent.facing, Direction::Left);
}

// ══════════════════════════════════════════════════════════════════════════════
// Scoring
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn star_boundaries_with_par_three() {
    let level = level("ST PA PA GO", Direction::Right, 3);

    let exact = level.play(&program("repeat 3; forward; left"));
    assert_eq!((exact.success, exact.stars), (true, 3));

    let five = level.play(&program("forward; forward; forward; left; right"));
    assert_eq!((five.success, five.stars), (true, 2));

    let six = level.play(&program("forward; forward; forward; left; right; left"));
    assert_eq!((six.success, six.stars), (true, 1));

    let short = level.play(&program("forward; forward"));
    assert_eq!((short.success, short.stars), (false, 0));

    let long_fail = level.play(&program("left; left; left; left; left; left; left"));
    assert_eq!((long_fail.success, long_fail.stars), (false, 0));
}

#[test]
fn item_gates_success() {
    let level = level("ST IT PA GO", Direction::Right, 4);

    let skipped = level.play(&program("forward; forward; forward"));
    assert_eq!(skipped.final_agent.position, Position::new(3, 0));
    assert!(!skipped.success);

    let collected = level.play(&program("forward; pickup; forward; forward"));
    assert!(collected.final_agent.holds_item);
    assert!(collected.success);
    assert_eq!(collected.stars, 3);

    let wrong_tile = level.play(&program("pickup; forward; forward; forward"));
    assert!(!wrong_tile.final_agent.holds_item);
    assert!(!wrong_tile.success);
}

#[test]
fn level_without_goal_never_succeeds() {
    let level = level("ST PA PA", Direction::Right, 2);
    let result = level.play(&program("forward; forward"));
    assert!(!result.success);
    assert_eq!(result.stars, 0);
}

#[test]
fn first_goal_in_row_major_order_counts() {
    let level = level("ST PA GO\nGO PA PA", Direction::Right, 5);
    assert!(level.play(&program("forward; forward")).success);

    let down = level.play(&program("right; forward"));
    assert_eq!(down.final_agent.position, Position::new(0, 1));
    assert_eq!(
        level.grid()[down.final_agent.position].kind,
        TileKind::Goal
    );
    assert!(!down.success);
}

// ══════════════════════════════════════════════════════════════════════════════
// While loops
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn while_path_ahead_takes_min_of_ceiling_and_row() {
    for len in 1..=6 {
        let map = std::iter::once("ST")
            .chain(std::iter::repeat_n("PA", len - 1))
            .collect::<Vec<_>>()
            .join(" ");
        let (grid, start) = load_grid_from_string(&map).unwrap();
        let agent = AgentState::new(start, Direction::Right);

        for ceiling in 1..=8u32 {
            let prog = Program::new(vec![
                Instruction::while_(Condition::PathAhead, ceiling).unwrap(),
                Instruction::Forward,
            ]);
            let result = run(&prog, &agent, &grid);
            let expected = (ceiling as usize).min(len - 1);

            assert_eq!(result.trace.len(), expected, "len={len} ceiling={ceiling}");
            assert_eq!(result.agent.position, Position::new(expected, 0));
            let capped = (ceiling as usize) < len - 1;
            assert_eq!(
                result.warnings,
                if capped {
                    vec![RunWarning::IterationLimit {
                        index: 0,
                        max_iterations: ceiling,
                    }]
                } else {
                    vec![]
                },
                "len={len} ceiling={ceiling}"
            );
        }
    }
}

#[test]
fn while_not_at_goal_walks_to_goal() {
    let level = level("ST PA PA PA GO PA", Direction::Right, 2);
    let result = level.play(&program("while not_at_goal 20; forward"));
    assert_eq!(result.final_agent.position, Position::new(4, 0));
    assert!(result.success);
    assert!(result.warnings.is_empty());
}

#[test]
fn execution_continues_after_ceiling() {
    let level = level("ST PA PA PA PA GO", Direction::Right, 3);
    let result = level.play(&program("while path_ahead 2; forward; repeat 3; forward"));
    assert_eq!(result.final_agent.position, Position::new(5, 0));
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
}

// ══════════════════════════════════════════════════════════════════════════════
// Properties
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn runs_are_deterministic() {
    let mut rng = StdRng::seed_from_u64(7);
    let catalog = builtin_levels().unwrap();
    for _ in 0..200 {
        let prog = random_program(&mut rng);
        let level = &catalog[rng.random_range(0..catalog.len())];
        assert_eq!(level.play(&prog), level.play(&prog), "program:\n{prog}");
    }
}

#[test]
fn agent_never_stands_on_a_wall() {
    let mut rng = StdRng::seed_from_u64(42);
    let catalog = builtin_levels().unwrap();
    for _ in 0..300 {
        let prog = random_program(&mut rng);
        let level = &catalog[rng.random_range(0..catalog.len())];
        let result = level.play(&prog);
        for entry in &result.trace {
            let tile = level.grid()[entry.agent.position];
            assert_ne!(tile.kind, TileKind::Wall, "program:\n{prog}");
        }
    }
}

#[test]
fn step_executor_never_aliases_its_input() {
    let (grid, _) = load_grid_from_string("ST IT GO").unwrap();
    let agent = AgentState::new(Position::new(1, 0), Direction::Right);
    let snapshot = grid.clone();

    let (after, mut next_grid) = execute_step(&agent, Action::Pickup, &grid);
    assert!(after.holds_item);
    next_grid
        .set(2, 0, block_quest_core::Tile::new(TileKind::Wall))
        .unwrap();
    assert_eq!(grid, snapshot);
}

#[test]
fn stepwise_execution_can_be_abandoned() {
    let level = level("ST PA PA GO", Direction::Right, 3);
    let prog = program("repeat 3; forward");
    let mut interp = level.interpreter(&prog);
    assert!(interp.step().is_some());
    assert_eq!(interp.agent().position, Position::new(1, 0));
    drop(interp);

    // The level is untouched and a fresh run starts over.
    let result = level.play(&prog);
    assert!(result.success);
}

#[test]
fn trace_snapshots_survive_later_steps() {
    let (grid, start) = load_grid_from_string("ST IT PA").unwrap();
    let agent = AgentState::new(start, Direction::Right);
    let (a1, g1) = execute_step(&agent, Action::Forward, &grid);
    let kept: Grid<_> = g1.clone();
    let (_, g2) = execute_step(&a1, Action::Pickup, &g1);

    assert!(kept[Position::new(1, 0)].item);
    assert!(!g2[Position::new(1, 0)].item);
}

// ══════════════════════════════════════════════════════════════════════════════
// Catalog
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn builtin_levels_have_three_star_solutions() {
    let solutions = [
        (1, "forward; forward; forward"),
        (2, "forward; forward; right; forward; forward"),
        (3, "forward; pickup; forward; forward"),
        (4, "forward; right; forward; left; forward; forward; right; forward"),
        (5, "repeat 6; forward"),
        (6, "while path_ahead 10; forward; right; while not_at_goal 10; forward"),
    ];
    let catalog = builtin_levels().unwrap();
    assert_eq!(catalog.len(), solutions.len());

    for (level, (id, source)) in catalog.iter().zip(solutions) {
        assert_eq!(level.id(), id);
        let prog = program(source);
        assert!(level.disallowed(&prog).is_empty(), "level {id} palette");
        let result = level.play(&prog);
        assert!(result.success, "level {id} not solved");
        assert_eq!(result.stars, 3, "level {id} stars");
    }
}

#[test]
fn sample_programs_earn_three_stars() {
    let samples = [
        (5, include_str!("../../programs/long_hall.txt")),
        (6, include_str!("../../programs/until_the_wall.txt")),
    ];
    let catalog = builtin_levels().unwrap();

    for (id, source) in samples {
        let level = catalog.iter().find(|l| l.id() == id).unwrap();
        let prog = program(source);
        assert_eq!(prog.len(), level.par(), "level {id} par");
        let result = level.play(&prog);
        assert!(result.success, "level {id} not solved");
        assert_eq!(result.stars, 3, "level {id} stars");
    }
}

#[test]
fn until_the_wall_misses_par_by_one_with_an_extra_block() {
    let catalog = builtin_levels().unwrap();
    let level = catalog.iter().find(|l| l.id() == 6).unwrap();
    let prog = program("while path_ahead 10; forward; right; forward; while not_at_goal 10; forward");
    assert_eq!(prog.len(), 6);
    let result = level.play(&prog);
    assert!(result.success);
    assert_eq!(result.stars, 2);
}

#[test]
fn loads_levels_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("b.toml"),
        "id = 20\nname = \"B\"\npar = 1\nallowed = [\"forward\"]\nmap = \"ST GO\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("a.toml"),
        "id = 10\nname = \"A\"\npar = 1\nallowed = [\"forward\"]\nmap = \"ST GO\"\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let levels = load_levels_dir(dir.path()).unwrap();
    let ids: Vec<u32> = levels.iter().map(Level::id).collect();
    assert_eq!(ids, vec![10, 20]);
}

#[test]
fn duplicate_level_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let body = "id = 3\nname = \"X\"\npar = 1\nallowed = [\"forward\"]\nmap = \"ST GO\"\n";
    fs::write(dir.path().join("one.toml"), body).unwrap();
    fs::write(dir.path().join("two.toml"), body).unwrap();

    assert!(matches!(
        load_levels_dir(dir.path()),
        Err(LevelError::DuplicateId(3))
    ));
}

#[test]
fn missing_level_file_reports_path() {
    let err = Level::load(std::path::Path::new("/nonexistent/level.toml")).unwrap_err();
    assert!(matches!(err, LevelError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/level.toml"));
}
