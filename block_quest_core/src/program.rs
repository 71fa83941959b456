//! Instructions, programs, and their plain-text form.
//!
//! A program is a flat list. The two loop wrappers (`repeat` and `while`)
//! govern only the single instruction that follows them; see
//! [`crate::interpreter`] for how that is executed.

use std::{fmt, num::NonZeroU32, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Condition;

/// Ceiling used by `while` when the text form omits one.
pub const DEFAULT_MAX_ITERATIONS: NonZeroU32 = match NonZeroU32::new(50) {
    Some(n) => n,
    None => panic!("zero ceiling"),
};

/// An atomic action, the only thing the step executor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Forward,
    TurnLeft,
    TurnRight,
    Pickup,
}

/// One block of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    Forward,
    TurnLeft,
    TurnRight,
    Pickup,
    /// Runs the next instruction `count` times.
    Repeat { count: NonZeroU32 },
    /// Runs the next instruction while `condition` holds, at most
    /// `max_iterations` times.
    While {
        condition: Condition,
        max_iterations: NonZeroU32,
    },
}

impl Instruction {
    /// The atomic action behind a simple instruction; `None` for loop wrappers.
    pub fn as_action(self) -> Option<Action> {
        match self {
            Instruction::Forward => Some(Action::Forward),
            Instruction::TurnLeft => Some(Action::TurnLeft),
            Instruction::TurnRight => Some(Action::TurnRight),
            Instruction::Pickup => Some(Action::Pickup),
            Instruction::Repeat { .. } | Instruction::While { .. } => None,
        }
    }

    pub fn kind(self) -> InstructionKind {
        match self {
            Instruction::Forward => InstructionKind::Forward,
            Instruction::TurnLeft => InstructionKind::TurnLeft,
            Instruction::TurnRight => InstructionKind::TurnRight,
            Instruction::Pickup => InstructionKind::Pickup,
            Instruction::Repeat { .. } => InstructionKind::Repeat,
            Instruction::While { .. } => InstructionKind::While,
        }
    }

    pub fn repeat(count: u32) -> Option<Self> {
        NonZeroU32::new(count).map(|count| Instruction::Repeat { count })
    }

    pub fn while_(condition: Condition, max_iterations: u32) -> Option<Self> {
        NonZeroU32::new(max_iterations).map(|max_iterations| Instruction::While {
            condition,
            max_iterations,
        })
    }
}

impl From<Action> for Instruction {
    fn from(action: Action) -> Self {
        match action {
            Action::Forward => Instruction::Forward,
            Action::TurnLeft => Instruction::TurnLeft,
            Action::TurnRight => Instruction::TurnRight,
            Action::Pickup => Instruction::Pickup,
        }
    }
}

/// Instruction kinds without payload, used for a level's block palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    Forward,
    TurnLeft,
    TurnRight,
    Pickup,
    Repeat,
    While,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Instruction::from(*self), f)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Forward => f.write_str("forward"),
            Instruction::TurnLeft => f.write_str("left"),
            Instruction::TurnRight => f.write_str("right"),
            Instruction::Pickup => f.write_str("pickup"),
            Instruction::Repeat { count } => write!(f, "repeat {count}"),
            Instruction::While {
                condition,
                max_iterations,
            } => write!(f, "while {condition} {max_iterations}"),
        }
    }
}

/// Errors from parsing the text form of a program. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramParseError {
    #[error("line {line}: unknown instruction '{word}'")]
    UnknownInstruction { line: usize, word: String },
    #[error("line {line}: '{keyword}' needs a count")]
    MissingCount { line: usize, keyword: &'static str },
    #[error("line {line}: '{value}' is not a positive count")]
    InvalidCount { line: usize, value: String },
    #[error("line {line}: 'while' needs a condition")]
    MissingCondition { line: usize },
    #[error("line {line}: unknown condition '{word}' (expected path_ahead or not_at_goal)")]
    UnknownCondition { line: usize, word: String },
    #[error("line {line}: unexpected '{word}'")]
    TrailingInput { line: usize, word: String },
}

/// An ordered list of instructions as submitted by the player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Program { instructions }
    }

    /// Number of top-level instructions; a wrapper counts as one.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Instruction> {
        self.instructions.get(index).copied()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl From<Vec<Instruction>> for Program {
    fn from(instructions: Vec<Instruction>) -> Self {
        Program::new(instructions)
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<I: IntoIterator<Item = Instruction>>(iter: I) -> Self {
        Program::new(iter.into_iter().collect())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instruction) in self.instructions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{instruction}")?;
        }
        Ok(())
    }
}

impl FromStr for Program {
    type Err = ProgramParseError;

    /// Parses one instruction per line or `;`-separated statement. `#` starts
    /// a comment.
    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut instructions = Vec::new();
        for (line_no, line) in source.lines().enumerate() {
            let line_no = line_no + 1;
            let code = line.split('#').next().unwrap_or_default();
            for statement in code.split(';') {
                let words: Vec<&str> = statement.split_whitespace().collect();
                if !words.is_empty() {
                    instructions.push(parse_statement(line_no, &words)?);
                }
            }
        }
        Ok(Program::new(instructions))
    }
}

fn parse_statement(line: usize, words: &[&str]) -> Result<Instruction, ProgramParseError> {
    let keyword = words[0].to_ascii_lowercase();
    let (instruction, used) = match keyword.as_str() {
        "forward" => (Instruction::Forward, 1),
        "left" | "turn_left" => (Instruction::TurnLeft, 1),
        "right" | "turn_right" => (Instruction::TurnRight, 1),
        "pickup" => (Instruction::Pickup, 1),
        "repeat" => {
            let raw = words
                .get(1)
                .ok_or(ProgramParseError::MissingCount {
                    line,
                    keyword: "repeat",
                })?;
            (
                Instruction::Repeat {
                    count: parse_count(line, raw)?,
                },
                2,
            )
        }
        "while" => {
            let raw = words
                .get(1)
                .ok_or(ProgramParseError::MissingCondition { line })?;
            let condition =
                raw.parse::<Condition>()
                    .map_err(|_| ProgramParseError::UnknownCondition {
                        line,
                        word: (*raw).to_string(),
                    })?;
            match words.get(2) {
                Some(raw) => (
                    Instruction::While {
                        condition,
                        max_iterations: parse_count(line, raw)?,
                    },
                    3,
                ),
                None => (
                    Instruction::While {
                        condition,
                        max_iterations: DEFAULT_MAX_ITERATIONS,
                    },
                    2,
                ),
            }
        }
        _ => {
            return Err(ProgramParseError::UnknownInstruction {
                line,
                word: words[0].to_string(),
            });
        }
    };

    if let Some(extra) = words.get(used) {
        return Err(ProgramParseError::TrailingInput {
            line,
            word: (*extra).to_string(),
        });
    }
    Ok(instruction)
}

fn parse_count(line: usize, raw: &str) -> Result<NonZeroU32, ProgramParseError> {
    raw.parse::<NonZeroU32>()
        .map_err(|_| ProgramParseError::InvalidCount {
            line,
            value: raw.to_string(),
        })
}
