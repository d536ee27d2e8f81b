use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::game::board::Mark;

/// Result of evaluating a board position. Terminal outcomes are never
/// stored anywhere, they are recomputed from the board on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    InProgress,
    Win(Mark),
    Draw,
}

impl GameOutcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl Display for GameOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "game in progress"),
            Self::Win(mark) => write!(f, "Mark {} wins", mark),
            Self::Draw => write!(f, "Draw"),
        }
    }
}
