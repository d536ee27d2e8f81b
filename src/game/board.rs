use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::game::error::GameError;
use crate::game::state::GameOutcome;

/// The symbol a connected player is permanently assigned and plays with.
/// The first accepted connection always gets [`Mark::A`] and moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    A,
    B,
}

impl Mark {
    /// Returns the opponent's mark.
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl Display for Mark {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Index of a board cell in row-major order, guaranteed to be in `0..9`.
/// Out-of-range values are rejected at construction so they can never
/// reach [`Board`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Location(usize);

impl Location {
    /// Number of cells on the board.
    pub const COUNT: usize = 9;

    pub fn index(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for Location {
    type Error = GameError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        if value < Self::COUNT {
            Ok(Self(value))
        } else {
            Err(GameError::InvalidLocation(value))
        }
    }
}

impl From<Location> for usize {
    fn from(value: Location) -> Self {
        value.0
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The 8 canonical winning triples: 3 rows, 3 columns, 2 diagonals.
const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

type Cell = Option<Mark>;

/// The 9-cell grid. Pure data, no synchronization: the turn gate guarantees
/// at most one mutation is in flight at any instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; Location::COUNT],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: Location) -> Cell {
        self.cells[location.index()]
    }

    pub fn is_occupied(&self, location: Location) -> bool {
        self.cells[location.index()].is_some()
    }

    /// Writes `mark` into a cell. The caller must have verified the cell is
    /// empty; placing over an existing mark would corrupt the move count.
    pub fn place(&mut self, location: Location, mark: Mark) {
        self.cells[location.index()] = Some(mark);
    }

    /// Number of moves made so far, derived from the occupied cells rather
    /// than tracked as a separate counter.
    pub fn move_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.move_count() == Location::COUNT
    }

    /// Checks the winning triples for Mark A first, then Mark B, then the
    /// full-board draw condition. A win takes precedence over a full board.
    pub fn evaluate(&self) -> GameOutcome {
        for mark in [Mark::A, Mark::B] {
            if WINNING_LINES
                .iter()
                .any(|line| line.iter().all(|&i| self.cells[i] == Some(mark)))
            {
                return GameOutcome::Win(mark);
            }
        }
        if self.is_full() {
            GameOutcome::Draw
        } else {
            GameOutcome::InProgress
        }
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            match cell {
                Some(mark) => write!(f, "{}", mark)?,
                None => write!(f, ".")?,
            }
            if i % 3 == 2 && i != 8 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
