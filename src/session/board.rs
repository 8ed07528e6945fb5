//! Board model: the 3x3 grid, whose turn it is, and outcome detection.

use serde::Serialize;
use std::fmt;

/// One of the two fixed participant slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Seat {
    One,
    Two,
}

impl Seat {
    pub const ALL: [Seat; 2] = [Seat::One, Seat::Two];

    /// Wire number of the seat (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            Seat::One => 1,
            Seat::Two => 2,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Seat::One),
            2 => Some(Seat::Two),
            _ => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Seat::One => 0,
            Seat::Two => 1,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A validated board coordinate, both axes in `0..=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    row: u8,
    col: u8,
}

impl Position {
    pub const SIZE: u8 = 3;

    pub fn new(row: u8, col: u8) -> Option<Self> {
        if row < Self::SIZE && col < Self::SIZE {
            Some(Self { row, col })
        } else {
            None
        }
    }

    pub fn row(self) -> u8 {
        self.row
    }

    pub fn col(self) -> u8 {
        self.col
    }

    /// Every position in row-major order.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..Self::SIZE).flat_map(|row| (0..Self::SIZE).map(move |col| Position { row, col }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cell {
    Empty,
    Taken(Seat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win(Seat),
    Draw,
}

/// Reasons a placement is refused by the board itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceError {
    NotYourTurn { turn_owner: Seat },
    Occupied { by: Seat },
}

const LINES: [[(u8, u8); 3]; 8] = [
    // Rows
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    // Columns
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    // Diagonals
    [(0, 0), (1, 1), (2, 2)],
    [(0, 2), (1, 1), (2, 0)],
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Board {
    cells: [[Cell; 3]; 3],
    turn_owner: Seat,
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; 3]; 3],
            turn_owner: Seat::One,
        }
    }

    pub fn cell(&self, pos: Position) -> Cell {
        self.cells[pos.row as usize][pos.col as usize]
    }

    pub fn turn_owner(&self) -> Seat {
        self.turn_owner
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().flatten().all(|c| *c == Cell::Empty)
    }

    /// Marks `pos` for `seat`. The turn does not advance here; the session
    /// decides that after looking at the outcome.
    pub fn place(&mut self, seat: Seat, pos: Position) -> Result<(), PlaceError> {
        if seat != self.turn_owner {
            return Err(PlaceError::NotYourTurn {
                turn_owner: self.turn_owner,
            });
        }
        if let Cell::Taken(by) = self.cell(pos) {
            return Err(PlaceError::Occupied { by });
        }
        self.cells[pos.row as usize][pos.col as usize] = Cell::Taken(seat);
        Ok(())
    }

    pub fn advance_turn(&mut self) {
        self.turn_owner = self.turn_owner.other();
    }

    pub fn winner(&self) -> Option<Seat> {
        for [a, b, c] in LINES {
            let first = self.cells[a.0 as usize][a.1 as usize];
            if let Cell::Taken(seat) = first {
                if first == self.cells[b.0 as usize][b.1 as usize]
                    && first == self.cells[c.0 as usize][c.1 as usize]
                {
                    return Some(seat);
                }
            }
        }
        None
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(|c| *c != Cell::Empty)
    }

    /// Win is checked before draw, so a move that fills the last cell and
    /// completes a line is a win.
    pub fn outcome(&self) -> Option<Outcome> {
        if let Some(seat) = self.winner() {
            Some(Outcome::Win(seat))
        } else if self.is_full() {
            Some(Outcome::Draw)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.cells = [[Cell::Empty; 3]; 3];
        self.turn_owner = Seat::One;
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let symbol = match cell {
                    Cell::Empty => '.',
                    Cell::Taken(Seat::One) => 'X',
                    Cell::Taken(Seat::Two) => 'O',
                };
                write!(f, "{symbol}")?;
                if c < 2 {
                    write!(f, "|")?;
                }
            }
            if r < 2 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
