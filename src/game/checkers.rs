//! English draughts without the mandatory-capture rule: single steps, single
//! jumps and forced crowning on the far rank.

use std::fmt;
use std::str::FromStr;

use crate::error::PositionError;
use crate::game::{GameKind, MoveSummary, Rules, Seat, Status};

const SIZE: i8 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// Seat one, starts on ranks 1-3 and moves up the board.
    Red,
    Black,
}

impl Side {
    pub fn seat(self) -> Seat {
        match self {
            Side::Red => Seat::One,
            Side::Black => Seat::Two,
        }
    }

    fn from_seat(seat: Seat) -> Side {
        match seat {
            Seat::One => Side::Red,
            Seat::Two => Side::Black,
        }
    }

    fn forward(self) -> i8 {
        match self {
            Side::Red => 1,
            Side::Black => -1,
        }
    }

    fn crown_rank(self) -> i8 {
        match self {
            Side::Red => SIZE - 1,
            Side::Black => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Man {
    pub side: Side,
    pub king: bool,
}

impl Man {
    fn symbol(self) -> char {
        match (self.side, self.king) {
            (Side::Red, false) => 'r',
            (Side::Red, true) => 'R',
            (Side::Black, false) => 'b',
            (Side::Black, true) => 'B',
        }
    }

    fn from_symbol(symbol: char) -> Option<Man> {
        let side = match symbol.to_ascii_lowercase() {
            'r' => Side::Red,
            'b' => Side::Black,
            _ => return None,
        };
        Some(Man {
            side,
            king: symbol.is_ascii_uppercase(),
        })
    }
}

/// Board cell; rank 0 is rank 1 in algebraic notation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    rank: i8,
    file: i8,
}

impl Cell {
    pub fn new(rank: i8, file: i8) -> Option<Cell> {
        if (0..SIZE).contains(&rank) && (0..SIZE).contains(&file) {
            Some(Cell { rank, file })
        } else {
            None
        }
    }

    fn offset(self, d_rank: i8, d_file: i8) -> Option<Cell> {
        Cell::new(self.rank + d_rank, self.file + d_file)
    }

    /// Only the dark squares (a1, c1, ...) are ever occupied.
    pub fn is_playable(self) -> bool {
        (self.rank + self.file) % 2 == 0
    }

    fn index(self) -> usize {
        (self.rank * SIZE + self.file) as usize
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file as u8) as char, self.rank + 1)
    }
}

impl FromStr for Cell {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        let parsed = match bytes {
            [file @ b'a'..=b'h', rank @ b'1'..=b'8'] => Cell::new((rank - b'1') as i8, (file - b'a') as i8),
            _ => None,
        };
        parsed.ok_or_else(|| PositionError::InvalidField {
            field: "cell",
            value: s.to_string(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    pub from: Cell,
    pub to: Cell,
    pub piece: Man,
    pub captured: Option<(Cell, Man)>,
    pub crowns: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Undo {
    step: Step,
    side: Side,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Man>; 64],
    side: Side,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        let mut cells = [None; 64];
        for rank in 0..SIZE {
            for file in 0..SIZE {
                let Some(cell) = Cell::new(rank, file) else {
                    continue;
                };
                if !cell.is_playable() {
                    continue;
                }
                let side = match rank {
                    0..=2 => Side::Red,
                    5..=7 => Side::Black,
                    _ => continue,
                };
                cells[cell.index()] = Some(Man { side, king: false });
            }
        }
        Self {
            cells,
            side: Side::Red,
        }
    }

    pub fn at(&self, cell: Cell) -> Option<Man> {
        self.cells[cell.index()]
    }

    pub fn count(&self, side: Side) -> usize {
        self.cells.iter().flatten().filter(|man| man.side == side).count()
    }

    fn cells(&self) -> impl Iterator<Item = (Cell, Man)> + '_ {
        (0..SIZE)
            .flat_map(|rank| (0..SIZE).filter_map(move |file| Cell::new(rank, file)))
            .filter_map(|cell| self.at(cell).map(|man| (cell, man)))
    }

    fn steps_for(&self, from: Cell, man: Man, out: &mut Vec<Step>) {
        let forward = [man.side.forward()];
        let ranks: &[i8] = if man.king { &[1, -1] } else { &forward };
        for &d_rank in ranks {
            for d_file in [-1, 1] {
                let Some(near) = from.offset(d_rank, d_file) else {
                    continue;
                };
                match self.at(near) {
                    None => out.push(self.step(from, near, man, None)),
                    Some(victim) if victim.side != man.side => {
                        if let Some(land) = near.offset(d_rank, d_file) {
                            if self.at(land).is_none() {
                                out.push(self.step(from, land, man, Some((near, victim))));
                            }
                        }
                    }
                    Some(_) => {}
                }
            }
        }
    }

    fn step(&self, from: Cell, to: Cell, piece: Man, captured: Option<(Cell, Man)>) -> Step {
        Step {
            from,
            to,
            piece,
            captured,
            crowns: !piece.king && to.rank == piece.side.crown_rank(),
        }
    }
}

impl Rules for Board {
    type Move = Step;
    type Undo = Undo;

    const KIND: GameKind = GameKind::Checkers;

    fn new_game() -> Self {
        Board::new()
    }

    fn turn(&self) -> Seat {
        self.side.seat()
    }

    fn legal_moves(&mut self) -> Vec<Step> {
        if self.count(Side::Red) == 0 || self.count(Side::Black) == 0 {
            return Vec::new();
        }
        let mut moves = Vec::new();
        let pieces: Vec<(Cell, Man)> = self.cells().filter(|(_, man)| man.side == self.side).collect();
        for (cell, man) in pieces {
            self.steps_for(cell, man, &mut moves);
        }
        moves
    }

    fn apply(&mut self, mv: &Step) -> Undo {
        let undo = Undo {
            step: *mv,
            side: self.side,
        };
        if let Some((cell, _)) = mv.captured {
            self.cells[cell.index()] = None;
        }
        self.cells[mv.from.index()] = None;
        self.cells[mv.to.index()] = Some(Man {
            side: mv.piece.side,
            king: mv.piece.king || mv.crowns,
        });
        self.side = match self.side {
            Side::Red => Side::Black,
            Side::Black => Side::Red,
        };
        undo
    }

    fn undo(&mut self, undo: Undo) {
        let step = undo.step;
        self.cells[step.to.index()] = None;
        self.cells[step.from.index()] = Some(step.piece);
        if let Some((cell, man)) = step.captured {
            self.cells[cell.index()] = Some(man);
        }
        self.side = undo.side;
    }

    fn is_check(&self) -> bool {
        false
    }

    fn status(&mut self) -> Status {
        for side in [self.side, Side::from_seat(self.side.seat().other())] {
            if self.count(side) == 0 {
                return Status::Eliminated {
                    winner: side.seat().other(),
                };
            }
        }
        if self.legal_moves().is_empty() {
            return Status::NoLegalMoves {
                stuck: self.side.seat(),
            };
        }
        Status::Ongoing
    }

    fn summarize(mv: &Step) -> MoveSummary {
        MoveSummary {
            from: Some(mv.from.to_string()),
            to: mv.to.to_string(),
            promotion: None,
            capture: mv.captured.is_some(),
        }
    }

    /// Ranks 8 down to 1, then `r` or `b` for the side to move.
    fn encode(&self) -> String {
        let mut ranks = Vec::with_capacity(SIZE as usize);
        for rank in (0..SIZE).rev() {
            let mut out = String::new();
            let mut empty = 0;
            for file in 0..SIZE {
                match Cell::new(rank, file).and_then(|cell| self.at(cell)) {
                    Some(man) => {
                        if empty > 0 {
                            out.push_str(&empty.to_string());
                            empty = 0;
                        }
                        out.push(man.symbol());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push_str(&empty.to_string());
            }
            ranks.push(out);
        }
        let side = match self.side {
            Side::Red => 'r',
            Side::Black => 'b',
        };
        format!("{} {}", ranks.join("/"), side)
    }

    fn decode(text: &str) -> Result<Self, PositionError> {
        let mut fields = text.split_whitespace();
        let placement = fields.next().ok_or(PositionError::MissingField("placement"))?;
        let side = fields.next().ok_or(PositionError::MissingField("side"))?;

        let rows: Vec<&str> = placement.split('/').collect();
        if rows.len() != SIZE as usize {
            return Err(PositionError::RowCount {
                expected: SIZE as usize,
                found: rows.len(),
            });
        }
        let mut cells = [None; 64];
        for (row, line) in rows.iter().enumerate() {
            let rank = SIZE - 1 - row as i8;
            let mut file = 0usize;
            for ch in line.chars() {
                if let Some(run) = ch.to_digit(10) {
                    file += run as usize;
                    continue;
                }
                let man = Man::from_symbol(ch).ok_or(PositionError::UnknownPiece(ch))?;
                if let Some(cell) = Cell::new(rank, file as i8) {
                    if !cell.is_playable() {
                        return Err(PositionError::InvalidField {
                            field: "placement",
                            value: cell.to_string(),
                        });
                    }
                    cells[cell.index()] = Some(man);
                }
                file += 1;
            }
            if file != SIZE as usize {
                return Err(PositionError::RowWidth { row, width: file });
            }
        }

        let side = match side {
            "r" => Side::Red,
            "b" => Side::Black,
            other => {
                return Err(PositionError::InvalidField {
                    field: "side",
                    value: other.to_string(),
                })
            }
        };
        Ok(Board { cells, side })
    }
}
