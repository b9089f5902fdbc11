//! Connect four: gravity drops into a 6x7 grid, four in a row wins.

use crate::error::PositionError;
use crate::game::{GameKind, MoveSummary, Rules, Seat, Status};

pub const ROWS: usize = 6;
pub const COLS: usize = 7;

const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Drop {
    pub column: usize,
    /// Landing row, 0 is the top.
    pub row: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Undo {
    column: usize,
    row: usize,
    side: Seat,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<Seat>; COLS]; ROWS],
    side: Seat,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[None; COLS]; ROWS],
            side: Seat::One,
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<Seat> {
        self.cells.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    /// Lowest empty row in `column`, if the column is not full.
    pub fn landing_row(&self, column: usize) -> Option<usize> {
        if column >= COLS {
            return None;
        }
        (0..ROWS).rev().find(|&row| self.cells[row][column].is_none())
    }

    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(Option::is_some)
    }

    /// Owner of any complete line of four.
    pub fn winner(&self) -> Option<Seat> {
        for row in 0..ROWS {
            for col in 0..COLS {
                let Some(seat) = self.cells[row][col] else {
                    continue;
                };
                for (d_row, d_col) in DIRECTIONS {
                    let line = (1..4).all(|step| {
                        let r = row as isize + d_row * step;
                        let c = col as isize + d_col * step;
                        r >= 0
                            && c >= 0
                            && (r as usize) < ROWS
                            && (c as usize) < COLS
                            && self.cells[r as usize][c as usize] == Some(seat)
                    });
                    if line {
                        return Some(seat);
                    }
                }
            }
        }
        None
    }
}

impl Rules for Board {
    type Move = Drop;
    type Undo = Undo;

    const KIND: GameKind = GameKind::ConnectFour;

    fn new_game() -> Self {
        Board::new()
    }

    fn turn(&self) -> Seat {
        self.side
    }

    fn legal_moves(&mut self) -> Vec<Drop> {
        if self.winner().is_some() {
            return Vec::new();
        }
        (0..COLS)
            .filter_map(|column| self.landing_row(column).map(|row| Drop { column, row }))
            .collect()
    }

    fn apply(&mut self, mv: &Drop) -> Undo {
        let undo = Undo {
            column: mv.column,
            row: mv.row,
            side: self.side,
        };
        self.cells[mv.row][mv.column] = Some(self.side);
        self.side = self.side.other();
        undo
    }

    fn undo(&mut self, undo: Undo) {
        self.cells[undo.row][undo.column] = None;
        self.side = undo.side;
    }

    fn is_check(&self) -> bool {
        false
    }

    fn status(&mut self) -> Status {
        if let Some(winner) = self.winner() {
            Status::FourInARow { winner }
        } else if self.is_full() {
            Status::BoardFull
        } else {
            Status::Ongoing
        }
    }

    fn summarize(mv: &Drop) -> MoveSummary {
        MoveSummary {
            from: None,
            to: mv.column.to_string(),
            promotion: None,
            capture: false,
        }
    }

    fn encode(&self) -> String {
        let rows: Vec<String> = self
            .cells
            .iter()
            .map(|row| {
                let mut out = String::new();
                let mut empty = 0;
                for cell in row {
                    match cell {
                        Some(seat) => {
                            if empty > 0 {
                                out.push_str(&empty.to_string());
                                empty = 0;
                            }
                            out.push(if *seat == Seat::One { 'x' } else { 'o' });
                        }
                        None => empty += 1,
                    }
                }
                if empty > 0 {
                    out.push_str(&empty.to_string());
                }
                out
            })
            .collect();
        format!("{} {}", rows.join("/"), self.side)
    }

    fn decode(text: &str) -> Result<Self, PositionError> {
        let mut fields = text.split_whitespace();
        let grid = fields.next().ok_or(PositionError::MissingField("grid"))?;
        let side = fields.next().ok_or(PositionError::MissingField("side"))?;

        let rows: Vec<&str> = grid.split('/').collect();
        if rows.len() != ROWS {
            return Err(PositionError::RowCount {
                expected: ROWS,
                found: rows.len(),
            });
        }
        let mut cells = [[None; COLS]; ROWS];
        for (row, line) in rows.iter().enumerate() {
            let mut col = 0;
            for ch in line.chars() {
                match ch {
                    'x' | 'o' => {
                        if col < COLS {
                            cells[row][col] = Some(if ch == 'x' { Seat::One } else { Seat::Two });
                        }
                        col += 1;
                    }
                    _ => match ch.to_digit(10) {
                        Some(run) => col += run as usize,
                        None => return Err(PositionError::UnknownPiece(ch)),
                    },
                }
            }
            if col != COLS {
                return Err(PositionError::RowWidth { row, width: col });
            }
        }

        // Pieces never float above an empty cell.
        for col in 0..COLS {
            for row in 1..ROWS {
                if cells[row - 1][col].is_some() && cells[row][col].is_none() {
                    return Err(PositionError::InvalidField {
                        field: "grid",
                        value: grid.to_string(),
                    });
                }
            }
        }

        let side = match side {
            "1" => Seat::One,
            "2" => Seat::Two,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn drop_in(board: &mut Board, column: usize) {
        let mv = board
            .legal_moves()
            .into_iter()
            .find(|m| m.column == column)
            .expect("column open");
        board.apply(&mv);
    }

    #[test]
    fn pieces_stack_from_the_bottom() {
        let mut board = Board::new();
        drop_in(&mut board, 3);
        drop_in(&mut board, 3);
        assert_eq!(board.cell(5, 3), Some(Seat::One));
        assert_eq!(board.cell(4, 3), Some(Seat::Two));
        assert_eq!(board.turn(), Seat::One);
    }

    #[test]
    fn vertical_four_wins() {
        let mut board = Board::new();
        for column in [0, 1, 0, 1, 0, 1, 0] {
            drop_in(&mut board, column);
        }
        assert_eq!(board.status(), Status::FourInARow { winner: Seat::One });
        assert!(board.legal_moves().is_empty());
    }

    #[test]
    fn diagonal_four_wins() {
        let mut board = Board::decode("7/7/7/3x3/2xo3/1xoo3 1").unwrap();
        assert_eq!(board.status(), Status::Ongoing);
        board = Board::decode("7/7/7/2xx3/1xoo3/xoox2o 1").unwrap();
        assert_eq!(board.landing_row(3), Some(2));
        drop_in(&mut board, 3);
        assert_eq!(board.status(), Status::FourInARow { winner: Seat::One });
    }

    #[test]
    fn full_column_is_not_offered() {
        let mut board = Board::decode("x6/o6/x6/o6/x6/o6 1").unwrap();
        assert!(board.legal_moves().iter().all(|m| m.column != 0));
        assert_eq!(board.legal_moves().len(), 6);
    }

    #[test]
    fn full_board_without_line() {
        let mut board = Board::decode("xxooxxo/ooxxoox/xxooxxo/ooxxoox/xxooxxo/ooxxoox 1").unwrap();
        assert_eq!(board.winner(), None);
        assert_eq!(board.status(), Status::BoardFull);
    }

    #[test]
    fn encode_matches_decode() {
        let mut board = Board::new();
        for column in [3, 3, 4, 2] {
            drop_in(&mut board, column);
        }
        let text = board.encode();
        assert_eq!(text, "7/7/7/7/3o3/2oxx2 1");
        assert_eq!(Board::decode(&text).unwrap(), board);
    }

    #[test]
    fn floating_pieces_are_rejected() {
        assert!(Board::decode("7/7/7/7/x6/7 2").is_err());
        assert!(Board::decode("7/7/7/7/7/7 3").is_err());
    }
}
