use std::collections::HashMap;

use super::{CastleSide, CastlingRights, Color, Piece, PieceKind, Position, Square};
use crate::error::PositionError;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

fn placement(pos: &Position) -> String {
    let mut out = String::with_capacity(72);
    for row in 0..8 {
        let mut empty = 0;
        for col in 0..8 {
            match pos.board[(row * 8 + col) as usize] {
                Some(piece) => {
                    if empty > 0 {
                        out.push_str(&empty.to_string());
                        empty = 0;
                    }
                    out.push(piece.symbol());
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            out.push_str(&empty.to_string());
        }
        if row < 7 {
            out.push('/');
        }
    }
    out
}

pub(super) fn signature(pos: &Position) -> String {
    let side = match pos.side {
        Color::White => 'w',
        Color::Black => 'b',
    };
    let ep = pos
        .en_passant
        .map_or_else(|| "-".to_string(), |sq| sq.to_string());
    format!("{} {} {} {}", placement(pos), side, pos.castling, ep)
}

pub(super) fn render(pos: &Position) -> String {
    format!(
        "{} {} {}",
        signature(pos),
        pos.halfmove_clock,
        pos.fullmove_number
    )
}

/// The target must be the empty square a pawn of the side not to move just
/// skipped, with that pawn in front of it and its start square empty.
fn en_passant_consistent(board: &[Option<Piece>; 64], side: Color, target: Square) -> bool {
    let mover = side.other();
    let (target_row, pawn_row, start_row) = match mover {
        Color::White => (5, 4, 6),
        Color::Black => (2, 3, 1),
    };
    let at = |row: i8| Square::from_row_col(row, target.col()).and_then(|sq| board[sq.index()]);
    target.row() == target_row
        && board[target.index()].is_none()
        && at(pawn_row) == Some(Piece::new(mover, PieceKind::Pawn))
        && at(start_row).is_none()
}

/// Exactly one king per colour. Permissive games may legitimately reach
/// positions without one, so parsing alone does not enforce this.
pub(super) fn check_kings(pos: &Position) -> Result<(), PositionError> {
    for (color, name) in [(Color::White, "white"), (Color::Black, "black")] {
        let found = pos
            .board
            .iter()
            .filter(|cell| **cell == Some(Piece::new(color, PieceKind::King)))
            .count();
        if found != 1 {
            return Err(PositionError::KingCount { color: name, found });
        }
    }
    Ok(())
}

/// Parses a FEN string. The two counters are optional and default to `0 1`.
pub(super) fn parse(fen: &str) -> Result<Position, PositionError> {
    let mut fields = fen.split_whitespace();
    let placement = fields.next().ok_or(PositionError::MissingField("placement"))?;
    let side = fields.next().ok_or(PositionError::MissingField("side"))?;
    let castling = fields.next().ok_or(PositionError::MissingField("castling"))?;
    let en_passant = fields.next().ok_or(PositionError::MissingField("en passant"))?;

    let rows: Vec<&str> = placement.split('/').collect();
    if rows.len() != 8 {
        return Err(PositionError::RowCount {
            expected: 8,
            found: rows.len(),
        });
    }
    let mut board = [None; 64];
    for (row, text) in rows.iter().enumerate() {
        let mut col = 0usize;
        for ch in text.chars() {
            if let Some(run) = ch.to_digit(10) {
                col += run as usize;
            } else {
                let piece = Piece::from_symbol(ch).ok_or(PositionError::UnknownPiece(ch))?;
                if col < 8 {
                    board[row * 8 + col] = Some(piece);
                }
                col += 1;
            }
            if col > 8 {
                break;
            }
        }
        if col != 8 {
            return Err(PositionError::RowWidth { row, width: col });
        }
    }

    let side = match side {
        "w" => Color::White,
        "b" => Color::Black,
        other => {
            return Err(PositionError::InvalidField {
                field: "side",
                value: other.to_string(),
            })
        }
    };

    let mut rights = CastlingRights::default();
    if castling != "-" {
        for ch in castling.chars() {
            let (color, wing) = match ch {
                'K' => (Color::White, CastleSide::King),
                'Q' => (Color::White, CastleSide::Queen),
                'k' => (Color::Black, CastleSide::King),
                'q' => (Color::Black, CastleSide::Queen),
                _ => {
                    return Err(PositionError::InvalidField {
                        field: "castling",
                        value: castling.to_string(),
                    })
                }
            };
            rights.insert(color, wing);
        }
    }

    let en_passant = match en_passant {
        "-" => None,
        text => {
            let target = text.parse::<Square>()?;
            if !en_passant_consistent(&board, side, target) {
                return Err(PositionError::InvalidField {
                    field: "en passant",
                    value: text.to_string(),
                });
            }
            Some(target)
        }
    };

    let counter = |field: &'static str, text: Option<&str>, default: u32| match text {
        None => Ok(default),
        Some(text) => text.parse::<u32>().map_err(|_| PositionError::InvalidField {
            field,
            value: text.to_string(),
        }),
    };
    let halfmove_clock = counter("halfmove", fields.next(), 0)?;
    let fullmove_number = counter("fullmove", fields.next(), 1)?;

    Ok(Position {
        board,
        side,
        castling: rights,
        en_passant,
        halfmove_clock,
        fullmove_number,
        repetitions: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_kiwipete() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        assert_eq!(Position::from_fen(fen).unwrap().to_fen(), fen);
    }

    #[test]
    fn counters_default_when_absent() {
        let pos = Position::from_fen("8/8/8/8/8/8/8/4K2k b - -").unwrap();
        assert_eq!(pos.halfmove_clock(), 0);
        assert_eq!(pos.fullmove_number(), 1);
        assert_eq!(pos.to_fen(), "8/8/8/8/8/8/8/4K2k b - - 0 1");
    }

    #[test]
    fn en_passant_needs_the_pawn_that_just_moved() {
        assert!(Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").is_ok());
        for fen in [
            // no pawn on e4
            "rnbqkbnr/pppppppp/8/8/8/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            // wrong rank for black to move
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e6 0 1",
            // pawn never left e2
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPPPPPP/RNBQKBN1 b KQkq e3 0 1",
            // white to move with a white-side target
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e3 0 1",
        ] {
            assert_eq!(
                Position::from_fen(fen).unwrap_err(),
                PositionError::InvalidField {
                    field: "en passant",
                    value: fen.split(' ').nth(3).unwrap().to_string(),
                },
                "{}",
                fen
            );
        }
    }

    #[test]
    fn king_count_is_checked_separately() {
        let pos = Position::from_fen("8/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(
            check_kings(&pos),
            Err(PositionError::KingCount {
                color: "black",
                found: 0
            })
        );
        let pos = Position::from_fen("k7/8/8/8/8/8/8/K3K3 w - - 0 1").unwrap();
        assert_eq!(
            check_kings(&pos),
            Err(PositionError::KingCount {
                color: "white",
                found: 2
            })
        );
        assert_eq!(check_kings(&Position::new()), Ok(()));
    }

    #[test]
    fn reports_short_rows() {
        let err = Position::from_fen("7/8/8/8/8/8/8/8 w - - 0 1").unwrap_err();
        assert_eq!(err, PositionError::RowWidth { row: 0, width: 7 });
    }
}
