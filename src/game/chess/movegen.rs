use super::{
    king_home, rook_home, CastleSide, Color, Move, Piece, PieceKind, Position, Square, Undo,
};

const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (-2, -1),
    (-2, 1),
    (-1, -2),
    (-1, 2),
    (1, -2),
    (1, 2),
    (2, -1),
    (2, 1),
];
const KING_STEPS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];
const ORTHOGONAL: [(i8, i8); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const DIAGONAL: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];

pub(super) fn pseudo_legal(pos: &Position) -> Vec<Move> {
    let mut moves = Vec::with_capacity(48);
    for from in Square::all() {
        let Some(piece) = pos.board[from.index()] else {
            continue;
        };
        if piece.color != pos.side {
            continue;
        }
        match piece.kind {
            PieceKind::Pawn => pawn_moves(pos, from, piece, &mut moves),
            PieceKind::Knight => step_moves(pos, from, piece, &KNIGHT_JUMPS, &mut moves),
            PieceKind::Bishop => slide_moves(pos, from, piece, &DIAGONAL, &mut moves),
            PieceKind::Rook => slide_moves(pos, from, piece, &ORTHOGONAL, &mut moves),
            PieceKind::Queen => {
                slide_moves(pos, from, piece, &ORTHOGONAL, &mut moves);
                slide_moves(pos, from, piece, &DIAGONAL, &mut moves);
            }
            PieceKind::King => {
                step_moves(pos, from, piece, &KING_STEPS, &mut moves);
                castle_moves(pos, from, piece, &mut moves);
            }
        }
    }
    moves
}

/// Keeps only moves after which the mover's king is not attacked.
pub(super) fn filter_king_safety(pos: &mut Position, moves: Vec<Move>) -> Vec<Move> {
    let mover = pos.side;
    moves
        .into_iter()
        .filter(|mv| {
            let undo = make(pos, mv);
            let safe = !king_attacked(pos, mover);
            unmake(pos, undo);
            safe
        })
        .collect()
}

fn quiet(piece: Piece, from: Square, to: Square) -> Move {
    Move {
        from,
        to,
        promotion: None,
        piece,
        captured: None,
        en_passant: false,
        castle: None,
    }
}

fn pawn_moves(pos: &Position, from: Square, piece: Piece, moves: &mut Vec<Move>) {
    let dir = piece.color.forward();
    let start_row = piece.color.home_row() + dir;
    let last_row = piece.color.other().home_row();

    let push = |mv: Move, moves: &mut Vec<Move>| {
        if mv.to.row() == last_row {
            for kind in PieceKind::PROMOTIONS {
                moves.push(Move {
                    promotion: Some(kind),
                    ..mv
                });
            }
        } else {
            moves.push(mv);
        }
    };

    if let Some(one) = from.offset(dir, 0) {
        if pos.board[one.index()].is_none() {
            push(quiet(piece, from, one), moves);
            if from.row() == start_row {
                if let Some(two) = from.offset(2 * dir, 0) {
                    if pos.board[two.index()].is_none() {
                        moves.push(quiet(piece, from, two));
                    }
                }
            }
        }
    }

    for d_col in [-1, 1] {
        let Some(to) = from.offset(dir, d_col) else {
            continue;
        };
        match pos.board[to.index()] {
            Some(target) if target.color != piece.color => push(
                Move {
                    captured: Some(target),
                    ..quiet(piece, from, to)
                },
                moves,
            ),
            None if pos.en_passant == Some(to) => moves.push(Move {
                captured: Some(Piece::new(piece.color.other(), PieceKind::Pawn)),
                en_passant: true,
                ..quiet(piece, from, to)
            }),
            _ => {}
        }
    }
}

fn step_moves(pos: &Position, from: Square, piece: Piece, steps: &[(i8, i8)], moves: &mut Vec<Move>) {
    for &(d_row, d_col) in steps {
        let Some(to) = from.offset(d_row, d_col) else {
            continue;
        };
        match pos.board[to.index()] {
            None => moves.push(quiet(piece, from, to)),
            Some(target) if target.color != piece.color => moves.push(Move {
                captured: Some(target),
                ..quiet(piece, from, to)
            }),
            Some(_) => {}
        }
    }
}

fn slide_moves(pos: &Position, from: Square, piece: Piece, rays: &[(i8, i8)], moves: &mut Vec<Move>) {
    for &(d_row, d_col) in rays {
        let mut cursor = from;
        while let Some(to) = cursor.offset(d_row, d_col) {
            match pos.board[to.index()] {
                None => moves.push(quiet(piece, from, to)),
                Some(target) => {
                    if target.color != piece.color {
                        moves.push(Move {
                            captured: Some(target),
                            ..quiet(piece, from, to)
                        });
                    }
                    break;
                }
            }
            cursor = to;
        }
    }
}

fn castle_moves(pos: &Position, from: Square, piece: Piece, moves: &mut Vec<Move>) {
    let color = piece.color;
    if from != king_home(color) || is_attacked(pos, from, color.other()) {
        return;
    }
    for side in [CastleSide::King, CastleSide::Queen] {
        if !pos.castling.has(color, side) {
            continue;
        }
        if pos.board[rook_home(color, side).index()] != Some(Piece::new(color, PieceKind::Rook)) {
            continue;
        }
        // Squares between king and rook must be empty; the king's two
        // squares must not be attacked.
        let (between, path): (&[i8], [i8; 2]) = match side {
            CastleSide::King => (&[5, 6], [5, 6]),
            CastleSide::Queen => (&[1, 2, 3], [3, 2]),
        };
        let row = color.home_row();
        let empty = between
            .iter()
            .filter_map(|&col| Square::from_row_col(row, col))
            .all(|sq| pos.board[sq.index()].is_none());
        if !empty {
            continue;
        }
        let safe = path
            .iter()
            .filter_map(|&col| Square::from_row_col(row, col))
            .all(|sq| !is_attacked(pos, sq, color.other()));
        if !safe {
            continue;
        }
        if let Some(to) = Square::from_row_col(row, path[1]) {
            moves.push(Move {
                castle: Some(side),
                ..quiet(piece, from, to)
            });
        }
    }
}

pub(super) fn king_attacked(pos: &Position, color: Color) -> bool {
    match pos.find_king(color) {
        Some(king) => is_attacked(pos, king, color.other()),
        None => false,
    }
}

/// Whether any piece of `by` attacks `target`.
pub(super) fn is_attacked(pos: &Position, target: Square, by: Color) -> bool {
    let holds = |sq: Option<Square>, kinds: &[PieceKind]| {
        sq.and_then(|sq| pos.board[sq.index()])
            .map_or(false, |p| p.color == by && kinds.contains(&p.kind))
    };

    // A pawn of `by` sits one row behind the target relative to its push.
    let pawn_row = -by.forward();
    if holds(target.offset(pawn_row, -1), &[PieceKind::Pawn])
        || holds(target.offset(pawn_row, 1), &[PieceKind::Pawn])
    {
        return true;
    }
    if KNIGHT_JUMPS
        .iter()
        .any(|&(r, c)| holds(target.offset(r, c), &[PieceKind::Knight]))
    {
        return true;
    }
    if KING_STEPS
        .iter()
        .any(|&(r, c)| holds(target.offset(r, c), &[PieceKind::King]))
    {
        return true;
    }

    let ray_hits = |rays: &[(i8, i8)], kinds: &[PieceKind]| {
        rays.iter().any(|&(d_row, d_col)| {
            let mut cursor = target;
            while let Some(next) = cursor.offset(d_row, d_col) {
                if let Some(p) = pos.board[next.index()] {
                    return p.color == by && kinds.contains(&p.kind);
                }
                cursor = next;
            }
            false
        })
    };
    ray_hits(&ORTHOGONAL, &[PieceKind::Rook, PieceKind::Queen])
        || ray_hits(&DIAGONAL, &[PieceKind::Bishop, PieceKind::Queen])
}

/// Applies `mv` without touching repetition bookkeeping.
pub(super) fn make(pos: &mut Position, mv: &Move) -> Undo {
    let color = mv.piece.color;
    let mut undo = Undo {
        from: mv.from,
        to: mv.to,
        moved: mv.piece,
        captured: None,
        rook: None,
        castling: pos.castling,
        en_passant: pos.en_passant,
        halfmove_clock: pos.halfmove_clock,
        fullmove_number: pos.fullmove_number,
        side: pos.side,
    };

    if mv.en_passant {
        if let Some(victim) = Square::from_row_col(mv.from.row(), mv.to.col()) {
            undo.captured = pos.board[victim.index()].take().map(|p| (victim, p));
        }
    } else if let Some(target) = pos.board[mv.to.index()].take() {
        undo.captured = Some((mv.to, target));
    }

    pos.board[mv.from.index()] = None;
    let placed = match mv.promotion {
        Some(kind) => Piece::new(color, kind),
        None => mv.piece,
    };
    pos.board[mv.to.index()] = Some(placed);

    if let Some(side) = mv.castle {
        let rook_from = rook_home(color, side);
        let rook_col = match side {
            CastleSide::King => 5,
            CastleSide::Queen => 3,
        };
        if let Some(rook_to) = Square::from_row_col(color.home_row(), rook_col) {
            let rook = pos.board[rook_from.index()].take();
            pos.board[rook_to.index()] = rook;
            undo.rook = Some((rook_from, rook_to));
        }
    }

    if mv.piece.kind == PieceKind::King {
        pos.castling.clear_color(color);
    }
    if mv.piece.kind == PieceKind::Rook {
        pos.castling.clear_corner(mv.from);
    }
    if let Some((square, captured)) = undo.captured {
        if captured.kind == PieceKind::Rook {
            pos.castling.clear_corner(square);
        }
    }

    pos.en_passant = None;
    if mv.piece.kind == PieceKind::Pawn && (mv.to.row() - mv.from.row()).abs() == 2 {
        pos.en_passant = mv.from.offset(color.forward(), 0);
    }

    if mv.piece.kind == PieceKind::Pawn || undo.captured.is_some() {
        pos.halfmove_clock = 0;
    } else {
        pos.halfmove_clock += 1;
    }
    if color == Color::Black {
        pos.fullmove_number += 1;
    }
    pos.side = pos.side.other();
    undo
}

pub(super) fn unmake(pos: &mut Position, undo: Undo) {
    pos.board[undo.to.index()] = None;
    pos.board[undo.from.index()] = Some(undo.moved);
    if let Some((square, piece)) = undo.captured {
        pos.board[square.index()] = Some(piece);
    }
    if let Some((rook_from, rook_to)) = undo.rook {
        let rook = pos.board[rook_to.index()].take();
        pos.board[rook_from.index()] = rook;
    }
    pos.castling = undo.castling;
    pos.en_passant = undo.en_passant;
    pos.halfmove_clock = undo.halfmove_clock;
    pos.fullmove_number = undo.fullmove_number;
    pos.side = undo.side;
}
