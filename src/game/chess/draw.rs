use super::{PieceKind, Position, Square};
use crate::game::DrawReason;

/// Draw checks in precedence order: fifty-move, repetition, material.
pub(super) fn detect(pos: &Position) -> Option<DrawReason> {
    if pos.halfmove_clock >= 100 {
        return Some(DrawReason::FiftyMove);
    }
    if pos.repetition_count() >= 3 {
        return Some(DrawReason::Repetition);
    }
    if has_insufficient_material(pos) {
        return Some(DrawReason::InsufficientMaterial);
    }
    None
}

/// Check if the board has insufficient material for checkmate
pub(super) fn has_insufficient_material(pos: &Position) -> bool {
    let mut knights = 0;
    let mut bishops = 0;

    // Bishop square colors across both sides
    let mut bishop_on_light = false;
    let mut bishop_on_dark = false;

    for square in Square::all() {
        let Some(piece) = pos.piece_at(square) else {
            continue;
        };
        match piece.kind {
            PieceKind::Pawn | PieceKind::Rook | PieceKind::Queen => return false,
            PieceKind::Knight => knights += 1,
            PieceKind::Bishop => {
                bishops += 1;
                if square.is_light() {
                    bishop_on_light = true;
                } else {
                    bishop_on_dark = true;
                }
            }
            PieceKind::King => {}
        }
    }

    if knights + bishops <= 1 {
        return true;
    }
    if knights == 0 {
        // Bishops that can never meet on a color cannot mate.
        return !(bishop_on_light && bishop_on_dark);
    }
    // Knights alone cannot force mate; knight plus bishop can.
    bishops == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insufficient(fen: &str) -> bool {
        has_insufficient_material(&Position::from_fen(fen).unwrap())
    }

    #[test]
    fn bare_kings_and_single_minors() {
        assert!(insufficient("4k3/8/8/8/8/8/8/4K3 w - - 0 1"));
        assert!(insufficient("4k3/8/8/8/8/8/8/2B1K3 w - - 0 1"));
        assert!(insufficient("4k3/8/8/8/8/8/8/1N2K3 w - - 0 1"));
    }

    #[test]
    fn bishops_by_square_color() {
        // c1 and f4 are both dark.
        assert!(insufficient("4k3/8/8/8/5B2/8/8/2B1K3 w - - 0 1"));
        // c1 dark, c8 light.
        assert!(!insufficient("2b1k3/8/8/8/8/8/8/2B1K3 w - - 0 1"));
    }

    #[test]
    fn knights_only_and_mixed_minors() {
        assert!(insufficient("4k3/8/8/8/8/8/8/1N2K1N1 w - - 0 1"));
        assert!(!insufficient("4k3/8/8/8/8/8/8/1N2KB2 w - - 0 1"));
    }

    #[test]
    fn any_pawn_rook_or_queen_is_sufficient() {
        assert!(!insufficient("4k3/8/8/8/8/8/P7/4K3 w - - 0 1"));
        assert!(!insufficient("4k3/8/8/8/8/8/8/R3K3 w - - 0 1"));
        assert!(!insufficient("3qk3/8/8/8/8/8/8/4K3 w - - 0 1"));
    }
}
