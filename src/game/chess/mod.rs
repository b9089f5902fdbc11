//! Orthodox chess rules: pseudo-legal generation, king-safety filtering via
//! make/unmake, castling, en passant, promotion and the three draw rules.

mod draw;
mod fen;
mod movegen;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PositionError;
use crate::game::{DrawReason, GameKind, MoveSummary, Rules, Seat, Status};

pub use fen::START_FEN;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn other(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub fn seat(self) -> Seat {
        match self {
            Color::White => Seat::One,
            Color::Black => Seat::Two,
        }
    }

    /// Row delta of a pawn push. Row 0 is rank 8.
    fn forward(self) -> i8 {
        match self {
            Color::White => -1,
            Color::Black => 1,
        }
    }

    fn home_row(self) -> i8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    pub const PROMOTIONS: [PieceKind; 4] = [
        PieceKind::Queen,
        PieceKind::Rook,
        PieceKind::Bishop,
        PieceKind::Knight,
    ];

    pub fn symbol(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<PieceKind> {
        match symbol.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub fn new(color: Color, kind: PieceKind) -> Self {
        Self { color, kind }
    }

    /// Uppercase for white, lowercase for black.
    pub fn symbol(self) -> char {
        match self.color {
            Color::White => self.kind.symbol().to_ascii_uppercase(),
            Color::Black => self.kind.symbol(),
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Piece> {
        let kind = PieceKind::from_symbol(symbol)?;
        let color = if symbol.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Piece { color, kind })
    }
}

/// Board cell, indexed row-major from a8 (0) to h1 (63).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    pub fn from_row_col(row: i8, col: i8) -> Option<Square> {
        if (0..8).contains(&row) && (0..8).contains(&col) {
            Some(Square((row * 8 + col) as u8))
        } else {
            None
        }
    }

    pub fn row(self) -> i8 {
        (self.0 / 8) as i8
    }

    pub fn col(self) -> i8 {
        (self.0 % 8) as i8
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn offset(self, d_row: i8, d_col: i8) -> Option<Square> {
        Square::from_row_col(self.row() + d_row, self.col() + d_col)
    }

    fn is_light(self) -> bool {
        (self.row() + self.col()) % 2 == 0
    }

    fn all() -> impl Iterator<Item = Square> {
        (0..64u8).map(Square)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = (b'a' + self.col() as u8) as char;
        write!(f, "{}{}", file, 8 - self.row())
    }
}

impl FromStr for Square {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PositionError::InvalidField {
            field: "square",
            value: s.to_string(),
        };
        let bytes = s.trim().as_bytes();
        if bytes.len() != 2 {
            return Err(invalid());
        }
        let file = bytes[0].to_ascii_lowercase();
        let rank = bytes[1];
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return Err(invalid());
        }
        Square::from_row_col(8 - (rank - b'0') as i8, (file - b'a') as i8).ok_or_else(invalid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastleSide {
    King,
    Queen,
}

/// Castling rights bitset in `KQkq` order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    fn bit(color: Color, side: CastleSide) -> u8 {
        match (color, side) {
            (Color::White, CastleSide::King) => 1,
            (Color::White, CastleSide::Queen) => 2,
            (Color::Black, CastleSide::King) => 4,
            (Color::Black, CastleSide::Queen) => 8,
        }
    }

    pub fn has(self, color: Color, side: CastleSide) -> bool {
        self.0 & Self::bit(color, side) != 0
    }

    pub fn insert(&mut self, color: Color, side: CastleSide) {
        self.0 |= Self::bit(color, side);
    }

    pub fn remove(&mut self, color: Color, side: CastleSide) {
        self.0 &= !Self::bit(color, side);
    }

    fn clear_color(&mut self, color: Color) {
        self.remove(color, CastleSide::King);
        self.remove(color, CastleSide::Queen);
    }

    /// A rook leaving or being captured on its corner loses that right.
    fn clear_corner(&mut self, square: Square) {
        for color in [Color::White, Color::Black] {
            for side in [CastleSide::King, CastleSide::Queen] {
                if rook_home(color, side) == square {
                    self.remove(color, side);
                }
            }
        }
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "-");
        }
        for (color, side, symbol) in [
            (Color::White, CastleSide::King, 'K'),
            (Color::White, CastleSide::Queen, 'Q'),
            (Color::Black, CastleSide::King, 'k'),
            (Color::Black, CastleSide::Queen, 'q'),
        ] {
            if self.has(color, side) {
                write!(f, "{}", symbol)?;
            }
        }
        Ok(())
    }
}

fn rook_home(color: Color, side: CastleSide) -> Square {
    let col = match side {
        CastleSide::King => 7,
        CastleSide::Queen => 0,
    };
    Square((color.home_row() * 8 + col) as u8)
}

fn king_home(color: Color) -> Square {
    Square((color.home_row() * 8 + 4) as u8)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub en_passant: bool,
    pub castle: Option<CastleSide>,
}

impl Move {
    pub fn is_capture(&self) -> bool {
        self.captured.is_some()
    }
}

/// Everything needed to reverse one applied move.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Undo {
    from: Square,
    to: Square,
    moved: Piece,
    captured: Option<(Square, Piece)>,
    rook: Option<(Square, Square)>,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    side: Color,
}

#[derive(Clone, Debug)]
pub struct Position {
    board: [Option<Piece>; 64],
    side: Color,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    repetitions: HashMap<String, u32>,
}

/// Two positions are equal when board, side, rights and counters agree; the
/// repetition history is bookkeeping, not position.
impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.board == other.board
            && self.side == other.side
            && self.castling == other.castling
            && self.en_passant == other.en_passant
            && self.halfmove_clock == other.halfmove_clock
            && self.fullmove_number == other.fullmove_number
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new()
    }
}

impl Position {
    pub fn new() -> Self {
        let back = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        let mut board = [None; 64];
        for (col, kind) in back.into_iter().enumerate() {
            board[col] = Some(Piece::new(Color::Black, kind));
            board[8 + col] = Some(Piece::new(Color::Black, PieceKind::Pawn));
            board[48 + col] = Some(Piece::new(Color::White, PieceKind::Pawn));
            board[56 + col] = Some(Piece::new(Color::White, kind));
        }
        let mut position = Position {
            board,
            side: Color::White,
            castling: CastlingRights::ALL,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            repetitions: HashMap::new(),
        };
        position.count_repetition();
        position
    }

    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let mut position = fen::parse(fen)?;
        position.count_repetition();
        Ok(position)
    }

    pub fn to_fen(&self) -> String {
        fen::render(self)
    }

    /// Rejects boards without exactly one king per colour.
    pub fn check_kings(&self) -> Result<(), PositionError> {
        fen::check_kings(self)
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.board[square.index()]
    }

    pub fn side_to_move(&self) -> Color {
        self.side
    }

    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// How many times the current normalized position has occurred.
    pub fn repetition_count(&self) -> u32 {
        self.repetitions.get(&self.signature()).copied().unwrap_or(0)
    }

    pub fn repetitions(&self) -> &HashMap<String, u32> {
        &self.repetitions
    }

    pub fn in_check(&self, color: Color) -> bool {
        movegen::king_attacked(self, color)
    }

    pub fn is_checkmate(&mut self) -> bool {
        self.in_check(self.side) && self.legal_moves().is_empty()
    }

    pub fn is_stalemate(&mut self) -> bool {
        !self.in_check(self.side) && self.legal_moves().is_empty()
    }

    pub fn find_king(&self, color: Color) -> Option<Square> {
        Square::all().find(|&sq| self.board[sq.index()] == Some(Piece::new(color, PieceKind::King)))
    }

    /// Placement, side, rights and en-passant target: the first four FEN fields.
    fn signature(&self) -> String {
        fen::signature(self)
    }

    fn count_repetition(&mut self) {
        *self.repetitions.entry(self.signature()).or_insert(0) += 1;
    }

    fn uncount_repetition(&mut self) {
        let key = self.signature();
        if let Some(count) = self.repetitions.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.repetitions.remove(&key);
            }
        }
    }
}

impl Rules for Position {
    type Move = Move;
    type Undo = Undo;

    const KIND: GameKind = GameKind::Chess;

    fn new_game() -> Self {
        Position::new()
    }

    fn turn(&self) -> Seat {
        self.side.seat()
    }

    fn legal_moves(&mut self) -> Vec<Move> {
        let pseudo = movegen::pseudo_legal(self);
        movegen::filter_king_safety(self, pseudo)
    }

    fn pseudo_legal_moves(&mut self) -> Vec<Move> {
        movegen::pseudo_legal(self)
    }

    fn apply(&mut self, mv: &Move) -> Undo {
        let undo = movegen::make(self, mv);
        self.count_repetition();
        undo
    }

    fn undo(&mut self, undo: Undo) {
        self.uncount_repetition();
        movegen::unmake(self, undo);
    }

    fn is_check(&self) -> bool {
        self.in_check(self.side)
    }

    fn detect_draw(&self) -> Option<DrawReason> {
        draw::detect(self)
    }

    fn missing_king(&self) -> Option<Seat> {
        [Color::White, Color::Black]
            .into_iter()
            .find(|&color| self.find_king(color).is_none())
            .map(Color::seat)
    }

    fn status(&mut self) -> Status {
        let in_check = self.is_check();
        if self.legal_moves().is_empty() {
            return if in_check {
                Status::Checkmate {
                    winner: self.side.other().seat(),
                }
            } else {
                Status::Stalemate
            };
        }
        if let Some(reason) = self.detect_draw() {
            return Status::Draw { reason };
        }
        if in_check {
            Status::Check
        } else {
            Status::Ongoing
        }
    }

    fn summarize(mv: &Move) -> MoveSummary {
        MoveSummary {
            from: Some(mv.from.to_string()),
            to: mv.to.to_string(),
            promotion: mv.promotion.map(|kind| kind.symbol().to_string()),
            capture: mv.is_capture(),
        }
    }

    fn default_promotion() -> Option<&'static str> {
        Some("q")
    }

    fn encode(&self) -> String {
        self.to_fen()
    }

    fn decode(text: &str) -> Result<Self, PositionError> {
        Position::from_fen(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::perft;

    fn sq(text: &str) -> Square {
        text.parse().unwrap()
    }

    fn find(position: &mut Position, from: &str, to: &str) -> Move {
        position
            .legal_moves()
            .into_iter()
            .find(|m| m.from == sq(from) && m.to == sq(to) && m.promotion.map_or(true, |k| k == PieceKind::Queen))
            .unwrap_or_else(|| panic!("{}{} is not legal", from, to))
    }

    fn play(position: &mut Position, moves: &[(&str, &str)]) {
        for (from, to) in moves {
            let mv = find(position, from, to);
            position.apply(&mv);
        }
    }

    #[test]
    fn start_position_has_twenty_moves() {
        let mut position = Position::new();
        assert_eq!(position.legal_moves().len(), 20);
        assert_eq!(position.to_fen(), START_FEN);
    }

    #[test]
    fn perft_from_start() {
        let mut position = Position::new();
        assert_eq!(perft(&mut position, 1), 20);
        assert_eq!(perft(&mut position, 2), 400);
        assert_eq!(perft(&mut position, 3), 8902);
        assert_eq!(position, Position::new());
    }

    #[test]
    fn perft_kiwipete() {
        let mut position =
            Position::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(perft(&mut position, 1), 48);
        assert_eq!(perft(&mut position, 2), 2039);
    }

    #[test]
    fn perft_endgame_with_en_passant_pins() {
        let mut position = Position::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        assert_eq!(perft(&mut position, 1), 14);
        assert_eq!(perft(&mut position, 2), 191);
        assert_eq!(perft(&mut position, 3), 2812);
    }

    #[test]
    fn en_passant_is_generated_and_undone() {
        let mut position = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let before = position.clone();
        let ep = position
            .legal_moves()
            .into_iter()
            .find(|m| m.en_passant)
            .expect("en passant available");
        assert_eq!(ep.to, sq("d6"));
        let undo = position.apply(&ep);
        assert_eq!(position.piece_at(sq("d5")), None);
        assert_eq!(position.piece_at(sq("d6")), Some(Piece::new(Color::White, PieceKind::Pawn)));
        position.undo(undo);
        assert_eq!(position, before);
        assert_eq!(position.repetitions(), before.repetitions());
    }

    #[test]
    fn en_passant_target_expires_after_one_move() {
        let mut position = Position::new();
        play(&mut position, &[("e2", "e4")]);
        assert_eq!(position.en_passant(), Some(sq("e3")));
        play(&mut position, &[("g8", "f6")]);
        assert_eq!(position.en_passant(), None);
    }

    #[test]
    fn castling_both_sides_when_clear() {
        let mut position = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let castles: Vec<_> = position.legal_moves().into_iter().filter_map(|m| m.castle).collect();
        assert!(castles.contains(&CastleSide::King));
        assert!(castles.contains(&CastleSide::Queen));

        let before = position.clone();
        let short = find(&mut position, "e1", "g1");
        let undo = position.apply(&short);
        assert_eq!(position.piece_at(sq("f1")), Some(Piece::new(Color::White, PieceKind::Rook)));
        assert_eq!(position.piece_at(sq("h1")), None);
        assert_eq!(position.castling().to_string(), "kq");
        position.undo(undo);
        assert_eq!(position, before);
    }

    #[test]
    fn castling_forbidden_through_attacked_square() {
        // Black rook on f8 covers f1.
        let mut position = Position::from_fen("4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        let castles: Vec<_> = position.legal_moves().into_iter().filter_map(|m| m.castle).collect();
        assert_eq!(castles, vec![CastleSide::Queen]);
    }

    #[test]
    fn castling_forbidden_out_of_check() {
        let mut position = Position::from_fen("4r1k1/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        assert!(position.legal_moves().iter().all(|m| m.castle.is_none()));
    }

    #[test]
    fn rook_capture_clears_opponent_right() {
        let mut position = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        play(&mut position, &[("a1", "a8")]);
        assert_eq!(position.castling().to_string(), "Kk");
    }

    #[test]
    fn promotion_generates_four_choices() {
        let mut position = Position::from_fen("8/P7/8/8/8/8/8/4K2k w - - 0 1").unwrap();
        let promotions: Vec<_> = position.legal_moves().into_iter().filter_map(|m| m.promotion).collect();
        assert_eq!(promotions.len(), 4);
    }

    #[test]
    fn pinned_piece_cannot_move() {
        let mut position = Position::from_fen("4r1k1/8/8/8/8/8/4B3/4K3 w - - 0 1").unwrap();
        assert!(position.legal_moves().iter().all(|m| m.from != sq("e2")));
    }

    #[test]
    fn fools_mate_is_checkmate() {
        let mut position = Position::new();
        play(&mut position, &[("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")]);
        assert_eq!(position.status(), Status::Checkmate { winner: Seat::Two });
        assert!(position.is_checkmate());
    }

    #[test]
    fn stalemate_is_detected() {
        let mut position = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(position.is_stalemate());
        assert_eq!(position.status(), Status::Stalemate);
    }

    #[test]
    fn threefold_repetition_is_a_draw() {
        let mut position = Position::new();
        let shuffle = [("g1", "f3"), ("g8", "f6"), ("f3", "g1"), ("f6", "g8")];
        play(&mut position, &shuffle);
        assert_eq!(position.repetition_count(), 2);
        assert_eq!(position.detect_draw(), None);
        play(&mut position, &shuffle);
        assert_eq!(position.repetition_count(), 3);
        assert_eq!(position.status(), Status::Draw { reason: DrawReason::Repetition });
    }

    #[test]
    fn fifty_move_rule() {
        let mut position = Position::from_fen("4k3/8/8/8/8/8/R7/4K3 w - - 99 80").unwrap();
        assert_eq!(position.detect_draw(), None);
        play(&mut position, &[("a2", "a3")]);
        assert_eq!(position.halfmove_clock(), 100);
        assert_eq!(position.status(), Status::Draw { reason: DrawReason::FiftyMove });
    }

    #[test]
    fn pawn_move_resets_halfmove_clock() {
        let mut position = Position::from_fen("4k3/8/8/8/8/8/P7/4K3 w - - 42 30").unwrap();
        play(&mut position, &[("a2", "a4")]);
        assert_eq!(position.halfmove_clock(), 0);
        assert_eq!(position.fullmove_number(), 30);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Position::from_fen("").is_err());
        assert!(Position::from_fen("8/8/8 w - - 0 1").is_err());
        assert!(Position::from_fen("9/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(Position::from_fen("8/8/8/8/8/8/8/7x w - - 0 1").is_err());
        assert!(Position::from_fen("8/8/8/8/8/8/8/8 x - - 0 1").is_err());
    }

    #[test]
    fn missing_king_is_reported() {
        let position = Position::from_fen("8/8/8/8/8/8/8/4K3 b - - 0 1").unwrap();
        assert_eq!(position.missing_king(), Some(Seat::Two));
    }
}
