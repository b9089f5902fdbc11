//! Raumschach: 5x5x5 chess with unicorns. Cells read `Aa1`..`Ee5` as
//! level, file, rank. There is no castling, en passant or draw detection;
//! status reports only whether a king is capturable, missing, or stuck.

use std::fmt;
use std::str::FromStr;

use crate::error::PositionError;
use crate::game::{GameKind, MoveSummary, Rules, Seat, Status};

const SIZE: i8 = 5;
const CELLS: usize = 125;

type Delta = (i8, i8, i8);

/// (level, rank, file) unit vectors along one axis.
const AXIAL: [Delta; 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];
const PLANAR: [Delta; 12] = [
    (0, 1, 1),
    (0, 1, -1),
    (0, -1, 1),
    (0, -1, -1),
    (1, 0, 1),
    (1, 0, -1),
    (-1, 0, 1),
    (-1, 0, -1),
    (1, 1, 0),
    (1, -1, 0),
    (-1, 1, 0),
    (-1, -1, 0),
];
const SPATIAL: [Delta; 8] = [
    (1, 1, 1),
    (1, 1, -1),
    (1, -1, 1),
    (1, -1, -1),
    (-1, 1, 1),
    (-1, 1, -1),
    (-1, -1, 1),
    (-1, -1, -1),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    fn other(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    fn seat(self) -> Seat {
        match self {
            Color::White => Seat::One,
            Color::Black => Seat::Two,
        }
    }

    fn forward(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    fn last_rank(self) -> i8 {
        match self {
            Color::White => SIZE - 1,
            Color::Black => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Unicorn,
    Pawn,
}

impl Kind {
    fn symbol(self) -> char {
        match self {
            Kind::King => 'k',
            Kind::Queen => 'q',
            Kind::Rook => 'r',
            Kind::Bishop => 'b',
            Kind::Knight => 'n',
            Kind::Unicorn => 'u',
            Kind::Pawn => 'p',
        }
    }

    fn from_symbol(symbol: char) -> Option<Kind> {
        match symbol.to_ascii_lowercase() {
            'k' => Some(Kind::King),
            'q' => Some(Kind::Queen),
            'r' => Some(Kind::Rook),
            'b' => Some(Kind::Bishop),
            'n' => Some(Kind::Knight),
            'u' => Some(Kind::Unicorn),
            'p' => Some(Kind::Pawn),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Piece {
    pub color: Color,
    pub kind: Kind,
}

impl Piece {
    fn symbol(self) -> char {
        match self.color {
            Color::White => self.kind.symbol().to_ascii_uppercase(),
            Color::Black => self.kind.symbol(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    level: i8,
    rank: i8,
    file: i8,
}

impl Cell {
    pub fn new(level: i8, rank: i8, file: i8) -> Option<Cell> {
        let ok = |v: i8| (0..SIZE).contains(&v);
        (ok(level) && ok(rank) && ok(file)).then_some(Cell { level, rank, file })
    }

    fn offset(self, (d_level, d_rank, d_file): Delta) -> Option<Cell> {
        Cell::new(self.level + d_level, self.rank + d_rank, self.file + d_file)
    }

    fn index(self) -> usize {
        (self.level * SIZE * SIZE + self.rank * SIZE + self.file) as usize
    }

    fn all() -> impl Iterator<Item = Cell> {
        (0..SIZE).flat_map(|level| {
            (0..SIZE).flat_map(move |rank| (0..SIZE).map(move |file| Cell { level, rank, file }))
        })
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            (b'A' + self.level as u8) as char,
            (b'a' + self.file as u8) as char,
            self.rank + 1
        )
    }
}

impl FromStr for Cell {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.trim().as_bytes() {
            [level @ b'A'..=b'E', file @ b'a'..=b'e', rank @ b'1'..=b'5'] => {
                Cell::new((level - b'A') as i8, (rank - b'1') as i8, (file - b'a') as i8)
            }
            [level @ b'a'..=b'e', file @ b'a'..=b'e', rank @ b'1'..=b'5'] => {
                Cell::new((level - b'a') as i8, (rank - b'1') as i8, (file - b'a') as i8)
            }
            _ => None,
        };
        parsed.ok_or_else(|| PositionError::InvalidField {
            field: "cell",
            value: s.to_string(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    pub from: Cell,
    pub to: Cell,
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub promotes: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Undo {
    mv: Move,
    side: Color,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Piece>; CELLS],
    side: Color,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        let back = [Kind::Rook, Kind::Knight, Kind::King, Kind::Knight, Kind::Rook];
        let middle = [Kind::Unicorn, Kind::Bishop, Kind::Queen, Kind::Bishop, Kind::Unicorn];
        let mut board = Board {
            cells: [None; CELLS],
            side: Color::White,
        };
        let mut place = |level: i8, rank: i8, file: i8, color: Color, kind: Kind| {
            if let Some(cell) = Cell::new(level, rank, file) {
                board.cells[cell.index()] = Some(Piece { color, kind });
            }
        };
        for file in 0..SIZE {
            let i = file as usize;
            place(0, 0, file, Color::White, back[i]);
            place(0, 1, file, Color::White, Kind::Pawn);
            place(1, 0, file, Color::White, middle[i]);
            place(1, 1, file, Color::White, Kind::Pawn);
            place(4, 4, file, Color::Black, back[i]);
            place(4, 3, file, Color::Black, Kind::Pawn);
            place(3, 4, file, Color::Black, middle[i]);
            place(3, 3, file, Color::Black, Kind::Pawn);
        }
        board
    }

    pub fn at(&self, cell: Cell) -> Option<Piece> {
        self.cells[cell.index()]
    }

    fn find_king(&self, color: Color) -> Option<Cell> {
        Cell::all().find(|&cell| {
            self.at(cell) == Some(Piece {
                color,
                kind: Kind::King,
            })
        })
    }

    /// Whether `color`'s king could be taken by the opponent right now.
    pub fn king_capturable(&self, color: Color) -> bool {
        self.find_king(color)
            .map_or(false, |king| self.is_attacked(king, color.other()))
    }

    fn pseudo_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        for from in Cell::all() {
            let Some(piece) = self.at(from) else {
                continue;
            };
            if piece.color != self.side {
                continue;
            }
            match piece.kind {
                Kind::Rook => self.slide(from, piece, &AXIAL, &mut moves),
                Kind::Bishop => self.slide(from, piece, &PLANAR, &mut moves),
                Kind::Unicorn => self.slide(from, piece, &SPATIAL, &mut moves),
                Kind::Queen => {
                    self.slide(from, piece, &AXIAL, &mut moves);
                    self.slide(from, piece, &PLANAR, &mut moves);
                    self.slide(from, piece, &SPATIAL, &mut moves);
                }
                Kind::King => {
                    for delta in AXIAL.iter().chain(&PLANAR).chain(&SPATIAL) {
                        self.leap(from, piece, *delta, &mut moves);
                    }
                }
                Kind::Knight => {
                    for delta in knight_deltas() {
                        self.leap(from, piece, delta, &mut moves);
                    }
                }
                Kind::Pawn => self.pawn(from, piece, &mut moves),
            }
        }
        moves
    }

    fn target(&self, from: Cell, to: Cell, piece: Piece) -> Option<Move> {
        match self.at(to) {
            Some(other) if other.color == piece.color => None,
            captured => Some(Move {
                from,
                to,
                piece,
                captured,
                promotes: piece.kind == Kind::Pawn && to.rank == piece.color.last_rank(),
            }),
        }
    }

    fn slide(&self, from: Cell, piece: Piece, rays: &[Delta], moves: &mut Vec<Move>) {
        for &delta in rays {
            let mut cursor = from;
            while let Some(to) = cursor.offset(delta) {
                moves.extend(self.target(from, to, piece));
                if self.at(to).is_some() {
                    break;
                }
                cursor = to;
            }
        }
    }

    fn leap(&self, from: Cell, piece: Piece, delta: Delta, moves: &mut Vec<Move>) {
        if let Some(to) = from.offset(delta) {
            moves.extend(self.target(from, to, piece));
        }
    }

    fn pawn(&self, from: Cell, piece: Piece, moves: &mut Vec<Move>) {
        let dir = piece.color.forward();
        if let Some(ahead) = from.offset((0, dir, 0)) {
            if self.at(ahead).is_none() {
                moves.extend(self.target(from, ahead, piece));
            }
        }
        for side in [(0, dir, -1), (0, dir, 1), (-1, dir, 0), (1, dir, 0)] {
            let Some(to) = from.offset(side) else {
                continue;
            };
            if self.at(to).map_or(false, |p| p.color != piece.color) {
                moves.extend(self.target(from, to, piece));
            }
        }
    }

    fn is_attacked(&self, target: Cell, by: Color) -> bool {
        let holds = |cell: Option<Cell>, kinds: &[Kind]| {
            cell.and_then(|c| self.at(c))
                .map_or(false, |p| p.color == by && kinds.contains(&p.kind))
        };
        let ray_hits = |rays: &[Delta], kinds: &[Kind]| {
            rays.iter().any(|&delta| {
                let mut cursor = target;
                while let Some(next) = cursor.offset(delta) {
                    if let Some(p) = self.at(next) {
                        return p.color == by && kinds.contains(&p.kind);
                    }
                    cursor = next;
                }
                false
            })
        };

        if ray_hits(&AXIAL, &[Kind::Rook, Kind::Queen])
            || ray_hits(&PLANAR, &[Kind::Bishop, Kind::Queen])
            || ray_hits(&SPATIAL, &[Kind::Unicorn, Kind::Queen])
        {
            return true;
        }
        if knight_deltas().any(|d| holds(target.offset(d), &[Kind::Knight])) {
            return true;
        }
        if AXIAL
            .iter()
            .chain(&PLANAR)
            .chain(&SPATIAL)
            .any(|&d| holds(target.offset(d), &[Kind::King]))
        {
            return true;
        }
        // Pawns of `by` sit one rank behind, offset by a file or a level.
        let back = -by.forward();
        [(0, back, -1), (0, back, 1), (-1, back, 0), (1, back, 0)]
            .into_iter()
            .any(|d| holds(target.offset(d), &[Kind::Pawn]))
    }

    fn make(&mut self, mv: &Move) -> Undo {
        let undo = Undo {
            mv: *mv,
            side: self.side,
        };
        self.cells[mv.from.index()] = None;
        let placed = if mv.promotes {
            Piece {
                color: mv.piece.color,
                kind: Kind::Queen,
            }
        } else {
            mv.piece
        };
        self.cells[mv.to.index()] = Some(placed);
        self.side = self.side.other();
        undo
    }
}

/// The 24 leaps whose absolute components are a permutation of 0, 1, 2.
fn knight_deltas() -> impl Iterator<Item = Delta> {
    const STEPS: [i8; 5] = [-2, -1, 0, 1, 2];
    STEPS.into_iter().flat_map(|a| {
        STEPS.into_iter().flat_map(move |b| {
            STEPS.into_iter().filter_map(move |c| {
                let mut abs = [a.abs(), b.abs(), c.abs()];
                abs.sort_unstable();
                (abs == [0, 1, 2]).then_some((a, b, c))
            })
        })
    })
}

impl Rules for Board {
    type Move = Move;
    type Undo = Undo;

    const KIND: GameKind = GameKind::Raumschach;

    fn new_game() -> Self {
        Board::new()
    }

    fn turn(&self) -> Seat {
        self.side.seat()
    }

    fn legal_moves(&mut self) -> Vec<Move> {
        if self.missing_king().is_some() {
            return Vec::new();
        }
        let mover = self.side;
        self.pseudo_moves()
            .into_iter()
            .filter(|mv| {
                let undo = self.make(mv);
                let safe = !self.king_capturable(mover);
                self.undo(undo);
                safe
            })
            .collect()
    }

    fn pseudo_legal_moves(&mut self) -> Vec<Move> {
        if self.missing_king().is_some() {
            return Vec::new();
        }
        self.pseudo_moves()
    }

    fn apply(&mut self, mv: &Move) -> Undo {
        self.make(mv)
    }

    fn undo(&mut self, undo: Undo) {
        let mv = undo.mv;
        self.cells[mv.to.index()] = mv.captured;
        self.cells[mv.from.index()] = Some(mv.piece);
        self.side = undo.side;
    }

    fn is_check(&self) -> bool {
        self.king_capturable(self.side)
    }

    fn missing_king(&self) -> Option<Seat> {
        [Color::White, Color::Black]
            .into_iter()
            .find(|&color| self.find_king(color).is_none())
            .map(Color::seat)
    }

    fn status(&mut self) -> Status {
        if let Some(seat) = self.missing_king() {
            return Status::KingCaptured {
                winner: seat.other(),
            };
        }
        if self.legal_moves().is_empty() {
            return Status::NoLegalMoves {
                stuck: self.side.seat(),
            };
        }
        if self.is_check() {
            Status::Check
        } else {
            Status::Ongoing
        }
    }

    fn summarize(mv: &Move) -> MoveSummary {
        MoveSummary {
            from: Some(mv.from.to_string()),
            to: mv.to.to_string(),
            promotion: mv.promotes.then(|| "q".to_string()),
            capture: mv.captured.is_some(),
        }
    }

    /// Levels A to E joined by `|`, each listing ranks 5 down to 1 as in FEN,
    /// then `w` or `b`.
    fn encode(&self) -> String {
        let levels: Vec<String> = (0..SIZE)
            .map(|level| {
                let ranks: Vec<String> = (0..SIZE)
                    .rev()
                    .map(|rank| {
                        let mut out = String::new();
                        let mut empty = 0;
                        for file in 0..SIZE {
                            match Cell::new(level, rank, file).and_then(|c| self.at(c)) {
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
                        out
                    })
                    .collect();
                ranks.join("/")
            })
            .collect();
        let side = match self.side {
            Color::White => 'w',
            Color::Black => 'b',
        };
        format!("{} {}", levels.join("|"), side)
    }

    fn decode(text: &str) -> Result<Self, PositionError> {
        let mut fields = text.split_whitespace();
        let placement = fields.next().ok_or(PositionError::MissingField("placement"))?;
        let side = fields.next().ok_or(PositionError::MissingField("side"))?;

        let levels: Vec<&str> = placement.split('|').collect();
        if levels.len() != SIZE as usize {
            return Err(PositionError::RowCount {
                expected: SIZE as usize,
                found: levels.len(),
            });
        }
        let mut cells = [None; CELLS];
        for (level, level_text) in levels.iter().enumerate() {
            let ranks: Vec<&str> = level_text.split('/').collect();
            if ranks.len() != SIZE as usize {
                return Err(PositionError::RowCount {
                    expected: SIZE as usize,
                    found: ranks.len(),
                });
            }
            for (row, line) in ranks.iter().enumerate() {
                let rank = SIZE - 1 - row as i8;
                let mut file = 0usize;
                for ch in line.chars() {
                    if let Some(run) = ch.to_digit(10) {
                        file += run as usize;
                        continue;
                    }
                    let kind = Kind::from_symbol(ch).ok_or(PositionError::UnknownPiece(ch))?;
                    let color = if ch.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    if let Some(cell) = Cell::new(level as i8, rank, file as i8) {
                        cells[cell.index()] = Some(Piece { color, kind });
                    }
                    file += 1;
                }
                if file != SIZE as usize {
                    return Err(PositionError::RowWidth {
                        row: level * SIZE as usize + row,
                        width: file,
                    });
                }
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
        Ok(Board { cells, side })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::perft;

    fn cell(text: &str) -> Cell {
        text.parse().unwrap()
    }

    #[test]
    fn knight_has_twenty_four_leaps() {
        assert_eq!(knight_deltas().count(), 24);
    }

    #[test]
    fn setup_mirrors_across_the_cube() {
        let board = Board::new();
        assert_eq!(
            board.at(cell("Ac1")),
            Some(Piece { color: Color::White, kind: Kind::King })
        );
        assert_eq!(
            board.at(cell("Ec5")),
            Some(Piece { color: Color::Black, kind: Kind::King })
        );
        assert_eq!(
            board.at(cell("Bc1")),
            Some(Piece { color: Color::White, kind: Kind::Queen })
        );
        assert_eq!(
            board.at(cell("Dc5")),
            Some(Piece { color: Color::Black, kind: Kind::Queen })
        );
        assert_eq!(Board::decode(&board.encode()).unwrap(), board);
    }

    #[test]
    fn rook_rays_run_until_blocked() {
        // Lone rook in the centre of an empty cube reaches two cells each way.
        let mut board = Board::decode("5/5/5/5/k4|5/5/5/5/5|5/5/2R2/5/5|5/5/5/5/5|4K/5/5/5/5 w").unwrap();
        let from = cell("Cc3");
        let rook_moves = board.legal_moves().into_iter().filter(|m| m.from == from).count();
        assert_eq!(rook_moves, 12);
    }

    #[test]
    fn unicorn_moves_on_space_diagonals() {
        let mut board = Board::decode("5/5/5/5/k4|5/5/5/5/5|5/5/2U2/5/5|5/5/5/5/5|4K/5/5/5/5 w").unwrap();
        let from = cell("Cc3");
        let targets: Vec<String> = board
            .legal_moves()
            .into_iter()
            .filter(|m| m.from == from)
            .map(|m| m.to.to_string())
            .collect();
        // Six open diagonals of two cells, one stopped by its own king, one
        // ending on the enemy king.
        assert_eq!(targets.len(), 15);
        assert!(targets.contains(&"Aa1".to_string()));
        assert!(!targets.contains(&"Ee5".to_string()));
    }

    #[test]
    fn opening_moves_are_all_safe_and_reversible() {
        let mut board = Board::new();
        let start = board.clone();
        let moves = board.legal_moves();
        assert!(!moves.is_empty());
        for mv in &moves {
            let undo = board.apply(mv);
            assert!(!board.king_capturable(Color::White));
            board.undo(undo);
            assert_eq!(board, start);
        }
        assert!(perft(&mut board, 2) > moves.len() as u64);
        assert_eq!(board, start);
    }

    #[test]
    fn pawn_captures_sideways_in_level() {
        let mut board = Board::decode("5/5/5/5/k4|5/5/5/5/5|5/5/1p1p1/2P2/5|5/5/2p2/5/5|4K/5/5/5/5 w").unwrap();
        let from = cell("Cc2");
        let targets: Vec<String> = board
            .legal_moves()
            .into_iter()
            .filter(|m| m.from == from)
            .map(|m| m.to.to_string())
            .collect();
        // Push to Cc3, capture Cb3, Cd3 and Dc3.
        assert_eq!(targets.len(), 4);
        assert!(targets.contains(&"Dc3".to_string()));
    }

    #[test]
    fn pawn_promotes_to_queen() {
        let mut board = Board::decode("5/5/5/5/k4|5/5/5/5/5|5/P4/5/5/5|5/5/5/5/5|4K/5/5/5/5 w").unwrap();
        let mv = board
            .legal_moves()
            .into_iter()
            .find(|m| m.from == cell("Ca4"))
            .expect("pawn push");
        assert!(mv.promotes);
        board.apply(&mv);
        assert_eq!(
            board.at(cell("Ca5")),
            Some(Piece { color: Color::White, kind: Kind::Queen })
        );
    }

    #[test]
    fn missing_king_is_terminal() {
        let mut board = Board::decode("5/5/5/5/k4|5/5/5/5/5|5/5/5/5/5|5/5/5/5/5|5/5/5/5/5 b").unwrap();
        assert_eq!(board.status(), Status::KingCaptured { winner: Seat::Two });
        assert!(board.legal_moves().is_empty());
    }

    #[test]
    fn check_is_reported() {
        let mut board = Board::decode("5/5/5/5/k4|5/5/5/5/5|5/5/5/5/5|5/5/5/5/5|4K/5/5/5/R4 b").unwrap();
        assert!(board.is_check());
        assert_eq!(board.status(), Status::Check);
    }
}
