pub mod checkers;
pub mod chess;
pub mod connect_four;
pub mod raumschach;
pub mod session;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PositionError;

pub use session::{GameSession, MoveOutcome};

/// One of the two player slots in a room. Seat one always moves first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Seat {
    One,
    Two,
}

impl Seat {
    pub const BOTH: [Seat; 2] = [Seat::One, Seat::Two];

    pub fn other(self) -> Seat {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Seat::One => 0,
            Seat::Two => 1,
        }
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> u8 {
        seat.index() as u8 + 1
    }
}

impl TryFrom<u8> for Seat {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Seat::One),
            2 => Ok(Seat::Two),
            other => Err(format!("invalid seat {}", other)),
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Chess,
    Checkers,
    ConnectFour,
    Raumschach,
}

impl GameKind {
    pub fn slug(self) -> &'static str {
        match self {
            GameKind::Chess => "chess",
            GameKind::Checkers => "checkers",
            GameKind::ConnectFour => "c4",
            GameKind::Raumschach => "raum",
        }
    }
}

/// Compatibility tag used by matchmaking. Permissive games skip the
/// king-safety filter where the variant has one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalityMode {
    #[default]
    Strict,
    Permissive,
}

impl LegalityMode {
    pub const ALL: [LegalityMode; 2] = [LegalityMode::Strict, LegalityMode::Permissive];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    FiftyMove,
    Repetition,
    InsufficientMaterial,
}

/// Status derived after every applied move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Status {
    Ongoing,
    Check,
    Checkmate { winner: Seat },
    Stalemate,
    Draw { reason: DrawReason },
    FourInARow { winner: Seat },
    BoardFull,
    Eliminated { winner: Seat },
    NoLegalMoves { stuck: Seat },
    KingCaptured { winner: Seat },
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Ongoing | Status::Check)
    }

    pub fn winner(&self) -> Option<Seat> {
        match *self {
            Status::Checkmate { winner }
            | Status::FourInARow { winner }
            | Status::Eliminated { winner }
            | Status::KingCaptured { winner } => Some(winner),
            _ => None,
        }
    }
}

/// Textual move descriptor as sent by a client. Cells use each variant's
/// own notation; `from` is absent for drop games.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub from: Option<String>,
    pub to: String,
    pub promotion: Option<String>,
}

/// Canonical rendering of an engine move, echoed back to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub capture: bool,
}

impl MoveSummary {
    /// Cell text compares case-insensitively in every variant's notation.
    pub fn matches_cells(&self, request: &MoveRequest) -> bool {
        let from_matches = match (&self.from, &request.from) {
            (Some(ours), Some(theirs)) => ours.eq_ignore_ascii_case(theirs.trim()),
            (None, None) => true,
            _ => false,
        };
        from_matches && self.to.eq_ignore_ascii_case(request.to.trim())
    }

    pub fn promotes_to(&self, kind: &str) -> bool {
        self.promotion
            .as_deref()
            .map_or(false, |p| p.eq_ignore_ascii_case(kind.trim()))
    }
}

/// The four-operation contract every variant implements, plus the
/// predicates and text encoding the session layer needs.
pub trait Rules: Clone + PartialEq + fmt::Debug + Send + Unpin + 'static {
    type Move: Clone + PartialEq + fmt::Debug;
    type Undo: Clone + fmt::Debug;

    const KIND: GameKind;

    fn new_game() -> Self;

    fn turn(&self) -> Seat;

    /// Every returned move leaves the mover's own king (or equivalent) safe.
    fn legal_moves(&mut self) -> Vec<Self::Move>;

    fn pseudo_legal_moves(&mut self) -> Vec<Self::Move> {
        self.legal_moves()
    }

    /// Callers must validate `mv` against the legal set first.
    fn apply(&mut self, mv: &Self::Move) -> Self::Undo;

    fn undo(&mut self, undo: Self::Undo);

    fn is_check(&self) -> bool;

    fn detect_draw(&self) -> Option<DrawReason> {
        None
    }

    /// The seat whose king is no longer on the board, for variants with kings.
    fn missing_king(&self) -> Option<Seat> {
        None
    }

    fn status(&mut self) -> Status;

    fn summarize(mv: &Self::Move) -> MoveSummary;

    fn default_promotion() -> Option<&'static str> {
        None
    }

    fn encode(&self) -> String;

    fn decode(text: &str) -> Result<Self, PositionError>;
}

/// Exhaustive move-tree node count.
pub fn perft<R: Rules>(state: &mut R, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = state.legal_moves();
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0;
    for mv in &moves {
        let undo = state.apply(mv);
        nodes += perft(state, depth - 1);
        state.undo(undo);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Seat::Two).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Seat>("1").unwrap(), Seat::One);
        assert!(serde_json::from_str::<Seat>("3").is_err());
    }

    #[test]
    fn status_is_tagged() {
        let json = serde_json::to_value(Status::Checkmate { winner: Seat::One }).unwrap();
        assert_eq!(json["kind"], "checkmate");
        assert_eq!(json["winner"], 1);
        assert!(!Status::Check.is_terminal());
        assert!(Status::Draw { reason: DrawReason::Repetition }.is_terminal());
    }
}
