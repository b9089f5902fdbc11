use thiserror::Error;

use crate::lobby::RoomId;

/// Failure to decode a position from its text encoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error("position text is missing the {0} field")]
    MissingField(&'static str),

    #[error("expected {expected} rows but found {found}")]
    RowCount { expected: usize, found: usize },

    #[error("row {row} does not describe exactly {width} cells")]
    RowWidth { row: usize, width: usize },

    #[error("unknown piece symbol '{0}'")]
    UnknownPiece(char),

    #[error("invalid {field}: '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("{color} has {found} kings")]
    KingCount { color: &'static str, found: usize },
}

/// Why a game session refused a move.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoveError {
    #[error("not your turn")]
    NotYourTurn,

    #[error("game is already over")]
    GameOver,

    #[error("illegal move")]
    Illegal,
}

/// Recoverable failures of a gateway handler. Each is answered only to the
/// connection that caused it, or not at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("malformed message: {0}")]
    Protocol(String),

    #[error("illegal move")]
    IllegalMove,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("room {0} no longer exists")]
    StaleRoom(RoomId),
}

impl From<MoveError> for GatewayError {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::Illegal => GatewayError::IllegalMove,
            MoveError::NotYourTurn => GatewayError::Unauthorized("not your turn"),
            MoveError::GameOver => GatewayError::Unauthorized("game is already over"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
