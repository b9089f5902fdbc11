use serde::Serialize;

use crate::error::MoveError;
use crate::game::{LegalityMode, MoveRequest, MoveSummary, Rules, Seat, Status};

/// Result of a successfully applied player move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MoveOutcome {
    pub summary: MoveSummary,
    pub status: Status,
}

/// One rules engine bound to two seats, plus the undo history and the
/// status derived after every move.
#[derive(Clone, Debug)]
pub struct GameSession<R: Rules> {
    state: R,
    mode: LegalityMode,
    status: Status,
    history: Vec<R::Undo>,
    last_move: Option<MoveSummary>,
}

impl<R: Rules> GameSession<R> {
    pub fn new(mode: LegalityMode) -> Self {
        Self::from_state(R::new_game(), mode)
    }

    /// Wraps a restored position; history starts empty.
    pub fn from_state(state: R, mode: LegalityMode) -> Self {
        let mut session = Self {
            state,
            mode,
            status: Status::Ongoing,
            history: Vec::new(),
            last_move: None,
        };
        session.status = session.derive_status();
        session
    }

    pub fn state(&self) -> &R {
        &self.state
    }

    pub fn mode(&self) -> LegalityMode {
        self.mode
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn turn(&self) -> Seat {
        self.state.turn()
    }

    pub fn last_move(&self) -> Option<&MoveSummary> {
        self.last_move.as_ref()
    }

    pub fn is_over(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn encode(&self) -> String {
        self.state.encode()
    }

    fn candidates(&mut self) -> Vec<R::Move> {
        match self.mode {
            LegalityMode::Strict => self.state.legal_moves(),
            LegalityMode::Permissive => self.state.pseudo_legal_moves(),
        }
    }

    /// Permissive games only end when a king leaves the board or the mover
    /// has nothing at all to play.
    fn derive_status(&mut self) -> Status {
        match self.mode {
            LegalityMode::Strict => self.state.status(),
            LegalityMode::Permissive => {
                if let Some(seat) = self.state.missing_king() {
                    return Status::KingCaptured {
                        winner: seat.other(),
                    };
                }
                let status = self.state.status();
                let has_moves = !self.state.pseudo_legal_moves().is_empty();
                match status {
                    Status::Checkmate { .. }
                    | Status::Stalemate
                    | Status::Draw { .. }
                    | Status::NoLegalMoves { .. }
                        if has_moves =>
                    {
                        if self.state.is_check() {
                            Status::Check
                        } else {
                            Status::Ongoing
                        }
                    }
                    Status::Ongoing | Status::Check | Status::Checkmate { .. } | Status::Stalemate
                        if !has_moves =>
                    {
                        Status::NoLegalMoves {
                            stuck: self.state.turn(),
                        }
                    }
                    other => other,
                }
            }
        }
    }

    /// Validates `request` for `seat` and applies it. Nothing changes when
    /// an error is returned.
    pub fn apply_player_move(&mut self, seat: Seat, request: &MoveRequest) -> Result<MoveOutcome, MoveError> {
        if self.is_over() {
            return Err(MoveError::GameOver);
        }
        if self.state.turn() != seat {
            return Err(MoveError::NotYourTurn);
        }

        let candidates = self.candidates();
        let matching: Vec<&R::Move> = candidates
            .iter()
            .filter(|mv| R::summarize(mv).matches_cells(request))
            .collect();

        let chosen = match request.promotion.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(kind) => matching.iter().find(|mv| R::summarize(mv).promotes_to(kind)),
            None => matching
                .iter()
                .find(|mv| R::summarize(mv).promotion.is_none())
                .or_else(|| {
                    let fallback = R::default_promotion()?;
                    matching.iter().find(|mv| R::summarize(mv).promotes_to(fallback))
                }),
        };
        let mv = match chosen {
            Some(mv) => (*mv).clone(),
            None => return Err(MoveError::Illegal),
        };

        let summary = R::summarize(&mv);
        let undo = self.state.apply(&mv);
        self.history.push(undo);
        self.status = self.derive_status();
        self.last_move = Some(summary.clone());
        Ok(MoveOutcome {
            summary,
            status: self.status,
        })
    }

    /// Legal destinations from `cell` for the side to move.
    pub fn legal_moves_from(&mut self, cell: &str) -> Vec<MoveSummary> {
        if self.is_over() {
            return Vec::new();
        }
        let cell = cell.trim();
        self.candidates()
            .iter()
            .map(R::summarize)
            .filter(|s| match &s.from {
                Some(from) => from.eq_ignore_ascii_case(cell),
                None => cell.is_empty(),
            })
            .collect()
    }

    /// Pops and reverses the most recent move.
    pub fn undo_last(&mut self) -> bool {
        match self.history.pop() {
            Some(undo) => {
                self.state.undo(undo);
                self.status = self.derive_status();
                self.last_move = None;
                true
            }
            None => false,
        }
    }

    /// Starts a fresh game in the same mode.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }
}
