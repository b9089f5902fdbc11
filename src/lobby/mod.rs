//! Matchmaking, room lifecycle and message dispatch for one game variant.
//!
//! `Lobby` is plain data: every entry point takes the current inputs and
//! returns the effects to perform (frames to send, timers to start or stop,
//! a snapshot to write). The websocket layer executes them in order.

mod gateway;
pub mod queue;
pub mod room;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::game::{LegalityMode, Rules, Seat};
use crate::models::{RoomSummary, ServerMessage};
use crate::persistence::{RoomRecord, SavedRooms};

pub use queue::MatchQueue;
pub use room::{Identity, Phase, Room, RoomRegistry};

pub type ConnId = Uuid;
pub type RoomId = u64;

pub const MAX_USERNAME_CHARS: usize = 40;

/// Something the caller must do on the lobby's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send { to: ConnId, message: ServerMessage },
    StartCountdown(RoomId),
    StopCountdown(RoomId),
    Persist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbySettings {
    pub countdown: u8,
    pub chat_min_interval: Duration,
    pub chat_max_chars: usize,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            countdown: 5,
            chat_min_interval: Duration::from_millis(700),
            chat_max_chars: 80,
        }
    }
}

/// Server-held facts about one connection. Seats are only ever resolved
/// from here, never from what a client claims.
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    pub username: Option<String>,
    pub user_id: Option<i64>,
    pub mode: LegalityMode,
    pub binding: Option<(RoomId, Seat)>,
    pub last_chat: Option<Instant>,
}

pub fn clean_username(raw: &str) -> Option<String> {
    let name: String = raw.trim().chars().take(MAX_USERNAME_CHARS).collect();
    (!name.is_empty()).then_some(name)
}

pub struct Lobby<R: Rules> {
    settings: LobbySettings,
    connections: HashMap<ConnId, ConnectionContext>,
    queue: MatchQueue,
    rooms: RoomRegistry<R>,
}

impl<R: Rules> Default for Lobby<R> {
    fn default() -> Self {
        Self::new(LobbySettings::default())
    }
}

impl<R: Rules> Lobby<R> {
    pub fn new(settings: LobbySettings) -> Self {
        Self {
            settings,
            connections: HashMap::new(),
            queue: MatchQueue::new(),
            rooms: RoomRegistry::default(),
        }
    }

    pub fn connection(&self, conn: ConnId) -> Option<&ConnectionContext> {
        self.connections.get(&conn)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room<R>> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> &RoomRegistry<R> {
        &self.rooms
    }

    pub fn is_open(&self, conn: ConnId) -> bool {
        self.connections.contains_key(&conn)
    }

    pub fn connect(&mut self, conn: ConnId) {
        self.connections.insert(conn, ConnectionContext::default());
        debug!("{} connection {} registered", R::KIND.slug(), conn);
    }

    /// Cancels queue membership and pauses or cancels the seated room in
    /// the same turn.
    pub fn disconnect(&mut self, conn: ConnId) -> Vec<Effect> {
        let mut out = Vec::new();
        self.queue.remove(conn);
        if let Some(ctx) = self.connections.remove(&conn) {
            if let Some((room_id, seat)) = ctx.binding {
                self.release_seat(conn, room_id, seat, &mut out);
            }
        }
        debug!("{} connection {} closed", R::KIND.slug(), conn);
        out
    }

    fn broadcast(room: &Room<R>, message: &ServerMessage, out: &mut Vec<Effect>) {
        for (_, conn) in room.occupants() {
            out.push(Effect::Send {
                to: conn,
                message: message.clone(),
            });
        }
    }

    fn presence(room: &Room<R>, out: &mut Vec<Effect>) {
        Self::broadcast(room, &ServerMessage::Presence { open: room.open() }, out);
    }

    fn unbind(&mut self, conn: ConnId) {
        if let Some(ctx) = self.connections.get_mut(&conn) {
            ctx.binding = None;
        }
    }

    /// Frees `seat` of `room_id` held by `conn`. A room still counting down
    /// is cancelled outright; an active or paused room is paused and kept.
    fn release_seat(&mut self, conn: ConnId, room_id: RoomId, seat: Seat, out: &mut Vec<Effect>) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        if room.occupant(seat) != Some(conn) {
            return;
        }

        if room.countdown().is_some() {
            let remaining = room.occupant(seat.other());
            self.cancel_room(room_id, remaining, out);
            return;
        }

        room.vacate(seat);
        room.rematch_votes = [false; 2];
        Self::broadcast(room, &ServerMessage::PlayerLeft { seat }, out);
        Self::presence(room, out);
        out.push(Effect::Persist);
        info!("{} room {} paused, seat {} left", R::KIND.slug(), room_id, seat);
    }

    /// Destroys a room that never made it out of its countdown and frees
    /// whoever is still seated.
    fn cancel_room(&mut self, room_id: RoomId, remaining: impl IntoIterator<Item = ConnId>, out: &mut Vec<Effect>) {
        out.push(Effect::StopCountdown(room_id));
        self.rooms.remove(room_id);
        for conn in remaining {
            out.push(Effect::Send {
                to: conn,
                message: ServerMessage::OpponentLeft,
            });
            self.unbind(conn);
        }
        out.push(Effect::Persist);
        info!("{} room {} cancelled during countdown", R::KIND.slug(), room_id);
    }

    fn try_pair(&mut self, out: &mut Vec<Effect>) {
        loop {
            let connections = &self.connections;
            let Some((a, b, mode)) = self.queue.take_pair(|conn| connections.contains_key(&conn)) else {
                break;
            };
            let identity = |conn: ConnId, seat: Seat| {
                let ctx = connections.get(&conn);
                let fallback = Identity::placeholder(seat);
                Identity {
                    username: ctx.and_then(|c| c.username.clone()).unwrap_or(fallback.username),
                    user_id: ctx.and_then(|c| c.user_id),
                }
            };
            let identities = [identity(a, Seat::One), identity(b, Seat::Two)];
            let room_id = self.rooms.create([a, b], identities, mode);
            for (conn, seat) in [(a, Seat::One), (b, Seat::Two)] {
                if let Some(ctx) = self.connections.get_mut(&conn) {
                    ctx.binding = Some((room_id, seat));
                }
            }
            info!("{} paired {} and {} into room {} ({:?})", R::KIND.slug(), a, b, room_id, mode);
            self.begin_countdown(room_id, out);
            out.push(Effect::Persist);
        }
    }

    /// Sends each seat its pairing details and the first countdown value.
    fn begin_countdown(&mut self, room_id: RoomId, out: &mut Vec<Effect>) {
        let countdown = self.settings.countdown;
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        room.phase = Phase::Countdown(countdown);
        for (seat, conn) in room.occupants() {
            out.push(Effect::Send {
                to: conn,
                message: ServerMessage::Paired {
                    room_id,
                    seat,
                    usernames: room.usernames(),
                    mode: room.session.mode(),
                    countdown,
                    token: room.token(seat).to_string(),
                },
            });
        }
        Self::broadcast(room, &ServerMessage::Countdown { value: countdown }, out);
        out.push(Effect::StartCountdown(room_id));
    }

    /// One elapsed countdown second.
    pub fn countdown_tick(&mut self, room_id: RoomId) -> Vec<Effect> {
        let mut out = Vec::new();
        let Some(room) = self.rooms.get_mut(room_id) else {
            out.push(Effect::StopCountdown(room_id));
            return out;
        };
        let Phase::Countdown(value) = room.phase else {
            out.push(Effect::StopCountdown(room_id));
            return out;
        };

        if !room.is_full() {
            let remaining: Vec<ConnId> = room.occupants().map(|(_, conn)| conn).collect();
            self.cancel_room(room_id, remaining, &mut out);
            return out;
        }

        let next = value.saturating_sub(1);
        if next > 0 {
            room.phase = Phase::Countdown(next);
            Self::broadcast(room, &ServerMessage::Countdown { value: next }, &mut out);
            return out;
        }

        room.phase = Phase::Active;
        room.touch();
        let position = room.session.encode();
        let turn = room.session.turn();
        let status = room.session.status();
        for (seat, conn) in room.occupants() {
            out.push(Effect::Send {
                to: conn,
                message: ServerMessage::Start {
                    room_id,
                    seat,
                    token: room.token(seat).to_string(),
                    position: position.clone(),
                    turn,
                    status,
                },
            });
        }
        Self::presence(room, &mut out);
        out.push(Effect::StopCountdown(room_id));
        out.push(Effect::Persist);
        info!("{} room {} started", R::KIND.slug(), room_id);
        out
    }

    /// Periodic backstop: drop closed queue entries and pair whoever is left.
    pub fn sweep(&mut self) -> Vec<Effect> {
        let mut out = Vec::new();
        let connections = &self.connections;
        let purged = self.queue.purge(|conn| connections.contains_key(&conn));
        if purged > 0 {
            debug!("{} sweep purged {} closed queue entries", R::KIND.slug(), purged);
        }
        self.try_pair(&mut out);
        if !self.queue.is_empty() {
            debug!("{} sweep left {} waiting", R::KIND.slug(), self.queue.len());
        }
        out
    }

    pub fn summaries(&self) -> Vec<RoomSummary> {
        self.rooms.iter().map(Room::summary).collect()
    }

    pub fn snapshot(&self) -> SavedRooms {
        let rooms = self
            .rooms
            .iter()
            .filter_map(|room| match serde_json::to_value(room.to_record()) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Could not serialize room {}: {}", room.id, e);
                    None
                }
            })
            .collect();
        SavedRooms {
            next_room_id: self.rooms.next_id(),
            rooms,
        }
    }

    /// Repopulates the registry; corrupt or foreign records are skipped.
    pub fn restore(&mut self, saved: SavedRooms) -> usize {
        let mut restored = 0;
        for value in saved.rooms {
            let record: RoomRecord = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable {} room record: {}", R::KIND.slug(), e);
                    continue;
                }
            };
            if record.kind != R::KIND {
                warn!("Skipping room {}: recorded as {:?}", record.id, record.kind);
                continue;
            }
            let id = record.id;
            match Room::<R>::from_record(record) {
                Ok(room) => {
                    self.rooms.insert(room);
                    restored += 1;
                }
                Err(e) => warn!("Skipping room {}: {}", id, e),
            }
        }
        self.rooms.reserve_ids_from(saved.next_room_id);
        info!("Restored {} {} rooms", restored, R::KIND.slug());
        restored
    }
}
