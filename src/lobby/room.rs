use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::PositionError;
use crate::game::{GameSession, LegalityMode, Rules, Seat};
use crate::lobby::{ConnId, RoomId};
use crate::models::{RoomSummary, SavedGame};
use crate::persistence::RoomRecord;

/// Where a room is in its lifecycle. A destroyed room simply stops existing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Seconds left before the start snapshot goes out.
    Countdown(u8),
    Active,
    Paused,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub user_id: Option<i64>,
}

impl Identity {
    pub fn placeholder(seat: Seat) -> Self {
        Self {
            username: format!("Player {}", seat),
            user_id: None,
        }
    }
}

pub struct Room<R: Rules> {
    pub id: RoomId,
    pub seats: [Option<ConnId>; 2],
    pub session: GameSession<R>,
    pub identities: [Identity; 2],
    pub tokens: [String; 2],
    pub phase: Phase,
    pub last_activity: i64,
    pub rematch_votes: [bool; 2],
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl<R: Rules> Room<R> {
    pub fn new(id: RoomId, players: [ConnId; 2], identities: [Identity; 2], mode: LegalityMode) -> Self {
        Self {
            id,
            seats: [Some(players[0]), Some(players[1])],
            session: GameSession::new(mode),
            identities,
            tokens: [Uuid::new_v4().to_string(), Uuid::new_v4().to_string()],
            phase: Phase::Paused,
            last_activity: now_millis(),
            rematch_votes: [false; 2],
        }
    }

    pub fn occupant(&self, seat: Seat) -> Option<ConnId> {
        self.seats[seat.index()]
    }

    pub fn occupants(&self) -> impl Iterator<Item = (Seat, ConnId)> + '_ {
        Seat::BOTH
            .into_iter()
            .filter_map(|seat| self.occupant(seat).map(|conn| (seat, conn)))
    }

    pub fn open(&self) -> [bool; 2] {
        [self.seats[0].is_some(), self.seats[1].is_some()]
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    pub fn countdown(&self) -> Option<u8> {
        match self.phase {
            Phase::Countdown(value) => Some(value),
            _ => None,
        }
    }

    pub fn usernames(&self) -> [String; 2] {
        [
            self.identities[0].username.clone(),
            self.identities[1].username.clone(),
        ]
    }

    pub fn token(&self, seat: Seat) -> &str {
        &self.tokens[seat.index()]
    }

    pub fn seat_for_token(&self, token: &str) -> Option<Seat> {
        if token.is_empty() {
            return None;
        }
        Seat::BOTH.into_iter().find(|seat| self.tokens[seat.index()] == token)
    }

    pub fn touch(&mut self) {
        self.last_activity = now_millis();
    }

    pub fn vacate(&mut self, seat: Seat) {
        self.seats[seat.index()] = None;
        self.phase = Phase::Paused;
        self.touch();
    }

    pub fn bind(&mut self, seat: Seat, conn: ConnId) {
        self.seats[seat.index()] = Some(conn);
        self.touch();
    }

    /// Which seats an identity matches, user id taking precedence.
    pub fn identity_matches(&self, username: Option<&str>, user_id: Option<i64>) -> [bool; 2] {
        let by_id = user_id.map(|uid| {
            [
                self.identities[0].user_id == Some(uid),
                self.identities[1].user_id == Some(uid),
            ]
        });
        match by_id {
            Some(matches) if matches.contains(&true) => matches,
            _ => match username {
                Some(name) => [
                    self.identities[0].username == name,
                    self.identities[1].username == name,
                ],
                None => [false, false],
            },
        }
    }

    /// Picks the seat a returning identity may occupy. When both seats match
    /// the same identity, an unoccupied one wins.
    pub fn claim_slot(
        &self,
        username: Option<&str>,
        user_id: Option<i64>,
        is_live: impl Fn(ConnId) -> bool,
    ) -> Result<Seat, &'static str> {
        let taken = |seat: Seat| self.occupant(seat).map_or(false, |conn| is_live(conn));
        let seat = match self.identity_matches(username, user_id) {
            [true, false] => Seat::One,
            [false, true] => Seat::Two,
            [true, true] => Seat::BOTH
                .into_iter()
                .find(|&seat| !taken(seat))
                .ok_or("both seats are taken")?,
            [false, false] => return Err("no seat matches your identity"),
        };
        if taken(seat) {
            return Err("seat is taken");
        }
        Ok(seat)
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            usernames: self.usernames(),
            paused: self.is_paused(),
            mode: self.session.mode(),
            open: self.open(),
            countdown: self.countdown(),
        }
    }

    pub fn saved_game(&self, seat: Seat) -> SavedGame {
        SavedGame {
            room_id: self.id,
            seat,
            usernames: self.usernames(),
            mode: self.session.mode(),
            paused: self.is_paused(),
            last_activity: self.last_activity,
        }
    }

    pub fn to_record(&self) -> RoomRecord {
        RoomRecord {
            id: self.id,
            kind: R::KIND,
            position: self.session.encode(),
            mode: self.session.mode(),
            usernames: self.usernames(),
            user_ids: [self.identities[0].user_id, self.identities[1].user_id],
            tokens: self.tokens.clone(),
            paused: self.phase != Phase::Active,
            last_activity: self.last_activity,
        }
    }

    /// Restored rooms come back paused with both seats empty.
    pub fn from_record(record: RoomRecord) -> Result<Self, PositionError> {
        let state = R::decode(&record.position)?;
        let [name_one, name_two] = record.usernames;
        let identities = [
            Identity {
                username: name_one,
                user_id: record.user_ids[0],
            },
            Identity {
                username: name_two,
                user_id: record.user_ids[1],
            },
        ];
        let tokens = if record.tokens.iter().all(|t| !t.is_empty()) {
            record.tokens
        } else {
            [Uuid::new_v4().to_string(), Uuid::new_v4().to_string()]
        };
        Ok(Self {
            id: record.id,
            seats: [None, None],
            session: GameSession::from_state(state, record.mode),
            identities,
            tokens,
            phase: Phase::Paused,
            last_activity: if record.last_activity > 0 {
                record.last_activity
            } else {
                now_millis()
            },
            rematch_votes: [false; 2],
        })
    }
}

/// Owns every room of one game variant.
pub struct RoomRegistry<R: Rules> {
    rooms: BTreeMap<RoomId, Room<R>>,
    next_id: RoomId,
}

impl<R: Rules> Default for RoomRegistry<R> {
    fn default() -> Self {
        Self {
            rooms: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<R: Rules> RoomRegistry<R> {
    pub fn create(&mut self, players: [ConnId; 2], identities: [Identity; 2], mode: LegalityMode) -> RoomId {
        let id = self.next_id;
        self.next_id += 1;
        self.rooms.insert(id, Room::new(id, players, identities, mode));
        id
    }

    pub fn get(&self, id: RoomId) -> Option<&Room<R>> {
        self.rooms.get(&id)
    }

    pub fn get_mut(&mut self, id: RoomId) -> Option<&mut Room<R>> {
        self.rooms.get_mut(&id)
    }

    pub fn remove(&mut self, id: RoomId) -> Option<Room<R>> {
        self.rooms.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room<R>> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn next_id(&self) -> RoomId {
        self.next_id
    }

    /// Inserts a restored room and keeps the id counter ahead of it.
    pub fn insert(&mut self, room: Room<R>) {
        self.next_id = self.next_id.max(room.id + 1);
        self.rooms.insert(room.id, room);
    }

    pub fn reserve_ids_from(&mut self, next_id: RoomId) {
        self.next_id = self.next_id.max(next_id).max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::connect_four::Board;

    fn identity(name: &str, user_id: Option<i64>) -> Identity {
        Identity {
            username: name.to_string(),
            user_id,
        }
    }

    fn room(names: [(&str, Option<i64>); 2]) -> Room<Board> {
        let mut room = Room::new(
            1,
            [Uuid::new_v4(), Uuid::new_v4()],
            [identity(names[0].0, names[0].1), identity(names[1].0, names[1].1)],
            LegalityMode::Strict,
        );
        room.vacate(Seat::One);
        room.vacate(Seat::Two);
        room
    }

    #[test]
    fn user_id_takes_precedence_over_username() {
        let room = room([("ann", Some(7)), ("bob", Some(9))]);
        assert_eq!(room.claim_slot(Some("ann"), Some(9), |_| true), Ok(Seat::Two));
        assert_eq!(room.claim_slot(Some("bob"), None, |_| true), Ok(Seat::Two));
        assert!(room.claim_slot(Some("eve"), Some(3), |_| true).is_err());
    }

    #[test]
    fn same_identity_in_both_seats_prefers_the_free_one() {
        let mut room = room([("ann", None), ("ann", None)]);
        room.bind(Seat::One, Uuid::new_v4());
        assert_eq!(room.claim_slot(Some("ann"), None, |_| true), Ok(Seat::Two));
        room.bind(Seat::Two, Uuid::new_v4());
        assert_eq!(room.claim_slot(Some("ann"), None, |_| true), Err("both seats are taken"));
        // A closed occupant does not hold the seat.
        assert_eq!(room.claim_slot(Some("ann"), None, |_| false), Ok(Seat::One));
    }

    #[test]
    fn live_occupant_blocks_a_claim() {
        let mut room = room([("ann", None), ("bob", None)]);
        room.bind(Seat::Two, Uuid::new_v4());
        assert_eq!(room.claim_slot(Some("bob"), None, |_| true), Err("seat is taken"));
    }

    #[test]
    fn record_round_trip_keeps_position_and_tokens() {
        let room = room([("ann", Some(1)), ("bob", None)]);
        let record = room.to_record();
        assert!(record.paused);
        let restored = Room::<Board>::from_record(record.clone()).unwrap();
        assert_eq!(restored.tokens, room.tokens);
        assert_eq!(restored.session.state(), room.session.state());
        assert_eq!(restored.open(), [false, false]);
        assert_eq!(restored.to_record(), record);
    }

    #[test]
    fn registry_ids_stay_ahead_of_restored_rooms() {
        let mut registry = RoomRegistry::<Board>::default();
        let mut restored = room([("ann", None), ("bob", None)]);
        restored.id = 12;
        registry.insert(restored);
        let id = registry.create(
            [Uuid::new_v4(), Uuid::new_v4()],
            [Identity::placeholder(Seat::One), Identity::placeholder(Seat::Two)],
            LegalityMode::Strict,
        );
        assert_eq!(id, 13);
        assert_eq!(registry.len(), 2);
    }
}
