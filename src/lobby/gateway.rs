use std::time::Instant;

use log::{debug, info, warn};

use super::{clean_username, ConnId, Effect, Lobby, Phase, RoomId};
use crate::error::GatewayError;
use crate::game::{LegalityMode, MoveRequest, Rules, Seat};
use crate::models::{ClientMessage, ServerMessage};

type Handled = Result<(), GatewayError>;

impl<R: Rules> Lobby<R> {
    /// Dispatches one decoded client message. Failures are answered only to
    /// `conn`; protocol errors are dropped without a reply.
    pub fn handle(&mut self, conn: ConnId, msg: ClientMessage, now: Instant) -> Vec<Effect> {
        let saved_flow = matches!(
            msg,
            ClientMessage::Resume { .. } | ClientMessage::Claim { .. } | ClientMessage::FinishSaved { .. }
        );
        let mut out = Vec::new();
        let result = match msg {
            ClientMessage::JoinQueue {
                username,
                user_id,
                mode,
            } => self.join_queue(conn, username, user_id, mode, &mut out),
            ClientMessage::MakeMove(request) => self.make_move(conn, &request, &mut out),
            ClientMessage::LegalMoves { cell } => self.legal_moves(conn, cell, &mut out),
            ClientMessage::Leave => self.leave(conn, &mut out),
            ClientMessage::Chat { text } => self.chat(conn, &text, now, &mut out),
            ClientMessage::Resume { room_id, token } => self.resume(conn, room_id, &token, &mut out),
            ClientMessage::Claim {
                room_id,
                username,
                user_id,
                other_username,
            } => self.claim(conn, room_id, username, user_id, other_username, &mut out),
            ClientMessage::ListSaved { username, user_id } => self.list_saved(conn, username, user_id, &mut out),
            ClientMessage::FinishSaved {
                room_id,
                username,
                user_id,
            } => self.finish_saved(conn, room_id, username, user_id, &mut out),
            ClientMessage::RematchVote => self.rematch_vote(conn, &mut out),
            ClientMessage::SetUsername { username } => self.set_username(conn, &username, &mut out),
        };

        match result {
            Ok(()) => out,
            Err(GatewayError::Protocol(reason)) => {
                debug!("Dropped message from {}: {}", conn, reason);
                Vec::new()
            }
            Err(err) => {
                warn!("Denied {}: {}", conn, err);
                let reason = err.to_string();
                let message = if saved_flow {
                    ServerMessage::SavedDenied { reason }
                } else {
                    ServerMessage::Rejected { reason }
                };
                vec![Effect::Send { to: conn, message }]
            }
        }
    }

    fn seat_binding(&self, conn: ConnId) -> Result<(RoomId, Seat), GatewayError> {
        self.connections
            .get(&conn)
            .ok_or_else(|| GatewayError::Protocol("unknown connection".into()))?
            .binding
            .ok_or(GatewayError::Unauthorized("you are not seated in a room"))
    }

    fn join_queue(
        &mut self,
        conn: ConnId,
        username: Option<String>,
        user_id: Option<i64>,
        mode: LegalityMode,
        out: &mut Vec<Effect>,
    ) -> Handled {
        let ctx = self
            .connections
            .get_mut(&conn)
            .ok_or_else(|| GatewayError::Protocol("unknown connection".into()))?;
        if ctx.binding.is_some() {
            return Err(GatewayError::Protocol("already seated".into()));
        }
        if let Some(name) = username.as_deref().and_then(clean_username) {
            ctx.username = Some(name);
        }
        if user_id.is_some() {
            ctx.user_id = user_id;
        }
        ctx.mode = mode;
        self.queue.enqueue(conn, mode);
        out.push(Effect::Send {
            to: conn,
            message: ServerMessage::Queued { mode },
        });
        debug!("{} queued {} ({:?})", R::KIND.slug(), conn, mode);
        self.try_pair(out);
        Ok(())
    }

    fn make_move(&mut self, conn: ConnId, request: &MoveRequest, out: &mut Vec<Effect>) -> Handled {
        let (room_id, seat) = self.seat_binding(conn)?;
        let room = self.rooms.get_mut(room_id).ok_or(GatewayError::StaleRoom(room_id))?;
        if room.phase != Phase::Active {
            return Err(GatewayError::Unauthorized("game is not active"));
        }
        let outcome = room.session.apply_player_move(seat, request)?;
        room.touch();
        info!(
            "{} room {} seat {} played {:?} -> {:?}",
            R::KIND.slug(),
            room_id,
            seat,
            outcome.summary,
            outcome.status
        );
        let update = ServerMessage::Update {
            position: room.session.encode(),
            turn: room.session.turn(),
            status: outcome.status,
            last_move: Some(outcome.summary),
        };
        Self::broadcast(room, &update, out);
        out.push(Effect::Persist);
        Ok(())
    }

    fn legal_moves(&mut self, conn: ConnId, cell: String, out: &mut Vec<Effect>) -> Handled {
        let (room_id, seat) = self.seat_binding(conn)?;
        let room = self.rooms.get_mut(room_id).ok_or(GatewayError::StaleRoom(room_id))?;
        if room.phase != Phase::Active {
            return Err(GatewayError::Protocol("game is not active".into()));
        }
        let moves = if room.session.turn() == seat {
            room.session.legal_moves_from(&cell)
        } else {
            Vec::new()
        };
        out.push(Effect::Send {
            to: conn,
            message: ServerMessage::Moves { from: cell, moves },
        });
        Ok(())
    }

    fn leave(&mut self, conn: ConnId, out: &mut Vec<Effect>) -> Handled {
        self.queue.remove(conn);
        let Some((room_id, seat)) = self.connections.get(&conn).and_then(|ctx| ctx.binding) else {
            return Ok(());
        };
        self.release_seat(conn, room_id, seat, out);
        self.unbind(conn);
        Ok(())
    }

    fn chat(&mut self, conn: ConnId, text: &str, now: Instant, out: &mut Vec<Effect>) -> Handled {
        let min_interval = self.settings.chat_min_interval;
        let max_chars = self.settings.chat_max_chars;
        let ctx = self
            .connections
            .get_mut(&conn)
            .ok_or_else(|| GatewayError::Protocol("unknown connection".into()))?;
        let (room_id, seat) = ctx
            .binding
            .ok_or_else(|| GatewayError::Protocol("chat outside a room".into()))?;
        if let Some(last) = ctx.last_chat {
            if now.saturating_duration_since(last) < min_interval {
                return Err(GatewayError::Protocol("chat rate limited".into()));
            }
        }
        let text: String = text.trim().chars().take(max_chars).collect();
        if text.is_empty() {
            return Err(GatewayError::Protocol("empty chat".into()));
        }
        let room = self.rooms.get(room_id).ok_or(GatewayError::StaleRoom(room_id))?;
        if let Phase::Countdown(_) = room.phase {
            return Err(GatewayError::Protocol("chat during countdown".into()));
        }
        ctx.last_chat = Some(now);
        let username = room.identities[seat.index()].username.clone();
        Self::broadcast(room, &ServerMessage::Chat { seat, username, text }, out);
        Ok(())
    }

    fn resume(&mut self, conn: ConnId, room_id: RoomId, token: &str, out: &mut Vec<Effect>) -> Handled {
        self.ensure_unseated(conn)?;
        self.queue.remove(conn);
        let room = self.rooms.get(room_id).ok_or(GatewayError::StaleRoom(room_id))?;
        let seat = room
            .seat_for_token(token.trim())
            .ok_or(GatewayError::Unauthorized("invalid reconnection token"))?;
        if let Some(holder) = room.occupant(seat) {
            if holder != conn && self.is_open(holder) {
                return Err(GatewayError::Unauthorized("seat is taken"));
            }
        }
        self.seat_connection(conn, room_id, seat, out);
        Ok(())
    }

    fn claim(
        &mut self,
        conn: ConnId,
        room_id: Option<RoomId>,
        username: Option<String>,
        user_id: Option<i64>,
        other_username: Option<String>,
        out: &mut Vec<Effect>,
    ) -> Handled {
        self.ensure_unseated(conn)?;
        self.queue.remove(conn);
        let (name, uid) = self.identity_of(conn, username, user_id);
        if name.is_none() && uid.is_none() {
            return Err(GatewayError::Unauthorized("an identity is required"));
        }

        let room_id = match room_id.filter(|id| self.rooms.get(*id).is_some()) {
            Some(id) => id,
            None => {
                let other = other_username.as_deref().and_then(clean_username);
                self.most_recent_room_for(name.as_deref(), uid, other.as_deref())
                    .ok_or(match room_id {
                        Some(id) => GatewayError::StaleRoom(id),
                        None => GatewayError::Unauthorized("no saved game matches your identity"),
                    })?
            }
        };

        let connections = &self.connections;
        let room = self.rooms.get_mut(room_id).ok_or(GatewayError::StaleRoom(room_id))?;
        let seat = room
            .claim_slot(name.as_deref(), uid, |holder| connections.contains_key(&holder))
            .map_err(GatewayError::Unauthorized)?;
        let identity = &mut room.identities[seat.index()];
        if let Some(uid) = uid {
            identity.user_id = Some(uid);
        }
        if let Some(name) = name {
            identity.username = name;
        }
        self.seat_connection(conn, room_id, seat, out);
        Ok(())
    }

    fn list_saved(
        &mut self,
        conn: ConnId,
        username: Option<String>,
        user_id: Option<i64>,
        out: &mut Vec<Effect>,
    ) -> Handled {
        let (name, uid) = self.identity_of(conn, username, user_id);
        let games = self
            .rooms
            .iter()
            .filter_map(|room| {
                let matches = room.identity_matches(name.as_deref(), uid);
                let seat = Seat::BOTH.into_iter().find(|seat| matches[seat.index()])?;
                Some(room.saved_game(seat))
            })
            .collect();
        out.push(Effect::Send {
            to: conn,
            message: ServerMessage::MySavedGames { games },
        });
        Ok(())
    }

    fn finish_saved(
        &mut self,
        conn: ConnId,
        room_id: RoomId,
        username: Option<String>,
        user_id: Option<i64>,
        out: &mut Vec<Effect>,
    ) -> Handled {
        let (name, uid) = self.identity_of(conn, username, user_id);
        let room = self.rooms.get(room_id).ok_or(GatewayError::StaleRoom(room_id))?;
        if !room.identity_matches(name.as_deref(), uid).contains(&true) {
            return Err(GatewayError::Unauthorized("not a player of this room"));
        }
        let occupants: Vec<ConnId> = room.occupants().map(|(_, holder)| holder).collect();
        if room.countdown().is_some() {
            out.push(Effect::StopCountdown(room_id));
        }
        self.rooms.remove(room_id);
        for holder in &occupants {
            self.unbind(*holder);
            if *holder != conn {
                out.push(Effect::Send {
                    to: *holder,
                    message: ServerMessage::SavedRemoved { room_id },
                });
            }
        }
        out.push(Effect::Send {
            to: conn,
            message: ServerMessage::SavedRemoved { room_id },
        });
        out.push(Effect::Persist);
        info!("{} room {} finished by {}", R::KIND.slug(), room_id, conn);
        Ok(())
    }

    fn rematch_vote(&mut self, conn: ConnId, out: &mut Vec<Effect>) -> Handled {
        let (room_id, seat) = self.seat_binding(conn)?;
        let room = self.rooms.get_mut(room_id).ok_or(GatewayError::StaleRoom(room_id))?;
        if !room.session.is_over() {
            return Err(GatewayError::Unauthorized("the game is still in progress"));
        }
        room.rematch_votes[seat.index()] = true;
        // The deciding vote is announced by the reset board alone.
        if room.rematch_votes != [true, true] {
            Self::broadcast(
                room,
                &ServerMessage::RematchUpdate {
                    votes: room.rematch_votes,
                },
                out,
            );
        } else {
            room.session.reset();
            room.rematch_votes = [false; 2];
            room.touch();
            let update = ServerMessage::Update {
                position: room.session.encode(),
                turn: room.session.turn(),
                status: room.session.status(),
                last_move: None,
            };
            Self::broadcast(room, &update, out);
            out.push(Effect::Persist);
            info!("{} room {} rematch started", R::KIND.slug(), room_id);
        }
        Ok(())
    }

    fn set_username(&mut self, conn: ConnId, username: &str, out: &mut Vec<Effect>) -> Handled {
        let name = clean_username(username).ok_or_else(|| GatewayError::Protocol("empty username".into()))?;
        let ctx = self
            .connections
            .get_mut(&conn)
            .ok_or_else(|| GatewayError::Protocol("unknown connection".into()))?;
        ctx.username = Some(name.clone());
        let Some((room_id, seat)) = ctx.binding else {
            return Ok(());
        };
        let room = self.rooms.get_mut(room_id).ok_or(GatewayError::StaleRoom(room_id))?;
        room.identities[seat.index()].username = name;
        Self::broadcast(
            room,
            &ServerMessage::Usernames {
                usernames: room.usernames(),
            },
            out,
        );
        out.push(Effect::Persist);
        Ok(())
    }

    fn ensure_unseated(&self, conn: ConnId) -> Handled {
        let ctx = self
            .connections
            .get(&conn)
            .ok_or_else(|| GatewayError::Protocol("unknown connection".into()))?;
        match ctx.binding {
            Some(_) => Err(GatewayError::Unauthorized("you are already seated in a room")),
            None => Ok(()),
        }
    }

    /// Identity from the message, falling back to what the connection told
    /// us earlier.
    fn identity_of(&self, conn: ConnId, username: Option<String>, user_id: Option<i64>) -> (Option<String>, Option<i64>) {
        let ctx = self.connections.get(&conn);
        let name = username
            .as_deref()
            .and_then(clean_username)
            .or_else(|| ctx.and_then(|c| c.username.clone()));
        let uid = user_id.or_else(|| ctx.and_then(|c| c.user_id));
        (name, uid)
    }

    /// Latest room holding this identity, paused rooms first.
    fn most_recent_room_for(&self, name: Option<&str>, uid: Option<i64>, other: Option<&str>) -> Option<RoomId> {
        let mut candidates: Vec<_> = self
            .rooms
            .iter()
            .filter(|room| room.identity_matches(name, uid).contains(&true))
            .filter(|room| other.map_or(true, |other| room.usernames().iter().any(|u| u == other)))
            .collect();
        candidates.sort_by(|a, b| b.last_activity.cmp(&a.last_activity).then(b.id.cmp(&a.id)));
        candidates
            .iter()
            .find(|room| room.is_paused())
            .or_else(|| candidates.first())
            .map(|room| room.id)
    }

    /// Binds `conn` to `seat`, tells everyone, and restarts the countdown
    /// once both seats are filled.
    fn seat_connection(&mut self, conn: ConnId, room_id: RoomId, seat: Seat, out: &mut Vec<Effect>) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        room.bind(seat, conn);
        if room.phase == Phase::Active {
            room.phase = Phase::Paused;
        }
        out.push(Effect::Send {
            to: conn,
            message: ServerMessage::SavedQueued {
                room_id,
                seat,
                usernames: room.usernames(),
                token: room.token(seat).to_string(),
            },
        });
        if let Some(other) = room.occupant(seat.other()) {
            out.push(Effect::Send {
                to: other,
                message: ServerMessage::PlayerBack { seat },
            });
        }
        Self::presence(room, out);
        let ready = room.is_full() && room.countdown().is_none();
        if let Some(ctx) = self.connections.get_mut(&conn) {
            ctx.binding = Some((room_id, seat));
        }
        info!("{} room {} seat {} reclaimed by {}", R::KIND.slug(), room_id, seat, conn);
        if ready {
            self.begin_countdown(room_id, out);
        }
        out.push(Effect::Persist);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::connect_four::Board;
    use crate::lobby::LobbySettings;
    use std::time::Duration;
    use uuid::Uuid;

    fn sent_to(effects: &[Effect], conn: ConnId) -> Vec<ServerMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Send { to, message } if *to == conn => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn seated_pair(lobby: &mut Lobby<Board>) -> (ConnId, ConnId, RoomId) {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Instant::now();
        for conn in [a, b] {
            lobby.connect(conn);
            lobby.handle(
                conn,
                ClientMessage::JoinQueue {
                    username: None,
                    user_id: None,
                    mode: LegalityMode::Strict,
                },
                now,
            );
        }
        let (room_id, _) = lobby.connection(a).and_then(|c| c.binding).unwrap();
        (a, b, room_id)
    }

    #[test]
    fn protocol_errors_are_silent() {
        let mut lobby = Lobby::<Board>::default();
        let a = Uuid::new_v4();
        lobby.connect(a);
        let effects = lobby.handle(a, ClientMessage::Chat { text: "hi".into() }, Instant::now());
        assert!(effects.is_empty());
    }

    #[test]
    fn moves_before_start_are_rejected() {
        let mut lobby = Lobby::<Board>::default();
        let (a, _, _) = seated_pair(&mut lobby);
        let effects = lobby.handle(
            a,
            ClientMessage::MakeMove(MoveRequest {
                from: None,
                to: "3".into(),
                promotion: None,
            }),
            Instant::now(),
        );
        assert!(matches!(
            sent_to(&effects, a).as_slice(),
            [ServerMessage::Rejected { .. }]
        ));
    }

    #[test]
    fn chat_is_rate_limited_and_truncated() {
        let settings = LobbySettings {
            countdown: 1,
            ..LobbySettings::default()
        };
        let mut lobby = Lobby::<Board>::new(settings);
        let (a, b, room_id) = seated_pair(&mut lobby);
        lobby.countdown_tick(room_id);

        let start = Instant::now();
        let long = "x".repeat(200);
        let effects = lobby.handle(a, ClientMessage::Chat { text: long }, start);
        match sent_to(&effects, b).as_slice() {
            [ServerMessage::Chat { text, seat, .. }] => {
                assert_eq!(text.chars().count(), 80);
                assert_eq!(*seat, Seat::One);
            }
            other => panic!("unexpected {:?}", other),
        }

        let effects = lobby.handle(a, ClientMessage::Chat { text: "again".into() }, start + Duration::from_millis(100));
        assert!(effects.is_empty());
        let effects = lobby.handle(a, ClientMessage::Chat { text: "again".into() }, start + Duration::from_millis(800));
        assert_eq!(sent_to(&effects, b).len(), 1);
    }

    #[test]
    fn chat_during_countdown_is_dropped() {
        let mut lobby = Lobby::<Board>::default();
        let (a, _, _) = seated_pair(&mut lobby);
        let effects = lobby.handle(a, ClientMessage::Chat { text: "hello".into() }, Instant::now());
        assert!(effects.is_empty());
    }

    #[test]
    fn set_username_updates_the_seat() {
        let settings = LobbySettings {
            countdown: 1,
            ..LobbySettings::default()
        };
        let mut lobby = Lobby::<Board>::new(settings);
        let (a, b, room_id) = seated_pair(&mut lobby);
        let long = "n".repeat(60);
        let effects = lobby.handle(a, ClientMessage::SetUsername { username: long }, Instant::now());
        match sent_to(&effects, b).as_slice() {
            [ServerMessage::Usernames { usernames }] => {
                assert_eq!(usernames[0].len(), 40);
                assert_eq!(usernames[1], "Player 2");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(lobby.room(room_id).unwrap().identities[0].username.len(), 40);
    }
}
