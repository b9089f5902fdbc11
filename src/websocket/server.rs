//! One actor per game variant. Its mailbox serializes every lobby mutation,
//! so handlers never interleave.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use actix::prelude::*;
use log::{debug, error, info, warn};

use crate::game::Rules;
use crate::lobby::{ConnId, Effect, Lobby, LobbySettings, RoomId};
use crate::models::{ClientMessage, Deliver, RoomSummary, ServerMessage};
use crate::persistence::SnapshotStore;

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub id: ConnId,
    pub addr: Recipient<Deliver>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: ConnId,
}

/// A decoded frame from a connection.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Inbound {
    pub id: ConnId,
    pub msg: ClientMessage,
}

#[derive(Message)]
#[rtype(result = "Vec<RoomSummary>")]
pub struct ListRooms;

pub struct GameServer<R: Rules> {
    lobby: Lobby<R>,
    sessions: HashMap<ConnId, Recipient<Deliver>>,
    countdowns: HashMap<RoomId, SpawnHandle>,
    store: SnapshotStore,
    sweep_interval: Duration,
}

impl<R: Rules> GameServer<R> {
    pub fn new(settings: LobbySettings, store: SnapshotStore, sweep_interval: Duration) -> Self {
        Self {
            lobby: Lobby::new(settings),
            sessions: HashMap::new(),
            countdowns: HashMap::new(),
            store,
            sweep_interval,
        }
    }

    /// Loads whatever the store holds. An unreadable file is logged and the
    /// server starts empty.
    pub fn restored(mut self) -> Self {
        match self.store.load() {
            Ok(saved) => {
                self.lobby.restore(saved);
            }
            Err(e) => error!("Could not load {} snapshot: {}", R::KIND.slug(), e),
        }
        self
    }

    fn run(&mut self, effects: Vec<Effect>, ctx: &mut Context<Self>) {
        let mut persist = false;
        for effect in effects {
            match effect {
                Effect::Send { to, message } => self.send(to, &message),
                Effect::StartCountdown(room_id) => self.start_countdown(room_id, ctx),
                Effect::StopCountdown(room_id) => {
                    if let Some(handle) = self.countdowns.remove(&room_id) {
                        ctx.cancel_future(handle);
                    }
                }
                Effect::Persist => persist = true,
            }
        }
        if persist {
            self.persist();
        }
    }

    fn send(&self, to: ConnId, message: &ServerMessage) {
        let Some(addr) = self.sessions.get(&to) else {
            debug!("Dropping frame for closed connection {}", to);
            return;
        };
        match serde_json::to_string(message) {
            Ok(text) => addr.do_send(Deliver(text)),
            Err(e) => warn!("Error serializing message: {}", e),
        }
    }

    fn start_countdown(&mut self, room_id: RoomId, ctx: &mut Context<Self>) {
        if let Some(previous) = self.countdowns.remove(&room_id) {
            ctx.cancel_future(previous);
        }
        let handle = ctx.run_interval(Duration::from_secs(1), move |act, ctx| {
            let effects = act.lobby.countdown_tick(room_id);
            act.run(effects, ctx);
        });
        self.countdowns.insert(room_id, handle);
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.lobby.snapshot()) {
            error!("Could not save {} rooms: {}", R::KIND.slug(), e);
        }
    }
}

impl<R: Rules> Actor for GameServer<R> {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.run_interval(self.sweep_interval, |act, ctx| {
            let effects = act.lobby.sweep();
            act.run(effects, ctx);
        });
        if self.lobby.rooms().is_empty() {
            info!("{} server started", R::KIND.slug());
        } else {
            info!(
                "{} server started with {} saved rooms",
                R::KIND.slug(),
                self.lobby.rooms().len()
            );
        }
    }
}

impl<R: Rules> Handler<Connect> for GameServer<R> {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        self.sessions.insert(msg.id, msg.addr);
        self.lobby.connect(msg.id);
        info!("{} sessions: {}", R::KIND.slug(), self.sessions.len());
    }
}

impl<R: Rules> Handler<Disconnect> for GameServer<R> {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, ctx: &mut Context<Self>) {
        self.sessions.remove(&msg.id);
        let effects = self.lobby.disconnect(msg.id);
        self.run(effects, ctx);
    }
}

impl<R: Rules> Handler<Inbound> for GameServer<R> {
    type Result = ();

    fn handle(&mut self, msg: Inbound, ctx: &mut Context<Self>) {
        let effects = self.lobby.handle(msg.id, msg.msg, Instant::now());
        self.run(effects, ctx);
    }
}

impl<R: Rules> Handler<ListRooms> for GameServer<R> {
    type Result = MessageResult<ListRooms>;

    fn handle(&mut self, _: ListRooms, _: &mut Context<Self>) -> Self::Result {
        MessageResult(self.lobby.summaries())
    }
}
