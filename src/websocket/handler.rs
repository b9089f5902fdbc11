use std::time::Duration;

use actix::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::game::Rules;
use crate::lobby::ConnId;
use crate::models::{ClientMessage, Deliver};
use crate::websocket::server::{Connect, Disconnect, GameServer, Inbound};

/// One websocket connection. Holds no game state; every decoded frame goes
/// to the variant's server actor.
pub struct WsSession<R: Rules> {
    pub id: ConnId,
    server: Addr<GameServer<R>>,
    heartbeat: Duration,
    awaiting_pong: bool,
}

impl<R: Rules> WsSession<R> {
    pub fn new(server: Addr<GameServer<R>>, heartbeat: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            server,
            heartbeat,
            awaiting_pong: false,
        }
    }

    /// Pings every interval; a connection that did not answer the previous
    /// ping is closed.
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat, |act, ctx| {
            if act.heartbeat_missed() {
                info!("Heartbeat missed, closing {}", act.id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Called once per interval. True when the previous ping went
    /// unanswered; otherwise arms the check for the ping about to be sent.
    fn heartbeat_missed(&mut self) -> bool {
        if self.awaiting_pong {
            return true;
        }
        self.awaiting_pong = true;
        false
    }

    fn heard_from_peer(&mut self) {
        self.awaiting_pong = false;
    }
}

impl<R: Rules> Actor for WsSession<R> {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);
        self.server.do_send(Connect {
            id: self.id,
            addr: ctx.address().recipient(),
        });
        info!("WebSocket connection started: {} ({})", self.id, R::KIND.slug());
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        self.server.do_send(Disconnect { id: self.id });
        info!("WebSocket connection closed: {}", self.id);
        Running::Stop
    }
}

impl<R: Rules> Handler<Deliver> for WsSession<R> {
    type Result = ();

    fn handle(&mut self, msg: Deliver, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl<R: Rules> StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession<R> {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.heard_from_peer();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.heard_from_peer();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_ref()) {
                Ok(client_msg) => {
                    debug!("{} sent {:?}", self.id, client_msg);
                    self.server.do_send(Inbound {
                        id: self.id,
                        msg: client_msg,
                    });
                }
                Err(e) => debug!("Dropping malformed frame from {}: {}", self.id, e),
            },
            Ok(ws::Message::Binary(_)) => {
                debug!("Binary messages are not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                warn!("Protocol error on {}: {}", self.id, e);
                ctx.stop();
            }
        }
    }
}

/// Upgrades to a websocket bound to the server actor of variant `R`.
pub async fn ws_index<R: Rules>(
    req: HttpRequest,
    stream: web::Payload,
    server: web::Data<Addr<GameServer<R>>>,
    config: web::Data<Config>,
) -> Result<HttpResponse, Error> {
    let session = WsSession::new(server.get_ref().clone(), config.heartbeat_interval);
    ws::start(session, &req, stream)
}
