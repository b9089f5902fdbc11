pub mod handler;
pub mod server;

pub use handler::{ws_index, WsSession};
pub use server::{Connect, Disconnect, GameServer, Inbound, ListRooms};
