pub mod config;
pub mod error;
pub mod game;
pub mod lobby;
pub mod models;
pub mod persistence;
pub mod routes;
pub mod websocket;
