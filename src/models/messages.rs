use actix::Message;
use serde::{Deserialize, Serialize};

use crate::game::{LegalityMode, MoveRequest, MoveSummary, Seat, Status};
use crate::lobby::RoomId;

/// Message sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinQueue {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        user_id: Option<i64>,
        #[serde(default)]
        mode: LegalityMode,
    },
    MakeMove(MoveRequest),
    LegalMoves {
        #[serde(default)]
        cell: String,
    },
    Leave,
    Chat {
        text: String,
    },
    Resume {
        room_id: RoomId,
        token: String,
    },
    /// Reclaim a seat by identity; without a room id the most recent
    /// matching room is used.
    Claim {
        #[serde(default)]
        room_id: Option<RoomId>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        user_id: Option<i64>,
        #[serde(default)]
        other_username: Option<String>,
    },
    ListSaved {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        user_id: Option<i64>,
    },
    FinishSaved {
        room_id: RoomId,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        user_id: Option<i64>,
    },
    RematchVote,
    SetUsername {
        username: String,
    },
}

/// Message sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Queued {
        mode: LegalityMode,
    },
    Paired {
        room_id: RoomId,
        seat: Seat,
        usernames: [String; 2],
        mode: LegalityMode,
        countdown: u8,
        token: String,
    },
    Countdown {
        value: u8,
    },
    /// Authoritative snapshot sent when a countdown reaches zero.
    Start {
        room_id: RoomId,
        seat: Seat,
        token: String,
        position: String,
        turn: Seat,
        status: Status,
    },
    Update {
        position: String,
        turn: Seat,
        status: Status,
        last_move: Option<MoveSummary>,
    },
    Moves {
        from: String,
        moves: Vec<MoveSummary>,
    },
    Presence {
        open: [bool; 2],
    },
    PlayerLeft {
        seat: Seat,
    },
    PlayerBack {
        seat: Seat,
    },
    OpponentLeft,
    SavedDenied {
        reason: String,
    },
    SavedQueued {
        room_id: RoomId,
        seat: Seat,
        usernames: [String; 2],
        token: String,
    },
    SavedRemoved {
        room_id: RoomId,
    },
    MySavedGames {
        games: Vec<SavedGame>,
    },
    Chat {
        seat: Seat,
        username: String,
        text: String,
    },
    Rejected {
        reason: String,
    },
    RematchUpdate {
        votes: [bool; 2],
    },
    Usernames {
        usernames: [String; 2],
    },
}

/// Entry of a `my_saved_games` listing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SavedGame {
    pub room_id: RoomId,
    pub seat: Seat,
    pub usernames: [String; 2],
    pub mode: LegalityMode,
    pub paused: bool,
    pub last_activity: i64,
}

/// Public room listing served over HTTP.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub usernames: [String; 2],
    pub paused: bool,
    pub mode: LegalityMode,
    pub open: [bool; 2],
    pub countdown: Option<u8>,
}

/// Serialized frame pushed to one websocket session.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct Deliver(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_are_tagged() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"make_move","from":"e7","to":"e8","promotion":"n"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::MakeMove(MoveRequest {
                from: Some("e7".into()),
                to: "e8".into(),
                promotion: Some("n".into()),
            })
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"join_queue"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinQueue {
                username: None,
                user_id: None,
                mode: LegalityMode::Strict,
            }
        );

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"resign"}"#).is_err());
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::Presence { open: [true, false] }).unwrap();
        assert_eq!(json["type"], "presence");
        assert_eq!(json["open"][1], false);

        let json = serde_json::to_value(ServerMessage::PlayerLeft { seat: Seat::Two }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "player_left", "seat": 2}));
    }
}
