//! Crash-survivable room snapshots: one JSON document per game variant,
//! rewritten whole after every mutation.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::game::{GameKind, LegalityMode};
use crate::lobby::RoomId;

/// Logical snapshot of one room.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: RoomId,
    pub kind: GameKind,
    pub position: String,
    #[serde(default)]
    pub mode: LegalityMode,
    pub usernames: [String; 2],
    #[serde(default)]
    pub user_ids: [Option<i64>; 2],
    pub tokens: [String; 2],
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub last_activity: i64,
}

/// File contents. Rooms stay untyped here so one corrupt record can be
/// skipped without losing the rest.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SavedRooms {
    #[serde(default)]
    pub next_room_id: RoomId,
    #[serde(default)]
    pub rooms: Vec<serde_json::Value>,
}

/// Where one variant's snapshot lives. A store without a path keeps
/// nothing, which is what tests use.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    path: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn in_dir(dir: &Path, kind: GameKind) -> Self {
        Self::new(dir.join(format!("{}.rooms.json", kind.slug())))
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// A missing file is an empty snapshot.
    pub fn load(&self) -> Result<SavedRooms, PersistError> {
        let Some(path) = &self.path else {
            return Ok(SavedRooms::default());
        };
        if !path.exists() {
            info!("No snapshot at {}, starting empty", path.display());
            return Ok(SavedRooms::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes to a sibling temp file, then renames over the old snapshot.
    pub fn save(&self, saved: &SavedRooms) -> Result<(), PersistError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_vec(saved)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        debug!("Saved {} rooms to {}", saved.rooms.len(), path.display());
        Ok(())
    }
}
