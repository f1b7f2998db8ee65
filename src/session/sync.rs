//! Applies turns relayed by other clients and reloads everything from the
//! engine when the turn order has a hole.
//!
//! Turns are applied strictly by sequence number. A duplicate is dropped; a
//! gap is never patched locally, it is answered with a full resync.

use serde::{Deserialize, Serialize};

use crate::engine::error::{MalformedSnapshot, RelayError, SyncIssue};
use crate::engine::models::{Board, EngineSnapshot, PlacementAccepted, Turn};
use crate::session::workflow::{check_snapshot, Session};

/// Messages exchanged on the relay channel.
///
/// Wire form: `{"type": "turn", "turn": {...}, "board": [[...], ...]}`. The
/// board is the snapshot the sender applied after the turn, so receivers
/// replace their board with it instead of recomputing the placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    Turn { turn: Turn, board: Board },
}

impl ChannelMessage {
    pub fn turn(turn: Turn, board: Board) -> Self {
        ChannelMessage::Turn { turn, board }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            ChannelMessage::Turn { turn, .. } => turn.sequence,
        }
    }

    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(RelayError::Encode)
    }

    pub fn decode(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text).map_err(RelayError::Decode)
    }
}

/// Consecutive malformed snapshots tolerated before a resync is given up.
pub const MAX_RESYNC_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome {
    Applied(Turn),
    /// Already applied; dropped.
    Duplicate { sequence: u64 },
    /// Not applied; local state must be refetched from the engine.
    ResyncRequired(SyncIssue),
}

/// What a resync snapshot did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied { last_sequence: u64 },
    /// Older than the local history. Nothing changed.
    Stale { local: u64, snapshot: u64 },
}

impl Session {
    /// Apply a turn another client had accepted by the engine. The engine is
    /// not consulted again and the local selection is left alone.
    pub fn apply_remote_turn(&mut self, message: ChannelMessage) -> RemoteOutcome {
        let ChannelMessage::Turn { turn, board } = message;
        let sequence = turn.sequence;
        match self.apply_accepted(PlacementAccepted {
            board,
            turn: turn.clone(),
        }) {
            Ok(true) => RemoteOutcome::Applied(turn),
            Ok(false) => {
                tracing::debug!(sequence, "dropping duplicate relayed turn");
                RemoteOutcome::Duplicate { sequence }
            }
            Err(issue) => {
                tracing::warn!(sequence, issue = %issue, "relayed turn not applicable, resync needed");
                RemoteOutcome::ResyncRequired(issue)
            }
        }
    }

    /// Decode and apply a raw relay frame. Undecodable frames mean lost
    /// information, so they also call for a resync.
    pub fn apply_relay_frame(&mut self, text: &str) -> RemoteOutcome {
        match ChannelMessage::decode(text) {
            Ok(message) => self.apply_remote_turn(message),
            Err(e) => {
                tracing::warn!(error = %e, "undecodable relay frame");
                RemoteOutcome::ResyncRequired(SyncIssue::ChannelLoss)
            }
        }
    }

    /// Replace every cached engine copy with `snapshot`.
    ///
    /// A snapshot whose history ends before the local one was taken before
    /// turns this session already applied; it is ignored so history never
    /// moves backwards. Otherwise the selection survives where it still
    /// makes sense: the same player (refreshed from the new list, else the
    /// first player), the same piece if it still exists, the hover position
    /// as is. A placement in flight stays in flight; its reply is still
    /// applied when it arrives.
    pub fn apply_snapshot(&mut self, snapshot: EngineSnapshot) -> Result<SnapshotOutcome, MalformedSnapshot> {
        check_snapshot(&snapshot, self.dimension())?;

        let local = self.last_sequence();
        let received = snapshot.turns.last().map(|t| t.sequence).unwrap_or(0);
        if received < local {
            tracing::info!(local, snapshot = received, "ignoring snapshot older than local history");
            return Ok(SnapshotOutcome::Stale {
                local,
                snapshot: received,
            });
        }

        let selected_player = self.selection.selected_player().id;
        let selected_piece = self.selection.selected_piece().map(|p| p.key());

        self.grid.replace(snapshot.board);
        self.players = snapshot.players;
        self.pieces = snapshot.pieces;
        self.available = snapshot.available;
        self.turns = snapshot.turns;

        let player = self
            .players
            .iter()
            .find(|p| p.id == selected_player)
            .unwrap_or(&self.players[0])
            .clone();
        self.selection.select_player(player);
        match selected_piece.and_then(|key| self.pieces.iter().find(|p| p.key() == key)) {
            Some(piece) => {
                self.selection.select_piece(piece.clone());
            }
            None => self.selection.clear_piece(),
        }

        tracing::info!(last_sequence = received, "resynced from engine");
        Ok(SnapshotOutcome::Applied {
            last_sequence: received,
        })
    }
}
