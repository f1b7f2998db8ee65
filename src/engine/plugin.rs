//! The narrow contract the session uses to reach the authoritative rules
//! engine.
//!
//! The engine owns legality, the canonical board, the player and piece lists
//! and the turn history. The session only ever reads those through this
//! trait and submits placements to it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::error::RejectReason;
use crate::engine::models::*;

pub trait RulesEngine: Send {
    fn board(&self) -> Board;

    fn players(&self) -> Vec<Player>;

    /// All pieces of all owners.
    fn pieces(&self) -> Vec<Piece>;

    /// Pieces of `player` that have not been placed yet.
    fn available_pieces(&self, player: PlayerId) -> Vec<Piece>;

    /// Check and, if legal, apply a placement. An accepted placement returns
    /// the complete new board plus the turn recorded for it.
    fn place(&mut self, request: &PlacementRequest) -> Result<PlacementAccepted, RejectReason>;

    /// Turn history, oldest first.
    fn turns(&self) -> Vec<Turn>;

    /// Player expected to move next, when the engine tracks it.
    fn current_player(&self) -> Option<PlayerId> {
        None
    }

    /// Bundle every read a resync needs.
    fn snapshot(&self) -> EngineSnapshot {
        let players = self.players();
        let available = players
            .iter()
            .flat_map(|p| self.available_pieces(p.id))
            .collect();
        EngineSnapshot {
            board: self.board(),
            pieces: self.pieces(),
            turns: self.turns(),
            players,
            available,
        }
    }
}

/// One engine shared by several in-process sessions.
pub struct SharedEngine<E> {
    inner: Arc<Mutex<E>>,
}

impl<E> Clone for SharedEngine<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: RulesEngine> SharedEngine<E> {
    pub fn new(engine: E) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine. A poisoned lock still yields the engine: its state
    /// only changes inside `place`, which never panics halfway.
    pub fn lock(&self) -> MutexGuard<'_, E> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: RulesEngine> RulesEngine for SharedEngine<E> {
    fn board(&self) -> Board {
        self.lock().board()
    }

    fn players(&self) -> Vec<Player> {
        self.lock().players()
    }

    fn pieces(&self) -> Vec<Piece> {
        self.lock().pieces()
    }

    fn available_pieces(&self, player: PlayerId) -> Vec<Piece> {
        self.lock().available_pieces(player)
    }

    fn place(&mut self, request: &PlacementRequest) -> Result<PlacementAccepted, RejectReason> {
        self.lock().place(request)
    }

    fn turns(&self) -> Vec<Turn> {
        self.lock().turns()
    }

    fn current_player(&self) -> Option<PlayerId> {
        self.lock().current_player()
    }

    fn snapshot(&self) -> EngineSnapshot {
        self.lock().snapshot()
    }
}
