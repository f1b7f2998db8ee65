//! In-memory stand-in for the rules engine.
//!
//! Checks only that a piece is the player's own and unplaced, fits on the
//! board, lands on empty cells and (optionally) comes from the player whose
//! turn it is. Corner contact, first-move corners and scoring are not
//! modelled; this is a harness for the session, not the game.

use std::collections::HashSet;

use crate::engine::error::RejectReason;
use crate::engine::models::*;
use crate::engine::plugin::RulesEngine;
use crate::games::catalog::{piece_set, STANDARD_SHAPES};
use crate::session::geometry::footprint_at;

#[derive(Debug, Clone)]
pub struct SandboxEngine {
    board: Board,
    players: Vec<Player>,
    pieces: Vec<Piece>,
    placed: HashSet<PieceKey>,
    turns: Vec<Turn>,
    current: usize,
    enforce_turn_order: bool,
}

impl SandboxEngine {
    /// Standard piece set for each named player, ids 0.. in order.
    pub fn new(dimension: usize, names: &[String]) -> Self {
        Self::with_shapes(dimension, names, &STANDARD_SHAPES)
    }

    pub fn with_shapes(dimension: usize, names: &[String], shapes: &[Shape]) -> Self {
        let players: Vec<Player> = names
            .iter()
            .enumerate()
            .map(|(i, name)| Player::new(i as PlayerId, name.clone()))
            .collect();
        let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
        Self {
            board: Board::empty(dimension),
            pieces: piece_set(&ids, shapes),
            players,
            placed: HashSet::new(),
            turns: Vec::new(),
            current: 0,
            enforce_turn_order: true,
        }
    }

    /// Accept placements from any player at any time.
    pub fn without_turn_order(mut self) -> Self {
        self.enforce_turn_order = false;
        self
    }

    fn check(&self, request: &PlacementRequest) -> Result<Vec<Position>, RejectReason> {
        let piece = self
            .pieces
            .iter()
            .find(|p| p.id == request.piece && p.owner == request.player)
            .ok_or(RejectReason::PieceUnavailable)?;

        let dimension = self.board.dimension();
        let cells = footprint_at(piece, request.position, dimension);
        if cells.len() != piece.shape.filled_count() {
            return Err(RejectReason::OutOfBounds);
        }
        // Occupied cells win over reuse, so a repeated click reads as an overlap.
        if cells.iter().any(|&p| self.board.get(p).flatten().is_some()) {
            return Err(RejectReason::Overlap);
        }
        if self.placed.contains(&piece.key()) {
            return Err(RejectReason::PieceUnavailable);
        }
        if self.enforce_turn_order && self.current_player() != Some(request.player) {
            return Err(RejectReason::NotYourTurn);
        }
        Ok(cells)
    }
}

impl RulesEngine for SandboxEngine {
    fn board(&self) -> Board {
        self.board.clone()
    }

    fn players(&self) -> Vec<Player> {
        self.players.clone()
    }

    fn pieces(&self) -> Vec<Piece> {
        self.pieces.clone()
    }

    fn available_pieces(&self, player: PlayerId) -> Vec<Piece> {
        self.pieces
            .iter()
            .filter(|p| p.owner == player && !self.placed.contains(&p.key()))
            .cloned()
            .collect()
    }

    fn place(&mut self, request: &PlacementRequest) -> Result<PlacementAccepted, RejectReason> {
        if !self.players.iter().any(|p| p.id == request.player) {
            return Err(RejectReason::Other(format!("unknown player {}", request.player)));
        }
        let cells = self.check(request)?;

        self.board = self.board.with_cells(&cells, Some(request.player));
        self.placed.insert(PieceKey {
            id: request.piece,
            owner: request.player,
        });
        let turn = Turn {
            player: request.player,
            piece: request.piece,
            position: request.position,
            sequence: self.turns.len() as u64 + 1,
        };
        self.turns.push(turn.clone());
        if !self.players.is_empty() {
            self.current = (self.current + 1) % self.players.len();
        }
        tracing::debug!(sequence = turn.sequence, player = turn.player, "sandbox accepted placement");

        Ok(PlacementAccepted {
            board: self.board.clone(),
            turn,
        })
    }

    fn turns(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    fn current_player(&self) -> Option<PlayerId> {
        self.players.get(self.current).map(|p| p.id)
    }
}
