//! Turns a click into an engine request and applies the engine's answer.
//!
//! `Session` is sans-IO: `request_placement` validates locally and hands
//! back the request to send, `complete_placement` takes the engine's reply.
//! Whoever owns the engine connection (the synchronous `LocalSession` or
//! the async runtime) moves requests and replies between the two.

use crate::engine::error::{LocalRejection, MalformedSnapshot, RejectReason, Rejection, SyncIssue};
use crate::engine::models::*;
use crate::session::grid::{validate_board, BoardGrid};
use crate::session::selection::SelectionState;
use crate::session::sync::ChannelMessage;

/// A placement sent to the engine and not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPlacement {
    pub ticket: u64,
    pub request: PlacementRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    /// Board and history advanced by exactly one turn. `relay` is set in
    /// multi-client sessions and must be published to the other clients.
    Accepted {
        turn: Turn,
        relay: Option<ChannelMessage>,
    },
    /// The engine accepted the turn, but a resync had already brought it
    /// into local history. Nothing changed; `relay` still goes out since the
    /// other clients only learn of the turn from us.
    AlreadyApplied {
        turn: Turn,
        relay: Option<ChannelMessage>,
    },
    /// Nothing changed.
    Rejected(Rejection),
    /// The engine accepted the turn but it cannot be applied in order here;
    /// local state must be refetched. The relay message still goes out so
    /// other clients see the accepted turn.
    ResyncRequired {
        issue: SyncIssue,
        relay: Option<ChannelMessage>,
    },
}

impl PlacementOutcome {
    pub fn relay(&self) -> Option<&ChannelMessage> {
        match self {
            PlacementOutcome::Accepted { relay, .. }
            | PlacementOutcome::AlreadyApplied { relay, .. }
            | PlacementOutcome::ResyncRequired { relay, .. } => relay.as_ref(),
            PlacementOutcome::Rejected(_) => None,
        }
    }

    /// Board and history advanced by this outcome.
    pub fn is_accepted(&self) -> bool {
        matches!(self, PlacementOutcome::Accepted { .. })
    }

    /// The engine accepted the placement, whether or not it was still new here.
    pub fn accepted_turn(&self) -> Option<&Turn> {
        match self {
            PlacementOutcome::Accepted { turn, .. } | PlacementOutcome::AlreadyApplied { turn, .. } => Some(turn),
            PlacementOutcome::Rejected(_) | PlacementOutcome::ResyncRequired { .. } => None,
        }
    }
}

/// Client-side mirror of the engine plus local interaction state.
#[derive(Debug, Clone)]
pub struct Session {
    pub(super) relay: bool,
    pub(super) grid: BoardGrid,
    pub(super) players: Vec<Player>,
    pub(super) pieces: Vec<Piece>,
    pub(super) available: Vec<Piece>,
    pub(super) turns: Vec<Turn>,
    pub(super) selection: SelectionState,
    pub(super) in_flight: Option<u64>,
    pub(super) next_ticket: u64,
}

impl Session {
    /// Build a session from a first engine snapshot. The board dimension seen
    /// here is fixed for the lifetime of the session. `relay` turns on
    /// publishing accepted turns for other clients.
    pub fn from_snapshot(snapshot: EngineSnapshot, relay: bool) -> Result<Self, MalformedSnapshot> {
        let dimension = snapshot.board.dimension();
        check_snapshot(&snapshot, dimension)?;
        let first = snapshot.players[0].clone();
        Ok(Self {
            relay,
            grid: BoardGrid::new(snapshot.board),
            players: snapshot.players,
            pieces: snapshot.pieces,
            available: snapshot.available,
            turns: snapshot.turns,
            selection: SelectionState::new(first),
            in_flight: None,
            next_ticket: 1,
        })
    }

    pub fn board(&self) -> &Board {
        self.grid.snapshot()
    }

    pub fn grid(&self) -> &BoardGrid {
        &self.grid
    }

    pub fn dimension(&self) -> usize {
        self.grid.dimension()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn available_pieces(&self, player: PlayerId) -> Vec<&Piece> {
        self.available.iter().filter(|p| p.owner == player).collect()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Sequence of the newest applied turn, 0 before the first one.
    pub fn last_sequence(&self) -> u64 {
        self.turns.last().map(|t| t.sequence).unwrap_or(0)
    }

    pub fn is_relaying(&self) -> bool {
        self.relay
    }

    pub fn placement_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Select a player by id. Unknown ids are ignored.
    pub fn select_player(&mut self, id: PlayerId) -> bool {
        match self.player(id).cloned() {
            Some(player) => {
                self.selection.select_player(player);
                true
            }
            None => {
                tracing::debug!(player = id, "ignoring selection of unknown player");
                false
            }
        }
    }

    /// Select one of the active player's pieces by id. Ids the active player
    /// does not own are ignored.
    pub fn select_piece(&mut self, id: PieceId) -> bool {
        let owner = self.selection.selected_player().id;
        match self.pieces.iter().find(|p| p.id == id && p.owner == owner) {
            Some(piece) => self.selection.select_piece(piece.clone()),
            None => {
                tracing::debug!(piece = id, player = owner, "ignoring selection of foreign or unknown piece");
                false
            }
        }
    }

    pub fn set_hover(&mut self, position: Option<Position>) {
        self.selection.set_hover(position);
    }

    pub fn hover_enter(&mut self, position: Position) {
        self.selection.hover_enter(position);
    }

    pub fn hover_leave(&mut self, position: Position) {
        self.selection.hover_leave(position);
    }

    pub fn highlighted_positions(&self) -> Vec<Position> {
        self.selection.highlighted_positions(self.dimension())
    }

    /// Place the current selection at `position`.
    pub fn request_placement(&mut self, position: Position) -> Result<PendingPlacement, LocalRejection> {
        let player = self.selection.selected_player().id;
        let piece = self.selection.selected_piece().map(Piece::key);
        self.request_placement_for(player, piece, position)
    }

    /// Validate a (player, piece, position) triple locally and mark it in
    /// flight. Only one placement may be in flight at a time; further
    /// attempts are refused until the engine answers.
    pub fn request_placement_for(
        &mut self,
        player: PlayerId,
        piece: Option<PieceKey>,
        position: Position,
    ) -> Result<PendingPlacement, LocalRejection> {
        if self.in_flight.is_some() {
            tracing::debug!(%position, "placement already in flight, ignoring attempt");
            return Err(LocalRejection::PlacementInFlight);
        }
        let piece = piece.ok_or(LocalRejection::NoPieceSelected)?;
        if self.player(player).is_none() {
            return Err(LocalRejection::UnknownPlayer(player));
        }
        if piece.owner != player {
            return Err(LocalRejection::OwnerMismatch {
                player,
                owner: piece.owner,
            });
        }
        if !self.pieces.iter().any(|p| p.key() == piece) {
            return Err(LocalRejection::UnknownPiece {
                piece: piece.id,
                owner: piece.owner,
            });
        }
        if !self.grid.contains(position) {
            return Err(LocalRejection::OutOfBounds {
                position,
                dimension: self.dimension(),
            });
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(ticket);
        Ok(PendingPlacement {
            ticket,
            request: PlacementRequest {
                player,
                piece: piece.id,
                position,
            },
        })
    }

    /// Apply the engine's answer to a placement.
    ///
    /// The answer is applied whatever the selection looks like by now: the
    /// engine judged the position as it was when requested.
    pub fn complete_placement(
        &mut self,
        ticket: u64,
        reply: Result<PlacementAccepted, RejectReason>,
    ) -> PlacementOutcome {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }

        let accepted = match reply {
            Ok(accepted) => accepted,
            Err(reason) => {
                tracing::info!(ticket, reason = %reason, "placement rejected by engine");
                return PlacementOutcome::Rejected(Rejection::Engine(reason));
            }
        };

        let relay = self.relay.then(|| ChannelMessage::turn(accepted.turn.clone(), accepted.board.clone()));
        let turn = accepted.turn.clone();
        match self.apply_accepted(accepted) {
            Ok(true) => PlacementOutcome::Accepted { turn, relay },
            Ok(false) => {
                tracing::debug!(sequence = turn.sequence, "accepted turn was already applied");
                PlacementOutcome::AlreadyApplied { turn, relay }
            }
            Err(issue) => {
                tracing::warn!(sequence = turn.sequence, issue = %issue, "cannot apply accepted turn, resync needed");
                // Only a well-formed turn that arrived early is worth relaying.
                let relay = match issue {
                    SyncIssue::SequenceGap { .. } => relay,
                    _ => None,
                };
                PlacementOutcome::ResyncRequired { issue, relay }
            }
        }
    }

    /// Shared apply path for local and remote accepted turns. Returns
    /// `Ok(false)` for a turn already in the history, `Ok(true)` when board and
    /// history advanced, and an error (with nothing changed) otherwise.
    pub(super) fn apply_accepted(&mut self, accepted: PlacementAccepted) -> Result<bool, SyncIssue> {
        let expected = self.last_sequence() + 1;
        let received = accepted.turn.sequence;
        if received < expected {
            return Ok(false);
        }
        if received > expected {
            return Err(SyncIssue::SequenceGap { expected, received });
        }
        if self.player(accepted.turn.player).is_none() {
            return Err(MalformedSnapshot::UnknownPlayer(accepted.turn.player).into());
        }
        validate_board(&accepted.board, self.dimension(), &self.players)?;

        let key = accepted.turn.piece_key();
        self.grid.replace(accepted.board);
        self.available.retain(|p| p.key() != key);
        tracing::info!(
            sequence = received,
            player = accepted.turn.player,
            piece = accepted.turn.piece,
            position = %accepted.turn.position,
            "turn applied"
        );
        self.turns.push(accepted.turn);
        Ok(true)
    }
}

/// Validate a whole snapshot against a fixed board dimension.
pub(super) fn check_snapshot(snapshot: &EngineSnapshot, dimension: usize) -> Result<(), MalformedSnapshot> {
    if snapshot.players.is_empty() {
        return Err(MalformedSnapshot::NoPlayers);
    }
    validate_board(&snapshot.board, dimension, &snapshot.players)?;
    for (i, turn) in snapshot.turns.iter().enumerate() {
        if turn.sequence != i as u64 + 1 {
            return Err(MalformedSnapshot::BrokenHistory {
                index: i,
                sequence: turn.sequence,
            });
        }
        if !snapshot.players.iter().any(|p| p.id == turn.player) {
            return Err(MalformedSnapshot::UnknownPlayer(turn.player));
        }
    }
    Ok(())
}
