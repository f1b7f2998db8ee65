//! Synchronous composition of a `Session` with an engine it can call
//! directly. Used by tests, tools and any host without an event loop.

use crate::engine::error::{LocalRejection, MalformedSnapshot, Rejection, ResyncFailed};
use crate::engine::models::*;
use crate::engine::plugin::RulesEngine;
use crate::session::sync::{ChannelMessage, RemoteOutcome, SnapshotOutcome, MAX_RESYNC_ATTEMPTS};
use crate::session::workflow::{PlacementOutcome, Session};

pub struct LocalSession<E: RulesEngine> {
    engine: E,
    session: Session,
    follow_turns: bool,
    resync_failure: Option<ResyncFailed>,
}

impl<E: RulesEngine> LocalSession<E> {
    pub fn new(engine: E, relay: bool) -> Result<Self, MalformedSnapshot> {
        let session = Session::from_snapshot(engine.snapshot(), relay)?;
        Ok(Self {
            engine,
            session,
            follow_turns: false,
            resync_failure: None,
        })
    }

    /// After each of this client's own accepted placements, select whoever
    /// the engine says moves next. Remote turns never move the selection.
    pub fn with_follow_turns(mut self, follow: bool) -> Self {
        self.follow_turns = follow;
        self.sync_current_player();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The last automatic resync that gave up, until a later one succeeds.
    pub fn resync_failure(&self) -> Option<&ResyncFailed> {
        self.resync_failure.as_ref()
    }

    /// Submit a placement for an explicit (player, piece, position) triple.
    pub fn attempt_placement(
        &mut self,
        player: PlayerId,
        piece: Option<PieceKey>,
        position: Position,
    ) -> PlacementOutcome {
        match self.session.request_placement_for(player, piece, position) {
            Ok(pending) => self.submit(pending.ticket, &pending.request),
            Err(rejection) => reject_locally(rejection),
        }
    }

    /// Submit the current selection at `position`.
    pub fn place_selected(&mut self, position: Position) -> PlacementOutcome {
        match self.session.request_placement(position) {
            Ok(pending) => self.submit(pending.ticket, &pending.request),
            Err(rejection) => reject_locally(rejection),
        }
    }

    pub fn apply_remote_turn(&mut self, message: ChannelMessage) -> RemoteOutcome {
        let outcome = self.session.apply_remote_turn(message);
        if let RemoteOutcome::ResyncRequired(_) = outcome {
            self.auto_resync();
        }
        outcome
    }

    /// Refetch board, players, pieces and history from the engine. A
    /// malformed snapshot is refused and fetched again, up to
    /// `MAX_RESYNC_ATTEMPTS` times.
    pub fn resync(&mut self) -> Result<SnapshotOutcome, ResyncFailed> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.session.apply_snapshot(self.engine.snapshot()) {
                Ok(outcome) => {
                    self.resync_failure = None;
                    return Ok(outcome);
                }
                Err(last) if attempts >= MAX_RESYNC_ATTEMPTS => {
                    return Err(ResyncFailed { attempts, last });
                }
                Err(e) => {
                    tracing::warn!(attempt = attempts, error = %e, "refusing malformed engine snapshot, retrying");
                }
            }
        }
    }

    fn auto_resync(&mut self) {
        if let Err(failure) = self.resync() {
            tracing::error!(error = %failure, "giving up on resync");
            self.resync_failure = Some(failure);
        }
    }

    fn submit(&mut self, ticket: u64, request: &PlacementRequest) -> PlacementOutcome {
        let reply = self.engine.place(request);
        let outcome = self.session.complete_placement(ticket, reply);
        match &outcome {
            PlacementOutcome::Accepted { .. } | PlacementOutcome::AlreadyApplied { .. } => {
                self.sync_current_player()
            }
            PlacementOutcome::ResyncRequired { .. } => self.auto_resync(),
            PlacementOutcome::Rejected(_) => {}
        }
        outcome
    }

    fn sync_current_player(&mut self) {
        if !self.follow_turns {
            return;
        }
        if let Some(id) = self.engine.current_player() {
            self.session.select_player(id);
        }
    }
}

fn reject_locally(rejection: LocalRejection) -> PlacementOutcome {
    tracing::debug!(reason = %rejection, "placement refused locally");
    PlacementOutcome::Rejected(Rejection::Local(rejection))
}
