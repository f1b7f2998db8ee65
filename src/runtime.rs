//! Event-driven runtime for multi-client sessions.
//!
//! Each client runs one task that owns its `Session` and consumes a single
//! event queue: user gestures, engine replies, resync snapshots and relayed
//! turns all arrive there, so session state is only touched from one place.
//! The engine runs as its own task answering requests over `mpsc`; relayed
//! turns travel over a `broadcast` hub as JSON text.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::engine::error::{RejectReason, Rejection, ResyncFailed, SyncIssue};
use crate::engine::models::*;
use crate::engine::plugin::RulesEngine;
use crate::session::selection::SelectionState;
use crate::session::{
    ChannelMessage, PlacementOutcome, RemoteOutcome, Session, SnapshotOutcome, MAX_RESYNC_ATTEMPTS,
};

pub type ClientId = usize;

#[derive(Debug)]
pub enum RuntimeError {
    EngineUnavailable,
    ClientUnavailable(ClientId),
    Timeout(Duration),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::EngineUnavailable => write!(f, "engine task has stopped"),
            RuntimeError::ClientUnavailable(id) => write!(f, "client {id} has stopped"),
            RuntimeError::Timeout(d) => write!(f, "timed out after {d:?}"),
        }
    }
}

impl Error for RuntimeError {}

// ---------------------------------------------------------------------------
// Engine actor
// ---------------------------------------------------------------------------

pub enum EngineRequest {
    Place {
        ticket: u64,
        request: PlacementRequest,
        respond_to: mpsc::UnboundedSender<ClientEvent>,
    },
    Snapshot {
        respond_to: mpsc::UnboundedSender<ClientEvent>,
    },
    NotifyCurrentPlayer {
        respond_to: mpsc::UnboundedSender<ClientEvent>,
    },
    Fetch {
        respond_to: oneshot::Sender<EngineSnapshot>,
    },
    CurrentPlayer {
        respond_to: oneshot::Sender<Option<PlayerId>>,
    },
}

/// Handle to the engine task. Cheap to clone.
#[derive(Clone)]
pub struct EngineClient {
    requests: mpsc::UnboundedSender<EngineRequest>,
}

impl EngineClient {
    fn send(&self, request: EngineRequest) -> Result<(), RuntimeError> {
        self.requests
            .send(request)
            .map_err(|_| RuntimeError::EngineUnavailable)
    }

    /// Full engine snapshot, awaited directly (bootstrap and tooling).
    pub async fn fetch(&self) -> Result<EngineSnapshot, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineRequest::Fetch { respond_to: tx })?;
        rx.await.map_err(|_| RuntimeError::EngineUnavailable)
    }

    pub async fn current_player(&self) -> Result<Option<PlayerId>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineRequest::CurrentPlayer { respond_to: tx })?;
        rx.await.map_err(|_| RuntimeError::EngineUnavailable)
    }
}

/// Run `engine` on its own task. The task ends, handing the engine back,
/// once every `EngineClient` is dropped.
pub fn spawn_engine<E: RulesEngine + 'static>(mut engine: E) -> (EngineClient, JoinHandle<E>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<EngineRequest>();
    let handle = tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            match request {
                EngineRequest::Place {
                    ticket,
                    request,
                    respond_to,
                } => {
                    let reply = engine.place(&request);
                    let _ = respond_to.send(ClientEvent::PlaceReply { ticket, reply });
                }
                EngineRequest::Snapshot { respond_to } => {
                    let _ = respond_to.send(ClientEvent::Snapshot(engine.snapshot()));
                }
                EngineRequest::NotifyCurrentPlayer { respond_to } => {
                    let _ = respond_to.send(ClientEvent::CurrentPlayer(engine.current_player()));
                }
                EngineRequest::Fetch { respond_to } => {
                    let _ = respond_to.send(engine.snapshot());
                }
                EngineRequest::CurrentPlayer { respond_to } => {
                    let _ = respond_to.send(engine.current_player());
                }
            }
        }
        tracing::debug!("engine task stopped");
        engine
    });
    (EngineClient { requests: tx }, handle)
}

// ---------------------------------------------------------------------------
// Relay hub
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RelayFrame {
    pub origin: ClientId,
    pub payload: String,
}

/// In-process stand-in for the message channel between clients.
#[derive(Clone)]
pub struct RelayHub {
    sender: broadcast::Sender<RelayFrame>,
}

impl RelayHub {
    /// `capacity` frames may be buffered per subscriber; a subscriber that
    /// falls further behind loses frames and has to resync.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayFrame> {
        self.sender.subscribe()
    }

    /// Send an encoded frame to every subscriber. Returns how many received it.
    pub fn publish_raw(&self, origin: ClientId, payload: String) -> usize {
        self.sender.send(RelayFrame { origin, payload }).unwrap_or(0)
    }

    pub fn publish(&self, origin: ClientId, message: &ChannelMessage) -> usize {
        match message.encode() {
            Ok(payload) => self.publish_raw(origin, payload),
            Err(e) => {
                tracing::error!(error = %e, "dropping unencodable relay message");
                0
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Client task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    SelectPlayer(PlayerId),
    SelectPiece(PieceId),
    HoverEnter(Position),
    HoverLeave(Position),
    Click(Position),
}

pub enum ClientEvent {
    Gesture(Gesture),
    PlaceReply {
        ticket: u64,
        reply: Result<PlacementAccepted, RejectReason>,
    },
    Snapshot(EngineSnapshot),
    CurrentPlayer(Option<PlayerId>),
    /// Connection layer asks for a full refresh (e.g. after a reconnect).
    ResyncRequested,
    Inspect(oneshot::Sender<ClientView>),
    Shutdown,
}

/// Copy of a client's state for rendering and assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    pub board: Board,
    pub turns: Vec<Turn>,
    pub available: Vec<Piece>,
    pub selection: SelectionState,
    pub highlighted: Vec<Position>,
    pub placement_in_flight: bool,
    pub resyncing: bool,
}

impl ClientView {
    pub fn last_sequence(&self) -> u64 {
        self.turns.last().map(|t| t.sequence).unwrap_or(0)
    }
}

/// Published by each client task after every event it handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub last_sequence: u64,
    pub resyncing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientNotice {
    /// The engine accepted this client's placement.
    Accepted(Turn),
    Rejected(Rejection),
    RemoteApplied(Turn),
    Resynced { last_sequence: u64 },
    ResyncFailed(ResyncFailed),
}

#[derive(Clone)]
pub struct SessionClient {
    id: ClientId,
    events: mpsc::UnboundedSender<ClientEvent>,
    progress: watch::Receiver<Progress>,
}

impl SessionClient {
    pub fn id(&self) -> ClientId {
        self.id
    }

    fn send(&self, event: ClientEvent) -> Result<(), RuntimeError> {
        self.events
            .send(event)
            .map_err(|_| RuntimeError::ClientUnavailable(self.id))
    }

    pub fn gesture(&self, gesture: Gesture) -> Result<(), RuntimeError> {
        self.send(ClientEvent::Gesture(gesture))
    }

    pub fn request_resync(&self) -> Result<(), RuntimeError> {
        self.send(ClientEvent::ResyncRequested)
    }

    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        self.send(ClientEvent::Shutdown)
    }

    pub async fn view(&self) -> Result<ClientView, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(ClientEvent::Inspect(tx))?;
        rx.await.map_err(|_| RuntimeError::ClientUnavailable(self.id))
    }

    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    /// Wait until this client has applied turn `sequence` and has no resync
    /// outstanding.
    pub async fn wait_for_sequence(&self, sequence: u64, limit: Duration) -> Result<ClientView, RuntimeError> {
        let mut progress = self.progress.clone();
        let reached = progress.wait_for(|p| p.last_sequence >= sequence && !p.resyncing);
        match tokio::time::timeout(limit, reached).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => return Err(RuntimeError::ClientUnavailable(self.id)),
            Err(_) => return Err(RuntimeError::Timeout(limit)),
        }
        self.view().await
    }
}

pub type NoticeSender = mpsc::UnboundedSender<(ClientId, ClientNotice)>;

#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Select the engine's current player after this client's own accepted
    /// placements. Remote turns and resyncs leave the selection alone.
    pub follow_turns: bool,
    pub notices: Option<NoticeSender>,
}

/// Start a client task around `session`. The task runs until it receives
/// `Shutdown` and then hands the session back.
pub fn spawn_client(
    id: ClientId,
    session: Session,
    engine: EngineClient,
    hub: &RelayHub,
    options: ClientOptions,
) -> (SessionClient, JoinHandle<Session>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let relay = hub.subscribe();
    let (progress_tx, progress_rx) = watch::channel(Progress {
        last_sequence: session.last_sequence(),
        resyncing: false,
    });
    let task = ClientTask {
        id,
        session,
        engine,
        hub: hub.clone(),
        events: tx.clone(),
        progress: progress_tx,
        options,
        resyncing: false,
        missed: None,
        lost_during_resync: false,
        failed_snapshots: 0,
    };
    let handle = tokio::spawn(task.run(rx, relay));
    let client = SessionClient {
        id,
        events: tx,
        progress: progress_rx,
    };
    (client, handle)
}

struct ClientTask {
    id: ClientId,
    session: Session,
    engine: EngineClient,
    hub: RelayHub,
    events: mpsc::UnboundedSender<ClientEvent>,
    progress: watch::Sender<Progress>,
    options: ClientOptions,
    /// A snapshot request is outstanding.
    resyncing: bool,
    /// Highest sequence that hit a gap while a snapshot was already on its way.
    missed: Option<u64>,
    /// Relay traffic was lost while a snapshot was already on its way.
    lost_during_resync: bool,
    /// Malformed snapshots received in a row.
    failed_snapshots: u32,
}

impl ClientTask {
    async fn run(
        mut self,
        events: mpsc::UnboundedReceiver<ClientEvent>,
        mut relay: broadcast::Receiver<RelayFrame>,
    ) -> Session {
        let mut events = UnboundedReceiverStream::new(events);
        let mut relay_open = true;
        tracing::debug!(client = self.id, "client started");

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(ClientEvent::Shutdown) | None => break,
                    Some(event) => self.handle_event(event),
                },
                frame = relay.recv(), if relay_open => match frame {
                    Ok(frame) => {
                        if frame.origin != self.id {
                            self.handle_frame(&frame.payload);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(client = self.id, skipped, "relay receiver lagged");
                        self.start_resync(&SyncIssue::ChannelLoss);
                    }
                    Err(broadcast::error::RecvError::Closed) => relay_open = false,
                },
            }
            self.publish_progress();
        }

        tracing::debug!(client = self.id, "client stopped");
        self.session
    }

    fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Gesture(gesture) => self.handle_gesture(gesture),
            ClientEvent::PlaceReply { ticket, reply } => {
                let outcome = self.session.complete_placement(ticket, reply);
                if let Some(message) = outcome.relay() {
                    self.hub.publish(self.id, message);
                }
                match outcome {
                    PlacementOutcome::Accepted { turn, .. }
                    | PlacementOutcome::AlreadyApplied { turn, .. } => {
                        self.notify(ClientNotice::Accepted(turn));
                        self.follow_current_player();
                    }
                    PlacementOutcome::Rejected(rejection) => self.notify(ClientNotice::Rejected(rejection)),
                    PlacementOutcome::ResyncRequired { issue, .. } => self.start_resync(&issue),
                }
            }
            ClientEvent::Snapshot(snapshot) => self.handle_snapshot(snapshot),
            ClientEvent::CurrentPlayer(Some(player)) => {
                self.session.select_player(player);
            }
            ClientEvent::CurrentPlayer(None) => {}
            ClientEvent::ResyncRequested => {
                tracing::info!(client = self.id, "resync requested by connection layer");
                self.start_resync(&SyncIssue::ChannelLoss);
            }
            ClientEvent::Inspect(respond_to) => {
                let _ = respond_to.send(self.view());
            }
            ClientEvent::Shutdown => {}
        }
    }

    fn handle_gesture(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::SelectPlayer(id) => {
                self.session.select_player(id);
            }
            Gesture::SelectPiece(id) => {
                self.session.select_piece(id);
            }
            Gesture::HoverEnter(position) => self.session.hover_enter(position),
            Gesture::HoverLeave(position) => self.session.hover_leave(position),
            Gesture::Click(position) => match self.session.request_placement(position) {
                Ok(pending) => {
                    let sent = self.engine.send(EngineRequest::Place {
                        ticket: pending.ticket,
                        request: pending.request,
                        respond_to: self.events.clone(),
                    });
                    if sent.is_err() {
                        let reason = RejectReason::Other("engine unavailable".into());
                        self.session.complete_placement(pending.ticket, Err(reason.clone()));
                        self.notify(ClientNotice::Rejected(Rejection::Engine(reason)));
                    }
                }
                Err(rejection) => {
                    tracing::debug!(client = self.id, reason = %rejection, "click refused locally");
                    self.notify(ClientNotice::Rejected(Rejection::Local(rejection)));
                }
            },
        }
    }

    fn handle_frame(&mut self, payload: &str) {
        match self.session.apply_relay_frame(payload) {
            RemoteOutcome::Applied(turn) => self.notify(ClientNotice::RemoteApplied(turn)),
            RemoteOutcome::Duplicate { .. } => {}
            RemoteOutcome::ResyncRequired(issue) => self.start_resync(&issue),
        }
    }

    fn handle_snapshot(&mut self, snapshot: EngineSnapshot) {
        self.resyncing = false;
        match self.session.apply_snapshot(snapshot) {
            Ok(outcome) => {
                self.failed_snapshots = 0;
                if let SnapshotOutcome::Stale { local, snapshot } = outcome {
                    tracing::debug!(client = self.id, local, snapshot, "snapshot older than local history ignored");
                }
                let last_sequence = self.session.last_sequence();
                self.notify(ClientNotice::Resynced { last_sequence });

                // The snapshot may have been taken before what went missing
                // during the resync.
                let behind = self.missed.take().is_some_and(|s| s > last_sequence);
                let lost = std::mem::take(&mut self.lost_during_resync);
                if behind || lost {
                    self.start_resync(&SyncIssue::ChannelLoss);
                }
            }
            Err(e) => {
                self.failed_snapshots += 1;
                if self.failed_snapshots >= MAX_RESYNC_ATTEMPTS {
                    let failure = ResyncFailed {
                        attempts: self.failed_snapshots,
                        last: e,
                    };
                    tracing::error!(client = self.id, error = %failure, "giving up on resync");
                    self.failed_snapshots = 0;
                    self.missed = None;
                    self.lost_during_resync = false;
                    self.notify(ClientNotice::ResyncFailed(failure));
                } else {
                    tracing::warn!(
                        client = self.id,
                        attempt = self.failed_snapshots,
                        error = %e,
                        "refusing malformed engine snapshot, retrying"
                    );
                    self.start_resync(&SyncIssue::Malformed(e));
                }
            }
        }
    }

    /// Ask the engine for a snapshot. With one already on its way, only note
    /// what the newer trigger missed so it can be fetched again afterwards.
    fn start_resync(&mut self, issue: &SyncIssue) {
        if self.resyncing {
            match issue {
                SyncIssue::SequenceGap { received, .. } => {
                    self.missed = Some(self.missed.map_or(*received, |m| m.max(*received)));
                }
                SyncIssue::Malformed(_) | SyncIssue::ChannelLoss => self.lost_during_resync = true,
            }
            return;
        }
        tracing::info!(client = self.id, issue = %issue, "requesting resync");
        self.resyncing = true;
        let sent = self.engine.send(EngineRequest::Snapshot {
            respond_to: self.events.clone(),
        });
        if sent.is_err() {
            tracing::error!(client = self.id, "engine unavailable, cannot resync");
            self.resyncing = false;
        }
    }

    fn follow_current_player(&self) {
        if !self.options.follow_turns {
            return;
        }
        let _ = self.engine.send(EngineRequest::NotifyCurrentPlayer {
            respond_to: self.events.clone(),
        });
    }

    fn publish_progress(&self) {
        let next = Progress {
            last_sequence: self.session.last_sequence(),
            resyncing: self.resyncing,
        };
        self.progress.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn notify(&self, notice: ClientNotice) {
        if let Some(notices) = &self.options.notices {
            let _ = notices.send((self.id, notice));
        }
    }

    fn view(&self) -> ClientView {
        ClientView {
            board: self.session.board().clone(),
            turns: self.session.turns().to_vec(),
            available: self
                .session
                .players()
                .iter()
                .flat_map(|p| self.session.available_pieces(p.id))
                .cloned()
                .collect(),
            selection: self.session.selection().clone(),
            highlighted: self.session.highlighted_positions(),
            placement_in_flight: self.session.placement_in_flight(),
            resyncing: self.resyncing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::sandbox::SandboxEngine;

    const LIMIT: Duration = Duration::from_secs(5);

    fn names() -> Vec<String> {
        vec!["A".into(), "B".into()]
    }

    #[tokio::test]
    async fn test_engine_actor_answers_requests() {
        let (engine, handle) = spawn_engine(SandboxEngine::new(6, &names()));
        let snap = engine.fetch().await.unwrap();
        assert_eq!(snap.board.dimension(), 6);
        assert_eq!(engine.current_player().await.unwrap(), Some(0));
        drop(engine);
        let engine = handle.await.unwrap();
        assert!(engine.turns().is_empty());
    }

    #[tokio::test]
    async fn test_relay_hub_reaches_subscribers() {
        let hub = RelayHub::new(4);
        let mut rx = hub.subscribe();
        assert_eq!(hub.publish_raw(3, "x".into()), 1);
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.origin, 3);
        assert_eq!(frame.payload, "x");
    }

    #[tokio::test]
    async fn test_click_places_and_relays() {
        let (engine, _engine_task) = spawn_engine(SandboxEngine::new(6, &names()));
        let hub = RelayHub::new(8);
        let (notice_tx, mut notices) = mpsc::unbounded_channel();
        let options = ClientOptions {
            follow_turns: false,
            notices: Some(notice_tx),
        };

        let a = Session::from_snapshot(engine.fetch().await.unwrap(), true).unwrap();
        let b = Session::from_snapshot(engine.fetch().await.unwrap(), true).unwrap();
        let (a, a_task) = spawn_client(0, a, engine.clone(), &hub, options.clone());
        let (b, b_task) = spawn_client(1, b, engine.clone(), &hub, options);

        a.gesture(Gesture::SelectPiece(0)).unwrap();
        a.gesture(Gesture::Click(Position::new(2, 3))).unwrap();

        let (from, notice) = notices.recv().await.unwrap();
        assert_eq!(from, 0);
        assert!(matches!(notice, ClientNotice::Accepted(ref t) if t.sequence == 1));

        let view_b = b.wait_for_sequence(1, LIMIT).await.unwrap();
        let view_a = a.view().await.unwrap();
        assert_eq!(view_a.board, view_b.board);
        assert_eq!(view_b.board.get(Position::new(2, 3)), Some(Some(0)));

        a.shutdown().unwrap();
        b.shutdown().unwrap();
        assert_eq!(a_task.await.unwrap().turns().len(), 1);
        assert_eq!(b_task.await.unwrap().turns().len(), 1);
    }

    #[tokio::test]
    async fn test_hover_gestures_update_highlight() {
        let (engine, _engine_task) = spawn_engine(SandboxEngine::new(6, &names()));
        let hub = RelayHub::new(8);
        let session = Session::from_snapshot(engine.fetch().await.unwrap(), false).unwrap();
        let (client, _task) = spawn_client(0, session, engine, &hub, ClientOptions::default());

        client.gesture(Gesture::SelectPiece(1)).unwrap();
        client.gesture(Gesture::HoverEnter(Position::new(5, 4))).unwrap();
        let view = client.view().await.unwrap();
        assert_eq!(view.highlighted, vec![Position::new(5, 4), Position::new(5, 5)]);

        client.gesture(Gesture::HoverLeave(Position::new(5, 4))).unwrap();
        assert!(client.view().await.unwrap().highlighted.is_empty());
    }
}
