//! Error and rejection types.
//!
//! Nothing here is a fault the rendering layer has to handle: local
//! rejections and engine rejections are expected feedback, sync issues are
//! resolved by a resync, and malformed snapshots are refused before they can
//! reach the board model.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::models::{PieceId, PlayerId, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// No rows, or rows with no cells.
    Empty,
    /// A row whose length differs from the first row's.
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    /// Anything other than `X` or `.`.
    BadChar(char),
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::Empty => write!(f, "shape has no cells"),
            ShapeError::RaggedRow {
                row,
                expected,
                actual,
            } => write!(f, "shape row {row} has {actual} cells, expected {expected}"),
            ShapeError::BadChar(c) => write!(f, "unexpected shape character {c:?}"),
        }
    }
}

impl Error for ShapeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    OutOfBounds { position: Position, dimension: usize },
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::OutOfBounds {
                position,
                dimension,
            } => write!(f, "position {position} is outside a {dimension}x{dimension} board"),
        }
    }
}

impl Error for BoardError {}

/// Engine output that cannot be applied without corrupting local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedSnapshot {
    NoPlayers,
    WrongDimension { expected: usize, actual: usize },
    RaggedRow { row: usize, expected: usize, actual: usize },
    UnknownPlayer(PlayerId),
    /// Turn history whose sequence numbers are not 1, 2, 3, ...
    BrokenHistory { index: usize, sequence: u64 },
}

impl fmt::Display for MalformedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedSnapshot::NoPlayers => write!(f, "snapshot has no players"),
            MalformedSnapshot::WrongDimension { expected, actual } => {
                write!(f, "board has {actual} rows, expected {expected}")
            }
            MalformedSnapshot::RaggedRow {
                row,
                expected,
                actual,
            } => write!(f, "board row {row} has {actual} cells, expected {expected}"),
            MalformedSnapshot::UnknownPlayer(id) => write!(f, "unknown player id {id}"),
            MalformedSnapshot::BrokenHistory { index, sequence } => {
                write!(f, "turn #{index} carries sequence {sequence}")
            }
        }
    }
}

impl Error for MalformedSnapshot {}

/// Placement attempts refused before any engine or network round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalRejection {
    NoPieceSelected,
    OutOfBounds { position: Position, dimension: usize },
    UnknownPlayer(PlayerId),
    UnknownPiece { piece: PieceId, owner: PlayerId },
    OwnerMismatch { player: PlayerId, owner: PlayerId },
    /// A placement is already waiting on the engine.
    PlacementInFlight,
}

impl fmt::Display for LocalRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalRejection::NoPieceSelected => write!(f, "no piece selected"),
            LocalRejection::OutOfBounds {
                position,
                dimension,
            } => write!(f, "position {position} is outside a {dimension}x{dimension} board"),
            LocalRejection::UnknownPlayer(id) => write!(f, "unknown player {id}"),
            LocalRejection::UnknownPiece { piece, owner } => {
                write!(f, "player {owner} has no piece {piece}")
            }
            LocalRejection::OwnerMismatch { player, owner } => {
                write!(f, "piece belongs to player {owner}, not player {player}")
            }
            LocalRejection::PlacementInFlight => write!(f, "a placement is already pending"),
        }
    }
}

impl Error for LocalRejection {}

/// Reason codes the engine attaches to an illegal placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    OutOfBounds,
    Overlap,
    Adjacency,
    NotYourTurn,
    PieceUnavailable,
    Other(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OutOfBounds => write!(f, "piece does not fit on the board"),
            RejectReason::Overlap => write!(f, "piece overlaps an occupied cell"),
            RejectReason::Adjacency => write!(f, "adjacency rule violated"),
            RejectReason::NotYourTurn => write!(f, "not this player's turn"),
            RejectReason::PieceUnavailable => write!(f, "piece is not available"),
            RejectReason::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for RejectReason {}

/// A refused placement, whichever side refused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Local(LocalRejection),
    Engine(RejectReason),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Local(r) => write!(f, "{r}"),
            Rejection::Engine(r) => write!(f, "rejected by engine: {r}"),
        }
    }
}

impl Error for Rejection {}

impl From<LocalRejection> for Rejection {
    fn from(value: LocalRejection) -> Self {
        Rejection::Local(value)
    }
}

impl From<RejectReason> for Rejection {
    fn from(value: RejectReason) -> Self {
        Rejection::Engine(value)
    }
}

/// Conditions that are resolved by refetching authoritative state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncIssue {
    SequenceGap { expected: u64, received: u64 },
    Malformed(MalformedSnapshot),
    /// Inbound relay traffic was lost or could not be decoded.
    ChannelLoss,
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncIssue::SequenceGap { expected, received } => {
                write!(f, "expected turn {expected}, received {received}")
            }
            SyncIssue::Malformed(m) => write!(f, "malformed engine state: {m}"),
            SyncIssue::ChannelLoss => write!(f, "relay messages were lost"),
        }
    }
}

impl Error for SyncIssue {}

impl From<MalformedSnapshot> for SyncIssue {
    fn from(value: MalformedSnapshot) -> Self {
        SyncIssue::Malformed(value)
    }
}

/// Every resync attempt in a row came back malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncFailed {
    pub attempts: u32,
    pub last: MalformedSnapshot,
}

impl fmt::Display for ResyncFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resync failed after {} attempts: {}", self.attempts, self.last)
    }
}

impl Error for ResyncFailed {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.last)
    }
}

#[derive(Debug)]
pub enum RelayError {
    Encode(serde_json::Error),
    Decode(serde_json::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Encode(e) => write!(f, "failed to encode relay message: {e}"),
            RelayError::Decode(e) => write!(f, "failed to decode relay message: {e}"),
        }
    }
}

impl Error for RelayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RelayError::Encode(e) | RelayError::Decode(e) => Some(e),
        }
    }
}
