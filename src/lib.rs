//! Client-side session state machine for a turn-based polyomino board game.
//!
//! The rules engine is external and authoritative; this crate mirrors its
//! state, tracks selection and hover, runs the placement workflow and keeps
//! several clients in step over a relay channel.

pub mod config;
pub mod engine;
pub mod games;
pub mod runtime;
pub mod session;
