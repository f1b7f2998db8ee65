//! End-to-end placement and relay scenarios driven through `LocalSession`
//! against the sandbox engine.
//!
//! Run with:
//!     cargo test --test session_scenarios

use polyomino_session::engine::error::{RejectReason, Rejection, SyncIssue};
use polyomino_session::engine::models::*;
use polyomino_session::engine::plugin::{RulesEngine, SharedEngine};
use polyomino_session::games::catalog::STANDARD_SHAPES;
use polyomino_session::games::sandbox::SandboxEngine;
use polyomino_session::session::geometry::to_shape_board;
use polyomino_session::session::grid::cell_at;
use polyomino_session::session::{LocalSession, PlacementOutcome, RemoteOutcome};

fn names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("Player {i}")).collect()
}

/// Standard catalog with piece 12 swapped for a monomino.
fn shapes_with_mono_12() -> Vec<Shape> {
    let mono = Shape::parse(&["X"]).unwrap();
    STANDARD_SHAPES
        .iter()
        .enumerate()
        .map(|(i, s)| if i == 12 { mono.clone() } else { s.clone() })
        .collect()
}

fn key(owner: PlayerId, id: PieceId) -> Option<PieceKey> {
    Some(PieceKey { id, owner })
}

#[test]
fn monomino_lands_in_corner() {
    let engine = SandboxEngine::with_shapes(20, &names(2), &shapes_with_mono_12());
    let mut local = LocalSession::new(engine, false).unwrap();

    assert!(local.session_mut().select_piece(12));
    let outcome = local.place_selected(Position::new(0, 0));

    assert!(outcome.is_accepted(), "{outcome:?}");
    assert_eq!(cell_at(local.session().board(), Position::new(0, 0)), Ok(Some(0)));
    assert_eq!(local.session().turns().len(), 1);
    assert_eq!(local.session().board().occupied_count(), 1);
}

#[test]
fn overlapping_placement_is_rejected_and_changes_nothing() {
    let engine = SandboxEngine::with_shapes(20, &names(2), &shapes_with_mono_12());
    let mut local = LocalSession::new(engine, false).unwrap();
    local.session_mut().select_piece(12);
    assert!(local.place_selected(Position::new(0, 0)).is_accepted());

    let board = local.session().board().clone();
    let turns = local.session().turns().to_vec();

    // The domino would cover (0,0) again.
    let outcome = local.attempt_placement(0, key(0, 1), Position::new(0, 0));
    assert_eq!(
        outcome,
        PlacementOutcome::Rejected(Rejection::Engine(RejectReason::Overlap))
    );
    assert_eq!(local.session().board(), &board);
    assert_eq!(local.session().turns(), turns.as_slice());

    // A double click with the placed piece reaches the engine and bounces.
    assert_eq!(
        local.place_selected(Position::new(0, 0)),
        PlacementOutcome::Rejected(Rejection::Engine(RejectReason::Overlap))
    );
    assert_eq!(local.session().turns().len(), 1);
}

#[test]
fn relayed_turn_converges_two_clients() {
    let engine = SharedEngine::new(SandboxEngine::new(20, &names(2)));
    let mut a = LocalSession::new(engine.clone(), true).unwrap();
    let mut b = LocalSession::new(engine.clone(), true).unwrap();

    let outcome = a.attempt_placement(0, key(0, 4), Position::new(3, 3));
    assert!(outcome.is_accepted());
    let message = outcome.relay().cloned().expect("multi-client sessions relay");

    assert!(matches!(b.apply_remote_turn(message.clone()), RemoteOutcome::Applied(_)));
    assert_eq!(a.session().board(), b.session().board());
    assert_eq!(a.session().turns(), b.session().turns());
    assert_eq!(b.session().available_pieces(0).len(), 20);

    // Redelivery is dropped.
    assert_eq!(
        b.apply_remote_turn(message),
        RemoteOutcome::Duplicate { sequence: 1 }
    );
    assert_eq!(b.session().turns().len(), 1);
}

#[test]
fn gap_in_relay_triggers_resync() {
    let engine = SharedEngine::new(SandboxEngine::new(20, &names(2)).without_turn_order());
    let mut a = LocalSession::new(engine.clone(), true).unwrap();
    let mut b = LocalSession::new(engine.clone(), true).unwrap();

    let first = a.attempt_placement(0, key(0, 0), Position::new(0, 0));
    b.apply_remote_turn(first.relay().cloned().unwrap());
    // Turn #2 never reaches B.
    assert!(a.attempt_placement(1, key(1, 0), Position::new(19, 19)).is_accepted());
    let third = a.attempt_placement(0, key(0, 1), Position::new(5, 5));
    let message = third.relay().cloned().unwrap();
    assert_eq!(message.sequence(), 3);

    let outcome = b.apply_remote_turn(message);
    assert_eq!(
        outcome,
        RemoteOutcome::ResyncRequired(SyncIssue::SequenceGap { expected: 2, received: 3 })
    );

    let authoritative = engine.snapshot();
    assert_eq!(b.session().board(), &authoritative.board);
    assert_eq!(b.session().turns(), authoritative.turns.as_slice());
    assert_eq!(b.session().last_sequence(), 3);
    assert_eq!(b.session().board(), a.session().board());
}

#[test]
fn follow_turns_moves_selection_to_next_player() {
    let engine = SandboxEngine::new(10, &names(3));
    let mut local = LocalSession::new(engine, false).unwrap().with_follow_turns(true);
    assert_eq!(local.session().selection().selected_player().id, 0);

    local.session_mut().select_piece(0);
    assert!(local.place_selected(Position::new(0, 0)).is_accepted());
    assert_eq!(local.session().selection().selected_player().id, 1);
    // The piece belonged to player 0 and is dropped with the player switch.
    assert!(local.session().selection().selected_piece().is_none());
}

#[test]
fn out_of_turn_placement_is_rejected_by_engine() {
    let mut local = LocalSession::new(SandboxEngine::new(10, &names(2)), false).unwrap();
    local.session_mut().select_player(1);
    local.session_mut().select_piece(0);
    assert_eq!(
        local.place_selected(Position::new(4, 4)),
        PlacementOutcome::Rejected(Rejection::Engine(RejectReason::NotYourTurn))
    );
    assert!(local.session().turns().is_empty());
}

#[test]
fn every_catalog_piece_overlays_its_own_cell_count() {
    for (i, shape) in STANDARD_SHAPES.iter().enumerate() {
        let piece = Piece {
            id: i as PieceId,
            owner: 0,
            shape: shape.clone(),
        };
        let overlay = to_shape_board(&piece, 20);
        assert_eq!(overlay.dimension(), 20);
        assert_eq!(overlay.count_for(0), shape.filled_count(), "piece {i}");

        // Cropped to a board narrower than the piece, nothing spills over.
        let small = to_shape_board(&piece, 2);
        assert!(small.count_for(0) <= 4);
    }
}

#[test]
fn foreign_piece_selection_is_ignored() {
    let mut local = LocalSession::new(SandboxEngine::new(10, &names(2)), false).unwrap();
    local.session_mut().select_piece(3);
    let before = local.session().selection().clone();

    let foreign = local
        .session()
        .pieces()
        .iter()
        .find(|p| p.owner == 1 && p.id == 5)
        .cloned()
        .unwrap();
    let mut selection = before.clone();
    assert!(!selection.select_piece(foreign));
    assert_eq!(selection, before);
}

#[test]
fn history_advances_by_at_most_one_per_outcome() {
    let engine = SandboxEngine::new(8, &names(2)).without_turn_order();
    let mut local = LocalSession::new(engine, false).unwrap();
    let attempts = [
        (0, 0, 0, 0),
        (0, 0, 0, 0),
        (1, 4, 7, 0),
        (1, 10, 0, 6),
        (0, 2, 2, 2),
        (1, 99, 1, 1),
    ];
    for (player, piece, row, col) in attempts {
        let before = local.session().turns().len();
        let outcome = local.attempt_placement(player, key(player, piece), Position::new(row, col));
        let after = local.session().turns().len();
        match outcome {
            PlacementOutcome::Accepted { .. } => assert_eq!(after, before + 1),
            _ => assert_eq!(after, before),
        }
    }
    assert_eq!(local.session().turns(), local.engine().turns().as_slice());
}
