//! The 21 standard polyominoes every player starts with, smallest first.

use once_cell::sync::Lazy;

use crate::engine::models::{Piece, PieceId, PlayerId, Shape};

const SHAPES: [&[&str]; 21] = [
    // 1
    &["X"],
    // 2
    &["XX"],
    // 3
    &["XXX"],
    &["XX", "X."],
    // 4
    &["XXXX"],
    &["XXX", "X.."],
    &["XXX", ".X."],
    &["XX", "XX"],
    &["XX.", ".XX"],
    // 5
    &[".XX", "XX.", ".X."],
    &["XXXXX"],
    &["XXXX", "X..."],
    &["XX..", ".XXX"],
    &["XX", "XX", "X."],
    &["XXX", ".X.", ".X."],
    &["X.X", "XXX"],
    &["X..", "X..", "XXX"],
    &["X..", "XX.", ".XX"],
    &[".X.", "XXX", ".X."],
    &["XXXX", ".X.."],
    &["XX.", ".X.", ".XX"],
];

/// Parsed `SHAPES`. An entry that fails to parse is logged and left out,
/// which shifts the ids of every later piece.
pub static STANDARD_SHAPES: Lazy<Vec<Shape>> = Lazy::new(|| {
    SHAPES
        .iter()
        .enumerate()
        .filter_map(|(index, rows)| match Shape::parse(*rows) {
            Ok(shape) => Some(shape),
            Err(e) => {
                tracing::error!(index, ?rows, error = %e, "catalog shape does not parse, dropped");
                None
            }
        })
        .collect()
});

/// One full set per player; piece ids are indices into `shapes`.
pub fn piece_set(players: &[PlayerId], shapes: &[Shape]) -> Vec<Piece> {
    players
        .iter()
        .flat_map(|&owner| {
            shapes.iter().enumerate().map(move |(i, shape)| Piece {
                id: i as PieceId,
                owner,
                shape: shape.clone(),
            })
        })
        .collect()
}
