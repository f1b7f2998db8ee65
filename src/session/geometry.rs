//! Piece footprint → board-shaped overlay.
//!
//! Pure functions. Callers recompute the overlay on every piece or player
//! change; the owner id (and so the color) differs per piece.

use crate::engine::models::{Board, Piece, Position, ShapeBoard};

/// Lay `piece`'s shape over an empty `dimension`×`dimension` grid, anchored at
/// the top-left corner. Filled cells carry the piece owner's id; everything
/// else, including the part of the shape that does not fit, stays empty.
pub fn to_shape_board(piece: &Piece, dimension: usize) -> ShapeBoard {
    let cells: Vec<Position> = piece
        .shape
        .filled_cells()
        .filter(|&(r, c)| r < dimension && c < dimension)
        .map(|(r, c)| Position::new(r, c))
        .collect();
    Board::empty(dimension).with_cells(&cells, Some(piece.owner))
}

/// Square preview of a piece, sized to the piece's own extent.
pub fn preview_board(piece: &Piece) -> ShapeBoard {
    to_shape_board(piece, piece.shape.extent())
}

/// Board positions covered by `piece` when its top-left corner sits on
/// `anchor`. Cells that would fall off a `dimension`-sized board are dropped.
pub fn footprint_at(piece: &Piece, anchor: Position, dimension: usize) -> Vec<Position> {
    piece
        .shape
        .filled_cells()
        .map(|(r, c)| Position::new(anchor.row + r, anchor.col + c))
        .filter(|p| p.row < dimension && p.col < dimension)
        .collect()
}
