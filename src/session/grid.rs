//! Board grid model: the current board snapshot and the read-side queries
//! the renderer needs.
//!
//! The grid is only ever swapped wholesale. Engine output is checked by
//! `validate_board` before it gets here, so reads only need bounds checks.

use crate::engine::error::{BoardError, MalformedSnapshot};
use crate::engine::models::{player_css_class, Board, CellValue, Player, PlayerId, Position};

/// Read one cell of `board`.
pub fn cell_at(board: &Board, position: Position) -> Result<CellValue, BoardError> {
    board.get(position).ok_or(BoardError::OutOfBounds {
        position,
        dimension: board.dimension(),
    })
}

/// Membership test for hover and hint rendering. Never used for legality.
pub fn is_highlighted(position: Position, highlighted: &[Position]) -> bool {
    highlighted.contains(&position)
}

/// Reject boards that are not `dimension`×`dimension` or that reference a
/// player outside `players`.
pub fn validate_board(
    board: &Board,
    dimension: usize,
    players: &[Player],
) -> Result<(), MalformedSnapshot> {
    if board.dimension() != dimension {
        return Err(MalformedSnapshot::WrongDimension {
            expected: dimension,
            actual: board.dimension(),
        });
    }
    for (i, row) in board.rows().iter().enumerate() {
        if row.len() != dimension {
            return Err(MalformedSnapshot::RaggedRow {
                row: i,
                expected: dimension,
                actual: row.len(),
            });
        }
        for id in row.iter().flatten() {
            if !players.iter().any(|p| p.id == *id) {
                return Err(MalformedSnapshot::UnknownPlayer(*id));
            }
        }
    }
    Ok(())
}

/// What a single cell shows. Click and hover handling is the same for both
/// variants; only the styling differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellView {
    Occupied { player_id: PlayerId },
    Empty,
}

impl CellView {
    pub fn from_value(value: CellValue) -> Self {
        match value {
            Some(player_id) => CellView::Occupied { player_id },
            None => CellView::Empty,
        }
    }

    /// Class list for the cell element. A highlighted empty cell takes the
    /// color of the player viewing the board.
    pub fn css_class(&self, highlighted: bool, client_player: Option<PlayerId>) -> String {
        let mut classes = vec!["board-cell".to_string()];
        match self {
            CellView::Occupied { player_id } => {
                classes.push(player_css_class(*player_id));
                if highlighted {
                    classes.push("highlighted".into());
                }
            }
            CellView::Empty => {
                classes.push("empty-cell".into());
                if highlighted {
                    classes.push("highlighted".into());
                    if let Some(id) = client_player {
                        classes.push(player_css_class(id));
                    }
                }
            }
        }
        classes.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct BoardGrid {
    snapshot: Board,
}

impl BoardGrid {
    pub fn new(board: Board) -> Self {
        Self { snapshot: board }
    }

    pub fn dimension(&self) -> usize {
        self.snapshot.dimension()
    }

    pub fn snapshot(&self) -> &Board {
        &self.snapshot
    }

    pub fn contains(&self, position: Position) -> bool {
        position.row < self.dimension() && position.col < self.dimension()
    }

    pub fn cell_at(&self, position: Position) -> Result<CellValue, BoardError> {
        cell_at(&self.snapshot, position)
    }

    /// Swap in a new snapshot and return it.
    pub fn replace(&mut self, board: Board) -> &Board {
        self.snapshot = board;
        &self.snapshot
    }

    /// Row-major cell views for rendering.
    pub fn cell_views(&self) -> impl Iterator<Item = (Position, CellView)> + '_ {
        self.snapshot.rows().iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(move |(c, value)| (Position::new(r, c), CellView::from_value(*value)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<Player> {
        vec![Player::new(0, "a"), Player::new(1, "b")]
    }

    #[test]
    fn test_cell_at_bounds() {
        let board = Board::empty(4).with_cells(&[Position::new(3, 3)], Some(1));
        assert_eq!(cell_at(&board, Position::new(3, 3)), Ok(Some(1)));
        assert_eq!(cell_at(&board, Position::new(0, 0)), Ok(None));
        assert_eq!(
            cell_at(&board, Position::new(4, 0)),
            Err(BoardError::OutOfBounds {
                position: Position::new(4, 0),
                dimension: 4
            })
        );
        assert!(cell_at(&board, Position::new(0, 4)).is_err());
    }

    #[test]
    fn test_replace_is_a_snapshot_swap() {
        let mut grid = BoardGrid::new(Board::empty(3));
        let next = Board::empty(3).with_cells(&[Position::new(1, 2), Position::new(0, 0)], Some(0));
        let current = grid.replace(next.clone()).clone();
        for r in 0..3 {
            for c in 0..3 {
                let p = Position::new(r, c);
                assert_eq!(cell_at(&current, p), cell_at(&next, p));
                assert_eq!(grid.cell_at(p), cell_at(&next, p));
            }
        }
    }

    #[test]
    fn test_is_highlighted() {
        let hl = [Position::new(1, 1), Position::new(1, 2)];
        assert!(is_highlighted(Position::new(1, 2), &hl));
        assert!(!is_highlighted(Position::new(2, 1), &hl));
        assert!(!is_highlighted(Position::new(0, 0), &[]));
    }

    #[test]
    fn test_validate_board_shapes() {
        let ps = players();
        assert!(validate_board(&Board::empty(3), 3, &ps).is_ok());
        assert_eq!(
            validate_board(&Board::empty(2), 3, &ps),
            Err(MalformedSnapshot::WrongDimension { expected: 3, actual: 2 })
        );
        let ragged = Board::from_rows(vec![vec![None, None], vec![None]]);
        assert_eq!(
            validate_board(&ragged, 2, &ps),
            Err(MalformedSnapshot::RaggedRow { row: 1, expected: 2, actual: 1 })
        );
        let stranger = Board::empty(2).with_cells(&[Position::new(0, 0)], Some(7));
        assert_eq!(
            validate_board(&stranger, 2, &ps),
            Err(MalformedSnapshot::UnknownPlayer(7))
        );
    }

    #[test]
    fn test_cell_view_classes() {
        let occupied = CellView::from_value(Some(0));
        assert_eq!(occupied, CellView::Occupied { player_id: 0 });
        assert_eq!(occupied.css_class(false, Some(2)), "board-cell player-1");
        assert_eq!(occupied.css_class(true, None), "board-cell player-1 highlighted");

        let empty = CellView::from_value(None);
        assert_eq!(empty.css_class(false, Some(2)), "board-cell empty-cell");
        assert_eq!(
            empty.css_class(true, Some(2)),
            "board-cell empty-cell highlighted player-3"
        );
        assert_eq!(empty.css_class(true, None), "board-cell empty-cell highlighted");
    }

    #[test]
    fn test_cell_views_cover_grid() {
        let grid = BoardGrid::new(Board::empty(2).with_cells(&[Position::new(1, 0)], Some(1)));
        let views: Vec<_> = grid.cell_views().collect();
        assert_eq!(views.len(), 4);
        assert_eq!(views[2], (Position::new(1, 0), CellView::Occupied { player_id: 1 }));
        assert_eq!(views[3].1, CellView::Empty);
    }
}
