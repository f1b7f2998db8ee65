//! Local selection: active player, active piece and hovered cell.
//!
//! Three independent axes with one cross-axis rule: a selected piece always
//! belongs to the selected player. Fields are private so the rule cannot be
//! broken from outside.

use crate::engine::models::{Piece, Player, Position};
use crate::session::geometry::footprint_at;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    selected_player: Player,
    selected_piece: Option<Piece>,
    hover: Option<Position>,
}

impl SelectionState {
    pub fn new(player: Player) -> Self {
        Self {
            selected_player: player,
            selected_piece: None,
            hover: None,
        }
    }

    pub fn selected_player(&self) -> &Player {
        &self.selected_player
    }

    pub fn selected_piece(&self) -> Option<&Piece> {
        self.selected_piece.as_ref()
    }

    pub fn hover(&self) -> Option<Position> {
        self.hover
    }

    /// Switch the active player. A selected piece owned by someone else is
    /// dropped.
    pub fn select_player(&mut self, player: Player) {
        if self
            .selected_piece
            .as_ref()
            .is_some_and(|piece| piece.owner != player.id)
        {
            self.selected_piece = None;
        }
        self.selected_player = player;
    }

    /// Select `piece` if the active player owns it. Returns whether the
    /// selection changed hands; foreign pieces are ignored.
    pub fn select_piece(&mut self, piece: Piece) -> bool {
        if piece.owner != self.selected_player.id {
            tracing::debug!(
                piece = piece.id,
                owner = piece.owner,
                player = self.selected_player.id,
                "ignoring selection of another player's piece"
            );
            return false;
        }
        self.selected_piece = Some(piece);
        true
    }

    pub fn clear_piece(&mut self) {
        self.selected_piece = None;
    }

    pub fn set_hover(&mut self, position: Option<Position>) {
        self.hover = position;
    }

    /// Pointer entered a cell.
    pub fn hover_enter(&mut self, position: Position) {
        self.hover = Some(position);
    }

    /// Pointer left a cell. Only clears the hover if it was on that cell, so a
    /// late leave event cannot wipe out a newer enter.
    pub fn hover_leave(&mut self, position: Position) {
        if self.hover == Some(position) {
            self.hover = None;
        }
    }

    /// Cells covered by the selected piece at the hovered position.
    pub fn highlighted_positions(&self, dimension: usize) -> Vec<Position> {
        match (&self.selected_piece, self.hover) {
            (Some(piece), Some(anchor)) => footprint_at(piece, anchor, dimension),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::models::Shape;

    fn piece(id: u32, owner: u32) -> Piece {
        Piece {
            id,
            owner,
            shape: Shape::parse(&["XX"]).unwrap(),
        }
    }

    #[test]
    fn test_foreign_piece_selection_is_noop() {
        let mut sel = SelectionState::new(Player::new(0, "a"));
        assert!(sel.select_piece(piece(4, 0)));
        assert!(!sel.select_piece(piece(5, 1)));
        assert_eq!(sel.selected_piece().map(|p| p.id), Some(4));
    }

    #[test]
    fn test_switching_player_drops_foreign_piece() {
        let mut sel = SelectionState::new(Player::new(0, "a"));
        sel.select_piece(piece(4, 0));
        sel.select_player(Player::new(1, "b"));
        assert!(sel.selected_piece().is_none());
        assert_eq!(sel.selected_player().id, 1);
    }

    #[test]
    fn test_reselecting_same_player_keeps_piece() {
        let mut sel = SelectionState::new(Player::new(0, "a"));
        sel.select_piece(piece(4, 0));
        sel.select_player(Player::new(0, "a"));
        assert_eq!(sel.selected_piece().map(|p| p.id), Some(4));
    }

    #[test]
    fn test_hover_is_independent_of_selection() {
        let mut sel = SelectionState::new(Player::new(0, "a"));
        sel.set_hover(Some(Position::new(2, 2)));
        sel.select_player(Player::new(1, "b"));
        assert_eq!(sel.hover(), Some(Position::new(2, 2)));
        sel.set_hover(None);
        assert_eq!(sel.hover(), None);
    }

    #[test]
    fn test_hover_leave_only_clears_matching_cell() {
        let mut sel = SelectionState::new(Player::new(0, "a"));
        sel.hover_enter(Position::new(1, 1));
        sel.hover_enter(Position::new(1, 2));
        sel.hover_leave(Position::new(1, 1));
        assert_eq!(sel.hover(), Some(Position::new(1, 2)));
        sel.hover_leave(Position::new(1, 2));
        assert_eq!(sel.hover(), None);
    }

    #[test]
    fn test_highlight_needs_piece_and_hover() {
        let mut sel = SelectionState::new(Player::new(0, "a"));
        sel.hover_enter(Position::new(0, 0));
        assert!(sel.highlighted_positions(5).is_empty());
        sel.select_piece(piece(1, 0));
        assert_eq!(
            sel.highlighted_positions(5),
            vec![Position::new(0, 0), Position::new(0, 1)]
        );
    }
}
