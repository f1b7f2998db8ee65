//! Core data types shared by the session and the rules engine it talks to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::error::ShapeError;

pub type PlayerId = u32;
pub type PieceId = u32;

/// `None` is an empty cell, `Some(id)` a cell covered by that player.
pub type CellValue = Option<PlayerId>;

/// Display colors, assigned by player id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerColor {
    Blue,
    Yellow,
    Red,
    Green,
}

const PLAYER_COLORS: [PlayerColor; 4] = [
    PlayerColor::Blue,
    PlayerColor::Yellow,
    PlayerColor::Red,
    PlayerColor::Green,
];

impl PlayerColor {
    pub fn for_player(id: PlayerId) -> Self {
        PLAYER_COLORS[id as usize % PLAYER_COLORS.len()]
    }

    pub fn hex(&self) -> &'static str {
        match self {
            PlayerColor::Blue => "#3366e6",
            PlayerColor::Yellow => "#e6cc33",
            PlayerColor::Red => "#e63333",
            PlayerColor::Green => "#33cc4d",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn color(&self) -> PlayerColor {
        PlayerColor::for_player(self.id)
    }

    /// CSS class used by the board markup (`player-1` for id 0).
    pub fn css_class(&self) -> String {
        player_css_class(self.id)
    }
}

pub fn player_css_class(id: PlayerId) -> String {
    format!("player-{}", id + 1)
}

/// Zero-indexed board coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Square grid of cell values. Always handled as a whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: Vec<Vec<CellValue>>,
}

/// Board-shaped overlay derived from a piece, used for previews and highlights.
pub type ShapeBoard = Board;

impl Board {
    pub fn empty(dimension: usize) -> Self {
        Self {
            cells: vec![vec![None; dimension]; dimension],
        }
    }

    /// Wrap raw rows without checking them. Snapshots coming from outside
    /// go through `session::grid::validate_board` before use.
    pub fn from_rows(cells: Vec<Vec<CellValue>>) -> Self {
        Self { cells }
    }

    /// Row count; for a well-formed board this is also the column count.
    pub fn dimension(&self) -> usize {
        self.cells.len()
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.cells
    }

    pub fn get(&self, position: Position) -> Option<CellValue> {
        self.cells
            .get(position.row)
            .and_then(|row| row.get(position.col))
            .copied()
    }

    /// Produce a new board with `value` written at each position.
    /// Out-of-range positions are skipped.
    pub fn with_cells(&self, positions: &[Position], value: CellValue) -> Self {
        let mut cells = self.cells.clone();
        for p in positions {
            if let Some(cell) = cells.get_mut(p.row).and_then(|row| row.get_mut(p.col)) {
                *cell = value;
            }
        }
        Self { cells }
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|c| c.is_some())
            .count()
    }

    pub fn count_for(&self, player: PlayerId) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|c| **c == Some(player))
            .count()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            let line: String = row
                .iter()
                .map(|c| match c {
                    Some(id) => char::from_digit(*id % 36, 36).unwrap_or('#'),
                    None => '.',
                })
                .collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Rectangular footprint of a piece. Serialized as text rows of `X` (filled)
/// and `.` (empty), e.g. `["XX", "X."]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Shape {
    rows: Vec<Vec<bool>>,
}

impl Shape {
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, ShapeError> {
        if rows.is_empty() {
            return Err(ShapeError::Empty);
        }
        let width = rows[0].as_ref().chars().count();
        if width == 0 {
            return Err(ShapeError::Empty);
        }
        let mut parsed = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let len = row.chars().count();
            if len != width {
                return Err(ShapeError::RaggedRow {
                    row: i,
                    expected: width,
                    actual: len,
                });
            }
            let cells = row
                .chars()
                .map(|c| match c {
                    'X' | 'x' => Ok(true),
                    '.' | ' ' => Ok(false),
                    other => Err(ShapeError::BadChar(other)),
                })
                .collect::<Result<Vec<bool>, ShapeError>>()?;
            parsed.push(cells);
        }
        Ok(Self { rows: parsed })
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    /// Side of the smallest square that holds the whole shape.
    pub fn extent(&self) -> usize {
        self.height().max(self.width())
    }

    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    }

    /// Offsets of filled cells, row-major.
    pub fn filled_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, filled)| **filled)
                .map(move |(c, _)| (r, c))
        })
    }

    pub fn filled_count(&self) -> usize {
        self.filled_cells().count()
    }
}

impl TryFrom<Vec<String>> for Shape {
    type Error = ShapeError;

    fn try_from(rows: Vec<String>) -> Result<Self, Self::Error> {
        Shape::parse(&rows)
    }
}

impl From<Shape> for Vec<String> {
    fn from(shape: Shape) -> Self {
        shape
            .rows
            .iter()
            .map(|row| row.iter().map(|f| if *f { 'X' } else { '.' }).collect())
            .collect()
    }
}

/// Piece ids are scoped per owner: every player has their own piece 0..n.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub owner: PlayerId,
    pub shape: Shape,
}

impl Piece {
    pub fn key(&self) -> PieceKey {
        PieceKey {
            id: self.id,
            owner: self.owner,
        }
    }
}

/// Identity of a piece without its geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PieceKey {
    pub id: PieceId,
    pub owner: PlayerId,
}

/// Piece list in display order: highest id first.
pub fn display_order(pieces: &[Piece]) -> Vec<&Piece> {
    let mut sorted: Vec<&Piece> = pieces.iter().collect();
    sorted.sort_by(|a, b| b.id.cmp(&a.id).then(a.owner.cmp(&b.owner)));
    sorted
}

/// One accepted placement. Sequence numbers start at 1 and are contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub player: PlayerId,
    pub piece: PieceId,
    pub position: Position,
    pub sequence: u64,
}

impl Turn {
    pub fn piece_key(&self) -> PieceKey {
        PieceKey {
            id: self.piece,
            owner: self.player,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRequest {
    pub player: PlayerId,
    pub piece: PieceId,
    pub position: Position,
}

/// Engine answer to an accepted placement: the full new board and the turn
/// the engine recorded for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementAccepted {
    pub board: Board,
    pub turn: Turn,
}

/// Everything a session caches from the engine, fetched in one go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub board: Board,
    pub players: Vec<Player>,
    pub pieces: Vec<Piece>,
    /// Not-yet-placed pieces of every player.
    pub available: Vec<Piece>,
    pub turns: Vec<Turn>,
}
