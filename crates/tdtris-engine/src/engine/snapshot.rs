use std::fmt;

use serde::Serialize;

use crate::{
    core::{
        grid::{BOARD_HEIGHT, BOARD_WIDTH, Grid},
        piece::PieceKind,
    },
    engine::{
        board::{Board, BoardState, FallingPiece},
        game_stats::GameStats,
        reward::BoardMetrics,
    },
};

/// Immutable copy of everything an observer needs to show a board.
///
/// Snapshots are detached from the board, so they can be sent to another
/// thread while play continues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub grid: Grid,
    pub falling: Option<FallingPiece>,
    pub next: PieceKind,
    pub state: BoardState,
    pub stats: GameStats,
    pub metrics: BoardMetrics,
}

impl BoardSnapshot {
    #[must_use]
    pub fn new(board: &Board) -> Self {
        Self {
            grid: board.grid().clone(),
            falling: board.falling_piece().copied(),
            next: board.peek_next_kind(),
            state: board.state(),
            stats: board.stats().clone(),
            metrics: *board.metrics(),
        }
    }
}

/// Text dump of the grid with the falling piece drawn in lowercase.
impl fmt::Display for BoardSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rows = [['.'; BOARD_WIDTH]; BOARD_HEIGHT];
        for (row, cells) in self.grid.rows().enumerate() {
            for (col, block) in cells.iter().enumerate() {
                rows[row][col] = block.as_char();
            }
        }
        if let Some(falling) = &self.falling {
            let ch = falling.piece.kind().as_char().to_ascii_lowercase();
            for (col, row) in falling.cells() {
                rows[row][col] = ch;
            }
        }
        for row in rows.iter().rev() {
            writeln!(f, "|{}|", row.iter().collect::<String>())?;
        }
        writeln!(f, "+{}+", "-".repeat(BOARD_WIDTH))?;
        write!(
            f,
            "lines: {}  pieces: {}  next: {}  state: {:?}",
            self.stats.total_cleared_lines(),
            self.stats.completed_pieces(),
            self.next.as_char(),
            self.state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, BoardConfig, PieceSeed};

    #[test]
    fn test_snapshot_is_detached() {
        let mut board = Board::new(BoardConfig {
            seed: Some(PieceSeed::from(1)),
            ..BoardConfig::default()
        })
        .unwrap();
        board.spawn(Some(PieceKind::T)).unwrap();
        let before = board.snapshot();
        board.place(Action::new(0, 0)).unwrap();

        assert!(before.state.is_falling());
        assert_eq!(before.grid, Grid::EMPTY);
        assert_eq!(before.falling.unwrap().piece.kind(), PieceKind::T);
        assert_eq!(board.snapshot().grid.occupied_count(), 4);
        assert!(board.snapshot().falling.is_none());
    }

    #[test]
    fn test_display_overlays_falling_piece() {
        let mut board = Board::new(BoardConfig::default()).unwrap();
        board.spawn(Some(PieceKind::Square)).unwrap();
        board.place(Action::new(0, 0)).unwrap();
        board.spawn(Some(PieceKind::Square)).unwrap();

        let text = board.snapshot().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "|....oo....|");
        assert_eq!(lines[BOARD_HEIGHT - 1], "|OO........|");
        assert_eq!(lines[BOARD_HEIGHT], "+----------+");
        assert!(lines[BOARD_HEIGHT + 1].starts_with("lines: 0  pieces: 1"));
    }

    #[test]
    fn test_snapshot_serializes_grid_rows() {
        let board = Board::new(BoardConfig::default()).unwrap();
        let value = serde_json::to_value(board.snapshot()).unwrap();
        let rows = value["grid"].as_array().unwrap();
        assert_eq!(rows.len(), BOARD_HEIGHT);
        assert_eq!(rows[0], "..........");
        assert_eq!(value["state"], "Idle");
    }
}
