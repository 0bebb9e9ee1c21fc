use serde::Serialize;

use crate::{
    BoardError, ConfigError,
    core::{
        feature::FeatureVector,
        grid::{BOARD_HEIGHT, BOARD_WIDTH, Block, Grid},
        piece::{Action, CELL_COUNT, Piece, PieceKind},
    },
    engine::{
        config::BoardConfig,
        game_stats::{BatchStats, BatchSummary, GameStats},
        piece_generator::PieceGenerator,
        reward::BoardMetrics,
        snapshot::BoardSnapshot,
    },
};

/// Row a freshly spawned piece's local row 0 starts at.
const SPAWN_ROW: usize = BOARD_HEIGHT - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::IsVariant)]
pub enum BoardState {
    /// No piece is falling; the next one can be spawned.
    Idle,
    Falling,
    /// A landing filled one or more rows that have not been removed yet.
    LinesPending,
    /// The stack grew past the game-over height. Terminal until reset.
    GameOver,
}

/// Result of a board step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum StepOutcome {
    /// The piece is still in the air.
    Falling,
    /// The piece landed and filled this many rows, awaiting
    /// [`Board::resolve_clears`].
    LinesPending(usize),
    /// The placement is complete after clearing this many lines.
    Settled(usize),
    GameOver,
}

/// The falling piece together with the board row of its local row 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FallingPiece {
    pub piece: Piece,
    pub drop_row: usize,
}

impl FallingPiece {
    /// Board cells covered by the piece as `(col, row)`; cells that would
    /// sit below the floor are omitted.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + use<> {
        let drop_row = self.drop_row;
        self.piece
            .cells()
            .filter_map(move |(local_row, col)| Some((col, drop_row.checked_sub(local_row)?)))
    }
}

/// The playfield state machine.
///
/// # Lifecycle
///
/// ```text
/// Idle --spawn--> Falling --advance/hard_drop--> Idle
///                                           \--> LinesPending --resolve_clears--> Idle
///                                           \--> GameOver (also after resolve_clears)
/// ```
///
/// Landing never steps row by row: the piece drops straight to the anchor row
/// where its lowest-clearance cell touches the stack (see
/// [`Grid::landing_anchor`]).
///
/// # Example
///
/// ```
/// use tdtris_engine::{Action, Board, BoardConfig, PieceKind, StepOutcome};
///
/// let mut board = Board::new(BoardConfig::default()).unwrap();
/// board.spawn(Some(PieceKind::Line)).unwrap();
/// let outcome = board.place(Action::new(1, 3)).unwrap();
///
/// assert_eq!(outcome, StepOutcome::Settled(0));
/// assert_eq!(board.grid().heights(), [0, 0, 0, 1, 1, 1, 1, 0, 0, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct Board {
    config: BoardConfig,
    grid: Grid,
    state: BoardState,
    falling: Option<FallingPiece>,
    generator: PieceGenerator,
    stats: GameStats,
    batch: BatchStats,
    metrics: BoardMetrics,
    pending_lines: usize,
    last_cleared_lines: usize,
    placed_cells: usize,
    removed_cells: usize,
}

impl Board {
    pub fn new(config: BoardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let generator = config
            .seed
            .map_or_else(PieceGenerator::new, PieceGenerator::with_seed);
        Ok(Self {
            config,
            grid: Grid::EMPTY,
            state: BoardState::Idle,
            falling: None,
            generator,
            stats: GameStats::new(),
            batch: BatchStats::default(),
            metrics: BoardMetrics::default(),
            pending_lines: 0,
            last_cleared_lines: 0,
            placed_cells: 0,
            removed_cells: 0,
        })
    }

    /// Starts a new game. Batch statistics and the piece sequence carry over.
    pub fn reset(&mut self) {
        self.grid = Grid::EMPTY;
        self.state = BoardState::Idle;
        self.falling = None;
        self.stats = GameStats::new();
        self.metrics = BoardMetrics::default();
        self.pending_lines = 0;
        self.last_cleared_lines = 0;
        self.placed_cells = 0;
        self.removed_cells = 0;
    }

    #[must_use]
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn state(&self) -> BoardState {
        self.state
    }

    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.state.is_game_over()
    }

    #[must_use]
    pub fn falling_piece(&self) -> Option<&FallingPiece> {
        self.falling.as_ref()
    }

    /// Board cells of the falling piece as `(col, row)`; empty when idle.
    pub fn falling_cells(&self) -> impl Iterator<Item = (usize, usize)> + use<> {
        self.falling.into_iter().flat_map(|falling| falling.cells())
    }

    #[must_use]
    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    #[must_use]
    pub fn batch(&self) -> &BatchStats {
        &self.batch
    }

    /// Closes the current reporting batch.
    pub fn take_batch_summary(&mut self) -> BatchSummary {
        self.batch.take_summary()
    }

    #[must_use]
    pub fn metrics(&self) -> &BoardMetrics {
        &self.metrics
    }

    /// The kind the next `spawn(None)` will produce.
    #[must_use]
    pub fn peek_next_kind(&self) -> PieceKind {
        self.generator.peek_next()
    }

    /// Length of [`Self::feature_vector`].
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        BOARD_WIDTH * self.config.feature_slot_len()
    }

    /// Encodes the current grid; all zeros once the game is over.
    #[must_use]
    pub fn feature_vector(&self) -> FeatureVector {
        if self.is_game_over() {
            return FeatureVector::blank(self.feature_dim());
        }
        self.grid.feature_vector(self.config.feature_slot_len())
    }

    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot::new(self)
    }

    /// Creates a falling piece in rotation 0 at the spawn column.
    ///
    /// `None` takes the next piece from the board's generator.
    pub fn spawn(&mut self, kind: Option<PieceKind>) -> Result<&FallingPiece, BoardError> {
        match self.state {
            BoardState::Idle => {}
            BoardState::Falling => return Err(BoardError::PieceAlreadyFalling),
            BoardState::LinesPending => return Err(BoardError::LinesPending),
            BoardState::GameOver => return Err(BoardError::GameOver),
        }
        let kind = kind.unwrap_or_else(|| self.generator.pop_next());
        self.state = BoardState::Falling;
        Ok(self.falling.insert(FallingPiece {
            piece: Piece::new(kind),
            drop_row: SPAWN_ROW,
        }))
    }

    fn falling_mut(&mut self) -> Result<&mut FallingPiece, BoardError> {
        match self.state {
            BoardState::Falling => self.falling.as_mut().ok_or(BoardError::NoFallingPiece),
            BoardState::Idle => Err(BoardError::NoFallingPiece),
            BoardState::LinesPending => Err(BoardError::LinesPending),
            BoardState::GameOver => Err(BoardError::GameOver),
        }
    }

    /// Lowers the falling piece by `steps` rows, landing it once no clearance
    /// is left. `steps == 0` drops it straight to rest.
    pub fn advance(&mut self, steps: usize) -> Result<StepOutcome, BoardError> {
        let FallingPiece { piece, drop_row } = *self.falling_mut()?;
        let anchor = self.grid.landing_anchor(&piece);
        // a sideways move may leave the piece below its anchor; it then
        // lands at the anchor right away
        let clearance = drop_row.saturating_sub(anchor);
        if steps != 0 && steps < clearance {
            self.falling = Some(FallingPiece {
                piece,
                drop_row: drop_row - steps,
            });
            return Ok(StepOutcome::Falling);
        }
        self.falling = None;
        Ok(self.land(&piece, anchor))
    }

    pub fn hard_drop(&mut self) -> Result<StepOutcome, BoardError> {
        self.advance(0)
    }

    fn land(&mut self, piece: &Piece, anchor: usize) -> StepOutcome {
        let block = Block::Piece(piece.kind());
        for (local_row, col) in piece.cells() {
            self.grid.set_cell(col, anchor - local_row, block);
        }
        self.placed_cells += CELL_COUNT;

        let full_rows = self.grid.full_row_count();
        if full_rows > 0 {
            self.state = BoardState::LinesPending;
            self.pending_lines = full_rows;
            return StepOutcome::LinesPending(full_rows);
        }
        self.settle(0)
    }

    /// Removes full rows, shifting everything above them down.
    pub fn resolve_clears(&mut self) -> Result<StepOutcome, BoardError> {
        match self.state {
            BoardState::LinesPending => {}
            BoardState::Idle => return Err(BoardError::NoLinesPending),
            BoardState::Falling => return Err(BoardError::PieceAlreadyFalling),
            BoardState::GameOver => return Err(BoardError::GameOver),
        }
        let cleared = self.grid.clear_lines();
        debug_assert_eq!(cleared, self.pending_lines);
        self.pending_lines = 0;
        self.removed_cells += cleared * BOARD_WIDTH;
        Ok(self.settle(cleared))
    }

    fn settle(&mut self, cleared: usize) -> StepOutcome {
        let occupied = self.grid.occupied_count();
        assert_eq!(
            self.placed_cells - self.removed_cells,
            occupied,
            "placed/removed cell counter out of sync with the grid:\n{}",
            self.grid
        );

        self.stats.complete_piece_drop(cleared);
        self.last_cleared_lines = cleared;

        if self.grid.max_height() > self.config.game_over_height {
            self.state = BoardState::GameOver;
            self.batch.record_game(self.stats.total_cleared_lines());
            return StepOutcome::GameOver;
        }
        self.metrics.update(&self.grid);
        self.state = BoardState::Idle;
        StepOutcome::Settled(cleared)
    }

    /// Turns and shifts the falling piece per `action`, drops it and clears
    /// any full rows.
    pub fn place(&mut self, action: Action) -> Result<StepOutcome, BoardError> {
        self.falling_mut()?.piece.apply(action);
        match self.hard_drop()? {
            StepOutcome::LinesPending(_) => self.resolve_clears(),
            outcome => Ok(outcome),
        }
    }

    /// One driver tick: clears pending rows, else spawns when idle, else lets
    /// the falling piece drop one row (or all the way when `fast`).
    pub fn next_step(&mut self, fast: bool) -> Result<StepOutcome, BoardError> {
        match self.state {
            BoardState::LinesPending => self.resolve_clears(),
            BoardState::Idle => {
                self.spawn(None)?;
                Ok(StepOutcome::Falling)
            }
            BoardState::Falling => self.advance(if fast { 0 } else { 1 }),
            BoardState::GameOver => Err(BoardError::GameOver),
        }
    }

    fn with_falling(&mut self, f: impl FnOnce(&mut Piece) -> bool) -> bool {
        self.falling_mut().is_ok_and(|falling| f(&mut falling.piece))
    }

    pub fn move_left(&mut self) -> bool {
        self.with_falling(Piece::move_left)
    }

    pub fn move_right(&mut self) -> bool {
        self.with_falling(Piece::move_right)
    }

    pub fn rotate_left(&mut self) -> bool {
        self.with_falling(|piece| {
            piece.rotate_left(1);
            true
        })
    }

    pub fn rotate_right(&mut self) -> bool {
        self.with_falling(|piece| {
            piece.rotate_right(1);
            true
        })
    }

    pub fn set_offset(&mut self, offset: usize) -> bool {
        self.with_falling(|piece| piece.set_offset(offset))
    }

    pub fn apply_action(&mut self, action: Action) -> bool {
        self.with_falling(|piece| {
            piece.apply(action);
            true
        })
    }

    /// Reward for the latest settled placement.
    ///
    /// Consumes the one-shot cleared-lines counter, so a second call without
    /// a new placement only reflects the metric deltas.
    pub fn take_reward(&mut self) -> f64 {
        let lines = std::mem::take(&mut self.last_cleared_lines);
        self.config.reward.reward(&self.metrics, lines)
    }

    /// Writes a landed block directly, for setting up positions.
    ///
    /// Only valid while no piece is falling and no rows are pending; returns
    /// whether the cell changed. Call [`Self::refresh_metrics`] afterwards to
    /// take the new layout as the reward baseline.
    pub fn fill_cell(&mut self, col: usize, row: usize, kind: PieceKind) -> bool {
        if !self.state.is_idle() || !self.grid.cell(col, row).is_empty() {
            return false;
        }
        self.grid.set_cell(col, row, Block::Piece(kind));
        self.placed_cells += 1;
        true
    }

    /// Re-measures the grid and makes the result both the current and the
    /// previous metrics.
    pub fn refresh_metrics(&mut self) {
        self.metrics.update(&self.grid);
        self.metrics.update(&self.grid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::piece_generator::PieceSeed;

    fn new_board() -> Board {
        Board::new(BoardConfig {
            seed: Some(PieceSeed::from(0xdead_beef)),
            ..BoardConfig::default()
        })
        .unwrap()
    }

    fn fill_row_except(board: &mut Board, row: usize, holes: &[usize]) {
        for col in (0..BOARD_WIDTH).filter(|col| !holes.contains(col)) {
            assert!(board.fill_cell(col, row, PieceKind::Square));
        }
    }

    #[test]
    fn test_line_at_offset_3_lands_on_floor() {
        let mut board = new_board();
        board.spawn(Some(PieceKind::Line)).unwrap();
        board.rotate_right();
        assert!(board.set_offset(3));
        assert_eq!(board.hard_drop().unwrap(), StepOutcome::Settled(0));

        for col in 0..BOARD_WIDTH {
            let expected = if (3..=6).contains(&col) {
                Block::Piece(PieceKind::Line)
            } else {
                Block::Empty
            };
            assert_eq!(board.grid().cell(col, 0), expected);
        }
        assert_eq!(board.grid().heights(), [0, 0, 0, 1, 1, 1, 1, 0, 0, 0]);
        assert_eq!(board.metrics().bad_pos(), 0);
        assert_eq!(board.stats().total_cleared_lines(), 0);
        assert!(board.state().is_idle());
    }

    #[test]
    fn test_rotation_zero_lands_at_row_zero() {
        for kind in PieceKind::ALL {
            for offset in kind.legal_offsets(0) {
                let mut board = new_board();
                board.spawn(Some(kind)).unwrap();
                board.place(Action::new(0, offset)).unwrap();
                let lowest = (0..BOARD_HEIGHT).find(|&row| {
                    (0..BOARD_WIDTH).any(|col| !board.grid().cell(col, row).is_empty())
                });
                assert_eq!(lowest, Some(0), "{kind:?} at {offset}");
                assert_eq!(board.grid().occupied_count(), CELL_COUNT);
            }
        }
    }

    #[test]
    fn test_single_cell_line_clear() {
        let mut board = new_board();
        fill_row_except(&mut board, 0, &[9]);
        assert!(board.fill_cell(0, 1, PieceKind::T));
        assert!(board.fill_cell(1, 2, PieceKind::Z));
        board.refresh_metrics();

        board.spawn(Some(PieceKind::Line)).unwrap();
        assert!(board.set_offset(9));
        assert_eq!(board.hard_drop().unwrap(), StepOutcome::LinesPending(1));
        assert!(board.state().is_lines_pending());
        assert!(board.spawn(None).is_err());

        assert_eq!(board.resolve_clears().unwrap(), StepOutcome::Settled(1));
        assert_eq!(board.stats().total_cleared_lines(), 1);
        assert_eq!(board.grid().cell(0, 0), Block::Piece(PieceKind::T));
        assert_eq!(board.grid().cell(1, 1), Block::Piece(PieceKind::Z));
        assert_eq!(board.grid().heights(), [1, 2, 0, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(board.grid().occupied_count(), 2 + 3);
    }

    #[test]
    fn test_place_resolves_clears() {
        let mut board = new_board();
        fill_row_except(&mut board, 0, &[4, 5]);
        fill_row_except(&mut board, 1, &[4, 5]);
        board.refresh_metrics();

        board.spawn(Some(PieceKind::Square)).unwrap();
        assert_eq!(board.place(Action::new(0, 4)).unwrap(), StepOutcome::Settled(2));
        assert_eq!(*board.grid(), Grid::EMPTY);
        assert_eq!(board.stats().line_cleared_counter()[2], 1);

        // holes gone (0 -> 0), surface flattened (4 -> 0), two lines
        let reward = board.take_reward();
        assert!((reward - (4.0 + 4.0 * 2.0)).abs() < 1e-12);
        // the line bonus is consumed
        assert!((board.take_reward() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_reward_tracks_metric_changes() {
        let mut board = new_board();
        board.spawn(Some(PieceKind::Square)).unwrap();
        board.place(Action::new(0, 0)).unwrap();
        // heights [2, 2, 0, ...]: var 2, no holes
        assert!((board.take_reward() - (-2.0)).abs() < 1e-12);

        board.spawn(Some(PieceKind::Line)).unwrap();
        board.place(Action::new(1, 0)).unwrap();
        // horizontal line on cols 0..=3 rests on the square: 2 holes under cols 2, 3
        assert_eq!(board.metrics().bad_pos(), 4);
        let expected = 7.0 * -4.0 + (2.0 - 3.0);
        assert!((board.take_reward() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_game_over_after_stack_breach() {
        let mut board = new_board();
        for _ in 0..4 {
            board.spawn(Some(PieceKind::Line)).unwrap();
            assert_eq!(board.place(Action::new(0, 0)).unwrap(), StepOutcome::Settled(0));
        }
        assert_eq!(board.grid().column_height(0), 16);

        board.spawn(Some(PieceKind::Line)).unwrap();
        assert_eq!(board.place(Action::new(0, 0)).unwrap(), StepOutcome::GameOver);
        assert!(board.is_game_over());
        assert_eq!(board.batch().games(), 1);
        assert_eq!(board.stats().completed_pieces(), 5);

        assert_eq!(board.spawn(None).unwrap_err(), BoardError::GameOver);
        assert_eq!(board.next_step(false).unwrap_err(), BoardError::GameOver);
        assert!(!board.move_left());
        let features = board.feature_vector();
        assert_eq!(features.len(), board.feature_dim());
        assert_eq!(features.active_indices().count(), 0);

        board.reset();
        assert!(board.state().is_idle());
        assert_eq!(*board.grid(), Grid::EMPTY);
        assert_eq!(board.stats().completed_pieces(), 0);
        assert_eq!(board.batch().games(), 1);
    }

    #[test]
    fn test_next_step_drives_a_piece_to_rest() {
        let mut board = new_board();
        let kind = board.peek_next_kind();
        assert_eq!(board.next_step(false).unwrap(), StepOutcome::Falling);
        let falling = *board.falling_piece().unwrap();
        assert_eq!(falling.piece.kind(), kind);
        assert_eq!(falling.drop_row, SPAWN_ROW);

        let anchor = board.grid().landing_anchor(&falling.piece);
        let mut ticks = 0;
        let outcome = loop {
            ticks += 1;
            match board.next_step(false).unwrap() {
                StepOutcome::Falling => {}
                outcome => break outcome,
            }
        };
        assert_eq!(outcome, StepOutcome::Settled(0));
        assert_eq!(ticks, SPAWN_ROW - anchor);
        assert!(board.falling_piece().is_none());
    }

    #[test]
    fn test_misuse_is_reported() {
        let mut board = new_board();
        assert_eq!(board.advance(1).unwrap_err(), BoardError::NoFallingPiece);
        assert_eq!(board.resolve_clears().unwrap_err(), BoardError::NoLinesPending);
        assert!(!board.move_right());

        board.spawn(None).unwrap();
        assert_eq!(board.spawn(None).unwrap_err(), BoardError::PieceAlreadyFalling);
        assert!(!board.fill_cell(0, 0, PieceKind::T));
    }

    #[test]
    fn test_out_of_range_offset_keeps_spawn_column() {
        let mut board = new_board();
        board.spawn(Some(PieceKind::Square)).unwrap();
        assert!(!board.set_offset(usize::MAX));
        assert!(board.apply_action(Action::new(0, usize::MAX)));
        assert_eq!(
            board.falling_piece().unwrap().piece.offset(),
            Piece::SPAWN_OFFSET
        );

        assert_eq!(
            board.place(Action::new(0, usize::MAX)).unwrap(),
            StepOutcome::Settled(0)
        );
        assert_eq!(board.grid().heights(), [0, 0, 0, 0, 2, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_spawn_uses_generator_order() {
        let mut board = new_board();
        let mut generator = PieceGenerator::with_seed(PieceSeed::from(0xdead_beef));
        for _ in 0..10 {
            let falling = board.spawn(None).unwrap();
            assert_eq!(falling.piece.kind(), generator.pop_next());
            board.hard_drop().unwrap();
            board.reset();
        }
    }

    #[test]
    fn test_falling_cells_follow_moves() {
        let mut board = new_board();
        board.spawn(Some(PieceKind::Square)).unwrap();
        let cells: Vec<_> = board.falling_cells().collect();
        assert_eq!(cells, vec![(4, 19), (4, 18), (5, 19), (5, 18)]);

        assert!(board.move_left());
        assert!(board.advance(2).unwrap().is_falling());
        let cells: Vec<_> = board.falling_cells().collect();
        assert_eq!(cells, vec![(3, 17), (3, 16), (4, 17), (4, 16)]);
    }
}
