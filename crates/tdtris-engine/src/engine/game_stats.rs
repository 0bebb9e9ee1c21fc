use serde::Serialize;

/// Per-game statistics.
///
/// # Example
///
/// ```
/// use tdtris_engine::GameStats;
///
/// let mut stats = GameStats::new();
/// stats.complete_piece_drop(0);
/// stats.complete_piece_drop(4);
///
/// assert_eq!(stats.completed_pieces(), 2);
/// assert_eq!(stats.total_cleared_lines(), 4);
/// assert_eq!(stats.line_cleared_counter()[4], 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameStats {
    completed_pieces: usize,
    total_cleared_lines: usize,
    line_cleared_counter: [usize; 5],
}

impl GameStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            completed_pieces: 0,
            total_cleared_lines: 0,
            line_cleared_counter: [0; 5],
        }
    }

    /// Number of pieces that have landed this game.
    #[must_use]
    pub const fn completed_pieces(&self) -> usize {
        self.completed_pieces
    }

    /// Lines removed this game.
    #[must_use]
    pub const fn total_cleared_lines(&self) -> usize {
        self.total_cleared_lines
    }

    /// Histogram of placements by number of lines cleared at once (0-4).
    #[must_use]
    pub const fn line_cleared_counter(&self) -> &[usize; 5] {
        &self.line_cleared_counter
    }

    /// Records a landed piece and the lines it cleared.
    pub const fn complete_piece_drop(&mut self, cleared_lines: usize) {
        self.completed_pieces += 1;
        self.total_cleared_lines += cleared_lines;
        if cleared_lines < self.line_cleared_counter.len() {
            self.line_cleared_counter[cleared_lines] += 1;
        }
    }
}

/// Line counts aggregated over a reporting batch of finished games.
///
/// `total_games` keeps counting across [`Self::take_summary`] calls; the other
/// counters restart with every batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    games: usize,
    total_lines: usize,
    best_lines: usize,
    total_games: usize,
}

/// Snapshot of one finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchSummary {
    pub games: usize,
    pub total_lines: usize,
    pub best_lines: usize,
    pub average_lines: f64,
    /// Games finished since the board was created, this batch included.
    pub total_games: usize,
}

impl BatchStats {
    pub fn record_game(&mut self, lines: usize) {
        self.games += 1;
        self.total_games += 1;
        self.total_lines += lines;
        self.best_lines = self.best_lines.max(lines);
    }

    #[must_use]
    pub fn games(&self) -> usize {
        self.games
    }

    #[must_use]
    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    #[must_use]
    pub fn best_lines(&self) -> usize {
        self.best_lines
    }

    #[must_use]
    pub fn total_games(&self) -> usize {
        self.total_games
    }

    /// Average lines per game in the current batch (0 for an empty batch).
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn average_lines(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.total_lines as f64 / self.games as f64
        }
    }

    /// Returns the current batch and starts a new one.
    pub fn take_summary(&mut self) -> BatchSummary {
        let summary = BatchSummary {
            games: self.games,
            total_lines: self.total_lines,
            best_lines: self.best_lines,
            average_lines: self.average_lines(),
            total_games: self.total_games,
        };
        self.games = 0;
        self.total_lines = 0;
        self.best_lines = 0;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_piece_drop_histogram() {
        let mut stats = GameStats::new();
        for lines in [0, 1, 1, 2, 0] {
            stats.complete_piece_drop(lines);
        }
        assert_eq!(stats.completed_pieces(), 5);
        assert_eq!(stats.total_cleared_lines(), 4);
        assert_eq!(stats.line_cleared_counter(), &[2, 2, 1, 0, 0]);
    }

    #[test]
    fn test_batch_summary_resets_batch_only() {
        let mut batch = BatchStats::default();
        batch.record_game(3);
        batch.record_game(10);
        batch.record_game(2);

        let summary = batch.take_summary();
        assert_eq!(summary.games, 3);
        assert_eq!(summary.total_lines, 15);
        assert_eq!(summary.best_lines, 10);
        assert!((summary.average_lines - 5.0).abs() < f64::EPSILON);
        assert_eq!(summary.total_games, 3);

        assert_eq!(batch.games(), 0);
        assert_eq!(batch.best_lines(), 0);
        batch.record_game(1);
        assert_eq!(batch.total_games(), 4);
        assert!((batch.average_lines() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_batch_average() {
        assert!(BatchStats::default().average_lines().abs() < f64::EPSILON);
    }
}
