use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tdtris_agent::QLearnPlayer;
use tdtris_engine::{BatchSummary, Board, StepOutcome};

use crate::TrainingError;

/// File name of the backup copy rewritten at every checkpoint.
pub const LATEST_CHECKPOINT: &str = "theta.latest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Games per reporting batch.
    pub report_interval: usize,
    /// Batches between checkpoints.
    pub checkpoint_interval: usize,
    /// Reward fed to the agent for the placement that ends a game.
    pub game_over_reward: f64,
    /// Directory checkpoints are written to.
    pub output_dir: PathBuf,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            report_interval: 1000,
            checkpoint_interval: 10,
            game_over_reward: -3.0,
            output_dir: PathBuf::from("."),
        }
    }
}

/// When to end a training run. With neither limit set, training runs until
/// the process is stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopCondition {
    /// Stop after this many games.
    pub max_games: Option<usize>,
    /// Stop as soon as a single game reaches this many lines.
    pub target_lines: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    MaxGames,
    TargetLines { lines: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// 1-based batch number.
    pub batch: usize,
    pub summary: BatchSummary,
    /// Named checkpoint written after this batch, if any.
    pub checkpoint: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub games: usize,
    pub best_lines: usize,
    pub reason: StopReason,
    pub reports: Vec<BatchReport>,
    /// Checkpoint written when training stopped.
    pub final_checkpoint: PathBuf,
}

/// Result of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameResult {
    pub lines: usize,
    pub pieces: usize,
    /// `false` when the game was cut short by [`StopCondition::target_lines`].
    pub game_over: bool,
}

/// Plays training games between a [`Board`] and a [`QLearnPlayer`].
///
/// Each placement is one transition: the player picks an action from the
/// board's feature vector, the board places the piece, and the player learns
/// from the shaped reward and the next feature vector, bootstrapping with the
/// real upcoming piece. The placement that ends a game is learned with a blank
/// feature vector and [`TrainerConfig::game_over_reward`].
///
/// Every [`TrainerConfig::report_interval`] finished games a [`BatchReport`]
/// is logged, and every [`TrainerConfig::checkpoint_interval`] batches the
/// weights are saved as `theta_<best>_<average>.json` plus
/// [`LATEST_CHECKPOINT`].
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self, TrainingError> {
        if config.report_interval == 0 {
            return Err(TrainingError::ZeroInterval {
                name: "report_interval",
            });
        }
        if config.checkpoint_interval == 0 {
            return Err(TrainingError::ZeroInterval {
                name: "checkpoint_interval",
            });
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Plays one game from an empty board.
    ///
    /// Stops early, without a game over, once the game reaches `target_lines`.
    pub fn play_game(
        &self,
        board: &mut Board,
        agent: &mut QLearnPlayer,
        target_lines: Option<usize>,
    ) -> Result<GameResult, TrainingError> {
        board.reset();
        loop {
            let kind = board.spawn(None)?.piece.kind();
            let action = agent.select_action(&board.feature_vector(), kind)?;
            let outcome = board.place(action)?;
            let next = Some(board.peek_next_kind());

            if outcome == StepOutcome::GameOver {
                board.take_reward();
                agent.update(&board.feature_vector(), self.config.game_over_reward, next)?;
            } else {
                let reward = board.take_reward();
                agent.update(&board.feature_vector(), reward, next)?;
            }

            let stats = board.stats();
            let result = GameResult {
                lines: stats.total_cleared_lines(),
                pieces: stats.completed_pieces(),
                game_over: outcome == StepOutcome::GameOver,
            };
            if result.game_over || target_lines.is_some_and(|target| result.lines >= target) {
                return Ok(result);
            }
        }
    }

    /// Trains until `stop` is met.
    pub fn run(
        &self,
        board: &mut Board,
        agent: &mut QLearnPlayer,
        stop: StopCondition,
    ) -> Result<TrainingSummary, TrainingError> {
        fs::create_dir_all(&self.config.output_dir).map_err(|source| TrainingError::Io {
            path: self.config.output_dir.clone(),
            source,
        })?;
        tracing::info!(
            output_dir = %self.config.output_dir.display(),
            max_games = ?stop.max_games,
            target_lines = ?stop.target_lines,
            "training started"
        );

        let mut reports = Vec::new();
        let mut games = 0;
        let mut best_lines = 0;
        let reason = loop {
            let result = self.play_game(board, agent, stop.target_lines)?;
            games += 1;
            best_lines = best_lines.max(result.lines);
            tracing::debug!(
                game = games,
                lines = result.lines,
                pieces = result.pieces,
                "game finished"
            );

            if !result.game_over {
                tracing::info!(game = games, lines = result.lines, "target lines reached");
                break StopReason::TargetLines {
                    lines: result.lines,
                };
            }

            if board.batch().games() >= self.config.report_interval {
                let report = self.finish_batch(board, agent, reports.len() + 1)?;
                reports.push(report);
            }

            if stop.max_games.is_some_and(|max| games >= max) {
                break StopReason::MaxGames;
            }
        };

        let final_checkpoint = self.save_checkpoint(
            agent,
            best_lines,
            board.batch().average_lines(),
        )?;
        tracing::info!(
            games,
            best_lines,
            checkpoint = %final_checkpoint.display(),
            "training stopped"
        );
        Ok(TrainingSummary {
            games,
            best_lines,
            reason,
            reports,
            final_checkpoint,
        })
    }

    fn finish_batch(
        &self,
        board: &mut Board,
        agent: &QLearnPlayer,
        batch: usize,
    ) -> Result<BatchReport, TrainingError> {
        let summary = board.take_batch_summary();
        tracing::info!(
            batch,
            games = summary.total_games,
            average_lines = summary.average_lines,
            best_lines = summary.best_lines,
            "batch finished"
        );

        let checkpoint = if batch % self.config.checkpoint_interval == 0 {
            Some(self.save_checkpoint(agent, summary.best_lines, summary.average_lines)?)
        } else {
            None
        };
        Ok(BatchReport {
            batch,
            summary,
            checkpoint,
        })
    }

    /// Saves the weights under a name built from the scores, and again as
    /// [`LATEST_CHECKPOINT`]. Returns the named path.
    fn save_checkpoint(
        &self,
        agent: &QLearnPlayer,
        best_lines: usize,
        average_lines: f64,
    ) -> Result<PathBuf, TrainingError> {
        let path = checkpoint_path(&self.config.output_dir, best_lines, average_lines);
        agent.save_weights(&path)?;
        agent.save_weights(self.config.output_dir.join(LATEST_CHECKPOINT))?;
        tracing::info!(path = %path.display(), "checkpoint saved");
        Ok(path)
    }
}

/// `theta_<best>_<average>.json` inside `dir`, the average with three
/// decimals.
#[must_use]
pub fn checkpoint_path(dir: &Path, best_lines: usize, average_lines: f64) -> PathBuf {
    dir.join(format!("theta_{best_lines}_{average_lines:.3}.json"))
}
