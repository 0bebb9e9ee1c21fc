use std::{
    sync::mpsc::{self, Receiver, SyncSender},
    thread::{self, JoinHandle},
};

use serde::{Deserialize, Serialize};
use tdtris_agent::{AgentMode, QLearnPlayer};
use tdtris_engine::{Board, BoardSnapshot, StepOutcome};

use crate::TrainingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Stop after this many pieces even if the game goes on.
    pub max_pieces: Option<usize>,
    /// Snapshots buffered before the player thread waits for the consumer.
    pub channel_capacity: usize,
    /// Publish only settled boards instead of every row of the descent.
    pub fast: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_pieces: None,
            channel_capacity: 16,
            fast: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub pieces: usize,
    pub lines: usize,
    pub game_over: bool,
    /// `true` when the consumer hung up before the game ended.
    pub disconnected: bool,
}

/// A greedy game running on its own thread.
///
/// The thread owns the board and the player; the consumer only sees
/// [`BoardSnapshot`]s arriving over a bounded channel.
#[derive(Debug)]
pub struct ReplayHandle {
    snapshots: Receiver<BoardSnapshot>,
    handle: JoinHandle<Result<ReplaySummary, TrainingError>>,
}

impl ReplayHandle {
    /// Blocks for the next snapshot; `None` once the game has ended.
    #[must_use]
    pub fn recv(&self) -> Option<BoardSnapshot> {
        self.snapshots.recv().ok()
    }

    /// Iterates snapshots until the game ends.
    pub fn snapshots(&self) -> impl Iterator<Item = BoardSnapshot> + '_ {
        self.snapshots.iter()
    }

    /// Stops listening and waits for the player thread.
    pub fn join(self) -> Result<ReplaySummary, TrainingError> {
        let Self { snapshots, handle } = self;
        drop(snapshots);
        handle.join().map_err(|_| TrainingError::ReplayPanicked)?
    }
}

/// Starts playing one game with `agent` in evaluation mode on a fresh board.
#[must_use]
pub fn spawn_replay(board: Board, agent: QLearnPlayer, config: ReplayConfig) -> ReplayHandle {
    let (tx, rx) = mpsc::sync_channel(config.channel_capacity);
    let handle = thread::spawn(move || play(board, agent, config, &tx));
    ReplayHandle {
        snapshots: rx,
        handle,
    }
}

fn play(
    mut board: Board,
    mut agent: QLearnPlayer,
    config: ReplayConfig,
    tx: &SyncSender<BoardSnapshot>,
) -> Result<ReplaySummary, TrainingError> {
    agent.set_mode(AgentMode::Evaluation);
    board.reset();

    let mut summary = ReplaySummary {
        pieces: 0,
        lines: 0,
        game_over: false,
        disconnected: false,
    };
    let publish = |board: &Board| tx.send(board.snapshot()).is_ok();

    if !publish(&board) {
        summary.disconnected = true;
        return Ok(summary);
    }
    while config.max_pieces.is_none_or(|max| summary.pieces < max) {
        let kind = board.spawn(None)?.piece.kind();
        let action = agent.select_action(&board.feature_vector(), kind)?;
        board.apply_action(action);

        let mut outcome = StepOutcome::Falling;
        while outcome.is_falling() {
            outcome = board.next_step(config.fast)?;
            if (!config.fast || !outcome.is_falling()) && !publish(&board) {
                summary.disconnected = true;
                return Ok(summary);
            }
        }
        if outcome.is_lines_pending() {
            outcome = board.resolve_clears()?;
            if !publish(&board) {
                summary.disconnected = true;
                return Ok(summary);
            }
        }

        summary.pieces += 1;
        summary.lines = board.stats().total_cleared_lines();
        if outcome.is_game_over() {
            summary.game_over = true;
            break;
        }
    }
    tracing::debug!(
        pieces = summary.pieces,
        lines = summary.lines,
        game_over = summary.game_over,
        "replay finished"
    );
    Ok(summary)
}
