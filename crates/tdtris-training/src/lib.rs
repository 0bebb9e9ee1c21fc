//! Self-play training and replay for the tdtris Q-learning player.
//!
//! - [`Trainer`] - plays training games, reports per-batch line statistics and
//!   writes weight checkpoints
//! - [`spawn_replay`] - plays a greedy game on a background thread and streams
//!   [`BoardSnapshot`](tdtris_engine::BoardSnapshot)s to the caller

use std::{io, path::PathBuf};

use tdtris_agent::{AgentError, WeightsError};
use tdtris_engine::BoardError;

pub use self::{replay::*, trainer::*};

mod replay;
mod trainer;

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum TrainingError {
    #[display("board rejected a step: {_0}")]
    #[from]
    Board(BoardError),
    #[display("agent failed: {_0}")]
    #[from]
    Agent(AgentError),
    #[display("checkpoint failed: {_0}")]
    #[from]
    Weights(WeightsError),
    #[display("cannot create output directory {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("{name} must be positive")]
    ZeroInterval { name: &'static str },
    #[display("replay thread panicked")]
    ReplayPanicked,
}
