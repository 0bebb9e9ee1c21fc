//! Board state machine and the pieces around it.
//!
//! - [`Board`] - grid, falling piece, line clears, game over, feature vector
//! - [`BoardConfig`] / [`RewardConfig`] - game-over height and reward shaping
//! - [`BoardMetrics`] - hole count (`bad_pos`) and bumpiness (`var`) with their
//!   previous values
//! - [`GameStats`] / [`BatchStats`] - per-game and per-batch line counts
//! - [`PieceGenerator`] / [`PieceSeed`] - seeded uniform piece source
//! - [`BoardSnapshot`] - detached copy for observers
//!
//! # Placement Flow
//!
//! A learner typically drives the board like this:
//!
//! 1. [`Board::spawn`] the next piece
//! 2. pick an [`Action`](crate::Action) from the [`Board::feature_vector`]
//! 3. [`Board::place`] it (drop and clear in one call)
//! 4. read [`Board::take_reward`], or stop on [`StepOutcome::GameOver`]
//!
//! # Example
//!
//! ```
//! use tdtris_engine::{Board, BoardConfig, StepOutcome};
//!
//! let mut board = Board::new(BoardConfig::default()).unwrap();
//! let kind = board.spawn(None).unwrap().piece.kind();
//! let action = kind.actions()[0];
//!
//! match board.place(action).unwrap() {
//!     StepOutcome::Settled(lines) => println!("cleared {lines}, reward {}", board.take_reward()),
//!     StepOutcome::GameOver => println!("game over"),
//!     _ => unreachable!(),
//! }
//! ```

pub use self::{
    board::*, config::*, game_stats::*, piece_generator::*, reward::*, snapshot::*,
};

mod board;
mod config;
mod game_stats;
mod piece_generator;
mod reward;
mod snapshot;
