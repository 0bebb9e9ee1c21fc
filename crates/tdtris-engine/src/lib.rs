//! Falling-block puzzle engine built for self-play learning.
//!
//! - [`core`] - static piece geometry, the grid with its height-mark table,
//!   and the feature vector encoding
//! - [`engine`] - the [`Board`] state machine, rewards, piece generation and
//!   statistics

pub use self::{core::*, engine::*};

pub mod core;
pub mod engine;

/// Misuse of the board state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum BoardError {
    #[display("game is over; reset the board first")]
    GameOver,
    #[display("a piece is already falling")]
    PieceAlreadyFalling,
    #[display("no piece is falling")]
    NoFallingPiece,
    #[display("full lines are waiting to be cleared")]
    LinesPending,
    #[display("no full lines to clear")]
    NoLinesPending,
}

/// Rejected board configuration.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("game over height {value} leaves no room to land pieces (max {max})")]
    GameOverHeight { value: usize, max: usize },
    #[display("line exponent must not be negative, got {value}")]
    NegativeLineExponent { value: i32 },
}
