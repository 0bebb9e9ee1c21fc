//! Linear Q-learning player for the tdtris board.
//!
//! - [`QLearnPlayer`] - epsilon-greedy action selection and TD(0) updates
//! - [`WeightTable`] - one weight vector per `(kind, rotation, offset)`, with
//!   JSON persistence
//!
//! The player never touches a [`Board`](tdtris_engine::Board): the driver feeds
//! it feature vectors and rewards, and applies the returned actions itself.

pub use self::{q_learning::*, weights::*};

mod q_learning;
pub mod weights;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum AgentError {
    #[display("update called without a selected action")]
    NoPendingAction,
    #[display("invalid agent parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[display("feature vector has {found} entries, the weight table expects {expected}")]
    FeatureDim { expected: usize, found: usize },
    #[display("weight shape {shape} does not cover the board's action space")]
    ActionSpace { shape: WeightShape },
}
