use serde::{Deserialize, Serialize};

use crate::{
    ConfigError,
    core::grid::BOARD_HEIGHT,
    engine::{piece_generator::PieceSeed, reward::RewardConfig},
};

/// Rows above the game-over height that must stay free so that any piece
/// (at most 4 rows tall) can still land inside the grid.
const SPAWN_ROOM: usize = 4;

/// Board parameters.
///
/// Deserializes with defaults for missing fields, so `{}` is a valid config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// The game ends once any column grows taller than this.
    pub game_over_height: usize,
    pub reward: RewardConfig,
    /// Seed for the piece generator; `None` draws a random one.
    pub seed: Option<PieceSeed>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            game_over_height: 16,
            reward: RewardConfig::default(),
            seed: None,
        }
    }
}

impl BoardConfig {
    /// Largest accepted `game_over_height`.
    pub const MAX_GAME_OVER_HEIGHT: usize = BOARD_HEIGHT - SPAWN_ROOM;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game_over_height > Self::MAX_GAME_OVER_HEIGHT {
            return Err(ConfigError::GameOverHeight {
                value: self.game_over_height,
                max: Self::MAX_GAME_OVER_HEIGHT,
            });
        }
        self.reward.validate()
    }

    /// Entries per column in the feature vector.
    #[must_use]
    pub fn feature_slot_len(&self) -> usize {
        self.game_over_height + 1
    }
}
