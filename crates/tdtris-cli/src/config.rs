use std::path::Path;

use serde::{Deserialize, Serialize};
use tdtris_agent::{AgentConfig, QLearnPlayer, WeightShape};
use tdtris_engine::{Board, BoardConfig};
use tdtris_training::{ReplayConfig, StopCondition, TrainerConfig};

use crate::util;

/// Everything a run can be configured with, loadable from one JSON file.
///
/// Missing sections and fields fall back to their defaults, so `{}` is a
/// valid config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub board: BoardConfig,
    pub agent: AgentConfig,
    pub trainer: TrainerConfig,
    pub stop: StopCondition,
    pub replay: ReplayConfig,
}

impl AppConfig {
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let config = util::read_json(path, "config")?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub(crate) fn build_board(&self) -> anyhow::Result<Board> {
        Ok(Board::new(self.board)?)
    }

    /// Creates a player sized for `board`, optionally starting from stored weights.
    pub(crate) fn build_player(
        &self,
        board: &Board,
        weights: Option<&Path>,
    ) -> anyhow::Result<QLearnPlayer> {
        let shape = WeightShape::for_board(board.feature_dim());
        let mut player = QLearnPlayer::new(self.agent, shape)?;
        if let Some(path) = weights {
            player.load_weights(path)?;
            tracing::info!(path = %path.display(), "loaded weights");
        }
        Ok(player)
    }
}
