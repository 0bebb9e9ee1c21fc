use std::path::Path;

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tdtris_engine::{Action, FeatureVector, PieceKind};

use crate::{
    AgentError,
    weights::{WeightShape, WeightTable, WeightsError},
};

/// Learning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Learning rate.
    pub alpha: f64,
    /// Discount factor.
    pub gamma: f64,
    /// Exploration probability in learning mode.
    pub epsilon: f64,
    /// Seed of the exploration RNG; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            alpha: 0.002,
            gamma: 0.8,
            epsilon: 0.0002,
            seed: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        let invalid = |name, value| Err(AgentError::InvalidParameter { name, value });
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return invalid("alpha", self.alpha);
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid("gamma", self.gamma);
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return invalid("epsilon", self.epsilon);
        }
        Ok(())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant,
)]
pub enum AgentMode {
    /// Explores with probability epsilon and applies TD updates.
    #[default]
    Learning,
    /// Always greedy; updates are ignored.
    Evaluation,
}

#[derive(Debug, Clone)]
struct PendingAction {
    features: FeatureVector,
    kind: PieceKind,
    action: Action,
}

/// Epsilon-greedy player with a linear action-value function trained by
/// one-step Q-learning.
///
/// One weight vector per `(kind, rotation, offset)`; the value of an action is
/// the dot product of its weight vector with the board's feature vector.
///
/// # Example
///
/// ```
/// use tdtris_agent::{AgentConfig, QLearnPlayer, WeightShape};
/// use tdtris_engine::{Board, BoardConfig, StepOutcome};
///
/// let mut board = Board::new(BoardConfig::default()).unwrap();
/// let shape = WeightShape::for_board(board.feature_dim());
/// let mut player = QLearnPlayer::new(AgentConfig::default(), shape).unwrap();
///
/// let kind = board.spawn(None).unwrap().piece.kind();
/// let action = player.select_action(&board.feature_vector(), kind).unwrap();
/// if let StepOutcome::Settled(_) = board.place(action).unwrap() {
///     let reward = board.take_reward();
///     let next = board.peek_next_kind();
///     player.update(&board.feature_vector(), reward, Some(next)).unwrap();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct QLearnPlayer {
    config: AgentConfig,
    mode: AgentMode,
    weights: WeightTable,
    rng: Pcg32,
    pending: Option<PendingAction>,
}

impl QLearnPlayer {
    /// Creates a learning player with all weights zero.
    ///
    /// `shape` must match the board's action space (see
    /// [`WeightShape::matches_action_space`]).
    pub fn new(config: AgentConfig, shape: WeightShape) -> Result<Self, AgentError> {
        config.validate()?;
        if !shape.matches_action_space() {
            return Err(AgentError::ActionSpace { shape });
        }
        let rng = config
            .seed
            .map_or_else(|| Pcg32::from_rng(&mut rand::rng()), Pcg32::seed_from_u64);
        Ok(Self {
            config,
            mode: AgentMode::Learning,
            weights: WeightTable::zeros(shape),
            rng,
            pending: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    /// Switches mode and drops any action awaiting its update.
    pub fn set_mode(&mut self, mode: AgentMode) {
        self.mode = mode;
        self.pending = None;
    }

    #[must_use]
    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    fn check_features(&self, features: &FeatureVector) -> Result<(), AgentError> {
        let expected = self.weights.shape().feature_dim;
        if features.len() != expected {
            return Err(AgentError::FeatureDim {
                expected,
                found: features.len(),
            });
        }
        Ok(())
    }

    /// Chooses an action for `kind` on the board described by `features`.
    ///
    /// In learning mode, with probability epsilon a uniformly random rotation
    /// and then a uniformly random legal offset are taken; otherwise the
    /// greedy [`Self::best_action`]. The choice is remembered for the next
    /// [`Self::update`].
    pub fn select_action(
        &mut self,
        features: &FeatureVector,
        kind: PieceKind,
    ) -> Result<Action, AgentError> {
        self.check_features(features)?;

        let action = if self.mode.is_learning() && self.rng.random_bool(self.config.epsilon) {
            let rotation = self.rng.random_range(0..kind.rotation_count());
            let offset = self.rng.random_range(kind.legal_offsets(rotation));
            let action = Action::new(rotation, offset);
            tracing::trace!(?kind, %action, "exploring");
            action
        } else {
            self.best_action(features, kind).0
        };

        if self.mode.is_learning() {
            self.pending = Some(PendingAction {
                features: features.clone(),
                kind,
                action,
            });
        }
        Ok(action)
    }

    /// The action with the highest value and that value.
    ///
    /// Actions are scanned rotation first, then offset, and only a strictly
    /// larger value replaces the current best, so ties go to the first one.
    ///
    /// # Panics
    ///
    /// Panics if `features` does not match the weight table's feature dimension.
    #[must_use]
    pub fn best_action(&self, features: &FeatureVector, kind: PieceKind) -> (Action, f64) {
        assert_eq!(features.len(), self.weights.shape().feature_dim);
        let mut best = (Action::default(), f64::NEG_INFINITY);
        for action in kind.actions() {
            let value = features.dot(self.weights.slot(kind, action));
            if value > best.1 {
                best = (action, value);
            }
        }
        best
    }

    /// Value of the board for the next decision.
    ///
    /// With a known next kind this is its best action value; otherwise the
    /// average of the best action values over all kinds.
    fn next_value(&self, features: &FeatureVector, next: Option<PieceKind>) -> f64 {
        match next {
            Some(kind) => self.best_action(features, kind).1,
            None => {
                let total: f64 = PieceKind::ALL
                    .iter()
                    .map(|&kind| self.best_action(features, kind).1)
                    .sum();
                #[expect(clippy::cast_precision_loss)]
                let count = PieceKind::LEN as f64;
                total / count
            }
        }
    }

    /// TD(0) update of the weight vector of the last selected action.
    ///
    /// ```text
    /// td = reward + gamma * next_value(new_features) - Q(features, action)
    /// w[kind][action] += alpha * td * features
    /// ```
    ///
    /// Returns the TD error, or `None` in evaluation mode where nothing is
    /// learned. A terminal transition is fed as a blank feature vector, whose
    /// next value is 0.
    pub fn update(
        &mut self,
        new_features: &FeatureVector,
        reward: f64,
        next: Option<PieceKind>,
    ) -> Result<Option<f64>, AgentError> {
        if self.mode.is_evaluation() {
            return Ok(None);
        }
        self.check_features(new_features)?;
        let PendingAction {
            features,
            kind,
            action,
        } = self.pending.take().ok_or(AgentError::NoPendingAction)?;

        let this_q = features.dot(self.weights.slot(kind, action));
        let next_q = self.next_value(new_features, next);
        let td_error = reward + self.config.gamma * next_q - this_q;

        let step = self.config.alpha * td_error;
        let slot = self.weights.slot_mut(kind, action);
        for i in features.active_indices() {
            slot[i] += step * features.as_slice()[i];
        }
        tracing::trace!(?kind, %action, reward, this_q, next_q, td_error, "td update");
        Ok(Some(td_error))
    }

    pub fn save_weights<P>(&self, path: P) -> Result<(), WeightsError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        self.weights.save(path)?;
        tracing::debug!(path = %path.display(), "saved weights");
        Ok(())
    }

    /// Replaces the weights with the table stored at `path`.
    ///
    /// The stored shape must equal the current one; on error the current
    /// weights are kept.
    pub fn load_weights<P>(&mut self, path: P) -> Result<(), WeightsError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        self.weights = WeightTable::load(path, self.weights.shape())?;
        self.pending = None;
        tracing::debug!(path = %path.display(), "loaded weights");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tdtris_engine::{Board, BoardConfig, PieceSeed, StepOutcome};

    use super::*;

    const DIM: usize = 4;

    fn greedy_config() -> AgentConfig {
        AgentConfig {
            epsilon: 0.0,
            seed: Some(1),
            ..AgentConfig::default()
        }
    }

    fn player(config: AgentConfig) -> QLearnPlayer {
        QLearnPlayer::new(config, WeightShape::for_board(DIM)).unwrap()
    }

    fn features(values: [f64; DIM]) -> FeatureVector {
        FeatureVector::from(values.to_vec())
    }

    #[test]
    fn test_config_validation() {
        assert!(AgentConfig::default().validate().is_ok());
        for config in [
            AgentConfig {
                alpha: 0.0,
                ..AgentConfig::default()
            },
            AgentConfig {
                gamma: 1.5,
                ..AgentConfig::default()
            },
            AgentConfig {
                epsilon: -0.1,
                ..AgentConfig::default()
            },
        ] {
            assert!(matches!(
                QLearnPlayer::new(config, WeightShape::for_board(DIM)),
                Err(AgentError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_shape_must_cover_action_space() {
        let undersized = WeightShape {
            piece_count: 1,
            max_rotations: 1,
            offset_count: 1,
            feature_dim: DIM,
        };
        let oversized = WeightShape {
            offset_count: 11,
            ..WeightShape::for_board(DIM)
        };
        for shape in [undersized, oversized, WeightShape::for_board(0)] {
            assert_eq!(
                QLearnPlayer::new(greedy_config(), shape).unwrap_err(),
                AgentError::ActionSpace { shape }
            );
        }
    }

    #[test]
    fn test_zero_weights_pick_first_action() {
        let p = player(greedy_config());
        let (action, value) = p.best_action(&features([1.0, 0.0, 1.0, 0.0]), PieceKind::T);
        assert_eq!(action, Action::new(0, 0));
        assert!(value.abs() < f64::EPSILON);
    }

    #[test]
    fn test_best_action_takes_strict_maximum() {
        let mut p = player(greedy_config());
        p.weights.slot_mut(PieceKind::L, Action::new(1, 3))[0] = 2.0;
        p.weights.slot_mut(PieceKind::L, Action::new(3, 1))[0] = 2.0;
        p.weights.slot_mut(PieceKind::L, Action::new(2, 0))[1] = 5.0;

        let x = features([1.0, 0.0, 0.0, 0.0]);
        let (action, value) = p.best_action(&x, PieceKind::L);
        assert_eq!(action, Action::new(1, 3));
        assert!((value - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_greedy_selection_is_deterministic() {
        let mut p = player(greedy_config());
        p.weights.slot_mut(PieceKind::S, Action::new(1, 7))[2] = 0.5;
        let x = features([0.0, 0.0, 1.0, 1.0]);

        let expected = p.best_action(&x, PieceKind::S);
        for _ in 0..20 {
            let action = p.select_action(&x, PieceKind::S).unwrap();
            assert_eq!(action, expected.0);
            let value = x.dot(p.weights.slot(PieceKind::S, action));
            assert!((value - expected.1).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_full_exploration_stays_legal() {
        let mut p = player(AgentConfig {
            epsilon: 1.0,
            seed: Some(9),
            ..AgentConfig::default()
        });
        let x = features([1.0; DIM]);
        for kind in PieceKind::ALL {
            for _ in 0..50 {
                let action = p.select_action(&x, kind).unwrap();
                assert!(action.rotation < kind.rotation_count());
                assert!(kind.legal_offsets(action.rotation).contains(&action.offset));
            }
        }
    }

    #[test]
    fn test_update_with_known_next_piece() {
        let config = greedy_config();
        let mut p = player(config);
        let x = features([1.0, 0.0, 1.0, 0.0]);
        let action = p.select_action(&x, PieceKind::Square).unwrap();
        assert_eq!(action, Action::new(0, 0));

        // next state value for a Line: 3.0 through its (0, 4) slot
        p.weights.slot_mut(PieceKind::Line, Action::new(0, 4))[3] = 3.0;
        let y = features([0.0, 0.0, 0.0, 1.0]);

        let td = p.update(&y, 2.0, Some(PieceKind::Line)).unwrap().unwrap();
        let expected_td = 2.0 + config.gamma * 3.0;
        assert!((td - expected_td).abs() < 1e-12);

        let slot = p.weights.slot(PieceKind::Square, action);
        let step = config.alpha * expected_td;
        assert!((slot[0] - step).abs() < 1e-12);
        assert!(slot[1].abs() < f64::EPSILON);
        assert!((slot[2] - step).abs() < 1e-12);
        assert!(slot[3].abs() < f64::EPSILON);

        // only the chosen slot moved (plus the one set by hand)
        let touched = p.weights.as_slice().iter().filter(|&&w| w != 0.0).count();
        assert_eq!(touched, 3);
    }

    #[test]
    fn test_update_averages_over_all_kinds() {
        let config = greedy_config();
        let mut p = player(config);
        let x = features([1.0, 0.0, 0.0, 0.0]);
        p.select_action(&x, PieceKind::Z).unwrap();

        let y = features([0.0, 1.0, 0.0, 0.0]);
        p.weights.slot_mut(PieceKind::T, Action::new(0, 2))[1] = 7.0;

        let td = p.update(&y, 0.0, None).unwrap().unwrap();
        // six kinds see 0, the T sees 7
        assert!((td - config.gamma * 7.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_terminal_update_uses_reward_only() {
        let config = greedy_config();
        let mut p = player(config);
        let x = features([0.0, 1.0, 0.0, 0.0]);
        p.weights.slot_mut(PieceKind::Z, Action::new(0, 0))[1] = 0.5;
        let action = p.select_action(&x, PieceKind::Z).unwrap();
        assert_eq!(action, Action::new(0, 0));

        let td = p
            .update(&FeatureVector::blank(DIM), -3.0, Some(PieceKind::T))
            .unwrap()
            .unwrap();
        assert!((td - (-3.0 - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_update_requires_selection() {
        let mut p = player(greedy_config());
        let x = features([0.0; DIM]);
        assert!(matches!(
            p.update(&x, 1.0, None),
            Err(AgentError::NoPendingAction)
        ));

        p.select_action(&x, PieceKind::T).unwrap();
        assert!(p.update(&x, 1.0, None).is_ok());
        assert!(matches!(
            p.update(&x, 1.0, None),
            Err(AgentError::NoPendingAction)
        ));
    }

    #[test]
    fn test_evaluation_mode_never_learns() {
        let mut p = player(AgentConfig {
            epsilon: 1.0,
            ..greedy_config()
        });
        p.set_mode(AgentMode::Evaluation);
        let x = features([1.0; DIM]);
        let first = p.select_action(&x, PieceKind::MirroredL).unwrap();
        for _ in 0..10 {
            assert_eq!(p.select_action(&x, PieceKind::MirroredL).unwrap(), first);
        }
        assert_eq!(p.update(&x, 100.0, None).unwrap(), None);
        assert!(p.weights().as_slice().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_feature_dimension_is_checked() {
        let mut p = player(greedy_config());
        let wrong = FeatureVector::blank(DIM + 1);
        assert!(matches!(
            p.select_action(&wrong, PieceKind::T),
            Err(AgentError::FeatureDim { expected: DIM, found }) if found == DIM + 1
        ));
    }

    #[test]
    fn test_weights_round_trip_through_player() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theta.json");

        let mut board = Board::new(BoardConfig {
            seed: Some(PieceSeed::from(5)),
            ..BoardConfig::default()
        })
        .unwrap();
        let shape = WeightShape::for_board(board.feature_dim());
        let mut trained = QLearnPlayer::new(greedy_config(), shape).unwrap();
        for _ in 0..30 {
            let kind = board.spawn(None).unwrap().piece.kind();
            let action = trained.select_action(&board.feature_vector(), kind).unwrap();
            let outcome = board.place(action).unwrap();
            let reward = board.take_reward();
            trained
                .update(&board.feature_vector(), reward, Some(board.peek_next_kind()))
                .unwrap();
            if outcome == StepOutcome::GameOver {
                board.reset();
            }
        }
        trained.save_weights(&path).unwrap();

        let mut restored = QLearnPlayer::new(greedy_config(), shape).unwrap();
        restored.load_weights(&path).unwrap();
        assert_eq!(restored.weights(), trained.weights());

        let mut other = QLearnPlayer::new(greedy_config(), WeightShape::for_board(DIM)).unwrap();
        assert!(matches!(
            other.load_weights(&path),
            Err(WeightsError::ShapeMismatch { .. })
        ));
        assert!(other.weights().as_slice().iter().all(|&w| w == 0.0));
    }
}
