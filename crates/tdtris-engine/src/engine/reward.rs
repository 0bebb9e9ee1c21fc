use serde::{Deserialize, Serialize};

use crate::{ConfigError, core::grid::Grid};

/// Coefficients of the shaped placement reward.
///
/// ```text
/// reward = bad_pos_coefficient * (prev_bad_pos - bad_pos)
///        + var_coefficient     * (prev_var - var)
///        + line_coefficient    * lines ^ line_exponent
/// ```
///
/// The line term is 0 when no line was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub bad_pos_coefficient: f64,
    pub var_coefficient: f64,
    pub line_coefficient: f64,
    pub line_exponent: i32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            bad_pos_coefficient: 7.0,
            var_coefficient: 1.0,
            line_coefficient: 4.0,
            line_exponent: 1,
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.line_exponent < 0 {
            return Err(ConfigError::NegativeLineExponent {
                value: self.line_exponent,
            });
        }
        Ok(())
    }

    /// Reward for a placement that cleared `lines` lines and left the board
    /// with the given metrics.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn reward(&self, metrics: &BoardMetrics, lines: usize) -> f64 {
        let line_term = if lines == 0 {
            0.0
        } else {
            self.line_coefficient * (lines as f64).powi(self.line_exponent)
        };
        self.bad_pos_coefficient * metrics.bad_pos_delta()
            + self.var_coefficient * metrics.var_delta()
            + line_term
    }
}

/// Board quality measures, each paired with its value before the latest
/// settled placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoardMetrics {
    bad_pos: usize,
    prev_bad_pos: usize,
    var: usize,
    prev_var: usize,
}

impl BoardMetrics {
    /// Shifts the current values into the previous ones and measures `grid`.
    pub fn update(&mut self, grid: &Grid) {
        self.prev_bad_pos = self.bad_pos;
        self.prev_var = self.var;
        self.bad_pos = grid.bad_pos();
        self.var = grid.bumpiness();
    }

    #[must_use]
    pub fn bad_pos(&self) -> usize {
        self.bad_pos
    }

    #[must_use]
    pub fn prev_bad_pos(&self) -> usize {
        self.prev_bad_pos
    }

    #[must_use]
    pub fn var(&self) -> usize {
        self.var
    }

    #[must_use]
    pub fn prev_var(&self) -> usize {
        self.prev_var
    }

    /// `prev_bad_pos - bad_pos`: positive when holes were removed.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn bad_pos_delta(&self) -> f64 {
        self.prev_bad_pos as f64 - self.bad_pos as f64
    }

    /// `prev_var - var`: positive when the surface got flatter.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn var_delta(&self) -> f64 {
        self.prev_var as f64 - self.var as f64
    }
}
