use serde::Serialize;

/// Dense board encoding consumed by the linear value function.
///
/// The board produces one-hot height profiles: every column owns a slot of
/// `slot_len` entries, and exactly one entry per column is 1.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl FeatureVector {
    /// All-zero vector of the given length, used as the terminal state.
    #[must_use]
    pub fn blank(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    /// One-hot encoding of column heights relative to the lowest column.
    ///
    /// Entry `col * slot_len + (heights[col] - min)` is set for every column;
    /// relative heights past the slot are clamped to its last entry.
    #[must_use]
    pub fn height_profile(heights: &[usize], slot_len: usize) -> Self {
        let mut values = vec![0.0; heights.len() * slot_len];
        if slot_len == 0 {
            return Self(values);
        }
        let min = heights.iter().copied().min().unwrap_or(0);
        for (col, &height) in heights.iter().enumerate() {
            let relative = (height - min).min(slot_len - 1);
            values[col * slot_len + relative] = 1.0;
        }
        Self(values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Inner product with a weight slot of the same length.
    #[must_use]
    pub fn dot(&self, weights: &[f64]) -> f64 {
        debug_assert_eq!(self.0.len(), weights.len());
        self.0.iter().zip(weights).map(|(x, w)| x * w).sum()
    }

    /// Indices of the non-zero entries.
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, x)| **x != 0.0)
            .map(|(i, _)| i)
    }
}
