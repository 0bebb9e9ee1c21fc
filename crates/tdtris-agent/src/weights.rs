//! The weight table of the linear action-value function.
//!
//! Every `(piece kind, rotation, offset)` triple owns a dense weight vector of
//! the board's feature dimension; `Q(s, a) = weights[kind][rotation][offset] · features(s)`.
//! The table is stored flat in row-major order.
//!
//! # Persistence
//!
//! [`WeightTable::save`] writes one JSON document holding the shape and the
//! flat weights. `serde_json` is built with `float_roundtrip`, so values load
//! back bit-identical. [`WeightTable::load`] rejects files whose shape differs
//! from the caller's configuration.

use std::{
    fmt,
    fs::File,
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tdtris_engine::{Action, BOARD_WIDTH, MAX_ROTATIONS, PieceKind};

/// Dimensions of a [`WeightTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightShape {
    pub piece_count: usize,
    pub max_rotations: usize,
    pub offset_count: usize,
    pub feature_dim: usize,
}

impl fmt::Display for WeightShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.piece_count, self.max_rotations, self.offset_count, self.feature_dim
        )
    }
}

impl WeightShape {
    /// Shape covering every piece kind, rotation and column of the board.
    #[must_use]
    pub const fn for_board(feature_dim: usize) -> Self {
        Self {
            piece_count: PieceKind::LEN,
            max_rotations: MAX_ROTATIONS,
            offset_count: BOARD_WIDTH,
            feature_dim,
        }
    }

    /// Whether the kind, rotation and offset dimensions are exactly those of
    /// the board and the feature dimension is non-zero.
    #[must_use]
    pub const fn matches_action_space(&self) -> bool {
        self.piece_count == PieceKind::LEN
            && self.max_rotations == MAX_ROTATIONS
            && self.offset_count == BOARD_WIDTH
            && self.feature_dim > 0
    }

    /// Number of weight vectors.
    #[must_use]
    pub const fn slot_count(&self) -> usize {
        self.piece_count * self.max_rotations * self.offset_count
    }

    /// Number of scalar weights.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.slot_count() * self.feature_dim
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_start(&self, kind: PieceKind, action: Action) -> usize {
        assert!(
            kind.index() < self.piece_count
                && action.rotation < self.max_rotations
                && action.offset < self.offset_count,
            "slot {kind:?} {action} outside weight shape {self}"
        );
        let slot = (kind.index() * self.max_rotations + action.rotation) * self.offset_count
            + action.offset;
        slot * self.feature_dim
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum WeightsError {
    #[display("weight file I/O failed: {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("malformed weight file: {}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[display("weight table shape {found} does not match the configured shape {expected}")]
    ShapeMismatch {
        expected: WeightShape,
        found: WeightShape,
    },
    #[display("weight {index} is not finite, refusing to write {}", path.display())]
    NonFinite { path: PathBuf, index: usize },
    #[display("weight table of shape {shape} holds {found} values instead of {expected}")]
    Length {
        shape: WeightShape,
        expected: usize,
        found: usize,
    },
}

/// Flat `(kind, rotation, offset, feature)` weight storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    shape: WeightShape,
    weights: Vec<f64>,
}

impl WeightTable {
    /// All-zero table.
    #[must_use]
    pub fn zeros(shape: WeightShape) -> Self {
        Self {
            shape,
            weights: vec![0.0; shape.len()],
        }
    }

    #[must_use]
    pub fn shape(&self) -> WeightShape {
        self.shape
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    /// Weight vector of one action of one piece kind.
    #[must_use]
    pub fn slot(&self, kind: PieceKind, action: Action) -> &[f64] {
        let start = self.shape.slot_start(kind, action);
        &self.weights[start..start + self.shape.feature_dim]
    }

    pub fn slot_mut(&mut self, kind: PieceKind, action: Action) -> &mut [f64] {
        let start = self.shape.slot_start(kind, action);
        &mut self.weights[start..start + self.shape.feature_dim]
    }

    /// Writes the whole table to `path`, replacing any existing file.
    ///
    /// JSON has no NaN or infinity, so a table holding one is rejected before
    /// the file is touched.
    pub fn save<P>(&self, path: P) -> Result<(), WeightsError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if let Some(index) = self.weights.iter().position(|w| !w.is_finite()) {
            return Err(WeightsError::NonFinite {
                path: path.to_owned(),
                index,
            });
        }
        let io_error = |source| WeightsError::Io {
            path: path.to_owned(),
            source,
        };
        let file = File::create(path).map_err(io_error)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|source| WeightsError::Json {
            path: path.to_owned(),
            source,
        })?;
        writer.flush().map_err(io_error)?;
        Ok(())
    }

    /// Reads a table from `path` and checks it against `expected`.
    pub fn load<P>(path: P, expected: WeightShape) -> Result<Self, WeightsError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| WeightsError::Io {
            path: path.to_owned(),
            source,
        })?;
        let table: Self =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| WeightsError::Json {
                path: path.to_owned(),
                source,
            })?;

        if table.shape != expected {
            return Err(WeightsError::ShapeMismatch {
                expected,
                found: table.shape,
            });
        }
        if table.weights.len() != expected.len() {
            return Err(WeightsError::Length {
                shape: table.shape,
                expected: expected.len(),
                found: table.weights.len(),
            });
        }
        Ok(table)
    }
}
