use std::{fmt, ops::RangeInclusive};

use arrayvec::ArrayVec;
use rand::{Rng, distr::StandardUniform, prelude::Distribution};
use serde::Serialize;

use super::grid::BOARD_WIDTH;

/// Number of cells in every piece.
pub const CELL_COUNT: usize = 4;

/// Largest rotation count of any piece kind.
pub const MAX_ROTATIONS: usize = 4;

/// Upper bound on the number of legal actions for a single piece kind.
pub const MAX_ACTIONS: usize = MAX_ROTATIONS * BOARD_WIDTH;

/// Local cell offsets of one rotation, as `(row, col)` pairs.
///
/// Row 0 is the top of the piece's local frame; rows grow downward.
pub type PieceCells = [(usize, usize); CELL_COUNT];

/// A placement choice for a piece: which rotation, and which column the
/// piece's leftmost cell occupies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Action {
    pub rotation: usize,
    pub offset: usize,
}

impl Action {
    #[must_use]
    pub const fn new(rotation: usize, offset: usize) -> Self {
        Self { rotation, offset }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.rotation, self.offset)
    }
}

/// Enum representing the type of piece.
///
/// The discriminant is the marker written into the grid when the piece lands
/// (0 is reserved for empty cells).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum PieceKind {
    /// Z-piece.
    Z = 1,
    /// S-piece.
    S = 2,
    /// I-piece.
    Line = 3,
    /// T-piece.
    T = 4,
    /// O-piece.
    Square = 5,
    /// L-piece.
    L = 6,
    /// J-piece.
    MirroredL = 7,
}

impl Distribution<PieceKind> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PieceKind {
        PieceKind::ALL[rng.random_range(0..PieceKind::LEN)]
    }
}

impl PieceKind {
    /// Number of piece types (7).
    pub const LEN: usize = 7;

    /// All piece kinds in marker order.
    pub const ALL: [Self; Self::LEN] = [
        Self::Z,
        Self::S,
        Self::Line,
        Self::T,
        Self::Square,
        Self::L,
        Self::MirroredL,
    ];

    /// Grid marker of this kind (1..=7).
    #[must_use]
    pub const fn marker(self) -> u8 {
        self as u8
    }

    /// Zero-based index of this kind, suitable for table lookups.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize - 1
    }

    /// Number of distinct rotations (1, 2 or 4).
    #[must_use]
    pub const fn rotation_count(self) -> usize {
        ROTATION_COUNTS[self.index()]
    }

    /// Local cells of the piece in the given rotation, with the leftmost cell
    /// moved to column 0.
    ///
    /// `rotation` is taken modulo [`Self::rotation_count`].
    #[must_use]
    pub const fn cells(self, rotation: usize) -> PieceCells {
        PIECE_CELLS[self.index()][rotation % self.rotation_count()]
    }

    /// Width of the piece in the given rotation.
    #[must_use]
    pub const fn width(self, rotation: usize) -> usize {
        PIECE_WIDTHS[self.index()][rotation % self.rotation_count()]
    }

    /// Columns the piece may be placed at in the given rotation, ascending.
    #[must_use]
    pub const fn legal_offsets(self, rotation: usize) -> RangeInclusive<usize> {
        0..=BOARD_WIDTH - self.width(rotation)
    }

    /// Every legal action for this kind, rotation ascending then offset ascending.
    #[must_use]
    pub fn actions(self) -> ArrayVec<Action, MAX_ACTIONS> {
        (0..self.rotation_count())
            .flat_map(|rotation| {
                self.legal_offsets(rotation)
                    .map(move |offset| Action::new(rotation, offset))
            })
            .collect()
    }

    /// Returns the single character representation of this piece kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use tdtris_engine::PieceKind;
    ///
    /// assert_eq!(PieceKind::Line.as_char(), 'I');
    /// assert_eq!(PieceKind::MirroredL.as_char(), 'J');
    /// ```
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            PieceKind::Z => 'Z',
            PieceKind::S => 'S',
            PieceKind::Line => 'I',
            PieceKind::T => 'T',
            PieceKind::Square => 'O',
            PieceKind::L => 'L',
            PieceKind::MirroredL => 'J',
        }
    }

    /// Parses a piece kind from a single character.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'Z' => Some(PieceKind::Z),
            'S' => Some(PieceKind::S),
            'I' => Some(PieceKind::Line),
            'T' => Some(PieceKind::T),
            'O' => Some(PieceKind::Square),
            'L' => Some(PieceKind::L),
            'J' => Some(PieceKind::MirroredL),
            _ => None,
        }
    }
}

/// A piece instance: kind, current rotation and horizontal offset.
///
/// The offset is the column of the piece's leftmost cell, and always satisfies
/// `offset + width <= BOARD_WIDTH`. Out-of-range offsets are ignored rather
/// than reported, so that edge taps and rotations never abort movement.
///
/// # Example
///
/// ```
/// use tdtris_engine::{Piece, PieceKind};
///
/// let mut piece = Piece::new(PieceKind::Line);
/// piece.rotate_right(1);
/// piece.set_offset(6);
/// assert_eq!(piece.offset(), 6);
/// piece.set_offset(7); // would stick out of the board
/// assert_eq!(piece.offset(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    kind: PieceKind,
    rotation: usize,
    offset: usize,
}

impl Serialize for Piece {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Format: "kind#rotation@offset" (e.g., "S#1@4")
        serializer.serialize_str(&self.to_string())
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}@{}",
            self.kind.as_char(),
            self.rotation,
            self.offset
        )
    }
}

impl Piece {
    /// Column a freshly spawned piece starts at.
    pub const SPAWN_OFFSET: usize = BOARD_WIDTH / 2 - 1;

    /// Creates a piece in rotation 0 at the spawn column.
    #[must_use]
    pub fn new(kind: PieceKind) -> Self {
        let mut piece = Self {
            kind,
            rotation: 0,
            offset: 0,
        };
        piece.set_offset(Self::SPAWN_OFFSET);
        piece
    }

    /// Creates a piece already turned and shifted according to `action`.
    #[must_use]
    pub fn with_action(kind: PieceKind, action: Action) -> Self {
        let mut piece = Self::new(kind);
        piece.apply(action);
        piece
    }

    #[must_use]
    pub fn kind(&self) -> PieceKind {
        self.kind
    }

    #[must_use]
    pub fn rotation(&self) -> usize {
        self.rotation
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.kind.width(self.rotation)
    }

    #[must_use]
    pub fn action(&self) -> Action {
        Action::new(self.rotation, self.offset)
    }

    /// Cells of the piece as `(local_row, board_col)` pairs.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + use<> {
        let offset = self.offset;
        self.kind
            .cells(self.rotation)
            .into_iter()
            .map(move |(row, col)| (row, col + offset))
    }

    /// Moves the piece to `offset` if it fits; returns whether it moved.
    pub fn set_offset(&mut self, offset: usize) -> bool {
        if offset > BOARD_WIDTH - self.width() {
            return false;
        }
        self.offset = offset;
        true
    }

    pub fn move_left(&mut self) -> bool {
        self.offset
            .checked_sub(1)
            .is_some_and(|offset| self.set_offset(offset))
    }

    pub fn move_right(&mut self) -> bool {
        self.set_offset(self.offset + 1)
    }

    /// Sets the rotation (modulo the rotation count) and pulls the piece back
    /// inside the board if the new width no longer fits.
    pub fn set_rotation(&mut self, rotation: usize) {
        self.rotation = rotation % self.kind.rotation_count();
        self.offset = self.offset.min(BOARD_WIDTH - self.width());
    }

    pub fn rotate_right(&mut self, steps: usize) {
        self.set_rotation(self.rotation + steps);
    }

    pub fn rotate_left(&mut self, steps: usize) {
        let count = self.kind.rotation_count();
        self.set_rotation(self.rotation + count - steps % count);
    }

    /// Turns the piece to `action.rotation`, then moves it to `action.offset`.
    ///
    /// An offset that does not fit the rotation is ignored.
    pub fn apply(&mut self, action: Action) {
        self.set_rotation(action.rotation);
        self.set_offset(action.offset);
    }
}

const ROTATION_COUNTS: [usize; PieceKind::LEN] = [2, 2, 2, 4, 1, 4, 4];

/// Raw geometry, `(row, col)` per cell, unused rotations repeat rotation 0.
const RAW_CELLS: [[PieceCells; MAX_ROTATIONS]; PieceKind::LEN] = {
    const fn pad2(r0: PieceCells, r1: PieceCells) -> [PieceCells; MAX_ROTATIONS] {
        [r0, r1, r0, r1]
    }
    [
        // Z-piece
        pad2(
            [(0, 0), (0, 1), (1, 1), (1, 2)],
            [(0, 1), (1, 1), (1, 0), (2, 0)],
        ),
        // S-piece
        pad2(
            [(0, 2), (0, 1), (1, 1), (1, 0)],
            [(0, 0), (1, 0), (1, 1), (2, 1)],
        ),
        // Line
        pad2(
            [(0, 1), (1, 1), (2, 1), (3, 1)],
            [(1, 0), (1, 1), (1, 2), (1, 3)],
        ),
        // T-piece
        [
            [(1, 0), (1, 1), (1, 2), (0, 1)],
            [(0, 1), (1, 1), (2, 1), (1, 2)],
            [(1, 0), (1, 1), (1, 2), (2, 1)],
            [(0, 1), (1, 1), (2, 1), (1, 0)],
        ],
        // Square
        [[(0, 0), (1, 0), (0, 1), (1, 1)]; MAX_ROTATIONS],
        // L-piece
        [
            [(0, 1), (1, 1), (2, 1), (2, 2)],
            [(1, 0), (1, 1), (1, 2), (2, 0)],
            [(0, 1), (1, 1), (2, 1), (0, 0)],
            [(1, 0), (1, 1), (1, 2), (0, 2)],
        ],
        // Mirrored L-piece
        [
            [(0, 1), (1, 1), (2, 1), (2, 0)],
            [(1, 0), (1, 1), (1, 2), (0, 0)],
            [(0, 1), (1, 1), (2, 1), (0, 2)],
            [(1, 0), (1, 1), (1, 2), (2, 2)],
        ],
    ]
};

const fn column_span(cells: &PieceCells) -> (usize, usize) {
    let mut min = usize::MAX;
    let mut max = 0;
    let mut i = 0;
    while i < CELL_COUNT {
        let col = cells[i].1;
        if col < min {
            min = col;
        }
        if col > max {
            max = col;
        }
        i += 1;
    }
    (min, max)
}

const PIECE_CELLS: [[PieceCells; MAX_ROTATIONS]; PieceKind::LEN] = {
    let mut table = RAW_CELLS;
    let mut kind = 0;
    while kind < PieceKind::LEN {
        let mut rotation = 0;
        while rotation < MAX_ROTATIONS {
            let (min, _) = column_span(&table[kind][rotation]);
            let mut i = 0;
            while i < CELL_COUNT {
                table[kind][rotation][i].1 -= min;
                i += 1;
            }
            rotation += 1;
        }
        kind += 1;
    }
    table
};

const PIECE_WIDTHS: [[usize; MAX_ROTATIONS]; PieceKind::LEN] = {
    let mut widths = [[0; MAX_ROTATIONS]; PieceKind::LEN];
    let mut kind = 0;
    while kind < PieceKind::LEN {
        let mut rotation = 0;
        while rotation < MAX_ROTATIONS {
            let (min, max) = column_span(&RAW_CELLS[kind][rotation]);
            widths[kind][rotation] = max - min + 1;
            rotation += 1;
        }
        kind += 1;
    }
    widths
};
