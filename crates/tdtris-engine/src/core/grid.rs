use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeSeq as _};

use super::{
    feature::FeatureVector,
    piece::{Piece, PieceKind},
};

/// Number of columns on the board.
pub const BOARD_WIDTH: usize = 10;

/// Number of rows on the board.
pub const BOARD_HEIGHT: usize = 20;

/// A single cell of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Block {
    /// Empty cell (marker 0).
    #[default]
    Empty,
    /// Landed cell of a specific piece type.
    Piece(PieceKind),
}

impl Block {
    #[must_use]
    pub fn is_empty(self) -> bool {
        self == Block::Empty
    }

    /// Grid marker: 0 for empty, the piece kind's marker otherwise.
    #[must_use]
    pub fn marker(self) -> u8 {
        match self {
            Block::Empty => 0,
            Block::Piece(kind) => kind.marker(),
        }
    }

    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Block::Empty => '.',
            Block::Piece(kind) => kind.as_char(),
        }
    }
}

type GridRow = [Block; BOARD_WIDTH];
type MarkRow = [u8; BOARD_WIDTH];

const EMPTY_ROW: GridRow = [Block::Empty; BOARD_WIDTH];

/// Row-index template: every entry of row `r` holds `r`.
///
/// Masking it with the grid occupancy yields the height-mark table.
#[expect(clippy::cast_possible_truncation)]
const MARK_TEMPLATE: [MarkRow; BOARD_HEIGHT + 1] = {
    let mut template = [[0; BOARD_WIDTH]; BOARD_HEIGHT + 1];
    let mut row = 0;
    while row <= BOARD_HEIGHT {
        template[row] = [row as u8; BOARD_WIDTH];
        row += 1;
    }
    template
};

/// The playfield: a `BOARD_HEIGHT × BOARD_WIDTH` array of blocks plus the
/// height-mark table used for column-height queries.
///
/// # Coordinate System
///
/// - Row 0 is the bottom row, rows grow upward
/// - Column 0 is the leftmost column
///
/// # Height Marks
///
/// `marks` has one more row than the grid. `marks[row + 1][col]` holds
/// `row + 1` when `(col, row)` is occupied and 0 otherwise, so the height of a
/// column is the index of the first non-zero mark seen from the top, and an
/// empty column (height 0) stays distinguishable from one filled through row 0
/// (height 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    rows: [GridRow; BOARD_HEIGHT],
    marks: [MarkRow; BOARD_HEIGHT + 1],
}

impl Default for Grid {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Serialize for Grid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Format: one string per row, top row first (e.g., "..ZZ......")
        let mut seq = serializer.serialize_seq(Some(BOARD_HEIGHT))?;
        for row in self.rows.iter().rev() {
            let line: String = row.iter().map(|b| b.as_char()).collect();
            seq.serialize_element(&line)?;
        }
        seq.end()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows.iter().rev() {
            for block in row {
                write!(f, "{}", block.as_char())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Grid {
    pub const WIDTH: usize = BOARD_WIDTH;
    pub const HEIGHT: usize = BOARD_HEIGHT;

    pub const EMPTY: Self = Self {
        rows: [EMPTY_ROW; BOARD_HEIGHT],
        marks: [[0; BOARD_WIDTH]; BOARD_HEIGHT + 1],
    };

    #[must_use]
    pub fn cell(&self, col: usize, row: usize) -> Block {
        self.rows[row][col]
    }

    /// Returns an iterator over the rows, bottom row first.
    pub fn rows(&self) -> impl Iterator<Item = &[Block; BOARD_WIDTH]> {
        self.rows.iter()
    }

    /// Writes a block and keeps the height marks in sync.
    pub fn set_cell(&mut self, col: usize, row: usize, block: Block) {
        self.rows[row][col] = block;
        self.marks[row + 1][col] = if block.is_empty() {
            0
        } else {
            MARK_TEMPLATE[row + 1][col]
        };
    }

    /// Height of a column: the index of the first non-zero mark from the top.
    #[must_use]
    pub fn column_height(&self, col: usize) -> usize {
        (0..=BOARD_HEIGHT)
            .rev()
            .find(|&row| self.marks[row][col] != 0)
            .unwrap_or(0)
    }

    #[must_use]
    pub fn heights(&self) -> [usize; BOARD_WIDTH] {
        std::array::from_fn(|col| self.column_height(col))
    }

    #[must_use]
    pub fn max_height(&self) -> usize {
        self.heights().into_iter().max().unwrap_or(0)
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .filter(|block| !block.is_empty())
            .count()
    }

    #[must_use]
    pub fn is_row_full(&self, row: usize) -> bool {
        self.rows[row].iter().all(|block| !block.is_empty())
    }

    #[must_use]
    pub fn full_row_count(&self) -> usize {
        (0..BOARD_HEIGHT).filter(|&row| self.is_row_full(row)).count()
    }

    /// The value the drop row of `piece` has once it rests on the stack.
    ///
    /// For every cell this is `local_row + height[col]`; the piece lands at the
    /// maximum over its cells, i.e. it is shifted down by the minimum clearance
    /// `drop_row - anchor` in a single step.
    #[must_use]
    pub fn landing_anchor(&self, piece: &Piece) -> usize {
        let heights = self.heights();
        piece
            .cells()
            .map(|(row, col)| row + heights[col])
            .max()
            .unwrap_or(0)
    }

    /// Clears filled lines and returns the number of lines cleared.
    ///
    /// Remaining rows shift down keeping their order, empty rows enter at the
    /// top, and the height marks are rebuilt from the template.
    pub fn clear_lines(&mut self) -> usize {
        let mut count = 0;
        for row in 0..BOARD_HEIGHT {
            if self.is_row_full(row) {
                count += 1;
                continue;
            }
            if count > 0 {
                self.rows[row - count] = self.rows[row];
            }
        }
        if count == 0 {
            return 0;
        }
        self.rows[BOARD_HEIGHT - count..].fill(EMPTY_ROW);
        self.rebuild_marks();
        count
    }

    fn rebuild_marks(&mut self) {
        for (row, cells) in self.rows.iter().enumerate() {
            for (col, block) in cells.iter().enumerate() {
                self.marks[row + 1][col] = if block.is_empty() {
                    0
                } else {
                    MARK_TEMPLATE[row + 1][col]
                };
            }
        }
    }

    /// Sum of column heights minus occupied cells: the number of empty cells
    /// buried under each column's top.
    #[must_use]
    pub fn bad_pos(&self) -> usize {
        self.heights().iter().sum::<usize>() - self.occupied_count()
    }

    /// Sum of absolute height differences between neighbouring columns.
    #[must_use]
    pub fn bumpiness(&self) -> usize {
        self.heights()
            .windows(2)
            .map(|pair| pair[0].abs_diff(pair[1]))
            .sum()
    }

    /// One-hot encoding of the height profile relative to the lowest column.
    ///
    /// Each column owns `slot_len` entries; heights above the slot are clamped
    /// to its last entry.
    #[must_use]
    pub fn feature_vector(&self, slot_len: usize) -> FeatureVector {
        FeatureVector::height_profile(&self.heights(), slot_len)
    }

    /// Builds a grid from ASCII art for testing.
    ///
    /// Rows are given top to bottom and the last row is row 0; `.` is empty,
    /// a piece character marks an occupied cell, and `#` is shorthand for `I`.
    #[must_use]
    pub fn from_ascii(art: &str) -> Self {
        let mut grid = Self::EMPTY;
        let lines: Vec<&str> = art
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        assert!(lines.len() <= BOARD_HEIGHT, "too many rows: {}", lines.len());

        for (i, line) in lines.iter().rev().enumerate() {
            let chars: Vec<char> = line.chars().collect();
            assert_eq!(
                chars.len(),
                BOARD_WIDTH,
                "Each row must have exactly {BOARD_WIDTH} cells, got {} at row {i}",
                chars.len(),
            );
            for (col, &ch) in chars.iter().enumerate() {
                let block = match ch {
                    '.' => Block::Empty,
                    '#' => Block::Piece(PieceKind::Line),
                    c => Block::Piece(
                        PieceKind::from_char(c)
                            .unwrap_or_else(|| panic!("invalid cell '{c}' at row {i}")),
                    ),
                };
                grid.set_cell(col, i, block);
            }
        }
        grid
    }
}
