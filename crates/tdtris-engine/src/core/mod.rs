pub use self::{feature::*, grid::*, piece::*};

pub(crate) mod feature;
pub(crate) mod grid;
pub(crate) mod piece;
