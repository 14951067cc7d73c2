use std::error::Error;
use std::fmt::{Display, Formatter};

/// Geometry inputs which violate the preconditions of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidGeometry {
    /// The operation needs at least `needed` points but was given `found`
    NotEnoughPoints { needed: usize, found: usize },

    /// A least squares line fit was requested on points sharing a single x value
    DegenerateFit,
}

impl Display for InvalidGeometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidGeometry::NotEnoughPoints { needed, found } => {
                write!(f, "not enough points: needed {}, found {}", needed, found)
            }
            InvalidGeometry::DegenerateFit => write!(f, "points have no spread in x"),
        }
    }
}

impl Error for InvalidGeometry {}
