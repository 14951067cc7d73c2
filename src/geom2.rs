//! Planar geometry used to register scans against each other.

pub mod align2;
pub mod edges;
pub mod kd_tree2;

pub use edges::edge_points;
pub use kd_tree2::KdTree2;
