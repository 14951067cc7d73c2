//! Operations on plain point lists shared by the capture, registration and analysis code.

pub mod points;

pub use points::{dist, filter_points_by_distance, mean_point, points_in_rect};
