//! Measurements taken on slices cropped from a scan: straightness of a nominally flat face,
//! its size and range from the sensor, and the included angle of an L-shaped profile.

mod line_fit;
mod profile;

pub use line_fit::LineFit;
pub use profile::{LProfileAngle, ProfileStats, l_profile_angle, pearson, profile_stats};
