//! Silhouette extraction for ordered scans.

use crate::Point2;
use crate::common::points::dist;
use itertools::Itertools;

/// Returns the indices of the edge points of an ordered scan. A point is an edge when its
/// distance to both its predecessor and its successor exceeds `threshold`. The first and last
/// points are never edges.
pub fn edge_indices(points: &[Point2], threshold: f64) -> Vec<usize> {
    points
        .iter()
        .tuple_windows()
        .enumerate()
        .filter(|(_, (a, b, c))| dist(a, b) > threshold && dist(b, c) > threshold)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Reduces an ordered scan to its edge points, keeping corners and discontinuities while dropping
/// the densely sampled runs between them.
///
/// # Arguments
///
/// * `points`: the scan points in capture order
/// * `threshold`: the neighbor distance which both sides of a point must exceed
///
/// returns: Vec<OPoint<f64, Const<2>>, Global>
pub fn edge_points(points: &[Point2], threshold: f64) -> Vec<Point2> {
    edge_indices(points, threshold)
        .into_iter()
        .map(|i| points[i])
        .collect()
}
