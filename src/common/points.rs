//! Common operations on f64 points.

use crate::{Aabb2, Point2};
use itertools::Itertools;
use parry2d_f64::na::{Point, SVector};

/// Returns the distance between two points in D-dimensional space.
///
/// # Examples
///
/// ```
/// use lidarscan::common::points::dist;
/// use lidarscan::Point2;
/// let a = Point2::new(1.0, 2.0);
/// let b = Point2::new(3.0, 2.0);
/// assert_eq!(dist(&a, &b), 2.0);
/// ```
pub fn dist<const D: usize>(a: &Point<f64, D>, b: &Point<f64, D>) -> f64 {
    (a - b).norm()
}

/// Returns the unweighted mean of a set of points in D-dimensional space.
///
/// # Arguments
///
/// * `points`: a slice of points to compute the mean of, which should not be empty
///
/// returns: OPoint<f64, Const<{ D }>>
pub fn mean_point<const D: usize>(points: &[Point<f64, D>]) -> Point<f64, D> {
    let mut sum = SVector::<f64, D>::zeros();
    for p in points {
        sum += p.coords;
    }
    Point::<f64, D>::from(sum / points.len() as f64)
}

/// Removes points adjacent to a large jump in an ordered scan. Such jumps are capture artifacts,
/// typically a single spurious return far outside the surface being measured.
///
/// A point is kept when both its x and y offsets to the next point are strictly less than
/// `max_jump`. The last point has no successor, so it is kept when it is that close to its
/// predecessor instead. A lone point is always kept. Older capture tooling dropped the last point
/// unconditionally and returned nothing for a single point, so registrations of the same data
/// may differ slightly from results produced by it.
///
/// # Arguments
///
/// * `points`: the points of a scan, in capture order
/// * `max_jump`: the per-axis gap at which a pair of consecutive points is considered broken
///
/// returns: Vec<OPoint<f64, Const<2>>, Global>
pub fn filter_points_by_distance(points: &[Point2], max_jump: f64) -> Vec<Point2> {
    let close = |a: &Point2, b: &Point2| {
        (a.x - b.x).abs() < max_jump && (a.y - b.y).abs() < max_jump
    };

    let mut kept = points
        .iter()
        .tuple_windows()
        .filter(|(a, b)| close(a, b))
        .map(|(a, _)| *a)
        .collect::<Vec<_>>();

    match points {
        [only] => kept.push(*only),
        [.., previous, last] if close(previous, last) => kept.push(*last),
        _ => {}
    }

    kept
}

/// Returns the points lying inside the axis-aligned rectangle spanned by two opposite corners,
/// boundary included. The corners may be given in any order.
pub fn points_in_rect(points: &[Point2], corner_a: &Point2, corner_b: &Point2) -> Vec<Point2> {
    let rect = Aabb2::new(
        Point2::new(corner_a.x.min(corner_b.x), corner_a.y.min(corner_b.y)),
        Point2::new(corner_a.x.max(corner_b.x), corner_a.y.max(corner_b.y)),
    );

    points
        .iter()
        .filter(|p| rect.contains_local_point(p))
        .copied()
        .collect()
}
