use crate::Point2;
use crate::errors::InvalidGeometry;
use kiddo::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;

const BUCKET_SIZE: usize = 32;

/// A static nearest-neighbor index over a set of 2D points.
///
/// The tree is built once from a point slice and never modified. Query results refer back to
/// points by their index in that slice.
pub struct KdTree2 {
    tree: ImmutableKdTree<f64, u64, 2, BUCKET_SIZE>,
    points: Vec<Point2>,
}

impl KdTree2 {
    /// Builds the index. A tree needs at least one point so every query has an answer.
    pub fn new(points: &[Point2]) -> crate::Result<Self> {
        if points.is_empty() {
            return Err(InvalidGeometry::NotEnoughPoints {
                needed: 1,
                found: 0,
            }
            .into());
        }

        let entries = points.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>();
        let tree: ImmutableKdTree<f64, u64, 2, BUCKET_SIZE> = (&*entries).into();
        Ok(Self {
            tree,
            points: points.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    /// Returns the index of the point closest to `p` and the distance to it.
    pub fn nearest_one(&self, p: &Point2) -> (usize, f64) {
        let r = self.tree.nearest_one::<SquaredEuclidean>(&[p.x, p.y]);
        (r.item as usize, r.distance.sqrt())
    }

    /// Returns the point closest to `p`.
    pub fn nearest_point(&self, p: &Point2) -> Point2 {
        let (i, _) = self.nearest_one(p);
        self.points[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn nearest_matches_brute_force() {
        let points = (0..200)
            .map(|i| {
                let t = i as f64 * 0.37;
                Point2::new(t.cos() * (10.0 + t), t.sin() * (10.0 + t))
            })
            .collect::<Vec<_>>();
        let tree = KdTree2::new(&points).unwrap();

        for q in [
            Point2::new(0.0, 0.0),
            Point2::new(25.0, -3.0),
            Point2::new(-60.0, 41.0),
        ] {
            let (i, d) = tree.nearest_one(&q);
            let brute = points
                .iter()
                .map(|p| (p - q).norm())
                .fold(f64::INFINITY, f64::min);
            assert_relative_eq!(d, brute, epsilon = 1e-9);
            assert_relative_eq!((points[i] - q).norm(), brute, epsilon = 1e-9);
        }
    }

    #[test]
    fn repeated_coordinates_are_supported() {
        let points = vec![Point2::new(5.0, 5.0); 20];
        let tree = KdTree2::new(&points).unwrap();
        let (_, d) = tree.nearest_one(&Point2::new(5.0, 8.0));
        assert_relative_eq!(d, 3.0);
    }

    #[test]
    fn empty_tree_is_rejected() {
        assert!(KdTree2::new(&[]).is_err());
    }
}
