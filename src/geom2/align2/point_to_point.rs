use crate::geom2::KdTree2;
use crate::geom2::align2::RigidParams;
use crate::{Point2, Vector2};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use parry2d_f64::na::{Dyn, Matrix, Owned, U1, U3, Vector};

/// Least squares alignment of points onto their nearest neighbors in a target set. Each point
/// contributes its x and y offsets as two residuals, and correspondences are looked up again every
/// time the parameters change.
struct PointToPoint<'a> {
    points: &'a [Point2],
    target: &'a KdTree2,
    params: RigidParams,

    /// Offset from each moved point to its current nearest neighbor
    offsets: Vec<Vector2>,
}

impl<'a> PointToPoint<'a> {
    fn new(points: &'a [Point2], target: &'a KdTree2, initial: RigidParams) -> Self {
        let mut item = Self {
            points,
            target,
            params: initial,
            offsets: Vec::with_capacity(points.len()),
        };
        item.move_points();
        item
    }

    fn move_points(&mut self) {
        let iso = self.params.to_iso();
        self.offsets.clear();
        for p in self.points {
            let m = iso * p;
            self.offsets.push(m - self.target.nearest_point(&m));
        }
    }
}

impl LeastSquaresProblem<f64, Dyn, U3> for PointToPoint<'_> {
    type ResidualStorage = Owned<f64, Dyn, U1>;
    type JacobianStorage = Owned<f64, Dyn, U3>;
    type ParameterStorage = Owned<f64, U3>;

    fn set_params(&mut self, x: &Vector<f64, U3, Self::ParameterStorage>) {
        self.params = RigidParams::from_vector(x);
        self.move_points();
    }

    fn params(&self) -> Vector<f64, U3, Self::ParameterStorage> {
        self.params.to_vector()
    }

    fn residuals(&self) -> Option<Vector<f64, Dyn, Self::ResidualStorage>> {
        let mut res = Matrix::<f64, Dyn, U1, Self::ResidualStorage>::zeros(self.offsets.len() * 2);
        for (i, o) in self.offsets.iter().enumerate() {
            res[i * 2] = o.x;
            res[i * 2 + 1] = o.y;
        }
        Some(res)
    }

    fn jacobian(&self) -> Option<Matrix<f64, Dyn, U3, Self::JacobianStorage>> {
        let mut jac = Matrix::<f64, Dyn, U3, Self::JacobianStorage>::zeros(self.points.len() * 2);
        for (i, p) in self.points.iter().enumerate() {
            let dt = self.params.d_theta(p);
            jac[(i * 2, 0)] = 1.0;
            jac[(i * 2, 2)] = dt.x;
            jac[(i * 2 + 1, 1)] = 1.0;
            jac[(i * 2 + 1, 2)] = dt.y;
        }
        Some(jac)
    }
}

/// Refines `initial` with Levenberg-Marquardt. Returns the terminal parameters and whether the
/// solver reported success.
pub(crate) fn refine(
    points: &[Point2],
    target: &KdTree2,
    initial: RigidParams,
    max_iterations: usize,
) -> (RigidParams, bool) {
    let problem = PointToPoint::new(points, target, initial);
    let (result, report) = LevenbergMarquardt::new()
        .with_patience(max_iterations.max(1))
        .minimize(problem);

    if !report.termination.was_successful() {
        log::debug!("point-to-point refinement stopped: {:?}", report.termination);
    }
    (result.params, report.termination.was_successful())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn recovers_small_offset() {
        let target = (0..40)
            .map(|i| {
                let t = i as f64 * 0.2;
                Point2::new(30.0 * t.cos() + 3.0 * t, 20.0 * t.sin())
            })
            .collect::<Vec<_>>();
        let tree = KdTree2::new(&target).unwrap();

        // The source is the target moved by the inverse of the pose we expect back
        let truth = RigidParams::new(0.4, -0.3, 0.01);
        let inverse = truth.to_iso().inverse();
        let source = target.iter().map(|p| inverse * p).collect::<Vec<_>>();

        let (params, ok) = refine(&source, &tree, RigidParams::default(), 100);
        assert!(ok);
        assert_relative_eq!(params.tx, truth.tx, epsilon = 1e-6);
        assert_relative_eq!(params.ty, truth.ty, epsilon = 1e-6);
        assert_relative_eq!(params.theta, truth.theta, epsilon = 1e-7);
    }
}
