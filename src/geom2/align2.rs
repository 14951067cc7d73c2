//! Rigid alignment of one planar point set onto another.
//!
//! A rigid pose is carried as `(tx, ty, theta)`. The rotation is applied to a point first and the
//! translation afterwards, and `theta` turns points clockwise, the same sense in which the
//! sensors measure their bearings:
//!
//! ```text
//! x' =  x·cos θ + y·sin θ + tx
//! y' = -x·sin θ + y·cos θ + ty
//! ```

mod bfgs;
mod icp;
mod point_to_point;

pub use bfgs::{BfgsOptions, BfgsReport, Objective, Termination, minimize};
pub use icp::{RegistrationResult, register, register_files, rmse};

use crate::{Iso2, Point2, Vector2};
use parry2d_f64::na::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RigidParams {
    pub tx: f64,
    pub ty: f64,

    /// Clockwise rotation in radians
    pub theta: f64,
}

impl RigidParams {
    pub fn new(tx: f64, ty: f64, theta: f64) -> Self {
        Self { tx, ty, theta }
    }

    pub fn from_vector(x: &Vector3<f64>) -> Self {
        Self::new(x[0], x[1], x[2])
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.tx, self.ty, self.theta)
    }

    pub fn to_iso(&self) -> Iso2 {
        Iso2::new(Vector2::new(self.tx, self.ty), -self.theta)
    }

    pub fn apply(&self, p: &Point2) -> Point2 {
        self.to_iso() * p
    }

    pub fn apply_all(&self, points: &[Point2]) -> Vec<Point2> {
        let iso = self.to_iso();
        points.iter().map(|p| iso * p).collect()
    }

    /// Derivative of a transformed point with respect to `theta`, evaluated at the original point.
    pub(crate) fn d_theta(&self, p: &Point2) -> Vector2 {
        let (s, c) = self.theta.sin_cos();
        Vector2::new(-p.x * s + p.y * c, -p.x * c - p.y * s)
    }
}

/// The local optimizer run from each seed pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Minimizer {
    /// Quasi-Newton descent on the summed nearest-neighbor distance
    #[default]
    Bfgs,

    /// Least squares on per-axis nearest-neighbor offsets
    LevenbergMarquardt,
}

/// Settings for `register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpOptions {
    /// Values used for both the initial `tx` and the initial `theta` of the seed poses. Every
    /// pairing is tried, so `n` values give `n²` starts.
    pub seeds: Vec<f64>,

    /// Neighbor distance used to reduce both clouds to edge points
    pub edge_threshold: f64,

    /// Per-axis jump used to filter capture artifacts from both clouds first, if any
    pub max_jump: Option<f64>,

    pub max_iterations: usize,
    pub gradient_tolerance: f64,
    pub minimizer: Minimizer,

    /// Run the seed starts on the rayon thread pool
    pub parallel: bool,
}

impl Default for IcpOptions {
    fn default() -> Self {
        Self {
            seeds: vec![-100.0, -75.0, -50.0, -25.0, 0.0, 25.0, 50.0, 75.0, 100.0],
            edge_threshold: 1.0,
            max_jump: Some(1000.0),
            max_iterations: 200,
            gradient_tolerance: 1e-5,
            minimizer: Minimizer::Bfgs,
            parallel: true,
        }
    }
}

impl IcpOptions {
    /// The seed poses in the order they are tried: rotation in the outer loop, translation in the
    /// inner loop. `ty` always starts at zero.
    pub fn seed_poses(&self) -> Vec<RigidParams> {
        self.seeds
            .iter()
            .flat_map(|r| self.seeds.iter().map(|t| RigidParams::new(*t, 0.0, *r)))
            .collect()
    }
}
