//! Multi-start registration of a source scan onto a target scan.
//!
//! Both clouds are first reduced to their edge points. From every seed pose a local optimizer
//! moves the source edges toward their nearest target edges, and each resulting pose is scored
//! by the RMSE of the complete source cloud against the complete target cloud. The pose with the
//! lowest score wins, with ties going to the seed tried first.

use super::bfgs::{BfgsOptions, Objective, minimize};
use super::point_to_point;
use super::{IcpOptions, Minimizer, RigidParams};
use crate::common::points::filter_points_by_distance;
use crate::errors::InvalidGeometry;
use crate::geom2::{KdTree2, edge_points};
use crate::{Point2, Result, io};
use parry2d_f64::na::Vector3;
use rayon::prelude::*;
use serde::Serialize;
use std::f64::consts::{PI, TAU};
use std::path::Path;

/// Keeps the distance objective differentiable where a residual vanishes. It is far below the
/// sensors' millimeter resolution, so it has no visible effect on the optimum.
const SMOOTHING: f64 = 1e-3;

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResult {
    /// The pose which moves the source onto the target, with `theta` wrapped into (-π, π]
    pub transform: RigidParams,

    /// The complete source cloud after `transform` was applied
    pub transformed_source: Vec<Point2>,

    /// The target cloud the source was registered against
    pub target: Vec<Point2>,

    pub rmse: f64,

    /// Whether the local optimizer reported convergence for the winning seed
    pub converged: bool,
}

/// Sum of smoothed distances from the moved source points to their nearest target points.
struct EdgeDistance<'a> {
    source: &'a [Point2],
    target: &'a KdTree2,
}

impl Objective<3> for EdgeDistance<'_> {
    fn evaluate(&self, x: &Vector3<f64>) -> (f64, Vector3<f64>) {
        let params = RigidParams::from_vector(x);
        let iso = params.to_iso();
        let mut value = 0.0;
        let mut gradient = Vector3::zeros();

        for p in self.source {
            let m = iso * p;
            let r = m - self.target.nearest_point(&m);
            let d = (r.norm_squared() + SMOOTHING * SMOOTHING).sqrt();
            value += d;

            let dt = params.d_theta(p);
            gradient += Vector3::new(r.x, r.y, r.dot(&dt)) / d;
        }

        (value, gradient)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    params: RigidParams,
    rmse: f64,
    converged: bool,
}

impl Candidate {
    /// Strictly better only, so that among equal scores the earlier candidate is kept
    fn beats(&self, other: &Candidate) -> bool {
        self.rmse < other.rmse || (other.rmse.is_nan() && !self.rmse.is_nan())
    }
}

/// Root mean square of the distances from each point to its nearest neighbor in `target`.
pub fn rmse(points: &[Point2], target: &KdTree2) -> f64 {
    let sum = points
        .iter()
        .map(|p| target.nearest_one(p).1.powi(2))
        .sum::<f64>();
    (sum / points.len() as f64).sqrt()
}

fn wrap_angle(theta: f64) -> f64 {
    let wrapped = theta.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

fn require_points(points: &[Point2]) -> Result<()> {
    if points.is_empty() {
        Err(InvalidGeometry::NotEnoughPoints {
            needed: 1,
            found: 0,
        }
        .into())
    } else {
        Ok(())
    }
}

/// Finds the rigid transform which best aligns `source` onto `target`.
///
/// # Arguments
///
/// * `source`: the points to be moved, in capture order
/// * `target`: the stationary reference points, in capture order
/// * `options`: seed grid, edge threshold, artifact filtering and optimizer settings
///
/// returns: Result<RegistrationResult, Box<dyn Error, Global>>
///
/// The local optimizer minimizes the summed edge distances with each distance smoothed as
/// `sqrt(d² + 1e-6)`, which keeps the gradient defined where a point lands exactly on its
/// neighbor. Scoring of the candidates uses the exact nearest-neighbor RMSE.
///
/// Fails with `InvalidGeometry::NotEnoughPoints` if either cloud is empty after filtering or has
/// no edge points. Local optimizer non-convergence is not an error; the terminal pose of each run
/// is scored regardless.
pub fn register(
    source: &[Point2],
    target: &[Point2],
    options: &IcpOptions,
) -> Result<RegistrationResult> {
    let (source, target) = match options.max_jump {
        Some(jump) => (
            filter_points_by_distance(source, jump),
            filter_points_by_distance(target, jump),
        ),
        None => (source.to_vec(), target.to_vec()),
    };
    require_points(&source)?;
    require_points(&target)?;

    let source_edges = edge_points(&source, options.edge_threshold);
    let target_edges = edge_points(&target, options.edge_threshold);
    require_points(&source_edges)?;
    require_points(&target_edges)?;

    let edge_tree = KdTree2::new(&target_edges)?;
    let full_tree = KdTree2::new(&target)?;
    let bfgs_options = BfgsOptions {
        max_iterations: options.max_iterations,
        gradient_tolerance: options.gradient_tolerance,
        ..BfgsOptions::default()
    };

    let run = |seed: &RigidParams| -> Candidate {
        let (params, converged) = match options.minimizer {
            Minimizer::Bfgs => {
                let objective = EdgeDistance {
                    source: &source_edges,
                    target: &edge_tree,
                };
                let report = minimize(&objective, seed.to_vector(), &bfgs_options);
                if !report.termination.converged() {
                    log::debug!("seed {:?} stopped: {:?}", seed, report.termination);
                }
                (
                    RigidParams::from_vector(&report.x),
                    report.termination.converged(),
                )
            }
            Minimizer::LevenbergMarquardt => {
                point_to_point::refine(&source_edges, &edge_tree, *seed, options.max_iterations)
            }
        };

        let moved = params.apply_all(&source);
        Candidate {
            params,
            rmse: rmse(&moved, &full_tree),
            converged,
        }
    };

    let seeds = options.seed_poses();
    let candidates = if options.parallel {
        seeds.par_iter().map(run).collect::<Vec<_>>()
    } else {
        seeds.iter().map(run).collect::<Vec<_>>()
    };

    let best = candidates
        .into_iter()
        .reduce(|best, c| if c.beats(&best) { c } else { best })
        .ok_or("no seed poses configured")?;

    if !best.converged {
        log::warn!("best registration pose did not converge, using its last iterate");
    }
    log::info!(
        "registered {} onto {} points, rmse {:.4}",
        source.len(),
        target.len(),
        best.rmse
    );

    let transform = RigidParams {
        theta: wrap_angle(best.params.theta),
        ..best.params
    };
    Ok(RegistrationResult {
        transformed_source: transform.apply_all(&source),
        target,
        transform,
        rmse: best.rmse,
        converged: best.converged,
    })
}

/// Loads two point list files and registers the first onto the second.
pub fn register_files(
    source_path: &Path,
    target_path: &Path,
    options: &IcpOptions,
) -> Result<RegistrationResult> {
    let source = io::read_points(source_path)?;
    let target = io::read_points(target_path)?;
    register(&source, &target, options)
}
