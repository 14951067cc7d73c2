//! A small dense BFGS minimizer for problems with a handful of parameters.
//!
//! The inverse Hessian approximation is an `N×N` stack matrix, so `N` should stay small. Steps are
//! chosen by backtracking until the Armijo sufficient decrease condition holds.

use parry2d_f64::na::{SMatrix, SVector};

/// Sufficient decrease constant for the Armijo test
const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 50;

/// A scalar function with an analytic gradient.
pub trait Objective<const N: usize> {
    /// Returns the function value and its gradient at `x`.
    fn evaluate(&self, x: &SVector<f64, N>) -> (f64, SVector<f64, N>);
}

#[derive(Debug, Clone, Copy)]
pub struct BfgsOptions {
    pub max_iterations: usize,

    /// Stop when the gradient norm falls below this
    pub gradient_tolerance: f64,

    /// Stop when an accepted step is shorter than this
    pub step_tolerance: f64,
}

impl Default for BfgsOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            gradient_tolerance: 1e-5,
            step_tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    GradientTolerance,
    StepTolerance,
    MaxIterations,

    /// No step along the search direction decreased the function enough
    LineSearchFailed,
}

impl Termination {
    pub fn converged(&self) -> bool {
        matches!(
            self,
            Termination::GradientTolerance | Termination::StepTolerance
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BfgsReport<const N: usize> {
    /// The terminal iterate, whether or not the run converged
    pub x: SVector<f64, N>,
    pub value: f64,
    pub iterations: usize,
    pub termination: Termination,
}

/// Minimizes `f` starting from `x0`.
///
/// # Arguments
///
/// * `f`: the objective to minimize
/// * `x0`: the starting point
/// * `options`: iteration limit and stopping tolerances
///
/// returns: BfgsReport<N>
pub fn minimize<const N: usize, F: Objective<N>>(
    f: &F,
    x0: SVector<f64, N>,
    options: &BfgsOptions,
) -> BfgsReport<N> {
    let identity = SMatrix::<f64, N, N>::identity();
    let mut h = identity;
    let mut x = x0;
    let (mut fx, mut g) = f.evaluate(&x);

    let report = |x: SVector<f64, N>, value: f64, iterations: usize, termination| {
        BfgsReport {
            x,
            value,
            iterations,
            termination,
        }
    };

    for iteration in 0..options.max_iterations {
        if g.norm() < options.gradient_tolerance {
            return report(x, fx, iteration, Termination::GradientTolerance);
        }

        let mut direction = -(h * g);
        let mut slope = g.dot(&direction);
        if slope >= 0.0 {
            // The approximation lost positive definiteness, so fall back to steepest descent
            h = identity;
            direction = -g;
            slope = g.dot(&direction);
        }

        // Without curvature information the first step is only as long as a unit gradient step
        let mut alpha = if iteration == 0 {
            1.0 / g.norm().max(1.0)
        } else {
            1.0
        };

        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = x + direction * alpha;
            let (fc, gc) = f.evaluate(&candidate);
            if fc <= fx + ARMIJO_C1 * alpha * slope {
                accepted = Some((candidate, fc, gc));
                break;
            }
            alpha *= 0.5;
        }

        let Some((x_next, f_next, g_next)) = accepted else {
            return report(x, fx, iteration, Termination::LineSearchFailed);
        };

        let s = x_next - x;
        let y = g_next - g;
        x = x_next;
        fx = f_next;
        g = g_next;

        if s.norm() < options.step_tolerance {
            return report(x, fx, iteration + 1, Termination::StepTolerance);
        }

        let sy = s.dot(&y);
        if sy > f64::EPSILON * s.norm() * y.norm() {
            if iteration == 0 {
                h = identity * (sy / y.dot(&y));
            }
            let rho = 1.0 / sy;
            let left = identity - s * y.transpose() * rho;
            let right = identity - y * s.transpose() * rho;
            h = left * h * right + s * s.transpose() * rho;
        }
    }

    report(x, fx, options.max_iterations, Termination::MaxIterations)
}
