use crate::errors::InvalidGeometry;
use crate::{Point2, Result};
use serde::Serialize;

/// An ordinary least squares fit of `y = slope·x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    /// Fits a line through `points`, minimizing the squared vertical residuals.
    ///
    /// # Arguments
    ///
    /// * `points`: at least two points which don't all share one x value
    ///
    /// returns: Result<LineFit, Box<dyn Error, Global>>
    pub fn fit(points: &[Point2]) -> Result<Self> {
        if points.len() < 2 {
            return Err(InvalidGeometry::NotEnoughPoints {
                needed: 2,
                found: points.len(),
            }
            .into());
        }

        let n = points.len() as f64;
        let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
        let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

        let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), p| {
            let dx = p.x - mean_x;
            (sxx + dx * dx, sxy + dx * (p.y - mean_y))
        });

        if sxx == 0.0 {
            return Err(InvalidGeometry::DegenerateFit.into());
        }

        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Root mean square of the vertical residuals of `points` from the line.
    pub fn rmse(&self, points: &[Point2]) -> f64 {
        let sum = points
            .iter()
            .map(|p| (p.y - self.predict(p.x)).powi(2))
            .sum::<f64>();
        (sum / points.len() as f64).sqrt()
    }
}
