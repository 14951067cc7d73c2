use crate::common::points::{dist, mean_point};
use crate::errors::InvalidGeometry;
use crate::metrology::LineFit;
use crate::{Point2, Result};
use itertools::Itertools;
use serde::Serialize;

/// Summary of a slice which should lie along a straight face.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProfileStats {
    pub fit: LineFit,

    /// RMS of the vertical residuals from the fitted line
    pub rmse: f64,

    /// Pearson correlation between the measured and fitted y values. NaN when the fitted line
    /// is horizontal, since the fitted values then have no variance.
    pub pearson: f64,

    /// Largest distance between any two points of the slice
    pub length: f64,

    /// The pair of points which are `length` apart
    pub endpoints: (Point2, Point2),

    /// Distance from the sensor origin to the slice centroid
    pub centroid_distance: f64,
}

/// Pearson correlation coefficient of two equally long samples.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len()) as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (da, db) = (x - mean_a, y - mean_b);
        sab += da * db;
        saa += da * da;
        sbb += db * db;
    }
    sab / (saa * sbb).sqrt()
}

fn longest_pair(points: &[Point2]) -> (f64, (Point2, Point2)) {
    let first = (0.0, (points[0], points[0]));
    points
        .iter()
        .tuple_combinations()
        .fold(first, |best, (a, b)| {
            let d = dist(a, b);
            if d > best.0 { (d, (*a, *b)) } else { best }
        })
}

/// Fits a line through a slice and measures how well it holds to it, how long it is, and how far
/// it is from the sensor.
pub fn profile_stats(points: &[Point2]) -> Result<ProfileStats> {
    let fit = LineFit::fit(points)?;
    let measured = points.iter().map(|p| p.y).collect::<Vec<_>>();
    let predicted = points.iter().map(|p| fit.predict(p.x)).collect::<Vec<_>>();
    let (length, endpoints) = longest_pair(points);

    Ok(ProfileStats {
        fit,
        rmse: fit.rmse(points),
        pearson: pearson(&measured, &predicted),
        length,
        endpoints,
        centroid_distance: mean_point(points).coords.norm(),
    })
}

/// The included angle between the two legs of an L-shaped profile.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LProfileAngle {
    /// Acute angle between the two fitted legs, in degrees
    pub degrees: f64,
    pub left: LineFit,
    pub right: LineFit,
}

/// Splits the profile at its highest point and fits a line to each side.
///
/// Points are ordered by x and the split falls on the first point with the maximum y, which
/// belongs to both legs. Each leg therefore needs at least one more point for the fit, so a
/// profile which peaks at either end of its x range is rejected.
pub fn l_profile_angle(points: &[Point2]) -> Result<LProfileAngle> {
    if points.len() < 3 {
        return Err(InvalidGeometry::NotEnoughPoints {
            needed: 3,
            found: points.len(),
        }
        .into());
    }

    let sorted = points
        .iter()
        .copied()
        .sorted_by(|a, b| a.x.total_cmp(&b.x))
        .collect::<Vec<_>>();

    let peak = sorted
        .iter()
        .enumerate()
        .fold(0, |best, (i, p)| if p.y > sorted[best].y { i } else { best });

    let left = LineFit::fit(&sorted[..=peak])?;
    let right = LineFit::fit(&sorted[peak..])?;

    let m1 = left.slope;
    let m2 = right.slope;
    let degrees = ((m1 - m2) / (1.0 + m1 * m2)).abs().atan().to_degrees();

    Ok(LProfileAngle {
        degrees,
        left,
        right,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(n: usize, slope: f64, intercept: f64) -> Vec<Point2> {
        (0..n)
            .map(|i| {
                let x = i as f64 * 10.0 - 50.0;
                Point2::new(x, slope * x + intercept)
            })
            .collect()
    }

    #[test]
    fn straight_face_stats() {
        let points = line(11, 0.5, 1000.0);
        let stats = profile_stats(&points).unwrap();
        assert_relative_eq!(stats.rmse, 0.0, epsilon = 1e-9);
        assert_relative_eq!(stats.pearson, 1.0, epsilon = 1e-12);
        assert_relative_eq!(stats.length, (100.0f64.powi(2) + 50.0f64.powi(2)).sqrt());
        assert_eq!(stats.endpoints, (points[0], points[10]));
        assert_relative_eq!(stats.centroid_distance, 1000.0, epsilon = 1e-9);
    }

    #[test]
    fn negative_slope_correlates_positively() {
        // The fitted values track the measured ones regardless of slope sign
        let mut points = line(8, -2.0, 300.0);
        points[3].y += 4.0;
        let stats = profile_stats(&points).unwrap();
        assert!(stats.pearson > 0.99 && stats.pearson <= 1.0);
    }

    #[test]
    fn right_angle_profile() {
        // A roof with legs of slope 1 and -1, peaked at x = 0
        let points = (-10..=10)
            .map(|i| Point2::new(i as f64, 500.0 - (i as f64).abs()))
            .rev()
            .collect::<Vec<_>>();
        let angle = l_profile_angle(&points).unwrap();
        assert_relative_eq!(angle.left.slope, 1.0, epsilon = 1e-12);
        assert_relative_eq!(angle.right.slope, -1.0, epsilon = 1e-12);
        assert_relative_eq!(angle.degrees, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn shallow_profile_angle() {
        let slope = 30.0f64.to_radians().tan();
        let points = (0..=20)
            .map(|i| {
                let x = i as f64;
                let y = if i <= 10 { slope * x } else { slope * 10.0 };
                Point2::new(x, y)
            })
            .collect::<Vec<_>>();
        let angle = l_profile_angle(&points).unwrap();
        assert_relative_eq!(angle.degrees, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn peak_at_end_is_rejected() {
        let points = line(10, 1.0, 0.0);
        assert!(l_profile_angle(&points).is_err());
    }
}
