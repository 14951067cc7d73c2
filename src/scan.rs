//! Scan data model shared by the protocol decoders, the assemblers and the registration code.

use crate::Point2;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identifies which of the supported rotating sensors produced a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Waveshare STL27L, fixed-length 47 byte frames at 921600 baud
    Stl27l,

    /// Slamtec RPLIDAR A2M8, 84 byte express scan packets at 115200 baud
    A2m8,
}

impl SensorKind {
    /// The single character used as a prefix when scans are written to disk. It is the first
    /// letter of the vendor name, which keeps file names compatible with earlier captures.
    pub fn file_prefix(&self) -> char {
        match self {
            SensorKind::Stl27l => 'W',
            SensorKind::A2m8 => 'S',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Stl27l => "Waveshare-STL27L",
            SensorKind::A2m8 => "Slamtec-A2M8-R5",
        }
    }
}

impl Display for SensorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single range reading in the sensor frame. Distance is in millimeters and the angle is in
/// degrees measured clockwise from the sensor's forward axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarSample {
    pub distance: f64,
    pub angle: f64,
}

impl PolarSample {
    pub fn new(distance: f64, angle: f64) -> Self {
        Self { distance, angle }
    }

    /// Converts the sample to a cartesian point. The angle is a bearing from the forward (+y)
    /// axis, so `x = d·sin(a)` and `y = d·cos(a)`.
    pub fn to_point(&self) -> Point2 {
        let a = self.angle.to_radians();
        Point2::new(self.distance * a.sin(), self.distance * a.cos())
    }
}

/// One assembled revolution (or time-boxed batch) of cartesian points from a single sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    source: SensorKind,
    points: Vec<Point2>,
}

impl Scan {
    /// Creates a scan, dropping any point with a non-finite coordinate.
    pub fn new(source: SensorKind, mut points: Vec<Point2>) -> Self {
        points.retain(|p| p.x.is_finite() && p.y.is_finite());
        Self { source, points }
    }

    pub fn empty(source: SensorKind) -> Self {
        Self {
            source,
            points: Vec::new(),
        }
    }

    pub fn source(&self) -> SensorKind {
        self.source
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
