//! Assembly of decoded polar samples into complete scans.
//!
//! The two sensors need different strategies. The A2M8 reports a continuously increasing bearing,
//! so a revolution ends where the bearing wraps back around; `RevolutionAssembler` watches for that
//! wrap. The STL27L is read in short wall-clock windows instead, and `BatchAssembler` decides
//! whether a window produced enough points to count as a scan.

use crate::{Point2, PolarSample, Scan, SensorKind};

/// A drop in bearing larger than this between consecutive samples marks a completed revolution.
pub const WRAP_THRESHOLD_DEG: f64 = 355.0;

/// Accumulates cartesian points until the bearing wraps, then hands the buffer off as a `Scan`.
#[derive(Debug, Clone)]
pub struct RevolutionAssembler {
    source: SensorKind,
    min_points: usize,
    buffer: Vec<Point2>,
    previous_angle: f64,
}

impl RevolutionAssembler {
    /// Creates an assembler which only emits scans holding more than `min_points` points. Shorter
    /// revolutions (typically the partial one at start-up) are discarded.
    pub fn new(source: SensorKind, min_points: usize) -> Self {
        Self {
            source,
            min_points,
            buffer: Vec::new(),
            previous_angle: 0.0,
        }
    }

    pub fn previous_angle(&self) -> f64 {
        self.previous_angle
    }

    /// Number of points collected for the revolution in progress.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Adds one sample. The wrap test runs before the sample is stored, so the sample that
    /// triggers a boundary becomes the first point of the next revolution.
    pub fn push(&mut self, sample: PolarSample) -> Option<Scan> {
        let mut completed = None;
        if self.previous_angle - sample.angle > WRAP_THRESHOLD_DEG {
            if self.buffer.len() > self.min_points {
                let points = std::mem::take(&mut self.buffer);
                completed = Some(Scan::new(self.source, points));
            } else {
                self.buffer.clear();
            }
        }

        self.buffer.push(sample.to_point());
        self.previous_angle = sample.angle;
        completed
    }

    /// Pushes a run of samples, returning the last revolution completed among them.
    pub fn extend<I: IntoIterator<Item = PolarSample>>(&mut self, samples: I) -> Option<Scan> {
        samples.into_iter().fold(None, |last, s| self.push(s).or(last))
    }

    /// Freezes the revolution in progress when capture stops partway through it. The same size
    /// rule applies as for complete revolutions, so a short remainder is discarded.
    pub fn take_partial(&mut self) -> Option<Scan> {
        let points = std::mem::take(&mut self.buffer);
        self.previous_angle = 0.0;
        (points.len() > self.min_points).then(|| Scan::new(self.source, points))
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.previous_angle = 0.0;
    }
}

/// Collects the samples of one time-boxed read window.
#[derive(Debug, Clone)]
pub struct BatchAssembler {
    source: SensorKind,
    min_points: usize,
    buffer: Vec<Point2>,
}

impl BatchAssembler {
    pub fn new(source: SensorKind, min_points: usize) -> Self {
        Self {
            source,
            min_points,
            buffer: Vec::new(),
        }
    }

    pub fn extend<I: IntoIterator<Item = PolarSample>>(&mut self, samples: I) {
        self.buffer.extend(samples.into_iter().map(|s| s.to_point()));
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Ends the window. A window holding more than `min_points` points becomes a scan; a thinner
    /// one yields an empty scan, meaning "not enough data yet" rather than an error.
    pub fn finish(&mut self) -> Scan {
        let points = std::mem::take(&mut self.buffer);
        if points.len() > self.min_points {
            Scan::new(self.source, points)
        } else {
            Scan::empty(self.source)
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sweep(angles: &[f64]) -> Vec<PolarSample> {
        angles.iter().map(|a| PolarSample::new(1000.0, *a)).collect()
    }

    #[test]
    fn wrap_emits_exactly_one_scan() {
        let mut angles = (0..360).map(|a| a as f64).collect::<Vec<_>>();
        angles.push(2.0);
        angles.push(3.0);

        let mut assembler = RevolutionAssembler::new(SensorKind::A2m8, 100);
        let scans = sweep(&angles)
            .into_iter()
            .filter_map(|s| assembler.push(s))
            .collect::<Vec<_>>();

        assert_eq!(scans.len(), 1);
        let scan = &scans[0];
        assert_eq!(scan.len(), 360);

        // The scan ends at 359° and the 2° sample starts the next revolution
        let last = scan.points().last().unwrap();
        let expected = PolarSample::new(1000.0, 359.0).to_point();
        assert_relative_eq!(*last, expected, epsilon = 1e-9);
        assert_eq!(assembler.pending(), 2);
    }

    #[test]
    fn short_revolution_is_discarded() {
        let mut angles = (0..50).map(|a| a as f64 * 7.3).collect::<Vec<_>>();
        angles.push(1.0);

        let mut assembler = RevolutionAssembler::new(SensorKind::A2m8, 100);
        assert!(assembler.extend(sweep(&angles)).is_none());
        assert_eq!(assembler.pending(), 1);
    }

    #[test]
    fn minimum_size_is_exclusive() {
        let mut angles = (0..100).map(|a| a as f64 * 3.6).collect::<Vec<_>>();
        angles.push(0.5);
        let mut assembler = RevolutionAssembler::new(SensorKind::A2m8, 100);
        assert!(assembler.extend(sweep(&angles)).is_none());

        let mut angles = (0..101).map(|a| a as f64 * 3.56).collect::<Vec<_>>();
        angles.push(0.5);
        let mut assembler = RevolutionAssembler::new(SensorKind::A2m8, 100);
        assert_eq!(assembler.extend(sweep(&angles)).unwrap().len(), 101);
    }

    #[test]
    fn partial_revolution_respects_minimum() {
        let mut assembler = RevolutionAssembler::new(SensorKind::A2m8, 100);
        assembler.extend(sweep(&(0..150).map(|a| a as f64).collect::<Vec<_>>()));
        assert_eq!(assembler.take_partial().unwrap().len(), 150);
        assert_eq!(assembler.pending(), 0);
        assert_eq!(assembler.previous_angle(), 0.0);

        assembler.extend(sweep(&(0..100).map(|a| a as f64).collect::<Vec<_>>()));
        assert!(assembler.take_partial().is_none());
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn small_backwards_steps_are_not_boundaries() {
        let mut assembler = RevolutionAssembler::new(SensorKind::A2m8, 0);
        let angles = [10.0, 12.0, 11.0, 13.0, 380.0, 24.5];
        let scan = assembler.extend(sweep(&angles)).unwrap();
        assert_eq!(scan.len(), 5);
    }

    #[test]
    fn batch_below_threshold_is_empty() {
        let mut batch = BatchAssembler::new(SensorKind::Stl27l, 2000);
        batch.extend(sweep(&[45.0; 2000]));
        let scan = batch.finish();
        assert!(scan.is_empty());
        assert_eq!(scan.source(), SensorKind::Stl27l);
        assert_eq!(batch.pending(), 0);
    }

    #[test]
    fn batch_above_threshold_is_emitted() {
        let mut batch = BatchAssembler::new(SensorKind::Stl27l, 2000);
        for _ in 0..167 {
            batch.extend(sweep(&[1.0; 12]));
        }
        assert_eq!(batch.finish().len(), 2004);
    }
}
