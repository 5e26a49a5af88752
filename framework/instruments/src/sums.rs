use std::collections::BTreeMap;

use query_harness_summary_model::{Measurement, MeasurementTarget};

/// Running per-target totals across the measured iterations of one scenario.
///
/// Only feeds the human-readable summary. The full list of [Measurement]s is kept separately and
/// is what gets submitted to a collector.
#[derive(Debug, Default, Clone)]
pub struct MeasurementSums {
    sums: BTreeMap<MeasurementTarget, f64>,
}

impl MeasurementSums {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, measurement: &Measurement) {
        *self.sums.entry(measurement.target).or_insert(0.0) += measurement.value;
    }

    /// The average of `target` over `iterations`, or [None] if no iteration reported it.
    pub fn average(&self, target: MeasurementTarget, iterations: usize) -> Option<f64> {
        if iterations == 0 {
            return None;
        }

        self.sums.get(&target).map(|sum| sum / iterations as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_over_measured_iterations() {
        let mut sums = MeasurementSums::new();
        for (i, v) in [1.0, 2.0, 6.0].into_iter().enumerate() {
            sums.add(&Measurement::time(MeasurementTarget::WallTime, v, i));
        }

        assert_eq!(Some(3.0), sums.average(MeasurementTarget::WallTime, 3));
    }

    #[test]
    fn absent_target_has_no_average() {
        let mut sums = MeasurementSums::new();
        sums.add(&Measurement::time(MeasurementTarget::WallTime, 1.0, 0));

        assert_eq!(None, sums.average(MeasurementTarget::QueryPlanningTime, 1));
    }

    #[test]
    fn zero_iterations_never_divides() {
        let mut sums = MeasurementSums::new();
        sums.add(&Measurement::time(MeasurementTarget::WallTime, 1.0, 0));

        assert_eq!(None, sums.average(MeasurementTarget::WallTime, 0));
    }
}
