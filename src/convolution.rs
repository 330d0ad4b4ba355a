use crate::error::{HydroError, Result};
use crate::runoff::EffectiveRainfallSeries;
use crate::unit_hydrograph::UnitResponse;
use nalgebra::DVector;
use serde::Serialize;

// Outlet discharge; sample k sits at k * dt from the start of the storm
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DischargeSeries {
    pub dt_hr: f64,
    pub time_hr: Vec<f64>,
    pub discharge_m3s: Vec<f64>,
    pub peak_m3s: f64,
    pub time_to_peak_hr: f64,
    pub volume_m3: f64,
}

impl DischargeSeries {
    pub fn from_ordinates(dt_hr: f64, discharge_m3s: Vec<f64>) -> Self {
        let time_hr = (0..discharge_m3s.len()).map(|k| k as f64 * dt_hr).collect::<Vec<_>>();
        let (peak_index, peak_m3s) = discharge_m3s
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0), |best, (k, q)| if q > best.1 { (k, q) } else { best });
        let time_to_peak_hr = time_hr.get(peak_index).copied().unwrap_or(0.0);
        let volume_m3 = trapezoid_volume_m3(&discharge_m3s, dt_hr);
        DischargeSeries {
            dt_hr,
            time_hr,
            discharge_m3s,
            peak_m3s,
            time_to_peak_hr,
            volume_m3,
        }
    }

    pub fn len(&self) -> usize {
        self.discharge_m3s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discharge_m3s.is_empty()
    }
}

/**
Full discrete convolution of two sequences.

# Returns
A vector of length `a.len() + b.len() - 1`, or an empty vector when
either input is empty. The result does not depend on argument order.
*/
pub fn convolve_full(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    // nalgebra requires the kernel to be the shorter operand
    let (signal, kernel) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    DVector::from_column_slice(signal)
        .convolve_full(DVector::from_column_slice(kernel))
        .as_slice()
        .to_vec()
}

/**
Convolves effective rainfall with a unit hydrograph.

# Arguments
* `effective` - Incremental effective depths [mm].
* `unit` - Unit response [m3/s per mm] sampled on the same step.

# Returns
The discharge series, with peak, time to peak and trapezoid volume.
*/
pub fn convolve(
    effective: &EffectiveRainfallSeries,
    unit: &UnitResponse,
) -> Result<DischargeSeries> {
    if !approx::relative_eq!(effective.dt_hr, unit.dt_hr, max_relative = 1e-9) {
        return Err(HydroError::domain(
            "dt_hr",
            unit.dt_hr,
            "unit hydrograph step differs from the rainfall step",
        ));
    }
    if effective.is_empty() || unit.is_empty() {
        return Err(HydroError::domain("intervals", 0.0, "cannot convolve an empty series"));
    }
    let discharge = convolve_full(&effective.depth_mm, &unit.discharge_m3s_per_mm);
    let series = DischargeSeries::from_ordinates(effective.dt_hr, discharge);
    tracing::debug!(
        peak_m3s = series.peak_m3s,
        time_to_peak_hr = series.time_to_peak_hr,
        volume_m3 = series.volume_m3,
        "hydrograph convolved"
    );
    Ok(series)
}

/// Trapezoid integral of a flow series on a uniform step [m3].
pub fn trapezoid_volume_m3(discharge_m3s: &[f64], dt_hr: f64) -> f64 {
    match discharge_m3s {
        [] | [_] => 0.0,
        [first, .., last] => {
            let sum: f64 = discharge_m3s.iter().sum();
            (sum - 0.5 * (first + last)) * dt_hr * 3600.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runoff::linear_effective_rainfall;
    use crate::unit_hydrograph::triangular;
    use approx::assert_relative_eq;

    #[test]
    fn full_mode_length_and_values() {
        let out = convolve_full(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5]);
        assert_eq!(out.len(), 5);
        let expected = [0.0, 1.0, 2.5, 4.0, 1.5];
        for (got, want) in out.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn argument_order_does_not_matter() {
        let a = [0.5, 3.0, 1.0];
        let b = [0.0, 1.0, 4.0, 2.0, 1.0, 0.0];
        assert_eq!(convolve_full(&a, &b), convolve_full(&b, &a));
        assert!(convolve_full(&[], &b).is_empty());
    }

    #[test]
    fn trapezoid_rule() {
        assert_eq!(trapezoid_volume_m3(&[], 1.0), 0.0);
        assert_eq!(trapezoid_volume_m3(&[3.0], 1.0), 0.0);
        assert_relative_eq!(trapezoid_volume_m3(&[0.0, 1.0, 0.0], 1.0), 3600.0);
    }

    #[test]
    fn volume_is_effective_depth_times_unit_volume() {
        let dt = 10.0 / 60.0;
        let effective = linear_effective_rainfall(&[2.0, 6.0, 10.0, 4.0, 1.0], dt, 0.5).unwrap();
        let unit = triangular(2.0, 0.75, dt, 1.67).unwrap();
        let q = convolve(&effective, &unit).unwrap();
        assert_eq!(q.len(), effective.len() + unit.len() - 1);
        assert_relative_eq!(
            q.volume_m3,
            effective.total_mm() * unit.unit_volume_m3,
            max_relative = 1e-9
        );
        assert_relative_eq!(q.volume_m3, effective.total_mm() * 2000.0, max_relative = 0.01);
        assert_eq!(q.discharge_m3s[0], 0.0);
    }

    #[test]
    fn mismatched_steps_are_rejected() {
        let effective = linear_effective_rainfall(&[1.0, 2.0], 0.25, 0.5).unwrap();
        let unit = triangular(2.0, 0.75, 0.1, 1.67).unwrap();
        assert!(matches!(convolve(&effective, &unit), Err(HydroError::Domain { .. })));
    }
}
