/*!
Runoff transformation: gross rainfall to effective (excess) rainfall.

Two models are offered. The NRCS curve-number model is nonlinear in the
cumulative depth, so the effective series is the first difference of the
cumulative runoff. The linear model takes a fixed fraction C of every
increment. Depths are in millimeters and rates in mm/h.
*/
use crate::basin::{BasinDescriptor, SoilGroup, validate_curve_number};
use crate::error::{HydroError, Result, require_coefficient, require_positive};
use crate::storm::Hyetograph;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LAMBDA: f64 = 0.2;
pub const REDUCED_LAMBDA: f64 = 0.05;

// Return-period factors for C relative to T = 2 years (Ven Te Chow averages)
const C_RETURN_PERIOD_FACTORS: [(f64, f64); 6] = [
    (2.0, 1.00),
    (5.0, 1.17),
    (10.0, 1.33),
    (25.0, 1.50),
    (50.0, 1.66),
    (100.0, 1.84),
];
pub const C_BASE_RETURN_PERIOD: f64 = 2.0;

// Antecedent moisture condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoistureCondition {
    Dry,
    #[default]
    Average,
    Wet,
}

impl MoistureCondition {
    /// Converts an average-condition CN to this condition, clamped to [30, 100].
    pub fn adjust(self, cn: f64) -> Result<f64> {
        let cn = validate_curve_number(cn)?;
        let adjusted = match self {
            MoistureCondition::Average => return Ok(cn),
            MoistureCondition::Dry => cn / (2.281 - 0.01281 * cn),
            MoistureCondition::Wet => cn / (0.427 + 0.00573 * cn),
        };
        Ok(adjusted.clamp(30.0, 100.0))
    }
}

/// Maximum potential retention S = 25400 / CN - 254 [mm].
pub fn potential_retention(cn: f64) -> Result<f64> {
    let cn = validate_curve_number(cn)?;
    Ok(25400.0 / cn - 254.0)
}

fn validate_lambda(lambda: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&lambda) {
        Ok(lambda)
    } else {
        Err(HydroError::domain(
            "initial_abstraction_ratio",
            lambda,
            "must lie in [0, 1]",
        ))
    }
}

/**
Calculates the cumulative runoff depth with the NRCS curve number method.

# Arguments
- `rainfall` - Cumulative rainfall depth in mm.
- `cn` - Curve number, 30 to 100.
- `lambda` - Initial abstraction ratio, Ia = lambda * S.

# Returns
The runoff depth in mm, exactly zero while rainfall has not exceeded Ia.
*/
pub fn scs_runoff(rainfall: f64, cn: f64, lambda: f64) -> Result<f64> {
    let s = potential_retention(cn)?;
    let ia = validate_lambda(lambda)? * s;
    Ok(runoff_depth(rainfall, s, ia))
}

// Q = (P - Ia)^2 / (P - Ia + S) for P > Ia
fn runoff_depth(rainfall: f64, s: f64, ia: f64) -> f64 {
    if rainfall <= ia {
        return 0.0;
    }
    (rainfall - ia).powi(2) / (rainfall - ia + s)
}

/// Minimum infiltration rate fc [mm/h] by hydrologic soil group.
pub fn minimum_infiltration_rate(group: SoilGroup) -> f64 {
    match group {
        SoilGroup::A => 2.4,
        SoilGroup::B | SoilGroup::C | SoilGroup::D => 1.2,
    }
}

// Incremental effective depths, one per storm interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveRainfallSeries {
    pub dt_hr: f64,
    pub depth_mm: Vec<f64>,
    pub cumulative_mm: Vec<f64>,
}

impl EffectiveRainfallSeries {
    fn from_increments(dt_hr: f64, increments: DVector<f64>) -> Self {
        let cumulative = cumulative_sum(&increments);
        EffectiveRainfallSeries {
            dt_hr,
            depth_mm: increments.as_slice().to_vec(),
            cumulative_mm: cumulative.as_slice().to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.depth_mm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth_mm.is_empty()
    }

    pub fn total_mm(&self) -> f64 {
        self.cumulative_mm.last().copied().unwrap_or(0.0)
    }

    /// Caps each increment so that the abstraction over the interval is
    /// at least `rate_mm_hr * dt`. Gross increments come from the storm.
    pub fn with_infiltration_floor(&self, gross_mm: &[f64], rate_mm_hr: f64) -> Result<Self> {
        require_positive("rate_mm_hr", rate_mm_hr)?;
        if gross_mm.len() != self.len() {
            return Err(HydroError::domain(
                "intervals",
                gross_mm.len() as f64,
                "gross and effective series differ in length",
            ));
        }
        let floor = rate_mm_hr * self.dt_hr;
        let capped = DVector::from_iterator(
            self.len(),
            self.depth_mm
                .iter()
                .zip(gross_mm)
                .map(|(&effective, &gross)| effective.min((gross - floor).max(0.0))),
        );
        Ok(Self::from_increments(self.dt_hr, capped))
    }
}

fn cumulative_sum(values: &DVector<f64>) -> DVector<f64> {
    let mut total = 0.0;
    values.map(|v| {
        total += v;
        total
    })
}

fn first_difference(cumulative: &DVector<f64>) -> DVector<f64> {
    DVector::from_fn(cumulative.len(), |i, _| {
        if i == 0 {
            cumulative[0]
        } else {
            cumulative[i] - cumulative[i - 1]
        }
    })
}

/**
Effective rainfall series from the curve number model.

# Arguments
* `cumulative_mm` - Cumulative gross depth at the end of each interval.
* `dt_hr` - Interval length.
* `cn` - Curve number for average moisture.
* `lambda` - Initial abstraction ratio.
* `moisture` - Antecedent moisture condition applied to `cn`.
*/
pub fn scs_effective_rainfall(
    cumulative_mm: &[f64],
    dt_hr: f64,
    cn: f64,
    lambda: f64,
    moisture: MoistureCondition,
) -> Result<EffectiveRainfallSeries> {
    require_positive("dt_hr", dt_hr)?;
    let cn = moisture.adjust(cn)?;
    let s = potential_retention(cn)?;
    let ia = validate_lambda(lambda)? * s;
    let gross = DVector::from_column_slice(cumulative_mm);
    let runoff = gross.map(|p| runoff_depth(p, s, ia));
    Ok(EffectiveRainfallSeries::from_increments(
        dt_hr,
        first_difference(&runoff),
    ))
}

/// Effective rainfall as a fixed fraction `c` of every gross increment.
pub fn linear_effective_rainfall(
    increments_mm: &[f64],
    dt_hr: f64,
    c: f64,
) -> Result<EffectiveRainfallSeries> {
    require_positive("dt_hr", dt_hr)?;
    let c = require_coefficient("runoff_coefficient", c)?;
    let effective = DVector::from_column_slice(increments_mm) * c;
    Ok(EffectiveRainfallSeries::from_increments(dt_hr, effective))
}

/// Scales a C given for `base_period_yr` to `return_period_yr` using
/// interpolated average factors. The result never exceeds 1.
pub fn adjust_c_for_return_period(
    c: f64,
    return_period_yr: f64,
    base_period_yr: f64,
) -> Result<f64> {
    let c = require_coefficient("runoff_coefficient", c)?;
    require_positive("return_period_yr", return_period_yr)?;
    require_positive("base_period_yr", base_period_yr)?;
    let factor = |t: f64| {
        let first = C_RETURN_PERIOD_FACTORS[0];
        let last = C_RETURN_PERIOD_FACTORS[C_RETURN_PERIOD_FACTORS.len() - 1];
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        C_RETURN_PERIOD_FACTORS
            .windows(2)
            .find(|w| t >= w[0].0 && t <= w[1].0)
            .map_or(1.0, |w| w[0].1 + (w[1].1 - w[0].1) * (t - w[0].0) / (w[1].0 - w[0].0))
    };
    Ok((c * factor(return_period_yr) / factor(base_period_yr)).min(1.0))
}

/**
Peak flow by the rational method, Q = 0.00278 Cf C i A.

# Arguments
* `c` - Runoff coefficient in (0, 1].
* `intensity_mm_hr` - Design intensity for a duration equal to Tc.
* `area_ha` - Basin area in hectares.
* `return_period_yr` - Selects the frequency factor Cf: 1.10 from 25 years,
  1.20 from 50 and 1.25 from 100.

# Returns
Peak flow in m3/s. The product Cf C is capped at 1.
*/
pub fn rational_peak_flow(
    c: f64,
    intensity_mm_hr: f64,
    area_ha: f64,
    return_period_yr: f64,
) -> Result<f64> {
    let c = require_coefficient("runoff_coefficient", c)?;
    require_positive("intensity_mm_hr", intensity_mm_hr)?;
    require_positive("area_ha", area_ha)?;
    let cf = match return_period_yr {
        t if t >= 100.0 => 1.25,
        t if t >= 50.0 => 1.20,
        t if t >= 25.0 => 1.10,
        _ => 1.0,
    };
    Ok(0.00278 * (cf * c).min(1.0) * intensity_mm_hr * area_ha)
}

/**
Rational C for a land use (HEC-22 ranges).

# Arguments
* `land_use` - e.g. "downtown commercial", "roofs", "lawns clay flat".
* `condition` - "low", "high", or anything else for the mid-range value.
*/
pub fn rational_coefficient(land_use: &str, condition: &str) -> Result<f64> {
    let (low, high) = match land_use.trim().to_lowercase().replace('_', " ").as_str() {
        "downtown commercial" => (0.70, 0.95),
        "neighborhood commercial" => (0.50, 0.70),
        "residential single family" => (0.30, 0.50),
        "residential multi units" => (0.40, 0.60),
        "residential apartments" => (0.60, 0.75),
        "industrial light" => (0.50, 0.80),
        "industrial heavy" => (0.60, 0.90),
        "parks cemeteries" => (0.10, 0.25),
        "playgrounds" => (0.20, 0.35),
        "railroad yards" => (0.20, 0.40),
        "asphalt" => (0.70, 0.95),
        "concrete" => (0.80, 0.95),
        "brick" => (0.70, 0.85),
        "roofs" => (0.75, 0.95),
        "lawns sandy flat" => (0.05, 0.10),
        "lawns sandy steep" => (0.15, 0.20),
        "lawns clay flat" => (0.13, 0.17),
        "lawns clay steep" => (0.25, 0.35),
        _ => {
            return Err(HydroError::UnknownReference {
                kind: "land use",
                name: land_use.to_string(),
            });
        }
    };
    Ok(match condition {
        "low" => low,
        "high" => high,
        _ => (low + high) / 2.0,
    })
}

// Runoff model selected for an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum RunoffModel {
    CurveNumber {
        #[serde(default = "default_lambda")]
        initial_abstraction_ratio: f64,
        #[serde(default)]
        moisture: MoistureCondition,
        // Opt-in minimum infiltration check; needs the basin soil group
        #[serde(default)]
        infiltration_floor: bool,
    },
    // C is taken as the 2-year value and adjusted to the return period
    LinearCoefficient,
}

fn default_lambda() -> f64 {
    DEFAULT_LAMBDA
}

impl Default for RunoffModel {
    fn default() -> Self {
        RunoffModel::CurveNumber {
            initial_abstraction_ratio: DEFAULT_LAMBDA,
            moisture: MoistureCondition::Average,
            infiltration_floor: false,
        }
    }
}

// Scalars describing one runoff transformation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunoffSummary {
    pub model: &'static str,
    pub curve_number: Option<f64>, // after the moisture adjustment
    pub retention_mm: Option<f64>,
    pub initial_abstraction_mm: Option<f64>,
    pub runoff_coefficient: Option<f64>, // after the return-period adjustment
    pub gross_depth_mm: f64,
    pub effective_depth_mm: f64,
}

impl RunoffSummary {
    pub fn runoff_ratio(&self) -> f64 {
        if self.gross_depth_mm > 0.0 {
            self.effective_depth_mm / self.gross_depth_mm
        } else {
            0.0
        }
    }
}

impl RunoffModel {
    pub fn name(&self) -> &'static str {
        match self {
            RunoffModel::CurveNumber { .. } => "curve_number",
            RunoffModel::LinearCoefficient => "linear_coefficient",
        }
    }

    /// Transforms a storm into effective rainfall for a basin.
    pub fn transform(
        &self,
        storm: &Hyetograph,
        basin: &BasinDescriptor,
        return_period_yr: f64,
    ) -> Result<(EffectiveRainfallSeries, RunoffSummary)> {
        let (series, summary) = match *self {
            RunoffModel::CurveNumber {
                initial_abstraction_ratio,
                moisture,
                infiltration_floor,
            } => {
                let cn_ii = basin.require_curve_number(self.name())?;
                let cn = moisture.adjust(cn_ii)?;
                let s = potential_retention(cn)?;
                let mut series = scs_effective_rainfall(
                    &storm.cumulative_mm,
                    storm.dt_hr,
                    cn_ii,
                    initial_abstraction_ratio,
                    moisture,
                )?;
                if infiltration_floor {
                    let group = basin
                        .soil_group
                        .ok_or_else(|| HydroError::missing("infiltration_floor", "soil_group"))?;
                    let rate = minimum_infiltration_rate(group);
                    series = series.with_infiltration_floor(&storm.depth_mm, rate)?;
                }
                let summary = RunoffSummary {
                    model: self.name(),
                    curve_number: Some(cn),
                    retention_mm: Some(s),
                    initial_abstraction_mm: Some(initial_abstraction_ratio * s),
                    runoff_coefficient: None,
                    gross_depth_mm: storm.total_depth_mm,
                    effective_depth_mm: series.total_mm(),
                };
                (series, summary)
            }
            RunoffModel::LinearCoefficient => {
                let c_base = basin.require_runoff_coefficient(self.name())?;
                let c = adjust_c_for_return_period(c_base, return_period_yr, C_BASE_RETURN_PERIOD)?;
                let series = linear_effective_rainfall(&storm.depth_mm, storm.dt_hr, c)?;
                let summary = RunoffSummary {
                    model: self.name(),
                    curve_number: None,
                    retention_mm: None,
                    initial_abstraction_mm: None,
                    runoff_coefficient: Some(c),
                    gross_depth_mm: storm.total_depth_mm,
                    effective_depth_mm: series.total_mm(),
                };
                (series, summary)
            }
        };
        tracing::debug!(
            model = summary.model,
            gross_mm = summary.gross_depth_mm,
            effective_mm = summary.effective_depth_mm,
            "runoff transformed"
        );
        Ok((series, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn retention_and_runoff_reference_values() {
        assert_abs_diff_eq!(potential_retention(75.0).unwrap(), 84.667, epsilon = 1e-3);
        assert_abs_diff_eq!(scs_runoff(100.0, 75.0, 0.2).unwrap(), 41.14, epsilon = 0.01);
        assert_abs_diff_eq!(scs_runoff(100.0, 75.0, 0.05).unwrap(), 50.83, epsilon = 0.01);
        assert_abs_diff_eq!(scs_runoff(100.0, 90.0, 0.2).unwrap(), 72.63, epsilon = 0.01);
        assert_relative_eq!(scs_runoff(100.0, 100.0, 0.2).unwrap(), 100.0);
    }

    #[test]
    fn runoff_grows_with_curve_number() {
        let mut previous = 0.0;
        for cn in (30..=100).step_by(5) {
            let q = scs_runoff(100.0, cn as f64, 0.2).unwrap();
            assert!(q >= previous, "CN {cn}");
            previous = q;
        }
    }

    #[test]
    fn lower_lambda_gives_more_runoff() {
        for cn in [60.0, 75.0, 90.0] {
            assert!(scs_runoff(100.0, cn, 0.05).unwrap() > scs_runoff(100.0, cn, 0.2).unwrap());
        }
    }

    #[test]
    fn zero_below_initial_abstraction() {
        for cn in [40.0, 65.0, 80.0, 95.0] {
            let ia = 0.2 * potential_retention(cn).unwrap();
            assert_eq!(scs_runoff(ia, cn, 0.2).unwrap(), 0.0);
            assert_eq!(scs_runoff(0.5 * ia, cn, 0.2).unwrap(), 0.0);
        }
    }

    #[test]
    fn rejects_out_of_range_inputs() {
        assert!(scs_runoff(50.0, 20.0, 0.2).is_err());
        assert!(scs_runoff(50.0, 101.0, 0.2).is_err());
        assert!(scs_runoff(50.0, 80.0, -0.1).is_err());
        assert!(linear_effective_rainfall(&[1.0], 0.1, 0.0).is_err());
    }

    #[test]
    fn moisture_adjustment() {
        assert_eq!(MoistureCondition::Average.adjust(75.0).unwrap(), 75.0);
        let dry = MoistureCondition::Dry.adjust(75.0).unwrap();
        let wet = MoistureCondition::Wet.adjust(75.0).unwrap();
        assert!(dry < 75.0 && wet > 75.0);
        assert_abs_diff_eq!(dry, 75.0 / (2.281 - 0.01281 * 75.0), epsilon = 1e-12);
        // clamps at the ends of the range
        assert_eq!(MoistureCondition::Dry.adjust(30.0).unwrap(), 30.0);
        assert_abs_diff_eq!(MoistureCondition::Wet.adjust(100.0).unwrap(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn series_is_first_difference_of_cumulative_runoff() {
        let cumulative = [5.0, 20.0, 45.0, 70.0, 80.0];
        let series =
            scs_effective_rainfall(&cumulative, 0.25, 80.0, 0.2, MoistureCondition::Average)
                .unwrap();
        assert_eq!(series.depth_mm[0], scs_runoff(5.0, 80.0, 0.2).unwrap());
        assert_relative_eq!(
            series.total_mm(),
            scs_runoff(80.0, 80.0, 0.2).unwrap(),
            max_relative = 1e-12
        );
        for (k, &p) in cumulative.iter().enumerate() {
            assert!(series.cumulative_mm[k] <= p);
        }
    }

    #[test]
    fn infiltration_floor_limits_effective_rainfall() {
        let gross = [2.0, 30.0, 40.0, 1.0];
        let cumulative = [2.0, 32.0, 72.0, 73.0];
        let series =
            scs_effective_rainfall(&cumulative, 1.0, 95.0, 0.2, MoistureCondition::Average)
                .unwrap();
        let floored = series.with_infiltration_floor(&gross, 2.4).unwrap();
        for k in 0..gross.len() {
            assert!(floored.depth_mm[k] <= series.depth_mm[k]);
            let abstraction = gross[k] - floored.depth_mm[k];
            assert!(abstraction >= (2.4f64).min(gross[k]) - 1e-12);
        }
        // the last hour has 1 mm of rain, all of it abstracted
        assert_eq!(floored.depth_mm[3], 0.0);
    }

    fn storm() -> Hyetograph {
        Hyetograph::from_increments("measured", 1.0, vec![2.0, 30.0, 40.0, 1.0]).unwrap()
    }

    fn floored_model() -> RunoffModel {
        RunoffModel::CurveNumber {
            initial_abstraction_ratio: DEFAULT_LAMBDA,
            moisture: MoistureCondition::Average,
            infiltration_floor: true,
        }
    }

    #[test]
    fn transform_applies_the_soil_group_floor() {
        let basin = BasinDescriptor::new("loma", 40.0, 0.03)
            .unwrap()
            .with_curve_number(95.0)
            .unwrap()
            .with_soil_group(SoilGroup::A);
        let gross = storm();
        let (plain, _) = RunoffModel::default().transform(&gross, &basin, 10.0).unwrap();
        let (floored, summary) = floored_model().transform(&gross, &basin, 10.0).unwrap();
        assert_eq!(summary.effective_depth_mm, floored.total_mm());
        assert!(floored.total_mm() < plain.total_mm());
        for k in 0..floored.len() {
            assert!(floored.depth_mm[k] <= plain.depth_mm[k]);
            let abstraction = gross.depth_mm[k] - floored.depth_mm[k];
            assert!(abstraction >= 2.4f64.min(gross.depth_mm[k]) - 1e-12);
        }
        assert_eq!(floored.depth_mm[3], 0.0);
    }

    #[test]
    fn floor_without_soil_group_is_rejected() {
        let basin = BasinDescriptor::new("loma", 40.0, 0.03)
            .unwrap()
            .with_curve_number(95.0)
            .unwrap();
        assert!(matches!(
            floored_model().transform(&storm(), &basin, 10.0),
            Err(HydroError::MissingParameter {
                field: "soil_group",
                ..
            })
        ));
    }

    #[test]
    fn c_adjustment_interpolates_and_caps() {
        assert_relative_eq!(adjust_c_for_return_period(0.5, 2.0, 2.0).unwrap(), 0.5);
        assert_relative_eq!(
            adjust_c_for_return_period(0.5, 10.0, 2.0).unwrap(),
            0.665,
            epsilon = 1e-12
        );
        // halfway between 10 and 25 years
        assert_relative_eq!(
            adjust_c_for_return_period(0.5, 17.5, 2.0).unwrap(),
            0.5 * 1.415,
            epsilon = 1e-12
        );
        assert_eq!(adjust_c_for_return_period(0.7, 100.0, 2.0).unwrap(), 1.0);
    }

    #[test]
    fn rational_peak() {
        let q = rational_peak_flow(0.6, 50.0, 100.0, 10.0).unwrap();
        assert_relative_eq!(q, 8.34, epsilon = 1e-9);
        let q100 = rational_peak_flow(0.6, 50.0, 100.0, 100.0).unwrap();
        assert_relative_eq!(q100, q * 1.25, max_relative = 1e-12);
        assert!(rational_peak_flow(0.6, 0.0, 100.0, 10.0).is_err());
    }

    #[test]
    fn rational_c_lookup() {
        assert_eq!(rational_coefficient("roofs", "high").unwrap(), 0.95);
        assert_relative_eq!(rational_coefficient("Industrial_Light", "average").unwrap(), 0.65);
        assert!(rational_coefficient("moon base", "low").is_err());
    }
}
