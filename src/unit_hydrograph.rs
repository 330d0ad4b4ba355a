/*!
Unit hydrographs: the outlet response to one millimetre of effective
rainfall falling uniformly over one time step.

Every shape is sampled at exact multiples of `dt`, starts at zero and has
its negative artifacts clipped. The sampled ordinates are then scaled so
their trapezoid volume is exactly one millimetre over the basin, whatever
the step. Discharges are m3/s per mm of excess.
*/
use crate::basin::BasinDescriptor;
use crate::convolution::trapezoid_volume_m3;
use crate::error::{HydroError, Result, require_positive};
use crate::reference::ReferenceData;
use crate::table::CurveTable;
use serde::{Deserialize, Serialize};

pub const SCS_SHAPE_FACTOR: f64 = 1.67;
pub const STANDARD_PRF: f64 = 484.0;
pub const DEFAULT_GAMMA_M: f64 = 3.7;
pub const DEFAULT_SNYDER_CT: f64 = 2.0;
pub const DEFAULT_SNYDER_CP: f64 = 0.6;
pub const CLARK_STORAGE_RATIO: f64 = 2.0; // R / Tc when no storage is given

const KM_TO_MI: f64 = 0.621371;
const KM2_TO_MI2: f64 = 0.386102;
const CFS_TO_M3S: f64 = 0.0283168;

// Typical shape factors X for the triangular hydrograph:
// 1.00 rational / inner urban, 1.25 steep urban, 1.67 NRCS,
// 2.25 mixed, 3.33 winding rural, 5.50 flat rural.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum UnitHydrographShape {
    Triangular {
        #[serde(default = "scs_shape_factor")]
        x: f64,
    },
    ScsCurvilinear {
        #[serde(default = "standard_prf")]
        prf: f64,
    },
    Gamma {
        #[serde(default = "default_gamma_m")]
        m: f64,
    },
    // Needs the channel and centroid lengths of the basin
    Snyder {
        #[serde(default = "default_snyder_ct")]
        ct: f64,
        #[serde(default = "default_snyder_cp")]
        cp: f64,
    },
    Clark {
        #[serde(default)]
        storage_hr: Option<f64>,
    },
}

fn scs_shape_factor() -> f64 {
    SCS_SHAPE_FACTOR
}

fn standard_prf() -> f64 {
    STANDARD_PRF
}

fn default_gamma_m() -> f64 {
    DEFAULT_GAMMA_M
}

fn default_snyder_ct() -> f64 {
    DEFAULT_SNYDER_CT
}

fn default_snyder_cp() -> f64 {
    DEFAULT_SNYDER_CP
}

impl Default for UnitHydrographShape {
    fn default() -> Self {
        UnitHydrographShape::Triangular { x: SCS_SHAPE_FACTOR }
    }
}

impl UnitHydrographShape {
    pub fn name(&self) -> &'static str {
        match self {
            UnitHydrographShape::Triangular { .. } => "triangular",
            UnitHydrographShape::ScsCurvilinear { .. } => "scs_curvilinear",
            UnitHydrographShape::Gamma { .. } => "gamma",
            UnitHydrographShape::Snyder { .. } => "snyder",
            UnitHydrographShape::Clark { .. } => "clark",
        }
    }

    /// Shape factor X when the shape has one.
    pub fn shape_factor(&self) -> Option<f64> {
        match self {
            UnitHydrographShape::Triangular { x } => Some(*x),
            _ => None,
        }
    }

    /**
    Generates the unit hydrograph of a basin.

    # Arguments
    * `basin` - Supplies the area, and the lengths for Snyder.
    * `tc_hr` - Time of concentration.
    * `dt_hr` - Effective rainfall step; also the sampling step.
    * `reference` - Dimensionless table for the curvilinear shape.
    */
    pub fn generate(
        &self,
        basin: &BasinDescriptor,
        tc_hr: f64,
        dt_hr: f64,
        reference: &ReferenceData,
    ) -> Result<UnitResponse> {
        let area_km2 = basin.area_km2();
        let response = match *self {
            UnitHydrographShape::Triangular { x } => triangular(area_km2, tc_hr, dt_hr, x)?,
            UnitHydrographShape::ScsCurvilinear { prf } => {
                scs_curvilinear(area_km2, tc_hr, dt_hr, prf, reference.dimensionless_uh())?
            }
            UnitHydrographShape::Gamma { m } => gamma(area_km2, tc_hr, dt_hr, m)?,
            UnitHydrographShape::Snyder { ct, cp } => {
                let length_m = basin.require_channel_length(self.name())?;
                let centroid_m = basin
                    .centroid_length_m
                    .ok_or_else(|| HydroError::missing(self.name(), "centroid_length_m"))?;
                snyder(area_km2, length_m / 1000.0, centroid_m / 1000.0, dt_hr, ct, cp)?
            }
            UnitHydrographShape::Clark { storage_hr } => {
                let r = storage_hr.unwrap_or(CLARK_STORAGE_RATIO * tc_hr);
                clark(area_km2, tc_hr, r, dt_hr)?
            }
        };
        tracing::debug!(
            shape = response.shape,
            tp_hr = response.time_to_peak_hr,
            tb_hr = response.base_time_hr,
            peak = response.peak_m3s_per_mm(),
            "unit hydrograph generated"
        );
        Ok(response)
    }
}

// Sampled response to 1 mm of effective rainfall
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitResponse {
    pub shape: &'static str,
    pub dt_hr: f64,
    pub time_hr: Vec<f64>,
    pub discharge_m3s_per_mm: Vec<f64>,
    pub time_to_peak_hr: f64,
    pub base_time_hr: f64,
    pub unit_volume_m3: f64, // one millimetre over the basin; the ordinates integrate to it
}

/// Largest step that keeps at least three samples on the rising limb,
/// dt <= Tp / 3 with Tp = dt / 2 + 0.6 Tc.
pub fn max_dt_hr(tc_hr: f64) -> f64 {
    0.24 * tc_hr
}

impl UnitResponse {
    fn sampled(
        shape: &'static str,
        area_km2: f64,
        dt_hr: f64,
        time_to_peak_hr: f64,
        base_time_hr: f64,
        ordinate: impl Fn(f64) -> f64,
    ) -> Result<Self> {
        let time_hr = sample_times(base_time_hr, dt_hr);
        let discharge = time_hr.iter().map(|&t| ordinate(t)).collect();
        Self::from_ordinates(
            shape,
            area_km2,
            dt_hr,
            time_to_peak_hr,
            base_time_hr,
            time_hr,
            discharge,
        )
    }

    // Clips, zeroes the first ordinate and rescales to one millimetre
    fn from_ordinates(
        shape: &'static str,
        area_km2: f64,
        dt_hr: f64,
        time_to_peak_hr: f64,
        base_time_hr: f64,
        time_hr: Vec<f64>,
        mut discharge: Vec<f64>,
    ) -> Result<Self> {
        for q in discharge.iter_mut() {
            if !(*q > 0.0) {
                *q = 0.0;
            }
        }
        if let Some(first) = discharge.first_mut() {
            *first = 0.0;
        }
        let sampled_volume = trapezoid_volume_m3(&discharge, dt_hr);
        if !(sampled_volume > 0.0) {
            return Err(HydroError::domain(
                "dt_hr",
                dt_hr,
                "step too coarse for the unit hydrograph",
            ));
        }
        let unit_volume_m3 = unit_depth_volume_m3(area_km2);
        let scale = unit_volume_m3 / sampled_volume;
        for q in discharge.iter_mut() {
            *q *= scale;
        }
        Ok(UnitResponse {
            shape,
            dt_hr,
            time_hr,
            discharge_m3s_per_mm: discharge,
            time_to_peak_hr,
            base_time_hr,
            unit_volume_m3,
        })
    }

    pub fn len(&self) -> usize {
        self.discharge_m3s_per_mm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discharge_m3s_per_mm.is_empty()
    }

    pub fn peak_m3s_per_mm(&self) -> f64 {
        self.discharge_m3s_per_mm.iter().copied().fold(0.0, f64::max)
    }

    /// Sample time of the largest ordinate (first one on ties).
    pub fn sampled_peak_time_hr(&self) -> f64 {
        let peak = self.peak_m3s_per_mm();
        self.discharge_m3s_per_mm
            .iter()
            .position(|&q| q == peak)
            .map_or(0.0, |k| self.time_hr[k])
    }
}

fn sample_times(base_time_hr: f64, dt_hr: f64) -> Vec<f64> {
    let n = (base_time_hr / dt_hr - 1e-9).ceil().max(1.0) as usize + 1;
    (0..n).map(|k| k as f64 * dt_hr).collect()
}

/// NRCS time to peak, Tp = dt / 2 + 0.6 Tc.
pub fn scs_time_to_peak(tc_hr: f64, dt_hr: f64) -> Result<f64> {
    require_positive("tc_hr", tc_hr)?;
    require_positive("dt_hr", dt_hr)?;
    Ok(dt_hr / 2.0 + 0.6 * tc_hr)
}

/**
Triangular unit hydrograph with shape factor X.

# Arguments
* `area_km2` - Basin area.
* `tc_hr` - Time of concentration.
* `dt_hr` - Rainfall step.
* `x` - Ratio of recession time to time to peak, at least 1.

# Returns
qp = 0.278 A / Tp * 2 / (1 + X) rising linearly to Tp and falling to
Tb = (1 + X) Tp. The apex is drawn at the sample nearest Tp so the
sampled peak is qp and unique.
*/
pub fn triangular(area_km2: f64, tc_hr: f64, dt_hr: f64, x: f64) -> Result<UnitResponse> {
    require_positive("area_km2", area_km2)?;
    if !(x >= 1.0 && x.is_finite()) {
        return Err(HydroError::domain("shape_factor", x, "must be >= 1"));
    }
    let tp = scs_time_to_peak(tc_hr, dt_hr)?;
    let qp = 0.278 * area_km2 / tp * 2.0 / (1.0 + x);
    let tb = (1.0 + x) * tp;
    // tp >= dt / 2, so the apex sample is at least dt and lies before tb
    let apex = (tp / dt_hr).round().max(1.0) * dt_hr;
    let recession = tb - apex;
    UnitResponse::sampled("triangular", area_km2, dt_hr, tp, tb, |t| {
        if t <= apex {
            qp * t / apex
        } else {
            qp * (tb - t) / recession
        }
    })
}

/**
NRCS curvilinear hydrograph: the dimensionless table scaled by
qp = PRF / 484 * 0.208 A / Tp.

A peak rate factor other than 484 stretches the recession limb so the
hydrograph still holds one millimetre. Factors so large that the rising
limb alone exceeds that volume are rejected.
*/
pub fn scs_curvilinear(
    area_km2: f64,
    tc_hr: f64,
    dt_hr: f64,
    prf: f64,
    dimensionless: &CurveTable,
) -> Result<UnitResponse> {
    require_positive("area_km2", area_km2)?;
    require_positive("prf", prf)?;
    let tp = scs_time_to_peak(tc_hr, dt_hr)?;
    let qp = prf / STANDARD_PRF * 0.208 * area_km2 / tp;

    let x_max = dimensionless.x_max();
    let rising = table_area(dimensionless, 0.0, 1.0);
    let falling = table_area(dimensionless, 1.0, x_max);
    let stretch = ((rising + falling) * STANDARD_PRF / prf - rising) / falling;
    if !(stretch > 0.0 && stretch.is_finite()) {
        return Err(HydroError::domain(
            "prf",
            prf,
            "too large for the dimensionless hydrograph",
        ));
    }
    let tb = (1.0 + stretch * (x_max - 1.0)) * tp;
    UnitResponse::sampled("scs_curvilinear", area_km2, dt_hr, tp, tb, |t| {
        let r = t / tp;
        if t > tb {
            0.0
        } else if r <= 1.0 {
            qp * dimensionless.interpolate(r)
        } else {
            qp * dimensionless.interpolate(1.0 + (r - 1.0) / stretch)
        }
    })
}

// Exact area under the piecewise-linear table between two abscissas
fn table_area(table: &CurveTable, from: f64, to: f64) -> f64 {
    let mut xs: Vec<f64> = std::iter::once(from)
        .chain(table.points().iter().map(|&(x, _)| x).filter(|&x| x > from && x < to))
        .chain(std::iter::once(to))
        .collect();
    xs.dedup();
    xs.windows(2)
        .map(|w| 0.5 * (table.interpolate(w[0]) + table.interpolate(w[1])) * (w[1] - w[0]))
        .sum()
}

/// Gamma-shaped hydrograph q/qp = (t/Tp)^m e^(m (1 - t/Tp)), with the
/// peak rate factor approximated as 130 m + 3 and a cut-off at 5 Tp.
pub fn gamma(area_km2: f64, tc_hr: f64, dt_hr: f64, m: f64) -> Result<UnitResponse> {
    require_positive("area_km2", area_km2)?;
    require_positive("gamma_m", m)?;
    let tp = scs_time_to_peak(tc_hr, dt_hr)?;
    let prf = 130.0 * m + 3.0;
    let qp = prf / STANDARD_PRF * 0.208 * area_km2 / tp;
    let tb = 5.0 * tp;
    UnitResponse::sampled("gamma", area_km2, dt_hr, tp, tb, |t| {
        if t > tb {
            return 0.0;
        }
        let r = t / tp;
        qp * r.powf(m) * (m * (1.0 - r)).exp()
    })
}

/**
Snyder synthetic hydrograph, normalized to one millimetre of excess.

# Arguments
* `length_km` - Main channel length L.
* `centroid_km` - Outlet to centroid distance Lc.
* `ct`, `cp` - Regional lag and peak coefficients.

The lag tp = Ct (L Lc)^0.3 (miles) is the time to peak. The shape passes
through the W50 and W75 widths, one third before the peak, and ends at
tb = tp + 3 W50.
*/
pub fn snyder(
    area_km2: f64,
    length_km: f64,
    centroid_km: f64,
    dt_hr: f64,
    ct: f64,
    cp: f64,
) -> Result<UnitResponse> {
    require_positive("area_km2", area_km2)?;
    require_positive("length_km", length_km)?;
    require_positive("centroid_km", centroid_km)?;
    require_positive("dt_hr", dt_hr)?;
    require_positive("snyder_ct", ct)?;
    require_positive("snyder_cp", cp)?;

    let tp = ct * (length_km * KM_TO_MI * centroid_km * KM_TO_MI).powf(0.3);
    let area_mi2 = area_km2 * KM2_TO_MI2;
    let qp_cfs = 640.0 * cp * area_mi2 / tp;
    let unit_peak = (qp_cfs / area_mi2).powf(-1.08);
    let w50 = 770.0 * unit_peak;
    let w75 = 440.0 * unit_peak;
    let tb = tp + 3.0 * w50;

    let qp = qp_cfs * CFS_TO_M3S;
    let shape = CurveTable::new(vec![
        (0.0, 0.0),
        ((tp - w50 / 3.0).max(0.0), 0.5 * qp),
        ((tp - w75 / 3.0).max(0.0), 0.75 * qp),
        (tp, qp),
        (tp + 2.0 * w75 / 3.0, 0.75 * qp),
        (tp + 2.0 * w50 / 3.0, 0.5 * qp),
        (tb, 0.0),
    ])?;
    UnitResponse::sampled("snyder", area_km2, dt_hr, tp, tb, |t| shape.interpolate(t))
}

// Cumulative area fraction of the diamond-shaped basin, r = t / Tc in [0, 1]
fn clark_time_area(r: f64) -> f64 {
    let r = r.clamp(0.0, 1.0);
    let a = if r <= 0.5 {
        1.414 * r.powf(1.5)
    } else {
        1.0 - 1.414 * (1.0 - r).powf(1.5)
    };
    a.clamp(0.0, 1.0)
}

/**
Clark hydrograph: the time-area inflow routed through a linear reservoir.

# Arguments
* `tc_hr` - Translation time of the time-area curve.
* `storage_hr` - Reservoir coefficient R.

# Returns
Ordinates up to Tc + 5 R, scaled for the water still stored at the cut.
Routing uses O2 = c1 (I1 + I2) + c0 O1 with
c1 = dt / (2R + dt) and c0 = (2R - dt) / (2R + dt).
*/
pub fn clark(area_km2: f64, tc_hr: f64, storage_hr: f64, dt_hr: f64) -> Result<UnitResponse> {
    require_positive("area_km2", area_km2)?;
    require_positive("tc_hr", tc_hr)?;
    require_positive("storage_hr", storage_hr)?;
    require_positive("dt_hr", dt_hr)?;

    let c1 = dt_hr / (2.0 * storage_hr + dt_hr);
    let c0 = (2.0 * storage_hr - dt_hr) / (2.0 * storage_hr + dt_hr);
    let tb = tc_hr + 5.0 * storage_hr;
    let time_hr = sample_times(tb, dt_hr);
    let n = time_hr.len();

    // 1 mm over the area fraction that reaches the outlet in each step [m3/s]
    let to_flow = unit_depth_volume_m3(area_km2) / (dt_hr * 3600.0);
    let mut inflow = vec![0.0; n];
    for k in 1..n {
        let reached = clark_time_area(time_hr[k] / tc_hr) - clark_time_area(time_hr[k - 1] / tc_hr);
        inflow[k] = reached * to_flow;
    }
    let mut outflow = vec![0.0; n];
    for k in 1..n {
        outflow[k] = c1 * (inflow[k] + inflow[k - 1]) + c0 * outflow[k - 1];
    }

    let peak = outflow.iter().copied().fold(0.0, f64::max);
    let tp = outflow
        .iter()
        .position(|&q| q == peak)
        .map_or(0.0, |k| time_hr[k]);
    UnitResponse::from_ordinates("clark", area_km2, dt_hr, tp, tb, time_hr, outflow)
}

/// Volume of one millimetre over the basin [m3].
pub fn unit_depth_volume_m3(area_km2: f64) -> f64 {
    1000.0 * area_km2
}
