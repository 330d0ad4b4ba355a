use crate::basin::BasinDescriptor;
use crate::error::{HydroError, Result, require_coefficient, require_positive};
use crate::idf::IdfCurve;
use serde::{Deserialize, Serialize};

const FT_PER_M: f64 = 3.28084;
const MI_PER_KM: f64 = 0.621371;
const MM_PER_IN: f64 = 25.4;

const SHEET_FLOW_MAX_LENGTH_M: f64 = 100.0;
pub const DEFAULT_P2_MM: f64 = 50.0; // 2-year, 24-hour depth
pub const DEFAULT_ENTRY_TIME_MIN: f64 = 5.0;

const KINEMATIC_MAX_ITERATIONS: usize = 20;
const KINEMATIC_TOLERANCE_HR: f64 = 0.01;

// Kirpich adjustment for the surface the path runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KirpichSurface {
    #[default]
    Natural,
    Grassy,
    Concrete,
    ConcreteChannel,
}

impl KirpichSurface {
    fn factor(self) -> f64 {
        match self {
            KirpichSurface::Natural => 1.0,
            KirpichSurface::Grassy => 2.0,
            KirpichSurface::Concrete => 0.4,
            KirpichSurface::ConcreteChannel => 0.2,
        }
    }
}

// Surfaces for shallow concentrated flow, V = k * S^0.5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShallowSurface {
    Paved,
    #[default]
    Unpaved,
    Grassed,
    ShortGrass,
}

impl ShallowSurface {
    // k [m/s]
    fn velocity_coefficient(self) -> f64 {
        match self {
            ShallowSurface::Paved => 6.196,
            ShallowSurface::Unpaved => 4.918,
            ShallowSurface::Grassed => 4.572,
            ShallowSurface::ShortGrass => 2.134,
        }
    }
}

// One reach of the flow path for the segmented velocity method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "regime", rename_all = "snake_case")]
pub enum FlowSegment {
    Sheet {
        length_m: f64,  // [m], at most 100
        roughness: f64, // Manning n for sheet flow
        slope: f64,     // [m/m]
        #[serde(default)]
        p2_mm: Option<f64>,
    },
    Shallow {
        length_m: f64,
        slope: f64,
        #[serde(default)]
        surface: ShallowSurface,
    },
    Channel {
        length_m: f64,
        roughness: f64,
        slope: f64,
        hydraulic_radius_m: f64,
    },
}

impl FlowSegment {
    pub fn length_m(&self) -> f64 {
        match *self {
            FlowSegment::Sheet { length_m, .. }
            | FlowSegment::Shallow { length_m, .. }
            | FlowSegment::Channel { length_m, .. } => length_m,
        }
    }

    /// Travel time through the segment [h].
    pub fn travel_time(&self, default_p2_mm: f64) -> Result<f64> {
        match *self {
            FlowSegment::Sheet {
                length_m,
                roughness,
                slope,
                p2_mm,
            } => sheet_flow(length_m, roughness, slope, p2_mm.unwrap_or(default_p2_mm)),
            FlowSegment::Shallow {
                length_m,
                slope,
                surface,
            } => shallow_flow(length_m, slope, surface),
            FlowSegment::Channel {
                length_m,
                roughness,
                slope,
                hydraulic_radius_m,
            } => channel_flow(length_m, roughness, slope, hydraulic_radius_m),
        }
    }
}

// Time-of-concentration methods. Each reads only the basin fields it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TcMethod {
    Kirpich {
        #[serde(default)]
        surface: KirpichSurface,
    },
    Temez,
    California,
    Faa,
    Desbordes {
        #[serde(default = "default_entry_time")]
        entry_time_min: f64,
    },
    KinematicWave {
        roughness: f64,
        // Without a fixed intensity the method is iterated against the design curve
        #[serde(default)]
        intensity_mm_hr: Option<f64>,
    },
    NrcsVelocity {
        #[serde(default = "default_p2")]
        p2_mm: f64,
    },
}

fn default_entry_time() -> f64 {
    DEFAULT_ENTRY_TIME_MIN
}

fn default_p2() -> f64 {
    DEFAULT_P2_MM
}

impl TcMethod {
    pub fn name(&self) -> &'static str {
        match self {
            TcMethod::Kirpich { .. } => "kirpich",
            TcMethod::Temez => "temez",
            TcMethod::California => "california",
            TcMethod::Faa => "faa",
            TcMethod::Desbordes { .. } => "desbordes",
            TcMethod::KinematicWave { .. } => "kinematic_wave",
            TcMethod::NrcsVelocity { .. } => "nrcs_velocity",
        }
    }

    /**
    Computes the time of concentration for a basin.

    # Arguments
    * `basin` - Basin descriptor; the method checks its own required fields.

    # Returns
    Time of concentration in hours.
    */
    pub fn compute(&self, basin: &BasinDescriptor) -> Result<f64> {
        let method = self.name();
        let tc = match *self {
            TcMethod::Kirpich { surface } => {
                kirpich(basin.require_channel_length(method)?, basin.slope, surface)
            }
            TcMethod::Temez => temez(basin.require_channel_length(method)? / 1000.0, basin.slope),
            TcMethod::California => {
                let drop = basin
                    .elevation_drop_m
                    .ok_or_else(|| HydroError::missing(method, "elevation_drop_m"))?;
                california(basin.require_channel_length(method)? / 1000.0, drop)
            }
            TcMethod::Faa => faa(
                basin.require_channel_length(method)?,
                basin.slope_pct(),
                basin.require_runoff_coefficient(method)?,
            ),
            TcMethod::Desbordes { entry_time_min } => desbordes(
                basin.area_ha,
                basin.slope_pct(),
                basin.require_runoff_coefficient(method)?,
                entry_time_min,
            ),
            TcMethod::KinematicWave {
                roughness,
                intensity_mm_hr,
            } => {
                let intensity =
                    intensity_mm_hr.ok_or_else(|| HydroError::missing(method, "intensity_mm_hr"))?;
                let length_m = basin.require_channel_length(method)?;
                kinematic_wave(length_m, roughness, basin.slope, intensity)
            }
            TcMethod::NrcsVelocity { p2_mm } => velocity_method(&basin.flow_path, p2_mm),
        }?;
        tracing::debug!(method, basin = %basin.name, tc_hr = tc, "time of concentration");
        Ok(tc)
    }

    /// Like [`TcMethod::compute`], except that a kinematic-wave method with
    /// no fixed intensity is solved against `curve` at `return_period_yr`.
    pub fn compute_with_curve(
        &self,
        basin: &BasinDescriptor,
        curve: &IdfCurve,
        return_period_yr: f64,
    ) -> Result<f64> {
        match *self {
            TcMethod::KinematicWave {
                roughness,
                intensity_mm_hr: None,
            } => {
                let length = basin.require_channel_length(self.name())?;
                let tc = kinematic_wave_with_curve(
                    length,
                    roughness,
                    basin.slope,
                    curve,
                    return_period_yr,
                    Some(basin.area_km2()),
                )?;
                tracing::debug!(
                    method = self.name(),
                    basin = %basin.name,
                    tc_hr = tc,
                    "time of concentration"
                );
                Ok(tc)
            }
            _ => self.compute(basin),
        }
    }
}

/// Free-function form of [`TcMethod::compute`].
pub fn compute(method: &TcMethod, basin: &BasinDescriptor) -> Result<f64> {
    method.compute(basin)
}

/// Kirpich (1940): tc = 0.0195 L^0.77 S^-0.385 [min], L in m. Returns hours.
pub fn kirpich(length_m: f64, slope: f64, surface: KirpichSurface) -> Result<f64> {
    require_positive("length_m", length_m)?;
    require_positive("slope", slope)?;
    let tc_min = 0.0195 * length_m.powf(0.77) * slope.powf(-0.385) * surface.factor();
    Ok(tc_min / 60.0)
}

/// Témez: tc = 0.3 (L / S^0.25)^0.76 [h], L in km.
pub fn temez(length_km: f64, slope: f64) -> Result<f64> {
    require_positive("length_km", length_km)?;
    require_positive("slope", slope)?;
    Ok(0.3 * (length_km / slope.powf(0.25)).powf(0.76))
}

/// California Culverts Practice: tc = 60 (11.9 L^3 / H)^0.385 [min], L in
/// miles and H in feet. Returns hours.
pub fn california(length_km: f64, elevation_drop_m: f64) -> Result<f64> {
    require_positive("length_km", length_km)?;
    require_positive("elevation_drop_m", elevation_drop_m)?;
    let length_mi = length_km * MI_PER_KM;
    let drop_ft = elevation_drop_m * FT_PER_M;
    let tc_min = 60.0 * (11.9 * length_mi.powi(3) / drop_ft).powf(0.385);
    Ok(tc_min / 60.0)
}

/// FAA: tc = 1.8 (1.1 - C) L^0.5 / S^0.333 [min], L in ft, S in %.
pub fn faa(length_m: f64, slope_pct: f64, c: f64) -> Result<f64> {
    require_positive("length_m", length_m)?;
    require_positive("slope_pct", slope_pct)?;
    require_coefficient("runoff_coefficient", c)?;
    let tc_min = 1.8 * (1.1 - c) * (length_m * FT_PER_M).sqrt() / slope_pct.powf(0.333);
    Ok(tc_min / 60.0)
}

/// Desbordes urban formula: tc = T0 + 6.625 A^0.3 S^-0.39 C^-0.45 [min],
/// A in ha and S in %.
pub fn desbordes(area_ha: f64, slope_pct: f64, c: f64, entry_time_min: f64) -> Result<f64> {
    require_positive("area_ha", area_ha)?;
    require_positive("slope_pct", slope_pct)?;
    require_coefficient("runoff_coefficient", c)?;
    if !(entry_time_min >= 0.0) {
        return Err(HydroError::domain("entry_time_min", entry_time_min, "must be >= 0"));
    }
    let tc_min =
        entry_time_min + 6.625 * area_ha.powf(0.3) * slope_pct.powf(-0.39) * c.powf(-0.45);
    Ok(tc_min / 60.0)
}

/// Kinematic wave: tc = 6.99 (n L)^0.6 / (i^0.4 S^0.3) [min], i in mm/h.
pub fn kinematic_wave(
    length_m: f64,
    roughness: f64,
    slope: f64,
    intensity_mm_hr: f64,
) -> Result<f64> {
    require_positive("length_m", length_m)?;
    require_positive("roughness", roughness)?;
    require_positive("slope", slope)?;
    require_positive("intensity_mm_hr", intensity_mm_hr)?;
    let tc_min =
        6.99 * (roughness * length_m).powf(0.6) / (intensity_mm_hr.powf(0.4) * slope.powf(0.3));
    Ok(tc_min / 60.0)
}

/// Fixed-point iteration between the kinematic-wave Tc and the design
/// intensity for a storm lasting Tc. Starts from the 1-hour intensity.
pub fn kinematic_wave_with_curve(
    length_m: f64,
    roughness: f64,
    slope: f64,
    curve: &IdfCurve,
    return_period_yr: f64,
    area_km2: Option<f64>,
) -> Result<f64> {
    let mut tc = 1.0;
    for iteration in 0..KINEMATIC_MAX_ITERATIONS {
        let intensity = curve.intensity(return_period_yr, tc, area_km2)?;
        let next = kinematic_wave(length_m, roughness, slope, intensity)?;
        if (next - tc).abs() < KINEMATIC_TOLERANCE_HR {
            tracing::debug!(iteration, tc_hr = next, "kinematic wave converged");
            return Ok(next);
        }
        tc = next;
    }
    Ok(tc)
}

/// TR-55 sheet flow: Tt = 0.007 (n L)^0.8 / (P2^0.5 S^0.4) [h], L in ft
/// and P2 in inches.
pub fn sheet_flow(length_m: f64, roughness: f64, slope: f64, p2_mm: f64) -> Result<f64> {
    require_positive("length_m", length_m)?;
    if length_m > SHEET_FLOW_MAX_LENGTH_M {
        return Err(HydroError::domain(
            "length_m",
            length_m,
            "sheet flow is limited to 100 m",
        ));
    }
    require_positive("roughness", roughness)?;
    require_positive("slope", slope)?;
    require_positive("p2_mm", p2_mm)?;
    let length_ft = length_m * FT_PER_M;
    let p2_in = p2_mm / MM_PER_IN;
    Ok(0.007 * (roughness * length_ft).powf(0.8) / (p2_in.sqrt() * slope.powf(0.4)))
}

pub fn shallow_flow(length_m: f64, slope: f64, surface: ShallowSurface) -> Result<f64> {
    require_positive("length_m", length_m)?;
    require_positive("slope", slope)?;
    let velocity = surface.velocity_coefficient() * slope.sqrt(); // [m/s]
    Ok(length_m / (3600.0 * velocity))
}

// Manning velocity V = R^(2/3) S^(1/2) / n
pub fn channel_flow(
    length_m: f64,
    roughness: f64,
    slope: f64,
    hydraulic_radius_m: f64,
) -> Result<f64> {
    require_positive("length_m", length_m)?;
    require_positive("roughness", roughness)?;
    require_positive("slope", slope)?;
    require_positive("hydraulic_radius_m", hydraulic_radius_m)?;
    let velocity = hydraulic_radius_m.powf(2.0 / 3.0) * slope.sqrt() / roughness;
    Ok(length_m / (3600.0 * velocity))
}

/// Segmented velocity method: the sum of segment travel times [h].
pub fn velocity_method(segments: &[FlowSegment], p2_mm: f64) -> Result<f64> {
    if segments.is_empty() {
        return Err(HydroError::missing("nrcs_velocity", "flow_path"));
    }
    segments
        .iter()
        .try_fold(0.0, |total, segment| Ok(total + segment.travel_time(p2_mm)?))
}
