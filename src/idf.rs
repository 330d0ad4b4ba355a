/*!
Intensity-duration-frequency curve evaluation.

The regional curve scales a base depth (the 3-hour, 10-year depth P3,10)
by a duration factor, a return-period factor and an areal reduction
factor. The generic families (Sherman, Bernard, Koutsoyiannis) take
externally calibrated coefficients with durations in minutes. Every
family answers the same query and reports the same dimensionless factors.
*/
use crate::error::{Advisory, HydroError, Result, require_positive};
use serde::{Deserialize, Serialize};

// Regional curve constants
const SHORT_DURATION_LIMIT_HR: f64 = 3.0;
const SHORT_BRANCH: PowerLaw = PowerLaw {
    a: 0.6208,
    b: 0.0137,
    c: 0.5639,
};
const LONG_BRANCH: PowerLaw = PowerLaw {
    a: 1.0287,
    b: 1.0293,
    c: 0.8083,
};
const CT_SLOPE: f64 = 0.4312;
const CALIBRATION_RETURN_PERIOD: f64 = 10.0;
const BASE_DEPTH_RANGE_MM: (f64, f64) = (50.0, 120.0);

// Areal reduction constants
const ARF_MIN_AREA_KM2: f64 = 1.0;
const ARF_MAX_AREA_KM2: f64 = 300.0;
const ARF_MIN_DURATION_HR: f64 = 0.083; // 5 min

pub const MIN_RETURN_PERIOD: f64 = 2.0;

// Intensity law i(d) = a / (d + b)^c, d in hours, i in mm/h
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerLaw {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl PowerLaw {
    pub fn intensity(&self, duration_hr: f64) -> f64 {
        self.a / (duration_hr + self.b).powf(self.c)
    }

    /// Depth over `duration_hr`; zero for a non-positive duration.
    pub fn depth(&self, duration_hr: f64) -> f64 {
        if duration_hr <= 0.0 {
            return 0.0;
        }
        self.intensity(duration_hr) * duration_hr
    }
}

// One calibrated IDF relationship. Generic families use minutes internally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum IdfCurve {
    Regional {
        base_depth_mm: f64, // P3,10 [mm]
    },
    Sherman {
        k: f64,
        m: f64,
        c: f64, // [min]
        n: f64,
    },
    Bernard {
        a: f64,
        m: f64,
        n: f64,
    },
    Koutsoyiannis {
        mu: f64,
        sigma: f64,
        theta: f64, // [min]
        eta: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdfQueryResult {
    pub intensity_mm_hr: f64,
    pub depth_mm: f64,
    pub duration_hr: f64,
    pub return_period_yr: f64,
    pub duration_factor: f64, // P(d) / P(3 h) at the same return period
    pub return_period_factor: f64, // i(T) / i(10 yr) at the same duration
    pub area_reduction_factor: f64,
    pub advisories: Vec<Advisory>,
}

// Intensities [mm/h] and depths [mm], indexed [return period][duration]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdfTable {
    pub durations_hr: Vec<f64>,
    pub return_periods_yr: Vec<f64>,
    pub intensities_mm_hr: Vec<Vec<f64>>,
    pub depths_mm: Vec<Vec<f64>>,
}

impl IdfCurve {
    pub fn regional(base_depth_mm: f64) -> Result<Self> {
        let curve = IdfCurve::Regional { base_depth_mm };
        curve.validate()?;
        Ok(curve)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            IdfCurve::Regional { base_depth_mm } => {
                require_positive("base_depth_mm", base_depth_mm)?;
            }
            IdfCurve::Sherman { k, m, c, n } => {
                require_positive("k", k)?;
                require_positive("n", n)?;
                require_non_negative("m", m)?;
                require_non_negative("c", c)?;
            }
            IdfCurve::Bernard { a, m, n } => {
                require_positive("a", a)?;
                require_positive("n", n)?;
                require_non_negative("m", m)?;
            }
            IdfCurve::Koutsoyiannis {
                mu,
                sigma,
                theta,
                eta,
            } => {
                require_positive("sigma", sigma)?;
                require_positive("eta", eta)?;
                require_non_negative("theta", theta)?;
                if !mu.is_finite() {
                    return Err(HydroError::domain("mu", mu, "must be finite"));
                }
            }
        }
        Ok(())
    }

    /**
    Evaluates the curve for one return period and duration.

    # Arguments
    * `return_period_yr` - Return period in years, at least 2.
    * `duration_hr` - Storm duration in hours.
    * `area_km2` - Basin area for the areal reduction factor. Only the regional curve applies it.

    # Returns
    Intensity, depth and the correction factors used, with any advisories.
    */
    pub fn evaluate(
        &self,
        return_period_yr: f64,
        duration_hr: f64,
        area_km2: Option<f64>,
    ) -> Result<IdfQueryResult> {
        self.validate()?;
        validate_return_period(return_period_yr)?;
        require_positive("duration_hr", duration_hr)?;
        if let Some(area) = area_km2 {
            require_positive("area_km2", area)?;
        }

        let mut advisories = Vec::new();
        let (intensity, duration_factor, return_period_factor, area_reduction_factor) = match *self
        {
            IdfCurve::Regional { base_depth_mm } => {
                if !(BASE_DEPTH_RANGE_MM.0..=BASE_DEPTH_RANGE_MM.1).contains(&base_depth_mm) {
                    advisories.push(Advisory::new(
                        "idf",
                        format!(
                            "base depth {base_depth_mm} mm is outside the regional range {}-{} mm",
                            BASE_DEPTH_RANGE_MM.0, BASE_DEPTH_RANGE_MM.1
                        ),
                    ));
                }
                let ca = match area_km2 {
                    Some(area) => {
                        if area > ARF_MAX_AREA_KM2 {
                            advisories.push(Advisory::new(
                                "idf",
                                format!(
                                    "area {area} km2 exceeds the {ARF_MAX_AREA_KM2} km2 \
                                     calibration range of the areal reduction factor"
                                ),
                            ));
                        }
                        area_reduction_factor(area, duration_hr)
                    }
                    None => 1.0,
                };
                let ct = return_period_factor(return_period_yr)?;
                let branch = regional_branch(duration_hr);
                let intensity = base_depth_mm * ct * ca * branch.intensity(duration_hr);
                (intensity, duration_factor(duration_hr), ct, ca)
            }
            IdfCurve::Sherman { k, m, c, n } => generic_factors(
                |t| sherman_law(k, m, c, n, t),
                return_period_yr,
                duration_hr,
            ),
            IdfCurve::Bernard { a, m, n } => {
                generic_factors(|t| bernard_law(a, m, n, t), return_period_yr, duration_hr)
            }
            IdfCurve::Koutsoyiannis {
                mu,
                sigma,
                theta,
                eta,
            } => generic_factors(
                |t| koutsoyiannis_law(mu, sigma, theta, eta, t),
                return_period_yr,
                duration_hr,
            ),
        };

        Ok(IdfQueryResult {
            intensity_mm_hr: intensity,
            depth_mm: intensity * duration_hr,
            duration_hr,
            return_period_yr,
            duration_factor,
            return_period_factor,
            area_reduction_factor,
            advisories,
        })
    }

    pub fn intensity(
        &self,
        return_period_yr: f64,
        duration_hr: f64,
        area_km2: Option<f64>,
    ) -> Result<f64> {
        Ok(self
            .evaluate(return_period_yr, duration_hr, area_km2)?
            .intensity_mm_hr)
    }

    pub fn depth(
        &self,
        return_period_yr: f64,
        duration_hr: f64,
        area_km2: Option<f64>,
    ) -> Result<f64> {
        Ok(self.evaluate(return_period_yr, duration_hr, area_km2)?.depth_mm)
    }

    /// Expresses the curve at one return period as `a / (d + b)^c` with d
    /// in hours. The regional curve returns the branch that contains
    /// `duration_hr`, with the areal reduction evaluated at that duration.
    pub fn power_law(
        &self,
        return_period_yr: f64,
        duration_hr: f64,
        area_km2: Option<f64>,
    ) -> Result<PowerLaw> {
        self.validate()?;
        validate_return_period(return_period_yr)?;
        require_positive("duration_hr", duration_hr)?;
        let law = match *self {
            IdfCurve::Regional { base_depth_mm } => {
                let ct = return_period_factor(return_period_yr)?;
                let ca = area_km2.map_or(1.0, |area| area_reduction_factor(area, duration_hr));
                let branch = regional_branch(duration_hr);
                PowerLaw {
                    a: base_depth_mm * ct * ca * branch.a,
                    ..branch
                }
            }
            IdfCurve::Sherman { k, m, c, n } => sherman_law(k, m, c, n, return_period_yr),
            IdfCurve::Bernard { a, m, n } => bernard_law(a, m, n, return_period_yr),
            IdfCurve::Koutsoyiannis {
                mu,
                sigma,
                theta,
                eta,
            } => koutsoyiannis_law(mu, sigma, theta, eta, return_period_yr),
        };
        Ok(law)
    }
}

// Generic families as a / (d + b)^c with d in hours. The published forms
// take t = 60 d in minutes.
fn sherman_law(k: f64, m: f64, c: f64, n: f64, return_period_yr: f64) -> PowerLaw {
    PowerLaw {
        a: k * return_period_yr.powf(m) / 60f64.powf(n),
        b: c / 60.0,
        c: n,
    }
}

fn bernard_law(a: f64, m: f64, n: f64, return_period_yr: f64) -> PowerLaw {
    PowerLaw {
        a: a * return_period_yr.powf(m) / 60f64.powf(n),
        b: 0.0,
        c: n,
    }
}

fn koutsoyiannis_law(mu: f64, sigma: f64, theta: f64, eta: f64, return_period_yr: f64) -> PowerLaw {
    PowerLaw {
        a: (mu + sigma * gumbel_reduced_variate(return_period_yr)) / 60f64.powf(eta),
        b: theta / 60.0,
        c: eta,
    }
}

// Intensity plus duration, return-period and area factors of a generic law
fn generic_factors(
    law_at: impl Fn(f64) -> PowerLaw,
    return_period_yr: f64,
    duration_hr: f64,
) -> (f64, f64, f64, f64) {
    let law = law_at(return_period_yr);
    let intensity = law.intensity(duration_hr);
    let at_3h = law.intensity(SHORT_DURATION_LIMIT_HR);
    let at_10yr = law_at(CALIBRATION_RETURN_PERIOD).intensity(duration_hr);
    (
        intensity,
        intensity * duration_hr / (at_3h * SHORT_DURATION_LIMIT_HR),
        intensity / at_10yr,
        1.0,
    )
}

fn regional_branch(duration_hr: f64) -> PowerLaw {
    if duration_hr < SHORT_DURATION_LIMIT_HR {
        SHORT_BRANCH
    } else {
        LONG_BRANCH
    }
}

fn require_non_negative(parameter: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(HydroError::domain(parameter, value, "must be >= 0"))
    }
}

pub fn validate_return_period(return_period_yr: f64) -> Result<f64> {
    if return_period_yr.is_finite() && return_period_yr >= MIN_RETURN_PERIOD {
        Ok(return_period_yr)
    } else {
        Err(HydroError::domain(
            "return_period_yr",
            return_period_yr,
            "must be >= 2 years",
        ))
    }
}

// Gumbel reduced variate y_T = -ln(-ln(1 - 1/T))
fn gumbel_reduced_variate(return_period_yr: f64) -> f64 {
    -(-(1.0 - 1.0 / return_period_yr).ln()).ln()
}

/// Regional duration factor: depth at `duration_hr` relative to the
/// 3-hour depth of the same return period. The two branches meet at 3 h
/// only approximately.
pub fn duration_factor(duration_hr: f64) -> f64 {
    regional_branch(duration_hr).depth(duration_hr) / SHORT_DURATION_LIMIT_HR
}

/// Regional return-period factor, exactly 1 at the 10-year calibration
/// return period and strictly increasing in T.
pub fn return_period_factor(return_period_yr: f64) -> Result<f64> {
    let t = validate_return_period(return_period_yr)?;
    let gumbel = |t: f64| (t / (t - 1.0)).ln().log10();
    Ok(1.0 - CT_SLOPE * (gumbel(t) - gumbel(CALIBRATION_RETURN_PERIOD)))
}

/// Areal reduction factor, 1 for basins up to 1 km2 and never above 1.
pub fn area_reduction_factor(area_km2: f64, duration_hr: f64) -> f64 {
    if area_km2 <= ARF_MIN_AREA_KM2 {
        return 1.0;
    }
    let d = duration_hr.max(ARF_MIN_DURATION_HR);
    let ca = 1.0 - 0.3549 * d.powf(-0.4272) * (1.0 - (-0.005792 * area_km2).exp());
    ca.min(1.0)
}

/// Regional intensity [mm/h] shorthand.
pub fn regional_intensity(
    base_depth_mm: f64,
    return_period_yr: f64,
    duration_hr: f64,
    area_km2: Option<f64>,
) -> Result<f64> {
    IdfCurve::regional(base_depth_mm)?.intensity(return_period_yr, duration_hr, area_km2)
}

pub fn idf_table(
    curve: &IdfCurve,
    durations_hr: &[f64],
    return_periods_yr: &[f64],
    area_km2: Option<f64>,
) -> Result<IdfTable> {
    let mut intensities = Vec::with_capacity(return_periods_yr.len());
    let mut depths = Vec::with_capacity(return_periods_yr.len());
    for &rp in return_periods_yr {
        let row = durations_hr
            .iter()
            .map(|&d| curve.evaluate(rp, d, area_km2))
            .collect::<Result<Vec<_>>>()?;
        intensities.push(row.iter().map(|q| q.intensity_mm_hr).collect());
        depths.push(row.iter().map(|q| q.depth_mm).collect());
    }
    Ok(IdfTable {
        durations_hr: durations_hr.to_vec(),
        return_periods_yr: return_periods_yr.to_vec(),
        intensities_mm_hr: intensities,
        depths_mm: depths,
    })
}
