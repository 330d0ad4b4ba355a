/*!
Design storm synthesis.

A storm is a uniform-step series of rainfall increments whose sum is the
design depth for the storm duration. The depth comes either from an IDF
curve or from a fixed total, and one of several strategies decides how it
is spread in time.
*/
use crate::error::{HydroError, Result, require_positive};
use crate::idf::{IdfCurve, PowerLaw};
use crate::reference::ReferenceData;
use crate::table::CurveTable;
use serde::{Deserialize, Serialize};

pub const CENTERED_PEAK: f64 = 0.5;
pub const GZ_PEAK_POSITION: f64 = 1.0 / 6.0;
pub const DEFAULT_ADVANCEMENT: f64 = 0.375;
pub const DEFAULT_PEAK_HALF_WIDTH: f64 = 0.15;

// Synthetic depth-duration relation P(d) = P (d / D)^0.6 for a fixed total
const SYNTHETIC_DEPTH_EXPONENT: f64 = 0.6;

// Time step guidance [min]
const DT_TC_RATIO: f64 = 0.133;
pub const MIN_DT_MIN: f64 = 5.0;
pub const MIN_DT_24H_TABLE_MIN: f64 = 15.0;
const PRACTICAL_DT_MIN: [f64; 4] = [5.0, 10.0, 15.0, 30.0];

const MASS_TOLERANCE: f64 = 1e-6;

// Where the storm depth comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum RainfallSource {
    Curve {
        curve: IdfCurve,
        return_period_yr: f64,
        #[serde(default)]
        area_km2: Option<f64>,
    },
    Depth {
        total_depth_mm: f64,
    },
}

impl RainfallSource {
    /// Cumulative depth [mm] over the first `duration_hr` of a storm
    /// lasting `storm_duration_hr`.
    pub fn depth_at(&self, duration_hr: f64, storm_duration_hr: f64) -> Result<f64> {
        if duration_hr <= 0.0 {
            return Ok(0.0);
        }
        match self {
            RainfallSource::Curve {
                curve,
                return_period_yr,
                area_km2,
            } => curve.depth(*return_period_yr, duration_hr, *area_km2),
            RainfallSource::Depth { total_depth_mm } => Ok(total_depth_mm
                * (duration_hr / storm_duration_hr).powf(SYNTHETIC_DEPTH_EXPONENT)),
        }
    }

    pub fn total_depth(&self, storm_duration_hr: f64) -> Result<f64> {
        self.depth_at(storm_duration_hr, storm_duration_hr)
    }

    /// Equivalent `a / (d + b)^c` intensity law around the storm duration.
    pub fn power_law(&self, storm_duration_hr: f64) -> Result<PowerLaw> {
        match self {
            RainfallSource::Curve {
                curve,
                return_period_yr,
                area_km2,
            } => curve.power_law(*return_period_yr, storm_duration_hr, *area_km2),
            RainfallSource::Depth { total_depth_mm } => Ok(PowerLaw {
                a: total_depth_mm * storm_duration_hr.powf(-SYNTHETIC_DEPTH_EXPONENT),
                b: 0.0,
                c: 1.0 - SYNTHETIC_DEPTH_EXPONENT,
            }),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            RainfallSource::Curve { curve, .. } => curve.validate(),
            RainfallSource::Depth { total_depth_mm } => {
                require_positive("total_depth_mm", *total_depth_mm).map(|_| ())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ComponentShape {
    Triangular { half_width: f64 }, // fraction of the duration
    Chicago,
}

impl Default for ComponentShape {
    fn default() -> Self {
        ComponentShape::Triangular {
            half_width: DEFAULT_PEAK_HALF_WIDTH,
        }
    }
}

// One peak of a multi-modal storm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StormComponent {
    pub position: f64, // peak time as a fraction of the duration
    pub fraction: f64, // share of the total depth
    #[serde(default)]
    pub shape: ComponentShape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StormStrategy {
    AlternatingBlocks {
        #[serde(default = "centered_peak")]
        peak_position: f64,
    },
    Chicago {
        #[serde(default = "default_advancement")]
        advancement: f64,
    },
    // Named table from the reference data
    Table {
        name: String,
    },
    CustomTable {
        table: CurveTable,
    },
    MultiModal {
        components: Vec<StormComponent>,
    },
}

fn centered_peak() -> f64 {
    CENTERED_PEAK
}

fn default_advancement() -> f64 {
    DEFAULT_ADVANCEMENT
}

impl StormStrategy {
    /// Alternating blocks with the peak at one sixth of the duration.
    pub fn gz() -> Self {
        StormStrategy::AlternatingBlocks {
            peak_position: GZ_PEAK_POSITION,
        }
    }

    /// Two triangular peaks at 1/4 and 3/4 of the duration, half the depth each.
    pub fn bimodal() -> Self {
        StormStrategy::MultiModal {
            components: vec![
                StormComponent {
                    position: 0.25,
                    fraction: 0.5,
                    shape: ComponentShape::default(),
                },
                StormComponent {
                    position: 0.75,
                    fraction: 0.5,
                    shape: ComponentShape::default(),
                },
            ],
        }
    }

    pub fn table(name: &str) -> Self {
        StormStrategy::Table {
            name: name.to_string(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            StormStrategy::AlternatingBlocks { peak_position } => {
                if approx::abs_diff_eq!(*peak_position, GZ_PEAK_POSITION, epsilon = 1e-9) {
                    "gz".to_string()
                } else {
                    "alternating_blocks".to_string()
                }
            }
            StormStrategy::Chicago { .. } => "chicago".to_string(),
            StormStrategy::Table { name } => name.clone(),
            StormStrategy::CustomTable { .. } => "custom_table".to_string(),
            StormStrategy::MultiModal { components } => {
                let triangular = components
                    .iter()
                    .all(|c| matches!(c.shape, ComponentShape::Triangular { .. }));
                if components.len() == 2 && triangular {
                    "bimodal".to_string()
                } else {
                    "multimodal".to_string()
                }
            }
        }
    }

    /// Smallest sensible time step [min]: 24-hour tables are published
    /// at a coarser resolution than the other storms.
    pub fn min_dt_min(&self, reference: &ReferenceData) -> f64 {
        match self {
            StormStrategy::Table { name } => match reference.storm_table(name) {
                Ok(table) if table.native_duration_hr.is_some() => MIN_DT_24H_TABLE_MIN,
                _ => MIN_DT_MIN,
            },
            _ => MIN_DT_MIN,
        }
    }
}

// Discretized design storm. `time_hr` marks the end of each interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hyetograph {
    pub method: String,
    pub dt_hr: f64,
    pub time_hr: Vec<f64>,
    pub depth_mm: Vec<f64>,
    pub intensity_mm_hr: Vec<f64>,
    pub cumulative_mm: Vec<f64>,
    pub total_depth_mm: f64,
}

impl Hyetograph {
    pub fn from_increments(method: &str, dt_hr: f64, depth_mm: Vec<f64>) -> Result<Self> {
        require_positive("dt_hr", dt_hr)?;
        if depth_mm.is_empty() {
            return Err(HydroError::domain("intervals", 0.0, "storm needs at least one interval"));
        }
        if let Some(&bad) = depth_mm.iter().find(|d| !(**d >= 0.0) || !d.is_finite()) {
            return Err(HydroError::domain("depth_mm", bad, "increments must be finite and >= 0"));
        }
        let time_hr = (1..=depth_mm.len()).map(|k| k as f64 * dt_hr).collect();
        let intensity_mm_hr = depth_mm.iter().map(|d| d / dt_hr).collect();
        let cumulative_mm: Vec<f64> = depth_mm
            .iter()
            .scan(0.0, |acc, d| {
                *acc += d;
                Some(*acc)
            })
            .collect();
        let total_depth_mm = cumulative_mm.last().copied().unwrap_or(0.0);
        Ok(Hyetograph {
            method: method.to_string(),
            dt_hr,
            time_hr,
            depth_mm,
            intensity_mm_hr,
            cumulative_mm,
            total_depth_mm,
        })
    }

    /// Storm from observed `(time [min], depth [mm])` pairs on a uniform step.
    /// The step is taken from the first two times.
    pub fn from_measured(pairs: &[(f64, f64)]) -> Result<Self> {
        if pairs.len() < 2 {
            return Err(HydroError::domain(
                "intervals",
                pairs.len() as f64,
                "measured storm needs at least two intervals",
            ));
        }
        let step_min = pairs[1].0 - pairs[0].0;
        require_positive("dt_min", step_min)?;
        let uniform = pairs
            .windows(2)
            .all(|w| ((w[1].0 - w[0].0) - step_min).abs() <= MASS_TOLERANCE * step_min.max(1.0));
        if !uniform {
            return Err(HydroError::domain(
                "dt_min",
                step_min,
                "measured times must be evenly spaced",
            ));
        }
        Self::from_increments("measured", step_min / 60.0, pairs.iter().map(|&(_, d)| d).collect())
    }

    pub fn len(&self) -> usize {
        self.depth_mm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth_mm.is_empty()
    }

    pub fn duration_hr(&self) -> f64 {
        self.len() as f64 * self.dt_hr
    }

    pub fn peak_intensity_mm_hr(&self) -> f64 {
        self.intensity_mm_hr.iter().copied().fold(0.0, f64::max)
    }

    // End time of the most intense interval (first one on ties)
    pub fn peak_time_hr(&self) -> f64 {
        let peak = self.peak_intensity_mm_hr();
        self.intensity_mm_hr
            .iter()
            .position(|&i| i == peak)
            .map_or(0.0, |k| self.time_hr[k])
    }
}

/**
Builds a design storm.

# Arguments
* `source` - IDF curve or fixed total depth.
* `duration_hr` - Storm duration; it is truncated to a whole number of steps.
* `dt_min` - Time step in minutes.
* `strategy` - How the depth is spread over the duration.
* `reference` - Reference tables for named table storms.

# Returns
The hyetograph, whose increments sum to the design depth.
*/
pub fn synthesize(
    source: &RainfallSource,
    duration_hr: f64,
    dt_min: f64,
    strategy: &StormStrategy,
    reference: &ReferenceData,
) -> Result<Hyetograph> {
    source.validate()?;
    require_positive("duration_hr", duration_hr)?;
    require_positive("dt_min", dt_min)?;
    let dt_hr = dt_min / 60.0;
    let n = (duration_hr / dt_hr + 1e-9).floor() as usize;
    if n == 0 {
        return Err(HydroError::domain("dt_min", dt_min, "time step exceeds the storm duration"));
    }
    let storm_hr = n as f64 * dt_hr;
    let total = source.total_depth(storm_hr)?;

    let increments = match strategy {
        StormStrategy::AlternatingBlocks { peak_position } => {
            require_fraction("peak_position", *peak_position, true)?;
            alternating_blocks(source, n, dt_hr, *peak_position)?
        }
        StormStrategy::Chicago { advancement } => {
            require_fraction("advancement", *advancement, false)?;
            chicago(source, n, dt_hr, *advancement)?
        }
        StormStrategy::Table { name } => table_increments(&reference.storm_table(name)?.table, n),
        StormStrategy::CustomTable { table } => {
            table_increments(&CurveTable::cumulative(table.points().to_vec())?, n)
        }
        StormStrategy::MultiModal { components } => multimodal(source, n, dt_hr, components)?,
    };

    let increments = scale_to(increments, total);
    let hyetograph = Hyetograph::from_increments(&strategy.label(), dt_hr, increments)?;
    tracing::debug!(
        storm = %hyetograph.method,
        intervals = n,
        total_depth_mm = hyetograph.total_depth_mm,
        peak_mm_hr = hyetograph.peak_intensity_mm_hr(),
        "storm synthesized"
    );
    Ok(hyetograph)
}

/// Time step suggestion from the time of concentration: 0.133 Tc, not
/// below `min_dt_min` [min].
pub fn recommended_dt_min(tc_hr: f64, min_dt_min: f64) -> Result<f64> {
    require_positive("tc_hr", tc_hr)?;
    Ok((DT_TC_RATIO * tc_hr * 60.0).max(min_dt_min))
}

/// Rounds a step to the nearest of 5, 10, 15 or 30 minutes.
pub fn practical_dt_min(dt_min: f64) -> f64 {
    PRACTICAL_DT_MIN
        .iter()
        .copied()
        .min_by(|a, b| (a - dt_min).abs().total_cmp(&(b - dt_min).abs()))
        .unwrap_or(MIN_DT_MIN)
}

fn require_fraction(parameter: &'static str, value: f64, closed: bool) -> Result<f64> {
    let ok = if closed {
        (0.0..=1.0).contains(&value)
    } else {
        value > 0.0 && value < 1.0
    };
    if ok {
        Ok(value)
    } else {
        Err(HydroError::domain(parameter, value, "must be a fraction of the duration"))
    }
}

// Rescale so the increments sum to `total`, absorbing rounding
fn scale_to(mut increments: Vec<f64>, total: f64) -> Vec<f64> {
    let sum: f64 = increments.iter().sum();
    if sum > 0.0 {
        let factor = total / sum;
        increments.iter_mut().for_each(|d| *d *= factor);
    }
    increments
}

fn alternating_blocks(
    source: &RainfallSource,
    n: usize,
    dt_hr: f64,
    peak_position: f64,
) -> Result<Vec<f64>> {
    let storm_hr = n as f64 * dt_hr;
    let mut previous = 0.0;
    let mut sorted = Vec::with_capacity(n);
    for k in 1..=n {
        let cumulative = source.depth_at(k as f64 * dt_hr, storm_hr)?;
        sorted.push((cumulative - previous).max(0.0));
        previous = cumulative;
    }
    sorted.sort_by(|a, b| b.total_cmp(a));
    Ok(place_alternating(&sorted, peak_position))
}

// Largest block at the peak index, then alternately left and right.
// When one side runs out the rest continue on the other side.
fn place_alternating(sorted: &[f64], peak_position: f64) -> Vec<f64> {
    let n = sorted.len();
    let peak = ((peak_position * n as f64 + 1e-9) as usize).min(n - 1);
    let mut placed = vec![0.0; n];
    let mut left = peak as isize;
    let mut right = peak + 1;
    let mut go_left = true;
    for &block in sorted {
        if (go_left || right >= n) && left >= 0 {
            placed[left as usize] = block;
            left -= 1;
        } else if right < n {
            placed[right] = block;
            right += 1;
        }
        go_left = !go_left;
    }
    placed
}

// Interval depths from the Chicago mass curve of the intensity law
// a / (t + b)^c fitted at the storm duration. Before the peak the depth
// within t_b of it is r P(t_b / r); after it, (1 - r) P(t_a / (1 - r)).
// Both sides tend to a / b^c at the peak. Integrating the mass curve keeps
// the b = 0 peak finite.
fn chicago(source: &RainfallSource, n: usize, dt_hr: f64, r: f64) -> Result<Vec<f64>> {
    let storm_hr = n as f64 * dt_hr;
    let law = source.power_law(storm_hr)?;
    let peak = r * storm_hr;
    let mass = |t: f64| {
        if t <= peak {
            -r * law.depth((peak - t) / r)
        } else {
            (1.0 - r) * law.depth((t - peak) / (1.0 - r))
        }
    };
    let mut previous = mass(0.0);
    Ok((1..=n)
        .map(|k| {
            let current = mass(k as f64 * dt_hr);
            let increment = (current - previous).max(0.0);
            previous = current;
            increment
        })
        .collect())
}

fn table_increments(table: &CurveTable, n: usize) -> Vec<f64> {
    let mut previous = table.interpolate(0.0);
    (1..=n)
        .map(|k| {
            let current = table.interpolate(k as f64 / n as f64);
            let increment = (current - previous).max(0.0);
            previous = current;
            increment
        })
        .collect()
}

// CDF of a unit triangle centred at `c` with half-width `w`
fn triangle_cdf(u: f64, c: f64, w: f64) -> f64 {
    if u <= c - w {
        0.0
    } else if u <= c {
        (u - c + w).powi(2) / (2.0 * w * w)
    } else if u < c + w {
        1.0 - (c + w - u).powi(2) / (2.0 * w * w)
    } else {
        1.0
    }
}

fn multimodal(
    source: &RainfallSource,
    n: usize,
    dt_hr: f64,
    components: &[StormComponent],
) -> Result<Vec<f64>> {
    if components.is_empty() {
        return Err(HydroError::domain("components", 0.0, "multi-modal storm needs a component"));
    }
    let fraction_sum: f64 = components.iter().map(|c| c.fraction).sum();
    if !approx::abs_diff_eq!(fraction_sum, 1.0, epsilon = 1e-9) {
        return Err(HydroError::domain(
            "fraction",
            fraction_sum,
            "component fractions must sum to 1",
        ));
    }

    let mut combined = vec![0.0; n];
    for component in components {
        require_fraction("position", component.position, false)?;
        require_fraction("fraction", component.fraction, true)?;
        let shape = match component.shape {
            ComponentShape::Triangular { half_width } => {
                require_positive("half_width", half_width)?;
                (1..=n)
                    .map(|k| {
                        let u1 = k as f64 / n as f64;
                        let u0 = (k - 1) as f64 / n as f64;
                        triangle_cdf(u1, component.position, half_width)
                            - triangle_cdf(u0, component.position, half_width)
                    })
                    .collect()
            }
            ComponentShape::Chicago => chicago(source, n, dt_hr, component.position)?,
        };
        // each component carries exactly its share before superposition
        for (slot, depth) in combined.iter_mut().zip(scale_to(shape, component.fraction)) {
            *slot += depth;
        }
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn reference() -> ReferenceData {
        ReferenceData::builtin().unwrap()
    }

    fn regional() -> RainfallSource {
        RainfallSource::Curve {
            curve: IdfCurve::regional(78.0).unwrap(),
            return_period_yr: 10.0,
            area_km2: None,
        }
    }

    fn max_window_sum(depths: &[f64], k: usize) -> f64 {
        depths
            .windows(k)
            .map(|w| w.iter().sum::<f64>())
            .fold(0.0, f64::max)
    }

    #[test]
    fn every_strategy_conserves_mass() {
        let reference = reference();
        let strategies = [
            StormStrategy::AlternatingBlocks { peak_position: 0.5 },
            StormStrategy::gz(),
            StormStrategy::Chicago { advancement: 0.375 },
            StormStrategy::table("scs_type_ii"),
            StormStrategy::table("huff_q1"),
            StormStrategy::bimodal(),
        ];
        for source in [regional(), RainfallSource::Depth { total_depth_mm: 63.0 }] {
            for strategy in &strategies {
                for (duration, dt) in [(2.0, 5.0), (6.0, 10.0), (3.0, 7.0)] {
                    let h = synthesize(&source, duration, dt, strategy, &reference).unwrap();
                    let expected = source.total_depth(h.duration_hr()).unwrap();
                    let sum: f64 = h.depth_mm.iter().sum();
                    assert_relative_eq!(sum, expected, max_relative = 1e-9);
                    assert_relative_eq!(h.total_depth_mm, expected, max_relative = 1e-9);
                }
            }
        }
    }

    #[test]
    fn uniform_step_and_interval_count() {
        let h = synthesize(&regional(), 6.0, 10.0, &StormStrategy::gz(), &reference()).unwrap();
        assert_eq!(h.len(), 36);
        assert!(h.time_hr.windows(2).all(|w| (w[1] - w[0] - h.dt_hr).abs() < 1e-12));
        assert_eq!(h.method, "gz");
    }

    #[test]
    fn alternating_blocks_reproduce_idf_depths() {
        let source = regional();
        let h = synthesize(
            &source,
            2.0,
            10.0,
            &StormStrategy::AlternatingBlocks { peak_position: 0.5 },
            &reference(),
        )
        .unwrap();
        for k in 1..=h.len() {
            let idf = source.depth_at(k as f64 * h.dt_hr, 2.0).unwrap();
            assert_relative_eq!(max_window_sum(&h.depth_mm, k), idf, max_relative = 1e-9);
        }
    }

    #[test]
    fn peak_position_moves_the_peak() {
        let reference = reference();
        let centred = synthesize(
            &regional(),
            6.0,
            10.0,
            &StormStrategy::AlternatingBlocks { peak_position: 0.5 },
            &reference,
        )
        .unwrap();
        let gz = synthesize(&regional(), 6.0, 10.0, &StormStrategy::gz(), &reference).unwrap();
        // 36 intervals: peak index 18 vs 6
        assert_abs_diff_eq!(centred.peak_time_hr(), 19.0 / 6.0, epsilon = 1e-9);
        assert_abs_diff_eq!(gz.peak_time_hr(), 7.0 / 6.0, epsilon = 1e-9);
    }

    #[test]
    fn placement_falls_back_at_the_wall() {
        let placed = place_alternating(&[5.0, 4.0, 3.0, 2.0, 1.0], 0.0);
        assert_eq!(placed, vec![5.0, 4.0, 3.0, 2.0, 1.0]);
        let placed = place_alternating(&[5.0, 4.0, 3.0, 2.0, 1.0], 1.0);
        assert_eq!(placed, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let placed = place_alternating(&[5.0, 4.0, 3.0, 2.0, 1.0], 0.5);
        assert_eq!(placed, vec![1.0, 3.0, 5.0, 4.0, 2.0]);
    }

    #[test]
    fn chicago_branches_meet_at_peak() {
        let source = RainfallSource::Curve {
            curve: IdfCurve::Sherman {
                k: 2150.0,
                m: 0.22,
                c: 15.0,
                n: 0.75,
            },
            return_period_yr: 10.0,
            area_km2: None,
        };
        let r = 0.375;
        let strategy = StormStrategy::Chicago { advancement: r };
        let mut gaps = Vec::new();
        for dt_min in [1.0, 0.25] {
            let h = synthesize(&source, 2.0, dt_min, &strategy, &reference()).unwrap();
            let law = source.power_law(h.duration_hr()).unwrap();
            let dt = h.dt_hr;
            // r D = 45 min is an interval boundary for both steps
            let k = (r * h.duration_hr() / dt).round() as usize;
            let before = h.depth_mm[k - 1] / dt;
            let after = h.depth_mm[k] / dt;
            assert_relative_eq!(
                before,
                law.a / (dt / r + law.b).powf(law.c),
                max_relative = 1e-9
            );
            assert_relative_eq!(
                after,
                law.a / (dt / (1.0 - r) + law.b).powf(law.c),
                max_relative = 1e-9
            );
            let peak = law.a / law.b.powf(law.c);
            assert!(before < after && after < peak);
            assert_eq!(h.peak_time_hr(), h.time_hr[k]);
            gaps.push((peak - before) / peak);
        }
        assert!(gaps[1] < gaps[0] / 3.0);
    }

    #[test]
    fn mixed_two_peak_storm_is_not_labelled_bimodal() {
        assert_eq!(StormStrategy::bimodal().label(), "bimodal");
        let mixed = StormStrategy::MultiModal {
            components: vec![
                StormComponent {
                    position: 0.3,
                    fraction: 0.6,
                    shape: ComponentShape::default(),
                },
                StormComponent {
                    position: 0.7,
                    fraction: 0.4,
                    shape: ComponentShape::Chicago,
                },
            ],
        };
        assert_eq!(mixed.label(), "multimodal");
    }

    #[test]
    fn chicago_peak_near_advancement() {
        let h = synthesize(
            &regional(),
            2.0,
            5.0,
            &StormStrategy::Chicago { advancement: 0.375 },
            &reference(),
        )
        .unwrap();
        // peak interval contains t = 0.75 h
        assert_abs_diff_eq!(h.peak_time_hr(), 0.75 + 5.0 / 60.0, epsilon = 5.0 / 60.0 + 1e-9);
        assert!(h.depth_mm.iter().all(|d| *d >= 0.0));
    }

    #[test]
    fn table_storm_follows_distribution() {
        let reference = reference();
        let source = RainfallSource::Depth { total_depth_mm: 100.0 };
        let scs = StormStrategy::table("scs_type_ii");
        let h = synthesize(&source, 24.0, 15.0, &scs, &reference).unwrap();
        // half way through the day the Type II mass curve is at 66.3 %
        assert_abs_diff_eq!(h.cumulative_mm[47], 66.3, epsilon = 1e-9);
        let unknown = StormStrategy::table("nope");
        assert!(synthesize(&source, 24.0, 15.0, &unknown, &reference).is_err());
    }

    #[test]
    fn custom_table_must_be_cumulative() {
        let reference = reference();
        let source = RainfallSource::Depth { total_depth_mm: 40.0 };
        let good = StormStrategy::CustomTable {
            table: CurveTable::new(vec![(0.0, 0.0), (0.3, 0.7), (1.0, 1.0)]).unwrap(),
        };
        let h = synthesize(&source, 1.0, 5.0, &good, &reference).unwrap();
        assert_relative_eq!(h.total_depth_mm, 40.0, max_relative = 1e-12);
        let bad = StormStrategy::CustomTable {
            table: CurveTable::new(vec![(0.0, 0.0), (1.0, 0.8)]).unwrap(),
        };
        assert!(synthesize(&source, 1.0, 5.0, &bad, &reference).is_err());
    }

    #[test]
    fn bimodal_has_two_peaks_and_split_volume() {
        let source = RainfallSource::Depth { total_depth_mm: 80.0 };
        let h = synthesize(&source, 6.0, 5.0, &StormStrategy::bimodal(), &reference()).unwrap();
        let half = h.len() / 2;
        let first: f64 = h.depth_mm[..half].iter().sum();
        let second: f64 = h.depth_mm[half..].iter().sum();
        assert_abs_diff_eq!(first, 40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(second, 40.0, epsilon = 1e-9);
        // the middle is dry
        assert_eq!(h.depth_mm[half], 0.0);
    }

    #[test]
    fn uneven_components_keep_their_shares() {
        let strategy = StormStrategy::MultiModal {
            components: vec![
                StormComponent {
                    position: 0.2,
                    fraction: 0.7,
                    shape: ComponentShape::Triangular { half_width: 0.1 },
                },
                StormComponent {
                    position: 0.7,
                    fraction: 0.3,
                    shape: ComponentShape::Chicago,
                },
            ],
        };
        let source = RainfallSource::Depth { total_depth_mm: 50.0 };
        let h = synthesize(&source, 5.0, 10.0, &strategy, &reference()).unwrap();
        assert_relative_eq!(h.total_depth_mm, 50.0, max_relative = 1e-12);
        assert_eq!(h.method, "bimodal");

        let bad = StormStrategy::MultiModal {
            components: vec![StormComponent {
                position: 0.5,
                fraction: 0.8,
                shape: ComponentShape::default(),
            }],
        };
        assert!(synthesize(&source, 5.0, 10.0, &bad, &reference()).is_err());
    }

    #[test]
    fn rejects_bad_steps_and_positions() {
        let reference = reference();
        let source = regional();
        assert!(synthesize(&source, 1.0, 90.0, &StormStrategy::gz(), &reference).is_err());
        assert!(synthesize(&source, 0.0, 5.0, &StormStrategy::gz(), &reference).is_err());
        let bad_peak = StormStrategy::AlternatingBlocks { peak_position: 1.5 };
        assert!(synthesize(&source, 1.0, 5.0, &bad_peak, &reference).is_err());
        let bad_r = StormStrategy::Chicago { advancement: 1.0 };
        assert!(synthesize(&source, 1.0, 5.0, &bad_r, &reference).is_err());
    }

    #[test]
    fn measured_storm() {
        let h = Hyetograph::from_measured(&[(5.0, 1.0), (10.0, 4.0), (15.0, 2.5)]).unwrap();
        assert_relative_eq!(h.dt_hr, 5.0 / 60.0);
        assert_relative_eq!(h.total_depth_mm, 7.5);
        assert_relative_eq!(h.peak_intensity_mm_hr(), 48.0);
        assert!(Hyetograph::from_measured(&[(5.0, 1.0), (10.0, 4.0), (20.0, 2.5)]).is_err());
        assert!(Hyetograph::from_measured(&[(5.0, 1.0), (10.0, -4.0)]).is_err());
    }

    #[test]
    fn time_step_guidance() {
        assert_eq!(recommended_dt_min(0.5, MIN_DT_MIN).unwrap(), MIN_DT_MIN);
        assert_relative_eq!(recommended_dt_min(2.0, MIN_DT_MIN).unwrap(), 15.96, epsilon = 1e-9);
        assert_eq!(practical_dt_min(15.96), 15.0);
        assert_eq!(practical_dt_min(24.0), 30.0);
        let reference = reference();
        assert_eq!(
            StormStrategy::table("scs_type_ii").min_dt_min(&reference),
            MIN_DT_24H_TABLE_MIN
        );
        assert_eq!(StormStrategy::table("huff_q3").min_dt_min(&reference), MIN_DT_MIN);
    }
}
