/*!
End-to-end design-flood run: time of concentration, design storm,
effective rainfall, unit hydrograph and convolution, in that order.

A run fails on the first component error. Advisories gathered along the
way are logged once and returned with the result.
*/
use crate::basin::BasinDescriptor;
use crate::convolution::{DischargeSeries, convolve};
use crate::error::{Advisory, HydroError, Result};
use crate::idf::{IdfCurve, validate_return_period};
use crate::reference::ReferenceData;
use crate::runoff::{
    C_BASE_RETURN_PERIOD, EffectiveRainfallSeries, RunoffModel, RunoffSummary,
    adjust_c_for_return_period, rational_peak_flow,
};
use crate::storm::{
    Hyetograph, RainfallSource, StormStrategy, practical_dt_min, recommended_dt_min, synthesize,
};
use crate::travel_time::TcMethod;
use crate::unit_hydrograph::{UnitHydrographShape, UnitResponse, max_dt_hr};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_STORM_DURATION_HR: f64 = 6.0;
const MIN_SHORT_STORM_HR: f64 = 1.0;
const MIN_QUARTILE_STORM_HR: f64 = 2.0;

// Where the design rainfall of an analysis comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RainfallInput {
    // Regional curve with the department's P3,10 from the reference data
    Department { name: String },
    BaseDepth { base_depth_mm: f64 },
    // Named coefficient set from the reference data
    IdfSet { name: String },
    Curve { curve: IdfCurve },
    // Fixed storm depth; no frequency curve involved
    TotalDepth { total_depth_mm: f64 },
}

impl RainfallInput {
    fn curve(&self, reference: &ReferenceData) -> Result<Option<IdfCurve>> {
        Ok(match self {
            RainfallInput::Department { name } => Some(reference.regional_curve(name)?),
            RainfallInput::BaseDepth { base_depth_mm } => Some(IdfCurve::regional(*base_depth_mm)?),
            RainfallInput::IdfSet { name } => Some(reference.idf_set(name)?.clone()),
            RainfallInput::Curve { curve } => {
                curve.validate()?;
                Some(curve.clone())
            }
            RainfallInput::TotalDepth { .. } => None,
        })
    }
}

fn default_true() -> bool {
    true
}

/// One combination of methods to run against a basin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSelection {
    pub rainfall: RainfallInput,
    pub return_period_yr: f64,
    pub tc_method: TcMethod,
    pub storm: StormStrategy,
    #[serde(default)]
    pub unit_hydrograph: UnitHydrographShape,
    #[serde(default)]
    pub runoff: RunoffModel,
    #[serde(default)]
    pub duration_hr: Option<f64>, // default depends on the storm
    #[serde(default)]
    pub dt_min: Option<f64>, // default from Tc
    #[serde(default = "default_true")]
    pub area_reduction: bool,
}

impl AnalysisSelection {
    pub fn new(
        rainfall: RainfallInput,
        return_period_yr: f64,
        tc_method: TcMethod,
        storm: StormStrategy,
    ) -> Self {
        AnalysisSelection {
            rainfall,
            return_period_yr,
            tc_method,
            storm,
            unit_hydrograph: UnitHydrographShape::default(),
            runoff: RunoffModel::default(),
            duration_hr: None,
            dt_min: None,
            area_reduction: true,
        }
    }

    pub fn with_unit_hydrograph(mut self, shape: UnitHydrographShape) -> Self {
        self.unit_hydrograph = shape;
        self
    }

    pub fn with_runoff(mut self, runoff: RunoffModel) -> Self {
        self.runoff = runoff;
        self
    }

    pub fn with_duration(mut self, duration_hr: f64) -> Self {
        self.duration_hr = Some(duration_hr);
        self
    }

    pub fn with_dt(mut self, dt_min: f64) -> Self {
        self.dt_min = Some(dt_min);
        self
    }

    pub fn without_area_reduction(mut self) -> Self {
        self.area_reduction = false;
        self
    }

    /// Short description used in logs and batch labels.
    pub fn label(&self) -> String {
        let mut label = format!(
            "{}/{}/T{}/{}",
            self.tc_method.name(),
            self.storm.label(),
            self.return_period_yr,
            self.unit_hydrograph.name()
        );
        if let Some(x) = self.unit_hydrograph.shape_factor() {
            label.push_str(&format!("/X{x}"));
        }
        label
    }
}

// Scalars of the design storm
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StormSummary {
    pub method: String,
    pub duration_hr: f64,
    pub dt_min: f64,
    pub total_depth_mm: f64,
    pub peak_intensity_mm_hr: f64,
    pub peak_time_hr: f64,
}

impl StormSummary {
    fn of(storm: &Hyetograph) -> Self {
        StormSummary {
            method: storm.method.clone(),
            duration_hr: storm.duration_hr(),
            dt_min: storm.dt_hr * 60.0,
            total_depth_mm: storm.total_depth_mm,
            peak_intensity_mm_hr: storm.peak_intensity_mm_hr(),
            peak_time_hr: storm.peak_time_hr(),
        }
    }
}

// Scalars of the unit hydrograph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitHydrographSummary {
    pub shape: &'static str,
    pub shape_factor: Option<f64>,
    pub time_to_peak_hr: f64,
    pub base_time_hr: f64,
    pub peak_m3s_per_mm: f64,
}

/// Everything a run produces, for reports and exporters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydrographResult {
    pub basin: String,
    pub return_period_yr: f64,
    pub tc_method: &'static str,
    pub tc_hr: f64,
    pub storm: StormSummary,
    pub runoff: RunoffSummary,
    pub unit_hydrograph: UnitHydrographSummary,
    pub peak_flow_m3s: f64,
    pub time_to_peak_hr: f64,
    pub volume_m3: f64,
    pub rational_peak_m3s: Option<f64>, // instantaneous check when C is known
    pub hyetograph: Hyetograph,
    pub effective_rainfall: EffectiveRainfallSeries,
    pub hydrograph: DischargeSeries,
    pub advisories: Vec<Advisory>,
}

impl HydrographResult {
    /// Effective depth spread over the basin [m3].
    pub fn runoff_volume_m3(&self, basin: &BasinDescriptor) -> f64 {
        self.runoff.effective_depth_mm * 1000.0 * basin.area_km2()
    }
}

/// Runs analyses against shared, read-only reference data. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Pipeline {
    reference: Arc<ReferenceData>,
}

impl Pipeline {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Pipeline { reference }
    }

    /// Pipeline over the built-in tables.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(Arc::new(ReferenceData::builtin()?)))
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /**
    Runs one analysis.

    # Arguments
    * `basin` - Basin descriptor; the selected methods check their own fields.
    * `selection` - Methods, return period and discretization.

    # Returns
    The design hydrograph with every intermediate summary.
    */
    #[tracing::instrument(skip_all, fields(basin = %basin.name, analysis = %selection.label()))]
    pub fn run(
        &self,
        basin: &BasinDescriptor,
        selection: &AnalysisSelection,
    ) -> Result<HydrographResult> {
        basin.validate()?;
        let return_period_yr = validate_return_period(selection.return_period_yr)?;
        let reference = self.reference.as_ref();
        let curve = selection.rainfall.curve(reference)?;
        let area_km2 = selection.area_reduction.then(|| basin.area_km2());

        let tc_hr = self.time_of_concentration(basin, selection, curve.as_ref())?;

        let min_dt = selection.storm.min_dt_min(reference);
        let native_duration = match &selection.storm {
            StormStrategy::Table { name } => reference.storm_table(name)?.native_duration_hr,
            _ => None,
        };
        let mut dt_min = match selection.dt_min {
            Some(dt) => dt,
            None => default_dt_min(tc_hr, min_dt)?,
        };
        if native_duration.is_some() {
            dt_min = dt_min.max(min_dt);
        }
        let duration_hr = selection
            .duration_hr
            .unwrap_or_else(|| default_duration_hr(&selection.storm, native_duration, tc_hr));

        let source = match (&curve, &selection.rainfall) {
            (Some(curve), _) => RainfallSource::Curve {
                curve: curve.clone(),
                return_period_yr,
                area_km2,
            },
            (None, RainfallInput::TotalDepth { total_depth_mm }) => RainfallSource::Depth {
                total_depth_mm: *total_depth_mm,
            },
            (None, _) => return Err(HydroError::missing("pipeline", "rainfall")),
        };
        let hyetograph = synthesize(&source, duration_hr, dt_min, &selection.storm, reference)?;

        let mut advisories = Vec::new();
        if let Some(curve) = &curve {
            advisories.extend(
                curve
                    .evaluate(return_period_yr, hyetograph.duration_hr(), area_km2)?
                    .advisories,
            );
        }

        let (effective_rainfall, runoff) =
            selection.runoff.transform(&hyetograph, basin, return_period_yr)?;
        if runoff.effective_depth_mm == 0.0 {
            advisories.push(Advisory::new(
                "runoff",
                format!(
                    "storm depth {:.1} mm produces no effective rainfall",
                    hyetograph.total_depth_mm
                ),
            ));
        }

        let unit = selection
            .unit_hydrograph
            .generate(basin, tc_hr, hyetograph.dt_hr, reference)?;
        let hydrograph = convolve(&effective_rainfall, &unit)?;

        let rational_peak_m3s = match (&curve, basin.runoff_coefficient) {
            (Some(curve), Some(c)) => {
                let intensity = curve.intensity(return_period_yr, tc_hr, area_km2)?;
                let c = adjust_c_for_return_period(c, return_period_yr, C_BASE_RETURN_PERIOD)?;
                Some(rational_peak_flow(c, intensity, basin.area_ha, return_period_yr)?)
            }
            _ => None,
        };

        for advisory in &advisories {
            advisory.log();
        }
        tracing::info!(
            tc_hr,
            depth_mm = hyetograph.total_depth_mm,
            runoff_mm = runoff.effective_depth_mm,
            peak_m3s = hydrograph.peak_m3s,
            time_to_peak_hr = hydrograph.time_to_peak_hr,
            "design hydrograph computed"
        );

        Ok(HydrographResult {
            basin: basin.name.clone(),
            return_period_yr,
            tc_method: selection.tc_method.name(),
            tc_hr,
            storm: StormSummary::of(&hyetograph),
            runoff,
            unit_hydrograph: summarize_unit(&unit, &selection.unit_hydrograph),
            peak_flow_m3s: hydrograph.peak_m3s,
            time_to_peak_hr: hydrograph.time_to_peak_hr,
            volume_m3: hydrograph.volume_m3,
            rational_peak_m3s,
            hyetograph,
            effective_rainfall,
            hydrograph,
            advisories,
        })
    }

    // With the linear model the Desbordes Tc uses C at the design return period
    fn time_of_concentration(
        &self,
        basin: &BasinDescriptor,
        selection: &AnalysisSelection,
        curve: Option<&IdfCurve>,
    ) -> Result<f64> {
        let adjusted;
        let tc_basin = match (&selection.runoff, &selection.tc_method, basin.runoff_coefficient) {
            (RunoffModel::LinearCoefficient, TcMethod::Desbordes { .. }, Some(c)) => {
                let mut copy = basin.clone();
                copy.runoff_coefficient = Some(adjust_c_for_return_period(
                    c,
                    selection.return_period_yr,
                    C_BASE_RETURN_PERIOD,
                )?);
                adjusted = copy;
                &adjusted
            }
            _ => basin,
        };
        match curve {
            Some(curve) => selection
                .tc_method
                .compute_with_curve(tc_basin, curve, selection.return_period_yr),
            None => selection.tc_method.compute(tc_basin),
        }
    }
}

/**
Step used when the selection leaves it open.

# Arguments
* `tc_hr` - Time of concentration.
* `min_dt_min` - Smallest step the storm strategy accepts.

# Returns
The practical step nearest 0.133 Tc, cut to whole minutes below Tp / 3
on fast basins so the unit hydrograph keeps its rising limb.
*/
pub fn default_dt_min(tc_hr: f64, min_dt_min: f64) -> Result<f64> {
    let practical = practical_dt_min(recommended_dt_min(tc_hr, min_dt_min)?);
    let cap = (max_dt_hr(tc_hr) * 60.0).floor().max(1.0);
    Ok(practical.min(cap))
}

/// Storm duration used when the selection leaves it open.
pub fn default_duration_hr(
    storm: &StormStrategy,
    native_duration_hr: Option<f64>,
    tc_hr: f64,
) -> f64 {
    match storm {
        StormStrategy::AlternatingBlocks { .. } | StormStrategy::MultiModal { .. } => {
            DEFAULT_STORM_DURATION_HR
        }
        StormStrategy::Table { .. } => {
            native_duration_hr.unwrap_or_else(|| (2.0 * tc_hr).max(MIN_QUARTILE_STORM_HR))
        }
        StormStrategy::Chicago { .. } | StormStrategy::CustomTable { .. } => {
            tc_hr.max(MIN_SHORT_STORM_HR)
        }
    }
}

fn summarize_unit(unit: &UnitResponse, shape: &UnitHydrographShape) -> UnitHydrographSummary {
    UnitHydrographSummary {
        shape: unit.shape,
        shape_factor: shape.shape_factor(),
        time_to_peak_hr: unit.time_to_peak_hr,
        base_time_hr: unit.base_time_hr,
        peak_m3s_per_mm: unit.peak_m3s_per_mm(),
    }
}
