use crate::error::{HydroError, Result, require_coefficient, require_positive};
use crate::travel_time::FlowSegment;
use serde::{Deserialize, Serialize};

// Hydrologic soil group, ordered from high (A) to very low (D) infiltration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SoilGroup {
    A,
    B,
    C,
    D,
}

impl SoilGroup {
    pub fn parse(group: &str) -> Result<Self> {
        match group.trim().to_uppercase().as_str() {
            "A" => Ok(SoilGroup::A),
            "B" => Ok(SoilGroup::B),
            "C" => Ok(SoilGroup::C),
            "D" => Ok(SoilGroup::D),
            _ => Err(HydroError::UnknownReference {
                kind: "soil group",
                name: group.to_string(),
            }),
        }
    }

    fn column(self) -> usize {
        match self {
            SoilGroup::A => 0,
            SoilGroup::B => 1,
            SoilGroup::C => 2,
            SoilGroup::D => 3,
        }
    }
}

// Catchment descriptors shared by every component of one pipeline run.
// Optional fields are only needed by some methods; those methods fail
// with a missing-parameter error when the field is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasinDescriptor {
    pub name: String,
    pub area_ha: f64, // Drainage area [ha]
    pub slope: f64,   // Mean slope [m/m]
    #[serde(default)]
    pub channel_length_m: Option<f64>, // Main channel length [m]
    #[serde(default)]
    pub elevation_drop_m: Option<f64>, // Elevation difference along the channel [m]
    #[serde(default)]
    pub centroid_length_m: Option<f64>, // Outlet to centroid along the channel [m]
    #[serde(default)]
    pub runoff_coefficient: Option<f64>, // Rational C [-]
    #[serde(default)]
    pub curve_number: Option<f64>, // CN for AMC II [-]
    #[serde(default)]
    pub soil_group: Option<SoilGroup>,
    #[serde(default)]
    pub flow_path: Vec<FlowSegment>, // Ordered segments for the velocity method
}

impl BasinDescriptor {
    pub fn new(name: &str, area_ha: f64, slope: f64) -> Result<Self> {
        let basin = BasinDescriptor {
            name: name.to_string(),
            area_ha,
            slope,
            channel_length_m: None,
            elevation_drop_m: None,
            centroid_length_m: None,
            runoff_coefficient: None,
            curve_number: None,
            soil_group: None,
            flow_path: Vec::new(),
        };
        basin.validate()?;
        Ok(basin)
    }

    /// Check every present field against its valid range. Deserialized
    /// descriptors should be validated before use.
    pub fn validate(&self) -> Result<()> {
        require_positive("area_ha", self.area_ha)?;
        require_positive("slope", self.slope)?;
        if let Some(length) = self.channel_length_m {
            require_positive("channel_length_m", length)?;
        }
        if let Some(drop) = self.elevation_drop_m {
            require_positive("elevation_drop_m", drop)?;
        }
        if let Some(lc) = self.centroid_length_m {
            require_positive("centroid_length_m", lc)?;
        }
        if let Some(c) = self.runoff_coefficient {
            require_coefficient("runoff_coefficient", c)?;
        }
        if let Some(cn) = self.curve_number {
            validate_curve_number(cn)?;
        }
        Ok(())
    }

    pub fn with_channel_length(mut self, length_m: f64) -> Result<Self> {
        self.channel_length_m = Some(require_positive("channel_length_m", length_m)?);
        Ok(self)
    }

    pub fn with_elevation_drop(mut self, drop_m: f64) -> Result<Self> {
        self.elevation_drop_m = Some(require_positive("elevation_drop_m", drop_m)?);
        Ok(self)
    }

    pub fn with_centroid_length(mut self, length_m: f64) -> Result<Self> {
        self.centroid_length_m = Some(require_positive("centroid_length_m", length_m)?);
        Ok(self)
    }

    pub fn with_runoff_coefficient(mut self, c: f64) -> Result<Self> {
        self.runoff_coefficient = Some(require_coefficient("runoff_coefficient", c)?);
        Ok(self)
    }

    pub fn with_curve_number(mut self, cn: f64) -> Result<Self> {
        self.curve_number = Some(validate_curve_number(cn)?);
        Ok(self)
    }

    pub fn with_soil_group(mut self, group: SoilGroup) -> Self {
        self.soil_group = Some(group);
        self
    }

    pub fn with_flow_path(mut self, segments: Vec<FlowSegment>) -> Self {
        self.flow_path = segments;
        self
    }

    pub fn area_km2(&self) -> f64 {
        self.area_ha / 100.0
    }

    pub fn slope_pct(&self) -> f64 {
        self.slope * 100.0
    }

    pub(crate) fn require_channel_length(&self, method: &'static str) -> Result<f64> {
        self.channel_length_m
            .ok_or_else(|| HydroError::missing(method, "channel_length_m"))
    }

    pub(crate) fn require_runoff_coefficient(&self, method: &'static str) -> Result<f64> {
        self.runoff_coefficient
            .ok_or_else(|| HydroError::missing(method, "runoff_coefficient"))
    }

    pub(crate) fn require_curve_number(&self, method: &'static str) -> Result<f64> {
        self.curve_number
            .ok_or_else(|| HydroError::missing(method, "curve_number"))
    }
}

pub(crate) fn validate_curve_number(cn: f64) -> Result<f64> {
    if (30.0..=100.0).contains(&cn) {
        Ok(cn)
    } else {
        Err(HydroError::domain("curve_number", cn, "must lie in [30, 100]"))
    }
}

/**
Looks up the TR-55 curve number (AMC II) for a cover description and a
hydrologic soil group.

# Arguments
* `cover` - Cover description, case-insensitive (e.g. "paved", "pasture fair", "row crops good").
* `group` - Hydrologic soil group.

# Returns
The curve number, or an error for an unknown cover.
*/
pub fn curve_number_for(cover: &str, group: SoilGroup) -> Result<f64> {
    let row: [f64; 4] = match cover.trim().to_lowercase().as_str() {
        // Urban and residential
        "residential 500 m2" => [77.0, 85.0, 90.0, 92.0],
        "residential 1000 m2" => [61.0, 75.0, 83.0, 87.0],
        "residential 1500 m2" => [57.0, 72.0, 81.0, 86.0],
        "residential 2000 m2" => [54.0, 70.0, 80.0, 85.0],
        "residential 4000 m2" => [51.0, 68.0, 79.0, 84.0],
        "commercial" => [89.0, 92.0, 94.0, 95.0],
        "industrial" => [81.0, 88.0, 91.0, 93.0],
        "paved" => [98.0, 98.0, 98.0, 98.0],
        "gravel" => [76.0, 85.0, 89.0, 91.0],
        "dirt" => [72.0, 82.0, 87.0, 89.0],

        // Open space (lawns, parks)
        "open space good" => [39.0, 61.0, 74.0, 80.0],
        "open space fair" => [49.0, 69.0, 79.0, 84.0],
        "open space poor" => [68.0, 79.0, 86.0, 89.0],

        // Agricultural
        "fallow bare soil" => [77.0, 86.0, 91.0, 94.0],
        "row crops poor" => [72.0, 81.0, 88.0, 91.0],
        "row crops good" => [67.0, 78.0, 85.0, 89.0],
        "contoured crops poor" => [70.0, 79.0, 84.0, 88.0],
        "contoured crops good" => [65.0, 75.0, 82.0, 86.0],
        "terraced crops poor" => [66.0, 74.0, 80.0, 82.0],
        "terraced crops good" => [62.0, 71.0, 78.0, 81.0],
        "pasture poor" => [68.0, 79.0, 86.0, 89.0],
        "pasture fair" => [49.0, 69.0, 79.0, 84.0],
        "pasture good" => [39.0, 61.0, 74.0, 80.0],
        "meadow" => [30.0, 58.0, 71.0, 78.0],

        // Woods
        "woods poor" => [45.0, 66.0, 77.0, 83.0],
        "woods fair" => [36.0, 60.0, 73.0, 79.0],
        "woods good" => [30.0, 55.0, 70.0, 77.0],

        _ => {
            return Err(HydroError::UnknownReference {
                kind: "cover type",
                name: cover.to_string(),
            });
        }
    };
    Ok(row[group.column()])
}

/// Area-weighted mean of a coefficient (C or CN) over sub-areas given as
/// `(area, value)` pairs in any consistent area unit.
pub fn weighted_coefficient(parts: &[(f64, f64)]) -> Result<f64> {
    let total_area: f64 = parts.iter().map(|&(area, _)| area).sum();
    require_positive("total_area", total_area)?;
    if let Some(&(area, _)) = parts.iter().find(|&&(area, _)| area < 0.0) {
        return Err(HydroError::domain("sub_area", area, "must be >= 0"));
    }
    Ok(parts.iter().map(|&(area, value)| area * value).sum::<f64>() / total_area)
}
