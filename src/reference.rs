use crate::error::{HydroError, Result};
use crate::idf::IdfCurve;
use crate::table::CurveTable;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

static BUILTIN_REFERENCE: &str = include_str!("../data/reference_data.toml");

// File layout of the reference data
#[derive(Debug, Deserialize)]
struct RawReference {
    dimensionless_unit_hydrograph: RawTable,
    #[serde(default)]
    storm_tables: BTreeMap<String, RawTable>,
    #[serde(default)]
    idf_sets: BTreeMap<String, IdfCurve>,
    #[serde(default)]
    base_depths_mm: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default = "unit_scale")]
    time_scale: f64,
    #[serde(default = "unit_scale")]
    depth_scale: f64,
    #[serde(default)]
    native_duration_hr: Option<f64>,
    points: Vec<(f64, f64)>,
}

fn unit_scale() -> f64 {
    1.0
}

impl RawTable {
    fn normalized(&self, name: &str) -> Result<CurveTable> {
        if !(self.time_scale > 0.0 && self.depth_scale > 0.0) {
            return Err(invalid(name, "scales must be > 0"));
        }
        let points = self
            .points
            .iter()
            .map(|&(t, p)| (t / self.time_scale, p / self.depth_scale))
            .collect();
        CurveTable::new(points).map_err(|e| rename(e, name))
    }
}

// A normalized cumulative storm distribution
#[derive(Debug, Clone, PartialEq)]
pub struct StormTable {
    pub table: CurveTable,
    pub native_duration_hr: Option<f64>, // 24 h for the NRCS types, none for Huff
}

/// Read-only tables shared by every pipeline run. Build once, wrap in an
/// `Arc`, and never mutate.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceData {
    dimensionless_uh: CurveTable,
    storm_tables: BTreeMap<String, StormTable>,
    idf_sets: BTreeMap<String, IdfCurve>,
    base_depths_mm: BTreeMap<String, f64>,
}

impl ReferenceData {
    /// Tables compiled into the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_REFERENCE)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawReference = toml::from_str(text)?;

        let dimensionless_uh = validate_dimensionless(
            raw.dimensionless_unit_hydrograph
                .normalized("dimensionless_unit_hydrograph")?,
        )?;

        let mut storm_tables = BTreeMap::new();
        for (name, raw_table) in &raw.storm_tables {
            let table = raw_table.normalized(name)?;
            let table =
                CurveTable::cumulative(table.points().to_vec()).map_err(|e| rename(e, name))?;
            storm_tables.insert(
                name.clone(),
                StormTable {
                    table,
                    native_duration_hr: raw_table.native_duration_hr,
                },
            );
        }

        for curve in raw.idf_sets.values() {
            curve.validate()?;
        }

        let mut base_depths_mm = BTreeMap::new();
        for (name, depth) in raw.base_depths_mm {
            if !(depth > 0.0) {
                return Err(HydroError::domain("base_depth_mm", depth, "must be > 0"));
            }
            base_depths_mm.insert(normalize_key(&name), depth);
        }

        tracing::debug!(
            storm_tables = storm_tables.len(),
            idf_sets = raw.idf_sets.len(),
            departments = base_depths_mm.len(),
            "reference data loaded"
        );

        Ok(ReferenceData {
            dimensionless_uh,
            storm_tables,
            idf_sets: raw.idf_sets,
            base_depths_mm,
        })
    }

    /// Adds or replaces a caller-supplied cumulative storm table.
    pub fn with_storm_table(
        mut self,
        name: &str,
        points: Vec<(f64, f64)>,
        native_duration_hr: Option<f64>,
    ) -> Result<Self> {
        let table = CurveTable::cumulative(points).map_err(|e| rename(e, name))?;
        self.storm_tables.insert(
            name.to_string(),
            StormTable {
                table,
                native_duration_hr,
            },
        );
        Ok(self)
    }

    pub fn dimensionless_uh(&self) -> &CurveTable {
        &self.dimensionless_uh
    }

    pub fn storm_table(&self, name: &str) -> Result<&StormTable> {
        self.storm_tables
            .get(name)
            .ok_or_else(|| HydroError::UnknownReference {
                kind: "storm table",
                name: name.to_string(),
            })
    }

    pub fn storm_table_names(&self) -> impl Iterator<Item = &str> {
        self.storm_tables.keys().map(String::as_str)
    }

    pub fn idf_set(&self, name: &str) -> Result<&IdfCurve> {
        self.idf_sets
            .get(name)
            .ok_or_else(|| HydroError::UnknownReference {
                kind: "IDF coefficient set",
                name: name.to_string(),
            })
    }

    /// Regional P3,10 for a department. Case and spacing are ignored.
    pub fn base_depth(&self, department: &str) -> Result<f64> {
        self.base_depths_mm
            .get(&normalize_key(department))
            .copied()
            .ok_or_else(|| HydroError::UnknownReference {
                kind: "department",
                name: department.to_string(),
            })
    }

    pub fn regional_curve(&self, department: &str) -> Result<IdfCurve> {
        IdfCurve::regional(self.base_depth(department)?)
    }
}

fn validate_dimensionless(table: CurveTable) -> Result<CurveTable> {
    let name = "dimensionless_unit_hydrograph";
    let points = table.points();
    if points[0] != (0.0, 0.0) {
        return Err(invalid(name, "must start at (0, 0)"));
    }
    if points.iter().any(|&(_, q)| !(0.0..=1.0).contains(&q)) {
        return Err(invalid(name, "ordinates must lie in [0, 1]"));
    }
    if !approx::abs_diff_eq!(table.y_max(), 1.0, epsilon = 1e-9) {
        return Err(invalid(name, "peak ordinate must be 1"));
    }
    Ok(table)
}

fn normalize_key(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

fn invalid(name: &str, reason: &str) -> HydroError {
    HydroError::InvalidTable {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

// Table errors carry the name of the table they came from
fn rename(err: HydroError, name: &str) -> HydroError {
    match err {
        HydroError::InvalidTable { reason, .. } => HydroError::InvalidTable {
            name: name.to_string(),
            reason,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn builtin_tables_load() {
        let data = ReferenceData::builtin().unwrap();
        let names: Vec<&str> = data.storm_table_names().collect();
        for expected in [
            "huff_q1",
            "huff_q2",
            "huff_q3",
            "huff_q4",
            "scs_type_i",
            "scs_type_ia",
            "scs_type_ii",
            "scs_type_iii",
        ] {
            assert!(names.contains(&expected), "{expected}");
        }
        let scs = data.storm_table("scs_type_ii").unwrap();
        assert_eq!(scs.native_duration_hr, Some(24.0));
        assert_relative_eq!(scs.table.interpolate(0.5), 0.663, epsilon = 1e-12);
        assert_eq!(data.storm_table("huff_q2").unwrap().native_duration_hr, None);
        assert_relative_eq!(data.dimensionless_uh().interpolate(1.0), 1.0);
    }

    #[test]
    fn base_depth_lookup() {
        let data = ReferenceData::builtin().unwrap();
        assert_eq!(data.base_depth("Montevideo").unwrap(), 78.0);
        assert_eq!(data.base_depth("Treinta y Tres").unwrap(), 80.0);
        assert!(matches!(
            data.base_depth("atlantis"),
            Err(HydroError::UnknownReference { kind: "department", .. })
        ));
        assert_eq!(
            data.regional_curve("salto").unwrap(),
            IdfCurve::Regional { base_depth_mm: 81.0 }
        );
    }

    #[test]
    fn idf_sets_are_named() {
        let data = ReferenceData::builtin().unwrap();
        assert!(matches!(data.idf_set("default_sherman").unwrap(), IdfCurve::Sherman { .. }));
        assert!(data.idf_set("missing").is_err());
    }

    #[test]
    fn malformed_storm_table_is_rejected() {
        let text = r#"
            [dimensionless_unit_hydrograph]
            points = [[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]]

            [storm_tables.broken]
            points = [[0.0, 0.0], [0.5, 0.2], [1.0, 0.9]]
        "#;
        match ReferenceData::from_toml_str(text) {
            Err(HydroError::InvalidTable { name, .. }) => assert_eq!(name, "broken"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unparseable_text_is_a_reference_error() {
        assert!(matches!(
            ReferenceData::from_toml_str("dimensionless_unit_hydrograph = 3"),
            Err(HydroError::ReferenceData(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            ReferenceData::from_path("/nonexistent/reference.toml"),
            Err(HydroError::Io(_))
        ));
    }

    #[test]
    fn caller_tables_are_validated() {
        let data = ReferenceData::builtin().unwrap();
        let data = data
            .with_storm_table("front_loaded", vec![(0.0, 0.0), (0.25, 0.6), (1.0, 1.0)], None)
            .unwrap();
        assert!(data.storm_table("front_loaded").is_ok());
        assert!(
            data.with_storm_table("bad", vec![(0.0, 0.0), (1.0, 0.5)], None)
                .is_err()
        );
    }
}
