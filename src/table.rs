use crate::error::{HydroError, Result};
use serde::{Deserialize, Serialize};

// Piecewise-linear lookup table [(x, y)], x non-decreasing.
// Outside the x range the end values are held, never extrapolated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(f64, f64)>", into = "Vec<(f64, f64)>")]
pub struct CurveTable {
    points: Vec<(f64, f64)>,
}

impl CurveTable {
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self> {
        if points.len() < 2 {
            return Err(invalid("table needs at least two points"));
        }
        if points.iter().any(|&(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(invalid("non-finite entry"));
        }
        if points.windows(2).any(|w| w[1].0 < w[0].0) {
            return Err(invalid("x values must be non-decreasing"));
        }
        Ok(CurveTable { points })
    }

    /// A normalized cumulative table: endpoints (0, 0) and (1, 1), both
    /// coordinates non-decreasing.
    pub fn cumulative(points: Vec<(f64, f64)>) -> Result<Self> {
        let table = CurveTable::new(points)?;
        let first = table.points[0];
        let last = table.points[table.points.len() - 1];
        if !approx::abs_diff_eq!(first.0, 0.0, epsilon = 1e-9)
            || !approx::abs_diff_eq!(first.1, 0.0, epsilon = 1e-9)
        {
            return Err(invalid("cumulative table must start at (0, 0)"));
        }
        if !approx::abs_diff_eq!(last.0, 1.0, epsilon = 1e-9)
            || !approx::abs_diff_eq!(last.1, 1.0, epsilon = 1e-9)
        {
            return Err(invalid("cumulative table must end at (1, 1)"));
        }
        if table.points.windows(2).any(|w| w[1].1 < w[0].1) {
            return Err(invalid("cumulative values must be non-decreasing"));
        }
        Ok(table)
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn x_max(&self) -> f64 {
        self.points[self.points.len() - 1].0
    }

    pub fn y_max(&self) -> f64 {
        self.points.iter().map(|&(_, y)| y).fold(f64::MIN, f64::max)
    }

    // Linear interpolation between bracketing points, clamped at both ends
    pub fn interpolate(&self, x: f64) -> f64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }
        for w in self.points.windows(2) {
            let (x1, y1) = w[0];
            let (x2, y2) = w[1];
            if x >= x1 && x <= x2 {
                if x2 == x1 {
                    return y2;
                }
                return y1 + (y2 - y1) * (x - x1) / (x2 - x1);
            }
        }
        last.1
    }
}

impl TryFrom<Vec<(f64, f64)>> for CurveTable {
    type Error = HydroError;

    fn try_from(points: Vec<(f64, f64)>) -> Result<Self> {
        CurveTable::new(points)
    }
}

impl From<CurveTable> for Vec<(f64, f64)> {
    fn from(table: CurveTable) -> Self {
        table.points
    }
}

fn invalid(reason: &str) -> HydroError {
    HydroError::InvalidTable {
        name: "curve".to_string(),
        reason: reason.to_string(),
    }
}
