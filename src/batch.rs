use crate::basin::BasinDescriptor;
use crate::error::Result;
use crate::pipeline::{AnalysisSelection, HydrographResult, Pipeline, RainfallInput};
use crate::storm::StormStrategy;
use crate::travel_time::TcMethod;
use crate::unit_hydrograph::UnitHydrographShape;
use rayon::prelude::*;

// A selection with the identifier its outcome is reported under
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub label: String,
    pub selection: AnalysisSelection,
}

impl BatchItem {
    pub fn new(selection: AnalysisSelection) -> Self {
        BatchItem {
            label: selection.label(),
            selection,
        }
    }
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub label: String,
    pub result: Result<HydrographResult>,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every combination of Tc method, storm, return period and unit
/// hydrograph shape for one rainfall input.
pub fn combinations(
    rainfall: &RainfallInput,
    tc_methods: &[TcMethod],
    storms: &[StormStrategy],
    return_periods_yr: &[f64],
    shapes: &[UnitHydrographShape],
) -> Vec<BatchItem> {
    let mut items = Vec::with_capacity(
        tc_methods.len() * storms.len() * return_periods_yr.len() * shapes.len(),
    );
    for tc_method in tc_methods {
        for storm in storms {
            for &return_period_yr in return_periods_yr {
                for &shape in shapes {
                    let selection = AnalysisSelection::new(
                        rainfall.clone(),
                        return_period_yr,
                        tc_method.clone(),
                        storm.clone(),
                    )
                    .with_unit_hydrograph(shape);
                    items.push(BatchItem::new(selection));
                }
            }
        }
    }
    items
}

/**
Runs independent analyses of one basin across the rayon thread pool.

# Arguments
* `pipeline` - Shared pipeline; its reference data is only read.
* `basin` - Basin every item is run against.
* `items` - Labelled selections.

# Returns
One outcome per item, in input order. A failed item holds its error and
does not affect the others.
*/
#[tracing::instrument(skip_all, fields(basin = %basin.name, items = items.len()))]
pub fn run_batch(
    pipeline: &Pipeline,
    basin: &BasinDescriptor,
    items: &[BatchItem],
) -> Vec<BatchOutcome> {
    let outcomes: Vec<BatchOutcome> = items
        .par_iter()
        .map(|item| run_item(pipeline, basin, item))
        .collect();
    log_summary(&outcomes);
    outcomes
}

/// Single-threaded [`run_batch`].
#[tracing::instrument(skip_all, fields(basin = %basin.name, items = items.len()))]
pub fn run_batch_sequential(
    pipeline: &Pipeline,
    basin: &BasinDescriptor,
    items: &[BatchItem],
) -> Vec<BatchOutcome> {
    let outcomes: Vec<BatchOutcome> = items
        .iter()
        .map(|item| run_item(pipeline, basin, item))
        .collect();
    log_summary(&outcomes);
    outcomes
}

fn run_item(pipeline: &Pipeline, basin: &BasinDescriptor, item: &BatchItem) -> BatchOutcome {
    let result = pipeline.run(basin, &item.selection);
    if let Err(err) = &result {
        tracing::warn!(label = %item.label, error = %err, "combination failed");
    }
    BatchOutcome {
        label: item.label.clone(),
        result,
    }
}

fn log_summary(outcomes: &[BatchOutcome]) {
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    tracing::info!(total = outcomes.len(), failed, "batch finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HydroError;
    use crate::travel_time::KirpichSurface;

    fn basin() -> BasinDescriptor {
        BasinDescriptor::new("canada", 80.0, 0.02)
            .unwrap()
            .with_channel_length(1200.0)
            .unwrap()
            .with_curve_number(78.0)
            .unwrap()
    }

    #[test]
    fn cross_product_size_and_labels() {
        let items = combinations(
            &RainfallInput::BaseDepth { base_depth_mm: 78.0 },
            &[TcMethod::Temez, TcMethod::Kirpich { surface: KirpichSurface::Natural }],
            &[StormStrategy::gz(), StormStrategy::bimodal()],
            &[2.0, 10.0, 100.0],
            &[UnitHydrographShape::default()],
        );
        assert_eq!(items.len(), 12);
        assert_eq!(items[0].label, "temez/gz/T2/triangular/X1.67");
    }

    #[test]
    fn failed_items_stay_in_their_slot() {
        let pipeline = Pipeline::builtin().unwrap();
        let rainfall = RainfallInput::BaseDepth { base_depth_mm: 78.0 };
        let item = |return_period_yr, tc_method| {
            BatchItem::new(AnalysisSelection::new(
                rainfall.clone(),
                return_period_yr,
                tc_method,
                StormStrategy::gz(),
            ))
        };
        let items = vec![
            item(10.0, TcMethod::Temez),
            // needs a runoff coefficient the basin does not have
            item(10.0, TcMethod::Faa),
            item(25.0, TcMethod::Temez),
        ];
        let outcomes = run_batch(&pipeline, &basin(), &items);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(HydroError::MissingParameter {
                field: "runoff_coefficient",
                ..
            })
        ));
        assert!(outcomes[2].is_ok());
        for (item, outcome) in items.iter().zip(&outcomes) {
            assert_eq!(item.label, outcome.label);
        }
    }
}
