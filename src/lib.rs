pub mod basin;
pub mod batch;
pub mod convolution;
pub mod error;
pub mod idf;
pub mod pipeline;
pub mod reference;
pub mod runoff;
pub mod storm;
pub mod table;
pub mod travel_time;
pub mod unit_hydrograph;

pub use basin::{BasinDescriptor, SoilGroup};
pub use batch::{BatchItem, BatchOutcome, run_batch, run_batch_sequential};
pub use convolution::{DischargeSeries, convolve};
pub use error::{Advisory, HydroError, Result};
pub use idf::{IdfCurve, IdfQueryResult};
pub use pipeline::{AnalysisSelection, HydrographResult, Pipeline, RainfallInput};
pub use reference::ReferenceData;
pub use runoff::{EffectiveRainfallSeries, MoistureCondition, RunoffModel};
pub use storm::{Hyetograph, RainfallSource, StormStrategy, synthesize};
pub use travel_time::{FlowSegment, TcMethod};
pub use unit_hydrograph::{UnitHydrographShape, UnitResponse};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let pipeline = Pipeline::builtin().unwrap();
        let basin = BasinDescriptor::new("demo", 250.0, 0.01)
            .unwrap()
            .with_channel_length(2500.0)
            .unwrap()
            .with_curve_number(80.0)
            .unwrap();
        let selection = AnalysisSelection::new(
            RainfallInput::Department {
                name: "Canelones".to_string(),
            },
            10.0,
            TcMethod::Temez,
            StormStrategy::gz(),
        );
        let result = pipeline.run(&basin, &selection).unwrap();
        assert!(result.peak_flow_m3s > 0.0);
    }
}
