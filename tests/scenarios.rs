use approx::{assert_abs_diff_eq, assert_relative_eq};
use design_flood::batch::{combinations, run_batch, run_batch_sequential};
use design_flood::idf::{IdfCurve, return_period_factor};
use design_flood::runoff::{MoistureCondition, scs_effective_rainfall, scs_runoff};
use design_flood::travel_time::KirpichSurface;
use design_flood::unit_hydrograph::{SCS_SHAPE_FACTOR, triangular};
use design_flood::{
    BasinDescriptor, Pipeline, RainfallInput, StormStrategy, TcMethod, UnitHydrographShape,
};

#[test]
fn regional_three_hour_storm() {
    let curve = IdfCurve::regional(78.0).unwrap();
    let q = curve.evaluate(25.0, 3.0, None).unwrap();
    assert_abs_diff_eq!(q.intensity_mm_hr, 30.63, epsilon = 0.05);
    assert_abs_diff_eq!(q.depth_mm, 91.9, epsilon = 0.15);
    assert_eq!(q.area_reduction_factor, 1.0);
    assert!(q.advisories.is_empty());
}

#[test]
fn curve_number_runoff_and_abstraction_ratio() {
    let standard = scs_runoff(100.0, 75.0, 0.2).unwrap();
    assert_abs_diff_eq!(standard, 41.14, epsilon = 0.01);
    assert!(scs_runoff(100.0, 75.0, 0.05).unwrap() > standard);
    assert!(scs_runoff(100.0, 90.0, 0.2).unwrap() >= standard);
}

#[test]
fn triangular_unit_hydrograph_geometry() {
    let dt = 10.0 / 60.0;
    let uh = triangular(5.0, 1.0, dt, SCS_SHAPE_FACTOR).unwrap();
    assert_abs_diff_eq!(uh.time_to_peak_hr, 0.6833, epsilon = 1e-4);
    assert_relative_eq!(uh.base_time_hr, 2.67 * uh.time_to_peak_hr, epsilon = 1e-12);

    let q = &uh.discharge_m3s_per_mm;
    let peak = uh.peak_m3s_per_mm();
    assert_eq!(q.iter().filter(|&&v| v == peak).count(), 1);
    assert!((uh.sampled_peak_time_hr() - uh.time_to_peak_hr).abs() < dt);
    assert_eq!(q[0], 0.0);
    assert!(q.iter().all(|&v| v >= 0.0));
}

#[test]
fn parallel_batch_matches_sequential_loop() {
    let pipeline = Pipeline::builtin().unwrap();
    let basin = BasinDescriptor::new("cuenca", 180.0, 0.012)
        .unwrap()
        .with_channel_length(2200.0)
        .unwrap()
        .with_curve_number(81.0)
        .unwrap();
    let items = combinations(
        &RainfallInput::Department {
            name: "Montevideo".to_string(),
        },
        &[
            TcMethod::Temez,
            TcMethod::Kirpich {
                surface: KirpichSurface::Natural,
            },
        ],
        &[
            StormStrategy::gz(),
            StormStrategy::Chicago { advancement: 0.4 },
            StormStrategy::table("huff_q2"),
        ],
        &[2.0, 25.0],
        &[
            UnitHydrographShape::default(),
            UnitHydrographShape::Triangular { x: 3.33 },
        ],
    );
    assert_eq!(items.len(), 24);

    let parallel = run_batch(&pipeline, &basin, &items);
    let sequential = run_batch_sequential(&pipeline, &basin, &items);
    assert_eq!(parallel.len(), sequential.len());
    for (p, s) in parallel.iter().zip(&sequential) {
        assert_eq!(p.label, s.label);
        assert_eq!(p.result.as_ref().unwrap(), s.result.as_ref().unwrap());
    }
}

#[test]
fn return_period_factor_is_anchored_and_increasing() {
    assert_eq!(return_period_factor(10.0).unwrap(), 1.0);
    let periods = [2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0];
    for w in periods.windows(2) {
        assert!(return_period_factor(w[1]).unwrap() > return_period_factor(w[0]).unwrap());
    }
    assert!(return_period_factor(1.5).is_err());
}

#[test]
fn curve_evaluation_is_repeatable() {
    let curve = IdfCurve::regional(81.0).unwrap();
    let first = curve.evaluate(50.0, 1.5, Some(12.0)).unwrap();
    let second = curve.evaluate(50.0, 1.5, Some(12.0)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.intensity_mm_hr.to_bits(), second.intensity_mm_hr.to_bits());
}

#[test]
fn effective_rainfall_never_exceeds_gross() {
    let cumulative: Vec<f64> = (1..=36).map(|k| 120.0 * (k as f64 / 36.0).powf(0.6)).collect();
    for cn in [45.0, 70.0, 85.0, 98.0] {
        let conditions = [
            MoistureCondition::Dry,
            MoistureCondition::Average,
            MoistureCondition::Wet,
        ];
        for moisture in conditions {
            let series = scs_effective_rainfall(&cumulative, 1.0 / 6.0, cn, 0.2, moisture).unwrap();
            for (effective, gross) in series.cumulative_mm.iter().zip(&cumulative) {
                assert!(*effective <= gross + 1e-9);
            }
            assert!(series.depth_mm.iter().all(|&d| d >= -1e-12));
        }
    }
}
