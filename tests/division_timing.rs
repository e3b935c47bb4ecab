use approx::{assert_abs_diff_eq, assert_relative_eq};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use divtrack::division::{time_divisions, DivisionParams};
use divtrack::lineage::resolver::resolve_lineage;
use divtrack::lineage::tracklets::{assemble_tracklets, assign_cycles};
use divtrack::pipeline::{process_dataset, Dataset, PipelineParams};
use divtrack::{DivTrackError, SpotRecord, SpotTable};

mod common;
use common::{embryo_metadata, frame_time, quadratic_separation, EmbryoBuilder};

fn resolve(mut table: SpotTable) -> SpotTable {
    assemble_tracklets(&mut table);
    assign_cycles(&mut table, &embryo_metadata()).unwrap();
    resolve_lineage(&mut table).unwrap();
    table
}

/// One division at time_since_nc11 = 10.0 (frame 50), daughters sampled at t = 0.0..=0.8.
#[test]
fn test_single_division_recovers_template_and_time() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut builder = EmbryoBuilder::new();
    let mother = builder.add_clean_division([0.0; 3], 40, 50, 5, quadratic_separation);
    let table = resolve(builder.build());

    let params = DivisionParams::default();
    let timing = time_divisions(&table, &params).unwrap();

    assert_eq!(timing.observations.len(), 5);
    let template = timing.templates[&12].as_ref().unwrap();
    assert_relative_eq!(template.a, 4.0, epsilon = 1e-6);
    assert_abs_diff_eq!(template.b, 0.0, epsilon = 1e-6);
    assert_relative_eq!(template.c, 1.0, epsilon = 1e-6);

    assert!(timing.templates[&11].as_ref().unwrap_err().is_fitting_error());
    assert_eq!(timing.failed_cycles().count(), 3);

    assert_eq!(timing.estimates.len(), 1);
    let estimate = &timing.estimates[0];
    let mother_tracklet = table.get(mother).unwrap().tracklet_id.unwrap();
    assert_eq!(estimate.tracklet_id, mother_tracklet);
    assert_eq!(estimate.cycle, 11);
    assert_abs_diff_eq!(estimate.division_time, 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(
        estimate.corrected_division_time,
        10.0,
        epsilon = params.grid_step()
    );
    assert!(estimate.error < 1e-3);
}

/// A division first resolvable 0.3 after it happened is corrected 0.3 earlier than a
/// division of the same cycle tracked from the exact division moment.
#[test]
fn test_detection_lag_shifts_estimate_earlier() {
    let lag = 0.3;
    let mut builder = EmbryoBuilder::new();
    for k in 0..3 {
        builder.add_clean_division([10.0 * k as f64, 0.0, 0.0], 40, 50, 5, quadratic_separation);
    }
    let lagged = builder.add_clean_division([50.0, 0.0, 0.0], 40, 50, 5, |t| {
        quadratic_separation(t + lag)
    });
    let table = resolve(builder.build());

    let params = DivisionParams::default();
    let timing = time_divisions(&table, &params).unwrap();
    assert_eq!(timing.estimates.len(), 4);

    let lagged_tracklet = table.get(lagged).unwrap().tracklet_id.unwrap();
    let (lagged_est, clean): (Vec<_>, Vec<_>) = timing
        .estimates
        .iter()
        .partition(|e| e.tracklet_id == lagged_tracklet);

    for e in &clean {
        assert_abs_diff_eq!(
            e.corrected_division_time,
            clean[0].corrected_division_time,
            epsilon = 1e-12
        );
    }
    let shift = lagged_est[0].corrected_division_time - clean[0].corrected_division_time;
    assert_abs_diff_eq!(shift, -lag, epsilon = params.grid_step() + 1e-9);
}

#[test]
fn test_degenerate_cycle_does_not_abort_others() {
    let mut builder = EmbryoBuilder::new();
    builder.add_clean_division([0.0; 3], 40, 50, 5, quadratic_separation);
    // two cycle-13 divisions, each seen for a single frame
    builder.add_clean_division([20.0, 0.0, 0.0], 60, 110, 1, quadratic_separation);
    builder.add_clean_division([40.0, 0.0, 0.0], 60, 110, 1, quadratic_separation);

    let report = process_dataset(
        Dataset::new("degenerate", builder.build(), embryo_metadata()),
        &PipelineParams::default(),
    )
    .unwrap();

    let timing = &report.timing;
    assert_eq!(
        timing.templates[&13].as_ref().unwrap_err(),
        &DivTrackError::DegenerateTimes { cycle: 13 }
    );
    assert!(timing.templates[&12].is_ok());
    assert_eq!(timing.estimates.len(), 1);
    assert_eq!(timing.estimates[0].cycle, 11);
}

#[test]
fn test_noisy_divisions() {
    let mut rng = StdRng::seed_from_u64(20_251_019);
    let noise = Normal::new(0.0, 0.02).unwrap();

    let mut builder = EmbryoBuilder::new();
    let mut truth = Vec::new();
    for k in 0..20u32 {
        let division_frame = 50 + k % 4;
        let mother = builder.add_division(
            [15.0 * k as f64, 3.0, -2.0],
            42,
            division_frame,
            5,
            quadratic_separation,
            |_| noise.sample(&mut rng),
        );
        truth.push((mother, common::frame_time(division_frame)));
    }
    let table = resolve(builder.build());

    let params = DivisionParams::default();
    let timing = time_divisions(&table, &params).unwrap();

    let template = timing.templates[&12].as_ref().unwrap();
    assert_abs_diff_eq!(template.a, 4.0, epsilon = 0.3);
    assert_abs_diff_eq!(template.c, 1.0, epsilon = 0.05);

    assert_eq!(timing.estimates.len(), truth.len());
    for (mother, true_time) in truth {
        let tid = table.get(mother).unwrap().tracklet_id.unwrap();
        let estimate = timing
            .estimates
            .iter()
            .find(|e| e.tracklet_id == tid)
            .unwrap();
        assert_abs_diff_eq!(estimate.corrected_division_time, true_time, epsilon = 0.08);
    }
}

/// A record claiming a parent at its own frame is cut from the lineage; the other
/// divisions of the dataset are still timed.
#[test]
fn test_same_frame_parent_does_not_drop_dataset() {
    let embryo = |with_bad_record: bool| {
        let mut builder = EmbryoBuilder::new();
        for k in 0..4 {
            builder.add_clean_division([6.0 * k as f64, 0.0, 1.0], 30, 50 + k, 6, quadratic_separation);
        }
        if with_bad_record {
            // spot 0 is the first detection of the first mother, at frame 30
            builder.add_record(SpotRecord::new(99_999, 30, [80.0, 0.0, 1.0], Some(0), 0, frame_time(30)));
        }
        Dataset::new("embryo", builder.build(), embryo_metadata())
    };

    let clean = process_dataset(embryo(false), &PipelineParams::default()).unwrap();
    let report = process_dataset(embryo(true), &PipelineParams::default()).unwrap();

    assert_eq!(report.tracklets.non_causal_parents, 1);
    assert_eq!(report.tracklets.promoted_children, 0);
    assert_eq!(report.tracklets.n_tracklets, clean.tracklets.n_tracklets + 1);

    let bad = report.spots.get(99_999).unwrap();
    assert!(bad.is_child);
    assert_eq!(bad.prev_tracklet_id, None);
    assert!(bad.displacement.is_none());

    assert_eq!(report.timing.estimates.len(), 4);
    for (a, b) in clean.timing.estimates.iter().zip(&report.timing.estimates) {
        assert_eq!(a.tracklet_id, b.tracklet_id);
        assert_abs_diff_eq!(a.corrected_division_time, b.corrected_division_time, epsilon = 1e-12);
    }
}
