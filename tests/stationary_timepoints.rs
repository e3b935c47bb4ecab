use approx::assert_relative_eq;

use divtrack::constants::{Cycle, Frame};
use divtrack::pipeline::{process_dataset, Dataset, PipelineParams};
use divtrack::spots::Displacement;
use divtrack::timepoints::{find_stationary_timepoints, StationaryParams};
use divtrack::{SpotRecord, SpotTable};

mod common;
use common::{embryo_metadata, quadratic_separation, EmbryoBuilder};

fn moving_spot(id: u64, frame: Frame, cycle: Cycle, dtot: f64) -> SpotRecord {
    let mut spot = SpotRecord::new(id, frame, [id as f64, 0.0, 0.0], None, 0, frame as f64 * 0.5);
    spot.cycle = Some(cycle);
    spot.tracklet_id = Some(id as u32 + 1);
    spot.displacement = Some(Displacement {
        dx: dtot,
        dy: 0.0,
        dz: 0.0,
        d_ap: 0.0,
        d_theta: 0.0,
        dtot,
        d_ap_abs: 0.0,
    });
    spot
}

/// Cycle 12 over frames 0..=30 with 10 nuclei per frame, except frames 5 and 6 (7 nuclei,
/// active division). Motion is lowest at frames 5-6 and low over frames 16-20.
fn cycle_with_division_wave() -> SpotTable {
    let mut spots = Vec::new();
    let mut id = 0;
    for frame in 0..=30 {
        let (count, dtot) = match frame {
            5 | 6 => (7, 0.0),
            16..=20 => (10, 0.1),
            _ => (10, 1.0),
        };
        for _ in 0..count {
            spots.push(moving_spot(id, frame, 12, dtot));
            id += 1;
        }
    }
    SpotTable::new(spots).unwrap()
}

#[test]
fn test_stationary_frame_skips_division_wave() {
    let table = cycle_with_division_wave();
    let timepoints = find_stationary_timepoints(&table, &StationaryParams::default());

    assert_eq!(timepoints.len(), 1);
    let tp = timepoints[0];
    assert_eq!(tp.cycle, 12);
    assert_eq!(tp.frame, 20);
    assert_relative_eq!(tp.time, 10.0);
}

#[test]
fn test_stationary_frame_with_short_window() {
    let table = cycle_with_division_wave();
    let params = StationaryParams::builder()
        .rolling_window(1)
        .cycles(12..=12)
        .build()
        .unwrap();
    let timepoints = find_stationary_timepoints(&table, &params);
    assert_eq!(timepoints[0].frame, 16);
}

#[test]
fn test_pipeline_snapshot_at_stationary_frames() {
    let mut builder = EmbryoBuilder::new();
    for k in 0..6 {
        builder.add_clean_division([8.0 * k as f64, 1.0, 0.0], 30, 50, 12, quadratic_separation);
    }
    let report = process_dataset(
        Dataset::new("snapshot", builder.build(), embryo_metadata()),
        &PipelineParams::default(),
    )
    .unwrap();

    assert!(!report.stationary.is_empty());
    let frames: Vec<Frame> = report.stationary.iter().map(|tp| tp.frame).collect();
    assert!(report.snapshot.iter().all(|r| frames.contains(&r.spot.frame)));

    for row in &report.snapshot {
        if let Some(mother) = row.prev_tracklet_id {
            assert_eq!(row.spot.prev_tracklet_id, Some(mother));
            assert!(row.spot.is_child || row.spot.time_since_division.unwrap() > 0.0);
            // the mother tracklet is captured at the previous cycle's stationary frame
            let prev = report.spots.get(row.prev_id.unwrap()).unwrap();
            assert_eq!(prev.tracklet_id, Some(mother));
        }
        // several nuclei share every stationary frame
        assert!(row.first_neighbor_distance.unwrap() > 0.0);
    }
}
