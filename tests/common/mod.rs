#![allow(dead_code)]

use std::collections::BTreeMap;

use divtrack::constants::{Frame, SpotId, TrackletId};
use divtrack::{DatasetMetadata, SpotRecord, SpotTable};

/// Time between two frames, in `time_since_nc11` units.
pub const FRAME_TIME: f64 = 0.2;

/// Seconds per frame written to the synthetic metadata.
pub const SECONDS_PER_FRAME: f64 = 12.0;

pub fn frame_time(frame: Frame) -> f64 {
    frame as f64 * FRAME_TIME
}

/// Boundaries such that tracklets starting in `[20, 45)` are cycle 11, `[45, 100)` cycle 12
/// and `[100, 200)` cycle 13.
pub fn embryo_metadata() -> DatasetMetadata {
    DatasetMetadata::new(vec![0, 20, 45, 100, 200], SECONDS_PER_FRAME)
}

/// Builds synthetic spot tables made of isolated divisions.
#[derive(Default)]
pub struct EmbryoBuilder {
    spots: Vec<SpotRecord>,
    next_id: SpotId,
}

impl EmbryoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, frame: Frame, position: [f64; 3], parent: Option<SpotId>, n_children: u8) -> SpotId {
        let id = self.next_id;
        self.next_id += 1;
        self.spots.push(
            SpotRecord::new(id, frame, position, parent, n_children, frame_time(frame))
                .with_body_axis(position[0] / 100.0, position[1] / 100.0),
        );
        id
    }

    /// Add a mother nucleus tracked from `start` to `division_frame - 1`, whose last
    /// detection divides into two daughters tracked for `daughter_frames` frames.
    ///
    /// The daughters are placed symmetrically along `x` around `origin`, `separation(t)`
    /// apart, `t` being the time since their first detection. `jitter(k)` is added to the
    /// `x` of the `k`-th daughter detection.
    pub fn add_division(
        &mut self,
        origin: [f64; 3],
        start: Frame,
        division_frame: Frame,
        daughter_frames: u32,
        separation: impl Fn(f64) -> f64,
        mut jitter: impl FnMut(usize) -> f64,
    ) -> SpotId {
        let mut parent = None;
        for frame in start..division_frame {
            let n_children = if frame + 1 == division_frame { 2 } else { 1 };
            parent = Some(self.push(frame, origin, parent, n_children));
        }
        let mother_last = parent;

        let mut k = 0;
        for sign in [1.0, -1.0] {
            let mut parent = mother_last;
            for step in 0..daughter_frames {
                let frame = division_frame + step;
                let t = step as f64 * FRAME_TIME;
                let x = origin[0] + sign * separation(t) / 2.0 + jitter(k);
                k += 1;
                let n_children = if step + 1 == daughter_frames { 0 } else { 1 };
                parent = Some(self.push(frame, [x, origin[1], origin[2]], parent, n_children));
            }
        }
        mother_last.unwrap_or_default()
    }

    /// Same as [`add_division`](Self::add_division) without jitter.
    pub fn add_clean_division(
        &mut self,
        origin: [f64; 3],
        start: Frame,
        division_frame: Frame,
        daughter_frames: u32,
        separation: impl Fn(f64) -> f64,
    ) -> SpotId {
        self.add_division(origin, start, division_frame, daughter_frames, separation, |_| 0.0)
    }

    /// Append a hand-made record, e.g. one with an inconsistent parent.
    pub fn add_record(&mut self, spot: SpotRecord) {
        self.next_id = self.next_id.max(spot.id + 1);
        self.spots.push(spot);
    }

    pub fn build(self) -> SpotTable {
        SpotTable::new(self.spots).unwrap()
    }
}

/// Separation law of the synthetic divisions.
pub fn quadratic_separation(t: f64) -> f64 {
    4.0 * t * t + 1.0
}

/// Records grouped by tracklet id.
pub fn tracklet_groups(table: &SpotTable) -> BTreeMap<TrackletId, Vec<&SpotRecord>> {
    let mut groups: BTreeMap<TrackletId, Vec<&SpotRecord>> = BTreeMap::new();
    for spot in table.iter() {
        groups.entry(spot.tracklet_id.unwrap()).or_default().push(spot);
    }
    for members in groups.values_mut() {
        members.sort_by_key(|s| s.frame);
    }
    groups
}
