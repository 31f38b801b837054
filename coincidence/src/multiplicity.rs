use griffin_common::{DetectorId, EventFrame, NUM_DETECTORS};

/// Good-hit count per detector for one event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MultiplicityMap {
    counts: [u32; NUM_DETECTORS as usize],
}

impl MultiplicityMap {
    pub fn from_frame(frame: &EventFrame) -> Self {
        let mut map = Self::default();
        for hit in frame.good_hits() {
            if let Some(count) = map.counts.get_mut(hit.detector.index()) {
                *count += 1;
            }
        }
        map
    }

    pub fn get(&self, detector: DetectorId) -> u32 {
        self.counts
            .get(detector.index())
            .copied()
            .unwrap_or_default()
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}
