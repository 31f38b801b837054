//! The histogram sets filled by each analysis mode.

use crate::{
    AnalysisMode, CoincidenceWindows, EnergyBinning, MultiplicityMap,
    pairing::{cross_talk_pairs, gamma_gamma_pairs},
};
use griffin_common::{
    Axis, ChannelIndex, CrystalPair, DetectorId, EventFrame, Hist1DId, Hist2DId, HistogramError,
    HistogramSink, NUM_CHANNELS, NUM_DETECTORS, SpectrumArrayId,
    metrics::{
        names::PAIRS_FILLED,
        pair_kind::{self, PairKind},
    },
};
use metrics::counter;
use serde::Serialize;
use std::ops::AddAssign;

/// Pairs filled, by kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PairCounts {
    pub cross_talk: u64,
    pub prompt: u64,
    pub back_to_back: u64,
    pub time_random: u64,
}

impl PairCounts {
    pub fn total(&self) -> u64 {
        self.cross_talk + self.prompt + self.back_to_back + self.time_random
    }

    pub(crate) fn record_metrics(&self) {
        for (kind, count) in [
            (PairKind::CrossTalk, self.cross_talk),
            (PairKind::Prompt, self.prompt),
            (PairKind::BackToBack, self.back_to_back),
            (PairKind::TimeRandom, self.time_random),
        ] {
            if count > 0 {
                counter!(PAIRS_FILLED, &[pair_kind::get_label(kind)]).increment(count);
            }
        }
    }
}

impl AddAssign for PairCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.cross_talk += rhs.cross_talk;
        self.prompt += rhs.prompt;
        self.back_to_back += rhs.back_to_back;
        self.time_random += rhs.time_random;
    }
}

/// A fixed set of histograms and the per-event logic that fills it.
pub trait FrameAnalysis: Sized + Sync {
    const MODE: AnalysisMode;

    /// Declares every histogram of the layout in `sink`.
    fn declare(sink: &mut HistogramSink, binning: &EnergyBinning) -> Result<Self, HistogramError>;

    /// Fills `sink` from one event. Energies are the hits' corrected energies.
    fn fill(
        &self,
        frame: &EventFrame,
        windows: &CoincidenceWindows,
        sink: &mut HistogramSink,
    ) -> PairCounts;
}

/// One matrix per clover and crystal pair, `det_<detector>_<low>_<high>`,
/// indexed by [`CrystalPair::matrix_index`].
#[derive(Debug, Clone)]
pub struct CrossTalkLayout {
    matrices: Vec<Hist2DId>,
}

impl CrossTalkLayout {
    pub fn matrix_name(detector: DetectorId, pair: CrystalPair) -> String {
        format!("det_{}_{}_{}", detector, pair.low(), pair.high())
    }

    pub fn matrix(&self, detector: DetectorId, pair: CrystalPair) -> Option<Hist2DId> {
        self.matrices.get(pair.matrix_index(detector)).copied()
    }
}

impl FrameAnalysis for CrossTalkLayout {
    const MODE: AnalysisMode = AnalysisMode::CrossTalk;

    fn declare(sink: &mut HistogramSink, binning: &EnergyBinning) -> Result<Self, HistogramError> {
        let axis = binning.axis()?;
        let matrices = DetectorId::all()
            .flat_map(|detector| CrystalPair::all().map(move |pair| (detector, pair)))
            .map(|(detector, pair)| sink.declare_2d(&Self::matrix_name(detector, pair), axis, axis))
            .collect::<Result<_, _>>()?;
        Ok(Self { matrices })
    }

    fn fill(
        &self,
        frame: &EventFrame,
        windows: &CoincidenceWindows,
        sink: &mut HistogramSink,
    ) -> PairCounts {
        let multiplicity = MultiplicityMap::from_frame(frame);
        let mut counts = PairCounts::default();
        for pair in cross_talk_pairs(frame, &multiplicity, windows.cross_talk_max_dt) {
            if let Some(&id) = self.matrices.get(pair.matrix_index()) {
                sink.fill_2d(id, pair.low.corrected_energy, pair.high.corrected_energy);
                counts.cross_talk += 1;
            }
        }
        counts
    }
}

/// Addback fragment multiplicities with their own spectrum.
const MAX_FRAGMENTS: usize = 4;

/// Singles, addback and gamma-gamma histograms used to build calibrations.
#[derive(Debug, Clone)]
pub struct CalMatricesLayout {
    singles_total: Hist1DId,
    singles_vs_crystal: Hist2DId,
    singles: Vec<Hist1DId>,
    addback_total: Hist1DId,
    addback_vs_detector: Hist2DId,
    addback: Vec<Hist1DId>,
    addback_fragments: Hist1DId,
    addback_by_fragments: SpectrumArrayId,
    gg: Hist2DId,
    gg_sum: Hist2DId,
    gg_time_random: Hist2DId,
    gg_time_difference: Hist1DId,
    time_in_run: Hist1DId,
}

impl CalMatricesLayout {
    pub const SINGLES_TOTAL: &'static str = "Singles_total";
    pub const SINGLES_VS_CRYSTAL: &'static str = "Singles_vs_Crystal";
    pub const ADDBACK_TOTAL: &'static str = "Addback_total";
    pub const ADDBACK_VS_DETECTOR: &'static str = "Addback_vs_Detector";
    pub const ADDBACK_FRAGMENTS: &'static str = "Addback_fragments";
    pub const ADDBACK_BY_FRAGMENTS: &'static str = "Addback_by_fragments";
    pub const GAMMA_GAMMA: &'static str = "gg";
    pub const GAMMA_GAMMA_180: &'static str = "ggsummat";
    pub const GAMMA_GAMMA_TIME_RANDOM: &'static str = "ggbg";
    pub const GAMMA_GAMMA_TIME_DIFFERENCE: &'static str = "ggTimeDiff";
    pub const TIME_IN_RUN: &'static str = "timeinrun";

    pub fn singles_name(channel: ChannelIndex) -> String {
        format!("Singles_{channel}")
    }

    pub fn addback_name(detector: DetectorId) -> String {
        format!("Addback_{:02}", detector.index())
    }
}

impl FrameAnalysis for CalMatricesLayout {
    const MODE: AnalysisMode = AnalysisMode::GammaGamma;

    fn declare(sink: &mut HistogramSink, binning: &EnergyBinning) -> Result<Self, HistogramError> {
        let energy = binning.axis()?;
        let crystals = Axis::new(NUM_CHANNELS, 0.0, NUM_CHANNELS as f64)?;
        let detectors = Axis::new(NUM_DETECTORS as usize, 0.0, NUM_DETECTORS as f64)?;

        let singles_total = sink.declare_1d(Self::SINGLES_TOTAL, energy)?;
        let singles_vs_crystal = sink.declare_2d(Self::SINGLES_VS_CRYSTAL, crystals, energy)?;
        let addback_total = sink.declare_1d(Self::ADDBACK_TOTAL, energy)?;
        let addback_vs_detector = sink.declare_2d(Self::ADDBACK_VS_DETECTOR, detectors, energy)?;
        let gg_sum = sink.declare_2d(Self::GAMMA_GAMMA_180, energy, energy)?;
        let singles = ChannelIndex::all()
            .map(|channel| sink.declare_1d(&Self::singles_name(channel), energy))
            .collect::<Result<_, _>>()?;
        let addback = DetectorId::all()
            .map(|detector| sink.declare_1d(&Self::addback_name(detector), energy))
            .collect::<Result<_, _>>()?;
        let addback_fragments = sink.declare_1d(
            Self::ADDBACK_FRAGMENTS,
            Axis::new(2 * MAX_FRAGMENTS, 0.0, 2.0 * MAX_FRAGMENTS as f64)?,
        )?;
        let addback_by_fragments =
            sink.declare_array(Self::ADDBACK_BY_FRAGMENTS, 1, MAX_FRAGMENTS, energy)?;
        let gg = sink.declare_2d(Self::GAMMA_GAMMA, energy, energy)?;
        let gg_time_random = sink.declare_2d(Self::GAMMA_GAMMA_TIME_RANDOM, energy, energy)?;
        let gg_time_difference = sink.declare_1d(
            Self::GAMMA_GAMMA_TIME_DIFFERENCE,
            Axis::new(2000, 0.0, 4000.0)?,
        )?;
        let time_in_run = sink.declare_1d(Self::TIME_IN_RUN, Axis::new(1000, 0.0, 6.0e12)?)?;

        Ok(Self {
            singles_total,
            singles_vs_crystal,
            singles,
            addback_total,
            addback_vs_detector,
            addback,
            addback_fragments,
            addback_by_fragments,
            gg,
            gg_sum,
            gg_time_random,
            gg_time_difference,
            time_in_run,
        })
    }

    fn fill(
        &self,
        frame: &EventFrame,
        windows: &CoincidenceWindows,
        sink: &mut HistogramSink,
    ) -> PairCounts {
        for hit in frame.hits.iter().filter(|hit| hit.is_good()) {
            sink.fill_1d(self.time_in_run, hit.timestamp);
            let channel = hit.channel().get();
            sink.fill_1d(self.singles_total, hit.corrected_energy);
            sink.fill_2d(self.singles_vs_crystal, channel as f64, hit.corrected_energy);
            if let Some(&id) = self.singles.get(channel) {
                sink.fill_1d(id, hit.corrected_energy);
            }
        }

        for addback in frame.good_addbacks() {
            let detector = addback.detector.index();
            sink.fill_1d(self.addback_total, addback.energy);
            sink.fill_2d(self.addback_vs_detector, detector as f64, addback.energy);
            if let Some(&id) = self.addback.get(detector) {
                sink.fill_1d(id, addback.energy);
            }
            sink.fill_1d(self.addback_fragments, addback.fragments as f64);
            sink.fill_array(
                self.addback_by_fragments,
                addback.fragments.into(),
                addback.energy,
            );
        }

        let mut counts = PairCounts::default();
        for pair in gamma_gamma_pairs(frame) {
            let dt = pair.time_difference();
            let (e1, e2) = pair.energies();
            sink.fill_1d(self.gg_time_difference, dt);
            if windows.prompt.contains(dt) {
                // Both orderings, so the matrices come out symmetric.
                sink.fill_2d(self.gg, e1, e2);
                sink.fill_2d(self.gg, e2, e1);
                counts.prompt += 1;
                if pair.opening_angle() > windows.back_to_back_angle {
                    sink.fill_2d(self.gg_sum, e1, e2);
                    sink.fill_2d(self.gg_sum, e2, e1);
                    counts.back_to_back += 1;
                }
            } else if windows.time_random.contains(dt) {
                sink.fill_2d(self.gg_time_random, e1, e2);
                sink.fill_2d(self.gg_time_random, e2, e1);
                counts.time_random += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use griffin_common::{AddbackHit, CrystalId, Hit, QualityFlag, geometry};

    const SMALL: EnergyBinning = EnergyBinning::new(100, 0.0, 2000.0);

    fn hit(detector: u8, crystal: u8, energy: f64, time: f64) -> Hit {
        Hit::new(
            DetectorId::new(detector).unwrap(),
            CrystalId::new(crystal).unwrap(),
            energy,
            time,
            QualityFlag::Good,
        )
    }

    fn cross_talk() -> (HistogramSink, CrossTalkLayout) {
        let mut sink = HistogramSink::new();
        let layout = CrossTalkLayout::declare(&mut sink, &SMALL).unwrap();
        (sink, layout)
    }

    fn cal_matrices() -> (HistogramSink, CalMatricesLayout) {
        let mut sink = HistogramSink::new();
        let layout = CalMatricesLayout::declare(&mut sink, &SMALL).unwrap();
        (sink, layout)
    }

    #[test]
    fn cross_talk_matrix_names() {
        let (sink, _) = cross_talk();
        assert_eq!(sink.len(), 96);
        let names: Vec<_> = sink.iter().map(|(name, _)| name.to_owned()).collect();
        assert_eq!(names.first().map(String::as_str), Some("det_1_0_1"));
        assert_eq!(names.get(12).map(String::as_str), Some("det_3_0_1"));
        assert_eq!(names.get(17).map(String::as_str), Some("det_3_2_3"));
        assert_eq!(names.last().map(String::as_str), Some("det_16_2_3"));
    }

    #[test]
    fn cross_talk_fills_low_crystal_on_x() {
        let (mut sink, layout) = cross_talk();
        let frame = EventFrame::new(vec![hit(3, 1, 480.0, 1000.0), hit(3, 0, 500.0, 1100.0)], vec![]);
        let counts = layout.fill(&frame, &CoincidenceWindows::default(), &mut sink);
        assert_eq!(counts.cross_talk, 1);

        let matrix = sink.get_2d("det_3_0_1").unwrap();
        assert_eq!(matrix.content_at(500.0, 480.0), 1);
        assert_eq!(matrix.integral(), 1);
        let total: u64 = sink
            .iter()
            .filter_map(|(name, _)| sink.get_2d(name))
            .map(|matrix| matrix.integral())
            .sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn cross_talk_ignores_same_crystal() {
        let (mut sink, layout) = cross_talk();
        let frame = EventFrame::new(vec![hit(5, 2, 300.0, 0.0), hit(5, 2, 310.0, 10.0)], vec![]);
        let counts = layout.fill(&frame, &CoincidenceWindows::default(), &mut sink);
        assert_eq!(counts.total(), 0);
    }

    #[test]
    fn singles_and_time_in_run() {
        let (mut sink, layout) = cal_matrices();
        let mut pileup = hit(2, 3, 700.0, 2.0e12);
        pileup.quality = QualityFlag::Pileup;
        let frame = EventFrame::new(vec![hit(2, 1, 511.0, 1.0e12), pileup], vec![]);
        layout.fill(&frame, &CoincidenceWindows::default(), &mut sink);

        let time_in_run = sink.get_1d("timeinrun").unwrap();
        assert_eq!(time_in_run.integral(), 1);
        assert_eq!(time_in_run.content_at(2.0e12), 0);
        assert_eq!(sink.get_1d("Singles_total").unwrap().integral(), 1);
        assert_eq!(sink.get_1d("Singles_05").unwrap().content_at(511.0), 1);
        assert_eq!(sink.get_1d("Singles_07").unwrap().integral(), 0);
        assert_eq!(
            sink.get_2d("Singles_vs_Crystal")
                .unwrap()
                .content_at(5.0, 511.0),
            1
        );
    }

    #[test]
    fn addback_spectra() {
        let (mut sink, layout) = cal_matrices();
        let detector = DetectorId::new(4).unwrap();
        let addback = |energy, fragments, quality| AddbackHit {
            detector,
            energy,
            timestamp: 0.0,
            fragments,
            quality,
        };
        let frame = EventFrame::new(
            vec![],
            vec![
                addback(1332.0, 2, QualityFlag::Good),
                addback(900.0, 1, QualityFlag::Pileup),
            ],
        );
        layout.fill(&frame, &CoincidenceWindows::default(), &mut sink);

        assert_eq!(sink.get_1d("Addback_total").unwrap().integral(), 1);
        assert_eq!(sink.get_1d("Addback_03").unwrap().content_at(1332.0), 1);
        assert_eq!(
            sink.get_2d("Addback_vs_Detector")
                .unwrap()
                .content_at(3.0, 1332.0),
            1
        );
        assert_eq!(sink.get_1d("Addback_fragments").unwrap().content_at(2.0), 1);
        let by_fragments = sink.get_array("Addback_by_fragments").unwrap();
        assert_eq!(by_fragments.spectrum(2).unwrap().integral(), 1);
        assert_eq!(by_fragments.spectrum(1).unwrap().integral(), 0);
    }

    #[test]
    fn gamma_gamma_is_symmetric() {
        let (mut sink, layout) = cal_matrices();
        let frame = EventFrame::new(vec![hit(1, 0, 1173.0, 0.0), hit(9, 2, 1332.0, 100.0)], vec![]);
        let counts = layout.fill(&frame, &CoincidenceWindows::default(), &mut sink);
        assert_eq!(counts.prompt, 1);

        let gg = sink.get_2d("gg").unwrap();
        assert_eq!(gg.content_at(1173.0, 1332.0), 1);
        assert_eq!(gg.content_at(1332.0, 1173.0), 1);
        assert_eq!(gg.integral(), 2);
        assert_eq!(sink.get_1d("ggTimeDiff").unwrap().content_at(100.0), 1);
    }

    #[test]
    fn gamma_gamma_window_excludes_350() {
        let (mut sink, layout) = cal_matrices();
        let frame = EventFrame::new(vec![hit(1, 0, 100.0, 0.0), hit(2, 0, 200.0, 350.0)], vec![]);
        let counts = layout.fill(&frame, &CoincidenceWindows::default(), &mut sink);
        assert_eq!(counts.prompt, 0);
        assert_eq!(sink.get_2d("gg").unwrap().integral(), 0);
    }

    #[test]
    fn time_random_window() {
        let (mut sink, layout) = cal_matrices();
        let frame = EventFrame::new(vec![hit(1, 0, 100.0, 0.0), hit(2, 0, 200.0, 1500.0)], vec![]);
        let counts = layout.fill(&frame, &CoincidenceWindows::default(), &mut sink);
        assert_eq!(counts.time_random, 1);
        assert_eq!(sink.get_2d("ggbg").unwrap().integral(), 2);
    }

    #[test]
    fn back_to_back_gate() {
        let (mut sink, layout) = cal_matrices();
        let near = hit(1, 0, 511.0, 0.0);
        let opposite = hit(15, 1, 511.0, 0.0);
        assert!(geometry::opening_angle(&near.position, &opposite.position) > 3.13);

        let frame = EventFrame::new(vec![near.clone(), hit(1, 1, 600.0, 0.0)], vec![]);
        let counts = layout.fill(&frame, &CoincidenceWindows::default(), &mut sink);
        assert_eq!(counts.back_to_back, 0);

        let frame = EventFrame::new(vec![near, opposite], vec![]);
        let counts = layout.fill(&frame, &CoincidenceWindows::default(), &mut sink);
        assert_eq!(counts.back_to_back, 1);
        assert_eq!(sink.get_2d("ggsummat").unwrap().content_at(511.0, 511.0), 2);
    }
}
