pub mod event;
pub mod geometry;
pub mod histogram;
pub mod ids;
pub mod metrics;
pub mod residuals;
pub mod source;

pub use event::{AddbackHit, EventFrame, Hit, QualityFlag};
pub use histogram::{
    Axis, AxisBin, Count, Hist1DId, Hist2DId, Histogram1D, Histogram2D, HistogramError, HistogramRef,
    HistogramSink, SpectrumArray, SpectrumArrayId,
};
pub use ids::{ChannelIndex, CrystalId, CrystalPair, DetectorId, IdError};
pub use residuals::{EnergyResidualTable, Interpolation, InterpolationError};
pub use source::{EventIndexError, EventSource, VecEventSource};

/// Energies are in keV.
pub type Energy = f64;
/// Timestamps are in ns.
pub type Time = f64;
pub type FragmentCount = u32;

pub const NUM_DETECTORS: u8 = 16;
pub const CRYSTALS_PER_DETECTOR: u8 = 4;
pub const NUM_CHANNELS: usize = NUM_DETECTORS as usize * CRYSTALS_PER_DETECTOR as usize;
pub const NUM_CRYSTAL_PAIRS: usize = 6;
pub const NUM_CROSS_TALK_MATRICES: usize = NUM_DETECTORS as usize * NUM_CRYSTAL_PAIRS;

/// Events between two progress reports in the sorting loops.
pub const PROGRESS_INTERVAL: usize = 10_000;
