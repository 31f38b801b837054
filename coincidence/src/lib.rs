//! Per-event hit correlation and histogram filling.
//!
//! Each event is reduced to a [`MultiplicityMap`], its Good hits are paired
//! under the timing rules of the selected [`AnalysisMode`], and accepted pairs
//! are streamed straight into a [`griffin_common::HistogramSink`] through a
//! pre-declared layout.

mod analysis;
mod error;
pub mod layout;
mod multiplicity;
pub mod pairing;
mod settings;

pub use analysis::{analyse_frames, analyse_frames_parallel, run_coincidence_analysis, RunSummary};
pub use error::AnalysisError;
pub use layout::{CalMatricesLayout, CrossTalkLayout, FrameAnalysis, PairCounts};
pub use multiplicity::MultiplicityMap;
pub use settings::{AnalysisMode, AnalysisSettings, CoincidenceWindows, EnergyBinning, TimeWindow};
