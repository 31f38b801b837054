use crate::{
    AnalysisError, AnalysisMode, AnalysisSettings, CalMatricesLayout, CoincidenceWindows,
    CrossTalkLayout, FrameAnalysis, PairCounts,
};
use griffin_common::{
    EnergyResidualTable, EventFrame, EventSource, HistogramError, HistogramSink,
    PROGRESS_INTERVAL,
    metrics::{
        failures::{self, FailureKind},
        names::{EVENTS_FAILED, EVENTS_PROCESSED},
    },
};
use metrics::counter;
use rayon::prelude::*;
use serde::Serialize;
use std::{borrow::Cow, ops::AddAssign, time::Instant};
use tracing::{debug, info, info_span};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub events: usize,
    pub pairs: PairCounts,
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.events += rhs.events;
        self.pairs += rhs.pairs;
    }
}

/// Corrects a frame's energies and fills the layout from it.
fn process_frame<L: FrameAnalysis>(
    layout: &L,
    frame: &EventFrame,
    table: &EnergyResidualTable,
    windows: &CoincidenceWindows,
    sink: &mut HistogramSink,
) -> PairCounts {
    let frame = if table.is_empty() {
        Cow::Borrowed(frame)
    } else {
        let mut frame = frame.clone();
        frame.apply_residuals(table);
        Cow::Owned(frame)
    };
    layout.fill(&frame, windows, sink)
}

/// Sorts the entries of `source` selected by `settings` into a fresh sink
/// laid out for `settings.mode`.
///
/// Events are processed strictly in source order. A read failure aborts the
/// run.
#[tracing::instrument(skip_all, fields(mode = %settings.mode, num_entries = source.len()))]
pub fn run_coincidence_analysis<S: EventSource>(
    source: &mut S,
    table: &EnergyResidualTable,
    settings: &AnalysisSettings,
) -> Result<(HistogramSink, RunSummary), AnalysisError> {
    match settings.mode {
        AnalysisMode::CrossTalk => run_source::<CrossTalkLayout, S>(source, table, settings),
        AnalysisMode::GammaGamma => run_source::<CalMatricesLayout, S>(source, table, settings),
    }
}

fn run_source<L: FrameAnalysis, S: EventSource>(
    source: &mut S,
    table: &EnergyResidualTable,
    settings: &AnalysisSettings,
) -> Result<(HistogramSink, RunSummary), AnalysisError> {
    let mut sink = HistogramSink::new();
    let layout = L::declare(&mut sink, &settings.binning())?;
    debug!("Declared {} histograms for {}", sink.len(), L::MODE);

    if !table.is_empty() {
        info!("Correcting energies with residuals for {} channels", table.len());
    }

    let entries = settings.entries(source.len());
    let last = entries.end;
    info!("Sorting entries {} to {}", entries.start, last);

    let start = Instant::now();
    let mut summary = RunSummary::default();
    for index in entries {
        let mut frame = source.event(index).map_err(|e| {
            counter!(
                EVENTS_FAILED,
                &[failures::get_label(FailureKind::EventReadFailed)]
            )
            .increment(1);
            AnalysisError::Source {
                index,
                source: Box::new(e),
            }
        })?;
        frame.apply_residuals(table);
        let pairs = layout.fill(&frame, &settings.windows, &mut sink);
        summary += RunSummary { events: 1, pairs };
        counter!(EVENTS_PROCESSED).increment(1);

        if index % PROGRESS_INTERVAL == 0 {
            info!(
                "Processing event {index} of {last}, {:.1}% done, {:.1?} elapsed",
                100.0 * index as f64 / last as f64,
                start.elapsed()
            );
        }
    }
    summary.pairs.record_metrics();
    info!(
        "Sorted {} events into {} pairs in {:.1?}",
        summary.events,
        summary.pairs.total(),
        start.elapsed()
    );
    Ok((sink, summary))
}

/// Sorts in-memory frames on the current thread.
pub fn analyse_frames(
    frames: &[EventFrame],
    table: &EnergyResidualTable,
    settings: &AnalysisSettings,
) -> Result<(HistogramSink, RunSummary), AnalysisError> {
    match settings.mode {
        AnalysisMode::CrossTalk => run_frames::<CrossTalkLayout>(frames, table, settings),
        AnalysisMode::GammaGamma => run_frames::<CalMatricesLayout>(frames, table, settings),
    }
}

fn run_frames<L: FrameAnalysis>(
    frames: &[EventFrame],
    table: &EnergyResidualTable,
    settings: &AnalysisSettings,
) -> Result<(HistogramSink, RunSummary), AnalysisError> {
    let mut sink = HistogramSink::new();
    let layout = L::declare(&mut sink, &settings.binning())?;
    let mut summary = RunSummary::default();
    for frame in frames.get(settings.entries(frames.len())).unwrap_or_default() {
        let pairs = process_frame(&layout, frame, table, &settings.windows, &mut sink);
        summary += RunSummary { events: 1, pairs };
    }
    counter!(EVENTS_PROCESSED).increment(summary.events as u64);
    summary.pairs.record_metrics();
    Ok((sink, summary))
}

/// Sorts in-memory frames on the rayon pool.
///
/// Each worker fills its own copy of the layout and the copies are merged bin
/// by bin, so the result equals that of [`analyse_frames`].
pub fn analyse_frames_parallel(
    frames: &[EventFrame],
    table: &EnergyResidualTable,
    settings: &AnalysisSettings,
) -> Result<(HistogramSink, RunSummary), AnalysisError> {
    match settings.mode {
        AnalysisMode::CrossTalk => run_frames_parallel::<CrossTalkLayout>(frames, table, settings),
        AnalysisMode::GammaGamma => {
            run_frames_parallel::<CalMatricesLayout>(frames, table, settings)
        }
    }
}

fn run_frames_parallel<L: FrameAnalysis>(
    frames: &[EventFrame],
    table: &EnergyResidualTable,
    settings: &AnalysisSettings,
) -> Result<(HistogramSink, RunSummary), AnalysisError> {
    let span = info_span!("analyse_frames_parallel", mode = %L::MODE);
    let _guard = span.enter();

    let mut template = HistogramSink::new();
    let layout = L::declare(&mut template, &settings.binning())?;
    let frames = frames
        .get(settings.entries(frames.len()))
        .unwrap_or_default();
    info!(
        "Sorting {} events on {} threads",
        frames.len(),
        rayon::current_num_threads()
    );

    let merged = frames
        .par_iter()
        .fold(
            || (template.clone(), RunSummary::default()),
            |(mut sink, mut summary), frame| {
                let pairs = process_frame(&layout, frame, table, &settings.windows, &mut sink);
                summary += RunSummary { events: 1, pairs };
                (sink, summary)
            },
        )
        .map(Ok::<_, HistogramError>)
        .try_reduce_with(|(mut sink, mut summary), (other, other_summary)| {
            sink.merge(&other)?;
            summary += other_summary;
            Ok((sink, summary))
        })
        .transpose()?;

    let (sink, summary) = merged.unwrap_or((template, RunSummary::default()));
    counter!(EVENTS_PROCESSED).increment(summary.events as u64);
    summary.pairs.record_metrics();
    Ok((sink, summary))
}
