use metrics::{describe_gauge, gauge};

pub fn component_info_metric(name: &'static str) {
    static NAME: &str = "griffin_sort_component_info";

    describe_gauge!(NAME, "Basic information about the component");

    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("unknown");
    gauge!(NAME, "component" => name, "version" => version).set(1);
}

pub mod names {
    use const_format::concatcp;

    pub const METRIC_NAME_PREFIX: &str = "griffin_sort_";

    pub const EVENTS_PROCESSED: &str = concatcp!(METRIC_NAME_PREFIX, "events_processed");
    pub const EVENTS_FAILED: &str = concatcp!(METRIC_NAME_PREFIX, "events_failed");
    pub const PAIRS_FILLED: &str = concatcp!(METRIC_NAME_PREFIX, "pairs_filled");
    pub const PEAKS_SKIPPED: &str = concatcp!(METRIC_NAME_PREFIX, "peaks_skipped");
    pub const CHANNEL_FAILURES: &str = concatcp!(METRIC_NAME_PREFIX, "channel_failures");
}

pub mod pair_kind {
    #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
    pub enum PairKind {
        CrossTalk,
        Prompt,
        TimeRandom,
        BackToBack,
    }

    // Label building function
    pub fn get_label(pair_kind: PairKind) -> (&'static str, &'static str) {
        (
            "pair_kind",
            match pair_kind {
                PairKind::CrossTalk => "cross_talk",
                PairKind::Prompt => "prompt",
                PairKind::TimeRandom => "time_random",
                PairKind::BackToBack => "back_to_back",
            },
        )
    }
}

pub mod failures {
    #[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
    pub enum FailureKind {
        EventReadFailed,
        PeakNotFound,
        FitFailed,
        TooFewPoints,
        DegenerateCalibration,
    }

    // Label building function
    pub fn get_label(failure_kind: FailureKind) -> (&'static str, &'static str) {
        (
            "failure_kind",
            match failure_kind {
                FailureKind::EventReadFailed => "event_read_failed",
                FailureKind::PeakNotFound => "peak_not_found",
                FailureKind::FitFailed => "fit_failed",
                FailureKind::TooFewPoints => "too_few_points",
                FailureKind::DegenerateCalibration => "degenerate_calibration",
            },
        )
    }
}
