use griffin_common::HistogramError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Histogram Error: {0}")]
    Histogram(#[from] HistogramError),
    #[error("Could not read event {index}: {source}")]
    Source {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
