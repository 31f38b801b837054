use super::{
    Candidate, EventFilter, GaussianSmoothing, LocalMaximumDetector, PeakEstimate, PeakFit, Real,
    WindowFilter,
};
use crate::SearchSettings;
use griffin_common::Histogram1D;
use tracing::trace;

/// Bins averaged at each edge of a fit range to estimate the background.
const EDGE_BINS: usize = 3;

/// Smoothed local-maximum search and a background-subtracted centroid fit.
#[derive(Debug, Default, Clone, Copy)]
pub struct CentroidFit;

/// Straight line through the mean of the first and last `EDGE_BINS` points.
struct LinearBackground {
    position: Real,
    value: Real,
    slope: Real,
}

impl LinearBackground {
    fn from_edges(points: &[(Real, Real)]) -> Option<Self> {
        let mean = |edge: &[(Real, Real)]| {
            let n = edge.len() as Real;
            let (x, y) = edge
                .iter()
                .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
            (x / n, y / n)
        };
        let (left_x, left_y) = mean(points.get(..EDGE_BINS)?);
        let (right_x, right_y) = mean(points.get(points.len().checked_sub(EDGE_BINS)?..)?);
        Some(Self {
            position: left_x,
            value: left_y,
            slope: (right_y - left_y) / (right_x - left_x),
        })
    }

    fn at(&self, x: Real) -> Real {
        self.value + self.slope * (x - self.position)
    }
}

impl PeakFit for CentroidFit {
    fn search(
        &self,
        spectrum: &Histogram1D,
        low: Real,
        high: Real,
        settings: &SearchSettings,
    ) -> Vec<Real> {
        let mut candidates: Vec<Candidate> = spectrum
            .window(low, high)
            .window(GaussianSmoothing::new(
                settings.sigma,
                spectrum.axis().width(),
            ))
            .events(LocalMaximumDetector::default())
            .collect();

        let highest = candidates
            .iter()
            .map(|candidate| candidate.height)
            .fold(0.0, Real::max);
        if highest <= 0.0 {
            return Vec::new();
        }
        candidates.retain(|candidate| candidate.height >= settings.threshold * highest);
        candidates.sort_by(|a, b| b.height.total_cmp(&a.height));
        trace!("{} candidates in [{low}, {high}]", candidates.len());
        candidates
            .into_iter()
            .map(|candidate| candidate.position)
            .collect()
    }

    fn fit(
        &self,
        spectrum: &Histogram1D,
        low: Real,
        high: Real,
        guess: Real,
    ) -> Option<PeakEstimate> {
        let points: Vec<(Real, Real)> = spectrum.window(low, high).collect();
        if points.len() <= 2 * EDGE_BINS {
            return None;
        }
        let background = LinearBackground::from_edges(&points)?;

        let (sum, weighted) = points.iter().fold((0.0, 0.0), |(sum, weighted), &(x, y)| {
            let net = (y - background.at(x)).max(0.0);
            (sum + net, weighted + net * x)
        });
        if sum <= 0.0 {
            return None;
        }
        let centroid = weighted / sum;
        let variance = points
            .iter()
            .map(|&(x, y)| (y - background.at(x)).max(0.0) * (x - centroid).powi(2))
            .sum::<Real>()
            / sum;

        if (centroid - guess).abs() > (high - low) / 2.0 {
            return None;
        }
        Some(PeakEstimate {
            centroid,
            centroid_error: (variance / sum).sqrt(),
        })
    }
}
