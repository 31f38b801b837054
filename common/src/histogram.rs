//! Fixed-geometry accumulators and the named set that owns them.
//!
//! Every histogram's binning is fixed when it is declared. Filling computes
//! the bin index directly from the value, and values outside the axis are
//! tallied as underflow or overflow rather than binned.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// Per-bin count. The off-axis tallies and integrals are `u64`.
pub type Count = u32;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HistogramError {
    #[error("Invalid axis: {bins} bins over [{low}, {high})")]
    InvalidAxis { bins: usize, low: f64, high: f64 },
    #[error("Histogram {0} already declared")]
    DuplicateName(String),
    #[error("No histogram named {0}")]
    UnknownName(String),
    #[error("Histogram {name} is not a {expected}")]
    KindMismatch { name: String, expected: &'static str },
    #[error("Histogram layouts differ at {0}")]
    LayoutMismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    bins: usize,
    low: f64,
    high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisBin {
    Underflow,
    Bin(usize),
    Overflow,
}

impl Axis {
    pub fn new(bins: usize, low: f64, high: f64) -> Result<Self, HistogramError> {
        if bins == 0 || !low.is_finite() || !high.is_finite() || high <= low {
            return Err(HistogramError::InvalidAxis { bins, low, high });
        }
        Ok(Self { bins, low, high })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn width(&self) -> f64 {
        (self.high - self.low) / self.bins as f64
    }

    pub fn locate(&self, x: f64) -> AxisBin {
        // NaN fails every comparison and ends up as underflow.
        if !(x >= self.low) {
            AxisBin::Underflow
        } else if x >= self.high {
            AxisBin::Overflow
        } else {
            let bin = ((x - self.low) / self.width()) as usize;
            AxisBin::Bin(bin.min(self.bins - 1))
        }
    }

    pub fn center(&self, bin: usize) -> f64 {
        self.low + (bin as f64 + 0.5) * self.width()
    }

    /// Bins whose centres lie in `[low, high]`.
    pub fn bin_range(&self, low: f64, high: f64) -> std::ops::Range<usize> {
        let first = ((low - self.low) / self.width() - 0.5).ceil().max(0.0) as usize;
        let last = ((high - self.low) / self.width() - 0.5).floor();
        if last < 0.0 {
            return 0..0;
        }
        let end = (last as usize + 1).min(self.bins);
        first.min(end)..end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    axis: Axis,
    counts: Array1<Count>,
    underflow: u64,
    overflow: u64,
}

impl Histogram1D {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            counts: Array1::zeros(axis.bins()),
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn fill(&mut self, x: f64) {
        match self.axis.locate(x) {
            AxisBin::Underflow => self.underflow += 1,
            AxisBin::Overflow => self.overflow += 1,
            AxisBin::Bin(bin) => {
                if let Some(count) = self.counts.get_mut(bin) {
                    *count += 1;
                }
            }
        }
    }

    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    pub fn counts(&self) -> ArrayView1<'_, Count> {
        self.counts.view()
    }

    pub fn content(&self, bin: usize) -> Count {
        self.counts.get(bin).copied().unwrap_or_default()
    }

    pub fn content_at(&self, x: f64) -> Count {
        match self.axis.locate(x) {
            AxisBin::Bin(bin) => self.content(bin),
            _ => 0,
        }
    }

    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Sum of in-range bins.
    pub fn integral(&self) -> u64 {
        self.counts.iter().map(|&count| u64::from(count)).sum()
    }

    /// `(bin centre, count)` for every bin whose centre lies in `[low, high]`.
    pub fn window(&self, low: f64, high: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.axis.bin_range(low, high).map(move |bin| {
            (self.axis.center(bin), self.content(bin) as f64)
        })
    }

    fn same_layout(&self, other: &Self) -> bool {
        self.axis == other.axis
    }

    fn add(&mut self, other: &Self) {
        self.counts += &other.counts;
        self.underflow += other.underflow;
        self.overflow += other.overflow;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram2D {
    x_axis: Axis,
    y_axis: Axis,
    counts: Array2<Count>,
    /// Fills with either coordinate off its axis.
    outside: u64,
}

impl Histogram2D {
    pub fn new(x_axis: Axis, y_axis: Axis) -> Self {
        Self {
            x_axis,
            y_axis,
            counts: Array2::zeros((x_axis.bins(), y_axis.bins())),
            outside: 0,
        }
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        match (self.x_axis.locate(x), self.y_axis.locate(y)) {
            (AxisBin::Bin(i), AxisBin::Bin(j)) => {
                if let Some(count) = self.counts.get_mut((i, j)) {
                    *count += 1;
                }
            }
            _ => self.outside += 1,
        }
    }

    pub fn x_axis(&self) -> &Axis {
        &self.x_axis
    }

    pub fn y_axis(&self) -> &Axis {
        &self.y_axis
    }

    pub fn counts(&self) -> ArrayView2<'_, Count> {
        self.counts.view()
    }

    pub fn content(&self, i: usize, j: usize) -> Count {
        self.counts.get((i, j)).copied().unwrap_or_default()
    }

    pub fn content_at(&self, x: f64, y: f64) -> Count {
        match (self.x_axis.locate(x), self.y_axis.locate(y)) {
            (AxisBin::Bin(i), AxisBin::Bin(j)) => self.content(i, j),
            _ => 0,
        }
    }

    pub fn outside(&self) -> u64 {
        self.outside
    }

    pub fn integral(&self) -> u64 {
        self.counts.iter().map(|&count| u64::from(count)).sum()
    }

    /// The y-distribution of x-bin `i`, as a 1D histogram on the y axis.
    pub fn project_y(&self, i: usize) -> Option<Histogram1D> {
        (i < self.x_axis.bins()).then(|| Histogram1D {
            axis: self.y_axis,
            counts: self.counts.row(i).to_owned(),
            underflow: 0,
            overflow: 0,
        })
    }

    fn same_layout(&self, other: &Self) -> bool {
        self.x_axis == other.x_axis && self.y_axis == other.y_axis
    }

    fn add(&mut self, other: &Self) {
        self.counts += &other.counts;
        self.outside += other.outside;
    }
}

/// A family of spectra on one axis, selected by an integer key such as a
/// detector number or a fragment multiplicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumArray {
    first_key: i64,
    spectra: Vec<Histogram1D>,
    /// Fills whose key selects no spectrum.
    rejected: u64,
}

impl SpectrumArray {
    pub fn new(first_key: i64, len: usize, axis: Axis) -> Self {
        Self {
            first_key,
            spectra: vec![Histogram1D::new(axis); len],
            rejected: 0,
        }
    }

    pub fn fill(&mut self, key: i64, x: f64) {
        let spectrum = usize::try_from(key - self.first_key)
            .ok()
            .and_then(|index| self.spectra.get_mut(index));
        match spectrum {
            Some(spectrum) => spectrum.fill(x),
            None => self.rejected += 1,
        }
    }

    pub fn spectrum(&self, key: i64) -> Option<&Histogram1D> {
        usize::try_from(key - self.first_key)
            .ok()
            .and_then(|index| self.spectra.get(index))
    }

    pub fn keys(&self) -> std::ops::Range<i64> {
        self.first_key..self.first_key + self.spectra.len() as i64
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    fn same_layout(&self, other: &Self) -> bool {
        self.first_key == other.first_key
            && self.spectra.len() == other.spectra.len()
            && self
                .spectra
                .iter()
                .zip(&other.spectra)
                .all(|(a, b)| a.same_layout(b))
    }

    fn add(&mut self, other: &Self) {
        for (a, b) in self.spectra.iter_mut().zip(&other.spectra) {
            a.add(b);
        }
        self.rejected += other.rejected;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hist1DId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hist2DId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpectrumArrayId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    OneD(usize),
    TwoD(usize),
    Array(usize),
}

/// Borrowed view of one named histogram, used for export.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum HistogramRef<'a> {
    OneD(&'a Histogram1D),
    TwoD(&'a Histogram2D),
    Array(&'a SpectrumArray),
}

/// A fixed, named collection of accumulators.
///
/// Histograms are declared up front and never resized. Analyses resolve the
/// typed ids once and fill through them in the event loop, the name-based
/// `fill` and `fill2` are for everything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramSink {
    one_d: Vec<Histogram1D>,
    two_d: Vec<Histogram2D>,
    arrays: Vec<SpectrumArray>,
    order: Vec<(String, Slot)>,
    lookup: HashMap<String, Slot>,
}

impl HistogramSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, name: &str, slot: Slot) -> Result<(), HistogramError> {
        if self.lookup.contains_key(name) {
            return Err(HistogramError::DuplicateName(name.to_owned()));
        }
        self.lookup.insert(name.to_owned(), slot);
        self.order.push((name.to_owned(), slot));
        Ok(())
    }

    pub fn declare_1d(&mut self, name: &str, axis: Axis) -> Result<Hist1DId, HistogramError> {
        self.register(name, Slot::OneD(self.one_d.len()))?;
        self.one_d.push(Histogram1D::new(axis));
        Ok(Hist1DId(self.one_d.len() - 1))
    }

    pub fn declare_2d(
        &mut self,
        name: &str,
        x_axis: Axis,
        y_axis: Axis,
    ) -> Result<Hist2DId, HistogramError> {
        self.register(name, Slot::TwoD(self.two_d.len()))?;
        self.two_d.push(Histogram2D::new(x_axis, y_axis));
        Ok(Hist2DId(self.two_d.len() - 1))
    }

    pub fn declare_array(
        &mut self,
        name: &str,
        first_key: i64,
        len: usize,
        axis: Axis,
    ) -> Result<SpectrumArrayId, HistogramError> {
        self.register(name, Slot::Array(self.arrays.len()))?;
        self.arrays.push(SpectrumArray::new(first_key, len, axis));
        Ok(SpectrumArrayId(self.arrays.len() - 1))
    }

    pub fn fill_1d(&mut self, id: Hist1DId, x: f64) {
        if let Some(histogram) = self.one_d.get_mut(id.0) {
            histogram.fill(x);
        }
    }

    pub fn fill_2d(&mut self, id: Hist2DId, x: f64, y: f64) {
        if let Some(histogram) = self.two_d.get_mut(id.0) {
            histogram.fill(x, y);
        }
    }

    pub fn fill_array(&mut self, id: SpectrumArrayId, key: i64, x: f64) {
        if let Some(array) = self.arrays.get_mut(id.0) {
            array.fill(key, x);
        }
    }

    fn slot(&self, name: &str) -> Result<Slot, HistogramError> {
        self.lookup
            .get(name)
            .copied()
            .ok_or_else(|| HistogramError::UnknownName(name.to_owned()))
    }

    /// Fills the 1D histogram `name`.
    pub fn fill(&mut self, name: &str, value: f64) -> Result<(), HistogramError> {
        match self.slot(name)? {
            Slot::OneD(index) => {
                self.fill_1d(Hist1DId(index), value);
                Ok(())
            }
            _ => Err(HistogramError::KindMismatch {
                name: name.to_owned(),
                expected: "1D histogram",
            }),
        }
    }

    /// Fills the 2D histogram `name` at `(x, y)`. For a spectrum array `x` is
    /// truncated to the key.
    pub fn fill2(&mut self, name: &str, x: f64, y: f64) -> Result<(), HistogramError> {
        match self.slot(name)? {
            Slot::TwoD(index) => self.fill_2d(Hist2DId(index), x, y),
            Slot::Array(index) => self.fill_array(SpectrumArrayId(index), x as i64, y),
            Slot::OneD(_) => {
                return Err(HistogramError::KindMismatch {
                    name: name.to_owned(),
                    expected: "2D histogram or spectrum array",
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<HistogramRef<'_>> {
        self.lookup.get(name).and_then(|&slot| self.resolve(slot))
    }

    pub fn get_1d(&self, name: &str) -> Option<&Histogram1D> {
        match self.get(name)? {
            HistogramRef::OneD(histogram) => Some(histogram),
            _ => None,
        }
    }

    pub fn get_2d(&self, name: &str) -> Option<&Histogram2D> {
        match self.get(name)? {
            HistogramRef::TwoD(histogram) => Some(histogram),
            _ => None,
        }
    }

    pub fn get_array(&self, name: &str) -> Option<&SpectrumArray> {
        match self.get(name)? {
            HistogramRef::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn histogram_1d(&self, id: Hist1DId) -> Option<&Histogram1D> {
        self.one_d.get(id.0)
    }

    pub fn histogram_2d(&self, id: Hist2DId) -> Option<&Histogram2D> {
        self.two_d.get(id.0)
    }

    fn resolve(&self, slot: Slot) -> Option<HistogramRef<'_>> {
        match slot {
            Slot::OneD(index) => self.one_d.get(index).map(HistogramRef::OneD),
            Slot::TwoD(index) => self.two_d.get(index).map(HistogramRef::TwoD),
            Slot::Array(index) => self.arrays.get(index).map(HistogramRef::Array),
        }
    }

    /// Histograms in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, HistogramRef<'_>)> {
        self.order
            .iter()
            .filter_map(|(name, slot)| Some((name.as_str(), self.resolve(*slot)?)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Adds `other` bin-wise into this sink. Both must have been declared with
    /// the same names, kinds and axes, in the same order. On a mismatch the
    /// sink is left untouched.
    pub fn merge(&mut self, other: &HistogramSink) -> Result<(), HistogramError> {
        if self.order != other.order {
            return Err(HistogramError::LayoutMismatch("declaration order".to_owned()));
        }
        if let Some((name, _)) = self.order.iter().find(|(_, slot)| {
            !match *slot {
                Slot::OneD(index) => self
                    .one_d
                    .get(index)
                    .zip(other.one_d.get(index))
                    .is_some_and(|(a, b)| a.same_layout(b)),
                Slot::TwoD(index) => self
                    .two_d
                    .get(index)
                    .zip(other.two_d.get(index))
                    .is_some_and(|(a, b)| a.same_layout(b)),
                Slot::Array(index) => self
                    .arrays
                    .get(index)
                    .zip(other.arrays.get(index))
                    .is_some_and(|(a, b)| a.same_layout(b)),
            }
        }) {
            return Err(HistogramError::LayoutMismatch(name.clone()));
        }

        for (a, b) in self.one_d.iter_mut().zip(&other.one_d) {
            a.add(b);
        }
        for (a, b) in self.two_d.iter_mut().zip(&other.two_d) {
            a.add(b);
        }
        for (a, b) in self.arrays.iter_mut().zip(&other.arrays) {
            a.add(b);
        }
        trace!("Merged {} histograms", self.order.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(bins: usize, low: f64, high: f64) -> Axis {
        Axis::new(bins, low, high).unwrap()
    }

    #[test]
    fn invalid_axes() {
        assert!(Axis::new(0, 0.0, 1.0).is_err());
        assert!(Axis::new(10, 1.0, 1.0).is_err());
        assert!(Axis::new(10, 0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn locate() {
        let axis = axis(2000, 0.0, 2000.0);
        assert_eq!(axis.locate(-0.1), AxisBin::Underflow);
        assert_eq!(axis.locate(0.0), AxisBin::Bin(0));
        assert_eq!(axis.locate(500.0), AxisBin::Bin(500));
        assert_eq!(axis.locate(1999.9), AxisBin::Bin(1999));
        assert_eq!(axis.locate(2000.0), AxisBin::Overflow);
        assert_eq!(axis.locate(f64::NAN), AxisBin::Underflow);
    }

    #[test]
    fn bin_range_by_centre() {
        let axis = axis(100, 0.0, 100.0);
        assert_eq!(axis.bin_range(10.0, 20.0), 10..20);
        assert_eq!(axis.bin_range(9.5, 20.5), 9..21);
        assert_eq!(axis.bin_range(-50.0, 2.0), 0..2);
        assert_eq!(axis.bin_range(95.0, 500.0), 95..100);
        assert_eq!(axis.bin_range(-20.0, -10.0), 0..0);
    }

    #[test]
    fn fill_1d_with_overflow() {
        let mut histogram = Histogram1D::new(axis(10, 0.0, 10.0));
        for x in [-1.0, 0.5, 0.7, 9.99, 10.0, 25.0] {
            histogram.fill(x);
        }
        assert_eq!(histogram.content(0), 2);
        assert_eq!(histogram.content(9), 1);
        assert_eq!(histogram.underflow(), 1);
        assert_eq!(histogram.overflow(), 2);
        assert_eq!(histogram.integral(), 3);
    }

    #[test]
    fn fill_2d_and_project() {
        let mut histogram = Histogram2D::new(axis(4, 0.0, 4.0), axis(10, 0.0, 10.0));
        histogram.fill(1.5, 3.2);
        histogram.fill(1.5, 3.7);
        histogram.fill(2.5, 3.2);
        histogram.fill(5.0, 3.2);
        assert_eq!(histogram.content_at(1.0, 3.0), 2);
        assert_eq!(histogram.outside(), 1);

        let projection = histogram.project_y(1).unwrap();
        assert_eq!(projection.content(3), 2);
        assert_eq!(projection.integral(), 2);
        assert!(histogram.project_y(4).is_none());
    }

    #[test]
    fn spectrum_array_keys() {
        let mut array = SpectrumArray::new(1, 4, axis(10, 0.0, 10.0));
        array.fill(1, 2.0);
        array.fill(4, 2.0);
        array.fill(0, 2.0);
        array.fill(5, 2.0);
        assert_eq!(array.spectrum(1).map(Histogram1D::integral), Some(1));
        assert_eq!(array.spectrum(4).map(Histogram1D::integral), Some(1));
        assert!(array.spectrum(5).is_none());
        assert_eq!(array.rejected(), 2);
        assert_eq!(array.keys(), 1..5);
    }

    #[test]
    fn sink_by_name() {
        let mut sink = HistogramSink::new();
        sink.declare_1d("singles", axis(10, 0.0, 10.0)).unwrap();
        sink.declare_2d("matrix", axis(10, 0.0, 10.0), axis(10, 0.0, 10.0))
            .unwrap();
        sink.declare_array("by_detector", 1, 16, axis(10, 0.0, 10.0))
            .unwrap();

        sink.fill("singles", 3.0).unwrap();
        sink.fill2("matrix", 3.0, 4.0).unwrap();
        sink.fill2("by_detector", 16.0, 4.0).unwrap();

        assert_eq!(sink.get_1d("singles").map(|h| h.content(3)), Some(1));
        assert_eq!(sink.get_2d("matrix").map(|h| h.content(3, 4)), Some(1));
        assert_eq!(
            sink.get_array("by_detector")
                .and_then(|a| a.spectrum(16))
                .map(|h| h.content(4)),
            Some(1)
        );

        assert_eq!(
            sink.fill("missing", 1.0),
            Err(HistogramError::UnknownName("missing".to_owned()))
        );
        assert!(matches!(
            sink.fill("matrix", 1.0),
            Err(HistogramError::KindMismatch { .. })
        ));
        assert!(matches!(
            sink.fill2("singles", 1.0, 1.0),
            Err(HistogramError::KindMismatch { .. })
        ));
        assert_eq!(
            sink.declare_1d("singles", axis(10, 0.0, 10.0)),
            Err(HistogramError::DuplicateName("singles".to_owned()))
        );
    }

    #[test]
    fn iteration_keeps_declaration_order() {
        let mut sink = HistogramSink::new();
        sink.declare_2d("b", axis(1, 0.0, 1.0), axis(1, 0.0, 1.0))
            .unwrap();
        sink.declare_1d("a", axis(1, 0.0, 1.0)).unwrap();
        let names: Vec<_> = sink.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn merge_sums_bins() {
        let build = || {
            let mut sink = HistogramSink::new();
            let id = sink.declare_1d("singles", axis(10, 0.0, 10.0)).unwrap();
            (sink, id)
        };
        let (mut a, id) = build();
        let (mut b, _) = build();
        a.fill_1d(id, 1.0);
        b.fill_1d(id, 1.0);
        b.fill_1d(id, 20.0);
        a.merge(&b).unwrap();
        let merged = a.histogram_1d(id).unwrap();
        assert_eq!(merged.content(1), 2);
        assert_eq!(merged.overflow(), 1);
    }

    #[test]
    fn merge_rejects_other_layouts() {
        let mut a = HistogramSink::new();
        a.declare_1d("singles", axis(10, 0.0, 10.0)).unwrap();
        let mut b = HistogramSink::new();
        b.declare_1d("singles", axis(20, 0.0, 10.0)).unwrap();
        assert_eq!(
            a.merge(&b),
            Err(HistogramError::LayoutMismatch("singles".to_owned()))
        );
    }

    #[test]
    fn failed_merge_leaves_the_sink_untouched() {
        let build = |bins| {
            let mut sink = HistogramSink::new();
            let singles = sink.declare_1d("singles", axis(10, 0.0, 10.0)).unwrap();
            sink.declare_2d("matrix", axis(bins, 0.0, 10.0), axis(10, 0.0, 10.0))
                .unwrap();
            (sink, singles)
        };
        let (mut a, singles) = build(10);
        let (mut b, _) = build(20);
        a.fill_1d(singles, 1.0);
        b.fill_1d(singles, 1.0);
        let before = a.clone();

        assert_eq!(
            a.merge(&b),
            Err(HistogramError::LayoutMismatch("matrix".to_owned()))
        );
        assert_eq!(a, before);
        assert_eq!(a.histogram_1d(singles).unwrap().content(1), 1);
    }
}
