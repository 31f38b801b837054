use anyhow::Result;
use griffin_common::{
    Axis, Count, Histogram1D, Histogram2D, HistogramRef, HistogramSink, SpectrumArray,
};
use serde::{Serialize, Serializer};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};
use tracing::info;

/// A 2D histogram listing only its filled bins as `[x bin, y bin, count]`.
#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct SparseMatrix<'a> {
    x_axis: &'a Axis,
    y_axis: &'a Axis,
    outside: u64,
    bins: Vec<(usize, usize, Count)>,
}

impl<'a> From<&'a Histogram2D> for SparseMatrix<'a> {
    fn from(histogram: &'a Histogram2D) -> Self {
        Self {
            x_axis: histogram.x_axis(),
            y_axis: histogram.y_axis(),
            outside: histogram.outside(),
            bins: histogram
                .counts()
                .indexed_iter()
                .filter(|(_, count)| **count > 0)
                .map(|((i, j), &count)| (i, j, count))
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
enum Exported<'a> {
    OneD(&'a Histogram1D),
    TwoD(SparseMatrix<'a>),
    Array(&'a SpectrumArray),
}

impl<'a> From<HistogramRef<'a>> for Exported<'a> {
    fn from(histogram: HistogramRef<'a>) -> Self {
        match histogram {
            HistogramRef::OneD(histogram) => Self::OneD(histogram),
            HistogramRef::TwoD(histogram) => Self::TwoD(histogram.into()),
            HistogramRef::Array(array) => Self::Array(array),
        }
    }
}

/// Serializes a sink as a map from histogram name to histogram, in
/// declaration order. Matrices are written sparsely.
pub(crate) struct Histograms<'a>(pub(crate) &'a HistogramSink);

impl Serialize for Histograms<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .map(|(name, histogram)| (name, Exported::from(histogram))),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonStyle {
    Pretty,
    Compact,
}

/// Writes `value` as JSON to `path`, or to stdout.
pub(crate) fn write_json<T: Serialize>(
    value: &T,
    path: Option<&Path>,
    style: JsonStyle,
) -> Result<()> {
    match path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            to_writer(&mut writer, value, style)?;
            writer.flush()?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            to_writer(&mut stdout, value, style)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

fn to_writer<W: Write, T: Serialize>(writer: W, value: &T, style: JsonStyle) -> Result<()> {
    match style {
        JsonStyle::Pretty => serde_json::to_writer_pretty(writer, value)?,
        JsonStyle::Compact => serde_json::to_writer(writer, value)?,
    }
    Ok(())
}
