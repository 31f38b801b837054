use crate::CalibrationError;
use griffin_common::{
    Axis, ChannelIndex, EventFrame, EventSource, Histogram1D, Histogram2D, NUM_CHANNELS,
    PROGRESS_INTERVAL,
};
use tracing::info;

/// Raw-energy spectra for every crystal channel, kept as one channel ×
/// energy matrix at 1 keV per bin.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpectra {
    matrix: Histogram2D,
}

impl ChannelSpectra {
    pub const ENERGY_BINS: usize = 5000;
    pub const ENERGY_HIGH: f64 = 5000.0;

    pub fn new() -> Result<Self, CalibrationError> {
        Ok(Self {
            matrix: Histogram2D::new(
                Axis::new(NUM_CHANNELS, 0.0, NUM_CHANNELS as f64)?,
                Axis::new(Self::ENERGY_BINS, 0.0, Self::ENERGY_HIGH)?,
            ),
        })
    }

    /// Adds every hit of `frame`, whatever its quality, at its raw energy.
    pub fn fill_frame(&mut self, frame: &EventFrame) {
        for hit in &frame.hits {
            self.matrix.fill(hit.channel().get() as f64, hit.raw_energy);
        }
    }

    pub fn from_frames<'a>(
        frames: impl IntoIterator<Item = &'a EventFrame>,
    ) -> Result<Self, CalibrationError> {
        let mut spectra = Self::new()?;
        for frame in frames {
            spectra.fill_frame(frame);
        }
        Ok(spectra)
    }

    #[tracing::instrument(skip_all, fields(num_entries = source.len()))]
    pub fn from_source<S: EventSource>(source: &mut S) -> Result<Self, CalibrationError> {
        let mut spectra = Self::new()?;
        let len = source.len();
        for index in 0..len {
            let frame = source
                .event(index)
                .map_err(|e| CalibrationError::Source {
                    index,
                    source: Box::new(e),
                })?;
            spectra.fill_frame(&frame);
            if index % PROGRESS_INTERVAL == 0 {
                info!("Projecting event {index} of {len}");
            }
        }
        Ok(spectra)
    }

    pub fn spectrum(&self, channel: ChannelIndex) -> Option<Histogram1D> {
        self.matrix.project_y(channel.get())
    }

    pub fn matrix(&self) -> &Histogram2D {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use griffin_common::{CrystalId, DetectorId, Hit, QualityFlag, VecEventSource};

    #[test]
    fn projects_by_channel() {
        let hit = |detector, crystal, energy, quality| {
            Hit::new(
                DetectorId::new(detector).unwrap(),
                CrystalId::new(crystal).unwrap(),
                energy,
                0.0,
                quality,
            )
        };
        let mut source = VecEventSource::new(vec![
            EventFrame::new(
                vec![
                    hit(2, 3, 1332.2, QualityFlag::Good),
                    hit(2, 3, 1332.7, QualityFlag::Pileup),
                ],
                vec![],
            ),
            EventFrame::new(vec![hit(16, 3, 6000.0, QualityFlag::Good)], vec![]),
        ]);
        let spectra = ChannelSpectra::from_source(&mut source).unwrap();

        let channel = ChannelIndex::new(7).unwrap();
        let spectrum = spectra.spectrum(channel).unwrap();
        assert_eq!(spectrum.content_at(1332.0), 2);
        assert_eq!(spectrum.integral(), 2);
        assert_eq!(spectra.matrix().outside(), 1);
    }
}
