use crate::Simulate;
use anyhow::Result;
use griffin_common::{
    AddbackHit, CRYSTALS_PER_DETECTOR, ChannelIndex, CrystalId, DetectorId, EventFrame,
    Hit, NUM_CHANNELS, NUM_DETECTORS, PROGRESS_INTERVAL, QualityFlag, Time,
};
use griffin_event_file::EventFileWriter;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use rand_distr::{Distribution, Exp, Normal};
use std::collections::BTreeMap;
use tracing::info;

/// Lines of a mixed calibration source, keV.
const LINES: [f64; 11] = [
    315.42, 511.0, 570.41, 645.2, 728.53, 769.31, 1008.53, 1054.3, 1864.89, 2118.26, 2546.61,
];

/// Shape of the synthetic data.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GeneratorSettings {
    /// Mean time between events, ns.
    pub(crate) mean_interval: Time,
    pub(crate) max_gammas: usize,
    /// Chance that a gamma scatters into a second crystal of its clover.
    pub(crate) scatter_probability: f64,
    pub(crate) pileup_probability: f64,
    /// Energy resolution sigma, keV.
    pub(crate) resolution: f64,
    /// Sigma of the per-channel relative gain error.
    pub(crate) gain_spread: f64,
    /// Quadratic term of the channel response, per keV.
    pub(crate) nonlinearity: f64,
    /// Maximum spread of hit times within an event, ns.
    pub(crate) time_spread: Time,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            mean_interval: 10_000.0,
            max_gammas: 3,
            scatter_probability: 0.3,
            pileup_probability: 0.02,
            resolution: 1.0,
            gain_spread: 0.002,
            nonlinearity: 2e-7,
            time_spread: 200.0,
        }
    }
}

/// Generates events from a clover array looking at a calibration source.
pub(crate) struct EventGenerator {
    rng: StdRng,
    settings: GeneratorSettings,
    gains: Vec<f64>,
    resolution: Normal<f64>,
    interval: Exp<f64>,
    clock: Time,
}

impl EventGenerator {
    pub(crate) fn new(seed: u64, settings: GeneratorSettings) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let gain = Normal::new(1.0, settings.gain_spread)?;
        let gains = (0..NUM_CHANNELS).map(|_| gain.sample(&mut rng)).collect();
        Ok(Self {
            resolution: Normal::new(0.0, settings.resolution)?,
            interval: Exp::new(1.0 / settings.mean_interval)?,
            rng,
            settings,
            gains,
            clock: 0.0,
        })
    }

    /// Measured energy of a deposit in `channel`.
    fn response(&mut self, channel: ChannelIndex, energy: f64) -> f64 {
        let gain = self.gains.get(channel.get()).copied().unwrap_or(1.0);
        gain * energy + self.settings.nonlinearity * energy * energy
            + self.resolution.sample(&mut self.rng)
    }

    fn quality(&mut self) -> QualityFlag {
        if self.rng.random_bool(self.settings.pileup_probability) {
            QualityFlag::Pileup
        } else {
            QualityFlag::Good
        }
    }

    fn deposit(
        &mut self,
        detector: DetectorId,
        crystal: CrystalId,
        energy: f64,
        timestamp: Time,
    ) -> Hit {
        let channel = ChannelIndex::from_detector_crystal(detector, crystal);
        let measured = self.response(channel, energy);
        let quality = self.quality();
        Hit::new(detector, crystal, measured, timestamp, quality)
    }

    pub(crate) fn next_frame(&mut self) -> Result<EventFrame> {
        self.clock += self.interval.sample(&mut self.rng);
        let gammas = self.rng.random_range(1..=self.settings.max_gammas.max(1));

        let mut hits = Vec::new();
        for _ in 0..gammas {
            let energy = LINES.choose(&mut self.rng).copied().unwrap_or(511.0);
            let detector = DetectorId::new(self.rng.random_range(1..=NUM_DETECTORS))?;
            let crystal = CrystalId::new(self.rng.random_range(0..CRYSTALS_PER_DETECTOR))?;
            let timestamp = self.clock + self.rng.random_range(0.0..self.settings.time_spread);

            if self.rng.random_bool(self.settings.scatter_probability) {
                let offset = self.rng.random_range(1..CRYSTALS_PER_DETECTOR);
                let neighbour =
                    CrystalId::new((crystal.get() + offset) % CRYSTALS_PER_DETECTOR)?;
                let share = self.rng.random_range(0.1..0.9);
                let delay = self.rng.random_range(0.0..50.0);
                hits.push(self.deposit(detector, crystal, energy * share, timestamp));
                hits.push(self.deposit(
                    detector,
                    neighbour,
                    energy * (1.0 - share),
                    timestamp + delay,
                ));
            } else {
                hits.push(self.deposit(detector, crystal, energy, timestamp));
            }
        }
        let addbacks = addback(&hits);
        Ok(EventFrame::new(hits, addbacks))
    }
}

/// Sums the Good hits of each detector.
fn addback(hits: &[Hit]) -> Vec<AddbackHit> {
    let mut detectors = BTreeMap::<DetectorId, AddbackHit>::new();
    for hit in hits.iter().filter(|hit| hit.is_good()) {
        detectors
            .entry(hit.detector)
            .and_modify(|sum| {
                sum.energy += hit.raw_energy;
                sum.timestamp = sum.timestamp.min(hit.timestamp);
                sum.fragments += 1;
            })
            .or_insert(AddbackHit {
                detector: hit.detector,
                energy: hit.raw_energy,
                timestamp: hit.timestamp,
                fragments: 1,
                quality: QualityFlag::Good,
            });
    }
    detectors.into_values().collect()
}

pub(crate) fn run(args: Simulate) -> Result<()> {
    let mut generator = EventGenerator::new(args.seed, GeneratorSettings::default())?;
    let mut writer = EventFileWriter::create(&args.output)?;
    for index in 0..args.events {
        writer.write_event(&generator.next_frame()?)?;
        if index % PROGRESS_INTERVAL == 0 {
            info!("Generated event {index} of {}", args.events);
        }
    }
    info!(
        "Wrote {} events to {}",
        writer.num_events(),
        args.output.display()
    );
    writer.finish()?;
    Ok(())
}
