use crate::{
    EventFileError, MAGIC, VERSION,
    format::{
        ADDBACK_SIZE, COUNTS_SIZE, HIT_SIZE, load_f64, load_magic, load_u8, load_u32,
        quality_from_byte,
    },
};
use griffin_common::{
    AddbackHit, CrystalId, DetectorId, EventFrame, EventIndexError, EventSource, Hit,
    QualityFlag,
};
use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
};
use tracing::{debug, info};

/// Random-access reader over an event file.
///
/// The byte offset of every event is indexed when the file is opened, so
/// `event` is a single seek and read. Reading events in order never seeks,
/// which keeps a `BufReader`'s buffer alive.
#[derive(Debug)]
pub struct EventFile<R> {
    reader: R,
    offsets: Vec<u64>,
    /// Where the next read starts, when known.
    position: Option<u64>,
}

impl EventFile<BufReader<File>> {
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventFileError> {
        let file = File::open(path.as_ref())?;
        let event_file = Self::from_reader(BufReader::new(file))?;
        info!("Opened event file with {} events", event_file.len());
        Ok(event_file)
    }
}

impl<R: Read + Seek> EventFile<R> {
    pub fn from_reader(mut reader: R) -> Result<Self, EventFileError> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut total_bytes = usize::default();
        let magic = load_magic(&mut reader, &mut total_bytes)?;
        if magic != MAGIC {
            return Err(EventFileError::BadMagic(magic));
        }
        let version = load_u32(&mut reader, &mut total_bytes)?;
        if version != VERSION {
            return Err(EventFileError::UnsupportedVersion(version));
        }

        let mut offsets = Vec::new();
        let mut offset = total_bytes as u64;
        while offset < file_size {
            let event = offsets.len();
            if offset + COUNTS_SIZE as u64 > file_size {
                return Err(EventFileError::Truncated(event));
            }
            reader.seek(SeekFrom::Start(offset))?;
            let (num_hits, num_addbacks) = load_counts(&mut reader)?;
            let size = event_size(num_hits, num_addbacks);
            if offset + size > file_size {
                return Err(EventFileError::Truncated(event));
            }
            offsets.push(offset);
            offset += size;
        }
        debug!("Indexed {} events over {file_size} bytes", offsets.len());
        Ok(Self {
            reader,
            offsets,
            position: None,
        })
    }

    pub fn get_number_of_events(&self) -> usize {
        self.offsets.len()
    }

    pub fn get_event(&mut self, index: usize) -> Result<EventFrame, EventFileError> {
        let offset = *self.offsets.get(index).ok_or(EventIndexError {
            index,
            len: self.offsets.len(),
        })?;
        if self.position != Some(offset) {
            self.reader.seek(SeekFrom::Start(offset))?;
        }
        self.position = None;
        let (num_hits, num_addbacks) = load_counts(&mut self.reader)?;
        let hits = (0..num_hits)
            .map(|_| load_hit(&mut self.reader, index))
            .collect::<Result<_, _>>()?;
        let addbacks = (0..num_addbacks)
            .map(|_| load_addback(&mut self.reader, index))
            .collect::<Result<_, _>>()?;
        self.position = Some(offset + event_size(num_hits, num_addbacks));
        Ok(EventFrame::new(hits, addbacks))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read + Seek> EventSource for EventFile<R> {
    type Error = EventFileError;

    fn len(&self) -> usize {
        self.get_number_of_events()
    }

    fn event(&mut self, index: usize) -> Result<EventFrame, Self::Error> {
        self.get_event(index)
    }
}

fn event_size(num_hits: u32, num_addbacks: u32) -> u64 {
    (COUNTS_SIZE + num_hits as usize * HIT_SIZE + num_addbacks as usize * ADDBACK_SIZE) as u64
}

fn load_counts<R: Read>(reader: &mut R) -> Result<(u32, u32), std::io::Error> {
    let mut total_bytes = usize::default();
    let num_hits = load_u32(reader, &mut total_bytes)?;
    let num_addbacks = load_u32(reader, &mut total_bytes)?;
    Ok((num_hits, num_addbacks))
}

fn load_quality<R: Read>(
    reader: &mut R,
    total_bytes: &mut usize,
) -> Result<QualityFlag, EventFileError> {
    let byte = load_u8(reader, total_bytes)?;
    quality_from_byte(byte).ok_or(EventFileError::InvalidQuality(byte))
}

fn load_hit<R: Read>(reader: &mut R, event: usize) -> Result<Hit, EventFileError> {
    let mut total_bytes = usize::default();
    let invalid_id = |source| EventFileError::InvalidId { event, source };

    let detector = DetectorId::new(load_u8(reader, &mut total_bytes)?).map_err(invalid_id)?;
    let crystal = CrystalId::new(load_u8(reader, &mut total_bytes)?).map_err(invalid_id)?;
    let quality = load_quality(reader, &mut total_bytes)?;
    let raw_energy = load_f64(reader, &mut total_bytes)?;
    let timestamp = load_f64(reader, &mut total_bytes)?;
    let position = [
        load_f64(reader, &mut total_bytes)?,
        load_f64(reader, &mut total_bytes)?,
        load_f64(reader, &mut total_bytes)?,
    ];
    Ok(Hit::new(detector, crystal, raw_energy, timestamp, quality).with_position(position))
}

fn load_addback<R: Read>(reader: &mut R, event: usize) -> Result<AddbackHit, EventFileError> {
    let mut total_bytes = usize::default();
    let detector = DetectorId::new(load_u8(reader, &mut total_bytes)?)
        .map_err(|source| EventFileError::InvalidId { event, source })?;
    let quality = load_quality(reader, &mut total_bytes)?;
    let fragments = load_u32(reader, &mut total_bytes)?;
    let energy = load_f64(reader, &mut total_bytes)?;
    let timestamp = load_f64(reader, &mut total_bytes)?;
    Ok(AddbackHit {
        detector,
        energy,
        timestamp,
        fragments,
        quality,
    })
}
