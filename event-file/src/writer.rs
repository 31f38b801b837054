use crate::{
    EventFileError, MAGIC, VERSION,
    format::{quality_to_byte, save_f64, save_u8, save_u32},
};
use griffin_common::{AddbackHit, EventFrame, Hit};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Writes events in the layout [`crate::EventFile`] reads.
///
/// Corrected energies are not stored, a reader gets hits with
/// `corrected_energy == raw_energy`.
pub struct EventFileWriter<W: Write> {
    writer: W,
    num_events: usize,
}

impl EventFileWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, EventFileError> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> EventFileWriter<W> {
    pub fn new(mut writer: W) -> Result<Self, EventFileError> {
        writer.write_all(&MAGIC)?;
        save_u32(&mut writer, VERSION)?;
        Ok(Self {
            writer,
            num_events: 0,
        })
    }

    pub fn write_event(&mut self, frame: &EventFrame) -> Result<(), EventFileError> {
        save_u32(&mut self.writer, count(frame.hits.len())?)?;
        save_u32(&mut self.writer, count(frame.addbacks.len())?)?;
        for hit in &frame.hits {
            save_hit(&mut self.writer, hit)?;
        }
        for addback in &frame.addbacks {
            save_addback(&mut self.writer, addback)?;
        }
        self.num_events += 1;
        Ok(())
    }

    pub fn num_events(&self) -> usize {
        self.num_events
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W, EventFileError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn count(len: usize) -> Result<u32, EventFileError> {
    u32::try_from(len).map_err(|e| {
        EventFileError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    })
}

fn save_hit<W: Write>(writer: &mut W, hit: &Hit) -> Result<(), std::io::Error> {
    save_u8(writer, hit.detector.get())?;
    save_u8(writer, hit.crystal.get())?;
    save_u8(writer, quality_to_byte(hit.quality))?;
    save_f64(writer, hit.raw_energy)?;
    save_f64(writer, hit.timestamp)?;
    for coordinate in hit.position {
        save_f64(writer, coordinate)?;
    }
    Ok(())
}

fn save_addback<W: Write>(writer: &mut W, addback: &AddbackHit) -> Result<(), std::io::Error> {
    save_u8(writer, addback.detector.get())?;
    save_u8(writer, quality_to_byte(addback.quality))?;
    save_u32(writer, addback.fragments)?;
    save_f64(writer, addback.energy)?;
    save_f64(writer, addback.timestamp)
}
