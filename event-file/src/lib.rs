//! Binary event files.
//!
//! A file is a header followed by events laid end to end, all little-endian:
//!
//! | field | type |
//! |---|---|
//! | magic | `b"GRFN"` |
//! | version | `u32` |
//!
//! then per event a `u32` hit count and a `u32` addback count, followed by
//! that many hit and addback records. Hits are
//! `detector: u8, crystal: u8, quality: u8, raw_energy: f64, timestamp: f64,
//! position: [f64; 3]` and addbacks are
//! `detector: u8, quality: u8, fragments: u32, energy: f64, timestamp: f64`.

mod error;
mod format;
mod reader;
mod writer;

pub use error::EventFileError;
pub use reader::EventFile;
pub use writer::EventFileWriter;

pub(crate) const MAGIC: [u8; 4] = *b"GRFN";
pub(crate) const VERSION: u32 = 1;
