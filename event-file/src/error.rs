use griffin_common::{EventIndexError, IdError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not an event file, magic was {0:?}")]
    BadMagic([u8; 4]),
    #[error("Unsupported event file version {0}")]
    UnsupportedVersion(u32),
    #[error("Invalid quality flag {0}")]
    InvalidQuality(u8),
    #[error("Event {event}: {source}")]
    InvalidId {
        event: usize,
        #[source]
        source: IdError,
    },
    #[error("Event file ends part way through event {0}")]
    Truncated(usize),
    #[error(transparent)]
    OutOfRange(#[from] EventIndexError),
}
