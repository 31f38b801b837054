use crate::EventFrame;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Event {index} is out of range, source has {len} events")]
pub struct EventIndexError {
    pub index: usize,
    pub len: usize,
}

/// Random access to the events of a run, by entry number.
pub trait EventSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn event(&mut self, index: usize) -> Result<EventFrame, Self::Error>;
}

/// An in-memory run.
#[derive(Debug, Default, Clone)]
pub struct VecEventSource {
    frames: Vec<EventFrame>,
}

impl VecEventSource {
    pub fn new(frames: Vec<EventFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[EventFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<EventFrame> {
        self.frames
    }
}

impl From<Vec<EventFrame>> for VecEventSource {
    fn from(frames: Vec<EventFrame>) -> Self {
        Self::new(frames)
    }
}

impl EventSource for VecEventSource {
    type Error = EventIndexError;

    fn len(&self) -> usize {
        self.frames.len()
    }

    fn event(&mut self, index: usize) -> Result<EventFrame, Self::Error> {
        self.frames.get(index).cloned().ok_or(EventIndexError {
            index,
            len: self.frames.len(),
        })
    }
}
