use core::fmt::Debug;

use crate::frame::FRAME_LENGTH;

/// Reasons a frame is rejected.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame length is {0}, expected {}", FRAME_LENGTH)]
    Length(u16),

    #[error("checksum mismatch: frame carries {expected:#06x}, calculated {calculated:#06x}")]
    Checksum { expected: u16, calculated: u16 },

    /// Buffer too short to hold a frame
    #[error("malformed frame layout: {0}")]
    Layout(#[from] scroll::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error<E>
where
    E: Debug,
{
    /// Underlying serial error, other than `WouldBlock`.
    #[error("serial error: {0:?}")]
    Serial(E),

    /// Bounded read gave up before a complete frame arrived.
    #[error("no complete frame within {0} attempts")]
    SyncTimeout(usize),

    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),
}

impl<E: Debug> Error<E> {
    /// A rejected frame is worth another read; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Frame(_))
    }
}
