use log::trace;

use crate::frame::MAGIC;

#[derive(PartialEq, Debug)]
pub(crate) enum ReadStatus {
    InProgress,
    Finished,
    Failed,
}

enum State {
    WaitingForFirstMagicNumber,
    WaitingForSecondMagicNumber,
    Reading,
    Finished,
    Failed,
}

///
/// Fills a frame buffer one poll at a time. A poll is either a received byte
/// or `None` when the serial had nothing to give. Every idle poll and every
/// byte discarded while looking for the frame start costs one retry; the read
/// fails once a retry is needed and none are left.
///
pub(crate) struct ReadStateMachine<'a> {
    buffer: &'a mut [u8],
    index: usize,
    state: State,
    retries: usize,
}

impl<'a> ReadStateMachine<'a> {
    pub(crate) fn new(buffer: &'a mut [u8], retries: usize) -> Self {
        Self {
            buffer,
            index: 0,
            state: State::WaitingForFirstMagicNumber,
            retries,
        }
    }

    fn retry(&mut self) {
        if self.retries == 0 {
            self.state = State::Failed;
        } else {
            self.retries -= 1;
        }
    }

    fn discard(&mut self, byte: u8) {
        trace!("discarding {:#04x} while waiting for frame start", byte);
        self.state = State::WaitingForFirstMagicNumber;
        self.retry();
    }

    fn magic_number_read(&mut self) {
        self.buffer[..MAGIC.len()].copy_from_slice(&MAGIC);
        self.index = MAGIC.len();
        self.state = State::Reading;
        self.finish_if_full();
    }

    fn byte_read(&mut self, byte: u8) {
        self.buffer[self.index] = byte;
        self.index += 1;
        self.finish_if_full();
    }

    fn finish_if_full(&mut self) {
        if self.index == self.buffer.len() {
            self.state = State::Finished;
        }
    }

    pub(crate) fn update(&mut self, polled: Option<u8>) -> ReadStatus {
        match self.state {
            State::WaitingForFirstMagicNumber => match polled {
                Some(byte) if byte == MAGIC[0] => {
                    self.state = State::WaitingForSecondMagicNumber
                }
                Some(byte) => self.discard(byte),
                None => self.retry(),
            },
            State::WaitingForSecondMagicNumber => match polled {
                Some(byte) if byte == MAGIC[1] => self.magic_number_read(),
                // A repeated first magic number may still start the frame
                Some(byte) if byte == MAGIC[0] => self.retry(),
                Some(byte) => self.discard(byte),
                None => self.retry(),
            },
            State::Reading => match polled {
                Some(byte) => self.byte_read(byte),
                None => self.retry(),
            },
            State::Finished | State::Failed => {}
        };

        match self.state {
            State::WaitingForFirstMagicNumber
            | State::WaitingForSecondMagicNumber
            | State::Reading => ReadStatus::InProgress,
            State::Finished => ReadStatus::Finished,
            State::Failed => ReadStatus::Failed,
        }
    }
}
