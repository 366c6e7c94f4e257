//! Reads PMS 7003 air quality frames from a serial line and publishes them as JSON.

use core::fmt::Debug;

use embedded_hal::serial::{Read, Write};
use log::{trace, warn};
use nb::block;

pub mod command;
pub mod device_id;
pub mod error;
pub mod frame;
pub mod io;
pub mod json;
mod read_fsm;

pub use command::Command;
pub use error::{Error, FrameError};
pub use frame::Frame;

use command::RESPONSE_FRAME_SIZE;
use frame::{FRAME_SIZE, MAGIC};
use read_fsm::{ReadStateMachine, ReadStatus};

/// How [`Pms7003Sensor::next_frame`] gets its frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Request every frame instead of waiting for the sensor to send one
    pub passive: bool,
    /// Bound each read attempt, see [`Pms7003Sensor::read_bounded`]
    pub sync_attempts: Option<usize>,
}

pub struct Pms7003Sensor<Serial>
where
    Serial: Read<u8> + Write<u8>,
{
    serial: Serial,
}

impl<Serial, E> Pms7003Sensor<Serial>
where
    Serial: Read<u8, Error = E> + Write<u8, Error = E>,
    E: Debug,
{
    ///
    /// Creates a new sensor instance using a single object implementing embedded hal serial traits
    ///
    pub fn new(serial: Serial) -> Self {
        Self { serial }
    }

    ///
    /// Reads one frame. Blocks until the frame start is found and the rest of
    /// the frame has arrived. A frame failing validation is returned as
    /// `Error::Frame`; the caller decides whether to read again.
    ///
    pub fn read(&mut self) -> Result<Frame, Error<E>> {
        let mut buffer = [0_u8; FRAME_SIZE];

        self.synchronize()?;
        buffer[..MAGIC.len()].copy_from_slice(&MAGIC);

        for byte in buffer.iter_mut().skip(MAGIC.len()) {
            *byte = self.read_byte()?;
        }

        Ok(Frame::from_bytes(&buffer)?)
    }

    ///
    /// Reads until a frame passes validation. Serial errors still end the read.
    ///
    pub fn read_valid(&mut self) -> Result<Frame, Error<E>> {
        loop {
            match self.read() {
                Err(Error::Frame(err)) => warn!("discarding frame: {}", err),
                result => return result,
            }
        }
    }

    ///
    /// Like [`read`](Self::read), but gives up with `Error::SyncTimeout` once
    /// `attempts` idle polls or discarded bytes have been spent.
    ///
    pub fn read_bounded(&mut self, attempts: usize) -> Result<Frame, Error<E>> {
        let mut buffer = [0_u8; FRAME_SIZE];
        let mut fsm = ReadStateMachine::new(&mut buffer, attempts);

        loop {
            let polled = match self.serial.read() {
                Ok(byte) => Some(byte),
                Err(nb::Error::WouldBlock) => None,
                Err(nb::Error::Other(err)) => return Err(Error::Serial(err)),
            };

            match fsm.update(polled) {
                ReadStatus::InProgress => continue,
                ReadStatus::Finished => break,
                ReadStatus::Failed => return Err(Error::SyncTimeout(attempts)),
            }
        }

        Ok(Frame::from_bytes(&buffer)?)
    }

    ///
    /// Reads the next valid frame the way `options` asks for: in passive mode
    /// every attempt is preceded by a request, and with `sync_attempts` set
    /// each attempt is a bounded read. Rejected frames are retried.
    ///
    pub fn next_frame(&mut self, options: &ReadOptions) -> Result<Frame, Error<E>> {
        if !options.passive && options.sync_attempts.is_none() {
            return self.read_valid();
        }

        loop {
            if options.passive {
                self.request()?;
            }

            let result = match options.sync_attempts {
                Some(attempts) => self.read_bounded(attempts),
                None => self.read(),
            };

            match result {
                Err(Error::Frame(err)) => warn!("discarding frame: {}", err),
                result => return result,
            }
        }
    }

    ///
    /// Wakes the sensor, runs `work` and puts the sensor back to sleep, also
    /// when `work` fails. An error from `work` wins over one from `sleep`.
    ///
    pub fn while_awake<T, X, F>(&mut self, work: F) -> Result<T, X>
    where
        F: FnOnce(&mut Self) -> Result<T, X>,
        X: From<Error<E>>,
    {
        self.wake()?;
        let result = work(self);
        let slept = self.sleep();
        let value = result?;
        slept?;
        Ok(value)
    }

    pub fn sleep(&mut self) -> Result<(), Error<E>> {
        self.send(Command::Sleep)
    }

    pub fn wake(&mut self) -> Result<(), Error<E>> {
        self.send(Command::Wake)
    }

    ///
    /// Passive mode - sensor reports air quality on request
    ///
    pub fn passive(&mut self) -> Result<(), Error<E>> {
        self.send(Command::Passive)
    }

    ///
    /// Active mode - sensor reports air quality continuously
    ///
    pub fn active(&mut self) -> Result<(), Error<E>> {
        self.send(Command::Active)
    }

    ///
    /// Requests status in passive mode
    ///
    pub fn request(&mut self) -> Result<(), Error<E>> {
        self.send(Command::Request)
    }

    pub fn release(self) -> Serial {
        self.serial
    }

    fn send(&mut self, command: Command) -> Result<(), Error<E>> {
        for byte in command.to_bytes().iter() {
            block!(self.serial.write(*byte)).map_err(Error::Serial)?;
        }
        block!(self.serial.flush()).map_err(Error::Serial)?;

        if command.expects_response() {
            self.receive_response()?;
        }
        Ok(())
    }

    fn receive_response(&mut self) -> Result<(), Error<E>> {
        for _ in 0..RESPONSE_FRAME_SIZE {
            self.read_byte()?;
        }
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), Error<E>> {
        let mut byte = self.read_byte()?;
        loop {
            if byte != MAGIC[0] {
                trace!("discarding {:#04x} while waiting for frame start", byte);
                byte = self.read_byte()?;
                continue;
            }
            byte = self.read_byte()?;
            if byte == MAGIC[1] {
                return Ok(());
            }
        }
    }

    fn read_byte(&mut self) -> Result<u8, Error<E>> {
        block!(self.serial.read()).map_err(Error::Serial)
    }
}

impl<TX, RX> Pms7003Sensor<Wrapper<TX, RX>>
where
    TX: Write<u8>,
    RX: Read<u8>,
    TX::Error: Debug,
    RX::Error: Debug,
{
    ///
    /// Creates a new sensor instance using separate Read and Write embedded hal trait objects
    ///
    pub fn new_tx_rx(tx: TX, rx: RX) -> Self {
        Self::new(Wrapper(tx, rx))
    }
}

/// Error of either half of a [`Wrapper`].
#[derive(Debug, PartialEq, Eq)]
pub enum WrapperError<TxError, RxError> {
    Tx(TxError),
    Rx(RxError),
}

///
/// Combines two serial traits objects into one
///
pub struct Wrapper<TX, RX>(TX, RX)
where
    TX: Write<u8>,
    RX: Read<u8>;

impl<TX, RX> Read<u8> for Wrapper<TX, RX>
where
    TX: Write<u8>,
    RX: Read<u8>,
{
    type Error = WrapperError<TX::Error, RX::Error>;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.1.read().map_err(|err| match err {
            nb::Error::WouldBlock => nb::Error::WouldBlock,
            nb::Error::Other(err) => nb::Error::Other(WrapperError::Rx(err)),
        })
    }
}

impl<TX, RX> Write<u8> for Wrapper<TX, RX>
where
    TX: Write<u8>,
    RX: Read<u8>,
{
    type Error = WrapperError<TX::Error, RX::Error>;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.0.write(word).map_err(tx_error)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.0.flush().map_err(tx_error)
    }
}

fn tx_error<TxError, RxError>(
    err: nb::Error<TxError>,
) -> nb::Error<WrapperError<TxError, RxError>> {
    match err {
        nb::Error::WouldBlock => nb::Error::WouldBlock,
        nb::Error::Other(err) => nb::Error::Other(WrapperError::Tx(err)),
    }
}
