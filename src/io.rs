//! Bridges `std::io` streams, such as a `serialport` port, to the
//! embedded-hal serial traits the sensor driver is written against.

use std::io::{self, ErrorKind};
use std::time::Duration;

use embedded_hal::serial::{Read, Write};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// The sensor talks at a fixed 9600 baud, 8N1.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

#[derive(Debug, Clone)]
pub struct PortConfig {
    pub path: String,
    pub baud_rate: u32,
    /// How long a single byte read may block before reporting `WouldBlock`
    pub timeout: Duration,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            path: String::from("/dev/ttyS0"),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_secs(1),
        }
    }
}

impl PortConfig {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Default::default()
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Opens the serial device described by `config`.
pub fn open(config: &PortConfig) -> serialport::Result<IoSerial<Box<dyn SerialPort>>> {
    let port = serialport::new(&config.path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.timeout)
        .open()?;

    Ok(IoSerial::new(port))
}

///
/// Byte-at-a-time serial over any `std::io` stream. Timeouts surface as
/// `nb::Error::WouldBlock`; a stream that reports end of file is an error.
///
pub struct IoSerial<T> {
    inner: T,
}

impl<T> IoSerial<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn map_io_error(err: io::Error) -> nb::Error<io::Error> {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => {
            nb::Error::WouldBlock
        }
        _ => nb::Error::Other(err),
    }
}

impl<T: io::Read> Read<u8> for IoSerial<T> {
    type Error = io::Error;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        match self.inner.read(&mut byte) {
            Ok(0) => Err(nb::Error::Other(io::Error::new(
                ErrorKind::UnexpectedEof,
                "serial stream closed",
            ))),
            Ok(_) => Ok(byte[0]),
            Err(err) => Err(map_io_error(err)),
        }
    }
}

impl<T: io::Write> Write<u8> for IoSerial<T> {
    type Error = io::Error;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        match self.inner.write(&[word]) {
            Ok(0) => Err(nb::Error::Other(io::Error::new(
                ErrorKind::WriteZero,
                "serial stream refused the byte",
            ))),
            Ok(_) => Ok(()),
            Err(err) => Err(map_io_error(err)),
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.inner.flush().map_err(map_io_error)
    }
}
