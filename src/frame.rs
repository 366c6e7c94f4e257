//! Wire layout of the data frame the sensor sends once per measurement cycle.
//!
//! All sixteen fields are big-endian `u16`. The checksum at offset 30 is the
//! wrapping sum of bytes `0..30`; it never covers its own two bytes.

use log::debug;
use scroll::{ctx, Endian, Pread, BE};

use crate::error::FrameError;

pub const FRAME_SIZE: usize = 32;
pub const FRAME_LENGTH: u16 = 28;
pub const MAGIC: [u8; 2] = [0x42, 0x4d];
pub const HEADER: u16 = 0x424d;

const CHECKED_BYTES: usize = FRAME_SIZE - 2;

/// Wrapping additive checksum used by both data and command frames.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, byte| sum.wrapping_add(u16::from(*byte)))
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub header: u16,
    pub frame_length: u16,
    /// PM1.0, CF=1 standard particle [μg/m³]
    pub pm1_0: u16,
    /// PM2.5, CF=1 standard particle [μg/m³]
    pub pm2_5: u16,
    /// PM10, CF=1 standard particle [μg/m³]
    pub pm10: u16,
    /// PM1.0 under atmospheric environment [μg/m³]
    pub pm1_0_atm: u16,
    /// PM2.5 under atmospheric environment [μg/m³]
    pub pm2_5_atm: u16,
    /// PM10 under atmospheric environment [μg/m³]
    pub pm10_atm: u16,
    /// Particles beyond 0.3 μm in 0.1 L of air
    pub beyond_0_3: u16,
    pub beyond_0_5: u16,
    pub beyond_1_0: u16,
    pub beyond_2_5: u16,
    pub beyond_5_0: u16,
    pub beyond_10_0: u16,
    pub reserved: u16,
    pub check: u16,
}

impl<'a> ctx::TryFromCtx<'a, Endian> for Frame {
    type Error = scroll::Error;

    fn try_from_ctx(src: &'a [u8], endian: Endian) -> Result<(Self, usize), Self::Error> {
        let offset = &mut 0;
        let frame = Frame {
            header: src.gread_with(offset, endian)?,
            frame_length: src.gread_with(offset, endian)?,
            pm1_0: src.gread_with(offset, endian)?,
            pm2_5: src.gread_with(offset, endian)?,
            pm10: src.gread_with(offset, endian)?,
            pm1_0_atm: src.gread_with(offset, endian)?,
            pm2_5_atm: src.gread_with(offset, endian)?,
            pm10_atm: src.gread_with(offset, endian)?,
            beyond_0_3: src.gread_with(offset, endian)?,
            beyond_0_5: src.gread_with(offset, endian)?,
            beyond_1_0: src.gread_with(offset, endian)?,
            beyond_2_5: src.gread_with(offset, endian)?,
            beyond_5_0: src.gread_with(offset, endian)?,
            beyond_10_0: src.gread_with(offset, endian)?,
            reserved: src.gread_with(offset, endian)?,
            check: src.gread_with(offset, endian)?,
        };
        Ok((frame, *offset))
    }
}

impl Frame {
    ///
    /// Builds a well-formed frame around the given readings: header, length 28
    /// and a matching checksum. `concentrations` holds the three CF=1 values
    /// followed by the three atmospheric ones, `particles` the six count bins
    /// from 0.3 μm up to 10 μm.
    ///
    pub fn new(concentrations: [u16; 6], particles: [u16; 6]) -> Self {
        let [pm1_0, pm2_5, pm10, pm1_0_atm, pm2_5_atm, pm10_atm] = concentrations;
        let [beyond_0_3, beyond_0_5, beyond_1_0, beyond_2_5, beyond_5_0, beyond_10_0] = particles;

        let mut frame = Frame {
            header: HEADER,
            frame_length: FRAME_LENGTH,
            pm1_0,
            pm2_5,
            pm10,
            pm1_0_atm,
            pm2_5_atm,
            pm10_atm,
            beyond_0_3,
            beyond_0_5,
            beyond_1_0,
            beyond_2_5,
            beyond_5_0,
            beyond_10_0,
            reserved: 0,
            check: 0,
        };
        frame.check = checksum(&frame.to_bytes()[..CHECKED_BYTES]);
        frame
    }

    ///
    /// Decodes and validates a raw frame. The length field is checked before
    /// the checksum, so a wrong length is reported even when the sum matches.
    ///
    pub fn from_bytes(buffer: &[u8; FRAME_SIZE]) -> Result<Self, FrameError> {
        Self::from_slice(buffer)
    }

    ///
    /// Same as [`from_bytes`](Self::from_bytes) for a frame at the start of
    /// `buffer`. Bytes past the first 32 are ignored; a shorter buffer is a
    /// `FrameError::Layout`.
    ///
    pub fn from_slice(buffer: &[u8]) -> Result<Self, FrameError> {
        let frame: Frame = buffer.pread_with(0, BE)?;

        if frame.frame_length != FRAME_LENGTH {
            debug!(
                "length {} in {:02x?}",
                frame.frame_length,
                &buffer[..FRAME_SIZE]
            );
            return Err(FrameError::Length(frame.frame_length));
        }

        let calculated = checksum(&buffer[..CHECKED_BYTES]);
        if calculated != frame.check {
            debug!("checksum mismatch in {:02x?}", &buffer[..FRAME_SIZE]);
            return Err(FrameError::Checksum {
                expected: frame.check,
                calculated,
            });
        }

        Ok(frame)
    }

    /// Encodes the fields back into wire order. The checksum is written as is.
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut buffer = [0_u8; FRAME_SIZE];
        for (chunk, field) in buffer.chunks_exact_mut(2).zip(self.fields().iter()) {
            chunk.copy_from_slice(&field.to_be_bytes());
        }
        buffer
    }

    /// All sixteen fields in wire order.
    pub fn fields(&self) -> [u16; 16] {
        [
            self.header,
            self.frame_length,
            self.pm1_0,
            self.pm2_5,
            self.pm10,
            self.pm1_0_atm,
            self.pm2_5_atm,
            self.pm10_atm,
            self.beyond_0_3,
            self.beyond_0_5,
            self.beyond_1_0,
            self.beyond_2_5,
            self.beyond_5_0,
            self.beyond_10_0,
            self.reserved,
            self.check,
        ]
    }
}
