use serde::Serialize;

use crate::frame::Frame;

/// One measurement as published: atmospheric concentrations and particle counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measurement<'a> {
    pub serial_cpu: &'a str,
    pub pm1: u16,
    pub pm25: u16,
    pub pm10: u16,
    pub num_part_03: u16,
    pub num_part_05: u16,
    pub num_part_1: u16,
    pub num_part_25: u16,
    pub num_part_5: u16,
    pub num_part_10: u16,
}

impl<'a> Measurement<'a> {
    pub fn from_frame(frame: &Frame, serial_cpu: &'a str) -> Self {
        Self {
            serial_cpu,
            pm1: frame.pm1_0_atm,
            pm25: frame.pm2_5_atm,
            pm10: frame.pm10_atm,
            num_part_03: frame.beyond_0_3,
            num_part_05: frame.beyond_0_5,
            num_part_1: frame.beyond_1_0,
            num_part_25: frame.beyond_2_5,
            num_part_5: frame.beyond_5_0,
            num_part_10: frame.beyond_10_0,
        }
    }
}

/// Renders a frame as a single flat JSON object, without a trailing newline.
pub fn render(frame: &Frame, serial_cpu: &str) -> serde_json::Result<String> {
    serde_json::to_string(&Measurement::from_frame(frame, serial_cpu))
}
