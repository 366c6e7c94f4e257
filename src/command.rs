use crate::frame::{checksum, MAGIC};

pub const COMMAND_FRAME_SIZE: usize = 7;
pub const RESPONSE_FRAME_SIZE: usize = 8;

/// Host to sensor commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Sleep,
    Wake,
    /// Sensor reports only on request
    Passive,
    /// Sensor reports continuously
    Active,
    /// Asks for one frame in passive mode
    Request,
}

impl Command {
    fn code(self) -> (u8, u16) {
        match self {
            Command::Sleep => (0xe4, 0),
            Command::Wake => (0xe4, 1),
            Command::Passive => (0xe1, 0),
            Command::Active => (0xe1, 1),
            Command::Request => (0xe2, 0),
        }
    }

    /// Whether the sensor acknowledges the command with an 8-byte response.
    pub fn expects_response(self) -> bool {
        matches!(self, Command::Wake | Command::Passive | Command::Active)
    }

    pub fn to_bytes(self) -> [u8; COMMAND_FRAME_SIZE] {
        let (cmd, data) = self.code();
        let [data_hi, data_lo] = data.to_be_bytes();

        let mut buffer = [MAGIC[0], MAGIC[1], cmd, data_hi, data_lo, 0, 0];
        let check = checksum(&buffer[..COMMAND_FRAME_SIZE - 2]);
        buffer[COMMAND_FRAME_SIZE - 2..].copy_from_slice(&check.to_be_bytes());
        buffer
    }
}
