use std::collections::VecDeque;
use std::io::Cursor;

use pms7003_json::command::{Command, RESPONSE_FRAME_SIZE};
use pms7003_json::frame::{checksum, FRAME_SIZE};
use pms7003_json::io::IoSerial;
use pms7003_json::json::render;
use pms7003_json::{Error, Frame, FrameError, Pms7003Sensor, ReadOptions};

/// Serial double: `Some(byte)` is delivered, `None` reports `WouldBlock`.
/// Once the script runs out every read fails. Written bytes are kept.
struct ScriptedSerial {
    script: VecDeque<Option<u8>>,
    sent: Vec<u8>,
}

#[derive(Debug, PartialEq)]
struct Exhausted;

impl ScriptedSerial {
    fn new(bytes: &[u8]) -> Self {
        Self {
            script: bytes.iter().map(|b| Some(*b)).collect(),
            sent: Vec::new(),
        }
    }

    fn idle(mut self, polls: usize) -> Self {
        for _ in 0..polls {
            self.script.push_back(None);
        }
        self
    }

    fn then(mut self, bytes: &[u8]) -> Self {
        self.script.extend(bytes.iter().map(|b| Some(*b)));
        self
    }
}

impl embedded_hal::serial::Read<u8> for ScriptedSerial {
    type Error = Exhausted;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        match self.script.pop_front() {
            Some(Some(byte)) => Ok(byte),
            Some(None) => Err(nb::Error::WouldBlock),
            None => Err(nb::Error::Other(Exhausted)),
        }
    }
}

impl embedded_hal::serial::Write<u8> for ScriptedSerial {
    type Error = Exhausted;

    fn write(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        self.sent.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

fn valid_frame() -> [u8; FRAME_SIZE] {
    Frame::new([10, 25, 40, 9, 22, 37], [1500, 420, 80, 12, 3, 1]).to_bytes()
}

#[test]
fn reads_frame_after_noise() {
    let serial = ScriptedSerial::new(&[0x00, 0x4d, 0x42, 0x00, 0x13]).then(&valid_frame());
    let mut pms = Pms7003Sensor::new(serial);

    let frame = pms.read().unwrap();
    assert_eq!(frame.pm2_5_atm, 22);
    assert_eq!(frame.beyond_0_3, 1500);
    assert_eq!(frame.to_bytes(), valid_frame());
}

#[test]
fn synchronizes_on_repeated_first_magic_number() {
    let serial = ScriptedSerial::new(&[0x42]).then(&valid_frame());
    let mut pms = Pms7003Sensor::new(serial);

    assert_eq!(pms.read().unwrap().pm10_atm, 37);
}

#[test]
fn would_block_is_waited_out() {
    let frame = valid_frame();
    let serial = ScriptedSerial::new(&frame[..10])
        .idle(50)
        .then(&frame[10..]);
    let mut pms = Pms7003Sensor::new(serial);

    assert_eq!(pms.read().unwrap().pm1_0, 10);
}

#[test]
fn stream_without_frame_start_never_yields_a_frame() {
    let noise: Vec<u8> = (0..200u16).map(|i| (i % 0x42) as u8).collect();
    let mut pms = Pms7003Sensor::new(ScriptedSerial::new(&noise));

    assert!(matches!(pms.read(), Err(Error::Serial(Exhausted))));
}

#[test]
fn wrong_length_is_rejected() {
    let mut bytes = valid_frame();
    bytes[3] = 0x1d;
    let sum = checksum(&bytes[..30]);
    bytes[30..].copy_from_slice(&sum.to_be_bytes());
    let mut pms = Pms7003Sensor::new(ScriptedSerial::new(&bytes));

    match pms.read() {
        Err(Error::Frame(FrameError::Length(29))) => {}
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn corrupted_frame_is_rejected_and_next_one_read() {
    let mut corrupted = valid_frame();
    corrupted[12] ^= 0x10;
    let serial = ScriptedSerial::new(&corrupted).then(&valid_frame());
    let mut pms = Pms7003Sensor::new(serial);

    let err = pms.read().unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(err, Error::Frame(FrameError::Checksum { .. })));
    assert_eq!(pms.read().unwrap().pm1_0_atm, 9);
}

#[test]
fn read_valid_skips_rejected_frames() {
    let mut corrupted = valid_frame();
    corrupted[20] = 0xff;
    let serial = ScriptedSerial::new(&corrupted)
        .then(&corrupted)
        .then(&valid_frame());
    let mut pms = Pms7003Sensor::new(serial);

    assert_eq!(pms.read_valid().unwrap().beyond_1_0, 80);
}

#[test]
fn read_valid_stops_on_serial_error() {
    let mut corrupted = valid_frame();
    corrupted[20] = 0xff;
    let mut pms = Pms7003Sensor::new(ScriptedSerial::new(&corrupted));

    assert!(matches!(pms.read_valid(), Err(Error::Serial(Exhausted))));
}

#[test]
fn bounded_read_tolerates_noise_within_budget() {
    let serial = ScriptedSerial::new(&[0x00, 0x01])
        .idle(3)
        .then(&valid_frame());
    let mut pms = Pms7003Sensor::new(serial);

    assert_eq!(pms.read_bounded(5).unwrap().beyond_5_0, 3);
}

#[test]
fn bounded_read_gives_up_when_budget_is_spent() {
    let serial = ScriptedSerial::new(&[0x00; 4])
        .idle(2)
        .then(&valid_frame());
    let mut pms = Pms7003Sensor::new(serial);

    assert!(matches!(pms.read_bounded(5), Err(Error::SyncTimeout(5))));
}

#[test]
fn bounded_read_validates_frame() {
    let mut bytes = valid_frame();
    bytes[30] ^= 0x01;
    let mut pms = Pms7003Sensor::new(ScriptedSerial::new(&bytes));

    assert!(matches!(
        pms.read_bounded(0),
        Err(Error::Frame(FrameError::Checksum { .. }))
    ));
}

#[test]
fn frame_from_io_stream_renders_as_json() {
    let mut stream = vec![0xaa, 0x42];
    stream.extend_from_slice(&valid_frame());
    let mut pms = Pms7003Sensor::new(IoSerial::new(Cursor::new(stream)));

    let frame = pms.read().unwrap();
    assert_eq!(
        render(&frame, "0000000012345678").unwrap(),
        "{\"serial_cpu\":\"0000000012345678\",\"pm1\":9,\"pm25\":22,\"pm10\":37,\
         \"num_part_03\":1500,\"num_part_05\":420,\"num_part_1\":80,\
         \"num_part_25\":12,\"num_part_5\":3,\"num_part_10\":1}"
    );

    let err = pms.read().unwrap_err();
    assert!(!err.is_retryable());
}

fn commands(list: &[Command]) -> Vec<u8> {
    list.iter().flat_map(|command| command.to_bytes().to_vec()).collect()
}

#[test]
fn next_frame_in_passive_mode_requests_each_attempt() {
    let mut corrupted = valid_frame();
    corrupted[9] ^= 0x04;
    let serial = ScriptedSerial::new(&corrupted).then(&valid_frame());
    let mut pms = Pms7003Sensor::new(serial);
    let options = ReadOptions {
        passive: true,
        sync_attempts: None,
    };

    assert_eq!(pms.next_frame(&options).unwrap().pm10, 40);
    assert_eq!(
        pms.release().sent,
        commands(&[Command::Request, Command::Request])
    );
}

#[test]
fn next_frame_retries_rejected_bounded_reads() {
    let mut corrupted = valid_frame();
    corrupted[31] ^= 0x01;
    let serial = ScriptedSerial::new(&corrupted)
        .idle(2)
        .then(&valid_frame());
    let mut pms = Pms7003Sensor::new(serial);
    let options = ReadOptions {
        passive: false,
        sync_attempts: Some(2),
    };

    assert_eq!(pms.next_frame(&options).unwrap().beyond_2_5, 12);
    assert!(pms.release().sent.is_empty());
}

#[test]
fn next_frame_gives_up_when_sensor_stays_silent() {
    let serial = ScriptedSerial::new(&[]).idle(4);
    let mut pms = Pms7003Sensor::new(serial);
    let options = ReadOptions {
        passive: true,
        sync_attempts: Some(3),
    };

    assert!(matches!(
        pms.next_frame(&options),
        Err(Error::SyncTimeout(3))
    ));
    assert_eq!(pms.release().sent, commands(&[Command::Request]));
}

#[test]
fn while_awake_sleeps_after_success() {
    let serial = ScriptedSerial::new(&[0u8; RESPONSE_FRAME_SIZE]).then(&valid_frame());
    let mut pms = Pms7003Sensor::new(serial);

    let frame = pms
        .while_awake(|pms| pms.next_frame(&ReadOptions::default()))
        .unwrap();

    assert_eq!(frame.pm1_0_atm, 9);
    assert_eq!(
        pms.release().sent,
        commands(&[Command::Wake, Command::Sleep])
    );
}

#[test]
fn while_awake_sleeps_when_reading_fails() {
    let serial = ScriptedSerial::new(&[0u8; RESPONSE_FRAME_SIZE]).idle(2);
    let mut pms = Pms7003Sensor::new(serial);

    let result = pms.while_awake(|pms| pms.read_bounded(1));

    assert!(matches!(result, Err(Error::SyncTimeout(1))));
    assert_eq!(
        pms.release().sent,
        commands(&[Command::Wake, Command::Sleep])
    );
}
