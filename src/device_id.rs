//! Identifies the host publishing the measurements by its CPU serial number.

use std::io;
use std::process::{Command, Stdio};

use log::{debug, warn};

/// Reported when no identifier could be obtained.
pub const UNAVAILABLE: &str = "not available id";
pub const MAX_ATTEMPTS: usize = 5;

const CPU_SERIAL_COMMAND: &str = "cat /proc/cpuinfo | grep Serial | cut -d ' ' -f 2";

/// Something that can be asked for an identifier, possibly more than once.
pub trait IdSource {
    fn query(&mut self) -> io::Result<String>;
}

/// Runs a shell pipeline and hands back whatever it printed.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    command: String,
}

impl ShellCommand {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

impl Default for ShellCommand {
    fn default() -> Self {
        Self::new(CPU_SERIAL_COMMAND)
    }
}

impl IdSource for ShellCommand {
    fn query(&mut self) -> io::Result<String> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
}

///
/// Asks `source` up to `attempts` times for a non-empty first line of output
/// and falls back to [`UNAVAILABLE`].
///
pub fn lookup<S: IdSource>(source: &mut S, attempts: usize) -> String {
    for attempt in 1..=attempts {
        match source.query() {
            Ok(output) => match first_line(&output) {
                Some(id) => return id,
                None => debug!("device id attempt {} returned nothing", attempt),
            },
            Err(err) => debug!("device id attempt {} failed: {}", attempt, err),
        }
    }

    warn!(
        "no device id after {} attempts, using {:?}",
        attempts, UNAVAILABLE
    );
    UNAVAILABLE.to_string()
}

/// CPU serial number of this host, as listed in `/proc/cpuinfo`.
pub fn device_id() -> String {
    lookup(&mut ShellCommand::default(), MAX_ATTEMPTS)
}
