use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use pms7003_json::device_id::device_id;
use pms7003_json::io::{self as serial, IoSerial, PortConfig, DEFAULT_BAUD_RATE};
use pms7003_json::json::render;
use pms7003_json::{Pms7003Sensor, ReadOptions};

type Sensor = Pms7003Sensor<IoSerial<Box<dyn serialport::SerialPort>>>;

/// Read one PMS 7003 frame from a serial device and print it as JSON
#[derive(Parser, Debug)]
#[command(name = "pms7003-json", version, about)]
struct Cli {
    /// Serial device the sensor is attached to
    #[arg(default_value = "/dev/ttyS0")]
    device: String,

    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud_rate: u32,

    /// Serial read timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Give up after this many idle reads or discarded bytes instead of waiting forever
    #[arg(long)]
    sync_attempts: Option<usize>,

    /// Keep printing frames, one JSON object per line
    #[arg(short, long)]
    continuous: bool,

    /// Use this device id instead of the CPU serial number
    #[arg(long)]
    serial_id: Option<String>,

    /// Switch the sensor to passive mode and request every frame
    #[arg(long)]
    passive: bool,

    /// Wake the sensor before reading and put it to sleep afterwards
    #[arg(long, conflicts_with = "continuous")]
    sleep_after: bool,
}

fn publish(sensor: &mut Sensor, cli: &Cli, serial_cpu: &str) -> Result<()> {
    if cli.passive {
        sensor
            .passive()
            .context("Failed to switch the sensor to passive mode")?;
    }

    let options = ReadOptions {
        passive: cli.passive,
        sync_attempts: cli.sync_attempts,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    loop {
        let frame = sensor
            .next_frame(&options)
            .context("Failed to read a frame")?;
        let json = render(&frame, serial_cpu)?;

        if cli.continuous {
            writeln!(out, "{}", json)?;
        } else {
            write!(out, "{}", json)?;
        }
        out.flush()?;

        if !cli.continuous {
            return Ok(());
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = PortConfig::new(&cli.device)
        .with_baud_rate(cli.baud_rate)
        .with_timeout(Duration::from_millis(cli.timeout_ms));
    let port = serial::open(&config)
        .with_context(|| format!("Failed to open serial device: {}", cli.device))?;
    info!("connected to {} at {} baud", config.path, config.baud_rate);

    let serial_cpu = match &cli.serial_id {
        Some(id) => id.clone(),
        None => device_id(),
    };

    let mut sensor = Pms7003Sensor::new(port);
    if cli.sleep_after {
        sensor.while_awake(|sensor| publish(sensor, &cli, &serial_cpu))
    } else {
        publish(&mut sensor, &cli, &serial_cpu)
    }
}
