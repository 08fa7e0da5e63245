use anyhow::{Context, Result};
use tokio::io::AsyncWrite;
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};
use tracing::{info, warn};

use crate::FcConfig;

pub const DEFAULT_BAUD: u32 = 115200;

pub type FcSink = Box<dyn AsyncWrite + Unpin + Send>;

/// Opens the flight controller UART, 8N1.
pub fn open_serial(dev: &str, baud: u32) -> Result<tokio_serial::SerialStream> {
    tokio_serial::new(dev, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .open_native_async()
        .with_context(|| format!("open fc serial device {}", dev))
}

/// Serial port from config, or a sink that drops everything when no device is set.
pub fn open_sink(cfg: &FcConfig) -> Result<FcSink> {
    match cfg.serial_dev.as_deref() {
        Some(dev) if !dev.is_empty() => {
            let baud = cfg.baud.unwrap_or(DEFAULT_BAUD);
            let port = open_serial(dev, baud)?;
            info!("fc: serial {} @ {}", dev, baud);
            Ok(Box::new(port))
        }
        _ => {
            warn!("fc: no serial_dev configured, RC frames are discarded");
            Ok(Box::new(tokio::io::sink()))
        }
    }
}
