//! Serial port transport for desktop using serialport crate

use crate::transport::InstrumentTransport;
use serialport::{DataBits, FlowControl, Parity, StopBits};
use std::io::ErrorKind;
use std::time::Duration;

/// Baud rate of the NetDAQ admin port.
pub const DEFAULT_BAUD_RATE: u32 = 19200;

pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open the port with 8-N-1 framing and discard anything left in the input buffer.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_secs(1))
            .open()?;
        port.clear(serialport::ClearBuffer::Input)?;

        Ok(Self { port })
    }
}

impl InstrumentTransport for SerialTransport {
    type Error = std::io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let written = std::io::Write::write(&mut self.port, data)?;
        std::io::Write::flush(&mut self.port)?;
        Ok(written)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        self.port
            .set_timeout(Duration::from_millis(timeout_ms as u64))
            .map_err(std::io::Error::other)?;
        match std::io::Read::read(&mut self.port, buf) {
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn clear_input(&mut self) -> Result<(), Self::Error> {
        self.port
            .clear(serialport::ClearBuffer::Input)
            .map_err(std::io::Error::other)
    }
}
