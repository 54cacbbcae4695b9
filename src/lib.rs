//! Calibration-constant client for Fluke NetDAQ 2640A/2645A units.
//!
//! The serial admin port of these units speaks a small line protocol: every
//! command is answered by data lines and a prompt (`=>`, `!>` or `?>`). This
//! crate identifies the unit, reads back its calibration constants and can
//! issue the privileged reboot. No logging data is available on this port.
//!
//! Constants are printed by the firmware as rounded decimal text, so the
//! 32-bit patterns recovered here are the nearest single-precision floats to
//! that text and may differ from the stored values in the last bits.
//!
//! # Features
//!
//! - `serial` - Serial port transport using the serialport crate
//! - `cli` (default) - The `netdaq-cal` command line tool, implies `serial`
//!
//! # Example
//!
//! ```ignore
//! use netdaq_cal::{CalSession, SerialTransport, SessionConfig, DEFAULT_BAUD_RATE};
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0", DEFAULT_BAUD_RATE)?;
//! let mut session = CalSession::new(transport, SessionConfig::default());
//!
//! println!("connected to: {}", session.identify()?);
//! session.dump_cal(&mut std::io::stdout())?;
//! ```

mod prompt;
mod session;
mod table;
mod transport;
mod types;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use prompt::{Line, LineKind, Prompt, PromptSync};
pub use session::{CalSession, SessionState};
pub use table::{CAL_TABLE, CalFunction, CalibrationEntry, MAX_CAL_ID, dump_ids, lookup};
pub use transport::InstrumentTransport;
pub use types::{
    CalError, CalibrationReading, DumpSummary, InvalidId, PromptPolicy, QueryOutcome,
    SessionConfig,
};

#[cfg(feature = "serial")]
pub use serial::{DEFAULT_BAUD_RATE, SerialTransport};
