//! Calibration-constant table, in firmware storage order

use std::fmt;

/// Measurement function a calibration constant belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalFunction {
    VoltageDc,
    VoltageAc,
    Resistance,
    Frequency,
}

impl CalFunction {
    /// Short tag used in dump reports
    pub fn tag(&self) -> &'static str {
        match self {
            CalFunction::VoltageDc => "VDC",
            CalFunction::VoltageAc => "VAC",
            CalFunction::Resistance => "OHMS",
            CalFunction::Frequency => "FREQ",
        }
    }
}

impl fmt::Display for CalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One calibration point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationEntry {
    pub id: u32,
    pub function: CalFunction,
    pub label: &'static str,
}

/// Highest addressable calibration-constant id
pub const MAX_CAL_ID: u32 = 60;

const fn entry(id: u32, function: CalFunction, label: &'static str) -> CalibrationEntry {
    CalibrationEntry { id, function, label }
}

use CalFunction::{Frequency, Resistance, VoltageAc, VoltageDc};

/// Every even id from 0 to [`MAX_CAL_ID`], in order. Entry `n` holds id `2n`.
pub static CAL_TABLE: [CalibrationEntry; 31] = [
    entry(0, VoltageDc, "90 mV Gain"),
    entry(2, VoltageDc, "90 mV Offset"),
    entry(4, VoltageDc, "300 mV Gain"),
    entry(6, VoltageDc, "300 mV Offset"),
    entry(8, VoltageDc, "3 V Gain"),
    entry(10, VoltageDc, "3 V Offset"),
    entry(12, VoltageDc, "30 V Gain"),
    entry(14, VoltageDc, "30 V Offset"),
    entry(16, VoltageDc, "150/300 V Gain"),
    entry(18, VoltageDc, "150/300 V Offset"),
    entry(20, VoltageAc, "300 mV Gain"),
    entry(22, VoltageAc, "300 mV Offset"),
    entry(24, VoltageAc, "3 V Gain"),
    entry(26, VoltageAc, "3 V Offset"),
    entry(28, VoltageAc, "30 V Gain"),
    entry(30, VoltageAc, "30 V Offset"),
    entry(32, VoltageAc, "150/300 V Gain"),
    entry(34, VoltageAc, "150/300 V Offset"),
    entry(36, Resistance, "300 Ohm Gain"),
    entry(38, Resistance, "300 Ohm Offset"),
    entry(40, Resistance, "3 kOhm Gain"),
    entry(42, Resistance, "3 kOhm Offset"),
    entry(44, Resistance, "30 kOhm Gain"),
    entry(46, Resistance, "30 kOhm Offset"),
    entry(48, Resistance, "300 kOhm Gain"),
    entry(50, Resistance, "300 kOhm Offset"),
    entry(52, Resistance, "3 MOhm Gain"),
    entry(54, Resistance, "3 MOhm Offset"),
    entry(56, Resistance, "4-Wire Lead Offset"),
    entry(58, Frequency, "Timebase Gain"),
    entry(60, Frequency, "Timebase Offset"),
];

/// Find the table entry for `id`
pub fn lookup(id: u32) -> Option<&'static CalibrationEntry> {
    if id % 2 != 0 {
        return None;
    }
    CAL_TABLE.get((id / 2) as usize).filter(|e| e.id == id)
}

/// The ids a full dump walks, ascending
pub fn dump_ids() -> impl Iterator<Item = u32> {
    (0..=MAX_CAL_ID).step_by(2)
}
