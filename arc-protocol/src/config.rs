//! Decoding of the controller configuration word returned by `RCC`.
//!
//! | Bits  | Field                                  |
//! |-------|----------------------------------------|
//! | 0-2   | video processor                        |
//! | 3-4   | timing board                           |
//! | 5-6   | utility board                          |
//! | 7     | shutter                                |
//! | 8-9   | temperature readout calibration        |
//! | 10-14 | subarray, binning, split serial, split parallel, MPP |
//! | 15-16 | clock driver board                     |
//! | 17-19 | special implementation                 |
//! | 20-21 | continuous readout, selectable speed   |
//!
//! Decoding never fails. Values a field does not know about map to an explicit
//! reserved or unknown variant.
use std::fmt::Display;

use crate::commands::{
    BINNING, CONT_RD, MPP_CC, SEL_READ_SPEED, SHUTTER_CC, SPLIT_PARALLEL, SPLIT_SERIAL, SUBARRAY,
};

const fn field(word: u32, shift: u32, width: u32) -> u8 {
    ((word >> shift) & ((1 << width) - 1)) as u8
}

/// Bits 0-2
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VideoProcessor {
    Arc41,
    CcdGenI,
    Arc42,
    Arc44,
    Arc45,
    Arc46,
    Arc48,
    Arc47,
}

impl VideoProcessor {
    pub fn from_bits(bits: u8) -> VideoProcessor {
        match bits & 0x7 {
            0 => VideoProcessor::Arc41,
            1 => VideoProcessor::CcdGenI,
            2 => VideoProcessor::Arc42,
            3 => VideoProcessor::Arc44,
            4 => VideoProcessor::Arc45,
            5 => VideoProcessor::Arc46,
            6 => VideoProcessor::Arc48,
            _ => VideoProcessor::Arc47,
        }
    }

    /// The board part number, e.g. `ARC-42`
    pub fn part_number(&self) -> &'static str {
        match self {
            VideoProcessor::Arc41 => "ARC-41",
            VideoProcessor::CcdGenI => "Gen I",
            VideoProcessor::Arc42 => "ARC-42",
            VideoProcessor::Arc44 => "ARC-44",
            VideoProcessor::Arc45 => "ARC-45",
            VideoProcessor::Arc46 => "ARC-46",
            VideoProcessor::Arc48 => "ARC-48",
            VideoProcessor::Arc47 => "ARC-47",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VideoProcessor::Arc41 => "ARC-41 Dual Readout CCD",
            VideoProcessor::CcdGenI => "CCD Gen I",
            VideoProcessor::Arc42 => "ARC-42 Dual Readout IR",
            VideoProcessor::Arc44 => "ARC-44 Four Readout IR Coadder ( obsolete )",
            VideoProcessor::Arc45 => "ARC-45 Dual Readout CCD",
            VideoProcessor::Arc46 => "ARC-46 8-Channel IR",
            VideoProcessor::Arc48 => "ARC-48 8-Channel CCD",
            VideoProcessor::Arc47 => "ARC-47 4-Channel CCD",
        }
    }
}

/// Bits 3-4
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimingBoard {
    /// ARC-20, 50 MHz
    Rev4GenII,
    /// 40 MHz
    GenI,
    /// ARC-22, 250 MHz
    Rev5GenIII,
    Reserved,
}

impl TimingBoard {
    pub fn from_bits(bits: u8) -> TimingBoard {
        match bits & 0x3 {
            0 => TimingBoard::Rev4GenII,
            1 => TimingBoard::GenI,
            2 => TimingBoard::Rev5GenIII,
            _ => TimingBoard::Reserved,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimingBoard::Rev4GenII => "Rev. 4, Gen II",
            TimingBoard::GenI => "Gen I",
            TimingBoard::Rev5GenIII => "Rev. 5, Gen III, 250 MHz",
            TimingBoard::Reserved => "Reserved",
        }
    }
}

/// Bits 5-6
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UtilityBoard {
    None,
    /// ARC-50
    Rev3,
    Unknown(u8),
}

impl UtilityBoard {
    pub fn from_bits(bits: u8) -> UtilityBoard {
        match bits & 0x3 {
            0 => UtilityBoard::None,
            1 => UtilityBoard::Rev3,
            other => UtilityBoard::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UtilityBoard::None => "No utility board",
            UtilityBoard::Rev3 => "Utility Rev. 3",
            UtilityBoard::Unknown(_) => "Unknown",
        }
    }
}

/// Bits 8-9
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TempCalibration {
    None,
    /// Silicon diode with polynomial calibration
    Polynomial,
    Linear,
    Unknown,
}

impl TempCalibration {
    pub fn from_bits(bits: u8) -> TempCalibration {
        match bits & 0x3 {
            0 => TempCalibration::None,
            1 => TempCalibration::Polynomial,
            2 => TempCalibration::Linear,
            _ => TempCalibration::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TempCalibration::None => "No temperature readout",
            TempCalibration::Polynomial => "Polynomial Diode calibration",
            TempCalibration::Linear => "Linear temperature sensor calibration",
            TempCalibration::Unknown => "Unknown",
        }
    }
}

/// Bits 15-16
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockDriver {
    Rev3,
    /// ARC-32 CCD & IR clock driver
    Arc32,
    Reserved,
    /// Gen I systems have no separate clock driver board
    NoneGenI,
}

impl ClockDriver {
    pub fn from_bits(bits: u8) -> ClockDriver {
        match bits & 0x3 {
            0 => ClockDriver::Rev3,
            1 => ClockDriver::Arc32,
            2 => ClockDriver::Reserved,
            _ => ClockDriver::NoneGenI,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClockDriver::Rev3 => "Rev. 3",
            ClockDriver::Arc32 => "ARC-32 CCD & IR",
            ClockDriver::Reserved => "Reserved",
            ClockDriver::NoneGenI => "No clock driver board (Gen I)",
        }
    }
}

/// Bits 17-19
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpecialImpl {
    None,
    MountLaguna,
    NgstAladdin,
    Fo2xTransmitter,
    Other(u8),
}

impl SpecialImpl {
    pub fn from_bits(bits: u8) -> SpecialImpl {
        match bits & 0x7 {
            0 => SpecialImpl::None,
            1 => SpecialImpl::MountLaguna,
            2 => SpecialImpl::NgstAladdin,
            3 => SpecialImpl::Fo2xTransmitter,
            other => SpecialImpl::Other(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpecialImpl::None => "None",
            SpecialImpl::MountLaguna => "Mount Laguna Observatory",
            SpecialImpl::NgstAladdin => "NGST Aladdin",
            SpecialImpl::Fo2xTransmitter => "2x FO Transmitter",
            SpecialImpl::Other(_) => "Other",
        }
    }
}

macro_rules! impl_display_by_name {
    ($($ty:ty),*) => {
        $(
            impl Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.name())
                }
            }
        )*
    };
}

impl_display_by_name!(
    VideoProcessor,
    TimingBoard,
    UtilityBoard,
    TempCalibration,
    ClockDriver,
    SpecialImpl
);

/// A decoded controller configuration word.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoardConfig {
    word: u32,
    pub video_processor: VideoProcessor,
    pub timing_board: TimingBoard,
    pub utility_board: UtilityBoard,
    pub shutter: bool,
    pub temp_calibration: TempCalibration,
    pub subarray: bool,
    pub binning: bool,
    pub split_serial: bool,
    pub split_parallel: bool,
    /// MPP, inverted parallel clocks
    pub inverted_clocks: bool,
    pub clock_driver: ClockDriver,
    pub special_impl: SpecialImpl,
    pub continuous_readout: bool,
    pub selectable_speed: bool,
}

impl BoardConfig {
    pub fn decode(word: u32) -> BoardConfig {
        BoardConfig {
            word,
            video_processor: VideoProcessor::from_bits(field(word, 0, 3)),
            timing_board: TimingBoard::from_bits(field(word, 3, 2)),
            utility_board: UtilityBoard::from_bits(field(word, 5, 2)),
            shutter: word & SHUTTER_CC != 0,
            temp_calibration: TempCalibration::from_bits(field(word, 8, 2)),
            subarray: word & SUBARRAY != 0,
            binning: word & BINNING != 0,
            split_serial: word & SPLIT_SERIAL != 0,
            split_parallel: word & SPLIT_PARALLEL != 0,
            inverted_clocks: word & MPP_CC != 0,
            clock_driver: ClockDriver::from_bits(field(word, 15, 2)),
            special_impl: SpecialImpl::from_bits(field(word, 17, 3)),
            continuous_readout: word & CONT_RD != 0,
            selectable_speed: word & SEL_READ_SPEED != 0,
        }
    }

    /// The raw configuration word
    pub fn word(&self) -> u32 {
        self.word
    }

    /// One line per field, as printed by diagnostic tools
    pub fn to_string_list(&self) -> Vec<String> {
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        vec![
            format!("Configuration Word: 0x{:06X}", self.word),
            format!("Video Processor: {}", self.video_processor),
            format!("Timing Board: {}", self.timing_board),
            format!("Utility Board: {}", self.utility_board),
            format!("Shutter: {}", yes_no(self.shutter)),
            format!("Temperature Readout: {}", self.temp_calibration),
            format!("Subarray: {}", yes_no(self.subarray)),
            format!("Binning: {}", yes_no(self.binning)),
            format!("Split Serial: {}", yes_no(self.split_serial)),
            format!("Split Parallel: {}", yes_no(self.split_parallel)),
            format!("MPP ( Inverted Clocks ): {}", yes_no(self.inverted_clocks)),
            format!("Clock Driver Board: {}", self.clock_driver),
            format!("Special Implementation: {}", self.special_impl),
            format!("Continuous Readout: {}", yes_no(self.continuous_readout)),
            format!("Selectable Readout Speed: {}", yes_no(self.selectable_speed)),
        ]
    }
}

impl From<u32> for BoardConfig {
    fn from(word: u32) -> Self {
        BoardConfig::decode(word)
    }
}

impl Display for BoardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_list().join("\n"))
    }
}
