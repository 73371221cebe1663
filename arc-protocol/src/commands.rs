//! The ARC command, reply and board-configuration constant space.
//!
//! These values are a wire contract shared with the DSP firmware on the controller
//! boards. Each mnemonic is the big-endian ASCII packing of its name, so `SEX` is
//! `0x00534558`.
use std::fmt::Display;

use crate::{
    codec::decode_command,
    error::{ArcError, Result},
    location,
};

/// The version of the controller API.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct ApiVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl ApiVersion {
    /// Version 3.6.2, the Gen III API these constants are taken from
    pub const V3_6_2: ApiVersion = ApiVersion {
        major: 3,
        minor: 6,
        patch: 2,
    };

    pub const fn new(major: u32, minor: u32, patch: u32) -> ApiVersion {
        ApiVersion {
            major,
            minor,
            patch,
        }
    }

    /// Returns the version implemented by this crate
    pub fn current() -> ApiVersion {
        ApiVersion::V3_6_2
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::V3_6_2
    }
}

impl Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[test]
fn version_ordering() {
    assert!(ApiVersion::new(3, 6, 1) < ApiVersion::V3_6_2);
    assert!(ApiVersion::new(4, 0, 0) > ApiVersion::V3_6_2);
    assert_eq!(ApiVersion::current().to_string(), "3.6.2");
}

// Board identifiers, used as the first word of every command packet
pub const PCI_ID: u32 = 1;
pub const TIM_ID: u32 = 2;
pub const UTIL_ID: u32 = 3;
pub const SMALLCAM_DLOAD_ID: u32 = 3;

/// Most words in a command list: board id, command and up to four arguments
pub const CTLR_CMD_MAX: usize = 6;
/// Highest board id that fits into the board byte of a packet header
pub const MAX_BOARD_ID: u32 = 0xFF;

// DSP memory space selectors, or'ed into RDM/WRM addresses
pub const P_MEM: u32 = 0x100000;
pub const X_MEM: u32 = 0x200000;
pub const Y_MEM: u32 = 0x400000;
pub const R_MEM: u32 = 0x800000;

// Replies
/// Timeout
pub const TOUT: u32 = 0x544F5554;
/// Readout in progress
pub const ROUT: u32 = 0x524F5554;
/// Header error
pub const HERR: u32 = 0x48455252;
/// Done
pub const DON: u32 = 0x00444F4E;
/// Error
pub const ERR: u32 = 0x00455252;
/// System reset
pub const SYR: u32 = 0x00535952;
/// Reset
pub const RST: u32 = 0x00525354;
/// Controller not ready
pub const CNR: u32 = 0x00434E52;

// Commands
/// Download boot code
pub const DBC: u32 = 0x00444243;
/// Test data link
pub const TDL: u32 = 0x0054444C;
/// Read memory
pub const RDM: u32 = 0x0052444D;
/// Write memory
pub const WRM: u32 = 0x0057524D;
/// Start exposure
pub const SEX: u32 = 0x00534558;
/// Set exposure time
pub const SET: u32 = 0x00534554;
/// Pause exposure
pub const PEX: u32 = 0x00504558;
/// Resume exposure
pub const REX: u32 = 0x00524558;
/// Read elapsed time
pub const RET: u32 = 0x00524554;
/// Power on
pub const PON: u32 = 0x00504F4E;
/// Power off
pub const POF: u32 = 0x00504F46;
/// Read image
pub const RDI: u32 = 0x00524449;
/// Select output source, takes an [`Amplifier`] argument
pub const SOS: u32 = 0x00534F53;
/// Multi-pinned phase mode
pub const MPP: u32 = 0x004D5050;
/// Download coadder
pub const DCA: u32 = 0x00444341;
/// Set number of frames
pub const SNF: u32 = 0x00534E46;
/// Set frames-per-buffer for coadds
pub const FPB: u32 = 0x00465042;
/// Video board
pub const VID: u32 = 0x00564944;
/// Set bias number
pub const SBN: u32 = 0x0053424E;
/// Set bias voltage
pub const SBV: u32 = 0x00534256;
/// Set gain
pub const SGN: u32 = 0x0053474E;
/// Select multiplexer
pub const SMX: u32 = 0x00534D58;
/// Clock driver board
pub const CLK: u32 = 0x00434C4B;
/// Set subarray sizes
pub const SSS: u32 = 0x00535353;
/// Set subarray positions
pub const SSP: u32 = 0x00535350;
/// Set low gain
pub const LGN: u32 = 0x004C474E;
/// Set high gain
pub const HGN: u32 = 0x0048474E;
/// Set readout mode, either CDS or single
pub const SRM: u32 = 0x0053524D;
/// Correlated double sampling
pub const CDS: u32 = 0x00434453;
/// Send Fowler sample
pub const SFS: u32 = 0x00534653;
/// Set pass through mode
pub const SPT: u32 = 0x00535054;
/// Load application
pub const LDA: u32 = 0x004C4441;
/// Read controller configuration
pub const RCC: u32 = 0x00524343;
/// Clear array
pub const CLR: u32 = 0x00434C52;
/// Idle
pub const IDL: u32 = 0x0049444C;
/// Stop idle
pub const STP: u32 = 0x00535450;
/// Close shutter
pub const CSH: u32 = 0x00435348;
/// Open shutter
pub const OSH: u32 = 0x004F5348;
/// Set up the ramp mode
pub const SUR: u32 = 0x00535552;
/// Move filter wheel 1 home
pub const MH1: u32 = 0x004D4831;
/// Move filter wheel 1
pub const MM1: u32 = 0x004D4D31;
/// Move filter wheel 2 home
pub const MH2: u32 = 0x004D4832;
/// Move filter wheel 2
pub const MM2: u32 = 0x004D4D32;
/// Set hardware byte swapping
pub const SBS: u32 = 0x00534253;
/// Test for hardware byte swapping
pub const TBS: u32 = 0x00544253;
/// Read number of channels
pub const RNC: u32 = 0x00524E43;
/// Test high gain, utility board temperature
pub const THG: u32 = 0x00544847;
/// System id
pub const SID: u32 = 0x00534944;
/// Jump to download
pub const JDL: u32 = 0x004A444C;
/// Set or clear the fiber optic 2x transmitter mode
pub const XMT: u32 = 0x00584D54;
/// Abort readout and exposure
pub const ABR: u32 = 0x00414252;
/// Set trigger mode
pub const STM: u32 = 0x0053544D;
/// Control detector temperature
pub const CDT: u32 = 0x00434454;
/// Read detector temperature
pub const RDT: u32 = 0x00524454;
/// Read heater voltage
pub const RHV: u32 = 0x00524856;
/// Read detector current
pub const RDC: u32 = 0x00524443;
/// Reset controller
pub const RSC: u32 = 0x00525343;
/// Synthetic image mode
pub const SIM: u32 = 0x0053494D;

/// Every command mnemonic known to this crate, in definition order.
pub const COMMANDS: &[u32] = &[
    DBC, TDL, RDM, WRM, SEX, SET, PEX, REX, RET, PON, POF, RDI, SOS, MPP, DCA, SNF, FPB, VID, SBN,
    SBV, SGN, SMX, CLK, SSS, SSP, LGN, HGN, SRM, CDS, SFS, SPT, LDA, RCC, CLR, IDL, STP, CSH, OSH,
    SUR, MH1, MM1, MH2, MM2, SBS, TBS, RNC, THG, SID, JDL, XMT, ABR, STM, CDT, RDT, RHV, RDC, RSC,
    SIM,
];

/// Every reply word known to this crate.
pub const REPLIES: &[u32] = &[TOUT, ROUT, HERR, DON, ERR, SYR, RST, CNR];

// Board configuration bits, as reported by RCC. See [`crate::config::BoardConfig`].
pub const CCDVIDREV3B: u32 = 0x000000;
pub const ARC41: u32 = 0x000000;
pub const VIDGENI: u32 = 0x000001;
pub const IRREV4: u32 = 0x000002;
pub const ARC42: u32 = 0x000002;
pub const COADDER: u32 = 0x000003;
pub const ARC44: u32 = 0x000003;
pub const CCDVIDREV5: u32 = 0x000004;
pub const ARC45: u32 = 0x000004;
pub const IR8X: u32 = 0x000005;
pub const ARC46: u32 = 0x000005;
pub const ARC48: u32 = 0x000006;
pub const ARC47: u32 = 0x000007;
pub const TIMREV4: u32 = 0x000000;
pub const ARC20: u32 = 0x000000;
pub const TIMGENI: u32 = 0x000008;
pub const TIMREV5: u32 = 0x000010;
pub const ARC22: u32 = 0x000010;
pub const UTILREV3: u32 = 0x000020;
pub const ARC50: u32 = 0x000020;
pub const SHUTTER_CC: u32 = 0x000080;
pub const TEMP_SIDIODE: u32 = 0x000100;
pub const TEMP_LINEAR: u32 = 0x000200;
pub const SUBARRAY: u32 = 0x000400;
pub const BINNING: u32 = 0x000800;
pub const SPLIT_SERIAL: u32 = 0x001000;
pub const SPLIT_PARALLEL: u32 = 0x002000;
pub const MPP_CC: u32 = 0x004000;
pub const ARC32: u32 = 0x008000;
pub const CLKDRVGENI: u32 = 0x018000;
pub const MLO: u32 = 0x020000;
pub const NGST: u32 = 0x040000;
pub const FO_2X_TRANSMITR: u32 = 0x060000;
pub const CONT_RD: u32 = 0x100000;
pub const SEL_READ_SPEED: u32 = 0x200000;
pub const ALL_READOUTS: u32 = SPLIT_SERIAL | SPLIT_PARALLEL;

// Continuous readout modes
pub const CR_WRITE: u32 = 0;
pub const CR_COADD: u32 = 1;
pub const CR_DEBUG: u32 = 2;

/// Highest address a DSP application may be started from
pub const MAX_DSP_START_LOAD_ADDR: u32 = 0x4000;

pub const OPEN_SHUTTER_POSITION: u32 = 1 << 11;
pub const CLOSED_SHUTTER_POSITION: u32 = !(1 << 11);

/// Returns true if the system id reply identifies an ARC-12 (SmallCam) controller.
pub const fn is_arc12(id: u32) -> bool {
    ((id & 0xFF0000) >> 16) == b'S' as u32 && ((id & 0x00FF00) >> 8) == b'C' as u32
}

#[test]
fn arc12_detection() {
    assert!(is_arc12(0x00534300));
    assert!(is_arc12(0x12534399));
    assert!(!is_arc12(0x00435300));
}

/// Output amplifiers selectable through `SOS`.
/// The argument words use the same ASCII packing as the commands themselves.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Amplifier {
    /// `__C`
    Amp0,
    /// `__D`
    Amp1,
    /// `__B`
    Amp2,
    /// `__A`
    Amp3,
    /// `__L`, left amplifier
    Left,
    /// `__R`, right amplifier
    Right,
    /// `_LR`, left and right amplifiers
    LeftRight,
    /// `ALL`, all four amplifiers
    All,
}

impl Amplifier {
    pub const ALL_VARIANTS: [Amplifier; 8] = [
        Amplifier::Amp0,
        Amplifier::Amp1,
        Amplifier::Amp2,
        Amplifier::Amp3,
        Amplifier::Left,
        Amplifier::Right,
        Amplifier::LeftRight,
        Amplifier::All,
    ];

    /// The argument word to send with `SOS`
    pub const fn word(self) -> u32 {
        match self {
            Amplifier::Amp0 => 0x5F5F43,
            Amplifier::Amp1 => 0x5F5F44,
            Amplifier::Amp2 => 0x5F5F42,
            Amplifier::Amp3 => 0x5F5F41,
            Amplifier::Left => 0x5F5F4C,
            Amplifier::Right => 0x5F5F52,
            Amplifier::LeftRight => 0x5F4C52,
            Amplifier::All => 0x414C4C,
        }
    }
}

pub const AMP_0: u32 = Amplifier::Amp0.word();
pub const AMP_1: u32 = Amplifier::Amp1.word();
pub const AMP_2: u32 = Amplifier::Amp2.word();
pub const AMP_3: u32 = Amplifier::Amp3.word();
pub const AMP_L: u32 = Amplifier::Left.word();
pub const AMP_R: u32 = Amplifier::Right.word();
pub const AMP_LR: u32 = Amplifier::LeftRight.word();
pub const AMP_ALL: u32 = Amplifier::All.word();

impl TryFrom<u32> for Amplifier {
    type Error = ArcError;

    fn try_from(value: u32) -> Result<Self> {
        Amplifier::ALL_VARIANTS
            .into_iter()
            .find(|amp| amp.word() == value)
            .ok_or_else(|| {
                ArcError::invalid_argument(
                    location!("Amplifier::try_from"),
                    format!("{} is not an amplifier selector", decode_command(value)),
                )
            })
    }
}

impl Display for Amplifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", decode_command(self.word()))
    }
}

/// Synthetic image modes selected through `SIM`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SyntheticImage {
    #[default]
    Disable,
    Fixed,
    Ramp,
    Reset,
}

impl SyntheticImage {
    /// The argument word to send with `SIM`
    pub const fn word(self) -> u32 {
        match self {
            SyntheticImage::Disable => 0,
            SyntheticImage::Fixed => 1,
            SyntheticImage::Ramp => 2,
            SyntheticImage::Reset => 3,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::encode_command;

    #[test]
    fn amplifier_words_decode_to_their_names() {
        assert_eq!(Amplifier::Amp0.to_string(), "__C");
        assert_eq!(Amplifier::LeftRight.to_string(), "_LR");
        assert_eq!(Amplifier::All.to_string(), "ALL");
        assert_eq!(AMP_ALL, 0x414C4C);
    }

    #[test]
    fn amplifier_from_word() {
        for amp in Amplifier::ALL_VARIANTS {
            assert_eq!(Amplifier::try_from(amp.word()).unwrap(), amp);
        }
        assert!(matches!(
            Amplifier::try_from(SEX),
            Err(ArcError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn command_constants_match_their_names() {
        for &word in COMMANDS.iter().chain(REPLIES) {
            let name = decode_command(word);
            assert_eq!(encode_command(&name).unwrap(), word, "{}", name);
        }
    }

    #[test]
    fn board_config_fields_do_not_overlap() {
        assert_eq!(ALL_READOUTS, 0x3000);
        assert_eq!(CLKDRVGENI & !0x18000, 0);
        assert_eq!(FO_2X_TRANSMITR, MLO | NGST);
        assert_eq!(OPEN_SHUTTER_POSITION & CLOSED_SHUTTER_POSITION, 0);
    }
}
