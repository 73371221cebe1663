//! # PCI Configuration-Space Decoder
//!
//! Turns raw configuration-space and BAR register reads into named registers
//! annotated with their bit definitions. Used for diagnostics only.
//!
//! ```
//! use arc_device::pci::decode_dump;
//!
//! let mut dump = [0u32; 16];
//! dump[0] = 0x905610B5;
//! let decoder = decode_dump(&dump).unwrap();
//! assert_eq!(decoder.cfg_bit_list(0).unwrap()[1], "Vendor ID: 0x10B5");
//! assert!(decoder.cfg_name(16).is_err());
//! ```
mod decoder;
pub mod plx;
pub mod regs;

pub use decoder::{BarRecord, ConfigSpace, ConfigSpaceDecoder, RegisterRecord, decode_dump};
