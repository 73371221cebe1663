//! # ARC Protocol Library
//!
//! This crate implements the command/reply word space used by ARC Gen III astronomical
//! camera controllers, the DSP based timing and utility boards that sit behind an
//! ARC PCI/PCIe interface card.
//!
//! ## Overview
//!
//! Every command sent to a controller and every reply it sends back is a 32-bit word.
//! Commands and most replies are short ASCII mnemonics packed big-endian into the low
//! bytes of that word, so `SEX` (start exposure) is `0x00534558` and `DON` (done) is
//! `0x00444F4E`. This library allows you to:
//!
//! - Encode mnemonics into command words and decode words back into readable strings
//! - Render a command packet together with its reply for logging
//! - Build the tagged, 24-bit checked command packets the PCIe board expects
//! - Decode the controller configuration word returned by `RCC`
//!
//! ## Basic Usage
//!
//! ### Encoding and Decoding Mnemonics
//!
//! ```
//! use arc_protocol::codec::{decode_command, encode_command};
//!
//! let word = encode_command("TDL").expect("TDL is a valid mnemonic");
//! assert_eq!(word, 0x0054444C);
//! assert_eq!(decode_command(word), "TDL");
//!
//! // Words that are not mnemonics decode to a hex literal
//! assert_eq!(decode_command(0x212223), "0x212223");
//! ```
//!
//! ### Logging a Command and its Reply
//!
//! ```
//! use arc_protocol::{codec::decode_command_list, commands::*};
//!
//! let context = decode_command_list(DON, &[TIM_ID, SOS, AMP_ALL]);
//! assert_eq!(context, "[ 0x2 SOS ALL -> DON ]");
//! ```
//!
//! ### Decoding the Board Configuration
//!
//! ```
//! use arc_protocol::config::{BoardConfig, VideoProcessor};
//!
//! let config = BoardConfig::decode(0x000082);
//! assert_eq!(config.video_processor, VideoProcessor::Arc42);
//! assert!(config.shutter);
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`error::ArcError`]. Every error carries the
//! operation and source line it was raised from.
//! Decoding is total: [`codec::decode_command`] and [`config::BoardConfig::decode`]
//! accept any 32-bit value.

pub mod error;
pub mod codec;
pub mod commands;
pub mod config;

pub use commands::ApiVersion;
pub use error::{ArcError, Location, Result};
