//! # ARC Device Library
//!
//! Device access for ARC Gen III camera controllers attached through an ARC-66/67
//! PCIe interface card.
//!
//! ## Overview
//!
//! The controller itself is driven by 32-bit command words (see
//! [`arc_protocol`](https://docs.rs/arc-protocol/)). Getting those words to the
//! hardware needs a kernel driver, and every operating system exposes that driver
//! differently: Linux has device nodes, Windows has a file handle and
//! `DeviceIoControl`, and macOS has an IOKit user client. This library hides those
//! differences behind a single contract.
//!
//! ## Architecture
//!
//! The crate is built around three components:
//!
//! - **[`ArcSystem`] Trait**: The OS device access layer. One implementation per
//!   operating system, selected at build time as [`system::NativeSystem`]
//! - **[`pci::ConfigSpaceDecoder`]**: Turns raw configuration-space and BAR
//!   registers into named, bit-annotated records for diagnostics
//! - **[`pcie::PcieDevice`]**: The ARC-66/67 board driver. It is generic over any
//!   [`ArcSystem`], sends command packets and reads replies, maps the image buffer
//!   and runs the diagnostic passes of the decoder
//!
//! ## Basic Usage
//!
//! ```ignore
//! use arc_device::{config::Builder, pcie::PcieDevice, system::NativeSystem};
//! use arc_protocol::commands::*;
//!
//! let config = Builder::new().log_commands(true).build();
//! let mut device = PcieDevice::new(NativeSystem::default(), config);
//! device.find_devices()?;
//! device.open(0)?;
//!
//! let reply = device.command(&[TIM_ID, TDL, 0x123456])?;
//! assert_eq!(reply, DON);
//! ```
//!
//! ### Implementing a Backend
//!
//! Any type implementing [`ArcSystem`] can drive a [`pcie::PcieDevice`]. This is how
//! the test suite simulates a board without hardware:
//!
//! ```ignore
//! use arc_device::{ArcSystem, DeviceDescriptor, DeviceHandle, MappedRegion};
//!
//! struct MyBackend;
//!
//! impl ArcSystem for MyBackend {
//!     fn open(&self, handle: &mut DeviceHandle, device: &DeviceDescriptor, flags: u64) -> bool {
//!         // connect to the device and store the raw handle
//!         false
//!     }
//!     // ...
//! }
//! ```
//!
//! ## Error Handling
//!
//! The OS layer never returns errors. Every [`ArcSystem`] operation reports failure as
//! `false` or `None` and logs the OS error text at `error` level. The driver and
//! the decoder turn those failures into [`arc_protocol::ArcError`] values.
use std::path::Path;

pub mod config;
pub mod handle;
pub mod pci;
pub mod pcie;
pub mod system;

pub use handle::{DeviceDescriptor, DeviceHandle, MappedRegion, RawHandle};

/// A portable contract over the OS device models.
///
/// Implementations never panic and never return errors. A failed call returns
/// `false` or `None` and leaves the handle as it was, except for `close` which
/// always leaves it invalid.
///
/// A handle moves between two states. It starts out invalid (closed), becomes valid
/// after a successful [`ArcSystem::open`] and is invalid again after
/// [`ArcSystem::close`]. [`ArcSystem::ioctl`], [`ArcSystem::mmap`] and
/// [`ArcSystem::munmap`] on a closed handle are rejected before reaching the OS.
///
/// All calls block the calling thread for the duration of the driver call. There is
/// no retry and no timeout at this layer.
pub trait ArcSystem {
    /// Connects to `device` and stores the OS handle in `handle`.
    ///
    /// `flags` are passed to the OS open call unchanged. Returns false if the
    /// device cannot be opened or if `handle` is already open.
    fn open(&self, handle: &mut DeviceHandle, device: &DeviceDescriptor, flags: u64) -> bool;

    /// Releases the OS resource behind `handle` and leaves it invalid.
    ///
    /// Returns false without side effects if the handle is already invalid.
    fn close(&self, handle: &mut DeviceHandle) -> bool;

    /// Issues the control request `command` synchronously.
    ///
    /// `input` is sent to the driver. If `output` is given, the driver's response
    /// is written to it.
    fn ioctl(
        &self,
        handle: &DeviceHandle,
        command: u32,
        input: &[u32],
        output: Option<&mut [u32]>,
    ) -> bool;

    /// Maps `size` bytes of device memory into the process.
    fn mmap(&self, handle: &DeviceHandle, map_command: u32, size: usize) -> Option<MappedRegion>;

    /// Releases a region returned by [`ArcSystem::mmap`].
    fn munmap(&self, handle: &DeviceHandle, map_command: u32, region: MappedRegion) -> bool;

    /// Reads the physical address and the size in bytes of the driver's common
    /// buffer with the request `command`.
    ///
    /// The default expects two native 64-bit values split into four words,
    /// `[addr_lo, addr_hi, size_lo, size_hi]`, as the Linux and Windows drivers
    /// return them. Backends whose driver answers differently override this.
    fn buffer_properties(&self, handle: &DeviceHandle, command: u32) -> Option<(u64, u64)> {
        let mut words = [0u32; 4];
        if !self.ioctl(handle, command, &[], Some(&mut words)) {
            return None;
        }
        Some((
            system::join_words([words[0], words[1]]),
            system::join_words([words[2], words[3]]),
        ))
    }

    /// Lists the devices that can be passed to [`ArcSystem::open`].
    ///
    /// The default scans `config.device_dir` for entries containing one of
    /// `config.device_names`, sorted by path.
    fn find_devices(&self, config: &config::Config) -> Vec<DeviceDescriptor> {
        scan_device_dir(&config.device_dir, &config.device_names)
    }
}

/// Collects the entries of `dir` whose file name contains any of `names`.
pub fn scan_device_dir(dir: &Path, names: &[String]) -> Vec<DeviceDescriptor> {
    let entries = match dir.read_dir() {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("Failed to read device directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if names.iter().any(|name| file_name.contains(name.as_str())) {
            log::debug!("Found device node {}", entry.path().display());
            paths.push(entry.path());
        }
    }
    paths.sort();
    paths
        .into_iter()
        .map(|path| DeviceDescriptor::new(path.to_string_lossy()))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::{self, File};

    #[test]
    fn scan_matches_and_sorts() {
        let dir = std::env::temp_dir().join(format!("arc-device-scan-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        for name in ["Arc66PCIe1", "AstroPCIe0", "ttyS0", "Arc66PCIe0"] {
            File::create(dir.join(name)).unwrap();
        }

        let names = vec!["AstroPCIe".to_owned(), "Arc66PCIe".to_owned()];
        let found: Vec<_> = scan_device_dir(&dir, &names)
            .into_iter()
            .map(|d| d.name().to_owned())
            .collect();
        fs::remove_dir_all(&dir).unwrap();

        let expected: Vec<_> = ["Arc66PCIe0", "Arc66PCIe1", "AstroPCIe0"]
            .iter()
            .map(|n| dir.join(n).to_string_lossy().into_owned())
            .collect();
        assert_eq!(found, expected);
    }

    /// Answers every request with the same four words
    struct FixedReply([u32; 4]);

    impl ArcSystem for FixedReply {
        fn open(&self, _: &mut DeviceHandle, _: &DeviceDescriptor, _: u64) -> bool {
            false
        }

        fn close(&self, _: &mut DeviceHandle) -> bool {
            false
        }

        fn ioctl(&self, _: &DeviceHandle, _: u32, _: &[u32], output: Option<&mut [u32]>) -> bool {
            if let Some(output) = output {
                output.copy_from_slice(&self.0[..output.len()]);
            }
            self.0 != [0; 4]
        }

        fn mmap(&self, _: &DeviceHandle, _: u32, _: usize) -> Option<MappedRegion> {
            None
        }

        fn munmap(&self, _: &DeviceHandle, _: u32, _: MappedRegion) -> bool {
            false
        }
    }

    #[test]
    fn buffer_properties_join_word_pairs() {
        let address: u64 = 0x0000_0001_2340_0000;
        let size: u64 = 0x1_0000_0000;
        let [a0, a1] = system::split_words(address);
        let [s0, s1] = system::split_words(size);
        let system = FixedReply([a0, a1, s0, s1]);
        assert_eq!(
            system.buffer_properties(&DeviceHandle::invalid(), 0xA),
            Some((address, size))
        );
        assert_eq!(
            FixedReply([0; 4]).buffer_properties(&DeviceHandle::invalid(), 0xA),
            None
        );
    }

    #[test]
    fn scan_missing_dir_is_empty() {
        let names = vec!["AstroPCIe".to_owned()];
        assert!(scan_device_dir(Path::new("/nonexistent/arc-device"), &names).is_empty());
    }
}
