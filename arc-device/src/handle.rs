//! Handles, descriptors and mapped regions shared by all [`crate::ArcSystem`] backends.
use std::{
    fmt::Display,
    ptr::{NonNull, read_volatile, write_volatile},
};

/// The OS representation of an open device: a file descriptor.
#[cfg(all(unix, not(target_os = "macos")))]
pub type RawHandle = std::os::fd::RawFd;

/// The OS representation of an open device: a `HANDLE`, stored as its address.
#[cfg(windows)]
pub type RawHandle = isize;

/// The OS representation of an open device: an IOKit `io_connect_t`.
#[cfg(target_os = "macos")]
pub type RawHandle = u32;

#[cfg(all(unix, not(target_os = "macos")))]
const INVALID_RAW_HANDLE: RawHandle = -1;

// INVALID_HANDLE_VALUE
#[cfg(windows)]
const INVALID_RAW_HANDLE: RawHandle = -1;

// IO_OBJECT_NULL
#[cfg(target_os = "macos")]
const INVALID_RAW_HANDLE: RawHandle = 0;

/// An open connection to a device.
///
/// The handle is owned by the caller between `open` and `close` and is only ever
/// passed by reference. Each platform has its own invalid sentinel, use
/// [`DeviceHandle::is_valid`] instead of comparing raw values.
#[derive(Debug, Eq, PartialEq)]
pub struct DeviceHandle {
    raw: RawHandle,
}

impl DeviceHandle {
    /// Returns a handle in the closed state
    pub const fn invalid() -> DeviceHandle {
        DeviceHandle {
            raw: INVALID_RAW_HANDLE,
        }
    }

    /// Wraps a raw handle obtained from the OS
    pub const fn from_raw(raw: RawHandle) -> DeviceHandle {
        DeviceHandle { raw }
    }

    /// The platform's invalid sentinel
    pub const fn invalid_raw() -> RawHandle {
        INVALID_RAW_HANDLE
    }

    pub fn is_valid(&self) -> bool {
        self.raw != INVALID_RAW_HANDLE
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Stores a newly opened raw handle
    pub fn set(&mut self, raw: RawHandle) {
        self.raw = raw;
    }

    /// Returns the raw handle and leaves this handle invalid
    pub fn take(&mut self) -> RawHandle {
        std::mem::replace(&mut self.raw, INVALID_RAW_HANDLE)
    }

    /// Checks that the handle is open before `operation` reaches the OS.
    /// A closed handle is logged as a caller error.
    pub fn require_open(&self, operation: &str) -> bool {
        if !self.is_valid() {
            log::error!("{} called on a closed device handle", operation);
            return false;
        }
        true
    }
}

impl Default for DeviceHandle {
    fn default() -> Self {
        DeviceHandle::invalid()
    }
}

/// Identifies a device to open.
///
/// On Linux and Windows this is a device path. On macOS the name is the IOKit
/// class name and `service` carries the matched `io_service_t`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceDescriptor {
    name: String,
    service: Option<u32>,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>) -> DeviceDescriptor {
        DeviceDescriptor {
            name: name.into(),
            service: None,
        }
    }

    pub fn with_service(name: impl Into<String>, service: u32) -> DeviceDescriptor {
        DeviceDescriptor {
            name: name.into(),
            service: Some(service),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> Option<u32> {
        self.service
    }
}

impl Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.service {
            Some(service) => write!(f, "{} [ service: 0x{:X} ]", self.name, service),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Device memory mapped into the process.
///
/// The region stays valid until it is handed back to [`crate::ArcSystem::munmap`],
/// which consumes it. There is no reference counting.
#[derive(Debug)]
pub struct MappedRegion {
    addr: NonNull<u8>,
    len: usize,
}

impl MappedRegion {
    /// Wraps memory returned by an OS mapping call.
    ///
    /// # Safety
    ///
    /// `addr` must point to `len` bytes that are readable and writable, aligned to two
    /// bytes, and stay mapped until the region is passed to `munmap`.
    pub unsafe fn from_raw_parts(addr: NonNull<u8>, len: usize) -> MappedRegion {
        MappedRegion { addr, len }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr()
    }

    /// Number of 16-bit pixels the region holds
    pub fn pixel_count(&self) -> usize {
        self.len / 2
    }

    /// Reads the pixel at `index`, or `None` past the end of the region
    pub fn read_u16(&self, index: usize) -> Option<u16> {
        if index >= self.pixel_count() {
            return None;
        }
        // SAFETY: the index is in bounds and the constructor guarantees a live,
        // aligned mapping. Device memory may change under us, hence the volatile read.
        Some(unsafe { read_volatile(self.addr.cast::<u16>().as_ptr().add(index)) })
    }

    /// Writes the pixel at `index`. Returns false past the end of the region.
    pub fn write_u16(&self, index: usize, value: u16) -> bool {
        if index >= self.pixel_count() {
            return false;
        }
        // SAFETY: see read_u16
        unsafe { write_volatile(self.addr.cast::<u16>().as_ptr().add(index), value) };
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_handle_roundtrip() {
        let mut handle = DeviceHandle::invalid();
        assert!(!handle.is_valid());
        assert!(!handle.require_open("ioctl"));

        handle.set(7);
        assert!(handle.is_valid());
        assert!(handle.require_open("ioctl"));
        assert_eq!(handle.take(), 7);
        assert!(!handle.is_valid());
        assert_eq!(handle, DeviceHandle::default());
    }

    #[test]
    fn mapped_region_bounds() {
        let mut backing = vec![0u16; 4];
        let addr = NonNull::new(backing.as_mut_ptr().cast::<u8>()).unwrap();
        let region = unsafe { MappedRegion::from_raw_parts(addr, backing.len() * 2) };
        assert_eq!(region.pixel_count(), 4);
        assert!(region.write_u16(3, 0xBEEF));
        assert_eq!(region.read_u16(3), Some(0xBEEF));
        assert_eq!(region.read_u16(4), None);
        assert!(!region.write_u16(4, 1));
        drop(region);
        assert_eq!(backing[3], 0xBEEF);
    }

    #[test]
    fn descriptor_display() {
        assert_eq!(DeviceDescriptor::new("/dev/AstroPCIe0").to_string(), "/dev/AstroPCIe0");
        assert_eq!(
            DeviceDescriptor::with_service("com_arc_driver_Arc66PCIe", 0x1203).to_string(),
            "com_arc_driver_Arc66PCIe [ service: 0x1203 ]"
        );
    }
}
