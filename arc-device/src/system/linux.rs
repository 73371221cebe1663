//! # Linux Backend
//!
//! For the ARC kernel modules that register device nodes such as `/dev/AstroPCIe0`
//! or `/dev/Arc66PCIe0`. Control requests are plain `ioctl` calls on the device
//! node, image buffers are mapped with `mmap`.
use std::{
    ffi::c_void,
    fs::OpenOptions,
    num::NonZero,
    os::{
        fd::{BorrowedFd, IntoRawFd},
        unix::fs::OpenOptionsExt,
    },
    ptr::{self, NonNull},
};

use nix::{
    errno::Errno,
    libc,
    sys::{
        ioctl::ioctl_num_type,
        mman::{MapFlags, ProtFlags, mmap, munmap},
    },
};

use super::make_command;
use crate::{ArcSystem, DeviceDescriptor, DeviceHandle, MappedRegion};

/// Device access through Linux device nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxSystem;

impl LinuxSystem {
    pub fn new() -> LinuxSystem {
        LinuxSystem
    }
}

impl ArcSystem for LinuxSystem {
    fn open(&self, handle: &mut DeviceHandle, device: &DeviceDescriptor, flags: u64) -> bool {
        if handle.is_valid() {
            log::error!(
                "Cannot open {}: handle {} is already open",
                device,
                handle.raw()
            );
            return false;
        }
        let Ok(custom_flags) = i32::try_from(flags) else {
            log::error!("Open flags 0x{:X} do not fit into an int", flags);
            return false;
        };

        log::debug!("Opening device node: {}", device.name());
        // std opens with O_CLOEXEC, the descriptor does not leak into child processes
        match OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(custom_flags)
            .open(device.name())
        {
            Ok(file) => {
                handle.set(file.into_raw_fd());
                log::info!("Opened {} [ fd: {} ]", device.name(), handle.raw());
                true
            }
            Err(e) => {
                log::error!("Failed to open {}: {}", device.name(), e);
                false
            }
        }
    }

    fn close(&self, handle: &mut DeviceHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        let fd = handle.take();
        log::debug!("Closing fd {}", fd);
        // SAFETY: the descriptor came from a successful open and is closed exactly once,
        // `take` has already invalidated the handle.
        match Errno::result(unsafe { libc::close(fd) }) {
            Ok(_) => {
                log::info!("Closed fd {}", fd);
                true
            }
            Err(errno) => {
                log::error!("Failed to close fd {}: {}", fd, errno);
                false
            }
        }
    }

    fn ioctl(
        &self,
        handle: &DeviceHandle,
        command: u32,
        input: &[u32],
        output: Option<&mut [u32]>,
    ) -> bool {
        if !handle.require_open("ioctl") {
            return false;
        }
        let request = make_command(command) as ioctl_num_type;
        log::debug!(
            "ioctl fd={} command=0x{:X} in={:X?}",
            handle.raw(),
            request,
            input
        );

        // The driver reads its arguments from and writes its results to the same buffer.
        let result = match output {
            Some(output) if !input.is_empty() => {
                let mut buffer = vec![0u32; input.len().max(output.len())];
                buffer[..input.len()].copy_from_slice(input);
                // SAFETY: the buffer is large enough for both the arguments and the
                // results the driver returns for this command.
                let result = Errno::result(unsafe {
                    libc::ioctl(handle.raw(), request, buffer.as_mut_ptr())
                });
                if result.is_ok() {
                    let count = output.len();
                    output.copy_from_slice(&buffer[..count]);
                    log::trace!("ioctl result: {:X?}", output);
                }
                result
            }
            Some(output) => {
                // SAFETY: the driver writes at most `output.len()` words.
                let result = Errno::result(unsafe {
                    libc::ioctl(handle.raw(), request, output.as_mut_ptr())
                });
                log::trace!("ioctl result: {:X?}", output);
                result
            }
            None if !input.is_empty() => {
                let mut buffer = input.to_vec();
                // SAFETY: the driver only reads the arguments of output-less commands.
                Errno::result(unsafe { libc::ioctl(handle.raw(), request, buffer.as_mut_ptr()) })
            }
            None => {
                // SAFETY: commands without arguments ignore the pointer.
                Errno::result(unsafe {
                    libc::ioctl(handle.raw(), request, ptr::null_mut::<c_void>())
                })
            }
        };

        match result {
            Ok(_) => true,
            Err(errno) => {
                log::error!("ioctl 0x{:X} on fd {} failed: {}", request, handle.raw(), errno);
                false
            }
        }
    }

    fn mmap(&self, handle: &DeviceHandle, map_command: u32, size: usize) -> Option<MappedRegion> {
        if !handle.require_open("mmap") {
            return None;
        }
        let Some(length) = NonZero::new(size) else {
            log::error!("Cannot map an empty region");
            return None;
        };
        log::debug!(
            "Mapping 0x{:X} bytes from fd {} (map command 0x{:X})",
            size,
            handle.raw(),
            map_command
        );

        // SAFETY: the descriptor is open for as long as the handle is valid. The mapping
        // is shared with the driver and released through munmap.
        let mapped = unsafe {
            mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                BorrowedFd::borrow_raw(handle.raw()),
                0,
            )
        };
        match mapped {
            Ok(addr) => {
                log::info!("Mapped 0x{:X} bytes at {:p}", size, addr);
                // SAFETY: mmap returned a page aligned, read/write mapping of `size` bytes
                Some(unsafe { MappedRegion::from_raw_parts(addr.cast(), size) })
            }
            Err(errno) => {
                log::error!("mmap of 0x{:X} bytes failed: {}", size, errno);
                None
            }
        }
    }

    fn munmap(&self, handle: &DeviceHandle, _map_command: u32, region: MappedRegion) -> bool {
        if !handle.require_open("munmap") {
            return false;
        }
        let Some(addr) = NonNull::new(region.as_ptr().cast::<c_void>()) else {
            return false;
        };
        log::debug!("Unmapping 0x{:X} bytes at {:p}", region.len(), addr);
        // SAFETY: the region was created by mmap above and is consumed here
        match unsafe { munmap(addr, region.len()) } {
            Ok(()) => true,
            Err(errno) => {
                log::error!("munmap at {:p} failed: {}", addr, errno);
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn open_missing_device_stays_closed() {
        let system = LinuxSystem::new();
        let mut handle = DeviceHandle::invalid();
        let device = DeviceDescriptor::new("/dev/ArcNoSuchDevice0");
        assert!(!system.open(&mut handle, &device, 0));
        assert!(!handle.is_valid());
        assert!(!system.close(&mut handle));
        assert!(!system.close(&mut handle));
    }

    #[test]
    fn open_close_regular_node() {
        let system = LinuxSystem::new();
        let mut handle = DeviceHandle::invalid();
        let device = DeviceDescriptor::new("/dev/null");
        assert!(system.open(&mut handle, &device, 0));
        assert!(handle.is_valid());
        // A second open on the same handle would leak the descriptor
        assert!(!system.open(&mut handle, &device, 0));
        assert!(system.close(&mut handle));
        assert!(!handle.is_valid());
        assert!(!system.close(&mut handle));
    }

    #[test]
    fn closed_handle_is_rejected() {
        let system = LinuxSystem::new();
        let handle = DeviceHandle::invalid();
        let mut out = [0u32; 2];
        assert!(!system.ioctl(&handle, 1, &[0, 0], Some(&mut out)));
        assert!(system.mmap(&handle, 0xC, 4096).is_none());
    }

    #[test]
    fn ioctl_on_non_arc_node_fails() {
        let system = LinuxSystem::new();
        let mut handle = DeviceHandle::invalid();
        assert!(system.open(&mut handle, &DeviceDescriptor::new("/dev/null"), 0));
        let mut out = [0xFFFF_FFFFu32; 2];
        assert!(!system.ioctl(&handle, 6, &[0x1234], Some(&mut out)));
        // a failed request leaves the output untouched
        assert_eq!(out, [0xFFFF_FFFF; 2]);
        assert!(system.close(&mut handle));
    }
}
