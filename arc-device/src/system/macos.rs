//! # macOS Backend
//!
//! For the ARC IOKit kernel extension. Devices are found by matching the driver's
//! class name in the I/O Registry. Opening a device instantiates a user client,
//! and every request is a scalar method call on that user client.
use std::ffi::{CString, c_char, c_void};

use crate::{ArcSystem, DeviceDescriptor, DeviceHandle, MappedRegion, config::Config};

/// I/O Kit class name of the ARC-66/67 driver
pub const ARC_PCIE_CLASS_NAME: &str = "com_arc_driver_Arc66PCIe";

/// Scalar words the user client accepts per request, including the command
pub const MAX_IOCTL_IN_COUNT: usize = 4;
/// Scalar words the user client returns per request
pub const MAX_IOCTL_OUT_COUNT: usize = 2;

/// User client method selectors
const OPEN_USER_CLIENT: u32 = 0;
const CLOSE_USER_CLIENT: u32 = 1;
const IOCTL_USER_CLIENT: u32 = 2;

const KERN_SUCCESS: i32 = 0;
const IO_OBJECT_NULL: u32 = 0;
const DEFAULT_MAIN_PORT: u32 = 0;
const DEFAULT_MEMORY_TYPE: u32 = 0;
const MAP_ANYWHERE: u32 = 1;

#[link(name = "IOKit", kind = "framework")]
unsafe extern "C" {
    fn IOServiceOpen(service: u32, owning_task: u32, kind: u32, connect: *mut u32) -> i32;
    fn IOServiceClose(connect: u32) -> i32;
    fn IOConnectCallScalarMethod(
        connection: u32,
        selector: u32,
        input: *const u64,
        input_count: u32,
        output: *mut u64,
        output_count: *mut u32,
    ) -> i32;
    fn IOConnectMapMemory64(
        connect: u32,
        memory_type: u32,
        into_task: u32,
        address: *mut u64,
        size: *mut u64,
        options: u32,
    ) -> i32;
    fn IOConnectUnmapMemory64(connect: u32, memory_type: u32, from_task: u32, address: u64) -> i32;
    fn IOServiceMatching(name: *const c_char) -> *mut c_void;
    fn IOServiceGetMatchingServices(main_port: u32, matching: *mut c_void, existing: *mut u32)
    -> i32;
    fn IOIteratorNext(iterator: u32) -> u32;
    fn IOObjectRelease(object: u32) -> i32;
}

unsafe extern "C" {
    static mach_task_self_: u32;
}

fn task_self() -> u32 {
    // SAFETY: initialized by libSystem before main and never written afterwards
    unsafe { mach_task_self_ }
}

/// Lays out a request as the user client expects it: the tagged command first, then
/// the arguments widened to 64 bits. Returns `None` if there are too many arguments.
pub fn scalar_request(command: u32, input: &[u32]) -> Option<[u64; MAX_IOCTL_IN_COUNT]> {
    if input.len() >= MAX_IOCTL_IN_COUNT {
        return None;
    }
    let mut data = [0u64; MAX_IOCTL_IN_COUNT];
    data[0] = super::make_command(command) as u64;
    for (slot, word) in data[1..].iter_mut().zip(input) {
        *slot = *word as u64;
    }
    Some(data)
}

/// Device access through IOKit user clients.
#[derive(Debug, Clone)]
pub struct MacSystem {
    class_name: String,
}

impl Default for MacSystem {
    fn default() -> Self {
        MacSystem::new(ARC_PCIE_CLASS_NAME)
    }
}

impl MacSystem {
    /// Creates a backend that matches services of the given I/O Kit class
    pub fn new(class_name: impl Into<String>) -> MacSystem {
        MacSystem {
            class_name: class_name.into(),
        }
    }

    fn call_scalar(&self, connect: u32, selector: u32) -> i32 {
        // SAFETY: no input and no output buffers are passed
        unsafe {
            IOConnectCallScalarMethod(
                connect,
                selector,
                std::ptr::null(),
                0,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        }
    }

    /// Runs one request through the user client and returns the scalar buffer,
    /// whose first [`MAX_IOCTL_OUT_COUNT`] words hold the results.
    fn call_ioctl(
        &self,
        handle: &DeviceHandle,
        command: u32,
        input: &[u32],
    ) -> Option<[u64; MAX_IOCTL_IN_COUNT]> {
        if !handle.require_open("ioctl") {
            return None;
        }
        let Some(mut data) = scalar_request(command, input) else {
            log::error!(
                "ioctl 0x{:X}: {} arguments exceed the user client limit",
                command,
                input.len()
            );
            return None;
        };
        log::debug!("IOConnectCallScalarMethod command=0x{:X} in={:X?}", command, input);

        let mut out_count = MAX_IOCTL_OUT_COUNT as u32;
        // SAFETY: `data` holds MAX_IOCTL_IN_COUNT inputs and room for
        // MAX_IOCTL_OUT_COUNT outputs.
        let result = unsafe {
            IOConnectCallScalarMethod(
                handle.raw(),
                IOCTL_USER_CLIENT,
                data.as_ptr(),
                MAX_IOCTL_IN_COUNT as u32,
                data.as_mut_ptr(),
                &mut out_count,
            )
        };
        if result != KERN_SUCCESS {
            log::error!("ioctl 0x{:X} failed: 0x{:X}", command, result);
            return None;
        }
        Some(data)
    }
}

impl ArcSystem for MacSystem {
    fn open(&self, handle: &mut DeviceHandle, device: &DeviceDescriptor, _flags: u64) -> bool {
        if handle.is_valid() {
            log::error!("Cannot open {}: handle is already open", device);
            return false;
        }
        let Some(service) = device.service() else {
            log::error!("Cannot open {}: no I/O Kit service", device);
            return false;
        };

        let mut connect = IO_OBJECT_NULL;
        // SAFETY: `connect` is a valid out pointer for the duration of the call
        let result = unsafe { IOServiceOpen(service, task_self(), 0, &mut connect) };
        if result != KERN_SUCCESS {
            log::error!("IOServiceOpen on {} failed: 0x{:X}", device, result);
            return false;
        }

        let result = self.call_scalar(connect, OPEN_USER_CLIENT);
        if result != KERN_SUCCESS {
            log::error!("Opening the user client of {} failed: 0x{:X}", device, result);
            // SAFETY: the connection was opened above and is not used afterwards
            unsafe { IOServiceClose(connect) };
            return false;
        }
        handle.set(connect);
        log::info!("Opened {} [ connect: 0x{:X} ]", device, connect);
        true
    }

    fn close(&self, handle: &mut DeviceHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        let connect = handle.take();
        let result = self.call_scalar(connect, CLOSE_USER_CLIENT);
        if result != KERN_SUCCESS {
            log::debug!("Closing the user client failed: 0x{:X}", result);
        }
        // SAFETY: the connection came from IOServiceOpen and is closed exactly once
        let result = unsafe { IOServiceClose(connect) };
        if result != KERN_SUCCESS {
            log::error!("IOServiceClose failed: 0x{:X}", result);
            return false;
        }
        log::info!("Closed connection 0x{:X}", connect);
        true
    }

    fn ioctl(
        &self,
        handle: &DeviceHandle,
        command: u32,
        input: &[u32],
        output: Option<&mut [u32]>,
    ) -> bool {
        let data = self.call_ioctl(handle, command, input);
        if let Some(output) = output {
            match &data {
                Some(data) => {
                    for (word, value) in output.iter_mut().zip(&data[..MAX_IOCTL_OUT_COUNT]) {
                        *word = (*value & 0xFFFF_FFFF) as u32;
                    }
                    log::trace!("ioctl result: {:X?}", output);
                }
                None => {
                    if let Some(first) = output.first_mut() {
                        *first = 0;
                    }
                }
            }
        }
        data.is_some()
    }

    /// The user client returns the address and the size as its two scalar outputs.
    fn buffer_properties(&self, handle: &DeviceHandle, command: u32) -> Option<(u64, u64)> {
        let data = self.call_ioctl(handle, command, &[])?;
        Some((data[0], data[1]))
    }

    fn mmap(&self, handle: &DeviceHandle, _map_command: u32, size: usize) -> Option<MappedRegion> {
        if !handle.require_open("mmap") {
            return None;
        }
        let mut address: u64 = 0;
        let mut mapped_size: u64 = 0;
        // SAFETY: both out pointers are valid for the duration of the call
        let result = unsafe {
            IOConnectMapMemory64(
                handle.raw(),
                DEFAULT_MEMORY_TYPE,
                task_self(),
                &mut address,
                &mut mapped_size,
                MAP_ANYWHERE,
            )
        };
        if result != KERN_SUCCESS {
            log::error!("IOConnectMapMemory64 failed: 0x{:X}", result);
            return None;
        }
        if (mapped_size as usize) < size {
            log::debug!(
                "Driver mapped 0x{:X} bytes, 0x{:X} were requested",
                mapped_size,
                size
            );
        }
        log::info!("Mapped 0x{:X} bytes at 0x{:X}", mapped_size, address);
        let ptr = std::ptr::NonNull::new(address as usize as *mut u8)?;
        // SAFETY: IOKit mapped `mapped_size` bytes of the driver's buffer into this task
        Some(unsafe { MappedRegion::from_raw_parts(ptr, mapped_size as usize) })
    }

    fn munmap(&self, handle: &DeviceHandle, _map_command: u32, region: MappedRegion) -> bool {
        if !handle.require_open("munmap") {
            return false;
        }
        // SAFETY: the region was mapped by IOConnectMapMemory64 and is consumed here
        let result = unsafe {
            IOConnectUnmapMemory64(
                handle.raw(),
                DEFAULT_MEMORY_TYPE,
                task_self(),
                region.as_ptr() as usize as u64,
            )
        };
        if result != KERN_SUCCESS {
            log::error!("IOConnectUnmapMemory64 failed: 0x{:X}", result);
            return false;
        }
        true
    }

    fn find_devices(&self, _config: &Config) -> Vec<DeviceDescriptor> {
        let Ok(class_name) = CString::new(self.class_name.as_str()) else {
            log::error!("Invalid class name {:?}", self.class_name);
            return Vec::new();
        };
        let mut iterator = IO_OBJECT_NULL;
        // SAFETY: IOServiceGetMatchingServices consumes the matching dictionary
        let result = unsafe {
            IOServiceGetMatchingServices(
                DEFAULT_MAIN_PORT,
                IOServiceMatching(class_name.as_ptr()),
                &mut iterator,
            )
        };
        if result != KERN_SUCCESS {
            log::error!("IOServiceGetMatchingServices failed: 0x{:X}", result);
            return Vec::new();
        }

        let mut devices = Vec::new();
        loop {
            // SAFETY: the iterator is valid until released below
            let service = unsafe { IOIteratorNext(iterator) };
            if service == IO_OBJECT_NULL {
                break;
            }
            log::debug!("Found service 0x{:X} of class {}", service, self.class_name);
            devices.push(DeviceDescriptor::with_service(&self.class_name, service));
        }
        // SAFETY: released exactly once, the services stay referenced by the descriptors
        unsafe { IOObjectRelease(iterator) };
        devices
    }
}
