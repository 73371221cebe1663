//! # Windows Backend
//!
//! For the ARC WDM/KMDF drivers. The device is opened as a file and every request
//! is a buffered `DeviceIoControl` call. Memory mapping is a request of its own:
//! the driver maps the image buffer and returns its virtual address.
//!
//! The drivers publish a device interface rather than a named device node.
//! [`WindowsSystem::find_devices`] enumerates the present interfaces of the GUID
//! given to [`WindowsSystem::new`]. Without one, open the interface path directly.
use std::{ffi::c_void, mem};

use windows::{
    Win32::{
        Devices::DeviceAndDriverInstallation::{
            DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO, SP_DEVICE_INTERFACE_DATA,
            SP_DEVICE_INTERFACE_DETAIL_DATA_W, SetupDiDestroyDeviceInfoList,
            SetupDiEnumDeviceInterfaces, SetupDiGetClassDevsW, SetupDiGetDeviceInterfaceDetailW,
        },
        Foundation::{CloseHandle, GENERIC_READ, GENERIC_WRITE, HANDLE},
        Storage::FileSystem::{
            CreateFileW, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_READ, FILE_SHARE_WRITE,
            OPEN_EXISTING,
        },
        System::IO::DeviceIoControl,
    },
    core::{GUID, PCWSTR},
};

use crate::{ArcSystem, DeviceDescriptor, DeviceHandle, MappedRegion, config::Config};

/// Device type the ARC drivers register their control codes under
pub const ARC_CTRL_ID: u32 = 33000;

const METHOD_BUFFERED: u32 = 0;
const FILE_ANY_ACCESS: u32 = 0;

/// Builds the `CTL_CODE` for an ARC driver command
pub const fn control_code(command: u32) -> u32 {
    (ARC_CTRL_ID << 16) | (FILE_ANY_ACCESS << 14) | ((0x800 | command) << 2) | METHOD_BUFFERED
}

fn to_handle(raw: isize) -> HANDLE {
    HANDLE(raw as *mut c_void)
}

/// Parses an interface GUID such as `{6B29FC40-CA47-1067-B31D-00DD010662DA}`.
/// The braces are optional.
pub fn parse_interface_guid(text: &str) -> Option<GUID> {
    let text = text.trim().trim_start_matches('{').trim_end_matches('}');
    let groups: Vec<&str> = text.split('-').collect();
    let lengths: Vec<usize> = groups.iter().map(|group| group.len()).collect();
    if lengths != [8, 4, 4, 4, 12] {
        return None;
    }
    let digits = groups.concat();
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u128::from_str_radix(&digits, 16).ok().map(GUID::from_u128)
}

/// Collects the paths of the interfaces in `info`, in enumeration order.
fn interface_paths(info: HDEVINFO, interface: &GUID) -> Vec<DeviceDescriptor> {
    let mut devices = Vec::new();
    for index in 0u32.. {
        let mut data = SP_DEVICE_INTERFACE_DATA {
            cbSize: mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32,
            ..Default::default()
        };
        // SAFETY: `info` is a valid device information set and `data` is sized above
        if unsafe { SetupDiEnumDeviceInterfaces(info, None, interface, index, &mut data) }.is_err()
        {
            break;
        }

        let mut required: u32 = 0;
        // SAFETY: size query without a detail buffer, the call fails by contract
        let _ = unsafe {
            SetupDiGetDeviceInterfaceDetailW(info, &data, None, 0, Some(&mut required), None)
        };
        let offset = mem::offset_of!(SP_DEVICE_INTERFACE_DETAIL_DATA_W, DevicePath);
        if (required as usize) <= offset {
            log::debug!("Interface {} reports no detail data", index);
            continue;
        }

        let mut buffer = vec![0u32; (required as usize).div_ceil(4)];
        let detail = buffer.as_mut_ptr() as *mut SP_DEVICE_INTERFACE_DETAIL_DATA_W;
        // SAFETY: the buffer is aligned for the struct and holds `required` bytes
        unsafe { (*detail).cbSize = mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32 };
        // SAFETY: `detail` points to `required` writable bytes with cbSize set
        if let Err(e) = unsafe {
            SetupDiGetDeviceInterfaceDetailW(info, &data, Some(detail), required, None, None)
        } {
            log::error!("SetupDiGetDeviceInterfaceDetail failed: {}", e);
            break;
        }

        let capacity = (required as usize - offset) / 2;
        // SAFETY: DevicePath starts at `offset` and runs to the end of the `required`
        // bytes the call filled in
        let wide = unsafe {
            std::slice::from_raw_parts(
                (buffer.as_ptr() as *const u8).add(offset) as *const u16,
                capacity,
            )
        };
        let end = wide.iter().position(|c| *c == 0).unwrap_or(wide.len());
        let path = String::from_utf16_lossy(&wide[..end]);
        log::debug!("Found device interface {}", path);
        devices.push(DeviceDescriptor::new(path));
    }
    devices
}

/// Device access through `CreateFileW` and `DeviceIoControl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsSystem {
    interface: Option<GUID>,
}

impl WindowsSystem {
    /// Creates a backend that finds the devices publishing `interface`
    pub fn new(interface: GUID) -> WindowsSystem {
        WindowsSystem {
            interface: Some(interface),
        }
    }

    fn device_io_control(
        &self,
        handle: &DeviceHandle,
        command: u32,
        input: &[u32],
        output: Option<&mut [u32]>,
    ) -> bool {
        let code = control_code(command);
        let in_ptr = if input.is_empty() {
            None
        } else {
            Some(input.as_ptr() as *const c_void)
        };
        let in_len = std::mem::size_of_val(input) as u32;
        let (out_ptr, out_len) = match output {
            Some(output) if !output.is_empty() => (
                Some(output.as_mut_ptr() as *mut c_void),
                std::mem::size_of_val(output) as u32,
            ),
            _ => (None, 0),
        };

        log::debug!(
            "DeviceIoControl handle=0x{:X} code=0x{:X} in={:X?}",
            handle.raw(),
            code,
            input
        );
        let mut returned: u32 = 0;
        // SAFETY: both buffers outlive the synchronous call and their lengths are
        // given in bytes.
        let result = unsafe {
            DeviceIoControl(
                to_handle(handle.raw()),
                code,
                in_ptr,
                in_len,
                out_ptr,
                out_len,
                Some(&mut returned),
                None,
            )
        };
        match result {
            Ok(()) => {
                log::trace!("DeviceIoControl returned {} bytes", returned);
                true
            }
            Err(e) => {
                log::error!("DeviceIoControl 0x{:X} failed: {}", code, e);
                false
            }
        }
    }
}

impl ArcSystem for WindowsSystem {
    fn open(&self, handle: &mut DeviceHandle, device: &DeviceDescriptor, flags: u64) -> bool {
        if handle.is_valid() {
            log::error!("Cannot open {}: handle is already open", device);
            return false;
        }
        let Ok(flags) = u32::try_from(flags) else {
            log::error!("Open flags 0x{:X} do not fit into a DWORD", flags);
            return false;
        };

        log::debug!("Opening device: {}", device.name());
        let wide: Vec<u16> = device
            .name()
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();
        // SAFETY: `wide` is a NUL terminated UTF-16 string that outlives the call
        let result = unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                (GENERIC_READ | GENERIC_WRITE).0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(flags),
                None,
            )
        };
        match result {
            Ok(raw) if !raw.is_invalid() => {
                handle.set(raw.0 as isize);
                log::info!("Opened {}", device.name());
                true
            }
            Ok(_) => {
                log::error!("CreateFileW returned an invalid handle for {}", device.name());
                false
            }
            Err(e) => {
                log::error!("CreateFileW on {} failed: {}", device.name(), e);
                false
            }
        }
    }

    fn close(&self, handle: &mut DeviceHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        let raw = handle.take();
        // SAFETY: the handle came from CreateFileW and is closed exactly once
        match unsafe { CloseHandle(to_handle(raw)) } {
            Ok(()) => {
                log::info!("Closed handle 0x{:X}", raw);
                true
            }
            Err(e) => {
                log::error!("CloseHandle failed: {}", e);
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
        self.device_io_control(handle, command, input, output)
    }

    fn mmap(&self, handle: &DeviceHandle, map_command: u32, size: usize) -> Option<MappedRegion> {
        if !handle.require_open("mmap") {
            return None;
        }
        let mut address = [0u32; 2];
        if !self.device_io_control(handle, map_command, &[], Some(&mut address)) {
            return None;
        }
        let address = super::join_words(address);
        log::info!("Driver mapped 0x{:X} bytes at 0x{:X}", size, address);
        let ptr = std::ptr::NonNull::new(address as usize as *mut u8)?;
        // SAFETY: the driver maps the common buffer into this process and keeps it
        // mapped until the unmap request.
        Some(unsafe { MappedRegion::from_raw_parts(ptr, size) })
    }

    fn munmap(&self, handle: &DeviceHandle, map_command: u32, region: MappedRegion) -> bool {
        if !handle.require_open("munmap") {
            return false;
        }
        let words = super::split_words(region.as_ptr() as usize as u64);
        self.device_io_control(handle, map_command, &words, None)
    }

    fn find_devices(&self, _config: &Config) -> Vec<DeviceDescriptor> {
        let Some(interface) = self.interface else {
            log::info!("No device interface GUID given, open a device path directly");
            return Vec::new();
        };
        // SAFETY: the GUID outlives the call, no enumerator and no window are passed
        let info = match unsafe {
            SetupDiGetClassDevsW(
                Some(&interface),
                PCWSTR::null(),
                None,
                DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
            )
        } {
            Ok(info) => info,
            Err(e) => {
                log::error!("SetupDiGetClassDevs failed: {}", e);
                return Vec::new();
            }
        };
        let devices = interface_paths(info, &interface);
        // SAFETY: the set came from SetupDiGetClassDevsW and is destroyed exactly once
        if let Err(e) = unsafe { SetupDiDestroyDeviceInfoList(info) } {
            log::debug!("SetupDiDestroyDeviceInfoList failed: {}", e);
        }
        devices
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn control_codes() {
        // CTL_CODE(33000, 0x801, METHOD_BUFFERED, FILE_ANY_ACCESS)
        assert_eq!(control_code(0x1), 0x80E8_2004);
        assert_eq!(control_code(0xC), 0x80E8_2030);
    }

    #[test]
    fn interface_guids() {
        let guid = GUID::from_u128(0x6B29FC40_CA47_1067_B31D_00DD010662DA);
        assert_eq!(
            parse_interface_guid("{6B29FC40-CA47-1067-B31D-00DD010662DA}"),
            Some(guid)
        );
        assert_eq!(
            parse_interface_guid("6b29fc40-ca47-1067-b31d-00dd010662da"),
            Some(guid)
        );
        for text in ["", "6B29FC40CA471067B31D00DD010662DA", "6B29FC40-CA47-1067-B31D-00DD010662DX"] {
            assert_eq!(parse_interface_guid(text), None, "{}", text);
        }
    }

    #[test]
    fn no_interface_finds_nothing() {
        assert!(WindowsSystem::default().find_devices(&Config::default()).is_empty());
        // an interface no driver publishes
        let system = WindowsSystem::new(GUID::from_u128(0x00000000_0000_0000_0000_0000000A2C00));
        assert!(system.find_devices(&Config::default()).is_empty());
    }

    #[test]
    fn missing_device_stays_closed() {
        let system = WindowsSystem::default();
        let mut handle = DeviceHandle::invalid();
        let device = DeviceDescriptor::new(r"\\.\ArcNoSuchDevice0");
        assert!(!system.open(&mut handle, &device, 0));
        assert!(!handle.is_valid());
        assert!(!system.close(&mut handle));
    }
}
