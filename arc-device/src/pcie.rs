//! # PCIe Board Driver
//!
//! Drives an ARC-66/67 PCIe interface card, and through its fiber link the
//! controller behind it, over any [`ArcSystem`].
//!
//! Commands are written word by word into the board's command registers on
//! [`DEV_REG_BAR`]. The board forwards the packet to the controller and raises
//! the reply bits in [`REG_STATUS`], which [`PcieDevice::read_reply`] polls.
//!
//! Every operation needs an open device. Operations on a closed device fail with
//! [`ArcError::Device`] before anything reaches the OS layer.
use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use arc_protocol::{
    ArcError, Result,
    codec::{CommandPacket, PACKET_WORD_TAG, decode_command_list},
    commands::{ABR, CNR, DON, HERR, SYR, TIM_ID, XMT},
    location,
};

use crate::{
    ArcSystem, DeviceDescriptor, DeviceHandle, MappedRegion,
    config::Config,
    pci::{ConfigSpace, ConfigSpaceDecoder, plx, regs::RegisterDef},
};

/// Base address register holding the ARC device registers
pub const DEV_REG_BAR: u32 = 2;
/// Highest valid base address register
pub const MAX_BAR: u32 = 5;

pub const REG_CMD_HEADER: u32 = 0x00;
pub const REG_CMD_COMMAND: u32 = 0x04;
pub const REG_CMD_ARG0: u32 = 0x08;
pub const REG_CTLR_SPECIAL_CMD: u32 = 0x1C;
pub const REG_RESET: u32 = 0x20;
pub const REG_INIT_IMG_ADDR: u32 = 0x38;
pub const REG_FIBER_2X_CTRL: u32 = 0x5C;
pub const REG_STATUS: u32 = 0x60;
pub const REG_CMD_REPLY: u32 = 0x64;
pub const REG_CTLR_ARG1: u32 = 0x68;
pub const REG_CTLR_ARG2: u32 = 0x6C;
pub const REG_PIXEL_COUNT: u32 = 0x70;
pub const REG_FRAME_COUNT: u32 = 0x74;
pub const REG_ID_LO: u32 = 0x78;
pub const REG_ID_HI: u32 = 0x7C;

/// Expected content of [`REG_ID_HI`], `'ARC6'`
pub const BOARD_ID: u32 = 0x41524336;

/// Special commands written to [`REG_CTLR_SPECIAL_CMD`]
pub const CONTROLLER_GET_ID: u32 = 0x09;
pub const CONTROLLER_RESET: u32 = 0x0B;

/// Writing this to [`REG_STATUS`] clears every status bit
pub const STATUS_CLEAR_ALL: u32 = 0x7F;

/// Driver request codes, see [`crate::system::make_command`]
pub mod request {
    pub const READ_BAR: u32 = 0x01;
    pub const WRITE_BAR: u32 = 0x02;
    pub const BAR_SIZE: u32 = 0x03;
    pub const READ_CFG_8: u32 = 0x04;
    pub const READ_CFG_16: u32 = 0x05;
    pub const READ_CFG_32: u32 = 0x06;
    pub const WRITE_CFG_8: u32 = 0x07;
    pub const WRITE_CFG_16: u32 = 0x08;
    pub const WRITE_CFG_32: u32 = 0x09;
    pub const BUFFER_PROP: u32 = 0x0A;
    pub const MEM_MAP: u32 = 0x0C;
    pub const MEM_UNMAP: u32 = 0x0D;
}

/// Content of the board's status register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PcieStatus(pub u32);

impl PcieStatus {
    pub fn idle(&self) -> bool {
        self.0 & 3 == 0
    }

    pub fn command_sent(&self) -> bool {
        self.0 & 3 == 1
    }

    pub fn reply_received(&self) -> bool {
        self.0 & 3 == 2
    }

    pub fn readout(&self) -> bool {
        self.0 & 0x4 != 0
    }

    pub fn controller_reset(&self) -> bool {
        self.0 & 0x8 != 0
    }

    pub fn header_error(&self) -> bool {
        self.0 & 0x10 != 0
    }

    pub fn image_read_timeout(&self) -> bool {
        self.0 & 0x20 != 0
    }

    pub fn fiber_a(&self) -> bool {
        self.0 & 0x80 != 0
    }

    pub fn fiber_b(&self) -> bool {
        self.0 & 0x100 != 0
    }

    /// The board receives on both fibers
    pub fn fiber_2x(&self) -> bool {
        self.0 & 0x200 != 0
    }
}

impl Display for PcieStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// One of the two fiber optic receivers on the board
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fiber {
    A,
    B,
}

/// The kernel's common image buffer, mapped into the process.
#[derive(Debug)]
pub struct ImageBuffer {
    region: MappedRegion,
    physical_address: u64,
    size: usize,
}

impl ImageBuffer {
    pub fn region(&self) -> &MappedRegion {
        &self.region
    }

    /// Bus address the board writes pixels to
    pub fn physical_address(&self) -> u64 {
        self.physical_address
    }

    /// The requested size in bytes. The kernel buffer may be larger.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Driver for one ARC-66/67 board at a time.
///
/// ```ignore
/// let mut device = PcieDevice::new(NativeSystem::default(), Config::default());
/// device.find_devices()?;
/// device.open_with_buffer(0, 4200 * 4200 * 2)?;
/// println!("{}", device.controller_id());
/// ```
pub struct PcieDevice<S: ArcSystem> {
    system: S,
    handle: DeviceHandle,
    config: Config,
    devices: Vec<DeviceDescriptor>,
    buffer: Option<ImageBuffer>,
    decoder: ConfigSpaceDecoder,
}

impl<S: ArcSystem> PcieDevice<S> {
    pub fn new(system: S, config: Config) -> PcieDevice<S> {
        PcieDevice {
            system,
            handle: DeviceHandle::invalid(),
            config,
            devices: Vec::new(),
            buffer: None,
            decoder: ConfigSpaceDecoder::new(),
        }
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Refreshes the list of devices that [`PcieDevice::open`] can pick from.
    pub fn find_devices(&mut self) -> Result<()> {
        let devices = self.system.find_devices(&self.config);
        if devices.is_empty() {
            self.devices.clear();
            return Err(ArcError::device(
                location!("find_devices"),
                "No device bindings exist! Make sure an ARC, Inc PCIe card is installed!",
            ));
        }
        log::info!("Found {} ARC PCIe device(s)", devices.len());
        self.devices = devices;
        Ok(())
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Printable names of the found devices
    pub fn device_list(&self) -> Vec<String> {
        if self.devices.is_empty() {
            return vec!["No Devices Found!".to_string()];
        }
        self.devices
            .iter()
            .enumerate()
            .map(|(i, device)| format!("PCIe Device {} {}", i, device.name()))
            .collect()
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_valid()
    }

    /// Opens device `n` of the last [`PcieDevice::find_devices`] result.
    pub fn open(&mut self, n: usize) -> Result<()> {
        let Some(device) = self.devices.get(n).cloned() else {
            return Err(ArcError::invalid_argument(
                location!("open"),
                format!("Invalid device number: {}", n),
            ));
        };
        self.open_device(&device)
    }

    /// Opens a device that was not discovered, such as an explicit interface path.
    pub fn open_device(&mut self, device: &DeviceDescriptor) -> Result<()> {
        if self.is_open() {
            return Err(ArcError::runtime(
                location!("open_device"),
                "Device already open, call close() first!",
            ));
        }
        if !self
            .system
            .open(&mut self.handle, device, self.config.open_flags)
        {
            return Err(ArcError::device(
                location!("open_device"),
                format!("Failed to open device ( {} )", device),
            ));
        }
        if let Err(e) = self.clear_status() {
            self.close();
            return Err(e);
        }
        Ok(())
    }

    /// Opens device `n` and maps an image buffer of `bytes` bytes.
    pub fn open_with_buffer(&mut self, n: usize, bytes: usize) -> Result<()> {
        self.open(n)?;
        if let Err(e) = self.map_common_buffer(bytes) {
            self.close();
            return Err(e);
        }
        Ok(())
    }

    /// Unmaps the image buffer and closes the device. Does nothing if closed.
    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        if let Err(e) = self.unmap_common_buffer() {
            log::error!("{}", e);
        }
        if !self.system.close(&mut self.handle) {
            log::warn!("Closing the device handle failed");
        }
    }

    fn require_open(&self, location: arc_protocol::Location) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(ArcError::device(location, "Not connected to any device!"))
        }
    }

    /// Reads the dword at byte `offset` of base address region `bar`.
    pub fn read_bar(&self, bar: u32, offset: u32) -> Result<u32> {
        self.require_open(location!("read_bar"))?;
        check_bar(bar, location!("read_bar"))?;
        let mut output = [0u32; 2];
        if !self.system.ioctl(
            &self.handle,
            request::READ_BAR,
            &[bar, offset],
            Some(&mut output),
        ) {
            return Err(ArcError::device(
                location!("read_bar"),
                format!("Reading 0x{:X} : 0x{:X} failed!", bar, offset),
            ));
        }
        log::debug!("BAR{} 0x{:X} -> 0x{:X}", bar, offset, output[0]);
        Ok(output[0])
    }

    /// Writes `value` to byte `offset` of base address region `bar`.
    pub fn write_bar(&self, bar: u32, offset: u32, value: u32) -> Result<()> {
        self.require_open(location!("write_bar"))?;
        check_bar(bar, location!("write_bar"))?;
        log::debug!("BAR{} 0x{:X} <- 0x{:X}", bar, offset, value);
        if !self
            .system
            .ioctl(&self.handle, request::WRITE_BAR, &[bar, offset, value], None)
        {
            return Err(ArcError::device(
                location!("write_bar"),
                format!("Writing 0x{:X} to 0x{:X} : 0x{:X} failed!", value, bar, offset),
            ));
        }
        Ok(())
    }

    fn read_cfg(&self, request: u32, width: &str, offset: u32) -> Result<u32> {
        self.require_open(location!("read_cfg"))?;
        let mut output = [0u32; 1];
        if !self
            .system
            .ioctl(&self.handle, request, &[offset], Some(&mut output))
        {
            return Err(ArcError::device(
                location!("read_cfg"),
                format!(
                    "Reading configuration {} offset 0x{:X} failed",
                    width, offset
                ),
            ));
        }
        log::debug!("CFG {} 0x{:X} -> 0x{:X}", width, offset, output[0]);
        Ok(output[0])
    }

    fn write_cfg(&self, request: u32, width: &str, offset: u32, value: u32) -> Result<()> {
        self.require_open(location!("write_cfg"))?;
        log::debug!("CFG {} 0x{:X} <- 0x{:X}", width, offset, value);
        if !self
            .system
            .ioctl(&self.handle, request, &[offset, value], None)
        {
            return Err(ArcError::device(
                location!("write_cfg"),
                format!(
                    "Writing configuration {} 0x{:X} to offset 0x{:X} failed",
                    width, value, offset
                ),
            ));
        }
        Ok(())
    }

    pub fn cfg_byte(&self, offset: u32) -> Result<u32> {
        self.read_cfg(request::READ_CFG_8, "BYTE", offset)
    }

    pub fn cfg_word(&self, offset: u32) -> Result<u32> {
        self.read_cfg(request::READ_CFG_16, "WORD", offset)
    }

    pub fn cfg_dword(&self, offset: u32) -> Result<u32> {
        self.read_cfg(request::READ_CFG_32, "DWORD", offset)
    }

    pub fn write_cfg_byte(&self, offset: u32, value: u32) -> Result<()> {
        self.write_cfg(request::WRITE_CFG_8, "BYTE", offset, value)
    }

    pub fn write_cfg_word(&self, offset: u32, value: u32) -> Result<()> {
        self.write_cfg(request::WRITE_CFG_16, "WORD", offset, value)
    }

    pub fn write_cfg_dword(&self, offset: u32, value: u32) -> Result<()> {
        self.write_cfg(request::WRITE_CFG_32, "DWORD", offset, value)
    }

    pub fn status(&self) -> Result<PcieStatus> {
        self.read_bar(DEV_REG_BAR, REG_STATUS).map(PcieStatus)
    }

    pub fn clear_status(&self) -> Result<()> {
        self.write_bar(DEV_REG_BAR, REG_STATUS, STATUS_CLEAR_ALL)
    }

    /// The board id, [`BOARD_ID`] on a working ARC-66/67
    pub fn id(&self) -> Result<u32> {
        self.read_bar(DEV_REG_BAR, REG_ID_HI)
    }

    /// Resets the PCIe board. The controller is not affected.
    pub fn reset(&self) -> Result<()> {
        self.write_bar(DEV_REG_BAR, REG_RESET, 1)?;
        let status = self.status()?;
        if !status.idle() {
            return Err(ArcError::device(
                location!("reset"),
                format!("Reset failed! Device status not idle: {}", status),
            ));
        }
        Ok(())
    }

    /// Sends `[board, command, args..]` to the controller and returns its reply.
    pub fn command(&self, command_list: &[u32]) -> Result<u32> {
        let status = self.status()?;
        if status.readout() {
            return Err(ArcError::runtime(
                location!("command"),
                format!("Device reports readout in progress! Status: {}", status),
            ));
        }
        let packet = CommandPacket::new(command_list)?;
        self.clear_status()?;

        let offsets = (REG_CMD_HEADER..).step_by(4);
        for (offset, word) in offsets.zip(packet.tagged_words()) {
            self.write_bar(DEV_REG_BAR, offset, word)?;
        }

        let reply = self
            .read_reply(self.config.reply_timeout)
            .inspect_err(|_| {
                log::error!(
                    "No reply for header 0x{:X} {}",
                    packet.header(),
                    decode_command_list(0, command_list)
                )
            })?;

        let context = decode_command_list(reply, command_list);
        if self.config.log_commands {
            log::info!("{}", context);
        } else {
            log::debug!("{}", context);
        }

        if reply == CNR {
            return Err(ArcError::runtime(
                location!("command"),
                format!(
                    "Controller not ready! Verify controller has been setup! Reply: 0x{:X}",
                    reply
                ),
            ));
        }
        Ok(reply)
    }

    /// Polls the status register until a reply arrives or `timeout` passes.
    ///
    /// A header error yields [`HERR`] and a controller reset yields [`SYR`]
    /// without reading the reply register.
    pub fn read_reply(&self, timeout: Duration) -> Result<u32> {
        let start = Instant::now();
        loop {
            let status = self.status()?;
            if status.header_error() {
                return Ok(HERR);
            }
            if status.controller_reset() {
                return Ok(SYR);
            }
            if status.reply_received() {
                return self.read_bar(DEV_REG_BAR, REG_CMD_REPLY);
            }
            let elapsed = start.elapsed();
            if elapsed > timeout {
                return Err(ArcError::Timeout {
                    location: location!("read_reply"),
                    elapsed,
                    status: status.0,
                });
            }
            std::hint::spin_loop();
        }
    }

    /// The controller id, or 0 if the controller does not answer within
    /// `id_timeout`.
    pub fn controller_id(&self) -> u32 {
        let result = self
            .clear_status()
            .and_then(|_| self.write_bar(DEV_REG_BAR, REG_CTLR_SPECIAL_CMD, CONTROLLER_GET_ID))
            .and_then(|_| self.read_reply(self.config.id_timeout));
        result.unwrap_or_else(|e| {
            log::debug!("Controller id unavailable: {}", e);
            0
        })
    }

    pub fn reset_controller(&self) -> Result<()> {
        self.clear_status()?;
        self.write_bar(DEV_REG_BAR, REG_CTLR_SPECIAL_CMD, CONTROLLER_RESET)?;
        let reply = self.read_reply(self.config.reply_timeout)?;
        if reply != SYR {
            return Err(ArcError::runtime(
                location!("reset_controller"),
                format!("Failed to reset controller, reply: 0x{:X}", reply),
            ));
        }
        log::info!("Controller reset");
        Ok(())
    }

    /// Whether a controller is attached, meaning fiber A sees a signal
    pub fn is_controller_connected(&self) -> Result<bool> {
        self.is_fiber_connected(Fiber::A)
    }

    pub fn is_fiber_connected(&self, fiber: Fiber) -> Result<bool> {
        let status = self.status()?;
        Ok(match fiber {
            Fiber::A => status.fiber_a(),
            Fiber::B => status.fiber_b(),
        })
    }

    /// Switches the controller and the board between one and two fiber transmitters.
    pub fn set_2x_fo_transmitter(&self, on: bool) -> Result<()> {
        let value = u32::from(on);
        let reply = self.command(&[TIM_ID, XMT, value])?;
        if reply != DON {
            return Err(ArcError::runtime(
                location!("set_2x_fo_transmitter"),
                format!(
                    "Failed to {} use of 2x fiber optic transmitters on controller, reply: 0x{:X}",
                    if on { "SET" } else { "CLEAR" },
                    reply
                ),
            ));
        }
        self.write_bar(DEV_REG_BAR, REG_FIBER_2X_CTRL, value)
    }

    /// Aborts a running exposure or readout.
    pub fn stop_exposure(&self) -> Result<()> {
        self.write_bar(
            DEV_REG_BAR,
            REG_CMD_HEADER,
            PACKET_WORD_TAG | (TIM_ID << 8) | 2,
        )?;
        self.write_bar(DEV_REG_BAR, REG_CMD_COMMAND, PACKET_WORD_TAG | ABR)?;
        let reply = self.read_reply(self.config.reply_timeout)?;
        if reply != DON {
            return Err(ArcError::runtime(
                location!("stop_exposure"),
                format!("Failed to stop exposure/readout, reply: 0x{:X}", reply),
            ));
        }
        Ok(())
    }

    pub fn is_readout(&self) -> Result<bool> {
        Ok(self.status()?.readout())
    }

    /// Pixels transferred of the current image
    pub fn pixel_count(&self) -> Result<u32> {
        let count = self.read_bar(DEV_REG_BAR, REG_PIXEL_COUNT)?;
        if self.config.log_commands {
            log::info!("[ PIXEL COUNT REG: 0x{:X} -> {} ]", REG_PIXEL_COUNT, count);
        }
        Ok(count)
    }

    /// Frames transferred in continuous readout
    pub fn frame_count(&self) -> Result<u32> {
        let count = self.read_bar(DEV_REG_BAR, REG_FRAME_COUNT)?;
        if self.config.log_commands {
            log::info!("[ FRAME COUNT REG: 0x{:X} -> {} ]", REG_FRAME_COUNT, count);
        }
        Ok(count)
    }

    pub fn buffer(&self) -> Option<&ImageBuffer> {
        self.buffer.as_ref()
    }

    /// Maps the kernel's common image buffer. Any buffer mapped before is
    /// released first.
    pub fn map_common_buffer(&mut self, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Err(ArcError::invalid_argument(
                location!("map_common_buffer"),
                "Invalid buffer size: 0. Must be greater than zero!",
            ));
        }
        self.require_open(location!("map_common_buffer"))?;
        self.unmap_common_buffer()?;

        let Some(region) = self.system.mmap(&self.handle, request::MEM_MAP, bytes) else {
            return Err(ArcError::device(
                location!("map_common_buffer"),
                "Failed to map image buffer",
            ));
        };

        let Some((physical_address, kernel_size)) = self
            .system
            .buffer_properties(&self.handle, request::BUFFER_PROP)
        else {
            self.system.munmap(&self.handle, request::MEM_UNMAP, region);
            return Err(ArcError::device(
                location!("map_common_buffer"),
                "Failed to read image buffer size",
            ));
        };

        if kernel_size < bytes as u64 {
            self.system.munmap(&self.handle, request::MEM_UNMAP, region);
            return Err(ArcError::runtime(
                location!("map_common_buffer"),
                format!(
                    "Failed to allocate buffer of the correct size.\nWanted: {} bytes [ {}MB ] - Received: {} bytes [ {}MB ]",
                    bytes,
                    bytes as f64 / 1E6,
                    kernel_size,
                    kernel_size as f64 / 1E6
                ),
            ));
        }

        log::info!(
            "Mapped image buffer of {} bytes [ physical: 0x{:X} ]",
            bytes,
            physical_address
        );
        self.buffer = Some(ImageBuffer {
            region,
            physical_address,
            size: bytes,
        });
        Ok(())
    }

    /// Releases the image buffer. Does nothing if none is mapped.
    pub fn unmap_common_buffer(&mut self) -> Result<()> {
        let Some(buffer) = self.buffer.take() else {
            return Ok(());
        };
        if !self
            .system
            .munmap(&self.handle, request::MEM_UNMAP, buffer.region)
        {
            return Err(ArcError::device(
                location!("unmap_common_buffer"),
                "Failed to unmap image buffer",
            ));
        }
        log::info!("Unmapped image buffer");
        Ok(())
    }

    /// The result of the last diagnostic pass
    pub fn decoder(&self) -> &ConfigSpaceDecoder {
        &self.decoder
    }

    /// Reads and decodes the configuration-space header and the PLX capability
    /// registers.
    pub fn config_space(&mut self) -> Result<&ConfigSpaceDecoder> {
        self.require_open(location!("config_space"))?;
        let mut decoder = std::mem::take(&mut self.decoder);
        let result = decoder.read_config_space(&*self);
        self.decoder = decoder;
        result?;
        Ok(&self.decoder)
    }

    /// Reads the implemented BARs and the PLX local register tables.
    pub fn bar_space(&mut self) -> Result<&ConfigSpaceDecoder> {
        self.require_open(location!("bar_space"))?;
        let mut decoder = std::mem::take(&mut self.decoder);
        let result = decoder.read_bars(&*self);
        self.decoder = decoder;
        result?;
        Ok(&self.decoder)
    }
}

impl<S: ArcSystem> ConfigSpace for PcieDevice<S> {
    fn read_dword(&self, offset: u32) -> Result<u32> {
        self.cfg_dword(offset)
    }

    fn read_bar(&self, bar: u32, offset: u32) -> Result<u32> {
        PcieDevice::read_bar(self, bar, offset)
    }

    fn extended_registers(&self) -> &[RegisterDef] {
        &plx::CAPABILITY_REGISTERS
    }

    fn bar_tables(&self) -> &[plx::BarTable] {
        &plx::BAR_TABLES
    }
}

impl<S: ArcSystem> Drop for PcieDevice<S> {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_bar(bar: u32, location: arc_protocol::Location) -> Result<()> {
    if bar > MAX_BAR {
        return Err(ArcError::invalid_argument(
            location,
            format!("Invalid BAR number: 0x{:X}", bar),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::system::NativeSystem;

    fn closed() -> PcieDevice<NativeSystem> {
        PcieDevice::new(NativeSystem::default(), Config::default())
    }

    #[test]
    fn status_predicates() {
        assert!(PcieStatus(0).idle());
        assert!(PcieStatus(1).command_sent());
        assert!(PcieStatus(2).reply_received());
        assert!(!PcieStatus(3).reply_received());
        let status = PcieStatus(0x80 | 0x10 | 0x4);
        assert!(status.fiber_a());
        assert!(!status.fiber_b());
        assert!(status.header_error());
        assert!(status.readout());
        assert!(!status.controller_reset());
        assert!(PcieStatus(0x200).fiber_2x());
        assert!(PcieStatus(0x20).image_read_timeout());
        assert_eq!(PcieStatus(0x182).to_string(), "0x182");
    }

    #[test]
    fn closed_device_is_rejected() {
        let device = closed();
        assert!(!device.is_open());
        assert!(matches!(device.status(), Err(ArcError::Device { .. })));
        assert!(matches!(device.command(&[TIM_ID, XMT, 1]), Err(ArcError::Device { .. })));
        assert_eq!(device.controller_id(), 0);
    }

    #[test]
    fn bar_out_of_range() {
        assert!(check_bar(5, location!("test")).is_ok());
        let err = check_bar(6, location!("test")).unwrap_err();
        assert!(matches!(err, ArcError::InvalidArgument { .. }));
        assert!(err.to_string().starts_with("Invalid argument: Invalid BAR number: 0x6"));
    }

    #[test]
    fn empty_device_list() {
        let mut device = closed();
        assert_eq!(device.device_list(), vec!["No Devices Found!"]);
        assert!(matches!(device.open(0), Err(ArcError::InvalidArgument { .. })));
        assert!(matches!(
            device.map_common_buffer(0),
            Err(ArcError::InvalidArgument { .. })
        ));
        device.close();
        device.close();
    }
}
