//! # Simulated ARC Hardware
//!
//! [`SimulatedSystem`] implements [`ArcSystem`] in memory so the PCIe driver can be
//! exercised without a board. It models the parts of an ARC-66/67 the driver
//! touches:
//!
//! - a configuration space of PLX 9056 dwords, readable by byte, word and dword
//! - BAR register maps, with the status, reply and command registers of BAR 2
//!   behaving like the board's
//! - a scripted queue of controller responses, consumed one per command
//! - a fake common image buffer, whose properties follow either driver
//!   layout of [`BufferLayout`]
//!
//! All state sits behind a [`RefCell`], since the OS layer takes `&self`.
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
    ptr::NonNull,
};

use arc_device::{
    ArcSystem, DeviceDescriptor, DeviceHandle, MappedRegion, RawHandle,
    config::Config,
    pci::regs::CFG_REG_COUNT,
    pcie::{
        DEV_REG_BAR, REG_CMD_HEADER, REG_CMD_REPLY, REG_CTLR_SPECIAL_CMD, REG_RESET, REG_STATUS,
        STATUS_CLEAR_ALL, request,
    },
    system::{join_words, split_words},
};
use arc_protocol::codec::{PACKET_DATA_MASK, PACKET_WORD_TAG};

/// Configuration-space header of a PLX 9056 based board
pub const PLX_CONFIG_SPACE: [u32; CFG_REG_COUNT] = [
    0x905610B5, 0x02B00007, 0x11800002, 0x00002010, 0xFEBFF000, 0x0000E001, 0xFE000000, 0, 0, 0,
    0, 0x300010B5, 0, 0x40, 0, 0x0000010B,
];

/// PLX capability registers at 0x40 - 0x50
pub const PLX_CAPABILITIES: [u32; 5] = [0x00024801, 0x00000000, 0x00004C06, 0x00000003, 0];

/// Bus address reported for the fake image buffer
pub const PHYSICAL_ADDRESS: u64 = 0x0000_0001_2340_0000;

/// Last byte offset of the command registers
const REG_CMD_LAST: u32 = 0x18;

/// How the simulated driver answers a buffer properties request.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum BufferLayout {
    /// Address and size as two native 64-bit values in four words, as on Linux
    /// and Windows
    #[default]
    Words,
    /// Address and size as two 32-bit scalars, as the macOS user client
    /// answers
    Scalars,
}

/// What the controller does in answer to the next command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Response {
    /// Raises reply received with this reply word
    Reply(u32),
    /// Sets these status bits, e.g. a header error
    Status(u32),
}

#[derive(Debug, Default)]
struct State {
    devices: Vec<DeviceDescriptor>,
    cfg: Vec<u32>,
    bars: HashMap<(u32, u32), u32>,
    status: u32,
    reply: u32,
    responses: VecDeque<Response>,
    packet: Vec<u32>,
    packets: Vec<Vec<u32>>,
    special_commands: Vec<u32>,
    writes: Vec<(u32, u32, u32)>,
    open_handles: usize,
    next_raw: u16,
    refuse_open: bool,
    fail_close: bool,
    failing_requests: HashSet<u32>,
    buffer: Option<Box<[u16]>>,
    kernel_buffer_size: Option<u64>,
    buffer_layout: BufferLayout,
}

impl State {
    fn respond(&mut self) {
        match self.responses.pop_front() {
            Some(Response::Reply(reply)) => {
                self.reply = reply;
                self.status = (self.status & !3) | 2;
            }
            Some(Response::Status(bits)) => self.status |= bits,
            None => log::debug!("No scripted response, the command stays unanswered"),
        }
    }

    fn write_device_register(&mut self, offset: u32, value: u32) {
        match offset {
            REG_STATUS => self.status &= !(value & STATUS_CLEAR_ALL),
            REG_RESET => self.status &= !STATUS_CLEAR_ALL,
            REG_CTLR_SPECIAL_CMD => {
                self.special_commands.push(value);
                self.respond();
            }
            REG_CMD_HEADER..=REG_CMD_LAST => {
                if value & !PACKET_DATA_MASK != PACKET_WORD_TAG {
                    log::warn!("Untagged command word 0x{:X}", value);
                }
                self.packet.push(value & PACKET_DATA_MASK);
                let count = (self.packet[0] & 0xFF) as usize;
                if self.packet.len() >= count {
                    self.packets.push(std::mem::take(&mut self.packet));
                    self.status = (self.status & !3) | 1;
                    self.respond();
                }
            }
            _ => {
                self.bars.insert((DEV_REG_BAR, offset), value);
            }
        }
    }

    fn read_bar(&self, bar: u32, offset: u32) -> u32 {
        match (bar, offset) {
            (DEV_REG_BAR, REG_STATUS) => self.status,
            (DEV_REG_BAR, REG_CMD_REPLY) => self.reply,
            _ => self.bars.get(&(bar, offset)).copied().unwrap_or(0),
        }
    }

    fn read_cfg(&self, offset: u32, width: u32) -> u32 {
        let dword = self.cfg.get((offset / 4) as usize).copied().unwrap_or(0);
        let shift = (offset % 4) * 8;
        match width {
            1 => (dword >> shift) & 0xFF,
            2 => (dword >> shift) & 0xFFFF,
            _ => dword,
        }
    }

    fn write_cfg(&mut self, offset: u32, width: u32, value: u32) {
        let index = (offset / 4) as usize;
        if self.cfg.len() <= index {
            self.cfg.resize(index + 1, 0);
        }
        let shift = (offset % 4) * 8;
        let mask = match width {
            1 => 0xFF << shift,
            2 => 0xFFFF << shift,
            _ => u32::MAX,
        };
        self.cfg[index] = (self.cfg[index] & !mask) | ((value << shift) & mask);
    }
}

/// An in-memory ARC-66/67 board.
#[derive(Debug)]
pub struct SimulatedSystem {
    state: RefCell<State>,
}

impl Default for SimulatedSystem {
    fn default() -> Self {
        SimulatedSystem::new()
    }
}

impl SimulatedSystem {
    /// One board named `sim/Arc66PCIe0` with a PLX 9056 configuration space and
    /// fiber A connected.
    pub fn new() -> SimulatedSystem {
        let mut cfg = PLX_CONFIG_SPACE.to_vec();
        cfg.extend_from_slice(&PLX_CAPABILITIES);
        let state = State {
            devices: vec![DeviceDescriptor::new("sim/Arc66PCIe0")],
            cfg,
            status: 0x80,
            ..State::default()
        };
        SimulatedSystem {
            state: RefCell::new(state),
        }
    }

    /// Replaces the boards reported by `find_devices`
    pub fn with_devices<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.borrow_mut().devices = names.into_iter().map(DeviceDescriptor::new).collect();
        self
    }

    /// Makes every following `open` fail
    pub fn refuse_open(&self, refuse: bool) {
        self.state.borrow_mut().refuse_open = refuse;
    }

    /// Makes every following `close` report a failure. The handle is still released.
    pub fn fail_close(&self, fail: bool) {
        self.state.borrow_mut().fail_close = fail;
    }

    /// Makes every following ioctl with this request code fail
    pub fn fail_request(&self, request: u32) {
        self.state.borrow_mut().failing_requests.insert(request);
    }

    pub fn push_response(&self, response: Response) {
        self.state.borrow_mut().responses.push_back(response);
    }

    pub fn push_reply(&self, reply: u32) {
        self.push_response(Response::Reply(reply));
    }

    pub fn set_status_bits(&self, bits: u32) {
        self.state.borrow_mut().status |= bits;
    }

    pub fn clear_status_bits(&self, bits: u32) {
        self.state.borrow_mut().status &= !bits;
    }

    pub fn status(&self) -> u32 {
        self.state.borrow().status
    }

    pub fn set_bar(&self, bar: u32, offset: u32, value: u32) {
        self.state.borrow_mut().bars.insert((bar, offset), value);
    }

    pub fn bar(&self, bar: u32, offset: u32) -> u32 {
        self.state.borrow().read_bar(bar, offset)
    }

    pub fn cfg_dwords(&self) -> Vec<u32> {
        self.state.borrow().cfg.clone()
    }

    /// Size the kernel reports for its image buffer. Defaults to the mapped size.
    pub fn set_kernel_buffer_size(&self, bytes: u64) {
        self.state.borrow_mut().kernel_buffer_size = Some(bytes);
    }

    pub fn set_buffer_layout(&self, layout: BufferLayout) {
        self.state.borrow_mut().buffer_layout = layout;
    }

    pub fn open_handles(&self) -> usize {
        self.state.borrow().open_handles
    }

    /// Complete command packets as written, untagged, header first
    pub fn packets(&self) -> Vec<Vec<u32>> {
        self.state.borrow().packets.clone()
    }

    pub fn special_commands(&self) -> Vec<u32> {
        self.state.borrow().special_commands.clone()
    }

    /// Every BAR write as `(bar, offset, value)`, in order
    pub fn writes(&self) -> Vec<(u32, u32, u32)> {
        self.state.borrow().writes.clone()
    }

    pub fn is_mapped(&self) -> bool {
        self.state.borrow().buffer.is_some()
    }
}

impl ArcSystem for SimulatedSystem {
    fn open(&self, handle: &mut DeviceHandle, device: &DeviceDescriptor, _flags: u64) -> bool {
        let mut state = self.state.borrow_mut();
        if handle.is_valid() || state.refuse_open {
            log::error!("Cannot open {}", device);
            return false;
        }
        if !state.devices.iter().any(|d| d.name() == device.name()) {
            log::error!("No such device {}", device);
            return false;
        }
        state.next_raw += 1;
        handle.set(RawHandle::from(state.next_raw));
        state.open_handles += 1;
        log::info!("Opened {}", device);
        true
    }

    fn close(&self, handle: &mut DeviceHandle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        handle.take();
        let mut state = self.state.borrow_mut();
        state.open_handles -= 1;
        !state.fail_close
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
        let mut state = self.state.borrow_mut();
        if state.failing_requests.contains(&command) {
            log::error!("Simulated failure of request 0x{:X}", command);
            return false;
        }
        log::trace!("ioctl 0x{:X} in={:X?}", command, input);

        let result = match (command, input) {
            (request::READ_BAR, [bar, offset]) => Some(state.read_bar(*bar, *offset)),
            (request::WRITE_BAR, [bar, offset, value]) => {
                state.writes.push((*bar, *offset, *value));
                if *bar == DEV_REG_BAR {
                    state.write_device_register(*offset, *value);
                } else {
                    state.bars.insert((*bar, *offset), *value);
                }
                None
            }
            (request::READ_CFG_8, [offset]) => Some(state.read_cfg(*offset, 1)),
            (request::READ_CFG_16, [offset]) => Some(state.read_cfg(*offset, 2)),
            (request::READ_CFG_32, [offset]) => Some(state.read_cfg(*offset, 4)),
            (request::WRITE_CFG_8, [offset, value]) => {
                state.write_cfg(*offset, 1, *value);
                None
            }
            (request::WRITE_CFG_16, [offset, value]) => {
                state.write_cfg(*offset, 2, *value);
                None
            }
            (request::WRITE_CFG_32, [offset, value]) => {
                state.write_cfg(*offset, 4, *value);
                None
            }
            (request::BUFFER_PROP, []) => {
                let mapped = state.buffer.as_ref().map_or(0, |b| b.len() * 2) as u64;
                let size = state.kernel_buffer_size.unwrap_or(mapped);
                let words = match state.buffer_layout {
                    BufferLayout::Words => {
                        let [addr_lo, addr_hi] = split_words(PHYSICAL_ADDRESS);
                        let [size_lo, size_hi] = split_words(size);
                        vec![addr_lo, addr_hi, size_lo, size_hi]
                    }
                    // the user client truncates both values
                    BufferLayout::Scalars => vec![PHYSICAL_ADDRESS as u32, size as u32],
                };
                if let Some(output) = output {
                    for (word, value) in output.iter_mut().zip(words) {
                        *word = value;
                    }
                }
                return true;
            }
            _ => {
                log::error!("Unsupported request 0x{:X} with {} words", command, input.len());
                return false;
            }
        };

        if let (Some(value), Some(output)) = (result, output) {
            if let Some(first) = output.first_mut() {
                *first = value;
            }
        }
        true
    }

    fn mmap(&self, handle: &DeviceHandle, map_command: u32, size: usize) -> Option<MappedRegion> {
        if !handle.require_open("mmap") || map_command != request::MEM_MAP {
            return None;
        }
        let mut state = self.state.borrow_mut();
        if state.buffer.is_some() {
            log::error!("Buffer is already mapped");
            return None;
        }
        let mut buffer = vec![0u16; size.div_ceil(2)].into_boxed_slice();
        let ptr = NonNull::new(buffer.as_mut_ptr() as *mut u8)?;
        let len = buffer.len() * 2;
        state.buffer = Some(buffer);
        // SAFETY: the boxed slice is kept alive in `state.buffer` until munmap and
        // its heap allocation does not move.
        Some(unsafe { MappedRegion::from_raw_parts(ptr, len) })
    }

    fn munmap(&self, handle: &DeviceHandle, map_command: u32, region: MappedRegion) -> bool {
        if !handle.require_open("munmap") || map_command != request::MEM_UNMAP {
            return false;
        }
        let mut state = self.state.borrow_mut();
        match &state.buffer {
            Some(buffer) if buffer.as_ptr() as *mut u8 == region.as_ptr() => {
                state.buffer = None;
                true
            }
            _ => {
                log::error!("Region at {:p} is not mapped", region.as_ptr());
                false
            }
        }
    }

    fn buffer_properties(&self, handle: &DeviceHandle, command: u32) -> Option<(u64, u64)> {
        let layout = self.state.borrow().buffer_layout;
        match layout {
            BufferLayout::Words => {
                let mut words = [0u32; 4];
                self.ioctl(handle, command, &[], Some(&mut words))
                    .then(|| {
                        (
                            join_words([words[0], words[1]]),
                            join_words([words[2], words[3]]),
                        )
                    })
            }
            BufferLayout::Scalars => {
                let mut scalars = [0u32; 2];
                self.ioctl(handle, command, &[], Some(&mut scalars))
                    .then(|| (u64::from(scalars[0]), u64::from(scalars[1])))
            }
        }
    }

    fn find_devices(&self, _config: &Config) -> Vec<DeviceDescriptor> {
        self.state.borrow().devices.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cfg_widths() {
        let state = State {
            cfg: vec![0x905610B5],
            ..State::default()
        };
        assert_eq!(state.read_cfg(0, 1), 0xB5);
        assert_eq!(state.read_cfg(1, 1), 0x10);
        assert_eq!(state.read_cfg(2, 2), 0x9056);
        assert_eq!(state.read_cfg(0, 4), 0x905610B5);
        assert_eq!(state.read_cfg(0x40, 4), 0);
    }

    #[test]
    fn partial_cfg_write() {
        let mut state = State {
            cfg: vec![0x02B00007],
            ..State::default()
        };
        state.write_cfg(0, 1, 0x46);
        assert_eq!(state.cfg[0], 0x02B00046);
        state.write_cfg(2, 2, 0xFFFF);
        assert_eq!(state.cfg[0], 0xFFFF0046);
    }

    #[test]
    fn packet_completes_on_count() {
        let mut state = State::default();
        state.responses.push_back(Response::Reply(0x444F4E));
        state.write_device_register(0x00, PACKET_WORD_TAG | 0x203);
        state.write_device_register(0x04, PACKET_WORD_TAG | 0x584D54);
        assert!(state.packets.is_empty());
        state.write_device_register(0x08, PACKET_WORD_TAG | 1);
        assert_eq!(state.packets, vec![vec![0x203, 0x584D54, 1]]);
        assert_eq!(state.status & 3, 2);
        assert_eq!(state.reply, 0x444F4E);
    }
}
