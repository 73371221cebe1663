//! Field extraction and bit descriptions for the standard PCI configuration header.
//!
//! Every extractor is plain arithmetic over a register dword. The `*_bits` functions
//! render the annotations shown in the diagnostic reports.

/// Number of dwords in the standard header
pub const CFG_REG_COUNT: usize = 16;

pub const CFG_VENDOR_ID: u32 = 0x00;
pub const CFG_COMMAND: u32 = 0x04;
pub const CFG_REV_ID: u32 = 0x08;
pub const CFG_CACHE_SIZE: u32 = 0x0C;
pub const CFG_BAR0: u32 = 0x10;
pub const CFG_CIS_PTR: u32 = 0x28;
pub const CFG_SUB_VENDOR_ID: u32 = 0x2C;
pub const CFG_EXP_ROM_BASE: u32 = 0x30;
pub const CFG_CAP_PTR: u32 = 0x34;
pub const CFG_RESERVED: u32 = 0x38;
pub const CFG_INT_LINE: u32 = 0x3C;

/// Number of base address registers in a type 0 header
pub const BAR_COUNT: u32 = 6;

/// Separates the sub-registers of a dword in a bit list
pub const SEPARATOR: &str = "____________________________________________________";

/// Renders the bit list of a register value
pub type BitDecoder = fn(u32) -> Vec<String>;

/// A named register at a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct RegisterDef {
    pub offset: u32,
    pub name: &'static str,
    pub bits: Option<BitDecoder>,
}

impl RegisterDef {
    pub const fn new(offset: u32, name: &'static str) -> RegisterDef {
        RegisterDef {
            offset,
            name,
            bits: None,
        }
    }

    pub const fn with_bits(offset: u32, name: &'static str, bits: BitDecoder) -> RegisterDef {
        RegisterDef {
            offset,
            name,
            bits: Some(bits),
        }
    }

    /// Decodes `value` as this register
    pub fn bit_list(&self, value: u32) -> Vec<String> {
        self.bits.map(|bits| bits(value)).unwrap_or_default()
    }
}

/// The 16 registers of the standard header, in address order
pub const HEADER_REGISTERS: [RegisterDef; CFG_REG_COUNT] = [
    RegisterDef::with_bits(CFG_VENDOR_ID, "Device ID / Vendor ID", dev_ven_bits),
    RegisterDef::with_bits(CFG_COMMAND, "Status / Command", status_command_bits),
    RegisterDef::with_bits(
        CFG_REV_ID,
        "Base Class / Sub Class / Interface / Revision ID",
        class_rev_bits,
    ),
    RegisterDef::with_bits(
        CFG_CACHE_SIZE,
        "BIST / Header Type / Latency Timer / Cache Line Size",
        bist_header_bits,
    ),
    RegisterDef::with_bits(0x10, "PCI Base Address 0", base_address_bits),
    RegisterDef::with_bits(0x14, "PCI Base Address 1", base_address_bits),
    RegisterDef::with_bits(0x18, "PCI Base Address 2", base_address_bits),
    RegisterDef::with_bits(0x1C, "PCI Base Address 3", base_address_bits),
    RegisterDef::with_bits(0x20, "PCI Base Address 4", base_address_bits),
    RegisterDef::with_bits(0x24, "PCI Base Address 5", base_address_bits),
    RegisterDef::new(CFG_CIS_PTR, "Cardbus CIS Pointer"),
    RegisterDef::with_bits(
        CFG_SUB_VENDOR_ID,
        "Subsystem Device ID / Subsystem Vendor ID",
        subsystem_bits,
    ),
    RegisterDef::new(CFG_EXP_ROM_BASE, "PCI Base Address-to-Local Expansion ROM"),
    RegisterDef::new(CFG_CAP_PTR, "Next Capability Pointer"),
    RegisterDef::new(CFG_RESERVED, "Reserved"),
    RegisterDef::with_bits(
        CFG_INT_LINE,
        "Max_Lat / Min_Grant / Interrupt Pin / Interrupt Line",
        max_lat_bits,
    ),
];

/// Configuration-space offset of base address register `bar`
pub const fn bar_offset(bar: u32) -> u32 {
    CFG_BAR0 + bar * 4
}

pub const fn vendor_id(x: u32) -> u32 {
    x & 0x0000FFFF
}

pub const fn device_id(x: u32) -> u32 {
    (x & 0xFFFF0000) >> 16
}

pub const fn base_class(x: u32) -> u32 {
    (x & 0xFF000000) >> 24
}

pub const fn sub_class(x: u32) -> u32 {
    (x & 0x00FF0000) >> 16
}

pub const fn interface(x: u32) -> u32 {
    (x & 0x0000FF00) >> 8
}

pub const fn revision_id(x: u32) -> u32 {
    x & 0x000000FF
}

pub const fn command(x: u32) -> u32 {
    x & 0x0000FFFF
}

pub const fn status(x: u32) -> u32 {
    (x & 0xFFFF0000) >> 16
}

/// Single bit `bit` of the full register dword
pub const fn bit(x: u32, bit: u32) -> u32 {
    (x >> bit) & 1
}

pub const fn devsel_timing(x: u32) -> u32 {
    (x & 0x06000000) >> 25
}

pub const fn bist(x: u32) -> u32 {
    (x & 0xFF000000) >> 24
}

pub const fn header_type(x: u32) -> u32 {
    (x & 0x00FF0000) >> 16
}

pub const fn latency_timer(x: u32) -> u32 {
    (x & 0x0000FF00) >> 8
}

pub const fn cache_line_size(x: u32) -> u32 {
    x & 0x000000FF
}

/// Completion code, taken from the BIST byte
pub const fn bist_completion_code(bist: u32) -> u32 {
    bist & 0x0F
}

pub const fn bist_invoked(bist: u32) -> u32 {
    (bist & 0x40) >> 6
}

pub const fn bist_capable(bist: u32) -> u32 {
    (bist & 0x80) >> 7
}

/// 1 for I/O space, 0 for memory space
pub const fn base_addr_space(x: u32) -> u32 {
    x & 0x00000001
}

pub const fn base_addr_mem_type(x: u32) -> u32 {
    (x & 0x00000006) >> 1
}

pub const fn base_addr_prefetchable(x: u32) -> u32 {
    (x & 0x00000008) >> 3
}

/// Bits 4-31 of a memory BAR
pub const fn mem_base_address(x: u32) -> u32 {
    (x & 0xFFFFFFF0) >> 4
}

/// Bits 2-31 of an I/O BAR
pub const fn io_base_address(x: u32) -> u32 {
    (x & 0xFFFFFFFC) >> 2
}

pub const fn max_latency(x: u32) -> u32 {
    (x & 0xFF000000) >> 24
}

pub const fn min_grant(x: u32) -> u32 {
    (x & 0x00FF0000) >> 16
}

pub const fn interrupt_pin(x: u32) -> u32 {
    (x & 0x0000FF00) >> 8
}

pub const fn interrupt_line(x: u32) -> u32 {
    x & 0x000000FF
}

pub fn base_class_name(class: u32) -> &'static str {
    match class {
        0x00 => "Old Device",
        0x01 => "Mass Storage Controller",
        0x02 => "Network Controller",
        0x03 => "Display Controller",
        0x04 => "Multimedia Device",
        0x05 => "Memory Controller",
        0x06 => "Bridge Device",
        0x07 => "Simple Communication Controller",
        0x08 => "Base System Peripherals",
        0x09 => "Input Device",
        0x0A => "Docking Stations",
        0x0B => "Processors",
        0x0C => "Serial Bus Controller",
        0x0D..=0xFE => "Reserved",
        _ => "unknown",
    }
}

pub fn devsel_name(timing: u32) -> &'static str {
    match timing {
        0 => "fast",
        1 => "medium",
        2 => "slow",
        3 => "reserved",
        _ => "unknown",
    }
}

pub fn mem_type_name(mem_type: u32) -> &'static str {
    match mem_type {
        0 => "locate anywhere 32-bit addr space",
        1 => "locate below 1 Meg",
        2 => "locate anywhere 64-bit addr space",
        _ => "reserved",
    }
}

pub fn dev_ven_bits(x: u32) -> Vec<String> {
    vec![
        format!("Device ID: 0x{:X}", device_id(x)),
        format!("Vendor ID: 0x{:X}", vendor_id(x)),
    ]
}

const COMMAND_BITS: [&str; 10] = [
    "I/O Access Enable",
    "Memory Space Enable",
    "Bus Master Enable",
    "Special Cycle Enable",
    "Memory Write and Invalidate",
    "VGA Palette Snoop",
    "Parity Error Response Enable",
    "Address Stepping Enable",
    "Internal SERR# Enable",
    "Fast Back-to-Back Enable",
];

pub fn command_bits(x: u32) -> Vec<String> {
    let mut list = Vec::with_capacity(COMMAND_BITS.len() + 2);
    list.push(format!("PCI COMMAND BIT DEFINITIONS ( 0x{:X} )", command(x)));
    for (n, name) in (0u32..).zip(COMMAND_BITS) {
        list.push(format!("Bit {:2} : {} : {}", n, name, bit(x, n)));
    }
    list.push("Bit 10-15 : Reserved".to_owned());
    list
}

pub fn status_bits(x: u32) -> Vec<String> {
    let timing = devsel_timing(x);
    vec![
        format!("PCI STATUS BIT DEFINITIONS ( 0x{:X} )", status(x)),
        "Bit 0-4 : Reserved".to_owned(),
        format!(
            "Bit 5 : 66-MHz Capable (Internal Clock Frequency) : {}",
            bit(x, 21)
        ),
        "Bit 6 : Reserved".to_owned(),
        format!(
            "Bit 7 : Fast Back-to-Back Transactions Capable : {}",
            bit(x, 23)
        ),
        format!("Bit 8 : Master Data Parity Error : {}", bit(x, 24)),
        format!(
            "Bit 9-10 : DEVSEL Timing : {} [ {} ]",
            timing,
            devsel_name(timing)
        ),
        format!("Bit 11 : Signaled Target Abort : {}", bit(x, 27)),
        format!("Bit 12 : Received Target Abort : {}", bit(x, 28)),
        format!("Bit 13 : Received Master Abort : {}", bit(x, 29)),
        format!("Bit 14 : Signaled System Error : {}", bit(x, 30)),
        format!("Bit 15 : Detected Parity Error : {}", bit(x, 31)),
    ]
}

/// Command bits, a separator, then status bits
pub fn status_command_bits(x: u32) -> Vec<String> {
    let mut list = command_bits(x);
    list.push(SEPARATOR.to_owned());
    list.extend(status_bits(x));
    list
}

pub fn class_rev_bits(x: u32) -> Vec<String> {
    let class = base_class(x);
    vec![
        format!(
            "Base Class Code: 0x{:X} [ {} ]",
            class,
            base_class_name(class)
        ),
        format!("Sub Class Code: 0x{:X}", sub_class(x)),
        format!("Interface: 0x{:X}", interface(x)),
        format!("Revision ID: 0x{:X}", revision_id(x)),
    ]
}

pub fn bist_header_bits(x: u32) -> Vec<String> {
    let bist = bist(x);
    vec![
        format!("BIST BIT DEFINITIONS ( 0x{:X} )", bist),
        format!(
            "Bit 0-3 : BIST Completion Code : 0x{:X}",
            bist_completion_code(bist)
        ),
        "Bit 4-5 : Reserved".to_owned(),
        format!("Bit 6 : BIST Invoked : {}", bist_invoked(bist)),
        format!("Bit 7 : Device BIST Capable : {}", bist_capable(bist)),
        SEPARATOR.to_owned(),
        format!("Header Type: 0x{:X}", header_type(x)),
        format!("Latency Timer: 0x{:X}", latency_timer(x)),
        format!("Cache Line Size: 0x{:X}", cache_line_size(x)),
    ]
}

pub fn base_address_bits(x: u32) -> Vec<String> {
    let mut list = vec![format!("BASE ADDRESS BIT DEFINITIONS ( 0x{:X} )", x)];
    if base_addr_space(x) == 0 {
        let mem_type = base_addr_mem_type(x);
        list.push("Bit 0 : Memory Space Indicator : 0 [ Memory Space ]".to_owned());
        list.push(format!(
            "Bit 1-2 : Type: {} [ {} ]",
            mem_type,
            mem_type_name(mem_type)
        ));
        list.push(format!("Bit 3 : Prefetchable : {}", base_addr_prefetchable(x)));
        list.push(format!(
            "Bit 4-31 : Base Address : 0x{:X}",
            mem_base_address(x)
        ));
    } else {
        list.push("Bit 0 : Memory Space Indicator : 1 [ I/O Space ]".to_owned());
        list.push("Bit 1 : Reserved".to_owned());
        list.push(format!("Bit 2-31 : Base Address : 0x{:X}", io_base_address(x)));
    }
    list
}

pub fn subsystem_bits(x: u32) -> Vec<String> {
    vec![
        format!("Subsystem ID: 0x{:X}", device_id(x)),
        format!("Subsystem Vendor ID: 0x{:X}", vendor_id(x)),
    ]
}

pub fn max_lat_bits(x: u32) -> Vec<String> {
    vec![
        format!("Max_Lat: 0x{:X}", max_latency(x)),
        format!("Min_Grant: 0x{:X}", min_grant(x)),
        format!("Interrupt Pin: 0x{:X}", interrupt_pin(x)),
        format!(
            "Interrupt Line: 0x{:X} [ {} ]",
            interrupt_line(x),
            interrupt_line(x)
        ),
    ]
}

#[test]
fn vendor_mask_is_idempotent() {
    for x in [0u32, 0x905610B5, 0xFFFFFFFF, 0x12345678] {
        for devid in [0u32, 1, 0x9056, 0xFFFF] {
            assert_eq!(vendor_id(vendor_id(x) | (devid << 16)), vendor_id(x));
            assert_eq!(device_id(vendor_id(x) | (devid << 16)), devid);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn class_names() {
        assert_eq!(base_class_name(0x00), "Old Device");
        assert_eq!(base_class_name(0x0C), "Serial Bus Controller");
        assert_eq!(base_class_name(0x0D), "Reserved");
        assert_eq!(base_class_name(0x80), "Reserved");
        assert_eq!(base_class_name(0xFE), "Reserved");
        assert_eq!(base_class_name(0xFF), "unknown");
    }

    #[test]
    fn command_bit_list() {
        let bits = command_bits(0x02B00007);
        assert_eq!(bits[0], "PCI COMMAND BIT DEFINITIONS ( 0x7 )");
        assert_eq!(bits[1], "Bit  0 : I/O Access Enable : 1");
        assert_eq!(bits[3], "Bit  2 : Bus Master Enable : 1");
        assert_eq!(bits[4], "Bit  3 : Special Cycle Enable : 0");
        assert_eq!(bits[10], "Bit  9 : Fast Back-to-Back Enable : 0");
        assert_eq!(bits[11], "Bit 10-15 : Reserved");
    }

    #[test]
    fn status_decodes_devsel() {
        // DEVSEL medium, 66 MHz capable, fast back-to-back capable
        let bits = status_bits(0x02A00000);
        assert_eq!(bits[0], "PCI STATUS BIT DEFINITIONS ( 0x2A0 )");
        assert_eq!(
            bits[2],
            "Bit 5 : 66-MHz Capable (Internal Clock Frequency) : 1"
        );
        assert_eq!(bits[4], "Bit 7 : Fast Back-to-Back Transactions Capable : 1");
        assert_eq!(bits[6], "Bit 9-10 : DEVSEL Timing : 1 [ medium ]");
        assert_eq!(devsel_name(devsel_timing(0x06000000)), "reserved");
    }

    #[test]
    fn status_command_has_separator() {
        let bits = status_command_bits(0);
        assert_eq!(bits.len(), 12 + 1 + 12);
        assert_eq!(bits[12], SEPARATOR);
        assert_eq!(SEPARATOR.len(), 52);
    }

    #[test]
    fn class_revision() {
        let bits = class_rev_bits(0x11800002);
        assert_eq!(bits[0], "Base Class Code: 0x11 [ Reserved ]");
        assert_eq!(bits[1], "Sub Class Code: 0x80");
        assert_eq!(bits[2], "Interface: 0x0");
        assert_eq!(bits[3], "Revision ID: 0x2");
    }

    #[test]
    fn bist_header_latency_cache() {
        let bits = bist_header_bits(0xC3002010);
        assert_eq!(bits[0], "BIST BIT DEFINITIONS ( 0xC3 )");
        assert_eq!(bits[1], "Bit 0-3 : BIST Completion Code : 0x3");
        assert_eq!(bits[3], "Bit 6 : BIST Invoked : 1");
        assert_eq!(bits[4], "Bit 7 : Device BIST Capable : 1");
        assert_eq!(bits[5], SEPARATOR);
        assert_eq!(bits[6], "Header Type: 0x0");
        assert_eq!(bits[7], "Latency Timer: 0x20");
        assert_eq!(bits[8], "Cache Line Size: 0x10");
    }

    #[test]
    fn memory_and_io_bars() {
        let mem = base_address_bits(0xFEB0000C);
        assert_eq!(mem[0], "BASE ADDRESS BIT DEFINITIONS ( 0xFEB0000C )");
        assert_eq!(mem[1], "Bit 0 : Memory Space Indicator : 0 [ Memory Space ]");
        assert_eq!(
            mem[2],
            "Bit 1-2 : Type: 2 [ locate anywhere 64-bit addr space ]"
        );
        assert_eq!(mem[3], "Bit 3 : Prefetchable : 1");
        assert_eq!(mem[4], "Bit 4-31 : Base Address : 0xFEB0000");

        let io = base_address_bits(0x0000E001);
        assert_eq!(io.len(), 4);
        assert_eq!(io[1], "Bit 0 : Memory Space Indicator : 1 [ I/O Space ]");
        assert_eq!(io[2], "Bit 1 : Reserved");
        assert_eq!(io[3], "Bit 2-31 : Base Address : 0x3800");
    }

    #[test]
    fn interrupt_line_in_decimal() {
        let bits = max_lat_bits(0x0000010B);
        assert_eq!(bits[2], "Interrupt Pin: 0x1");
        assert_eq!(bits[3], "Interrupt Line: 0xB [ 11 ]");
    }

    #[test]
    fn header_table_covers_sixteen_dwords() {
        for (i, reg) in HEADER_REGISTERS.iter().enumerate() {
            assert_eq!(reg.offset, i as u32 * 4);
        }
        assert_eq!(bar_offset(5), 0x24);
        assert!(HEADER_REGISTERS[10].bit_list(0x1234).is_empty());
    }
}
