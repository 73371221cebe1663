//! Register maps of the PLX PCI 9056 bridge used on ARC-66/67 boards.
use super::regs::{RegisterDef, dev_ven_bits};

/// Base address register holding the PLX local configuration registers
pub const LOCAL_CONFIG_BAR: u32 = 0;

/// A named group of registers read through one base address register.
#[derive(Debug, Clone, Copy)]
pub struct BarTable {
    pub name: &'static str,
    pub bar: u32,
    pub registers: &'static [RegisterDef],
}

/// PLX specific capability registers following the standard header
pub const CAPABILITY_REGISTERS: [RegisterDef; 5] = [
    RegisterDef::new(
        0x40,
        "Power Management Capability / Next Item Ptr / Capability ID",
    ),
    RegisterDef::new(0x44, "PM Cap: PM Data / Bridge Ext / PM Control & Status"),
    RegisterDef::new(
        0x48,
        "Hot Swap Capability / Next Item Pointer / Capability ID",
    ),
    RegisterDef::new(
        0x4C,
        "VPD Capability / VPD Address / Next Item Ptr / Capability ID",
    ),
    RegisterDef::new(0x50, "VPD Data"),
];

const LOCAL_CONFIG: [RegisterDef; 18] = [
    RegisterDef::new(0x00, "Direct Slave Local Address Space 0 Range"),
    RegisterDef::new(0x04, "Direct Slave Local Address Space 0 ( Remap )"),
    RegisterDef::new(0x08, "Mode/DMA Arbitration"),
    RegisterDef::new(
        0x0C,
        "Local Misc Ctrl 2/EEPROM Addr Boundary/Local Misc Ctrl 1/Endian Descriptor",
    ),
    RegisterDef::new(0x10, "Direct Slave Expansion ROM Range"),
    RegisterDef::new(
        0x14,
        "Direct Slave Exp ROM Local Base Addr (Remap) & BREQo Ctrl",
    ),
    RegisterDef::new(0x18, "Local Addr Space 0/Expansion ROM Bus Region Descriptor"),
    RegisterDef::new(0x1C, "Local Range Direct Master-to-PCIe"),
    RegisterDef::new(0x20, "Local Base Addr Direct Master-to-PCIe Memory"),
    RegisterDef::new(0x24, "Local Base Addr Direct Master-to-PCIe I/O Configuration"),
    RegisterDef::new(0x28, "PCIe Base Addr (Remap) Master-to-PCIe Memory"),
    RegisterDef::new(0x2C, "PCI Config Addr Direct Master-to-PCIe I/O Configuration"),
    RegisterDef::new(0xF0, "Direct Slave Local Addr Space 1 Range"),
    RegisterDef::new(0xF4, "Direct Slave Local Addr Space 1 Local Base Addr (Remap)"),
    RegisterDef::new(0xF8, "Local Addr Space 1 Bus Region Descriptor"),
    RegisterDef::new(0xFC, "Direct Master PCIe Dual Addr Cycles Upper Addr"),
    RegisterDef::new(0x100, "Internal Arbiter Control"),
    RegisterDef::new(0x104, "PCI Abort Address"),
];

/// Hardwired device and vendor id of the bridge
pub const PERM_VENDOR_ID: u32 = 0x70;

const RUNTIME: [RegisterDef; 14] = [
    RegisterDef::new(0x40, "Mailbox 0"),
    RegisterDef::new(0x44, "Mailbox 1"),
    RegisterDef::new(0x48, "Mailbox 2"),
    RegisterDef::new(0x4C, "Mailbox 3"),
    RegisterDef::new(0x50, "Mailbox 4"),
    RegisterDef::new(0x54, "Mailbox 5"),
    RegisterDef::new(0x58, "Mailbox 6"),
    RegisterDef::new(0x5C, "Mailbox 7"),
    RegisterDef::new(0x60, "PCIe-to-Local Doorbell"),
    RegisterDef::new(0x64, "Local-to-PCIe Doorbell"),
    RegisterDef::new(0x68, "Interrupt Control/Status"),
    RegisterDef::new(
        0x6C,
        "Serial EEPROM Ctrl, PCI Cmd Codes, User I/O Ctrl, Init Ctrl",
    ),
    RegisterDef::with_bits(PERM_VENDOR_ID, "Device ID / Vendor ID", dev_ven_bits),
    RegisterDef::new(0x74, "Reserved / PCI Hardwired Revision ID"),
];

const DMA: [RegisterDef; 15] = [
    RegisterDef::new(0x80, "DMA Channel 0 Mode"),
    RegisterDef::new(0x84, "DMA Channel 0 PCIe Address"),
    RegisterDef::new(0x88, "DMA Channel 0 Local Address"),
    RegisterDef::new(0x8C, "DMA Channel 0 Transfer Size (Bytes)"),
    RegisterDef::new(0x90, "DMA Channel 0 Descriptor Pointer"),
    RegisterDef::new(0x94, "DMA Channel 1 Mode"),
    RegisterDef::new(0x98, "DMA Channel 1 PCIe Address"),
    RegisterDef::new(0x9C, "DMA Channel 1 Local Address"),
    RegisterDef::new(0xA0, "DMA Channel 1 Transfer Size (Bytes)"),
    RegisterDef::new(0xA4, "DMA Channel 1 Descriptor Pointer"),
    RegisterDef::new(0xA8, "Reserved / DMA Ch 1 Cmd-Status / DMA Ch 0 Cmd-Status"),
    RegisterDef::new(0xAC, "DMA Arbitration"),
    RegisterDef::new(0xB0, "DMA Threshold"),
    RegisterDef::new(0xB4, "DMA Channel 0 PCIe Dual Addr Cycle Upper Addr"),
    RegisterDef::new(0xB8, "DMA Channel 1 PCIe Dual Addr Cycle Upper Addr"),
];

const MESSAGE_QUEUE: [RegisterDef; 13] = [
    RegisterDef::new(0x30, "Outbound Post Queue Interrupt Status"),
    RegisterDef::new(0x34, "Outbound Post Queue Interrupt Mask"),
    RegisterDef::new(0xC0, "Messaging Queue Configuration"),
    RegisterDef::new(0xC4, "Queue Base Address"),
    RegisterDef::new(0xC8, "Inbound Free Head Pointer"),
    RegisterDef::new(0xCC, "Inbound Free Tail Pointer"),
    RegisterDef::new(0xD0, "Inbound Post Head Pointer"),
    RegisterDef::new(0xD4, "Inbound Post Tail Pointer"),
    RegisterDef::new(0xD8, "Outbound Free Head Pointer"),
    RegisterDef::new(0xDC, "Outbound Free Tail Pointer"),
    RegisterDef::new(0xE0, "Outbound Post Head Pointer"),
    RegisterDef::new(0xE4, "Outbound Post Tail Pointer"),
    RegisterDef::new(0xE8, "Reserved / Queue Control-Status"),
];

/// The local register groups, in report order
pub const BAR_TABLES: [BarTable; 4] = [
    BarTable {
        name: "Local Config (BAR0)",
        bar: LOCAL_CONFIG_BAR,
        registers: &LOCAL_CONFIG,
    },
    BarTable {
        name: "Runtime Regs (BAR0)",
        bar: LOCAL_CONFIG_BAR,
        registers: &RUNTIME,
    },
    BarTable {
        name: "DMA Regs (BAR0)",
        bar: LOCAL_CONFIG_BAR,
        registers: &DMA,
    },
    BarTable {
        name: "Msg Q Regs (BAR0)",
        bar: LOCAL_CONFIG_BAR,
        registers: &MESSAGE_QUEUE,
    },
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table_sizes() {
        let sizes: Vec<_> = BAR_TABLES.iter().map(|t| t.registers.len()).collect();
        assert_eq!(sizes, vec![18, 14, 15, 13]);
        assert_eq!(CAPABILITY_REGISTERS.len(), 5);
    }

    #[test]
    fn only_vendor_id_is_decoded() {
        for table in BAR_TABLES {
            for reg in table.registers {
                assert_eq!(reg.bits.is_some(), reg.offset == PERM_VENDOR_ID && table.name.starts_with("Runtime"));
            }
        }
        let runtime = &BAR_TABLES[1];
        let vendor = runtime.registers.iter().find(|r| r.offset == PERM_VENDOR_ID).unwrap();
        assert_eq!(
            vendor.bit_list(0x905610B5),
            vec!["Device ID: 0x9056", "Vendor ID: 0x10B5"]
        );
    }

    #[test]
    fn offsets_are_dword_aligned() {
        for table in BAR_TABLES {
            for reg in table.registers {
                assert_eq!(reg.offset % 4, 0, "{}", reg.name);
            }
        }
    }
}
