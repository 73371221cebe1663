use std::io::{self, Write};

use arc_protocol::{
    error::{ArcError, Result},
    location,
};

use super::{
    plx::BarTable,
    regs::{BAR_COUNT, HEADER_REGISTERS, RegisterDef, bar_offset, base_address_bits},
};

/// Source of raw register values for [`ConfigSpaceDecoder`].
pub trait ConfigSpace {
    /// Reads the configuration-space dword at byte `offset`
    fn read_dword(&self, offset: u32) -> Result<u32>;

    /// Reads the dword at byte `offset` of base address region `bar`
    fn read_bar(&self, bar: u32, offset: u32) -> Result<u32>;

    /// Device specific registers that follow the standard header
    fn extended_registers(&self) -> &[RegisterDef] {
        &[]
    }

    /// Device specific register groups appended to the BAR report
    fn bar_tables(&self) -> &[BarTable] {
        &[]
    }
}

/// A raw dump of configuration-space dwords, starting at offset 0.
impl ConfigSpace for [u32] {
    fn read_dword(&self, offset: u32) -> Result<u32> {
        let index = (offset / 4) as usize;
        self.get(index)
            .copied()
            .ok_or_else(|| ArcError::out_of_range(location!("read_dword"), index, self.len()))
    }

    fn read_bar(&self, bar: u32, _offset: u32) -> Result<u32> {
        Err(ArcError::runtime(
            location!("read_bar"),
            format!("BAR {} is not part of a configuration-space dump", bar),
        ))
    }
}

/// One decoded register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRecord {
    pub addr: u32,
    pub name: String,
    pub value: u32,
    pub bit_list: Vec<String>,
}

impl RegisterRecord {
    fn read(def: &RegisterDef, value: u32) -> RegisterRecord {
        RegisterRecord {
            addr: def.offset,
            name: def.name.to_owned(),
            value,
            bit_list: def.bit_list(value),
        }
    }
}

/// A base address region and the registers decoded from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRecord {
    pub name: String,
    pub registers: Vec<RegisterRecord>,
}

/// Snapshot of a device's configuration space and BAR registers.
///
/// Both lists start out empty and are replaced as a whole by
/// [`ConfigSpaceDecoder::read_config_space`] and [`ConfigSpaceDecoder::read_bars`].
/// A failed read leaves the previous snapshot in place.
#[derive(Debug, Default, Clone)]
pub struct ConfigSpaceDecoder {
    registers: Vec<RegisterRecord>,
    bars: Vec<BarRecord>,
}

impl ConfigSpaceDecoder {
    pub fn new() -> ConfigSpaceDecoder {
        ConfigSpaceDecoder::default()
    }

    /// Reads and decodes the 16 header registers plus any extended registers
    pub fn read_config_space<S: ConfigSpace + ?Sized>(&mut self, source: &S) -> Result<()> {
        let mut registers = Vec::with_capacity(HEADER_REGISTERS.len());
        for def in HEADER_REGISTERS.iter().chain(source.extended_registers()) {
            let value = source.read_dword(def.offset)?;
            log::trace!("cfg 0x{:02X} = 0x{:08X} ({})", def.offset, value, def.name);
            registers.push(RegisterRecord::read(def, value));
        }
        self.registers = registers;
        log::debug!("Decoded {} configuration registers", self.registers.len());
        Ok(())
    }

    /// Reads the base address registers, then the device specific BAR tables.
    ///
    /// BARs reading as zero are not implemented by the device and are left out.
    pub fn read_bars<S: ConfigSpace + ?Sized>(&mut self, source: &S) -> Result<()> {
        let mut bars = Vec::new();
        for bar in 0..BAR_COUNT {
            let offset = bar_offset(bar);
            let value = source.read_dword(offset)?;
            if value == 0 {
                log::trace!("BAR {} is empty", bar);
                continue;
            }
            let name = format!("PCI Base Address {}", bar);
            bars.push(BarRecord {
                registers: vec![RegisterRecord {
                    addr: offset,
                    name: name.clone(),
                    value,
                    bit_list: base_address_bits(value),
                }],
                name,
            });
        }

        for table in source.bar_tables() {
            let mut registers = Vec::with_capacity(table.registers.len());
            for def in table.registers {
                let value = source.read_bar(table.bar, def.offset)?;
                registers.push(RegisterRecord::read(def, value));
            }
            bars.push(BarRecord {
                name: table.name.to_owned(),
                registers,
            });
        }
        self.bars = bars;
        log::debug!("Decoded {} BAR records", self.bars.len());
        Ok(())
    }

    pub fn registers(&self) -> &[RegisterRecord] {
        &self.registers
    }

    pub fn bars(&self) -> &[BarRecord] {
        &self.bars
    }

    pub fn cfg_count(&self) -> usize {
        self.registers.len()
    }

    fn register(&self, index: usize, operation: &'static str) -> Result<&RegisterRecord> {
        self.registers.get(index).ok_or_else(|| {
            ArcError::out_of_range(location!(operation), index, self.registers.len())
        })
    }

    pub fn cfg_addr(&self, index: usize) -> Result<u32> {
        Ok(self.register(index, "cfg_addr")?.addr)
    }

    pub fn cfg_value(&self, index: usize) -> Result<u32> {
        Ok(self.register(index, "cfg_value")?.value)
    }

    pub fn cfg_name(&self, index: usize) -> Result<&str> {
        Ok(&self.register(index, "cfg_name")?.name)
    }

    pub fn cfg_bit_list(&self, index: usize) -> Result<&[String]> {
        Ok(&self.register(index, "cfg_bit_list")?.bit_list)
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    fn bar(&self, index: usize, operation: &'static str) -> Result<&BarRecord> {
        self.bars
            .get(index)
            .ok_or_else(|| ArcError::out_of_range(location!(operation), index, self.bars.len()))
    }

    fn bar_register(
        &self,
        bar: usize,
        index: usize,
        operation: &'static str,
    ) -> Result<&RegisterRecord> {
        let record = self.bar(bar, operation)?;
        record.registers.get(index).ok_or_else(|| {
            ArcError::out_of_range(location!(operation), index, record.registers.len())
        })
    }

    pub fn bar_name(&self, bar: usize) -> Result<&str> {
        Ok(&self.bar(bar, "bar_name")?.name)
    }

    pub fn bar_reg_count(&self, bar: usize) -> Result<usize> {
        Ok(self.bar(bar, "bar_reg_count")?.registers.len())
    }

    pub fn bar_reg_addr(&self, bar: usize, index: usize) -> Result<u32> {
        Ok(self.bar_register(bar, index, "bar_reg_addr")?.addr)
    }

    pub fn bar_reg_value(&self, bar: usize, index: usize) -> Result<u32> {
        Ok(self.bar_register(bar, index, "bar_reg_value")?.value)
    }

    pub fn bar_reg_name(&self, bar: usize, index: usize) -> Result<&str> {
        Ok(&self.bar_register(bar, index, "bar_reg_name")?.name)
    }

    pub fn bar_reg_bit_list(&self, bar: usize, index: usize) -> Result<&[String]> {
        Ok(&self.bar_register(bar, index, "bar_reg_bit_list")?.bit_list)
    }

    /// Writes the configuration-space report to `out`
    pub fn print_config_space(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(
            out,
            "\n_________________________Configuration Space_________________________"
        )?;
        for reg in &self.registers {
            writeln!(out, "\tAddr: 0x{:x}", reg.addr)?;
            writeln!(out, "\tValue: 0x{:x}", reg.value)?;
            writeln!(out, "\tName: {}", reg.name)?;
            for (j, bits) in reg.bit_list.iter().enumerate() {
                writeln!(out, "\tBit List[ {} ]: {}", j, bits)?;
            }
            writeln!(out)?;
        }
        writeln!(out)
    }

    /// Writes the BAR report to `out`
    pub fn print_bars(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(
            out,
            "\n_______________________Configuration Space BARS_______________________\n"
        )?;
        for bar in &self.bars {
            writeln!(out, "\n___________________{}___________________\n", bar.name)?;
            for reg in &bar.registers {
                writeln!(out, "\tReg Addr:  0x{:x}", reg.addr)?;
                writeln!(out, "\tReg Value: 0x{:x}", reg.value)?;
                writeln!(out, "\tReg Name: {}", reg.name)?;
                for bits in &reg.bit_list {
                    writeln!(out, "\tBit List: {}", bits)?;
                }
                writeln!(out)?;
            }
        }
        writeln!(out)
    }
}

/// Decodes a raw dump of the 16 header dwords.
pub fn decode_dump(dwords: &[u32]) -> Result<ConfigSpaceDecoder> {
    let mut decoder = ConfigSpaceDecoder::new();
    decoder.read_config_space(dwords)?;
    Ok(decoder)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pci::regs::CFG_REG_COUNT;

    const PLX_DUMP: [u32; CFG_REG_COUNT] = [
        0x905610B5, 0x02B00007, 0x11800002, 0x00002010, 0xFEBFF000, 0x0000E001, 0xFE000000,
        0, 0, 0, 0, 0x300010B5, 0, 0x40, 0, 0x0000010B,
    ];

    #[test]
    fn empty_snapshot_is_out_of_range() {
        let decoder = ConfigSpaceDecoder::new();
        assert_eq!(decoder.cfg_count(), 0);
        match decoder.cfg_addr(0) {
            Err(ArcError::OutOfRange { index, count, .. }) => {
                assert_eq!((index, count), (0, 0))
            }
            other => panic!("expected OutOfRange, got {:?}", other),
        }
        assert!(decoder.bar_name(0).is_err());
    }

    #[test]
    fn decodes_header_dump() {
        let decoder = decode_dump(&PLX_DUMP).unwrap();
        assert_eq!(decoder.cfg_count(), 16);
        assert_eq!(decoder.cfg_name(0).unwrap(), "Device ID / Vendor ID");
        assert_eq!(
            decoder.cfg_bit_list(0).unwrap(),
            &["Device ID: 0x9056", "Vendor ID: 0x10B5"]
        );
        assert_eq!(decoder.cfg_addr(15).unwrap(), 0x3C);
        assert_eq!(decoder.cfg_value(11).unwrap(), 0x300010B5);
        assert!(decoder.cfg_bit_list(10).unwrap().is_empty());

        for index in [16, 17, 100] {
            assert!(matches!(
                decoder.cfg_name(index),
                Err(ArcError::OutOfRange { count: 16, .. })
            ));
            assert!(decoder.cfg_value(index).is_err());
            assert!(decoder.cfg_bit_list(index).is_err());
        }
    }

    #[test]
    fn short_dump_fails_and_keeps_snapshot() {
        let mut decoder = decode_dump(&PLX_DUMP).unwrap();
        assert!(matches!(
            decoder.read_config_space(&PLX_DUMP[..8]),
            Err(ArcError::OutOfRange { index: 8, count: 8, .. })
        ));
        assert_eq!(decoder.cfg_count(), 16);
    }

    #[test]
    fn bars_skip_empty_registers() {
        let mut decoder = ConfigSpaceDecoder::new();
        decoder.read_bars(&PLX_DUMP[..]).unwrap();
        assert_eq!(decoder.bar_count(), 3);
        assert_eq!(decoder.bar_name(1).unwrap(), "PCI Base Address 1");
        assert_eq!(decoder.bar_reg_count(1).unwrap(), 1);
        assert_eq!(decoder.bar_reg_addr(2, 0).unwrap(), 0x18);
        assert_eq!(
            decoder.bar_reg_bit_list(1, 0).unwrap()[1],
            "Bit 0 : Memory Space Indicator : 1 [ I/O Space ]"
        );
        assert!(matches!(
            decoder.bar_reg_value(0, 1),
            Err(ArcError::OutOfRange { index: 1, count: 1, .. })
        ));
        assert!(matches!(
            decoder.bar_reg_name(3, 0),
            Err(ArcError::OutOfRange { index: 3, count: 3, .. })
        ));
    }

    #[test]
    fn prints_config_space() {
        let decoder = decode_dump(&PLX_DUMP).unwrap();
        let mut out = Vec::new();
        decoder.print_config_space(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(
            "\n_________________________Configuration Space_________________________\n\tAddr: 0x0\n\tValue: 0x905610b5\n\tName: Device ID / Vendor ID\n\tBit List[ 0 ]: Device ID: 0x9056\n"
        ));
        assert!(text.contains("\tAddr: 0x3c\n\tValue: 0x10b\n"));
        assert!(text.ends_with("Interrupt Line: 0xB [ 11 ]\n\n\n"));
    }

    #[test]
    fn prints_bars() {
        let mut decoder = ConfigSpaceDecoder::new();
        decoder.read_bars(&PLX_DUMP[..]).unwrap();
        let mut out = Vec::new();
        decoder.print_bars(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(
            "\n_______________________Configuration Space BARS_______________________\n\n\n___________________PCI Base Address 0___________________\n\n\tReg Addr:  0x10\n"
        ));
        assert!(text.contains("\tBit List: Bit 3 : Prefetchable : 0\n"));
    }
}
