use arc_device::{
    config::Config,
    pci::{
        ConfigSpaceDecoder, decode_dump,
        regs::{device_id, vendor_id},
    },
    pcie::{PcieDevice, request},
};
use arc_protocol::ArcError;
use arc_tests::{PLX_CONFIG_SPACE, SimulatedSystem};

fn open_device() -> PcieDevice<SimulatedSystem> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut device = PcieDevice::new(SimulatedSystem::new(), Config::default());
    device.find_devices().unwrap();
    device.open(0).unwrap();
    device
}

#[test]
fn config_space_includes_capabilities() {
    let mut device = open_device();
    let decoder = device.config_space().unwrap();
    assert_eq!(decoder.cfg_count(), 16 + 5);
    assert_eq!(decoder.cfg_addr(0).unwrap(), 0x00);
    assert_eq!(decoder.cfg_value(0).unwrap(), 0x905610B5);
    assert_eq!(decoder.cfg_name(0).unwrap(), "Device ID / Vendor ID");
    assert_eq!(
        decoder.cfg_bit_list(0).unwrap(),
        ["Device ID: 0x9056", "Vendor ID: 0x10B5"]
    );
    assert_eq!(decoder.cfg_addr(16).unwrap(), 0x40);
    assert_eq!(decoder.cfg_addr(20).unwrap(), 0x50);
    assert_eq!(decoder.cfg_name(20).unwrap(), "VPD Data");
    assert!(decoder.cfg_bit_list(20).unwrap().is_empty());
}

#[test]
fn bar_space_includes_plx_tables() {
    let mut device = open_device();
    device.system().set_bar(0, 0x70, 0x905610B5);
    let decoder = device.bar_space().unwrap();

    let names: Vec<_> = decoder.bars().iter().map(|bar| bar.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "PCI Base Address 0",
            "PCI Base Address 1",
            "PCI Base Address 2",
            "Local Config (BAR0)",
            "Runtime Regs (BAR0)",
            "DMA Regs (BAR0)",
            "Msg Q Regs (BAR0)",
        ]
    );
    let counts: Vec<_> = (3..7).map(|bar| decoder.bar_reg_count(bar).unwrap()).collect();
    assert_eq!(counts, [18, 14, 15, 13]);

    let vendor = decoder
        .bars()[4]
        .registers
        .iter()
        .find(|reg| reg.addr == 0x70)
        .unwrap();
    assert_eq!(vendor.value, 0x905610B5);
    assert_eq!(vendor.bit_list, ["Device ID: 0x9056", "Vendor ID: 0x10B5"]);
}

#[test]
fn refresh_replaces_snapshot() {
    let mut device = open_device();
    device.config_space().unwrap();
    device.write_cfg_dword(0x2C, 0x12345678).unwrap();
    let decoder = device.config_space().unwrap();
    assert_eq!(decoder.cfg_count(), 21);
    assert_eq!(decoder.cfg_value(11).unwrap(), 0x12345678);
}

#[test]
fn failed_read_is_a_device_error() {
    let mut device = open_device();
    device.config_space().unwrap();
    device.system().fail_request(request::READ_BAR);
    let err = device.bar_space().unwrap_err();
    assert!(matches!(err, ArcError::Device { .. }));
    // the configuration snapshot survives a failed BAR pass
    assert_eq!(device.decoder().cfg_count(), 21);
    assert_eq!(device.decoder().bar_count(), 0);
}

#[test]
fn diagnostics_need_an_open_device() {
    let mut device = PcieDevice::new(SimulatedSystem::new(), Config::default());
    assert!(matches!(
        device.config_space(),
        Err(ArcError::Device { .. })
    ));
    assert!(matches!(device.bar_space(), Err(ArcError::Device { .. })));
}

#[test]
fn accessors_are_bounds_checked() {
    let decoder = ConfigSpaceDecoder::new();
    for index in [0, 1, 100] {
        let err = decoder.cfg_addr(index).unwrap_err();
        assert_eq!(
            err,
            ArcError::OutOfRange {
                location: err.location(),
                index,
                count: 0
            }
        );
        assert!(decoder.cfg_value(index).is_err());
        assert!(decoder.cfg_name(index).is_err());
        assert!(decoder.cfg_bit_list(index).is_err());
        assert!(decoder.bar_name(index).is_err());
    }

    let decoder = decode_dump(&PLX_CONFIG_SPACE).unwrap();
    let count = decoder.cfg_count();
    for index in count..count + 3 {
        for err in [
            decoder.cfg_addr(index).unwrap_err(),
            decoder.cfg_value(index).unwrap_err(),
            decoder.cfg_name(index).unwrap_err(),
            decoder.cfg_bit_list(index).unwrap_err(),
        ] {
            assert!(matches!(err, ArcError::OutOfRange { count: 16, .. }));
            assert!(
                err.to_string()
                    .starts_with(&format!("Element [ {} ] out of range [ 0 - 16 )", index))
            );
        }
    }
}

#[test]
fn bar_register_accessors_are_bounds_checked() {
    let mut device = open_device();
    let decoder = device.bar_space().unwrap();
    let count = decoder.bar_count();
    assert!(matches!(
        decoder.bar_reg_count(count),
        Err(ArcError::OutOfRange { .. })
    ));
    let regs = decoder.bar_reg_count(3).unwrap();
    assert!(decoder.bar_reg_addr(3, regs - 1).is_ok());
    for err in [
        decoder.bar_reg_addr(3, regs).unwrap_err(),
        decoder.bar_reg_value(3, regs).unwrap_err(),
        decoder.bar_reg_name(3, regs).unwrap_err(),
        decoder.bar_reg_bit_list(3, regs).unwrap_err(),
    ] {
        assert!(matches!(err, ArcError::OutOfRange { count: 18, .. }));
    }
}

#[test]
fn vendor_mask_is_idempotent() {
    let mut seed: u32 = 0x2545F491;
    for _ in 0..1000 {
        // xorshift32
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        let x = seed;
        let devid = seed.rotate_left(7) & 0xFFFF;
        assert_eq!(vendor_id(vendor_id(x) | (devid << 16)), vendor_id(x));
        assert_eq!(device_id(vendor_id(x) | (devid << 16)), devid);
    }
}

#[test]
fn printed_report() {
    let mut device = open_device();
    let mut out = Vec::new();
    device
        .config_space()
        .unwrap()
        .print_config_space(&mut out)
        .unwrap();
    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("Configuration Space"));
    assert!(report.contains("\tAddr: 0x0\n\tValue: 0x905610b5\n\tName: Device ID / Vendor ID\n"));
    assert!(report.contains("\tBit List[ 1 ]: Vendor ID: 0x10B5\n"));

    let mut out = Vec::new();
    device.bar_space().unwrap().print_bars(&mut out).unwrap();
    let report = String::from_utf8(out).unwrap();
    assert!(report.contains("___________________Msg Q Regs (BAR0)___________________"));
    assert!(report.contains("\tReg Name: Mailbox 0\n"));
}
