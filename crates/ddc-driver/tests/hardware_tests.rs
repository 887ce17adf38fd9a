//! Hardware validation tests
//!
//! Run against a real core with `DDC_RESOURCE=/dev/uio0 cargo test -- --ignored`.

use std::sync::Arc;

use ddc_driver::{DdcDevice, DeviceConfig, MmapRegisters};

fn attach() -> DdcDevice {
    let config = DeviceConfig::from_env();
    let path = config
        .resource_path
        .clone()
        .unwrap_or_else(|| "/dev/uio0".into());
    let regs = MmapRegisters::open(&path, config.map_size).expect("map DDC registers");
    DdcDevice::attach(Arc::new(regs), config)
}

#[test]
#[ignore] // Requires hardware
fn test_ident_is_plausible() {
    let dev = attach();
    let ident = dev.ident();
    println!("HDL {ident}");
    assert!((0x2000..0x2100).contains(&ident.year), "year {:x}", ident.year);
    assert!((1..=0x12).contains(&ident.month));
}

#[test]
#[ignore] // Requires hardware
fn test_span_round_trip() {
    let dev = attach();
    let before = dev.span_hz();
    for hz in [100_000_000, 20_000_000, 100_000] {
        dev.set_span(hz);
        assert_eq!(dev.span_hz(), hz);
    }
    dev.set_span(before);
}

#[test]
#[ignore] // Requires hardware
fn test_temperatures_in_range() {
    let dev = attach();
    for name in ["local", "remote"] {
        let t = dev.read_raw(name).unwrap();
        println!("{name}: {t} °C");
        assert!(t < 125);
    }
}
