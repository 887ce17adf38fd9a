//! Registry, lifetime and exclusive-access tests

use std::sync::Arc;
use std::thread;

use ddc_driver::chip::regs;
use ddc_driver::{
    ClockTopology, DdcDevice, DdcError, DeviceConfig, DeviceManager, PortRef, PortRole,
    SoftwareRegisters,
};

fn board() -> ClockTopology {
    ClockTopology::new()
        .node("hmc7044", 2, 1)
        .node("ddc0", 2, 1)
        .node("ddc1", 2, 1)
        .port("hmc7044", 0, PortRole::ClockProvider, ["ddc0_dev_clk", "sysref0"])
        .port("hmc7044", 1, PortRole::ClockProvider, ["ddc1_dev_clk"])
        .port("ddc0", 0, PortRole::ClockConsumer, ["ddc0_dev_clk", "sysref0"])
        .port("ddc1", 0, PortRole::ClockConsumer, ["ddc1_dev_clk"])
        .link(PortRef::new("hmc7044", 0), PortRef::new("ddc0", 0))
        .link(PortRef::new("ddc1", 0), PortRef::new("hmc7044", 1))
}

fn probe() -> (Arc<SoftwareRegisters>, DdcDevice) {
    let regs = Arc::new(SoftwareRegisters::new().with_value(regs::LOAD_DONE, 1));
    let device = DdcDevice::probe(regs.clone(), DeviceConfig::default());
    (regs, device)
}

#[test]
fn init_resolves_topology() {
    let mgr = DeviceManager::init(2, &board()).unwrap();
    let clocks = mgr.clocks();
    assert_eq!(clocks.edges().len(), 3);
    assert_eq!(clocks.provider_of("ddc1_dev_clk"), Some(&PortRef::new("hmc7044", 1)));
    assert_eq!(clocks.clocks_of("ddc0").count(), 2);
}

#[test]
fn init_rejects_bad_topology() {
    let bad = board().port("ddc1", 1, PortRole::ClockProvider, ["sysref0"]);
    let err = DeviceManager::init(2, &bad).unwrap_err();
    assert!(matches!(err, DdcError::InvalidArgument { .. }));
}

#[test]
fn devices_are_isolated() {
    let mgr = DeviceManager::init(2, &board()).unwrap();
    let (regs0, dev0) = probe();
    let (regs1, dev1) = probe();
    mgr.register(dev0).unwrap();
    mgr.register(dev1).unwrap();
    regs0.clear_log();
    regs1.clear_log();

    mgr.open(1).unwrap().set_span(2_000_000);
    assert!(regs0.writes().is_empty());
    assert_eq!(regs1.writes_to(regs::SPAN), vec![0x6]);
    assert_eq!(mgr.get(0).unwrap().span_hz(), 100_000_000);
}

#[test]
fn session_is_exclusive_across_threads() {
    let mgr = Arc::new(DeviceManager::init(1, &ClockTopology::new()).unwrap());
    let (_, dev) = probe();
    mgr.register(dev).unwrap();

    let held = mgr.open(0).unwrap();
    let other = Arc::clone(&mgr);
    let result = thread::spawn(move || other.open(0).map(|_| ())).join().unwrap();
    assert!(matches!(result, Err(DdcError::DeviceBusy { id: 0 })));

    drop(held);
    let other = Arc::clone(&mgr);
    assert!(thread::spawn(move || other.open(0).is_ok()).join().unwrap());
}

#[test]
fn concurrent_uploads_are_serialized() {
    let mgr = DeviceManager::init(1, &ClockTopology::new()).unwrap();
    let (regs, dev) = probe();
    let handle = mgr.register(dev).unwrap();
    regs.clear_log();

    let text = b"<profile DDC>\n<coef-hb>\n0x1\n0x2\n0x3\n</coef-hb>\n</profile>\n";
    thread::scope(|s| {
        for _ in 0..4 {
            let dev = handle.clone();
            s.spawn(move || {
                for _ in 0..10 {
                    dev.write_profile(0, text).unwrap();
                    dev.read_raw("local").unwrap();
                }
            });
        }
    });

    // every profile lands as an uninterrupted hb0, hb1, hb2 run
    let writes = regs.writes();
    assert_eq!(writes.len(), 4 * 10 * 3);
    for run in writes.chunks(3) {
        assert_eq!(
            run,
            &[
                (regs::halfband_tap(0), 1),
                (regs::halfband_tap(1), 2),
                (regs::halfband_tap(2), 3),
            ]
        );
    }
}

#[test]
fn handles_outlive_teardown() {
    let mgr = DeviceManager::init(2, &ClockTopology::new()).unwrap();
    let (_, dev) = probe();
    let handle = mgr.register(dev).unwrap();
    assert_eq!(handle.ref_count(), 2);

    mgr.teardown();
    assert!(mgr.get(0).is_err());
    assert_eq!(handle.ref_count(), 1);
    assert_eq!(handle.read_span(), "100000000\n");
}
