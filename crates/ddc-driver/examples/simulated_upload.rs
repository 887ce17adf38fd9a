//! Walk through a full provisioning sequence on the in-memory backend
//!
//! Probes a simulated core, uploads a coefficient profile and a small
//! cyclic waveform, then dumps the register writes the core received.

use std::sync::Arc;

use ddc_driver::chip::envelope::{self, field};
use ddc_driver::chip::regs;
use ddc_driver::{DdcDevice, DeviceConfig, Progress, Result, SoftwareRegisters};

fn envelope_blob(payload: &[u8]) -> Vec<u8> {
    let mut blob = vec![0u8; envelope::HEADER_SIZE];
    let mut put = |at: usize, v: u32| blob[at..at + 4].copy_from_slice(&v.to_le_bytes());
    put(field::START_MARKER, envelope::START_MARKER);
    put(field::ENABLE, 1);
    put(field::MODE, regs::playback::CYCLIC);
    put(field::DDR_START, 0);
    put(field::DDR_END, 0);
    put(field::PAYLOAD_LENGTH, payload.len() as u32);
    put(field::SEQUENCE_COUNT, 1);
    blob.extend_from_slice(payload);
    blob.extend_from_slice(&envelope::END_MARKER.to_le_bytes());
    blob
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("ddc_driver=debug")
        .init();

    let regs = Arc::new(SoftwareRegisters::new().with_value(regs::LOAD_DONE, 1));
    let dev = DdcDevice::probe(regs.clone(), DeviceConfig::default());
    println!("HDL {}  span {} Hz", dev.ident(), dev.span_hz());
    regs.clear_log();

    let profile = b"<profile DDC>\n<coef-hb>\n0x10\n0x20\n</coef-hb>\n\
                    <coef-poly>\n0x1\n0x2\n0x3\n</coef-poly>\n</profile>\n";
    dev.write_profile(0, profile)?;
    println!("profile: {} register writes", regs.writes().len());
    regs.clear_log();

    let payload: Vec<u8> = (0u8..64).collect();
    let blob = envelope_blob(&payload);
    let mut progress = Progress::Incomplete;
    for (i, piece) in blob.chunks(40).enumerate() {
        progress = dev.upload_waveform(i * 40, piece)?;
    }
    println!("waveform: {progress:?}, playback {:?}", dev.playback());

    for (offset, value) in regs.writes() {
        println!("  {offset:#08x} <- {value:#010x}");
    }

    dev.write_span(b"2000000\n")?;
    print!("span now {}", dev.read_span());
    Ok(())
}
