//! Downloads dives from a device and prints a summary per dive.
//!
//! This crate defines the transport contract ([`divecomputer::iostream`])
//! but implementing a physical one (serial, USB, BLE) is out of scope -
//! see `SPEC_FULL.md` §1. This demo stands in a scripted
//! [`divecomputer::iostream::LoopbackStream`] wired to answer the
//! Tecdiving wire protocol exactly as a real unit would, so the whole
//! `Device::open`/`foreach` path still gets exercised end to end.

use clap::Parser as ClapParser;
use divecomputer::array::crc16_ccitt;
use divecomputer::device::Device;
use divecomputer::iostream::LoopbackStream;
use divecomputer::registry;
use divecomputer::{Family, Fingerprint};

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Download dives from a (simulated) device", long_about = None)]
struct Args {
    /// Stop once this fingerprint is reached, as a hex string
    #[arg(short = 'F', long)]
    fingerprint: Option<String>,
}

const CRC_INIT: u16 = 0x0000;

fn push_response(stream: &mut LoopbackStream, body: &[u8]) {
    let length = (body.len() as u16).to_le_bytes();
    let mut check = length.to_vec();
    check.extend_from_slice(body);
    let crc = crc16_ccitt(&check, CRC_INIT);

    stream.push_reply(&length);
    stream.push_reply(body);
    stream.push_reply(&crc.to_le_bytes());
}

fn dive_record(fingerprint: u32, divetime: u32, max_depth_dm: u16, interval: u16, depths_dm: &[u16]) -> Vec<u8> {
    let mut body = fingerprint.to_le_bytes().to_vec();
    body.extend_from_slice(&divetime.to_le_bytes());
    body.extend_from_slice(&max_depth_dm.to_le_bytes());
    body.extend_from_slice(&interval.to_le_bytes());
    for depth in depths_dm {
        body.extend_from_slice(&depth.to_le_bytes());
    }
    body
}

fn scripted_stream() -> LoopbackStream {
    let mut stream = LoopbackStream::new();

    // device info: model(1), firmware(2), serial(3)
    push_response(&mut stream, &[0x01, 0x02, 0x00, 0x10, 0x20, 0x30]);
    // dive count: 2
    push_response(&mut stream, &2u16.to_le_bytes());

    // foreach walks ordinals newest-first
    push_response(&mut stream, &dive_record(0x11111111, 1530, 412, 10, &[0, 200, 412, 150, 0]));
    push_response(&mut stream, &dive_record(0x22222222, 980, 280, 10, &[0, 280, 0]));

    stream
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    println!("Dive Computer Downloader (simulated Tecdiving device)\n");

    let driver = registry::driver_for(Family::TecdivingDivecomputerEu)
        .expect("tecdiving driver is part of this build's family subset");

    let mut stream = scripted_stream();
    let mut device = Device::new(driver, &mut stream).connect()?;

    if let Some(fingerprint) = args.fingerprint {
        device.set_fingerprint(Fingerprint::try_from(fingerprint)?)?;
    }

    if let Some(info) = device.devinfo() {
        println!("model=0x{:X} firmware=0x{:X} serial=0x{:X}\n", info.model, info.firmware, info.serial);
    }

    let mut count = 0;
    device.foreach(&mut |bytes, fingerprint| {
        count += 1;
        println!("dive #{count}: {} bytes, fingerprint {fingerprint}", bytes.len());
        true
    })?;

    println!("\n{count} dive(s) downloaded");
    Ok(())
}
