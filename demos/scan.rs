//! Lists the descriptor table, optionally narrowed to one transport.
//!
//! Real transport enumeration (serial port listing, BLE advertisement
//! scanning) is out of scope for this crate - see `SPEC_FULL.md` §1 - so
//! this walks the static [`descriptor`] registry instead of a live bus.

use std::collections::BTreeMap;

use clap::Parser as ClapParser;
use divecomputer::Transport;
use divecomputer::descriptor;

#[derive(ClapParser, Debug)]
#[command(author, version, about = "List known dive computer descriptors", long_about = None)]
struct Args {
    /// Only show descriptors reachable over this transport
    #[arg(short, long, value_parser = parse_transport)]
    transport: Option<Transport>,
}

fn parse_transport(s: &str) -> Result<Transport, String> {
    match s {
        "serial" => Ok(Transport::SERIAL),
        "usb" => Ok(Transport::USB),
        "usbhid" => Ok(Transport::USB_HID),
        "bluetooth" => Ok(Transport::BLUETOOTH),
        "ble" => Ok(Transport::BLE),
        "irda" => Ok(Transport::IRDA),
        other => Err(format!("unknown transport {other:?}")),
    }
}

fn main() {
    let args = Args::parse();

    let mut by_vendor: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for item in descriptor::iter() {
        if let Some(transport) = args.transport
            && !item.transports.contains(transport)
        {
            continue;
        }
        by_vendor.entry(item.vendor).or_default().push(item);
    }

    for (vendor, items) in by_vendor {
        println!("{vendor}");
        for item in items {
            println!("  {:<24} family={:?} model=0x{:X} transports={}", item.product, item.family, item.model, item.transports);
        }
    }
}
