//! The constant table mapping (vendor, product, model) to a family and the
//! transports/physical identifiers it can be reached over.

use crate::family::Family;
use crate::transport::Transport;

/// The identifying detail a host passes in when it wants to know which
/// descriptor matches a concrete endpoint it found (a USB vid/pid pair, an
/// advertised Bluetooth name, a serial device-node path, ...).
#[derive(Debug, Clone, Copy)]
pub enum FilterKey<'a> {
    Usb { vendor_id: u16, product_id: u16 },
    BluetoothName(&'a str),
    DevicePath(&'a str),
}

/// An immutable entry in the registry. The table itself never changes at
/// runtime; `model` disambiguates entries within a `family`.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub vendor: &'static str,
    pub product: &'static str,
    pub family: Family,
    pub model: u32,
    pub transports: Transport,
    filter: Option<fn(Transport, &FilterKey) -> bool>,
}

impl Descriptor {
    /// Can this descriptor plausibly be the device behind `key`, reached
    /// over `transport`? A descriptor with no filter predicate matches any
    /// key on any of its declared transports (used by families identified
    /// purely by the user's explicit `-f/-m` selection).
    pub fn matches(&self, transport: Transport, key: &FilterKey) -> bool {
        if !self.transports.contains(transport) {
            return false;
        }
        match self.filter {
            Some(predicate) => predicate(transport, key),
            None => true,
        }
    }
}

fn usb_vid_pid(expected: &[(u16, u16)]) -> impl Fn(Transport, &FilterKey) -> bool + 'static {
    let expected = expected.to_vec();
    move |_transport, key| match key {
        FilterKey::Usb { vendor_id, product_id } => {
            expected.contains(&(*vendor_id, *product_id))
        }
        _ => false,
    }
}

macro_rules! usb_filter {
    ($($vid:literal, $pid:literal);+ $(;)?) => {
        Some({
            fn f(transport: Transport, key: &FilterKey) -> bool {
                usb_vid_pid(&[$(($vid, $pid)),+])(transport, key)
            }
            f as fn(Transport, &FilterKey) -> bool
        })
    };
}

fn bluetooth_name_prefix(prefix: &'static str) -> fn(Transport, &FilterKey) -> bool {
    // A single `'static` prefix per descriptor is all the real-world
    // families need (the device's advertised name is vendor-fixed).
    match prefix {
        "OSTC" => |_t, key| matches!(key, FilterKey::BluetoothName(name) if name.starts_with("OSTC")),
        "Petrel" => |_t, key| matches!(key, FilterKey::BluetoothName(name) if name.starts_with("Petrel") || name.starts_with("Perdix")),
        _ => |_t, _key| false,
    }
}

/// The descriptor table. Not exhaustive against every model the family
/// drivers could in principle support - see `SPEC_FULL.md` §2 "Family
/// coverage" for the deliberate scope reduction - but every entry here is
/// a real, shipping model.
pub static REGISTRY: &[Descriptor] = &[
    Descriptor {
        vendor: "Oceanic",
        product: "Atom 2.0",
        family: Family::OceanicAtom2,
        model: 0x4248,
        transports: Transport::SERIAL,
        filter: None,
    },
    Descriptor {
        vendor: "Oceanic",
        product: "Geo 2.0",
        family: Family::OceanicAtom2,
        model: 0x424C,
        transports: Transport::SERIAL,
        filter: None,
    },
    Descriptor {
        vendor: "Suunto",
        product: "Vyper",
        family: Family::SuuntoVyper,
        model: 0x03,
        transports: Transport::SERIAL,
        filter: None,
    },
    Descriptor {
        vendor: "Suunto",
        product: "Cobra",
        family: Family::SuuntoVyper,
        model: 0x17,
        transports: Transport::SERIAL,
        filter: None,
    },
    Descriptor {
        vendor: "Reefnet",
        product: "Sensus",
        family: Family::ReefnetSensus,
        model: 1,
        transports: Transport::SERIAL,
        filter: None,
    },
    Descriptor {
        vendor: "Mares",
        product: "Icon HD",
        family: Family::MaresIconHD,
        model: 0x14,
        transports: Transport::USB,
        filter: usb_filter!(0x0CAD, 0x3400),
    },
    Descriptor {
        vendor: "Mares",
        product: "Icon HD Net Ready",
        family: Family::MaresIconHD,
        model: 0x15,
        transports: Transport::USB,
        filter: usb_filter!(0x0CAD, 0x3401),
    },
    Descriptor {
        vendor: "Shearwater",
        product: "Predator",
        family: Family::ShearwaterPredator,
        model: 2,
        transports: Transport::from_bits_truncate(Transport::SERIAL.bits() | Transport::BLUETOOTH.bits()),
        filter: None,
    },
    Descriptor {
        vendor: "Shearwater",
        product: "Petrel",
        family: Family::ShearwaterPetrel,
        model: 3,
        transports: Transport::from_bits_truncate(Transport::SERIAL.bits() | Transport::BLUETOOTH.bits() | Transport::BLE.bits()),
        filter: Some(|transport, key| {
            transport.contains(Transport::SERIAL) || bluetooth_name_prefix("Petrel")(transport, key)
        }),
    },
    Descriptor {
        vendor: "Divesystem",
        product: "iDive Color",
        family: Family::DiveSystemIDive,
        model: 0x02,
        transports: Transport::SERIAL,
        filter: None,
    },
    Descriptor {
        vendor: "Divesystem",
        product: "iX3M Easy",
        family: Family::DiveSystemIDive,
        model: 0x22,
        transports: Transport::from_bits_truncate(Transport::SERIAL.bits() | Transport::BLE.bits()),
        filter: None,
    },
    Descriptor {
        vendor: "Tecdiving",
        product: "DiveComputer.eu",
        family: Family::TecdivingDivecomputerEu,
        model: 0x01,
        transports: Transport::BLUETOOTH,
        filter: None,
    },
];

pub fn iter() -> impl Iterator<Item = &'static Descriptor> {
    REGISTRY.iter()
}

/// Entries whose family and transport admit `key`.
pub fn filter<'a>(
    transport: Transport,
    key: &'a FilterKey<'a>,
) -> impl Iterator<Item = &'static Descriptor> + 'a {
    REGISTRY.iter().filter(move |d| d.matches(transport, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usb_filter_matches_declared_vid_pid_only() {
        let icon_hd = REGISTRY
            .iter()
            .find(|d| d.model == 0x14 && d.family == Family::MaresIconHD)
            .unwrap();

        assert!(icon_hd.matches(
            Transport::USB,
            &FilterKey::Usb { vendor_id: 0x0CAD, product_id: 0x3400 }
        ));
        assert!(!icon_hd.matches(
            Transport::USB,
            &FilterKey::Usb { vendor_id: 0x0CAD, product_id: 0x9999 }
        ));
    }

    #[test]
    fn descriptor_without_filter_matches_any_key_on_its_transport() {
        let vyper = REGISTRY.iter().find(|d| d.product == "Vyper").unwrap();
        assert!(vyper.matches(Transport::SERIAL, &FilterKey::DevicePath("/dev/ttyUSB0")));
        assert!(!vyper.matches(Transport::USB, &FilterKey::DevicePath("/dev/ttyUSB0")));
    }

    #[test]
    fn registry_is_non_empty_and_spans_implemented_families() {
        let families: std::collections::HashSet<_> = REGISTRY.iter().map(|d| d.family).collect();
        assert!(families.contains(&Family::OceanicAtom2));
        assert!(families.contains(&Family::ShearwaterPetrel));
        assert!(families.contains(&Family::TecdivingDivecomputerEu));
    }
}
