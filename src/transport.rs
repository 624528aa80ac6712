//! The physical carrier a device is reachable over.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// A set of transports a descriptor or an open connection supports.
    ///
    /// Descriptors carry this as a mask (a model often ships in both a
    /// serial and a Bluetooth variant); an open [`IoStream`](crate::iostream::IoStream)
    /// carries exactly one bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Transport: u32 {
        const SERIAL    = 1 << 0;
        const USB       = 1 << 1;
        const USB_HID   = 1 << 2;
        const IRDA      = 1 << 3;
        const BLUETOOTH = 1 << 4;
        const BLE       = 1 << 5;
    }
}

impl Transport {
    /// Expand the mask into its individual members, in a fixed declaration order.
    pub fn members(self) -> Vec<Transport> {
        [
            Transport::SERIAL,
            Transport::USB,
            Transport::USB_HID,
            Transport::IRDA,
            Transport::BLUETOOTH,
            Transport::BLE,
        ]
        .into_iter()
        .filter(|bit| self.contains(*bit))
        .collect()
    }
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = [
            (Transport::SERIAL, "serial"),
            (Transport::USB, "usb"),
            (Transport::USB_HID, "usbhid"),
            (Transport::IRDA, "irda"),
            (Transport::BLUETOOTH, "bluetooth"),
            (Transport::BLE, "ble"),
        ]
        .into_iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, name)| name)
        .collect();

        write!(f, "{}", names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_respects_combined_mask() {
        let mask = Transport::SERIAL | Transport::BLE;
        assert_eq!(mask.members(), vec![Transport::SERIAL, Transport::BLE]);
    }

    #[test]
    fn display_joins_member_names() {
        let mask = Transport::USB | Transport::USB_HID;
        assert_eq!(mask.to_string(), "usb|usbhid");
    }
}
