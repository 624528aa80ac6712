//! Decodes a Shearwater PNF record: three fixed 32-byte blocks — opening
//! (type `0x10`, ticks seconds-since-2000 at offset 1..5), calibration
//! (type `0x11`, calibration word at offset 1..3, sensor-enabled bits at
//! offset 3), closing (type `0x20`, 24-bit BE divetime at offset 6..9).

use std::cell::OnceCell;

use jiff::Timestamp;

use crate::error::{LibError, Result};
use crate::parser::{DiveParser, FieldKind, FieldValue};
use crate::sample::Sample;
use crate::status::Status;

const BLOCK_LEN: usize = 32;
const OPENING: usize = 0;
const CALIBRATION: usize = BLOCK_LEN;
const CLOSING: usize = BLOCK_LEN * 2;

/// Seconds between the Unix epoch and this family's on-device epoch.
const DEVICE_EPOCH_OFFSET: i64 = 946_684_800; // 2000-01-01T00:00:00Z

/// A calibration word left at this factory-default value, combined with
/// all three sensors reporting "enabled", means the unit was never
/// actually calibrated by the diver — treat it as uncalibrated rather
/// than trusting the enabled bits at face value.
const FACTORY_DEFAULT_CALIBRATION_WORD: u16 = 2100;

#[derive(Debug, Clone, Copy)]
struct Derived {
    divetime_seconds: u32,
}

pub struct ShearwaterParser<'a> {
    bytes: &'a [u8],
    derived: OnceCell<Derived>,
}

impl<'a> ShearwaterParser<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, derived: OnceCell::new() }
    }

    fn block(&self, offset: usize) -> Result<&'a [u8]> {
        self.bytes
            .get(offset..offset + BLOCK_LEN)
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "record shorter than its PNF blocks"))
    }

    fn derive(&self) -> Result<Derived> {
        if let Some(d) = self.derived.get() {
            return Ok(*d);
        }

        let closing = self.block(CLOSING)?;
        let divetime = u32::from_be_bytes([0, closing[6], closing[7], closing[8]]);

        let derived = Derived { divetime_seconds: divetime };
        let _ = self.derived.set(derived);
        Ok(derived)
    }

    /// `false` if the calibration word still holds the factory default
    /// while all three sensor-enabled bits are set.
    pub fn is_calibrated(&self) -> Result<bool> {
        let calibration = self.block(CALIBRATION)?;
        let word = u16::from_be_bytes([calibration[1], calibration[2]]);
        let sensor_bits = calibration[3] & 0b111;

        if word == FACTORY_DEFAULT_CALIBRATION_WORD && sensor_bits == 0b111 {
            return Ok(false);
        }
        Ok(sensor_bits != 0)
    }
}

impl DiveParser for ShearwaterParser<'_> {
    fn datetime(&self) -> Result<Timestamp> {
        let opening = self.block(OPENING)?;
        let ticks = u32::from_be_bytes([opening[1], opening[2], opening[3], opening[4]]);
        Timestamp::new(DEVICE_EPOCH_OFFSET + ticks as i64, 0).map_err(LibError::from)
    }

    fn field(&self, kind: FieldKind) -> Result<FieldValue> {
        let derived = self.derive()?;
        match kind {
            FieldKind::Divetime => Ok(FieldValue::U32(derived.divetime_seconds)),
            _ => Err(Status::Unsupported.into()),
        }
    }

    fn samples_foreach(&self, _callback: &mut dyn FnMut(Sample)) -> Result<()> {
        // The manifest fetched by `foreach` carries only the three PNF
        // blocks; the per-second profile trace lives in a separate vendor
        // block this family's scope (§2 "Family coverage") does not cover.
        Err(Status::Unsupported.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ticks: u32, divetime: u32, calibration_word: u16, sensor_bits: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; BLOCK_LEN * 3];
        bytes[OPENING] = 0x10;
        bytes[OPENING + 1..OPENING + 5].copy_from_slice(&ticks.to_be_bytes());

        bytes[CALIBRATION] = 0x11;
        bytes[CALIBRATION + 1..CALIBRATION + 3].copy_from_slice(&calibration_word.to_be_bytes());
        bytes[CALIBRATION + 3] = sensor_bits;

        bytes[CLOSING] = 0x20;
        let divetime_bytes = divetime.to_be_bytes();
        bytes[CLOSING + 6..CLOSING + 9].copy_from_slice(&divetime_bytes[1..4]);

        bytes
    }

    #[test]
    fn opening_ticks_decode_to_utc_timestamp() {
        // 2020-08-04T15:40:16Z expressed as seconds since this family's
        // 2000-01-01 epoch.
        let bytes = record(649_870_816, 862, 0, 0);
        let parser = ShearwaterParser::new(&bytes);
        assert_eq!(parser.datetime().unwrap().to_string(), "2020-08-04T15:40:16Z");
    }

    #[test]
    fn closing_divetime_is_24_bit_big_endian() {
        let bytes = record(0, 862, 0, 0);
        let parser = ShearwaterParser::new(&bytes);
        assert_eq!(parser.field(FieldKind::Divetime).unwrap(), FieldValue::U32(862));
    }

    #[test]
    fn factory_default_calibration_with_all_sensors_set_is_not_calibrated() {
        let bytes = record(0, 0, 2100, 0b111);
        let parser = ShearwaterParser::new(&bytes);
        assert!(!parser.is_calibrated().unwrap());
    }

    #[test]
    fn non_default_calibration_word_is_trusted() {
        let bytes = record(0, 0, 1500, 0b111);
        let parser = ShearwaterParser::new(&bytes);
        assert!(parser.is_calibrated().unwrap());
    }

    #[test]
    fn truncated_record_is_data_format_not_panic() {
        let bytes = [0x10u8, 0, 0, 0];
        let parser = ShearwaterParser::new(&bytes);
        let err = parser.datetime().unwrap_err();
        assert!(matches!(err, LibError::Status(Status::DataFormat, _)));
        assert!(parser.field(FieldKind::Divetime).is_err());
        assert!(parser.is_calibrated().is_err());
    }
}
