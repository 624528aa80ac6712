//! Decodes a Tecdiving record: `[fingerprint(4)][divetime_le(4)]
//! [max_depth_dm_le(2)][interval_le(2)][samples: depth_dm_le(2), ...]`.

use std::cell::OnceCell;

use jiff::Timestamp;

use crate::error::{LibError, Result};
use crate::parser::{DiveParser, FieldKind, FieldValue};
use crate::sample::Sample;
use crate::status::Status;

const HEADER_LEN: usize = 12;
const SAMPLE_LEN: usize = 2;

#[derive(Debug, Clone, Copy)]
struct Derived {
    divetime_seconds: u32,
    max_depth: f64,
    interval: u32,
}

pub struct TecdivingParser<'a> {
    bytes: &'a [u8],
    derived: OnceCell<Derived>,
}

impl<'a> TecdivingParser<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, derived: OnceCell::new() }
    }

    fn samples(&self) -> Result<&'a [u8]> {
        self.bytes
            .get(HEADER_LEN..)
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "record shorter than header"))
    }

    fn derive(&self) -> Result<Derived> {
        if let Some(d) = self.derived.get() {
            return Ok(*d);
        }

        if self.bytes.len() < HEADER_LEN {
            return Err(LibError::status_with_context(Status::DataFormat, "record shorter than header"));
        }

        let divetime_seconds = u32::from_le_bytes(self.bytes[4..8].try_into().unwrap());
        let max_depth = u16::from_le_bytes(self.bytes[8..10].try_into().unwrap()) as f64 / 10.0;
        let interval = u16::from_le_bytes(self.bytes[10..12].try_into().unwrap()) as u32;
        if interval == 0 {
            return Err(LibError::status_with_context(Status::DataFormat, "zero sample interval"));
        }

        let samples = self.samples()?;
        if samples.len() % SAMPLE_LEN != 0 {
            return Err(LibError::status_with_context(Status::DataFormat, "truncated sample"));
        }

        let derived = Derived { divetime_seconds, max_depth, interval };
        let _ = self.derived.set(derived);
        Ok(derived)
    }
}

impl DiveParser for TecdivingParser<'_> {
    fn datetime(&self) -> Result<Timestamp> {
        Err(Status::Unsupported.into())
    }

    fn field(&self, kind: FieldKind) -> Result<FieldValue> {
        let derived = self.derive()?;
        match kind {
            FieldKind::Divetime => Ok(FieldValue::U32(derived.divetime_seconds)),
            FieldKind::MaxDepth => Ok(FieldValue::F64(derived.max_depth)),
            _ => Err(Status::Unsupported.into()),
        }
    }

    fn samples_foreach(&self, callback: &mut dyn FnMut(Sample)) -> Result<()> {
        let derived = self.derive()?;
        let samples = self.samples()?;

        let mut time = 0u32;
        for chunk in samples.chunks_exact(SAMPLE_LEN) {
            time += derived.interval;
            callback(Sample::Time(time));
            callback(Sample::Depth(u16::from_le_bytes(chunk.try_into().unwrap()) as f64 / 10.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(divetime: u32, max_depth_dm: u16, interval: u16, depths_dm: &[u16]) -> Vec<u8> {
        let mut bytes = vec![0u8; 4];
        bytes.extend_from_slice(&divetime.to_le_bytes());
        bytes.extend_from_slice(&max_depth_dm.to_le_bytes());
        bytes.extend_from_slice(&interval.to_le_bytes());
        for d in depths_dm {
            bytes.extend_from_slice(&d.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn derives_header_fields() {
        let bytes = record(1200, 305, 8, &[0, 150, 305]);
        let parser = TecdivingParser::new(&bytes);

        assert_eq!(parser.field(FieldKind::Divetime).unwrap(), FieldValue::U32(1200));
        assert_eq!(parser.field(FieldKind::MaxDepth).unwrap(), FieldValue::F64(30.5));
    }

    #[test]
    fn missing_header_is_data_format_not_panic() {
        let bytes = vec![0u8; 4];
        let parser = TecdivingParser::new(&bytes);
        let err = parser.field(FieldKind::Divetime).unwrap_err();
        assert!(matches!(err, LibError::Status(Status::DataFormat, _)));
    }
}
