//! Decodes an iDive record: `[fingerprint(6)][divetime_be(4)]
//! [max_depth_cm_be(2)][interval_be(2)][samples: depth_cm_be(2), ...]`.

use std::cell::OnceCell;

use jiff::Timestamp;

use crate::error::{LibError, Result};
use crate::parser::{DiveParser, FieldKind, FieldValue};
use crate::sample::Sample;
use crate::status::Status;

const HEADER_LEN: usize = 14;
const SAMPLE_LEN: usize = 2;

#[derive(Debug, Clone, Copy)]
struct Derived {
    divetime_seconds: u32,
    max_depth: f64,
    interval: u32,
}

pub struct DivesystemIdiveParser<'a> {
    bytes: &'a [u8],
    derived: OnceCell<Derived>,
}

impl<'a> DivesystemIdiveParser<'a> {
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

        let divetime_seconds = u32::from_be_bytes(self.bytes[6..10].try_into().unwrap());
        let max_depth = u16::from_be_bytes(self.bytes[10..12].try_into().unwrap()) as f64 / 100.0;
        let interval = u16::from_be_bytes(self.bytes[12..14].try_into().unwrap()) as u32;
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

impl DiveParser for DivesystemIdiveParser<'_> {
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
            callback(Sample::Depth(u16::from_be_bytes(chunk.try_into().unwrap()) as f64 / 100.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(divetime: u32, max_depth_cm: u16, interval: u16, depths_cm: &[u16]) -> Vec<u8> {
        let mut bytes = vec![0u8; 6];
        bytes.extend_from_slice(&divetime.to_be_bytes());
        bytes.extend_from_slice(&max_depth_cm.to_be_bytes());
        bytes.extend_from_slice(&interval.to_be_bytes());
        for d in depths_cm {
            bytes.extend_from_slice(&d.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn derives_header_fields() {
        let bytes = record(600, 1820, 5, &[0, 900, 1820]);
        let parser = DivesystemIdiveParser::new(&bytes);

        assert_eq!(parser.field(FieldKind::Divetime).unwrap(), FieldValue::U32(600));
        assert_eq!(parser.field(FieldKind::MaxDepth).unwrap(), FieldValue::F64(18.2));
    }

    #[test]
    fn sample_stream_is_deterministic_across_calls() {
        let bytes = record(10, 100, 5, &[0, 100]);
        let parser = DivesystemIdiveParser::new(&bytes);

        let mut first = Vec::new();
        parser.samples_foreach(&mut |s| first.push(s)).unwrap();
        let mut second = Vec::new();
        parser.samples_foreach(&mut |s| second.push(s)).unwrap();

        assert_eq!(first, second);
        assert_eq!(first[1], Sample::Depth(0.0));
        assert_eq!(first[3], Sample::Depth(1.0));
    }

    #[test]
    fn truncated_header_is_data_format_not_panic() {
        let bytes = [0u8; 8];
        let parser = DivesystemIdiveParser::new(&bytes);
        let err = parser.field(FieldKind::Divetime).unwrap_err();
        assert!(matches!(err, LibError::Status(Status::DataFormat, _)));
        assert!(parser.samples_foreach(&mut |_| {}).is_err());
    }
}
