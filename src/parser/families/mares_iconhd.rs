//! Decodes an Icon HD record: `[header(12): divetime_be(4) max_depth_cm_be(4)
//! interval_be(4)][samples: depth_cm_be(4) stop_depth_cm_be(4), ...]`.
//! Everything on the wire for this family is big-endian, unlike the
//! little-endian Oceanic/Mares-sibling framings, which is why the header
//! fields use `_be` reads. A non-zero stop depth is a `DecoStop`; zero
//! means the diver is still within no-decompression limits (`Ndl`).

use std::cell::OnceCell;

use jiff::Timestamp;

use crate::array::array_uint32_be;
use crate::error::{LibError, Result};
use crate::parser::{DiveParser, FieldKind, FieldValue};
use crate::sample::{Deco, DecoKind, Sample};
use crate::status::Status;

const HEADER_LEN: usize = 12;
const SAMPLE_LEN: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Derived {
    divetime_seconds: u32,
    max_depth: f64,
    interval: u32,
}

pub struct MaresIconHdParser<'a> {
    bytes: &'a [u8],
    derived: OnceCell<Derived>,
}

impl<'a> MaresIconHdParser<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, derived: OnceCell::new() }
    }

    fn profile(&self) -> Result<&'a [u8]> {
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

        let divetime_seconds = array_uint32_be(&self.bytes[0..4]);
        let max_depth = array_uint32_be(&self.bytes[4..8]) as f64 / 100.0;
        let interval = array_uint32_be(&self.bytes[8..12]);
        if interval == 0 {
            return Err(LibError::status_with_context(Status::DataFormat, "zero sample interval"));
        }

        let profile = self.profile()?;
        if profile.len() % SAMPLE_LEN != 0 {
            return Err(LibError::status_with_context(Status::DataFormat, "truncated sample"));
        }

        let derived = Derived { divetime_seconds, max_depth, interval };
        let _ = self.derived.set(derived);
        Ok(derived)
    }
}

impl DiveParser for MaresIconHdParser<'_> {
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
        let profile = self.profile()?;

        let mut time = 0u32;
        for chunk in profile.chunks_exact(SAMPLE_LEN) {
            let depth = array_uint32_be(&chunk[0..4]) as f64 / 100.0;
            let stop_depth = array_uint32_be(&chunk[4..8]) as f64 / 100.0;

            time += derived.interval;
            callback(Sample::Time(time));
            callback(Sample::Depth(depth));

            let deco = if stop_depth > 0.0 {
                Deco { kind: DecoKind::DecoStop, depth: stop_depth, time: 0 }
            } else {
                Deco { kind: DecoKind::Ndl, depth: 0.0, time: 0 }
            };
            callback(Sample::Deco(deco));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(divetime: u32, max_depth_cm: u32, interval: u32, samples: &[(u32, u32)]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&divetime.to_be_bytes());
        bytes.extend_from_slice(&max_depth_cm.to_be_bytes());
        bytes.extend_from_slice(&interval.to_be_bytes());
        for &(depth_cm, stop_depth_cm) in samples {
            bytes.extend_from_slice(&depth_cm.to_be_bytes());
            bytes.extend_from_slice(&stop_depth_cm.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn reads_big_endian_header_fields() {
        let bytes = record(1800, 2550, 10, &[(0, 0), (1000, 0), (2550, 0), (500, 0)]);
        let parser = MaresIconHdParser::new(&bytes);

        assert_eq!(parser.field(FieldKind::Divetime).unwrap(), FieldValue::U32(1800));
        assert_eq!(parser.field(FieldKind::MaxDepth).unwrap(), FieldValue::F64(25.5));
    }

    #[test]
    fn sample_stream_converts_centimeters_to_meters() {
        let bytes = record(20, 1000, 10, &[(0, 0), (1000, 0)]);
        let parser = MaresIconHdParser::new(&bytes);

        let mut depths = Vec::new();
        parser
            .samples_foreach(&mut |s| {
                if let Sample::Depth(d) = s {
                    depths.push(d);
                }
            })
            .unwrap();

        assert_eq!(depths, vec![0.0, 10.0]);
    }

    #[test]
    fn zero_stop_depth_is_ndl_nonzero_is_deco_stop() {
        let bytes = record(20, 500, 10, &[(500, 0), (400, 300)]);
        let parser = MaresIconHdParser::new(&bytes);

        let mut decos = Vec::new();
        parser
            .samples_foreach(&mut |s| {
                if let Sample::Deco(d) = s {
                    decos.push(d);
                }
            })
            .unwrap();

        assert_eq!(decos[0], Deco { kind: DecoKind::Ndl, depth: 0.0, time: 0 });
        assert_eq!(decos[1], Deco { kind: DecoKind::DecoStop, depth: 3.0, time: 0 });
    }

    #[test]
    fn truncated_sample_is_data_format_not_panic() {
        let mut bytes = record(20, 1000, 10, &[(0, 0), (1000, 0)]);
        bytes.pop();
        let parser = MaresIconHdParser::new(&bytes);
        let err = parser.field(FieldKind::Divetime).unwrap_err();
        assert!(matches!(err, LibError::Status(Status::DataFormat, _)));
    }
}
