//! Decodes a Vyper dive record: `[marker(1) year(1) month(1) day(1)
//! hour(1) minute(1) interval(1)][delta_depth_decimeters: i8, ...]`.
//! Depth is reconstructed by accumulating the signed per-tick deltas,
//! unlike the Atom2 format's absolute per-tick readings.

use std::cell::OnceCell;

use jiff::civil::date;
use jiff::Timestamp;

use crate::array::bcd;
use crate::error::{LibError, Result};
use crate::parser::{DiveParser, FieldKind, FieldValue};
use crate::sample::Sample;
use crate::status::Status;

const HEADER_LEN: usize = 7;

#[derive(Debug, Clone, Copy)]
struct Derived {
    divetime_seconds: u32,
    max_depth: f64,
    interval: u32,
}

pub struct SuuntoVyperParser<'a> {
    bytes: &'a [u8],
    derived: OnceCell<Derived>,
}

impl<'a> SuuntoVyperParser<'a> {
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

        let interval = self.bytes.get(6).copied().ok_or_else(|| {
            LibError::status_with_context(Status::DataFormat, "record shorter than header")
        })? as u32;
        if interval == 0 {
            return Err(LibError::status_with_context(Status::DataFormat, "zero sample interval"));
        }

        let mut depth = 0.0f64;
        let mut max_depth = 0.0f64;
        for &raw in self.samples()? {
            depth += raw as i8 as f64 / 10.0;
            if depth > max_depth {
                max_depth = depth;
            }
        }

        let derived = Derived {
            divetime_seconds: self.samples()?.len() as u32 * interval,
            max_depth,
            interval,
        };
        let _ = self.derived.set(derived);
        Ok(derived)
    }
}

impl DiveParser for SuuntoVyperParser<'_> {
    fn datetime(&self) -> Result<Timestamp> {
        if self.bytes.len() < HEADER_LEN {
            return Err(LibError::status_with_context(Status::DataFormat, "record shorter than header"));
        }

        let year = bcd(self.bytes[1])
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "invalid year bcd"))?;
        let month = bcd(self.bytes[2])
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "invalid month bcd"))?;
        let day = bcd(self.bytes[3])
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "invalid day bcd"))?;
        let hour = bcd(self.bytes[4])
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "invalid hour bcd"))?;
        let minute = bcd(self.bytes[5])
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "invalid minute bcd"))?;

        let civil = date(2000 + year as i16, month as i8, day as i8)
            .at(hour as i8, minute as i8, 0, 0);
        Ok(civil.in_tz("UTC")?.timestamp())
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
        let mut time = 0u32;
        let mut depth = 0.0f64;
        for &raw in self.samples()? {
            depth += raw as i8 as f64 / 10.0;
            time += derived.interval;
            callback(Sample::Time(time));
            callback(Sample::Depth(depth));
        }
        Ok(())
    }
}
