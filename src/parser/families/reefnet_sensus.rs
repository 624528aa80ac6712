//! Decodes a Sensus record: `[delimiter(4)][fingerprint(4)][interval(1)]
//! [temperature(1)][pressure_samples: u8 decibar-ish deltas from a 0
//! baseline, ...]`. The 10-byte header matches the one
//! [`crate::device::families::reefnet_sensus`] carves out of the flash
//! dump, so the same bytes that name a dive also source its interval
//! and surface temperature. Unlike Atom2/Vyper this family has no depth
//! sensor; the profile is a pressure trace the caller converts to depth
//! itself, so `samples_foreach` only ever emits `Pressure`/`Time`.

use std::cell::OnceCell;

use jiff::Timestamp;

use crate::error::{LibError, Result};
use crate::parser::{DiveParser, FieldKind, FieldValue};
use crate::sample::Sample;
use crate::status::Status;

const HEADER_LEN: usize = 10;
const INTERVAL_OFFSET: usize = 8;
const SURFACE_TEMPERATURE_OFFSET: usize = 9;

#[derive(Debug, Clone, Copy)]
struct Derived {
    divetime_seconds: u32,
    interval: u32,
}

pub struct ReefnetSensusParser<'a> {
    bytes: &'a [u8],
    derived: OnceCell<Derived>,
}

impl<'a> ReefnetSensusParser<'a> {
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

        let interval = self.bytes.get(INTERVAL_OFFSET).copied().ok_or_else(|| {
            LibError::status_with_context(Status::DataFormat, "record shorter than header")
        })? as u32;
        if interval == 0 {
            return Err(LibError::status_with_context(Status::DataFormat, "zero sample interval"));
        }

        let derived = Derived {
            divetime_seconds: self.samples()?.len() as u32 * interval,
            interval,
        };
        let _ = self.derived.set(derived);
        Ok(derived)
    }
}

impl DiveParser for ReefnetSensusParser<'_> {
    fn datetime(&self) -> Result<Timestamp> {
        Err(Status::Unsupported.into())
    }

    fn field(&self, kind: FieldKind) -> Result<FieldValue> {
        let derived = self.derive()?;
        match kind {
            FieldKind::Divetime => Ok(FieldValue::U32(derived.divetime_seconds)),
            FieldKind::SurfaceTemperature => {
                let raw = self.bytes.get(SURFACE_TEMPERATURE_OFFSET).copied().ok_or_else(|| {
                    LibError::status_with_context(Status::DataFormat, "record shorter than header")
                })?;
                Ok(FieldValue::F64(raw as f64))
            }
            _ => Err(Status::Unsupported.into()),
        }
    }

    fn samples_foreach(&self, callback: &mut dyn FnMut(Sample)) -> Result<()> {
        let derived = self.derive()?;
        let mut time = 0u32;
        for &raw in self.samples()? {
            time += derived.interval;
            callback(Sample::Time(time));
            callback(Sample::Pressure { tank: 0, bar: raw as f64 / 10.0 });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mirrors the driver's carved shape: `[delimiter(4)][fingerprint(4)]
    /// [interval][surface_temp][samples...]`.
    fn record(interval: u8, surface_temp: u8, pressures: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0, 0, 0, 0, 1, 2, 3, 4, interval, surface_temp];
        bytes.extend_from_slice(pressures);
        bytes
    }

    #[test]
    fn emits_time_then_pressure_per_tick() {
        let bytes = record(30, 25, &[200, 210, 220]);
        let parser = ReefnetSensusParser::new(&bytes);

        let mut seen = Vec::new();
        parser.samples_foreach(&mut |s| seen.push(s)).unwrap();

        assert_eq!(
            seen,
            vec![
                Sample::Time(30),
                Sample::Pressure { tank: 0, bar: 20.0 },
                Sample::Time(60),
                Sample::Pressure { tank: 0, bar: 21.0 },
                Sample::Time(90),
                Sample::Pressure { tank: 0, bar: 22.0 },
            ]
        );
        assert_eq!(parser.field(FieldKind::Divetime).unwrap(), FieldValue::U32(90));
    }

    #[test]
    fn surface_temperature_reads_the_header_byte_after_the_fingerprint() {
        let bytes = record(10, 18, &[]);
        let parser = ReefnetSensusParser::new(&bytes);
        assert_eq!(parser.field(FieldKind::SurfaceTemperature).unwrap(), FieldValue::F64(18.0));
    }

    #[test]
    fn truncated_header_is_data_format_not_panic() {
        let bytes = [0u8, 0, 0, 0, 1, 2, 3];
        let parser = ReefnetSensusParser::new(&bytes);
        let err = parser.field(FieldKind::Divetime).unwrap_err();
        assert!(matches!(err, LibError::Status(Status::DataFormat, _)));
        assert!(parser.samples_foreach(&mut |_| {}).is_err());
    }

    #[test]
    fn emitted_sample_times_are_strictly_increasing() {
        let bytes = record(15, 20, &[100, 110, 90, 130]);
        let parser = ReefnetSensusParser::new(&bytes);

        let mut times = Vec::new();
        parser
            .samples_foreach(&mut |s| {
                if let Sample::Time(t) = s {
                    times.push(t);
                }
            })
            .unwrap();

        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }
}
