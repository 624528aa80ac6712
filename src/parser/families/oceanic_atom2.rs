//! Decodes the `[header(8) | flags(1) interval(2) | samples(8)*]` record
//! the Atom2 device driver assembles in
//! [`crate::device::families::oceanic_atom2`].
//!
//! Each sample is `[depth_dm_le(2) temp_raw_le(2) o2_pct(1) he_pct(1)
//! pressure_raw_le(2)]`: `flags` bit 0 selects Fahrenheit tenths instead
//! of Celsius tenths for `temp_raw`; `pressure_raw >= 0xFFF0` is an AI
//! sentinel (off/not paired/no-comms) rather than a reading, and values
//! below that are masked to 12 bits and scaled by 2 psi (`SPEC_FULL.md`
//! §4.4).

use std::cell::OnceCell;
use std::cell::RefCell;

use jiff::Timestamp;

use crate::array::array_uint16_le;
use crate::error::{LibError, Result};
use crate::parser::{DiveParser, FieldKind, FieldValue, GasMixTable};
use crate::sample::{Gasmix, Sample};
use crate::status::Status;

const HEADER_LEN: usize = 8;
const PROFILE_HEADER_LEN: usize = 3;
const SAMPLE_LEN: usize = 8;
const NGASMIXES: usize = 3;
const PRESSURE_SENTINEL: u16 = 0xFFF0;
const PSI_TO_BAR: f64 = 0.0689476;
const FAHRENHEIT_FLAG: u8 = 0b01;

#[derive(Debug, Clone, Copy)]
struct Derived {
    divetime_seconds: u32,
    max_depth: f64,
    interval: u32,
}

pub struct OceanicAtom2Parser<'a> {
    bytes: &'a [u8],
    derived: OnceCell<Derived>,
    gasmixes: RefCell<GasMixTable>,
}

impl<'a> OceanicAtom2Parser<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, derived: OnceCell::new(), gasmixes: RefCell::new(GasMixTable::new(NGASMIXES)) }
    }

    fn profile(&self) -> Result<&'a [u8]> {
        self.bytes
            .get(HEADER_LEN..)
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "record shorter than header"))
    }

    fn flags(&self) -> Result<u8> {
        self.profile()?
            .first()
            .copied()
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "missing flags byte"))
    }

    fn samples(&self) -> Result<&'a [u8]> {
        let profile = self.profile()?;
        profile
            .get(PROFILE_HEADER_LEN..)
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "missing interval field"))
    }

    fn temperature(&self, raw: u16) -> Result<f64> {
        let celsius_tenths = if self.flags()? & FAHRENHEIT_FLAG != 0 {
            (raw as f64 - 320.0) * 5.0 / 9.0
        } else {
            raw as f64
        };
        Ok(celsius_tenths / 10.0)
    }

    fn derive(&self) -> Result<Derived> {
        if let Some(d) = self.derived.get() {
            return Ok(*d);
        }

        let profile = self.profile()?;
        let interval_bytes = profile
            .get(1..PROFILE_HEADER_LEN)
            .ok_or_else(|| LibError::status_with_context(Status::DataFormat, "missing interval field"))?;
        let interval = array_uint16_le(interval_bytes) as u32;
        if interval == 0 {
            return Err(LibError::status_with_context(Status::DataFormat, "zero sample interval"));
        }

        let samples = self.samples()?;
        if samples.len() % SAMPLE_LEN != 0 {
            return Err(LibError::status_with_context(Status::DataFormat, "truncated sample"));
        }

        let mut max_depth = 0.0f64;
        let tick_count = samples.len() / SAMPLE_LEN;
        for chunk in samples.chunks_exact(SAMPLE_LEN) {
            let depth = array_uint16_le(&chunk[0..2]) as f64 / 10.0;
            if depth > max_depth {
                max_depth = depth;
            }
        }

        let derived = Derived {
            divetime_seconds: tick_count as u32 * interval,
            max_depth,
            interval,
        };
        let _ = self.derived.set(derived);
        Ok(derived)
    }

    /// Walks the sample stream once (discarding `Time`/`Depth`/etc.) just
    /// to populate the gas-mix table, so `field(Gasmix*)` doesn't require
    /// the caller to have already walked `samples_foreach`.
    fn ensure_gasmixes(&self) -> Result<()> {
        if self.gasmixes.borrow().mixes().is_empty() {
            self.samples_foreach(&mut |_| {})?;
        }
        Ok(())
    }
}

impl DiveParser for OceanicAtom2Parser<'_> {
    fn datetime(&self) -> Result<Timestamp> {
        Err(Status::Unsupported.into())
    }

    fn field(&self, kind: FieldKind) -> Result<FieldValue> {
        let derived = self.derive()?;
        match kind {
            FieldKind::Divetime => Ok(FieldValue::U32(derived.divetime_seconds)),
            FieldKind::MaxDepth => Ok(FieldValue::F64(derived.max_depth)),
            FieldKind::GasmixCount => {
                self.ensure_gasmixes()?;
                Ok(FieldValue::U32(self.gasmixes.borrow().mixes().len() as u32))
            }
            FieldKind::Gasmix(index) => {
                self.ensure_gasmixes()?;
                self.gasmixes
                    .borrow()
                    .mixes()
                    .get(index)
                    .copied()
                    .map(FieldValue::Gasmix)
                    .ok_or(Status::Unsupported.into())
            }
            _ => Err(Status::Unsupported.into()),
        }
    }

    fn samples_foreach(&self, callback: &mut dyn FnMut(Sample)) -> Result<()> {
        let derived = self.derive()?;
        let samples = self.samples()?;

        let mut time = 0u32;
        let mut current_mix: Option<usize> = None;
        for chunk in samples.chunks_exact(SAMPLE_LEN) {
            let depth_raw = array_uint16_le(&chunk[0..2]);
            let temp_raw = array_uint16_le(&chunk[2..4]);
            let oxygen_pct = chunk[4];
            let helium_pct = chunk[5];
            let pressure_raw = array_uint16_le(&chunk[6..8]);

            time += derived.interval;
            callback(Sample::Time(time));
            callback(Sample::Depth(depth_raw as f64 / 10.0));
            callback(Sample::Temperature(self.temperature(temp_raw)?));

            let mix = Gasmix {
                oxygen: oxygen_pct as f64 / 100.0,
                helium: helium_pct as f64 / 100.0,
                nitrogen: 1.0 - oxygen_pct as f64 / 100.0 - helium_pct as f64 / 100.0,
                usage: Default::default(),
            };
            let index = self.gasmixes.borrow_mut().index_of(mix)?;
            if current_mix != Some(index) {
                callback(Sample::GasMix(index));
                current_mix = Some(index);
            }

            if pressure_raw < PRESSURE_SENTINEL {
                let psi = (pressure_raw & 0x0FFF) as f64 * 2.0;
                callback(Sample::Pressure { tank: 0, bar: psi * PSI_TO_BAR });
            }
        }

        Ok(())
    }
}
