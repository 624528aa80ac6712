//! The decoder side: binds a borrowed dive record, answers field queries,
//! and walks the record into a normalized [`Sample`] stream.

pub mod families;

use jiff::Timestamp;

use crate::error::Result;
use crate::sample::{DecoModel, DiveMode, Gasmix, Location, Salinity, Sample, Tank};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Divetime,
    MaxDepth,
    AvgDepth,
    MinTemperature,
    MaxTemperature,
    SurfaceTemperature,
    AtmosphericPressure,
    GasmixCount,
    Gasmix(usize),
    TankCount,
    Tank(usize),
    Salinity,
    DiveMode,
    DecoModel,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    U32(u32),
    F64(f64),
    Gasmix(Gasmix),
    Tank(Tank),
    Salinity(Salinity),
    DiveMode(DiveMode),
    DecoModel(DecoModel),
    Location(Location),
}

/// Bound to a single dive record's bytes; never takes ownership of them.
/// `samples_foreach` must be callable any number of times with identical
/// results (see `SPEC_FULL.md` §8 property 3).
pub trait DiveParser {
    fn datetime(&self) -> Result<Timestamp>;
    fn field(&self, kind: FieldKind) -> Result<FieldValue>;
    fn samples_foreach(&self, callback: &mut dyn FnMut(Sample)) -> Result<()>;
}

/// Incrementally built while walking the sample stream: de-duplicates gas
/// mixes by `(O2, He)` and caps the table at `capacity`, matching the
/// per-family `NGASMIXES` limit described in `SPEC_FULL.md` §4.4.
#[derive(Debug, Clone)]
pub struct GasMixTable {
    mixes: Vec<Gasmix>,
    capacity: usize,
}

impl GasMixTable {
    pub fn new(capacity: usize) -> Self {
        Self { mixes: Vec::new(), capacity }
    }

    /// Returns the index of `mix` in the table, inserting it if this is a
    /// gas combination not seen before. `Err(NoMemory)` once the family's
    /// gas count limit is exceeded.
    pub fn index_of(&mut self, mix: Gasmix) -> Result<usize> {
        if let Some(i) = self
            .mixes
            .iter()
            .position(|m| m.oxygen == mix.oxygen && m.helium == mix.helium)
        {
            return Ok(i);
        }

        if self.mixes.len() >= self.capacity {
            return Err(crate::status::Status::NoMemory.into());
        }

        self.mixes.push(mix);
        Ok(self.mixes.len() - 1)
    }

    pub fn mixes(&self) -> &[Gasmix] {
        &self.mixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::GasUsage;

    fn mix(o2: f64, he: f64) -> Gasmix {
        Gasmix { oxygen: o2, helium: he, nitrogen: 1.0 - o2 - he, usage: GasUsage::None }
    }

    #[test]
    fn repeated_gas_mix_reuses_its_index() {
        let mut table = GasMixTable::new(3);
        let air = mix(0.21, 0.0);
        let nitrox = mix(0.32, 0.0);

        assert_eq!(table.index_of(air).unwrap(), 0);
        assert_eq!(table.index_of(nitrox).unwrap(), 1);
        assert_eq!(table.index_of(air).unwrap(), 0);
        assert_eq!(table.mixes().len(), 2);
    }

    #[test]
    fn exceeding_capacity_is_no_memory() {
        let mut table = GasMixTable::new(1);
        table.index_of(mix(0.21, 0.0)).unwrap();
        let err = table.index_of(mix(0.32, 0.0)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::LibError::Status(crate::status::Status::NoMemory, _)
        ));
    }
}
