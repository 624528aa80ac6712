//! The normalized timeline a parser emits, independent of which family
//! produced it.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SalinityKind {
    #[default]
    Fresh,
    Salt,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Salinity {
    pub kind: SalinityKind,
    /// Density in kg/m^3.
    pub density: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiveMode {
    #[default]
    None,
    Freedive,
    Gauge,
    OpenCircuit,
    ClosedCircuit,
    SemiClosedCircuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DecoModel {
    None,
    Buhlmann { conservatism: i32, low: f64, high: f64 },
    Vpm { conservatism: i32 },
    Rgbm { conservatism: i32 },
    Dciem { conservatism: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TankKind {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TankUsage {
    #[default]
    None,
    Sidemount,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub kind: TankKind,
    pub usage: TankUsage,
    pub gasmix: Option<usize>,
    pub volume: f64,
    pub workpressure: f64,
    pub beginpressure: f64,
    pub endpressure: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GasUsage {
    #[default]
    None,
    Oxygen,
    Diluent,
    OpenCircuit,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gasmix {
    pub helium: f64,
    pub oxygen: f64,
    pub nitrogen: f64,
    pub usage: GasUsage,
}

impl Default for Gasmix {
    fn default() -> Self {
        Self {
            helium: 0.0,
            oxygen: 0.21,
            nitrogen: 0.79,
            usage: GasUsage::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sensor {
    None,
    Id(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ppo2 {
    pub sensor: Sensor,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct O2Sensor {
    pub sensor: Sensor,
    pub millivolt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecoKind {
    Ndl,
    DecoStop,
    DeepStop,
    SafetyStop,
}

impl fmt::Display for DecoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ndl => write!(f, "NDL"),
            Self::DecoStop => write!(f, "deco stop"),
            Self::DeepStop => write!(f, "deep stop"),
            Self::SafetyStop => write!(f, "safety stop"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deco {
    pub kind: DecoKind,
    /// Stop depth in meters; 0 for `Ndl`.
    pub depth: f64,
    /// Remaining time in minutes (NDL minutes, or stop time for a deco/safety stop).
    pub time: u32,
}

impl fmt::Display for Deco {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DecoKind::Ndl => write!(f, "NDL {} min", self.time),
            _ => write!(f, "{} at {:.1} m, {} min", self.kind, self.depth, self.time),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiveEvent {
    pub kind: u32,
    pub time: u32,
    pub flags: u32,
    pub value: u32,
}

/// One decoded value at one instant in the sample stream, in the order a
/// parser emitted it. See `SPEC_FULL.md` §3 for ordering invariants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sample {
    Time(u32),
    Depth(f64),
    Temperature(f64),
    Pressure { tank: usize, bar: f64 },
    GasMix(usize),
    SetPoint(f64),
    Ppo2(Ppo2),
    Cns(f64),
    Rbt(u32),
    Heartbeat(u32),
    Bearing(u32),
    O2Sensor(O2Sensor),
    Deco(Deco),
    Event(DiveEvent),
}

/// A fully decoded dive: logbook header fields plus the normalized
/// timeline produced by walking the profile through a family parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dive {
    pub fingerprint: Fingerprint,
    pub start: Timestamp,
    pub duration_seconds: u32,
    pub max_depth: f64,
    pub avg_depth: Option<f64>,
    pub gasmixes: Vec<Gasmix>,
    pub atmospheric_pressure: Option<f64>,
    pub surface_temperature: Option<f64>,
    pub minimum_temperature: Option<f64>,
    pub maximum_temperature: Option<f64>,
    pub tanks: Vec<Tank>,
    pub dive_mode: DiveMode,
    pub deco_model: DecoModel,
    pub salinity: Option<Salinity>,
    pub location: Option<Location>,
    pub samples: Vec<Sample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gasmix_default_is_air() {
        let air = Gasmix::default();
        assert_eq!(air.oxygen, 0.21);
        assert_eq!(air.nitrogen, 0.79);
        assert_eq!(air.helium, 0.0);
    }

    #[test]
    fn deco_display_distinguishes_ndl_from_stop() {
        let ndl = Deco { kind: DecoKind::Ndl, depth: 0.0, time: 40 };
        let stop = Deco { kind: DecoKind::DecoStop, depth: 6.0, time: 3 };
        assert_eq!(ndl.to_string(), "NDL 40 min");
        assert!(stop.to_string().contains("deco stop"));
    }
}
