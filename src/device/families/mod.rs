//! Concrete per-family wire protocols and dive-carving policies.
//!
//! Every historical `Family` is reachable through [`crate::registry`]; the
//! modules here cover the representative subset described in
//! `SPEC_FULL.md` §2 "Family coverage". Each exercises a different
//! framing and ring-carving pattern so the shared substrate
//! ([`crate::device::transfer`], [`crate::ringstream`]) is exercised by
//! more than one caller.

pub mod divesystem_idive;
pub mod mares_iconhd;
pub mod oceanic_atom2;
pub mod reefnet_sensus;
pub mod shearwater;
pub mod suunto_vyper;
pub mod tecdiving;
