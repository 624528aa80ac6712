//! A cross-vendor dive computer download and parsing library.
//!
//! Applications work against three pieces: a [`descriptor`] to pick a
//! model, an [`IoStream`](iostream::IoStream) the host provides (serial,
//! USB, BLE — whatever the transport is), and a [`device::Device`] that
//! pairs the two through the family's wire protocol. Downloaded dive
//! bytes are handed to a [`parser::DiveParser`] to decode fields and
//! samples.

pub mod array;
pub mod buffer;
pub mod context;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod event;
pub mod family;
pub mod fingerprint;
pub mod iostream;
pub mod iterator;
pub mod parser;
pub mod registry;
pub mod ringbuffer;
pub mod ringstream;
pub mod sample;
pub mod status;
pub mod transport;

pub use crate::context::{Context, LogLevel};
pub use crate::descriptor::Descriptor;
pub use crate::device::{Device, DeviceConnected, DeviceDisconnected, DeviceDriver};
pub use crate::error::{LibError, Result};
pub use crate::family::Family;
pub use crate::fingerprint::Fingerprint;
pub use crate::parser::{DiveParser, FieldKind, FieldValue};
pub use crate::sample::Sample;
pub use crate::status::Status;
pub use crate::transport::Transport;
