//! Reefnet Sensus: a single flash dump read forward in one linear burst,
//! then carved in memory by scanning for a zero-word start delimiter and
//! bounding each dive by a run of shallow samples, rather than walking an
//! on-device ring pointer. The data interleaves a small fixed handshake
//! header with a raw, start-delimited dive stream, so `foreach` never
//! issues a second physical read per dive the way the ring-carving
//! families do.
//!
//! Each dive record is `[delimiter(4)=0x00000000][fingerprint(4)]
//! [interval(1)][surface_temperature(1)][depth samples(1 each), one per
//! sampling interval]`. There is no explicit end-of-dive marker: surfacing
//! is inferred from a run of [`SURFACE_RUN`] consecutive depth bytes below
//! [`SURFACE_THRESHOLD`], matching a diver sitting at the surface long
//! enough to be done. This is the same 10-byte header
//! [`crate::parser::families::reefnet_sensus`] decodes.

use crate::array::array_uint32_le;
use crate::device::{self, DeviceDriver, DiveCallback};
use crate::error::{LibError, Result};
use crate::event::{DevInfo, Event, Events};
use crate::fingerprint::Fingerprint;
use crate::iostream::{IoStream, LineSettings, Timeout, read_exact, write_all};
use crate::status::Status;

const PAGE_SIZE: u32 = 32;
const START_DELIMITER: u32 = 0x0000_0000;
const HEADER_LEN: usize = 10;
const FINGERPRINT_OFFSET: usize = 4;
const FINGERPRINT_LEN: usize = 4;
const SURFACE_THRESHOLD: u8 = 16;
const SURFACE_RUN: usize = 17;

/// Carves `dump` into `(byte range, fingerprint)` pairs, oldest dive
/// first. Factored out of [`ReefnetSensus::foreach`] so the carving rule
/// can be exercised directly, without a scripted [`IoStream`].
fn carve_dives(dump: &[u8]) -> Vec<(std::ops::Range<usize>, Fingerprint)> {
    let mut dives = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_LEN <= dump.len() {
        if array_uint32_le(&dump[offset..offset + 4]) != START_DELIMITER {
            offset += 1;
            continue;
        }

        let fingerprint_start = offset + FINGERPRINT_OFFSET;
        let fingerprint_bytes = &dump[fingerprint_start..fingerprint_start + FINGERPRINT_LEN];
        let Ok(fingerprint) = Fingerprint::try_from(fingerprint_bytes) else {
            offset += 1;
            continue;
        };

        let samples_start = offset + HEADER_LEN;
        let mut end = dump.len();
        let mut next_offset = dump.len();
        let mut run = 0usize;
        for (i, &byte) in dump[samples_start..].iter().enumerate() {
            if byte < SURFACE_THRESHOLD {
                run += 1;
                if run == SURFACE_RUN {
                    // Exclude the surfacing run itself from the dive, but
                    // resume scanning only after it - otherwise its own
                    // zero bytes would be mistaken for the next delimiter.
                    end = samples_start + i + 1 - SURFACE_RUN;
                    next_offset = samples_start + i + 1;
                    break;
                }
            } else {
                run = 0;
            }
        }

        dives.push((offset..end, fingerprint));
        offset = next_offset.max(samples_start + 1);
    }

    dives
}

pub struct ReefnetSensus {
    memory_size: u32,
    fingerprint: Fingerprint,
}

impl Default for ReefnetSensus {
    fn default() -> Self {
        Self::new()
    }
}

impl ReefnetSensus {
    pub fn new() -> Self {
        Self { memory_size: 0, fingerprint: Fingerprint::empty() }
    }
}

impl DeviceDriver for ReefnetSensus {
    fn open(&mut self, stream: &mut dyn IoStream, events: &mut Events, cancel: &mut dyn FnMut() -> bool) -> Result<()> {
        stream.configure(LineSettings { baudrate: 19200, ..Default::default() })?;
        stream.set_timeout(Timeout::After(4000))?;

        if cancel() {
            return Err(Status::Cancelled.into());
        }

        write_all(stream, b"VERSION\r\n")?;
        let mut version = [0u8; 10];
        read_exact(stream, &mut version)?;

        events.emit(Event::DevInfo(DevInfo {
            model: version[0] as u32,
            firmware: array_uint32_le(&version[1..5]),
            serial: array_uint32_le(&version[5..9]),
        }));

        self.memory_size = 56 * 1024;
        Ok(())
    }

    fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()> {
        if !fingerprint.is_empty() && fingerprint.as_slice().len() != FINGERPRINT_LEN {
            return Err(LibError::InvalidArguments(format!(
                "reefnet sensus fingerprint must be {FINGERPRINT_LEN} bytes"
            )));
        }
        self.fingerprint = fingerprint;
        Ok(())
    }

    fn dump(&mut self, stream: &mut dyn IoStream, buffer: &mut [u8]) -> Result<()> {
        if self.memory_size == 0 {
            return Err(LibError::DeviceError("device not open".into()));
        }
        write_all(stream, b"READ\r\n")?;
        read_exact(stream, buffer)
    }

    fn foreach(
        &mut self,
        stream: &mut dyn IoStream,
        events: &mut Events,
        cancel: &mut dyn FnMut() -> bool,
        callback: &mut DiveCallback,
    ) -> Result<()> {
        if self.memory_size == 0 {
            return Err(LibError::DeviceError("device not open".into()));
        }

        write_all(stream, b"READ\r\n")?;

        let dump = device::dump_read(events, PAGE_SIZE, 0, self.memory_size, cancel, |_addr, out| {
            read_exact(stream, out)
        })?;

        for (range, fingerprint) in carve_dives(&dump) {
            if cancel() {
                return Err(Status::Cancelled.into());
            }

            if !self.fingerprint.is_empty() && fingerprint == self.fingerprint {
                continue;
            }

            if !callback(&dump[range], &fingerprint) {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iostream::LoopbackStream;

    #[test]
    fn set_fingerprint_rejects_wrong_length() {
        let mut driver = ReefnetSensus::new();
        let bad = Fingerprint::try_from([1, 2].as_slice()).unwrap();
        assert!(driver.set_fingerprint(bad).is_err());
    }

    #[test]
    fn open_reports_devinfo_from_version_string() {
        let mut stream = LoopbackStream::new();
        stream.push_reply(&[0x09, 1, 0, 0, 0, 2, 0, 0, 0, 0]);

        let mut driver = ReefnetSensus::new();
        let mut events = Events::default();
        let mut cancel = || false;
        driver.open(&mut stream, &mut events, &mut cancel).unwrap();

        assert_eq!(driver.memory_size, 56 * 1024);
    }

    #[test]
    fn dump_reads_the_requested_buffer_length_after_issuing_read() {
        let mut stream = LoopbackStream::new();
        stream.push_reply(&[0x09, 1, 0, 0, 0, 2, 0, 0, 0, 0]);
        stream.push_reply(&[1, 2, 3, 4, 5, 6]);

        let mut driver = ReefnetSensus::new();
        let mut events = Events::default();
        let mut cancel = || false;
        driver.open(&mut stream, &mut events, &mut cancel).unwrap();

        let mut buffer = [0u8; 6];
        driver.dump(&mut stream, &mut buffer).unwrap();
        assert_eq!(buffer, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn dump_without_open_is_a_device_error() {
        let mut driver = ReefnetSensus::new();
        let mut stream = LoopbackStream::new();
        let mut buffer = [0u8; 4];
        assert!(driver.dump(&mut stream, &mut buffer).is_err());
    }

    #[test]
    fn foreach_without_open_is_a_device_error() {
        let mut driver = ReefnetSensus::new();
        let mut stream = LoopbackStream::new();
        let mut events = Events::default();
        let mut cancel = || false;
        let err = driver
            .foreach(&mut stream, &mut events, &mut cancel, &mut |_, _| true)
            .unwrap_err();
        assert!(matches!(err, LibError::DeviceError(_)));
    }

    #[test]
    fn carves_one_dive_bounded_by_a_surfacing_run() {
        let mut dump = vec![0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x40, 0xE2, 30, 25];
        dump.extend_from_slice(&[50, 60, 70, 40]);
        dump.extend(vec![0u8; SURFACE_RUN]);

        let dives = carve_dives(&dump);
        assert_eq!(dives.len(), 1);
        let (range, fingerprint) = &dives[0];
        assert_eq!(range.start, 0);
        assert_eq!(range.end, HEADER_LEN + 4);
        assert_eq!(fingerprint.as_slice(), &[0x01, 0x02, 0x40, 0xE2]);
    }

    #[test]
    fn carves_consecutive_dives_back_to_back() {
        let mut dump = vec![0x00, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0xDD, 30, 25];
        dump.extend_from_slice(&[90, 80]);
        dump.extend(vec![0u8; SURFACE_RUN]);
        dump.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x11, 0x22, 0x33, 0x44, 30, 25]);
        dump.extend_from_slice(&[90, 80]);
        dump.extend(vec![0u8; SURFACE_RUN]);

        let dives = carve_dives(&dump);
        assert_eq!(dives.len(), 2);
        assert_eq!(dives[0].1.as_slice(), &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(dives[1].1.as_slice(), &[0x11, 0x22, 0x33, 0x44]);
    }
}
