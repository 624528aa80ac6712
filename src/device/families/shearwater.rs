//! Shearwater Predator/Petrel: a vendor-framed byte stream (`0xFF 0xAA`
//! start-of-frame, payload, 1-byte xor8 trailer) carrying a manifest of
//! fixed-size "PNF" (previous/next/footer) blocks per dive rather than a
//! ringbuffer pointer pair — the opening block records when the dive
//! started, the closing block records how long it lasted.

use crate::array::checksum_xor8;
use crate::device::{DeviceDriver, DiveCallback};
use crate::error::{LibError, Result};
use crate::event::{DevInfo, Events, Progress, Event};
use crate::fingerprint::Fingerprint;
use crate::iostream::{IoStream, LineSettings, Timeout, read_exact, write_all};
use crate::status::Status;

const BLOCK_LEN: usize = 32;
const RECORD_BLOCKS: usize = 3;
const RECORD_LEN: usize = BLOCK_LEN * RECORD_BLOCKS;
const FINGERPRINT_LEN: usize = 4;
const MANIFEST_ENTRY_LEN: usize = 4;

pub struct Shearwater {
    dive_count: u32,
    fingerprint: Fingerprint,
}

impl Default for Shearwater {
    fn default() -> Self {
        Self::new()
    }
}

impl Shearwater {
    pub fn new() -> Self {
        Self { dive_count: 0, fingerprint: Fingerprint::empty() }
    }
}

fn send_frame(stream: &mut dyn IoStream, payload: &[u8]) -> Result<()> {
    let mut frame = vec![0xFF, 0xAA];
    frame.extend_from_slice(payload);
    frame.push(checksum_xor8(payload));
    write_all(stream, &frame)
}

fn recv_frame(stream: &mut dyn IoStream, out: &mut [u8]) -> Result<()> {
    let mut header = [0u8; 2];
    read_exact(stream, &mut header)?;
    if header != [0xFF, 0xAA] {
        return Err(LibError::status_with_context(Status::Protocol, "missing frame start-of-frame marker"));
    }
    read_exact(stream, out)?;
    let mut checksum = [0u8; 1];
    read_exact(stream, &mut checksum)?;
    if checksum_xor8(out) != checksum[0] {
        return Err(LibError::status_with_context(Status::Protocol, "frame checksum mismatch"));
    }
    Ok(())
}

impl DeviceDriver for Shearwater {
    fn open(&mut self, stream: &mut dyn IoStream, events: &mut Events, cancel: &mut dyn FnMut() -> bool) -> Result<()> {
        stream.configure(LineSettings { baudrate: 115200, ..Default::default() })?;
        stream.set_timeout(Timeout::After(4000))?;

        if cancel() {
            return Err(Status::Cancelled.into());
        }

        send_frame(stream, &[0x10])?;
        let mut info = [0u8; 8];
        recv_frame(stream, &mut info)?;

        events.emit(Event::DevInfo(DevInfo {
            model: info[0] as u32,
            firmware: u32::from_be_bytes([0, info[1], info[2], info[3]]),
            serial: u32::from_be_bytes([info[4], info[5], info[6], info[7]]),
        }));

        send_frame(stream, &[0x20])?;
        let mut count = [0u8; MANIFEST_ENTRY_LEN];
        recv_frame(stream, &mut count)?;
        self.dive_count = u32::from_be_bytes(count);

        Ok(())
    }

    fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()> {
        if !fingerprint.is_empty() && fingerprint.as_slice().len() != FINGERPRINT_LEN {
            return Err(LibError::InvalidArguments(format!(
                "shearwater fingerprint must be {FINGERPRINT_LEN} bytes"
            )));
        }
        self.fingerprint = fingerprint;
        Ok(())
    }

    fn foreach(
        &mut self,
        stream: &mut dyn IoStream,
        events: &mut Events,
        cancel: &mut dyn FnMut() -> bool,
        callback: &mut DiveCallback,
    ) -> Result<()> {
        let total = self.dive_count;
        events.emit(Event::Progress(Progress { current: 0, maximum: total }));

        for ordinal in (0..total).rev() {
            if cancel() {
                return Err(Status::Cancelled.into());
            }

            send_frame(stream, &[0x21, (ordinal & 0xFF) as u8, ((ordinal >> 8) & 0xFF) as u8])?;
            let mut record = vec![0u8; RECORD_LEN];
            recv_frame(stream, &mut record)?;

            let fingerprint = Fingerprint::try_from(&record[1..1 + FINGERPRINT_LEN])?;
            if !self.fingerprint.is_empty() && fingerprint == self.fingerprint {
                break;
            }

            events.emit(Event::Progress(Progress { current: total - ordinal, maximum: total }));

            if !callback(&record, &fingerprint) {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_fingerprint_rejects_wrong_length() {
        let mut driver = Shearwater::new();
        let bad = Fingerprint::try_from([1, 2].as_slice()).unwrap();
        assert!(driver.set_fingerprint(bad).is_err());
    }

    #[test]
    fn frame_roundtrips_through_xor8_checksum() {
        use crate::iostream::LoopbackStream;
        let mut stream = LoopbackStream::new();
        send_frame(&mut stream, &[1, 2, 3]).unwrap();

        let mut readback = LoopbackStream::new();
        readback.push_reply(&stream.written);
        let mut out = [0u8; 3];
        recv_frame(&mut readback, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3]);
    }
}
