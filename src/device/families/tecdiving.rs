//! Tecdiving DiveComputer.eu: a packet-addressed dive list rather than a
//! ringbuffer — the device is asked for the dive count, then each dive is
//! requested individually by its ordinal, so there is no on-device pointer
//! arithmetic for `foreach` to walk at all.

use crate::array::crc16_ccitt;
use crate::device::{DeviceDriver, DiveCallback};
use crate::error::{LibError, Result};
use crate::event::{DevInfo, Event, Events, Progress};
use crate::fingerprint::Fingerprint;
use crate::iostream::{IoStream, LineSettings, Timeout, read_exact, write_all};
use crate::status::Status;

const CRC_INIT: u16 = 0x0000;
const FINGERPRINT_LEN: usize = 4;

pub struct Tecdiving {
    dive_count: u32,
    fingerprint: Fingerprint,
}

impl Default for Tecdiving {
    fn default() -> Self {
        Self::new()
    }
}

impl Tecdiving {
    pub fn new() -> Self {
        Self { dive_count: 0, fingerprint: Fingerprint::empty() }
    }
}

fn request(stream: &mut dyn IoStream, opcode: u8, arg: u16) -> Result<Vec<u8>> {
    let mut frame = vec![opcode];
    frame.extend_from_slice(&arg.to_le_bytes());
    let crc = crc16_ccitt(&frame, CRC_INIT);
    frame.extend_from_slice(&crc.to_le_bytes());
    write_all(stream, &frame)?;

    let mut length = [0u8; 2];
    read_exact(stream, &mut length)?;
    let len = u16::from_le_bytes(length) as usize;

    let mut body = vec![0u8; len];
    read_exact(stream, &mut body)?;
    let mut trailer_crc = [0u8; 2];
    read_exact(stream, &mut trailer_crc)?;

    let mut check = length.to_vec();
    check.extend_from_slice(&body);
    if crc16_ccitt(&check, CRC_INIT) != u16::from_le_bytes(trailer_crc) {
        return Err(LibError::status_with_context(Status::Protocol, "response crc mismatch"));
    }

    Ok(body)
}

impl DeviceDriver for Tecdiving {
    fn open(&mut self, stream: &mut dyn IoStream, events: &mut Events, cancel: &mut dyn FnMut() -> bool) -> Result<()> {
        stream.configure(LineSettings { baudrate: 115200, ..Default::default() })?;
        stream.set_timeout(Timeout::After(3000))?;

        if cancel() {
            return Err(Status::Cancelled.into());
        }

        let info = request(stream, 0x01, 0)?;
        if info.len() < 6 {
            return Err(LibError::status_with_context(Status::Protocol, "device info reply too short"));
        }
        events.emit(Event::DevInfo(DevInfo {
            model: info[0] as u32,
            firmware: u16::from_le_bytes([info[1], info[2]]) as u32,
            serial: u32::from_le_bytes([info[2], info[3], info[4], info[5]]),
        }));

        let list = request(stream, 0x02, 0)?;
        if list.len() < 2 {
            return Err(LibError::status_with_context(Status::Protocol, "dive list reply too short"));
        }
        self.dive_count = u16::from_le_bytes([list[0], list[1]]) as u32;

        Ok(())
    }

    fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()> {
        if !fingerprint.is_empty() && fingerprint.as_slice().len() != FINGERPRINT_LEN {
            return Err(LibError::InvalidArguments(format!(
                "tecdiving fingerprint must be {FINGERPRINT_LEN} bytes"
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

            let record = request(stream, 0x03, ordinal as u16)?;
            if record.len() < FINGERPRINT_LEN {
                return Err(LibError::status_with_context(Status::DataFormat, "record shorter than fingerprint"));
            }

            let fingerprint = Fingerprint::try_from(&record[0..FINGERPRINT_LEN])?;
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
    use crate::iostream::LoopbackStream;

    #[test]
    fn set_fingerprint_rejects_wrong_length() {
        let mut driver = Tecdiving::new();
        let bad = Fingerprint::try_from([1, 2].as_slice()).unwrap();
        assert!(driver.set_fingerprint(bad).is_err());
    }

    #[test]
    fn request_validates_trailer_crc() {
        let body = vec![1u8, 2, 3, 4];
        let length = (body.len() as u16).to_le_bytes();
        let mut check = length.to_vec();
        check.extend_from_slice(&body);
        let crc = crc16_ccitt(&check, CRC_INIT);

        let mut stream = LoopbackStream::new();
        stream.push_reply(&length);
        stream.push_reply(&body);
        stream.push_reply(&crc.to_le_bytes());

        let result = request(&mut stream, 0x03, 0).unwrap();
        assert_eq!(result, body);
    }

    #[test]
    fn request_rejects_bad_trailer_crc() {
        let mut stream = LoopbackStream::new();
        stream.push_reply(&2u16.to_le_bytes());
        stream.push_reply(&[1, 2]);
        stream.push_reply(&0xFFFFu16.to_le_bytes());

        let err = request(&mut stream, 0x03, 0).unwrap_err();
        assert!(matches!(err, LibError::Status(Status::Protocol, _)));
    }
}
