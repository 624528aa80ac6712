//! Suunto Vyper: `0x05 addr_lo addr_hi len` -> `data[len] xor8(data)`, a
//! single flat ring of variable-length records. Each record ends in a
//! 2-byte big-endian data length followed by an xor8 trailer; walking the
//! ring backward byte-by-byte happens to hand that big-endian field back in
//! little-endian order, so no byte-swap is needed to decode it mid-walk.

use crate::array::{array_uint16_le, checksum_xor8};
use crate::device::{DeviceDriver, DiveCallback};
use crate::error::{LibError, Result};
use crate::event::{DevInfo, Event, Events, Progress};
use crate::fingerprint::Fingerprint;
use crate::iostream::{IoStream, LineSettings, Timeout, read_exact, write_all};
use crate::ringbuffer::RingBuffer;
use crate::ringstream::{Direction, PageSource, RingBufferStream};
use crate::status::Status;

const PAGE_SIZE: u32 = 32;
const FINGERPRINT_LEN: usize = 5;
const TRAILER_LEN: u32 = 3; // 2-byte length + 1-byte checksum

pub struct SuuntoVyper {
    ring: Option<RingBuffer>,
    head: u32,
    fingerprint: Fingerprint,
}

impl Default for SuuntoVyper {
    fn default() -> Self {
        Self::new()
    }
}

impl SuuntoVyper {
    pub fn new() -> Self {
        Self { ring: None, head: 0, fingerprint: Fingerprint::empty() }
    }
}

struct WireSource<'a> {
    stream: &'a mut dyn IoStream,
}

impl PageSource for WireSource<'_> {
    fn read_page(&mut self, address: u32, out: &mut [u8]) -> Result<()> {
        let command = [0x05, (address & 0xFF) as u8, ((address >> 8) & 0xFF) as u8, out.len() as u8];
        write_all(self.stream, &command)?;

        let mut reply = vec![0u8; out.len() + 1];
        read_exact(self.stream, &mut reply)?;

        let (payload, checksum) = reply.split_at(out.len());
        if checksum_xor8(payload) != checksum[0] {
            return Err(LibError::status_with_context(Status::Protocol, "page checksum mismatch"));
        }

        out.copy_from_slice(payload);
        Ok(())
    }
}

impl DeviceDriver for SuuntoVyper {
    fn open(&mut self, stream: &mut dyn IoStream, events: &mut Events, cancel: &mut dyn FnMut() -> bool) -> Result<()> {
        stream.configure(LineSettings { baudrate: 2400, ..Default::default() })?;
        stream.set_timeout(Timeout::After(3000))?;

        if cancel() {
            return Err(Status::Cancelled.into());
        }

        write_all(stream, &[0x08])?;
        let mut info = [0u8; 4];
        read_exact(stream, &mut info)?;

        events.emit(Event::DevInfo(DevInfo {
            model: info[0] as u32,
            firmware: info[1] as u32,
            serial: array_uint16_le(&info[2..4]) as u32,
        }));

        write_all(stream, &[0x06])?;
        let mut pointer = [0u8; 2];
        read_exact(stream, &mut pointer)?;
        let head = array_uint16_le(&pointer) as u32;

        self.ring = Some(RingBuffer::new(0x0000, 0x8000));
        self.head = head;
        Ok(())
    }

    fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()> {
        if !fingerprint.is_empty() && fingerprint.as_slice().len() != FINGERPRINT_LEN {
            return Err(LibError::InvalidArguments(format!(
                "suunto vyper fingerprint must be {FINGERPRINT_LEN} bytes"
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
        let ring = self.ring.ok_or_else(|| LibError::DeviceError("device not open".into()))?;

        let mut source = WireSource { stream };
        let mut walker = RingBufferStream::new(&mut source, PAGE_SIZE, PAGE_SIZE * 4, ring, self.head, Direction::Backward);

        events.emit(Event::Progress(Progress { current: 0, maximum: ring.capacity() }));
        let mut consumed = 0u32;

        loop {
            if cancel() {
                return Err(Status::Cancelled.into());
            }
            if consumed + TRAILER_LEN > ring.capacity() {
                break;
            }

            let mut trailer = [0u8; TRAILER_LEN as usize];
            walker.read(|_| {}, &mut trailer)?;
            consumed += TRAILER_LEN;

            let checksum = trailer[0];
            let length = array_uint16_le(&trailer[1..3]) as u32;

            if length == 0 {
                log::warn!("suunto vyper: zero-length record, stopping");
                break;
            }
            if consumed + length > ring.capacity() {
                return Err(LibError::status_with_context(Status::DataFormat, "record length exceeds ring"));
            }

            let mut reversed = vec![0u8; length as usize];
            walker.read(|_| {}, &mut reversed)?;
            consumed += length;

            reversed.reverse();
            if checksum_xor8(&reversed) != checksum {
                return Err(LibError::status_with_context(Status::Protocol, "record checksum mismatch"));
            }

            if reversed.len() < FINGERPRINT_LEN {
                return Err(LibError::status_with_context(Status::DataFormat, "record shorter than fingerprint"));
            }
            let fingerprint = Fingerprint::try_from(&reversed[0..FINGERPRINT_LEN])?;
            if !self.fingerprint.is_empty() && fingerprint == self.fingerprint {
                break;
            }

            events.emit(Event::Progress(Progress { current: consumed, maximum: ring.capacity() }));

            if !callback(&reversed, &fingerprint) {
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

    fn record_bytes(data: &[u8]) -> Vec<u8> {
        // Wire layout, low to high address: [data][length_be(2)][checksum(1)].
        let mut bytes = data.to_vec();
        bytes.extend_from_slice(&(data.len() as u16).to_be_bytes());
        bytes.push(checksum_xor8(data));
        bytes
    }

    #[test]
    fn big_endian_trailer_decodes_via_little_endian_read_when_walked_backward() {
        let data = [1u8, 2, 3, 4, 5];
        let record = record_bytes(&data);

        // record = [..data][length_hi][length_lo][checksum]
        let checksum = record[record.len() - 1];
        let length_field = [record[record.len() - 2], record[record.len() - 3]];
        // Backward byte order from the checksum: [byte at addr-2, byte at addr-3]
        // = [length_lo, length_hi], i.e. the big-endian field read in little-endian order.
        assert_eq!(array_uint16_le(&length_field), data.len() as u16);
        assert_eq!(checksum, checksum_xor8(&data));
    }

    #[test]
    fn set_fingerprint_rejects_wrong_length() {
        let mut driver = SuuntoVyper::new();
        let bad = Fingerprint::try_from([1, 2, 3].as_slice()).unwrap();
        assert!(driver.set_fingerprint(bad).is_err());
    }

    #[test]
    fn open_reads_devinfo_and_head_pointer() {
        let mut stream = LoopbackStream::new();
        stream.push_reply(&[0x01, 0x02, 0x34, 0x12]);
        stream.push_reply(&[0x00, 0x10]);

        let mut driver = SuuntoVyper::new();
        let mut events = Events::default();
        let mut cancel = || false;
        driver.open(&mut stream, &mut events, &mut cancel).unwrap();

        assert_eq!(driver.head, 0x1000);
    }
}
