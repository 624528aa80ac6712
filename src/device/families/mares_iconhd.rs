//! Mares Icon HD: a single profile ring addressed by an end-of-profile
//! pointer rather than separate begin/end pointers, read forward starting
//! right after `eop` and wrapping back through `[begin, eop)` — the
//! linearisation [`crate::ringstream::RingBufferStream`] exists for. Dives
//! are then carved out of the linear buffer by a 2-byte LE length prefix
//! instead of a second on-device pointer lookup.

use crate::array::array_uint32_le;
use crate::device::{DeviceDriver, DiveCallback};
use crate::error::{LibError, Result};
use crate::event::{DevInfo, Event, Events, Progress};
use crate::fingerprint::Fingerprint;
use crate::iostream::{IoStream, LineSettings, Timeout, read_exact, write_all};
use crate::ringbuffer::RingBuffer;
use crate::ringstream::{Direction, PageSource, RingBufferStream};
use crate::status::Status;

const PAGE_SIZE: u32 = 0x4000;
const FINGERPRINT_LEN: usize = 8;

pub struct MaresIconHd {
    profile: Option<RingBuffer>,
    eop: u32,
    fingerprint: Fingerprint,
}

impl Default for MaresIconHd {
    fn default() -> Self {
        Self::new()
    }
}

impl MaresIconHd {
    pub fn new() -> Self {
        Self { profile: None, eop: 0, fingerprint: Fingerprint::empty() }
    }
}

struct WireSource<'a> {
    stream: &'a mut dyn IoStream,
}

impl PageSource for WireSource<'_> {
    fn read_page(&mut self, address: u32, out: &mut [u8]) -> Result<()> {
        let command = [0xE7, 0x42];
        let mut addr_bytes = address.to_le_bytes().to_vec();
        let mut len_bytes = (out.len() as u32).to_le_bytes().to_vec();
        let mut full_command = command.to_vec();
        full_command.append(&mut addr_bytes);
        full_command.append(&mut len_bytes);
        write_all(self.stream, &full_command)?;

        read_exact(self.stream, out)
    }
}

impl DeviceDriver for MaresIconHd {
    fn open(&mut self, stream: &mut dyn IoStream, events: &mut Events, cancel: &mut dyn FnMut() -> bool) -> Result<()> {
        stream.configure(LineSettings { baudrate: 115200, ..Default::default() })?;
        stream.set_timeout(Timeout::After(5000))?;

        if cancel() {
            return Err(Status::Cancelled.into());
        }

        write_all(stream, &[0xE7, 0xC2])?;
        let mut info = [0u8; 12];
        read_exact(stream, &mut info)?;

        events.emit(Event::DevInfo(DevInfo {
            model: array_uint32_le(&info[0..4]),
            firmware: array_uint32_le(&info[4..8]),
            serial: array_uint32_le(&info[8..12]),
        }));

        let memory_size = 0x100_0000u32;
        let profile_begin = 0x00A000u32;

        write_all(stream, &[0xE7, 0xA8])?;
        let mut eop_bytes = [0u8; 4];
        read_exact(stream, &mut eop_bytes)?;
        let eop = array_uint32_le(&eop_bytes);
        if !(profile_begin..memory_size).contains(&eop) {
            return Err(LibError::status_with_context(Status::Protocol, "end-of-profile pointer out of range"));
        }

        self.profile = Some(RingBuffer::new(profile_begin, memory_size));
        self.eop = eop;
        Ok(())
    }

    fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()> {
        if !fingerprint.is_empty() && fingerprint.as_slice().len() != FINGERPRINT_LEN {
            return Err(LibError::InvalidArguments(format!(
                "mares icon hd fingerprint must be {FINGERPRINT_LEN} bytes"
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
        let ring = self.profile.ok_or_else(|| LibError::DeviceError("device not open".into()))?;

        let total = ring.capacity();
        events.emit(Event::Progress(Progress { current: 0, maximum: total }));

        let mut source = WireSource { stream };
        let mut linear = RingBufferStream::new(&mut source, PAGE_SIZE, PAGE_SIZE, ring, self.eop, Direction::Forward);

        let mut consumed = 0u32;
        while consumed + 4 <= total {
            if cancel() {
                return Err(Status::Cancelled.into());
            }

            let mut length_bytes = [0u8; 4];
            linear.read(|_| {}, &mut length_bytes)?;
            consumed += 4;

            let length = array_uint32_le(&length_bytes);
            if length == 0 {
                break;
            }
            if consumed + length > total {
                return Err(LibError::status_with_context(Status::DataFormat, "record length exceeds profile ring"));
            }

            let mut record = vec![0u8; length as usize];
            linear.read(|_| {}, &mut record)?;
            consumed += length;

            events.emit(Event::Progress(Progress { current: consumed, maximum: total }));

            if record.len() < FINGERPRINT_LEN {
                return Err(LibError::status_with_context(Status::DataFormat, "record shorter than fingerprint"));
            }
            let fingerprint = Fingerprint::try_from(&record[0..FINGERPRINT_LEN])?;
            if !self.fingerprint.is_empty() && fingerprint == self.fingerprint {
                break;
            }

            if !callback(&record, &fingerprint) {
                break;
            }
        }

        Ok(())
    }
}
