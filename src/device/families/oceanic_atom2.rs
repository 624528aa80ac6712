//! Oceanic Atom2: `0xB1 page_lo page_hi` -> `0x5A payload[16] sum8(payload)`,
//! a fixed-size logbook ringbuffer pointing into a separate variable-size
//! profile ringbuffer. The representative "split logbook/profile" carving
//! policy (§4.3).

use crate::array::{array_isequal, array_uint16_le, array_uint32_le, checksum_add8};
use crate::device::{DeviceDriver, DiveCallback};
use crate::error::{LibError, Result};
use crate::event::{DevInfo, Event, Events, Progress};
use crate::fingerprint::Fingerprint;
use crate::iostream::{IoStream, LineSettings, Timeout, read_exact, write_all};
use crate::ringbuffer::RingBuffer;
use crate::ringstream::{Direction, PageSource, RingBufferStream};
use crate::status::Status;

const PAGE_SIZE: u32 = 16;
const LOGBOOK_ENTRY_SIZE: u32 = 8;
const FINGERPRINT_LEN: usize = 4;
const LOGBOOK_STATIC_BEGIN: u32 = 0x0040;
const LOGBOOK_STATIC_END: u32 = 0x0440;

#[derive(Debug, Clone, Copy)]
struct Layout {
    logbook: RingBuffer,
    profile: RingBuffer,
}

pub struct OceanicAtom2 {
    layout: Option<Layout>,
    fingerprint: Fingerprint,
}

impl Default for OceanicAtom2 {
    fn default() -> Self {
        Self::new()
    }
}

impl OceanicAtom2 {
    pub fn new() -> Self {
        Self { layout: None, fingerprint: Fingerprint::empty() }
    }
}

struct WireSource<'a> {
    stream: &'a mut dyn IoStream,
}

impl PageSource for WireSource<'_> {
    fn read_page(&mut self, address: u32, out: &mut [u8]) -> Result<()> {
        assert_eq!(out.len() as u32 % PAGE_SIZE, 0, "reads must be page-aligned");

        let mut offset = 0usize;
        while offset < out.len() {
            let page_addr = address + offset as u32;
            let page_number = page_addr / PAGE_SIZE;
            let command = [0xB1, (page_number & 0xFF) as u8, ((page_number >> 8) & 0xFF) as u8];
            write_all(self.stream, &command)?;

            let mut reply = [0u8; 1 + PAGE_SIZE as usize + 1];
            read_exact(self.stream, &mut reply)?;

            if reply[0] != 0x5A {
                return Err(LibError::status_with_context(Status::Protocol, "expected 0x5A reply header"));
            }
            let payload = &reply[1..1 + PAGE_SIZE as usize];
            let checksum = reply[1 + PAGE_SIZE as usize];
            if checksum_add8(payload) != checksum {
                return Err(LibError::status_with_context(Status::Protocol, "page checksum mismatch"));
            }

            out[offset..offset + PAGE_SIZE as usize].copy_from_slice(payload);
            offset += PAGE_SIZE as usize;
        }

        Ok(())
    }
}

struct Entry {
    header: Vec<u8>,
    profile_addr: u32,
    profile_len: u32,
    fingerprint: Fingerprint,
}

impl DeviceDriver for OceanicAtom2 {
    fn open(&mut self, stream: &mut dyn IoStream, events: &mut Events, cancel: &mut dyn FnMut() -> bool) -> Result<()> {
        stream.configure(LineSettings { baudrate: 38400, ..Default::default() })?;
        stream.set_timeout(Timeout::After(3000))?;

        if cancel() {
            return Err(Status::Cancelled.into());
        }

        write_all(stream, &[0xA5])?;
        let mut handshake = [0u8; 9];
        read_exact(stream, &mut handshake)?;
        if handshake[0] != 0xA5 {
            return Err(LibError::status_with_context(Status::Protocol, "handshake not acknowledged"));
        }

        let model = array_uint16_le(&handshake[1..3]) as u32;
        let serial = array_uint32_le(&handshake[3..7]);
        let firmware = array_uint16_le(&handshake[7..9]) as u32;
        events.emit(Event::DevInfo(DevInfo { model, firmware, serial }));

        let mut pointers = [0u8; PAGE_SIZE as usize];
        WireSource { stream }.read_page(0, &mut pointers)?;

        let mut logbook_begin = array_uint32_le(&pointers[0..4]);
        let mut logbook_end = array_uint32_le(&pointers[4..8]);
        let profile_begin = array_uint32_le(&pointers[8..12]);
        let profile_end = array_uint32_le(&pointers[12..16]);

        if logbook_begin >= logbook_end
            || logbook_begin < LOGBOOK_STATIC_BEGIN
            || logbook_end > LOGBOOK_STATIC_END
        {
            log::warn!("oceanic atom2: logbook pointers out of range, falling back to full ringbuffer");
            logbook_begin = LOGBOOK_STATIC_BEGIN;
            logbook_end = LOGBOOK_STATIC_END;
        }

        self.layout = Some(Layout {
            logbook: RingBuffer::new(logbook_begin, logbook_end),
            profile: RingBuffer::new(profile_begin, profile_end),
        });

        Ok(())
    }

    fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()> {
        if !fingerprint.is_empty() && fingerprint.as_slice().len() != FINGERPRINT_LEN {
            return Err(LibError::InvalidArguments(format!(
                "oceanic atom2 fingerprint must be {FINGERPRINT_LEN} bytes"
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
        let layout = self.layout.ok_or_else(|| LibError::DeviceError("device not open".into()))?;

        events.emit(Event::Progress(Progress { current: 0, maximum: 0 }));

        let mut entries = Vec::new();
        {
            let mut source = WireSource { stream: &mut *stream };
            let mut ring = RingBufferStream::new(
                &mut source,
                PAGE_SIZE,
                PAGE_SIZE * 4,
                layout.logbook,
                layout.logbook.end,
                Direction::Backward,
            );

            let slot_count = layout.logbook.capacity() / LOGBOOK_ENTRY_SIZE;
            for _ in 0..slot_count {
                if cancel() {
                    return Err(Status::Cancelled.into());
                }

                let mut entry = vec![0u8; LOGBOOK_ENTRY_SIZE as usize];
                ring.read(|_| {}, &mut entry)?;

                if array_isequal(&entry, 0xFF) {
                    log::warn!("oceanic atom2: uninitialised logbook entry, stopping");
                    break;
                }

                let fingerprint = Fingerprint::try_from(&entry[0..FINGERPRINT_LEN])?;
                if !self.fingerprint.is_empty() && fingerprint == self.fingerprint {
                    break;
                }

                let profile_addr = layout.profile.begin + array_uint16_le(&entry[4..6]) as u32;
                let profile_len = array_uint16_le(&entry[6..8]) as u32;

                entries.push(Entry { header: entry, profile_addr, profile_len, fingerprint });
            }
        }

        let total: u32 = entries.iter().map(|e| e.profile_len).sum();
        let mut current = 0u32;
        events.emit(Event::Progress(Progress { current, maximum: total }));

        for entry in entries {
            if cancel() {
                return Err(Status::Cancelled.into());
            }

            let mut profile = vec![0u8; entry.profile_len as usize];
            {
                let mut source = WireSource { stream: &mut *stream };
                let mut profile_stream = RingBufferStream::new(
                    &mut source,
                    PAGE_SIZE,
                    PAGE_SIZE * 4,
                    layout.profile,
                    entry.profile_addr,
                    Direction::Forward,
                );
                profile_stream.read(|_| {}, &mut profile)?;
            }

            current += entry.profile_len;
            events.emit(Event::Progress(Progress { current, maximum: total }));

            let mut dive = entry.header;
            dive.extend_from_slice(&profile);

            if !callback(&dive, &entry.fingerprint) {
                break;
            }
        }

        Ok(())
    }
}
