//! Divesystem iDive/iX3M: `START(0x55) len cmd args[...] crc16be` framed
//! packets, where a busy device NAKs with status `0x60` rather than
//! simply going silent. The reply echoes the command before its payload,
//! so a mismatched echo is treated as a protocol violation rather than
//! trusted blindly. This is the family that exercises the shared
//! [`crate::device::transfer`] retry state machine directly instead of
//! rolling its own.

use crate::array::crc16_ccitt;
use crate::device::transfer::{transfer, Reply, TransferConfig};
use crate::device::{DeviceDriver, DiveCallback};
use crate::error::{LibError, Result};
use crate::event::{DevInfo, Event, Events, Progress};
use crate::fingerprint::Fingerprint;
use crate::iostream::{IoStream, LineSettings, Timeout, read_exact, write_all};
use crate::status::Status;

const START: u8 = 0x55;
const ACK: u8 = 0x06;
const NAK: u8 = 0x15;
const NAK_BUSY_STATUS: u8 = 0x60;
const CRC_INIT: u16 = 0xFFFF;
const FINGERPRINT_LEN: usize = 6;

pub struct DivesystemIdive {
    dive_count: u32,
    fingerprint: Fingerprint,
}

impl Default for DivesystemIdive {
    fn default() -> Self {
        Self::new()
    }
}

impl DivesystemIdive {
    pub fn new() -> Self {
        Self { dive_count: 0, fingerprint: Fingerprint::empty() }
    }
}

fn send_command(stream: &mut dyn IoStream, cmd: u8, payload: &[u8]) -> Result<()> {
    let mut body = vec![payload.len() as u8, cmd];
    body.extend_from_slice(payload);
    let crc = crc16_ccitt(&body, CRC_INIT);

    let mut frame = vec![START];
    frame.extend_from_slice(&body);
    frame.extend_from_slice(&crc.to_be_bytes());
    write_all(stream, &frame)
}

fn command(
    stream: &mut dyn IoStream,
    cancel: &mut dyn FnMut() -> bool,
    cmd: u8,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let stream = std::cell::RefCell::new(stream);

    transfer(
        TransferConfig::default(),
        cancel,
        |ms| stream.borrow_mut().sleep(ms),
        || {
            let mut stream = stream.borrow_mut();
            send_command(&mut **stream, cmd, payload)?;

            let mut echoed_cmd = [0u8; 1];
            read_exact(&mut **stream, &mut echoed_cmd)?;
            if echoed_cmd[0] != cmd {
                return Ok(Reply::NakFatal(format!(
                    "device echoed command 0x{:02X}, expected 0x{cmd:02X}",
                    echoed_cmd[0]
                )));
            }

            let mut length = [0u8; 1];
            read_exact(&mut **stream, &mut length)?;
            let mut body = vec![0u8; length[0] as usize];
            read_exact(&mut **stream, &mut body)?;
            let mut crc_bytes = [0u8; 2];
            read_exact(&mut **stream, &mut crc_bytes)?;

            let mut check = vec![echoed_cmd[0], length[0]];
            check.extend_from_slice(&body);
            if crc16_ccitt(&check, CRC_INIT) != u16::from_be_bytes(crc_bytes) {
                return Ok(Reply::NakFatal("payload crc mismatch".to_string()));
            }

            let mut status = [0u8; 1];
            read_exact(&mut **stream, &mut status)?;

            if status[0] == NAK {
                let mut busy = [0u8; 1];
                read_exact(&mut **stream, &mut busy)?;
                return Ok(if busy[0] == NAK_BUSY_STATUS {
                    Reply::NakBusy
                } else {
                    Reply::NakFatal(format!("device rejected command 0x{cmd:02X} with status 0x{:02X}", busy[0]))
                });
            }
            if status[0] != ACK {
                return Ok(Reply::NakFatal("missing ACK/NAK marker".to_string()));
            }

            Ok(Reply::Ack(body))
        },
    )
}

impl DeviceDriver for DivesystemIdive {
    fn open(&mut self, stream: &mut dyn IoStream, events: &mut Events, cancel: &mut dyn FnMut() -> bool) -> Result<()> {
        stream.configure(LineSettings { baudrate: 115200, ..Default::default() })?;
        stream.set_timeout(Timeout::After(3000))?;

        let info = command(stream, cancel, 0x10, &[])?;
        if info.len() < 6 {
            return Err(LibError::status_with_context(Status::Protocol, "device info reply too short"));
        }
        events.emit(Event::DevInfo(DevInfo {
            model: info[0] as u32,
            firmware: u16::from_be_bytes([info[1], info[2]]) as u32,
            serial: u32::from_be_bytes([0, info[3], info[4], info[5]]),
        }));

        let count = command(stream, cancel, 0x20, &[])?;
        if count.len() < 2 {
            return Err(LibError::status_with_context(Status::Protocol, "dive count reply too short"));
        }
        self.dive_count = u16::from_be_bytes([count[0], count[1]]) as u32;

        Ok(())
    }

    fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()> {
        if !fingerprint.is_empty() && fingerprint.as_slice().len() != FINGERPRINT_LEN {
            return Err(LibError::InvalidArguments(format!(
                "divesystem idive fingerprint must be {FINGERPRINT_LEN} bytes"
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

            let record = command(stream, cancel, 0x21, &(ordinal as u16).to_be_bytes())?;
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
        let mut driver = DivesystemIdive::new();
        let bad = Fingerprint::try_from([1, 2].as_slice()).unwrap();
        assert!(driver.set_fingerprint(bad).is_err());
    }

    fn echoed_reply(cmd: u8, body: &[u8]) -> Vec<u8> {
        let mut reply = vec![cmd, body.len() as u8];
        reply.extend_from_slice(body);
        let crc = crc16_ccitt(&reply, CRC_INIT);
        reply.extend_from_slice(&crc.to_be_bytes());
        reply
    }

    #[test]
    fn command_retries_past_a_busy_nak_then_succeeds() {
        let body = vec![0xAA, 0xBB];

        let mut busy = echoed_reply(0x21, &[]);
        busy.extend_from_slice(&[NAK, NAK_BUSY_STATUS]);

        let mut success = echoed_reply(0x21, &body);
        success.push(ACK);

        let mut stream = LoopbackStream::new();
        stream.push_reply(&busy);
        stream.push_reply(&success);

        let mut cancel = || false;
        let result = command(&mut stream, &mut cancel, 0x21, &[]).unwrap();
        assert_eq!(result, body);
    }

    #[test]
    fn mismatched_echoed_command_is_rejected() {
        let mut reply = echoed_reply(0x99, &[]);
        reply.push(ACK);

        let mut stream = LoopbackStream::new();
        stream.push_reply(&reply);

        let mut cancel = || false;
        let err = command(&mut stream, &mut cancel, 0x21, &[]).unwrap_err();
        assert!(matches!(err, LibError::Status(Status::Protocol, _)));
    }
}
