//! The retry-with-classification shape every family's command/response
//! framing shares, even though the actual bytes on the wire differ.
//!
//! ```text
//! Idle --send--> AwaitAck
//! AwaitAck --ACK--> AwaitPayload
//! AwaitAck --NAK+busy, retries<max--> Delay --> Idle
//! AwaitAck --NAK+fatal--> Protocol(err)
//! AwaitPayload --ok--> Idle (return bytes)
//! AwaitPayload --crc mismatch--> Protocol
//! * --io error--> IO ; --timeout--> Timeout ; --cancelled--> Cancelled
//! ```
//!
//! A family driver supplies one `attempt` closure that sends the command
//! and parses whatever came back into a [`Reply`]; this function owns the
//! retry count and the busy-backoff sleep.

use crate::error::{LibError, Result};
use crate::status::Status;

/// What came back from a single send+receive round trip.
pub enum Reply {
    /// The device acknowledged and (if the framing carries one) returned a payload.
    Ack(Vec<u8>),
    /// A transient busy/NAK; worth retrying.
    NakBusy,
    /// A NAK the retry loop should not paper over (unknown command, bad
    /// address, checksum failure after the family's own internal retry).
    NakFatal(String),
}

#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_retries: 9,
            retry_delay_ms: 100,
        }
    }
}

/// Drive one command to completion, retrying transient busy replies up to
/// `config.max_retries` times. `cancel` is polled before the first attempt
/// and before each retry, matching the "cancel is checked at protocol
/// boundaries" contract in `SPEC_FULL.md` §4.2.
pub fn transfer(
    config: TransferConfig,
    cancel: &mut dyn FnMut() -> bool,
    mut sleep: impl FnMut(u32),
    mut attempt: impl FnMut() -> Result<Reply>,
) -> Result<Vec<u8>> {
    if cancel() {
        return Err(Status::Cancelled.into());
    }

    let mut retries = 0;
    loop {
        match attempt()? {
            Reply::Ack(payload) => return Ok(payload),
            Reply::NakFatal(message) => {
                return Err(LibError::status_with_context(Status::Protocol, message));
            }
            Reply::NakBusy => {
                retries += 1;
                if retries > config.max_retries {
                    return Err(LibError::status_with_context(
                        Status::Protocol,
                        format!("device stayed busy past {} retries", config.max_retries),
                    ));
                }
                if cancel() {
                    return Err(Status::Cancelled.into());
                }
                sleep(config.retry_delay_ms);
            }
        }
    }
}
