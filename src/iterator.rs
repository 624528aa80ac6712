//! A pull-driven iterator over a channel, for the one shape this crate
//! actually needs it for: draining [`Sample`](crate::sample::Sample)s a
//! background thread is decoding while the parser itself (and the bytes
//! it borrows) never leaves that thread.

use std::sync::mpsc;

use crate::sample::Sample;

/// Wraps the receiving half of a `Sample` channel as both a blocking and
/// a non-blocking iterator. A thread running `DiveParser::samples_foreach`
/// feeds the sending half; the caller drains this without needing the
/// parser (or the bytes it borrows) to outlive that thread.
pub struct DiveStream {
    receiver: mpsc::Receiver<Sample>,
    finished: bool,
}

impl DiveStream {
    pub fn new(receiver: mpsc::Receiver<Sample>) -> Self {
        Self { receiver, finished: false }
    }

    /// Decode `bytes` with `parser_for` on a background thread and stream
    /// its samples back through a fresh `DiveStream`, so the caller never
    /// has to tie the parser's lifetime to its own. Returns `None` if the
    /// family has no parser in this build.
    pub fn spawn_decode(
        family: crate::Family,
        bytes: Vec<u8>,
    ) -> Option<(std::thread::JoinHandle<()>, Self)> {
        if crate::registry::parser_for(family, &bytes).is_none() {
            return None;
        }

        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            if let Some(parser) = crate::registry::parser_for(family, &bytes) {
                let _ = parser.samples_foreach(&mut |sample| {
                    let _ = tx.send(sample);
                });
            }
        });

        Some((handle, Self::new(rx)))
    }

    /// Return the next sample without blocking; `None` means "nothing
    /// ready right now", not "the stream is over" (check `is_finished`).
    pub fn try_next(&mut self) -> Option<Sample> {
        if self.finished {
            return None;
        }

        match self.receiver.try_recv() {
            Ok(sample) => Some(sample),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.finished = true;
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Iterator for DiveStream {
    type Item = Sample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.receiver.recv() {
            Ok(sample) => Some(sample),
            Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_order_then_finishes() {
        let (tx, rx) = mpsc::channel();
        tx.send(Sample::Time(10)).unwrap();
        tx.send(Sample::Depth(5.0)).unwrap();
        drop(tx);

        let mut stream = DiveStream::new(rx);
        assert_eq!(stream.next(), Some(Sample::Time(10)));
        assert_eq!(stream.next(), Some(Sample::Depth(5.0)));
        assert_eq!(stream.next(), None);
        assert!(stream.is_finished());
    }

    #[test]
    fn try_next_does_not_block_when_empty() {
        let (_tx, rx) = mpsc::channel::<Sample>();
        let mut stream = DiveStream::new(rx);
        assert_eq!(stream.try_next(), None);
        assert!(!stream.is_finished());
    }

    #[test]
    fn spawn_decode_streams_samples_from_a_background_thread() {
        use crate::Family;

        // Tecdiving records: [fingerprint(4)][divetime_le(4)][max_depth_dm_le(2)]
        // [interval_le(2)][samples: depth_dm_le(2), ...].
        let mut bytes = vec![0u8; 4];
        bytes.extend_from_slice(&20u32.to_le_bytes());
        bytes.extend_from_slice(&100u16.to_le_bytes());
        bytes.extend_from_slice(&10u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&100u16.to_le_bytes());

        let (handle, stream) = DiveStream::spawn_decode(Family::TecdivingDivecomputerEu, bytes).unwrap();
        let samples: Vec<Sample> = stream.collect();
        handle.join().unwrap();

        assert_eq!(samples.iter().filter(|s| matches!(s, Sample::Time(_))).count(), 2);
    }
}
