//! Linearises a wrap-around device memory region into a forward or
//! backward host-side byte stream, fetching in page-aligned bursts.
//!
//! Devices reject reads that aren't aligned to their physical page size,
//! and issuing one tiny read per requested byte would be glacial over a
//! slow transport, so every fetch pulls `chunk_size` bytes (rounded down
//! to a whole number of pages, and clipped so it never crosses the ring's
//! `end`) and serves subsequent `read` calls out of that cache until it is
//! exhausted.

use crate::error::Result;
use crate::ringbuffer::RingBuffer;

/// Issues a single page-aligned physical read at `address`, filling `out`.
/// Implemented by whatever owns the wire protocol for a family (the real
/// device driver, or a fixture in tests).
pub trait PageSource {
    fn read_page(&mut self, address: u32, out: &mut [u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub struct RingBufferStream<'a> {
    source: &'a mut dyn PageSource,
    ring: RingBuffer,
    page_size: u32,
    chunk_size: u32,
    position: u32,
    direction: Direction,
}

impl<'a> RingBufferStream<'a> {
    pub fn new(
        source: &'a mut dyn PageSource,
        page_size: u32,
        chunk_size: u32,
        ring: RingBuffer,
        start_address: u32,
        direction: Direction,
    ) -> Self {
        assert!(chunk_size >= page_size, "chunk_size must cover a whole page");
        assert!(ring.contains(start_address) || start_address == ring.end);

        Self {
            source,
            ring,
            page_size,
            chunk_size,
            position: start_address,
            direction,
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    /// Fill `out` with the next `out.len()` bytes in the stream's
    /// direction, calling `progress(bytes_fetched)` once per physical
    /// transfer issued.
    pub fn read(&mut self, progress: impl FnMut(u32), out: &mut [u8]) -> Result<()> {
        match self.direction {
            Direction::Forward => self.read_forward(progress, out),
            Direction::Backward => self.read_backward(progress, out),
        }
    }

    fn burst_covering(&self, page_start: u32) -> u32 {
        let max_before_end = self.ring.end - page_start;
        let burst = self.chunk_size.min(max_before_end);
        let aligned = burst - (burst % self.page_size);
        aligned.max(self.page_size).min(max_before_end)
    }

    fn fetch(&mut self, page_start: u32, mut progress: impl FnMut(u32)) -> Result<Vec<u8>> {
        let burst = self.burst_covering(page_start);
        let mut buf = vec![0u8; burst as usize];
        self.source.read_page(page_start, &mut buf)?;
        progress(burst);
        Ok(buf)
    }

    fn read_forward(&mut self, mut progress: impl FnMut(u32), out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            let rel = self.position - self.ring.begin;
            let page_start = self.ring.begin + (rel / self.page_size) * self.page_size;
            let buf = self.fetch(page_start, &mut progress)?;

            let mut offset = (self.position - page_start) as usize;
            while filled < out.len() && offset < buf.len() {
                out[filled] = buf[offset];
                filled += 1;
                offset += 1;
                self.position = self.ring.increment(self.position, 1);
            }
        }
        Ok(())
    }

    fn read_backward(&mut self, mut progress: impl FnMut(u32), out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            let addr = self.ring.decrement(self.position, 1);
            let rel = addr - self.ring.begin;
            let page_start = self.ring.begin + (rel / self.page_size) * self.page_size;
            let buf = self.fetch(page_start, &mut progress)?;

            let mut offset = (addr - page_start) as usize;
            loop {
                out[filled] = buf[offset];
                filled += 1;
                self.position = self.ring.decrement(self.position, 1);
                if filled == out.len() || offset == 0 {
                    break;
                }
                offset -= 1;
            }
        }
        Ok(())
    }
}
