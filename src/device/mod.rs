//! The device driver vtable and the typestate wrapper applications hold.

pub mod families;
pub mod transfer;

use std::marker::PhantomData;

use crate::error::Result;
use crate::event::{Clock, DevInfo, Event, EventMask, Events, Progress};
use crate::fingerprint::Fingerprint;
use crate::iostream::IoStream;
use crate::status::Status;

/// Invoked once per carved dive record during `foreach`. Returning `false`
/// stops iteration early; that is not an error.
pub type DiveCallback<'a> = dyn FnMut(&[u8], &Fingerprint) -> bool + 'a;

/// The operations every family implements; unsupported ones keep the
/// default and return [`Status::Unsupported`].
pub trait DeviceDriver {
    /// Handshake/version query, baud auto-detect, memory layout selection.
    fn open(
        &mut self,
        stream: &mut dyn IoStream,
        events: &mut Events,
        cancel: &mut dyn FnMut() -> bool,
    ) -> Result<()>;

    /// `fingerprint` is empty to reset, or exactly the family's width.
    fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()>;

    fn foreach(
        &mut self,
        stream: &mut dyn IoStream,
        events: &mut Events,
        cancel: &mut dyn FnMut() -> bool,
        callback: &mut DiveCallback,
    ) -> Result<()>;

    fn read(&mut self, _stream: &mut dyn IoStream, _address: u32, _out: &mut [u8]) -> Result<()> {
        Err(Status::Unsupported.into())
    }

    fn write(&mut self, _stream: &mut dyn IoStream, _address: u32, _data: &[u8]) -> Result<()> {
        Err(Status::Unsupported.into())
    }

    /// Raw, address-contiguous dump of on-device memory into `buffer`,
    /// independent of the record-carving `foreach` path. Families whose
    /// native tooling exposes a flat memory read (e.g. Reefnet Sensus)
    /// override this; ring-buffer families leave it unsupported.
    fn dump(&mut self, _stream: &mut dyn IoStream, _buffer: &mut [u8]) -> Result<()> {
        Err(Status::Unsupported.into())
    }

    /// `epoch_seconds` is UTC; families without a timezone field ignore
    /// the distinction and fall back to their legacy encoding.
    fn timesync(&mut self, _stream: &mut dyn IoStream, _epoch_seconds: i64) -> Result<()> {
        Err(Status::Unsupported.into())
    }

    fn close(&mut self, _stream: &mut dyn IoStream) -> Result<()> {
        Ok(())
    }
}

pub trait DeviceState {}

pub struct DeviceDisconnected;
pub struct DeviceConnected;

impl DeviceState for DeviceDisconnected {}
impl DeviceState for DeviceConnected {}

/// Owns a borrowed stream plus a family driver, typed by connection state
/// so `foreach`/`read`/`write` are only callable once `connect` succeeded.
pub struct Device<'io, S: DeviceState> {
    stream: &'io mut dyn IoStream,
    driver: Box<dyn DeviceDriver + 'io>,
    events: Events,
    cancel: Option<Box<dyn FnMut() -> bool + 'io>>,
    fingerprint: Fingerprint,
    _state: PhantomData<S>,
}

impl<'io> Device<'io, DeviceDisconnected> {
    pub fn new(driver: Box<dyn DeviceDriver + 'io>, stream: &'io mut dyn IoStream) -> Self {
        Self {
            stream,
            driver,
            events: Events::default(),
            cancel: None,
            fingerprint: Fingerprint::empty(),
            _state: PhantomData,
        }
    }

    pub fn set_cancel<F>(mut self, cancel: F) -> Self
    where
        F: FnMut() -> bool + 'io,
    {
        self.cancel = Some(Box::new(cancel));
        self
    }

    pub fn connect(mut self) -> Result<Device<'io, DeviceConnected>> {
        {
            let mut no_cancel = || false;
            let cancel: &mut dyn FnMut() -> bool = match self.cancel.as_deref_mut() {
                Some(cb) => cb,
                None => &mut no_cancel,
            };
            self.driver.open(self.stream, &mut self.events, cancel)?;
        }

        // `self` carries a `Drop` impl (it runs `driver.close` on disconnect),
        // which forbids partially moving its fields out by value. Move them
        // out manually via `ManuallyDrop` instead so the old typestate is
        // never actually dropped (its resources just transfer to the new one).
        let this = std::mem::ManuallyDrop::new(self);
        // SAFETY: `this` is `ManuallyDrop`, so it is never dropped and these
        // fields are never read again through `this` after being read here.
        let stream = unsafe { std::ptr::read(&this.stream) };
        let driver = unsafe { std::ptr::read(&this.driver) };
        let events = unsafe { std::ptr::read(&this.events) };
        let cancel = unsafe { std::ptr::read(&this.cancel) };
        let fingerprint = this.fingerprint;

        Ok(Device {
            stream,
            driver,
            events,
            cancel,
            fingerprint,
            _state: PhantomData,
        })
    }
}

impl<'io> Device<'io, DeviceConnected> {
    pub fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()> {
        self.driver.set_fingerprint(fingerprint)?;
        self.fingerprint = fingerprint;
        Ok(())
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn set_events<F>(&mut self, mask: EventMask, callback: F)
    where
        F: FnMut(&Event) + 'static,
    {
        self.events.set(mask, callback);
    }

    pub fn set_cancel<F>(&mut self, cancel: F)
    where
        F: FnMut() -> bool + 'io,
    {
        self.cancel = Some(Box::new(cancel));
    }

    pub fn foreach(&mut self, callback: &mut DiveCallback) -> Result<()> {
        let mut no_cancel = || false;
        let cancel: &mut dyn FnMut() -> bool = match self.cancel.as_deref_mut() {
            Some(cb) => cb,
            None => &mut no_cancel,
        };
        self.driver.foreach(self.stream, &mut self.events, cancel, callback)
    }

    pub fn read(&mut self, address: u32, out: &mut [u8]) -> Result<()> {
        self.driver.read(self.stream, address, out)
    }

    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.driver.write(self.stream, address, data)
    }

    pub fn dump(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.driver.dump(self.stream, buffer)
    }

    pub fn timesync(&mut self, epoch_seconds: i64) -> Result<()> {
        self.driver.timesync(self.stream, epoch_seconds)
    }

    pub fn devinfo(&self) -> Option<&DevInfo> {
        self.events.last_devinfo.as_ref()
    }

    pub fn clock(&self) -> Option<&Clock> {
        self.events.last_clock.as_ref()
    }
}

impl<'io, S: DeviceState> Drop for Device<'io, S> {
    fn drop(&mut self) {
        let _ = self.driver.close(self.stream);
    }
}

/// Paged read of `[begin, end)`, emitting one `Progress` event per page.
/// Shared by any family whose `read`/`dump` is a simple linear walk (as
/// opposed to the ring-carving `foreach` path, which uses
/// [`crate::ringstream::RingBufferStream`] directly).
pub fn dump_read(
    events: &mut Events,
    page_size: u32,
    begin: u32,
    end: u32,
    cancel: &mut dyn FnMut() -> bool,
    mut read_page: impl FnMut(u32, &mut [u8]) -> Result<()>,
) -> Result<Vec<u8>> {
    let total = end - begin;
    let mut out = vec![0u8; total as usize];
    let mut current = begin;
    events.emit(Event::Progress(Progress { current: 0, maximum: total }));

    while current < end {
        if cancel() {
            return Err(Status::Cancelled.into());
        }
        let len = page_size.min(end - current);
        let offset = (current - begin) as usize;
        read_page(current, &mut out[offset..offset + len as usize])?;
        current += len;
        events.emit(Event::Progress(Progress { current: current - begin, maximum: total }));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iostream::LoopbackStream;

    struct NullDriver {
        opened: bool,
    }

    impl DeviceDriver for NullDriver {
        fn open(&mut self, _stream: &mut dyn IoStream, _events: &mut Events, _cancel: &mut dyn FnMut() -> bool) -> Result<()> {
            self.opened = true;
            Ok(())
        }

        fn set_fingerprint(&mut self, _fingerprint: Fingerprint) -> Result<()> {
            Ok(())
        }

        fn foreach(
            &mut self,
            _stream: &mut dyn IoStream,
            _events: &mut Events,
            _cancel: &mut dyn FnMut() -> bool,
            callback: &mut DiveCallback,
        ) -> Result<()> {
            callback(&[1, 2, 3], &Fingerprint::empty());
            Ok(())
        }
    }

    #[test]
    fn connect_invokes_driver_open() {
        let mut stream = LoopbackStream::new();
        let driver = Box::new(NullDriver { opened: false });
        let device = Device::new(driver, &mut stream);
        let connected = device.connect().unwrap();
        drop(connected);
    }

    #[test]
    fn foreach_reaches_the_callback() {
        let mut stream = LoopbackStream::new();
        let driver = Box::new(NullDriver { opened: false });
        let mut device = Device::new(driver, &mut stream).connect().unwrap();

        let mut seen = None;
        device
            .foreach(&mut |bytes, _fp| {
                seen = Some(bytes.to_vec());
                true
            })
            .unwrap();

        assert_eq!(seen, Some(vec![1, 2, 3]));
    }

    /// Holds dives newest-first and honors a set fingerprint the way the
    /// real family drivers do: stop as soon as the known fingerprint is
    /// reached, since everything older was already downloaded.
    struct FingerprintDriver {
        dives: Vec<(Vec<u8>, Fingerprint)>,
        fingerprint: Fingerprint,
    }

    impl DeviceDriver for FingerprintDriver {
        fn open(&mut self, _stream: &mut dyn IoStream, _events: &mut Events, _cancel: &mut dyn FnMut() -> bool) -> Result<()> {
            Ok(())
        }

        fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<()> {
            self.fingerprint = fingerprint;
            Ok(())
        }

        fn foreach(
            &mut self,
            _stream: &mut dyn IoStream,
            _events: &mut Events,
            _cancel: &mut dyn FnMut() -> bool,
            callback: &mut DiveCallback,
        ) -> Result<()> {
            for (bytes, fingerprint) in &self.dives {
                if !self.fingerprint.is_empty() && *fingerprint == self.fingerprint {
                    break;
                }
                if !callback(bytes, fingerprint) {
                    break;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn fingerprint_of_newest_dive_makes_the_next_pass_return_nothing() {
        let newest = Fingerprint::try_from([0xAA, 0xBB, 0xCC, 0xDD].as_slice()).unwrap();
        let older = Fingerprint::try_from([0x01, 0x02, 0x03, 0x04].as_slice()).unwrap();
        let driver = Box::new(FingerprintDriver {
            dives: vec![(vec![9, 9], newest), (vec![1, 1], older)],
            fingerprint: Fingerprint::empty(),
        });

        let mut stream = LoopbackStream::new();
        let mut device = Device::new(driver, &mut stream).connect().unwrap();

        let mut first_pass = Vec::new();
        device
            .foreach(&mut |bytes, fingerprint| {
                first_pass.push((bytes.to_vec(), *fingerprint));
                true
            })
            .unwrap();
        assert_eq!(first_pass.len(), 2);

        let newest_fingerprint = first_pass[0].1;
        device.set_fingerprint(newest_fingerprint).unwrap();

        let mut second_pass = Vec::new();
        device
            .foreach(&mut |bytes, fingerprint| {
                second_pass.push((bytes.to_vec(), *fingerprint));
                true
            })
            .unwrap();
        assert!(second_pass.is_empty());
    }

    #[test]
    fn dump_forwarder_reaches_the_driver_default() {
        let mut stream = LoopbackStream::new();
        let driver = Box::new(NullDriver { opened: false });
        let mut device = Device::new(driver, &mut stream).connect().unwrap();

        let mut buffer = [0u8; 4];
        let err = device.dump(&mut buffer).unwrap_err();
        assert!(matches!(err, crate::error::LibError::Status(Status::Unsupported, _)));
    }

    #[test]
    fn dump_read_reports_monotonic_progress() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut events = Events::default();
        let progress = Rc::new(RefCell::new(Vec::new()));
        events.set(EventMask::PROGRESS, {
            let progress = progress.clone();
            move |event| {
                if let Event::Progress(p) = event {
                    progress.borrow_mut().push((p.current, p.maximum));
                }
            }
        });

        let mut cancel = || false;
        let data = dump_read(&mut events, 4, 0, 10, &mut cancel, |addr, out| {
            for (i, b) in out.iter_mut().enumerate() {
                *b = (addr as usize + i) as u8;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(data, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let recorded = progress.borrow();
        assert_eq!(recorded.first(), Some(&(0, 10)));
        assert_eq!(recorded.last(), Some(&(10, 10)));
        assert!(recorded.windows(2).all(|w| w[0].0 <= w[1].0));
    }
}
