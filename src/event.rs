//! The callback bus a device driver reports its progress and side-channel
//! information through, distinct from the single terminal `Result` a call
//! returns (see `SPEC_FULL.md` §9 Design Notes).

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EventMask: u32 {
        const WAITING  = 1 << 0;
        const PROGRESS = 1 << 1;
        const DEVINFO  = 1 << 2;
        const CLOCK    = 1 << 3;
        const VENDOR   = 1 << 4;
    }
}

impl EventMask {
    pub fn all_events() -> Self {
        EventMask::WAITING | EventMask::PROGRESS | EventMask::DEVINFO | EventMask::CLOCK | EventMask::VENDOR
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub current: u32,
    pub maximum: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevInfo {
    pub model: u32,
    pub firmware: u32,
    pub serial: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    pub device_ticks: u32,
    pub system_seconds: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Waiting,
    Progress(Progress),
    DevInfo(DevInfo),
    Clock(Clock),
    Vendor(Vec<u8>),
}

impl Event {
    pub fn mask(&self) -> EventMask {
        match self {
            Event::Waiting => EventMask::WAITING,
            Event::Progress(_) => EventMask::PROGRESS,
            Event::DevInfo(_) => EventMask::DEVINFO,
            Event::Clock(_) => EventMask::CLOCK,
            Event::Vendor(_) => EventMask::VENDOR,
        }
    }
}

/// Installed on a `Device`; filters and forwards events to the caller's
/// callback. Also remembers the most recent `DevInfo`/`Clock`, which a
/// driver's accessors read back from.
#[derive(Default)]
pub struct Events {
    mask: EventMask,
    callback: Option<Box<dyn FnMut(&Event)>>,
    pub(crate) last_devinfo: Option<DevInfo>,
    pub(crate) last_clock: Option<Clock>,
}

impl Events {
    pub fn set<F>(&mut self, mask: EventMask, callback: F)
    where
        F: FnMut(&Event) + 'static,
    {
        self.mask = mask;
        self.callback = Some(Box::new(callback));
    }

    pub fn clear(&mut self) {
        self.mask = EventMask::empty();
        self.callback = None;
    }

    pub fn emit(&mut self, event: Event) {
        match &event {
            Event::DevInfo(info) => self.last_devinfo = Some(info.clone()),
            Event::Clock(clock) => self.last_clock = Some(*clock),
            _ => {}
        }

        if self.mask.contains(event.mask())
            && let Some(callback) = self.callback.as_mut()
        {
            callback(&event);
        }
    }
}
