//! Device registry: the catalogue of published devices and the observers
//! watching it.
//!
//! Both the catalogue and the observer list are singly linked chains of
//! heap-allocated nodes (`Box<Node>`), appended at the tail and walked with
//! a `&mut Option<Box<Node>>` cursor rather than recursion. Allocation
//! failure is surfaced as [`DeviceError::AllocFailed`] rather than
//! aborting, so node allocation goes through a small hand-rolled fallible
//! path instead of `Box::new` (which would call the global
//! `alloc_error_handler` on failure).
//!
//! `Device` records themselves are never owned here — the registry only
//! ever holds `&'static Device` references; the driver that published a
//! device keeps it alive for as long as it stays registered.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::alloc::{alloc, Layout};
use alloc::boxed::Box;
use core::ptr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Block,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Registered,
    Unregistered,
}

pub type ReadFn = fn(&Device, buf: &mut [u8], offset: usize) -> isize;
pub type WriteFn = fn(&Device, buf: &[u8], offset: usize) -> isize;
pub type IoctlFn = fn(&Device, request: u32, arg: usize) -> isize;

/// A published device. Capabilities absent from the driver's implementation
/// are simply `None` — there's no sentinel "unsupported" error path for
/// them, the capability just isn't offered.
pub struct Device {
    pub name: &'static str,
    pub number: u32,
    pub kind: DeviceKind,
    pub read: Option<ReadFn>,
    pub write: Option<WriteFn>,
    pub ioctl: Option<IoctlFn>,
}

/// Notified on every `Registered`/`Unregistered` transition. No captured
/// state — a plain function pointer, consistent with the rest of this
/// kernel's no-closures style.
pub type EventObserver = fn(&'static Device, DeviceEvent);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    InvalidDeviceStructure,
    AllocFailed,
    NotRegistered,
    HandlerNotRegistered,
    NameExists,
}

struct DeviceEntry {
    device: &'static Device,
    next: Option<Box<DeviceEntry>>,
}

struct ObserverEntry {
    observer: EventObserver,
    next: Option<Box<ObserverEntry>>,
}

/// Allocate `T` on the heap without going through `Box::new`, so an
/// out-of-memory condition becomes a `Result::Err` instead of aborting via
/// the global alloc-error handler.
fn try_box<T>(value: T) -> Result<Box<T>, DeviceError> {
    let layout = Layout::new::<T>();
    unsafe {
        let raw = alloc(layout) as *mut T;
        if raw.is_null() {
            return Err(DeviceError::AllocFailed);
        }
        raw.write(value);
        Ok(Box::from_raw(raw))
    }
}

fn validate(device: &Device) -> Result<(), DeviceError> {
    if device.name.is_empty() {
        return Err(DeviceError::InvalidDeviceStructure);
    }
    Ok(())
}

/// The device catalogue plus its observer list.
#[derive(Default)]
pub struct Registry {
    devices: Option<Box<DeviceEntry>>,
    observers: Option<Box<ObserverEntry>>,
}

impl Registry {
    pub const fn new() -> Self {
        Registry { devices: None, observers: None }
    }

    fn key_exists(&self, name: &str, number: u32) -> bool {
        let mut cursor = &self.devices;
        while let Some(entry) = cursor {
            if entry.device.number == number && entry.device.name == name {
                return true;
            }
            cursor = &entry.next;
        }
        false
    }

    fn notify(&self, device: &'static Device, event: DeviceEvent) {
        let mut cursor = &self.observers;
        while let Some(entry) = cursor {
            (entry.observer)(device, event);
            cursor = &entry.next;
        }
    }

    /// Publish `device`. Rejects an invalid structure, a duplicate
    /// `(name, number)`, and surfaces allocation failure; on success,
    /// every observer is notified with `Registered` after the catalogue
    /// append completes.
    pub fn register(&mut self, device: &'static Device) -> Result<(), DeviceError> {
        validate(device)?;
        if self.key_exists(device.name, device.number) {
            return Err(DeviceError::NameExists);
        }
        let entry = try_box(DeviceEntry { device, next: None })?;

        let mut tail = &mut self.devices;
        while tail.is_some() {
            tail = &mut tail.as_mut().unwrap().next;
        }
        *tail = Some(entry);

        self.notify(device, DeviceEvent::Registered);
        Ok(())
    }

    /// Retract `device`, matched by reference identity (not `(name,
    /// number)` — the same pointer that was registered). Observers are
    /// notified with `Unregistered` before the catalogue entry is unlinked
    /// and freed, so they still see a consistent registry while handling
    /// the event.
    pub fn unregister(&mut self, device: &'static Device) -> Result<(), DeviceError> {
        validate(device)?;

        let mut cursor = &mut self.devices;
        loop {
            match cursor {
                None => return Err(DeviceError::NotRegistered),
                Some(entry) if ptr::eq(entry.device, device) => break,
                Some(entry) => cursor = &mut entry.next,
            }
        }

        self.notify(device, DeviceEvent::Unregistered);

        let entry = cursor.take().unwrap();
        *cursor = entry.next;
        Ok(())
    }

    /// Observers may be registered more than once; each registration is
    /// notified independently on every event.
    pub fn register_observer(&mut self, observer: EventObserver) -> Result<(), DeviceError> {
        let entry = try_box(ObserverEntry { observer, next: None })?;
        let mut tail = &mut self.observers;
        while tail.is_some() {
            tail = &mut tail.as_mut().unwrap().next;
        }
        *tail = Some(entry);
        Ok(())
    }

    /// Removes the first occurrence of `observer` (compared by function
    /// pointer equality).
    pub fn unregister_observer(&mut self, observer: EventObserver) -> Result<(), DeviceError> {
        let mut cursor = &mut self.observers;
        loop {
            match cursor {
                None => return Err(DeviceError::HandlerNotRegistered),
                Some(entry) if entry.observer == observer => break,
                Some(entry) => cursor = &mut entry.next,
            }
        }
        let entry = cursor.take().unwrap();
        *cursor = entry.next;
        Ok(())
    }

    /// Shutdown rehearsal: frees every catalogue and observer node without
    /// emitting `Unregistered` events (this is a teardown, not a sequence
    /// of live unregistrations). Safe and idempotent on an empty registry.
    pub fn deinit(&mut self) {
        self.devices = None;
        self.observers = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static REG_COUNT: AtomicUsize = AtomicUsize::new(0);
    static UNREG_COUNT: AtomicUsize = AtomicUsize::new(0);
    static LAST_EVENT: AtomicUsize = AtomicUsize::new(0);

    const DEV_A: Device = Device {
        name: "ttyA",
        number: 0,
        kind: DeviceKind::Char,
        read: None,
        write: None,
        ioctl: None,
    };
    const DEV_B: Device = Device {
        name: "ttyB",
        number: 1,
        kind: DeviceKind::Char,
        read: None,
        write: None,
        ioctl: None,
    };

    fn observer_one(_device: &'static Device, event: DeviceEvent) {
        match event {
            DeviceEvent::Registered => {
                REG_COUNT.fetch_add(1, Ordering::SeqCst);
                LAST_EVENT.store(1, Ordering::SeqCst);
            }
            DeviceEvent::Unregistered => {
                UNREG_COUNT.fetch_add(1, Ordering::SeqCst);
                LAST_EVENT.store(2, Ordering::SeqCst);
            }
        }
    }

    fn observer_two(_device: &'static Device, _event: DeviceEvent) {
        LAST_EVENT.store(3, Ordering::SeqCst);
    }

    #[test]
    fn s4_observers_are_notified_in_registration_order() {
        let mut registry = Registry::new();
        registry.register_observer(observer_one).unwrap();
        registry.register_observer(observer_two).unwrap();
        registry.register(&DEV_A).unwrap();
        // observer_two ran last, so it's the one that last touched LAST_EVENT.
        assert_eq!(LAST_EVENT.load(Ordering::SeqCst), 3);
        registry.unregister(&DEV_A).unwrap();
        let _ = registry.unregister_observer(observer_one);
        let _ = registry.unregister_observer(observer_two);
    }

    #[test]
    fn register_then_unregister_round_trips() {
        let mut registry = Registry::new();
        registry.register_observer(observer_one).unwrap();
        assert!(registry.register(&DEV_A).is_ok());
        assert!(registry.unregister(&DEV_A).is_ok());
        assert_eq!(REG_COUNT.load(Ordering::SeqCst) >= 1, true);
        assert_eq!(UNREG_COUNT.load(Ordering::SeqCst) >= 1, true);
    }

    #[test]
    fn duplicate_name_and_number_rejected() {
        const DUP: Device = Device { name: "ttyA", number: 0, ..DEV_A };
        let mut registry = Registry::new();
        registry.register(&DEV_A).unwrap();
        assert_eq!(registry.register(&DUP), Err(DeviceError::NameExists));
        registry.unregister(&DEV_A).unwrap();
    }

    #[test]
    fn same_name_different_number_is_allowed() {
        // (name, number) is the compound key; two "ttyA" devices
        // disambiguated by number are a legal pairing, not a duplicate.
        const SECOND: Device = Device { name: "ttyA", number: 1, ..DEV_A };
        let mut registry = Registry::new();
        registry.register(&DEV_A).unwrap();
        assert!(registry.register(&SECOND).is_ok());
        registry.unregister(&DEV_A).unwrap();
        registry.unregister(&SECOND).unwrap();
    }

    #[test]
    fn unregister_of_unknown_device_fails() {
        let mut registry = Registry::new();
        assert_eq!(registry.unregister(&DEV_B), Err(DeviceError::NotRegistered));
    }

    #[test]
    fn invalid_structure_rejected() {
        const BAD: Device = Device { name: "", ..DEV_A };
        let mut registry = Registry::new();
        assert_eq!(registry.register(&BAD), Err(DeviceError::InvalidDeviceStructure));
    }

    #[test]
    fn deinit_is_idempotent_on_empty_registry() {
        let mut registry = Registry::new();
        registry.deinit();
        registry.deinit();
    }

    #[test]
    fn duplicate_observers_each_receive_every_event() {
        static COUNT: AtomicUsize = AtomicUsize::new(0);
        fn counting_observer(_d: &'static Device, _e: DeviceEvent) {
            COUNT.fetch_add(1, Ordering::SeqCst);
        }
        let mut registry = Registry::new();
        registry.register_observer(counting_observer).unwrap();
        registry.register_observer(counting_observer).unwrap();
        registry.register(&DEV_A).unwrap();
        assert_eq!(COUNT.load(Ordering::SeqCst), 2);
        registry.unregister(&DEV_A).unwrap();
        assert_eq!(COUNT.load(Ordering::SeqCst), 4);
    }
}
