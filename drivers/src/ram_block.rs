//! SecureIoTOS Device Driver Module
//! License: Apache 2.0
//! Author: Md Mahbubur Rahman
//! URL: https://m-a-h-b-u-b.github.io
//! GitHub: https://github.com/m-a-h-b-u-b/SecureIoTOS
//!
//! A RAM-backed block device: a fixed-size buffer addressed by byte
//! offset, read and written in whole or in part. The second of the two
//! example drivers demonstrating `device::register`/`unregister`, chosen
//! (per the interrupt module's Open Question on the abandoned SD driver)
//! because it needs no board-specific storage peripheral.

use core::cell::RefCell;
use cortex_m::interrupt::{self, Mutex};

use device::{Device, DeviceError, DeviceKind};

const CAPACITY: usize = 4096;

static DISK: Mutex<RefCell<[u8; CAPACITY]>> = Mutex::new(RefCell::new([0u8; CAPACITY]));

/// Clamp `(offset, buf.len())` against `CAPACITY`, returning the number of
/// bytes the transfer actually covers. Pure, so the copy direction-specific
/// wrappers below are the only code that touches the guarded static.
fn transfer_len(offset: usize, requested: usize) -> usize {
    if offset >= CAPACITY {
        0
    } else {
        requested.min(CAPACITY - offset)
    }
}

fn read_fn(_device: &Device, buf: &mut [u8], offset: usize) -> isize {
    let len = transfer_len(offset, buf.len());
    if len == 0 {
        return 0;
    }
    interrupt::free(|cs| {
        let disk = DISK.borrow(cs).borrow();
        buf[..len].copy_from_slice(&disk[offset..offset + len]);
    });
    len as isize
}

fn write_fn(_device: &Device, buf: &[u8], offset: usize) -> isize {
    let len = transfer_len(offset, buf.len());
    if len == 0 {
        return 0;
    }
    interrupt::free(|cs| {
        let mut disk = DISK.borrow(cs).borrow_mut();
        disk[offset..offset + len].copy_from_slice(&buf[..len]);
    });
    len as isize
}

pub static DEVICE: Device = Device {
    name: "ram0",
    number: 0,
    kind: DeviceKind::Block,
    read: Some(read_fn),
    write: Some(write_fn),
    ioctl: None,
};

pub fn register() -> Result<(), DeviceError> {
    kernel::with_devices(|registry| registry.register(&DEVICE))
}

pub fn unregister() -> Result<(), DeviceError> {
    kernel::with_devices(|registry| registry.unregister(&DEVICE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_transfer_is_unclamped() {
        assert_eq!(transfer_len(10, 4), 4);
    }

    #[test]
    fn offset_past_capacity_clamps_to_zero() {
        assert_eq!(transfer_len(CAPACITY, 4), 0);
        assert_eq!(transfer_len(CAPACITY + 100, 4), 0);
    }

    #[test]
    fn a_request_crossing_the_end_is_truncated() {
        assert_eq!(transfer_len(CAPACITY - 2, 4), 2);
    }
}
