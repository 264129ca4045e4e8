//! SecureIoTOS Device Driver Module
//! License: Apache 2.0
//! Author: Md Mahbubur Rahman
//! URL: https://m-a-h-b-u-b.github.io
//! GitHub: https://github.com/m-a-h-b-u-b/SecureIoTOS
//!
//! A single-pin GPIO character device: `read` returns one byte (0 or 1,
//! the pin's current level), `write` sets the pin from the low bit of the
//! first byte written. Demonstrates `device::register`/`unregister` end to
//! end without needing a board-specific peripheral beyond a GPIO pin.

use core::cell::Cell;
use cortex_m::interrupt::{self, Mutex};

use device::{Device, DeviceError, DeviceKind};
use hal::gpio::{GpioExt, GPIO};

static PIN: Mutex<Cell<Option<GPIO>>> = Mutex::new(Cell::new(None));

/// Point the device at `pin`. Call before [`register`].
pub fn configure(pin: GPIO) {
    interrupt::free(|cs| PIN.borrow(cs).set(Some(pin)));
}

fn read_fn(_device: &Device, buf: &mut [u8], _offset: usize) -> isize {
    let Some(pin) = interrupt::free(|cs| PIN.borrow(cs).get()) else {
        return -1;
    };
    let Some(slot) = buf.first_mut() else { return 0 };
    *slot = pin.read() as u8;
    1
}

fn write_fn(_device: &Device, buf: &[u8], _offset: usize) -> isize {
    let Some(pin) = interrupt::free(|cs| PIN.borrow(cs).get()) else {
        return -1;
    };
    let Some(&byte) = buf.first() else { return 0 };
    if byte & 1 != 0 {
        pin.set_high();
    } else {
        pin.set_low();
    }
    1
}

pub static DEVICE: Device = Device {
    name: "gpio0",
    number: 0,
    kind: DeviceKind::Char,
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
