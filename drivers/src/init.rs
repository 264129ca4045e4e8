//! SecureIoTOS Device Driver Module
//! License : Dual License
//!           - Apache 2.0 for open-source / personal use
//!           - Commercial license required for closed-source use
//! Author: Md Mahbubur Rahman
//! URL: https://m-a-h-b-u-b.github.io
//! GitHub: https://github.com/m-a-h-b-u-b/SecureIoTOS
//!
//! This module serves as the central initialization point for
//! the two example device drivers (GPIO char, RAM block) used to
//! demonstrate the device registry end to end.

use device::DeviceError;
use hal::gpio::GPIO;

use crate::{gpio_driver, ram_block};

/// Bring up and register the example devices. Call after `Kernel::start`
/// has returned, since registration goes through the heap-backed registry.
pub fn init_all(led_pin: GPIO) -> Result<(), DeviceError> {
    gpio_driver::configure(led_pin);
    gpio_driver::register()?;
    ram_block::register()?;
    Ok(())
}
