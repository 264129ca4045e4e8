//! The terminal failure sink. Every fault handler and every fallible step
//! of [`crate::Kernel::start`] that can't proceed safely ends up here.
//!
//! `kernel_panic` must not allocate and must not touch the device
//! registry — it can be reached from fault context with a corrupted
//! stack, so it only touches `static` globals and raw peripheral
//! registers (via the LED indicator hook, if one was set).

use core::cell::Cell;
use cortex_m::interrupt::{self, Mutex};

static FAULT_INDICATOR: Mutex<Cell<Option<fn()>>> = Mutex::new(Cell::new(None));

/// Register a callback that lights a board's fault LED. Called with
/// interrupts already disabled; keep it to a handful of register writes.
pub fn set_fault_indicator(hook: fn()) {
    interrupt::free(|cs| FAULT_INDICATOR.borrow(cs).set(Some(hook)));
}

pub fn kernel_panic(module: &'static str, error_code: u32) -> ! {
    interrupt::disable();
    if let Some(hook) = interrupt::free(|cs| FAULT_INDICATOR.borrow(cs).get()) {
        hook();
    }
    crate::klog!("KERNEL PANIC asserted by {} module, error code {}", module, error_code);
    loop {
        cortex_m::asm::nop();
    }
}
