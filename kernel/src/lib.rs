//! Kernel bootstrap: the reset-time sequence that brings up the memory
//! subsystem, the interrupt controller, the fault handlers, and the
//! device registry, in that order, then hands control to the idle loop.
//!
//! The reset vector itself is external (board integration owns it, per
//! [`crate`]'s scope); all this crate provides is `Kernel::start`, which a
//! board's reset handler calls exactly once.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), feature(alloc_error_handler))]

extern crate alloc;

pub mod config;
pub mod error;
pub mod log;
pub mod panic;

use core::cell::RefCell;
use cortex_m::interrupt::Mutex;
use cortex_m::peripheral::{Peripherals, SCB};

pub use config::BoardConfig;
pub use error::KernelError;

use device::Registry;
use interrupt::vector::ArchHandlers;
use interrupt::InterruptController;
use memory::Mpu;

/// The device catalogue, shared by every driver that publishes or
/// retracts a device after `Kernel::start` has returned.
static DEVICES: Mutex<RefCell<Registry>> = Mutex::new(RefCell::new(Registry::new()));

/// Run `f` with exclusive access to the device registry.
pub fn with_devices<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    cortex_m::interrupt::free(|cs| f(&mut DEVICES.borrow(cs).borrow_mut()))
}

/// The running kernel: the peripherals it owns for their whole lifetime.
/// Constructed once by [`Kernel::start`]; there is no safe way to build a
/// second one (it consumes `cortex_m::Peripherals`, which can only be
/// taken once).
pub struct Kernel {
    pub mpu: Option<Mpu>,
    pub interrupts: InterruptController,
}

fn configure_scr(scb: &mut SCB) {
    const SEVONPEND: u32 = 1 << 4;
    const SLEEPDEEP: u32 = 1 << 2;
    const SLEEPONEXIT: u32 = 1 << 1;
    let scr = scb.scr.read();
    unsafe { scb.scr.write(scr & !(SEVONPEND | SLEEPDEEP | SLEEPONEXIT)) };
}

/// `SCnSCB`/`CPACR` aren't modeled by the `cortex-m` crate's safe API;
/// accessed by fixed address, matching how the reference C kernel reaches
/// them directly rather than through a vendor header this crate doesn't
/// have.
const CPACR: *mut u32 = 0xE000_ED88 as *mut u32;

#[cfg(not(feature = "no-fpu"))]
fn configure_fpu() {
    const CP10_CP11_FULL_ACCESS: u32 = (0b11 << 20) | (0b11 << 22);
    unsafe {
        let cpacr = core::ptr::read_volatile(CPACR);
        core::ptr::write_volatile(CPACR, cpacr | CP10_CP11_FULL_ACCESS);
    }
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

extern "C" {
    static mut _dataStart: u8;
    static mut _dataEnd: u8;
    static _dataSourceStart: u8;
    static mut _bssStart: u8;
    static mut _bssEnd: u8;
}

/// Copies the initialized-data image from flash into RAM and zeroes
/// `.bss`, word at a time. Skipped entirely under the `ram-mode` feature,
/// where the image already runs in place.
#[cfg(not(feature = "ram-mode"))]
unsafe fn copy_data_and_zero_bss() {
    let mut dst = core::ptr::addr_of_mut!(_dataStart) as *mut u32;
    let end = core::ptr::addr_of_mut!(_dataEnd) as *mut u32;
    let mut src = core::ptr::addr_of!(_dataSourceStart) as *const u32;
    while dst < end {
        dst.write_volatile(src.read_volatile());
        dst = dst.add(1);
        src = src.add(1);
    }

    let mut dst = core::ptr::addr_of_mut!(_bssStart) as *mut u32;
    let end = core::ptr::addr_of_mut!(_bssEnd) as *mut u32;
    while dst < end {
        dst.write_volatile(0);
        dst = dst.add(1);
    }
}

impl Kernel {
    /// Disable interrupts, fix up the image (unless `ram-mode`), configure
    /// the SCB control registers, then initialize the MPU (unless
    /// `no-mpu`), the interrupt controller, the fault handlers, the FPU
    /// (unless `no-fpu`), and the heap, in that order.
    ///
    /// # Safety
    /// Must be called exactly once, from the reset path, before any other
    /// kernel code runs and before interrupts are unmasked.
    pub unsafe fn start(board: BoardConfig) -> Result<Self, KernelError> {
        cortex_m::interrupt::disable();

        #[cfg(not(feature = "ram-mode"))]
        copy_data_and_zero_bss();

        let mut peripherals =
            Peripherals::take().ok_or(KernelError::PeripheralsAlreadyTaken)?;
        configure_scr(&mut peripherals.SCB);

        let mut mpu = if cfg!(feature = "no-mpu") {
            None
        } else {
            Some(Mpu::init(peripherals.MPU, board.memory_map)?)
        };

        let arch_handlers = ArchHandlers {
            nmi: exception::handler_nmi,
            hard_fault: exception::handler_hardfault,
            mem_manage: exception::handler_mmufault,
            bus_fault: exception::handler_busfault,
            usage_fault: exception::handler_usagefault,
        };
        let mut interrupts = InterruptController::init(
            peripherals.SCB,
            peripherals.NVIC,
            board.stack_start,
            arch_handlers,
            board.device_int_count,
        );
        interrupt::set_no_handler_hook(|| panic::kernel_panic("interrupt", 0));

        exception::set_panic_hook(panic::kernel_panic);
        exception::init(&mut interrupts, mpu.as_mut(), board.stack_end)
            .map_err(KernelError::from)?;

        #[cfg(not(feature = "no-fpu"))]
        configure_fpu();

        memory::init_heap(board.heap_start, board.heap_size);

        cortex_m::interrupt::enable();
        crate::klog!("Kernel is ready.");

        Ok(Kernel { mpu, interrupts })
    }

    /// Never returns: the idle loop a board's reset handler falls into
    /// after bringing up its own drivers on top of `Kernel::start`.
    pub fn run(self) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}

#[cfg(not(test))]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    let hook = memory::heap::record_oom(layout);
    if let Some(hook) = hook {
        hook(layout);
    }
    panic::kernel_panic("heap", 0)
}
