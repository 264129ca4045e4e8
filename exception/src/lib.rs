//! Fault handler set: NMI/HardFault/MemManage/BusFault/UsageFault, plus the
//! init sequence that arms the kernel-stack-overflow guard (MPU region 0)
//! and enables the three programmable fault exceptions.
//!
//! The five `extern "C"` entry points below are intentionally thin: they
//! read the relevant status register(s), hand the raw bits to the pure
//! decoders in [`decode`], log the decoded reason, and escalate. All of the
//! interesting decode logic is in `decode`, where it can be unit-tested
//! without a real fault. NMI and HardFault additionally disable the MPU
//! first, so a bad region configuration can't itself block recovery.

#![cfg_attr(not(test), no_std)]

pub mod decode;

use core::cell::Cell;
use cortex_m::interrupt::{self, Mutex};
use cortex_m::peripheral::{MPU, SCB};

use interrupt::{ArchException, InterruptController};
use memory::{Access, Mpu, MpuError, MpuRegion};

/// Logs a decoded fault reason through `defmt` when the `debug-log`
/// feature is on; compiles away to nothing otherwise. Kept local rather
/// than reused from `kernel::log` so this crate doesn't depend on `kernel`.
macro_rules! elog {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug-log")]
        defmt::warn!($($arg)*);
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionError {
    HandlerInstallFailed,
    HandlerDeinstallFailed,
    Nmi,
    HardFault,
    MemManageFault,
    BusFault,
    UsageFault,
}

impl From<MpuError> for ExceptionError {
    fn from(_: MpuError) -> Self {
        ExceptionError::HandlerInstallFailed
    }
}

/// Size of the kernel-stack-overflow guard region, in bytes. Must match
/// the `size_log2 = 5` (32 B) region programmed into MPU slot 0.
const GUARD_SIZE: u32 = 32;

/// Hook the kernel installs at boot: escalates a decoded fault to the
/// terminal panic sink. Kept as a hook (rather than a direct call into the
/// `kernel` crate) so `exception` doesn't depend on `kernel`.
static PANIC_HOOK: Mutex<Cell<Option<fn(&'static str, u32) -> !>>> = Mutex::new(Cell::new(None));

/// Low end of the guarded kernel stack, latched once by [`init`].
static STACK_END: Mutex<Cell<u32>> = Mutex::new(Cell::new(0));

pub fn set_panic_hook(hook: fn(&'static str, u32) -> !) {
    interrupt::free(|cs| PANIC_HOOK.borrow(cs).set(Some(hook)));
}

fn escalate(error: ExceptionError) -> ! {
    let hook = interrupt::free(|cs| PANIC_HOOK.borrow(cs).get());
    match hook {
        Some(hook) => hook("exception", error as u32),
        None => loop {
            cortex_m::asm::nop();
        },
    }
}

/// Arm the three programmable faults and the stack-overflow guard.
///
/// `stack_end` is the lowest address of the kernel's main stack (the
/// `_stackEnd` linker symbol); the guard covers `[stack_end, stack_end +
/// 32)` with no access at all, privileged or not.
pub fn init(
    interrupts: &mut InterruptController,
    mpu: Option<&mut Mpu>,
    stack_end: u32,
) -> Result<(), ExceptionError> {
    interrupt::free(|cs| STACK_END.borrow(cs).set(stack_end));

    configure_ccr();

    interrupts
        .enable_exception(ArchException::MemManage, 0)
        .map_err(|_| ExceptionError::HandlerInstallFailed)?;
    interrupts
        .enable_exception(ArchException::BusFault, 0)
        .map_err(|_| ExceptionError::HandlerInstallFailed)?;
    interrupts
        .enable_exception(ArchException::UsageFault, 0)
        .map_err(|_| ExceptionError::HandlerInstallFailed)?;

    if let Some(mpu) = mpu {
        let guard = MpuRegion {
            base_address: stack_end,
            size_log2: 5,
            access_privileged: Access::NoAccess,
            access_unprivileged: Access::NoAccess,
            instruction_accessible: false,
        };
        mpu.enable_region(0, &guard)?;
    }
    Ok(())
}

pub fn deinit(
    interrupts: &mut InterruptController,
    mpu: Option<&mut Mpu>,
) -> Result<(), ExceptionError> {
    if let Some(mpu) = mpu {
        mpu.disable_region(0).map_err(|_| ExceptionError::HandlerDeinstallFailed)?;
    }
    interrupts.disable_exception(ArchException::MemManage);
    interrupts.disable_exception(ArchException::BusFault);
    interrupts.disable_exception(ArchException::UsageFault);
    Ok(())
}

const CCR_UNALIGN_TRP: u32 = 1 << 3;
const CCR_DIV_0_TRP: u32 = 1 << 4;
const CCR_BFHFNMIGN: u32 = 1 << 8;
const CCR_STKALIGN: u32 = 1 << 9;

fn configure_ccr() {
    // SCB is not owned here (InterruptController already holds the
    // singleton); CCR/CFSR/HFSR/MMFAR/BFAR are read through the well-known
    // peripheral base address instead, which is sound because these
    // registers are only ever touched from this module after boot.
    unsafe {
        let scb = &*SCB::PTR;
        let mut ccr = scb.ccr.read();
        ccr &= !(CCR_STKALIGN | CCR_BFHFNMIGN);
        ccr |= CCR_DIV_0_TRP | CCR_UNALIGN_TRP;
        scb.ccr.write(ccr);
    }
}

const MPU_CTRL_ENABLE: u32 = 1 << 0;

/// Clear the MPU's enable bit so a region misconfiguration can't itself
/// lock out recovery from NMI/HardFault. Only called from those two
/// handlers; MemManage/BusFault/UsageFault can be legitimately caused by
/// the MPU doing its job and must not disable it.
unsafe fn disable_mpu() {
    let mpu = &*MPU::PTR;
    let ctrl = mpu.ctrl.read();
    mpu.ctrl.write(ctrl & !MPU_CTRL_ENABLE);
}

/// # Safety
/// Must only be invoked as the vector-table entry for the NMI exception.
#[no_mangle]
pub unsafe extern "C" fn handler_nmi() {
    disable_mpu();
    elog!("NMI");
    escalate(ExceptionError::Nmi)
}

/// # Safety
/// Must only be invoked as the vector-table entry for the HardFault exception.
#[no_mangle]
pub unsafe extern "C" fn handler_hardfault() {
    disable_mpu();
    let hfsr = (*SCB::PTR).hfsr.read();
    let reason = decode::decode_hard_fault(hfsr);
    elog!("HardFault: {}", reason);
    escalate(ExceptionError::HardFault)
}

/// # Safety
/// Must only be invoked as the vector-table entry for the MemManage exception.
#[no_mangle]
pub unsafe extern "C" fn handler_mmufault() {
    let scb = &*SCB::PTR;
    let cfsr = scb.cfsr.read();
    let mmfsr = (cfsr & 0xFF) as u8;
    let mmfar = scb.mmfar.read();
    let stack_end = interrupt::free(|cs| STACK_END.borrow(cs).get());
    let guard = stack_end..(stack_end + GUARD_SIZE);
    let reason = decode::decode_mem_manage(mmfsr, mmfar, guard);
    elog!("MemManage: {}", reason);
    escalate(ExceptionError::MemManageFault)
}

/// # Safety
/// Must only be invoked as the vector-table entry for the BusFault exception.
#[no_mangle]
pub unsafe extern "C" fn handler_busfault() {
    let cfsr = (*SCB::PTR).cfsr.read();
    let bfsr = ((cfsr >> 8) & 0xFF) as u8;
    let reason = decode::decode_bus_fault(bfsr);
    elog!("BusFault: {}", reason);
    escalate(ExceptionError::BusFault)
}

/// # Safety
/// Must only be invoked as the vector-table entry for the UsageFault exception.
#[no_mangle]
pub unsafe extern "C" fn handler_usagefault() {
    let cfsr = (*SCB::PTR).cfsr.read();
    let ufsr = ((cfsr >> 16) & 0xFFFF) as u16;
    let reason = decode::decode_usage_fault(ufsr);
    elog!("UsageFault: {}", reason);
    escalate(ExceptionError::UsageFault)
}
