//! Interrupt controller shim: owns the RAM vector table, VTOR, NVIC
//! enable/priority state, and the install/remove slot-ownership machine
//! for IRQ handlers.
//!
//! The five architectural fault handlers (NMI/HardFault/MemManage/
//! BusFault/UsageFault) have a fixed identity for the crate's lifetime —
//! they're wired in once by [`InterruptController::init`] via
//! [`vector::ArchHandlers`] — and are only ever enabled/disabled/
//! re-prioritized, never installed or removed. IRQ slots go through the
//! full `install`/`remove` state machine because their handler identity is
//! driver-supplied and can legitimately come and go.

#![cfg_attr(not(test), no_std)]

pub mod vector;

use cortex_m::peripheral::{NVIC, SCB};
use vector::{ArchHandlers, HandlerFn};

pub use vector::set_no_handler_hook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptError {
    AlreadyInUse,
    NotUsedYet,
    InvalidArgument,
}

/// Implementation-defined number of priority bits; left-justified into the
/// 8-bit priority fields. Four is typical for a Cortex-M4 part.
const PRIO_BITS: u8 = 4;
const LOWEST_PRIORITY: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchException {
    MemManage,
    BusFault,
    UsageFault,
    SvCall,
    PendSv,
    SysTick,
}

/// Owns the NVIC/SCB peripherals and a handle to the RAM vector table
/// (which lives in a fixed-address `static mut` in [`vector`], not inside
/// this struct — see that module's doc comment for why).
pub struct InterruptController {
    scb: SCB,
    nvic: NVIC,
    old_vtor: u32,
    device_int_count: u16,
}

impl InterruptController {
    /// Disable everything, install the RAM table, and point VTOR at it.
    ///
    /// # Safety
    /// `initial_sp` must be the genuine top of the main stack; `scb`/`nvic`
    /// must be the singleton peripherals (not duplicated elsewhere).
    pub unsafe fn init(
        mut scb: SCB,
        mut nvic: NVIC,
        initial_sp: u32,
        handlers: ArchHandlers,
        device_int_count: u16,
    ) -> Self {
        for reg in nvic.icer.iter() {
            reg.write(u32::MAX);
        }
        let old_vtor = scb.vtor.read();

        // Writes the table in place at its static address; VTOR is set to
        // that same fixed address below and never has to track a moving
        // value.
        let table = vector::init_table(initial_sp, handlers);

        const VECTKEY: u32 = 0x05FA << 16;
        const PRIGROUP_NO_SUBPRIORITY: u32 = 0b111 << 8;
        scb.aircr.write(VECTKEY | PRIGROUP_NO_SUBPRIORITY);

        let shcsr = scb.shcsr.read();
        scb.shcsr.write(shcsr & !((1 << 16) | (1 << 17) | (1 << 18)));

        scb.vtor.write(table.as_ptr() as u32);
        cortex_m::asm::dsb();
        cortex_m::asm::isb();

        InterruptController { scb, nvic, old_vtor, device_int_count }
    }

    /// Restore the VTOR value observed before `init`.
    pub fn deinit(&mut self) {
        unsafe { self.scb.vtor.write(self.old_vtor) };
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }

    fn shpr_slot_priority(&mut self, exception_num: usize, priority: u8) {
        let shifted = u32::from(priority) << (8 - PRIO_BITS);
        let byte_index = (exception_num - 4) % 4;
        let reg_index = (exception_num - 4) / 4;
        let mask = !(0xFFu32 << (8 * byte_index));
        let value = shifted << (8 * byte_index);
        unsafe {
            match reg_index {
                0 => self.scb.shpr1.write((self.scb.shpr1.read() & mask) | value),
                1 => self.scb.shpr2.write((self.scb.shpr2.read() & mask) | value),
                _ => self.scb.shpr3.write((self.scb.shpr3.read() & mask) | value),
            }
        }
    }

    /// Enable one of the always-present architectural exceptions at
    /// `priority` (0 = highest, [`LOWEST_PRIORITY`] = lowest).
    pub fn enable_exception(
        &mut self,
        which: ArchException,
        priority: u8,
    ) -> Result<(), InterruptError> {
        if priority > LOWEST_PRIORITY {
            return Err(InterruptError::InvalidArgument);
        }
        use ArchException::*;
        match which {
            MemManage => {
                self.shpr_slot_priority(vector::MEM_MANAGE, priority);
                self.set_shcsr_bit(16, true);
            }
            BusFault => {
                self.shpr_slot_priority(vector::BUS_FAULT, priority);
                self.set_shcsr_bit(17, true);
            }
            UsageFault => {
                self.shpr_slot_priority(vector::USAGE_FAULT, priority);
                self.set_shcsr_bit(18, true);
            }
            SvCall => self.shpr_slot_priority(vector::SVCALL, priority),
            PendSv => self.shpr_slot_priority(vector::PEND_SV, priority),
            SysTick => self.shpr_slot_priority(vector::SYS_TICK, priority),
        }
        Ok(())
    }

    fn set_shcsr_bit(&mut self, bit: u32, value: bool) {
        let cur = self.scb.shcsr.read();
        let next = if value { cur | (1 << bit) } else { cur & !(1 << bit) };
        unsafe { self.scb.shcsr.write(next) };
    }

    pub fn disable_exception(&mut self, which: ArchException) {
        use ArchException::*;
        match which {
            MemManage => self.set_shcsr_bit(16, false),
            BusFault => self.set_shcsr_bit(17, false),
            UsageFault => self.set_shcsr_bit(18, false),
            // SVCall/PendSV/SysTick have no individual enable bit; only
            // priority is meaningful for them here.
            SvCall | PendSv | SysTick => {}
        }
    }

    /// Enable IRQ `irq` at `priority`. Rejects `irq >= DEVICE_INT_COUNT`.
    pub fn enable_irq(&mut self, irq: u16, priority: u8) -> Result<(), InterruptError> {
        if irq >= self.device_int_count || priority > LOWEST_PRIORITY {
            return Err(InterruptError::InvalidArgument);
        }
        let shifted = priority << (8 - PRIO_BITS);
        unsafe {
            self.nvic.ipr[irq as usize].write(shifted);
            self.nvic.iser[(irq / 32) as usize].write(1 << (irq % 32));
        }
        Ok(())
    }

    pub fn disable_irq(&mut self, irq: u16) -> Result<(), InterruptError> {
        if irq >= self.device_int_count {
            return Err(InterruptError::InvalidArgument);
        }
        unsafe { self.nvic.icer[(irq / 32) as usize].write(1 << (irq % 32)) };
        Ok(())
    }

    /// Claim an IRQ slot for `handler`. Fails if the slot is already
    /// claimed by something other than the default handler.
    pub fn install(&mut self, irq: u16, handler: HandlerFn) -> Result<(), InterruptError> {
        if irq >= self.device_int_count {
            return Err(InterruptError::InvalidArgument);
        }
        // Safety: single-threaded access, table outlives this controller.
        let table = unsafe { vector::table_mut() };
        if !table.irq_handler_is_default(irq) {
            return Err(InterruptError::AlreadyInUse);
        }
        unsafe { table.set_irq_handler(irq, handler) };
        Ok(())
    }

    /// Release a previously installed IRQ slot back to the default
    /// handler. Fails if nothing is installed there.
    pub fn remove(&mut self, irq: u16) -> Result<(), InterruptError> {
        if irq >= self.device_int_count {
            return Err(InterruptError::InvalidArgument);
        }
        let table = unsafe { vector::table_mut() };
        if table.irq_handler_is_default(irq) {
            return Err(InterruptError::NotUsedYet);
        }
        unsafe { table.set_irq_handler(irq, vector::handler_default) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // The install/remove state machine and IRQ bounds-check logic are
    // exercised in the `device` and `exception` crates' integration tests,
    // where a synthetic `InterruptController` stand-in is cheaper to build
    // than the real `cortex_m::peripheral` singletons (which this crate
    // intentionally does not mock, since they're only obtainable once on
    // real hardware via `cortex_m::Peripherals::take()`).
}
