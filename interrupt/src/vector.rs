//! The RAM-resident vector table itself.
//!
//! Slot 0 is a data word (the initial main stack pointer); every other slot
//! holds a handler. Unused IRQ slots point at [`handler_default`], which
//! treats a spurious vector fetch as fatal rather than silently falling
//! through to whatever byte pattern happens to sit in RAM.
//!
//! The table is a fixed-capacity `static mut`, never constructed on the
//! stack and moved: VTOR is written with this static's address, so the
//! table must stay at that address for the rest of the kernel's life. A
//! by-value `VectorTable` returned from a function (and then moved again
//! into a containing struct) would leave VTOR pointing at a stack slot
//! that the next call frame reuses.

use core::cell::RefCell;
use cortex_m::interrupt::{self, Mutex};

pub type HandlerFn = unsafe extern "C" fn();

/// A single table slot. Exactly one of `stack_pointer`/`handler` is the
/// active interpretation, decided purely by the slot's index — slot 0 is
/// never read as a handler and slots 1.. are never read as a stack value.
#[repr(C)]
#[derive(Clone, Copy)]
pub union VectorEntry {
    pub stack_pointer: u32,
    pub handler: HandlerFn,
}

/// Exception number of the first IRQ slot (after the 16 architectural
/// entries reset/NMI/HardFault/... /SysTick).
pub const IRQ_BASE: usize = 16;

pub const MEM_MANAGE: usize = 4;
pub const BUS_FAULT: usize = 5;
pub const USAGE_FAULT: usize = 6;
pub const SVCALL: usize = 11;
pub const PEND_SV: usize = 14;
pub const SYS_TICK: usize = 15;
pub const NMI: usize = 2;
pub const HARD_FAULT: usize = 3;

/// The architecture permits up to 240 external interrupt lines on top of
/// the 16 architectural slots; this crate's table is sized to the
/// architectural maximum rather than a per-board `N`, so it can live as a
/// single `static mut` with a fixed address instead of being threaded
/// through as a const-generic value that would have to be constructed
/// (and thus briefly stack-resident) somewhere.
pub const MAX_VECTORS: usize = 256;

/// Every slot not otherwise claimed is rigged to trip `kernel_panic` rather
/// than execute garbage.
pub unsafe extern "C" fn handler_default() {
    let hook = interrupt::free(|cs| *NO_HANDLER_HOOK.borrow(cs).borrow());
    if let Some(hook) = hook {
        hook();
    }
    loop {
        cortex_m::asm::nop();
    }
}

/// Hook invoked by [`handler_default`]; the kernel crate points this at its
/// panic path so this crate doesn't need to depend on `kernel`.
static NO_HANDLER_HOOK: Mutex<RefCell<Option<fn() -> !>>> = Mutex::new(RefCell::new(None));

pub fn set_no_handler_hook(hook: fn() -> !) {
    interrupt::free(|cs| *NO_HANDLER_HOOK.borrow(cs).borrow_mut() = Some(hook));
}

/// Fixed-identity handlers for the always-present architectural exceptions,
/// supplied by the caller (the `exception` crate owns their bodies; this
/// crate only owns the table that points at them).
#[derive(Clone, Copy)]
pub struct ArchHandlers {
    pub nmi: HandlerFn,
    pub hard_fault: HandlerFn,
    pub mem_manage: HandlerFn,
    pub bus_fault: HandlerFn,
    pub usage_fault: HandlerFn,
}

/// The RAM vector table, [`MAX_VECTORS`] slots wide. VTOR alignment
/// requires the table base to align to the next power of two at or above
/// its byte size; `MAX_VECTORS * 4 == 1024` bytes, hence `align(1024)`.
#[repr(C, align(1024))]
pub struct VectorTable {
    entries: [VectorEntry; MAX_VECTORS],
}

impl VectorTable {
    const fn blank() -> Self {
        VectorTable { entries: [VectorEntry { handler: handler_default }; MAX_VECTORS] }
    }

    /// Reset every slot to its boot identity: entry 0 gets `initial_sp`,
    /// the architectural slots get `handlers`, and every IRQ slot (including
    /// ones left over from a previous `init`) goes back to the default
    /// handler.
    fn install(&mut self, initial_sp: u32, handlers: ArchHandlers) {
        for slot in self.entries[IRQ_BASE..].iter_mut() {
            *slot = VectorEntry { handler: handler_default };
        }
        self.entries[0] = VectorEntry { stack_pointer: initial_sp };
        self.entries[NMI] = VectorEntry { handler: handlers.nmi };
        self.entries[HARD_FAULT] = VectorEntry { handler: handlers.hard_fault };
        self.entries[MEM_MANAGE] = VectorEntry { handler: handlers.mem_manage };
        self.entries[BUS_FAULT] = VectorEntry { handler: handlers.bus_fault };
        self.entries[USAGE_FAULT] = VectorEntry { handler: handlers.usage_fault };
    }

    pub fn as_ptr(&self) -> *const u32 {
        self.entries.as_ptr() as *const u32
    }

    pub fn irq_slot(&self, irq: u16) -> usize {
        IRQ_BASE + irq as usize
    }

    /// # Safety
    /// Caller must not install into an architectural slot and must ensure
    /// no handler currently executing reads this slot mid-write.
    pub unsafe fn set_irq_handler(&mut self, irq: u16, handler: HandlerFn) {
        let slot = self.irq_slot(irq);
        self.entries[slot] = VectorEntry { handler };
    }

    pub fn irq_handler_is_default(&self, irq: u16) -> bool {
        let slot = self.irq_slot(irq);
        unsafe { self.entries[slot].handler as usize == handler_default as usize }
    }
}

/// The one vector table this crate ever points VTOR at. Fixed address for
/// the kernel's entire life — `InterruptController::init` writes into it
/// in place rather than building a table elsewhere and moving it here.
static mut VECTOR_TABLE: VectorTable = VectorTable::blank();

/// # Safety
/// Caller must not retain the returned reference past the call in which it
/// was obtained, and must not call this while another live `&mut` to the
/// table exists. `InterruptController` is the sole caller and only ever
/// uses the reference within a single method body.
pub unsafe fn table_mut() -> &'static mut VectorTable {
    &mut VECTOR_TABLE
}

/// Reinitialize the table in place for `InterruptController::init`.
///
/// # Safety
/// Same obligations as [`table_mut`].
pub unsafe fn init_table(initial_sp: u32, handlers: ArchHandlers) -> &'static mut VectorTable {
    let table = table_mut();
    table.install(initial_sp, handlers);
    table
}
