//! Board integration surface: the one value a board crate hands to
//! [`crate::Kernel::start`], replacing the C kernel's preprocessor
//! `#ifdef`/linker-symbol soup with a single typed struct plus Cargo
//! features for the boolean toggles (`no-mpu`, `no-fpu`, `ram-mode`).

use memory::MemorySection;

/// Everything the kernel core needs from the board that isn't an
/// architectural constant: the RAM map, the heap region, the stack
/// bounds, and how many device interrupt lines the chip has.
pub struct BoardConfig {
    pub memory_map: &'static [MemorySection],
    pub heap_start: usize,
    pub heap_size: usize,
    /// Top of the main stack (the initial value placed in vector slot 0).
    pub stack_start: u32,
    /// Lowest address of the main stack; the stack-overflow guard covers
    /// the 32 bytes starting here.
    pub stack_end: u32,
    /// Total vector-table length beyond the 16 architectural entries.
    pub device_int_count: u16,
}
