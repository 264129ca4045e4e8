//! Memory subsystem: the static memory map, the first-fit heap, and the
//! MPU region manager.
//!
//! `#[cfg(test)]` code below links against `std` so the allocator and MPU
//! matrix logic can be exercised on the host; non-test builds are `no_std`.

#![cfg_attr(not(test), no_std)]

pub mod heap;
pub mod mpu;
pub mod sections;

pub use heap::{heap_stats, init_heap, set_oom_handler, HeapStats};
pub use mpu::{Access, Mpu, MpuError, MpuRegion};
pub use sections::{section_containing, MemorySection};
