//! MPU region manager.
//!
//! Programs the eight ARMv7-M MPU regions. Region 0 is reserved by the
//! `exception` crate for the kernel-stack-overflow guard; everything else is
//! available to board integration code through [`Mpu::enable_region`].

use cortex_m::peripheral::MPU;

use crate::sections::{section_containing, MemorySection};

pub const REGION_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpuError {
    NotSupported,
    InvalidIndex,
    InvalidArgument,
    InvalidAccessCombination,
    InvalidAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    NoAccess,
    ReadOnly,
    ReadWrite,
}

/// One region's desired configuration, validated and programmed by
/// [`Mpu::enable_region`].
#[derive(Debug, Clone, Copy)]
pub struct MpuRegion {
    pub base_address: u32,
    /// Region covers `2.pow(size_log2)` bytes; must be >= 5 (32 B).
    pub size_log2: u8,
    pub access_privileged: Access,
    pub access_unprivileged: Access,
    pub instruction_accessible: bool,
}

/// Encodes the legal (privileged, unprivileged) combinations from the
/// access matrix into the hardware AP field. Any pairing not in this table
/// is rejected.
fn access_permission_bits(p: Access, u: Access) -> Result<u32, MpuError> {
    use Access::*;
    match (p, u) {
        (NoAccess, NoAccess) => Ok(0b000),
        (ReadWrite, NoAccess) => Ok(0b001),
        (ReadWrite, ReadOnly) => Ok(0b010),
        (ReadWrite, ReadWrite) => Ok(0b011),
        (ReadOnly, NoAccess) => Ok(0b101),
        (ReadOnly, ReadOnly) => Ok(0b110),
        _ => Err(MpuError::InvalidAccessCombination),
    }
}

/// Whether `base` is aligned to the region size `2.pow(size_log2)`
/// implies by the hardware's RBAR field, which silently truncates any low
/// bits that don't meet this alignment.
fn is_aligned(base: u32, size_log2: u8) -> bool {
    u64::from(base) % (1u64 << size_log2) == 0
}

const RASR_ENABLE: u32 = 1 << 0;
const RASR_XN: u32 = 1 << 28;
const RASR_AP_SHIFT: u32 = 24;
const RASR_S: u32 = 1 << 18; // shareable
const RASR_C: u32 = 1 << 17; // cacheable
const RASR_B: u32 = 1 << 16; // bufferable
const RASR_SIZE_SHIFT: u32 = 1;

const MPU_CTRL_ENABLE: u32 = 1 << 0;
const MPU_CTRL_PRIVDEFENA: u32 = 1 << 2;

/// Owns the MPU peripheral and the board's memory map.
pub struct Mpu {
    mpu: MPU,
    memory_map: &'static [MemorySection],
}

impl Mpu {
    /// Probe the MPU and bring it to a known, fully-disabled state.
    ///
    /// Requires a unified (not split I/D), 8-region MPU, matching the
    /// reference board this kernel targets.
    pub fn init(mut mpu: MPU, memory_map: &'static [MemorySection]) -> Result<Self, MpuError> {
        let mpu_type = mpu.r#type.read();
        let dregion = (mpu_type >> 8) & 0xFF;
        let separate = mpu_type & 0x1;
        if dregion as usize != REGION_COUNT || separate != 0 {
            return Err(MpuError::NotSupported);
        }

        unsafe { mpu.ctrl.write(0) };
        for index in 0..REGION_COUNT as u32 {
            unsafe {
                mpu.rnr.write(index);
                mpu.rasr.write(0);
            }
        }
        cortex_m::asm::dsb();
        cortex_m::asm::isb();

        let mut this = Mpu { mpu, memory_map };
        this.enable_mpu();
        Ok(this)
    }

    // HFNMIENA is deliberately left clear: the MPU must not apply to
    // HardFault/NMI so a bad region configuration can never lock out fault
    // recovery.
    fn enable_mpu(&mut self) {
        unsafe {
            self.mpu.ctrl.write(MPU_CTRL_ENABLE | MPU_CTRL_PRIVDEFENA);
        }
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }

    pub fn enable_region(&mut self, index: usize, region: &MpuRegion) -> Result<(), MpuError> {
        if index >= REGION_COUNT {
            return Err(MpuError::InvalidIndex);
        }
        if region.size_log2 < 5 {
            return Err(MpuError::InvalidArgument);
        }
        // RBAR truncates any base address bits below the region size, so
        // an unaligned base would silently program a different address
        // than requested; reject it instead.
        if !is_aligned(region.base_address, region.size_log2) {
            return Err(MpuError::InvalidAddress);
        }
        let ap = access_permission_bits(region.access_privileged, region.access_unprivileged)?;
        let section = section_containing(self.memory_map, region.base_address)
            .ok_or(MpuError::InvalidAddress)?;

        let mut rasr: u32 = RASR_ENABLE;
        rasr |= ap << RASR_AP_SHIFT;
        rasr |= RASR_C;
        if !section.is_internal {
            rasr |= RASR_B;
        }
        rasr |= RASR_S;
        rasr |= u32::from(region.size_log2 - 1) << RASR_SIZE_SHIFT;
        if !region.instruction_accessible {
            rasr |= RASR_XN;
        }

        unsafe {
            self.mpu.rnr.write(index as u32);
            self.mpu.rasr.write(0); // disable before reprogramming
            self.mpu.rbar.write(region.base_address);
            self.mpu.rasr.write(rasr);
        }
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
        Ok(())
    }

    pub fn disable_region(&mut self, index: usize) -> Result<(), MpuError> {
        if index >= REGION_COUNT {
            return Err(MpuError::InvalidIndex);
        }
        unsafe {
            self.mpu.rnr.write(index as u32);
            self.mpu.rasr.write(0);
        }
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_matrix_accepts_only_the_legal_combinations() {
        use Access::*;
        let legal = [
            (NoAccess, NoAccess),
            (ReadWrite, NoAccess),
            (ReadWrite, ReadOnly),
            (ReadWrite, ReadWrite),
            (ReadOnly, NoAccess),
            (ReadOnly, ReadOnly),
        ];
        for p in [NoAccess, ReadOnly, ReadWrite] {
            for u in [NoAccess, ReadOnly, ReadWrite] {
                let result = access_permission_bits(p, u);
                if legal.contains(&(p, u)) {
                    assert!(result.is_ok(), "{:?}/{:?} should be legal", p, u);
                } else {
                    assert_eq!(result, Err(MpuError::InvalidAccessCombination));
                }
            }
        }
    }

    #[test]
    fn alignment_check_matches_region_size() {
        // A 1 KiB (size_log2 = 10) region must sit on a 1 KiB boundary.
        assert!(is_aligned(0x2000_0400, 10));
        assert!(!is_aligned(0x2000_0001, 10));
        assert!(!is_aligned(0x2000_0200, 10));
        // The minimum region size (32 B, size_log2 = 5) is the finest
        // granularity the check needs to enforce.
        assert!(is_aligned(0x2000_0020, 5));
        assert!(!is_aligned(0x2000_0010, 5));
    }
}
