//! Cross-module error taxonomy. Each subsystem crate defines its own small
//! error enum (`MpuError`, `ExceptionError`, `InterruptError`,
//! `DeviceError`); `KernelError` is the wrapper used at the one seam where
//! `Kernel::start` has to unify them under a single `?`-able type.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// `cortex_m::Peripherals::take()` returned `None` — `Kernel::start`
    /// was called more than once.
    PeripheralsAlreadyTaken,
    Mpu(memory::MpuError),
    Exception(exception::ExceptionError),
    Interrupt(interrupt::InterruptError),
    Device(device::DeviceError),
}

impl From<memory::MpuError> for KernelError {
    fn from(e: memory::MpuError) -> Self {
        KernelError::Mpu(e)
    }
}

impl From<exception::ExceptionError> for KernelError {
    fn from(e: exception::ExceptionError) -> Self {
        KernelError::Exception(e)
    }
}

impl From<interrupt::InterruptError> for KernelError {
    fn from(e: interrupt::InterruptError) -> Self {
        KernelError::Interrupt(e)
    }
}

impl From<device::DeviceError> for KernelError {
    fn from(e: device::DeviceError) -> Self {
        KernelError::Device(e)
    }
}
