//! Debug logger shim: a `defmt` front end gated by the `debug-log`
//! feature, a compiled-out no-op otherwise — the idiomatic replacement for
//! the C kernel's `#define debug_printf(fmt, ...)` no-op branch.

#[macro_export]
macro_rules! klog {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug-log")]
        defmt::info!($($arg)*);
    };
}

#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug-log")]
        defmt::debug!($($arg)*);
    };
}
