//! Logging macros.
//!
//! With the `defmt` feature the macros forward to `defmt`. Otherwise the
//! default `log` feature forwards them to the `log` facade so host builds and
//! tests can pick any logger. With neither, arguments are type-checked and
//! dropped.

#![macro_use]
#![allow(unused_macros)]

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($arg:tt)+) => { ::defmt::trace!($($arg)+) };
}

#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! trace {
    ($($arg:tt)+) => { ::log::trace!(target: "lorawan_mac", $($arg)+) };
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! trace {
    ($($arg:tt)+) => {{ let _ = ::core::format_args!($($arg)+); }};
}

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($arg:tt)+) => { ::defmt::debug!($($arg)+) };
}

#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! debug {
    ($($arg:tt)+) => { ::log::debug!(target: "lorawan_mac", $($arg)+) };
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! debug {
    ($($arg:tt)+) => {{ let _ = ::core::format_args!($($arg)+); }};
}

#[cfg(feature = "defmt")]
macro_rules! info {
    ($($arg:tt)+) => { ::defmt::info!($($arg)+) };
}

#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! info {
    ($($arg:tt)+) => { ::log::info!(target: "lorawan_mac", $($arg)+) };
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! info {
    ($($arg:tt)+) => {{ let _ = ::core::format_args!($($arg)+); }};
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($arg:tt)+) => { ::defmt::warn!($($arg)+) };
}

#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! warn {
    ($($arg:tt)+) => { ::log::warn!(target: "lorawan_mac", $($arg)+) };
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! warn {
    ($($arg:tt)+) => {{ let _ = ::core::format_args!($($arg)+); }};
}

#[cfg(feature = "defmt")]
macro_rules! error {
    ($($arg:tt)+) => { ::defmt::error!($($arg)+) };
}

#[cfg(all(not(feature = "defmt"), feature = "log"))]
macro_rules! error {
    ($($arg:tt)+) => { ::log::error!(target: "lorawan_mac", $($arg)+) };
}

#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! error {
    ($($arg:tt)+) => {{ let _ = ::core::format_args!($($arg)+); }};
}
