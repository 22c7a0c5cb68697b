//! # click-drivers
//!
//! Thin `no_std` drivers for MikroElektronika Click boards, written against
//! the `embedded-hal` 1.0 traits. Every driver is self-contained: a `Config`
//! describing bus parameters, a constructor that takes the already-opened
//! bus and pins, an optional `default_cfg` bring-up routine, generic
//! register access and a few device-specific accessors.
//!
//! Drivers live in [`drivers`]; small stateful helpers that sit on top of a
//! driver without owning hardware live in [`middleware`].

#![cfg_attr(not(test), no_std)]

// Must stay first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod bus;
pub mod datetime;
pub mod drivers;
pub mod error;
pub mod middleware;
pub mod onewire;

#[cfg(test)]
mod testing;

pub use datetime::DateTime;
pub use error::{Error, Result};
pub use onewire::{OneWire, OneWireBus, Rom};
