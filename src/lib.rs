//! USB mass-storage firmware update agent core.
//!
//! The device shows up as a FAT16 volume synthesized on demand ([`ghostfat`]);
//! UF2 blocks written to it are validated and programmed into flash
//! ([`protocol`], [`flasher`]), and the power-up policy in [`bootloader`]
//! picks between application and agent. Hardware sits behind the traits in
//! [`hal`]; a board crate provides those plus the USB transport.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod bootloader;
pub mod config;
pub mod flasher;
pub mod ghostfat;
pub mod hal;
pub mod protocol;
pub mod testing;

pub use bootloader::{BootDecision, ImageFault};
pub use config::BoardConfig;
pub use flasher::WriteFault;
pub use ghostfat::GhostFat;
