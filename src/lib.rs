#![deny(unsafe_code)]
#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are in scope for every module
#[macro_use]
mod fmt;

pub mod config;
pub mod display;
pub mod error;
pub mod gps;
pub mod mac;
pub mod payload;
pub mod runner;
pub mod schedule;
pub mod tracker;

#[cfg(feature = "device")]
pub mod lorawan;
#[cfg(feature = "device")]
pub mod pins;

pub use error::{Error, Result};
pub use tracker::{JoinStatus, Tracker};
