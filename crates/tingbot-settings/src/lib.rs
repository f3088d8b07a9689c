//! Tingbot Settings Crate
//!
//! Handles controller configuration: which modules to start, backlight
//! range and animation, button wiring, and how to reach the GPIO tool.

pub mod config;
pub mod error;

pub use config::{BacklightSettings, ButtonSettings, Config, HardwareSettings, Module};
pub use error::{Result, SettingsError};
