//! Error handling for Tingbot
//!
//! Provides error types for each layer of the controller:
//! - Hardware errors (actuator missing or command failures)
//! - Button errors (bad arguments to the simulation entry points)
//!
//! Hardware errors are absorbed by the components that issue the calls and
//! only show up in logs. Button errors are programming errors and are
//! returned to the caller.
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Hardware error type
///
/// Represents failures of the GPIO/PWM actuator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// Actuator is not present on this host
    #[error("Hardware unavailable on this host")]
    Unavailable,

    /// A hardware command could not be run or exited with an error
    #[error("Hardware command '{command}' failed: {reason}")]
    WriteFailed {
        /// The command that was issued.
        command: String,
        /// Why the command failed.
        reason: String,
    },

    /// A read returned something that could not be interpreted
    #[error("Invalid response from '{command}': {output:?}")]
    InvalidResponse {
        /// The command that was issued.
        command: String,
        /// The raw output.
        output: String,
    },
}

impl HardwareError {
    /// Create a write failure for the given command
    pub fn write_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        HardwareError::WriteFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Check if the actuator is simply missing on this host
    pub fn is_unavailable(&self) -> bool {
        matches!(self, HardwareError::Unavailable)
    }
}

/// Button error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ButtonError {
    /// Button index outside 0..=3
    #[error("Invalid button number {number}, expected 0..={max}")]
    InvalidArgument {
        /// The number that was passed.
        number: usize,
        /// The highest valid index.
        max: usize,
    },

    /// No button is wired to the given pin
    #[error("No button on pin {pin}")]
    UnknownPin {
        /// The pin that was reported.
        pin: u8,
    },
}

/// Main error type for Tingbot
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Hardware error
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// Button error
    #[error(transparent)]
    Button(#[from] ButtonError),

    /// Brightness bounds that cannot hold a value
    #[error("Invalid brightness range {min}..={max}")]
    InvalidRange {
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },

    /// Configuration rejected at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation on a module that was not started
    #[error("Module '{0}' is not enabled")]
    ModuleDisabled(String),
}

impl Error {
    /// Check if this is a bad-argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::Button(ButtonError::InvalidArgument { .. }))
    }

    /// Check if this is a hardware error
    pub fn is_hardware_error(&self) -> bool {
        matches!(self, Error::Hardware(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
