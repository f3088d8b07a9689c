//! Hardware actuator interface
//!
//! Defines the async trait the backlight and button components drive, plus
//! the fallback used on hosts without GPIO access.

use async_trait::async_trait;
use std::sync::Arc;
use tingbot_core::HardwareError;
use tingbot_settings::HardwareSettings;
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::gpio::GpioCommandActuator;

/// Result type for actuator calls
pub type HardwareResult<T> = std::result::Result<T, HardwareError>;

/// Pin function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinMode {
    /// Digital input
    Input,
    /// Hardware PWM output
    Pwm,
}

impl PinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinMode::Input => "in",
            PinMode::Pwm => "pwm",
        }
    }
}

impl std::fmt::Display for PinMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A digital input may have changed level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeNotification {
    /// BCM pin that fired.
    pub pin: u8,
    /// Raw sample delivered with the interrupt, if the driver has one.
    pub raw: Option<i64>,
}

/// GPIO/PWM driver
///
/// Calls on an unavailable actuator resolve to
/// [`HardwareError::Unavailable`] instead of failing hard.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Whether calls reach real hardware
    fn is_available(&self) -> bool;

    /// Configure a pin
    async fn set_pin_mode(&self, pin: u8, mode: PinMode) -> HardwareResult<()>;

    /// Program the PWM range (the duty value that means 100%)
    async fn set_pwm_range(&self, range: u32) -> HardwareResult<()>;

    /// Write a PWM duty value; resolves once the driver acknowledged it
    async fn write_pwm(&self, pin: u8, value: u32) -> HardwareResult<()>;

    /// Read the current level of an input pin, `true` for high
    async fn read_level(&self, pin: u8) -> HardwareResult<bool>;

    /// Start delivering edge notifications for the given pins
    fn watch_edges(&self, pins: &[u8]) -> HardwareResult<mpsc::UnboundedReceiver<EdgeNotification>>;
}

/// Actuator for hosts without GPIO access
///
/// Every call resolves to [`HardwareError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableActuator;

#[async_trait]
impl Actuator for UnavailableActuator {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn set_pin_mode(&self, _pin: u8, _mode: PinMode) -> HardwareResult<()> {
        Err(HardwareError::Unavailable)
    }

    async fn set_pwm_range(&self, _range: u32) -> HardwareResult<()> {
        Err(HardwareError::Unavailable)
    }

    async fn write_pwm(&self, _pin: u8, _value: u32) -> HardwareResult<()> {
        Err(HardwareError::Unavailable)
    }

    async fn read_level(&self, _pin: u8) -> HardwareResult<bool> {
        Err(HardwareError::Unavailable)
    }

    fn watch_edges(&self, _pins: &[u8]) -> HardwareResult<mpsc::UnboundedReceiver<EdgeNotification>> {
        Err(HardwareError::Unavailable)
    }
}

/// Pick the actuator for this host
///
/// Uses the `gpio` utility when `gpio -v` runs, otherwise falls back to
/// [`UnavailableActuator`] so the controller still works state-only.
pub async fn probe_actuator(settings: &HardwareSettings) -> Arc<dyn Actuator> {
    if !cfg!(target_os = "linux") {
        tracing::warn!("GPIO is only supported on Linux, running without hardware");
        return Arc::new(UnavailableActuator);
    }

    match Command::new(&settings.gpio_command)
        .arg("-v")
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(output) if output.status.success() => {
            tracing::info!("Using '{}' for GPIO access", settings.gpio_command);
            Arc::new(GpioCommandActuator::new(settings))
        }
        Ok(output) => {
            tracing::warn!(
                "'{} -v' exited with {}, running without hardware",
                settings.gpio_command,
                output.status
            );
            Arc::new(UnavailableActuator)
        }
        Err(e) => {
            tracing::warn!(
                "'{}' not found ({}), running without hardware",
                settings.gpio_command,
                e
            );
            Arc::new(UnavailableActuator)
        }
    }
}
