//! wiringPi `gpio` utility driver
//!
//! Issues one `gpio -g ...` process per call, optionally through `sudo`.
//! Pins are BCM numbers.
//!
//! Supports:
//! - Pin mode and PWM range setup
//! - PWM duty writes
//! - Level reads
//! - Edge waits through `gpio -g wfi <pin> both`

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tingbot_core::HardwareError;
use tingbot_settings::HardwareSettings;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::actuator::{Actuator, EdgeNotification, HardwareResult, PinMode};

/// Pause before re-arming an edge wait that failed
const WFI_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Actuator backed by the `gpio` command-line tool
pub struct GpioCommandActuator {
    program: String,
    use_sudo: bool,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl GpioCommandActuator {
    /// Create a driver from the hardware settings
    pub fn new(settings: &HardwareSettings) -> Self {
        Self {
            program: settings.gpio_command.clone(),
            use_sudo: settings.use_sudo,
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Human readable command line, used in errors and logs
    fn command_line(&self, args: &[String]) -> String {
        let mut line = String::new();
        if self.use_sudo {
            line.push_str("sudo ");
        }
        line.push_str(&self.program);
        line.push_str(" -g");
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = if self.use_sudo {
            let mut command = Command::new("sudo");
            command.arg(&self.program);
            command
        } else {
            Command::new(&self.program)
        };
        command.arg("-g").args(args).kill_on_drop(true);
        command
    }

    /// Run a command to completion and return its stdout
    async fn run(&self, args: &[String]) -> HardwareResult<String> {
        let line = self.command_line(args);
        tracing::trace!("exec: {}", line);

        let output = self
            .command(args)
            .output()
            .await
            .map_err(|e| HardwareError::write_failed(&line, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HardwareError::write_failed(
                &line,
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Block on an edge and report it, forever
    ///
    /// An edge between two waits can be missed; the tracker reads the level
    /// on every notification, so a later edge still settles the state.
    fn spawn_watcher(
        &self,
        pin: u8,
        sender: mpsc::UnboundedSender<EdgeNotification>,
    ) -> JoinHandle<()> {
        let args = vec!["wfi".to_string(), pin.to_string(), "both".to_string()];
        let line = self.command_line(&args);
        let mut command = self.command(&args);

        tokio::spawn(async move {
            loop {
                match command.status().await {
                    Ok(status) if status.success() => {
                        if sender.send(EdgeNotification { pin, raw: None }).is_err() {
                            break;
                        }
                    }
                    Ok(status) => {
                        tracing::warn!("'{}' exited with {}", line, status);
                        tokio::time::sleep(WFI_RETRY_DELAY).await;
                    }
                    Err(e) => {
                        tracing::warn!("'{}' failed: {}", line, e);
                        tokio::time::sleep(WFI_RETRY_DELAY).await;
                    }
                }
                if sender.is_closed() {
                    break;
                }
            }
            tracing::debug!("Edge watcher for pin {} stopped", pin);
        })
    }
}

#[async_trait]
impl Actuator for GpioCommandActuator {
    fn name(&self) -> &str {
        &self.program
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn set_pin_mode(&self, pin: u8, mode: PinMode) -> HardwareResult<()> {
        self.run(&["mode".to_string(), pin.to_string(), mode.to_string()])
            .await
            .map(|_| ())
    }

    async fn set_pwm_range(&self, range: u32) -> HardwareResult<()> {
        self.run(&["pwmr".to_string(), range.to_string()])
            .await
            .map(|_| ())
    }

    async fn write_pwm(&self, pin: u8, value: u32) -> HardwareResult<()> {
        self.run(&["pwm".to_string(), pin.to_string(), value.to_string()])
            .await
            .map(|_| ())
    }

    async fn read_level(&self, pin: u8) -> HardwareResult<bool> {
        let args = ["read".to_string(), pin.to_string()];
        let output = self.run(&args).await?;
        match output.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(HardwareError::InvalidResponse {
                command: self.command_line(&args),
                output: other.to_string(),
            }),
        }
    }

    fn watch_edges(&self, pins: &[u8]) -> HardwareResult<mpsc::UnboundedReceiver<EdgeNotification>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut watchers = self.watchers.lock();
        for &pin in pins {
            watchers.push(self.spawn_watcher(pin, sender.clone()));
        }
        Ok(receiver)
    }
}

impl Drop for GpioCommandActuator {
    fn drop(&mut self) {
        for watcher in self.watchers.lock().drain(..) {
            watcher.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(use_sudo: bool) -> HardwareSettings {
        HardwareSettings {
            gpio_command: "gpio".to_string(),
            use_sudo,
        }
    }

    #[test]
    fn test_command_line() {
        let args = ["pwm".to_string(), "18".to_string(), "1024".to_string()];
        assert_eq!(
            GpioCommandActuator::new(&settings(true)).command_line(&args),
            "sudo gpio -g pwm 18 1024"
        );
        assert_eq!(
            GpioCommandActuator::new(&settings(false)).command_line(&args),
            "gpio -g pwm 18 1024"
        );
    }

    #[tokio::test]
    async fn test_missing_tool_is_write_failure() {
        let actuator = GpioCommandActuator::new(&HardwareSettings {
            gpio_command: "/nonexistent/tingbot-gpio".to_string(),
            use_sudo: false,
        });
        let result = actuator.write_pwm(18, 100).await;
        assert!(matches!(result, Err(HardwareError::WriteFailed { .. })));
    }
}
