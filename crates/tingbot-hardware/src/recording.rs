//! In-memory actuator
//!
//! Records every call instead of touching pins. Used by the test suites and
//! for software-only runs where buttons are driven by simulation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tingbot_core::HardwareError;
use tokio::sync::mpsc;

use crate::actuator::{Actuator, EdgeNotification, HardwareResult, PinMode};

#[derive(Debug, Default)]
struct Recorded {
    writes: Vec<(u8, u32)>,
    modes: Vec<(u8, PinMode)>,
    ranges: Vec<u32>,
    levels: HashMap<u8, bool>,
    edges: Option<mpsc::UnboundedSender<EdgeNotification>>,
}

/// Actuator that records calls and lets the caller drive inputs
#[derive(Debug, Default)]
pub struct RecordingActuator {
    recorded: Mutex<Recorded>,
    write_latency: Duration,
    fail_writes: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight count even if the write future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acknowledge writes only after `latency`
    pub fn with_write_latency(latency: Duration) -> Self {
        Self {
            write_latency: latency,
            ..Self::default()
        }
    }

    /// Make subsequent writes fail (after their latency)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// PWM values written so far, in order
    pub fn pwm_writes(&self) -> Vec<u32> {
        self.recorded.lock().writes.iter().map(|&(_, v)| v).collect()
    }

    /// Last PWM value written
    pub fn last_pwm(&self) -> Option<u32> {
        self.recorded.lock().writes.last().map(|&(_, v)| v)
    }

    /// Pin modes that were configured
    pub fn pin_modes(&self) -> Vec<(u8, PinMode)> {
        self.recorded.lock().modes.clone()
    }

    /// PWM ranges that were programmed
    pub fn pwm_ranges(&self) -> Vec<u32> {
        self.recorded.lock().ranges.clone()
    }

    /// Highest number of writes that were outstanding at the same time
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Set the level `read_level` reports for a pin
    pub fn set_level(&self, pin: u8, high: bool) {
        self.recorded.lock().levels.insert(pin, high);
    }

    /// Deliver an edge notification; false if nobody is watching
    pub fn emit_edge(&self, pin: u8, raw: Option<i64>) -> bool {
        match &self.recorded.lock().edges {
            Some(sender) => sender.send(EdgeNotification { pin, raw }).is_ok(),
            None => false,
        }
    }

    /// Set a level and notify, like a real pin changing
    pub fn drive(&self, pin: u8, high: bool) -> bool {
        self.set_level(pin, high);
        self.emit_edge(pin, Some(i64::from(high)))
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn set_pin_mode(&self, pin: u8, mode: PinMode) -> HardwareResult<()> {
        self.recorded.lock().modes.push((pin, mode));
        Ok(())
    }

    async fn set_pwm_range(&self, range: u32) -> HardwareResult<()> {
        self.recorded.lock().ranges.push(range);
        Ok(())
    }

    async fn write_pwm(&self, pin: u8, value: u32) -> HardwareResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.write_latency.is_zero() {
            tokio::time::sleep(self.write_latency).await;
        }
        self.recorded.lock().writes.push((pin, value));

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(HardwareError::write_failed(
                format!("pwm {} {}", pin, value),
                "injected failure",
            ));
        }
        Ok(())
    }

    async fn read_level(&self, pin: u8) -> HardwareResult<bool> {
        // unset pins float high
        Ok(self.recorded.lock().levels.get(&pin).copied().unwrap_or(true))
    }

    fn watch_edges(&self, _pins: &[u8]) -> HardwareResult<mpsc::UnboundedReceiver<EdgeNotification>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.recorded.lock().edges = Some(sender);
        Ok(receiver)
    }
}
