//! Backlight brightness controller
//!
//! Owns the brightness range and the current value, and pushes changes to
//! the PWM pin either in one write or as an eased animation.
//!
//! At most one PWM write is outstanding at any time. The slot is a single
//! semaphore permit: animation frames that find it taken are skipped, new
//! requests that find it taken are dropped, and only the final frame of an
//! animation waits for it. The permit is released when a write completes,
//! whether the write succeeded or not.
//!
//! State is optimistic: `current` follows what was requested, not what the
//! hardware confirmed. Failed writes are logged and otherwise ignored.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tingbot_core::{BacklightTopic, Error, EventBus, HardwareError, Result};
use tingbot_settings::BacklightSettings;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::actuator::{Actuator, PinMode};
use crate::easing;

/// Animation sampling period, about 60 frames per second
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Completion callback, called with the settled value
pub type OnDone = Box<dyn FnOnce(u32) + Send + 'static>;

/// What became of a brightness request
#[derive(Debug)]
pub enum BrightnessRequest {
    /// Already at that value; nothing was written or published.
    Unchanged,
    /// A write was in flight; the request was discarded.
    Dropped,
    /// Written in one step.
    Applied(u32),
    /// An animation was started.
    Tweening(TweenHandle),
}

impl BrightnessRequest {
    pub fn is_dropped(&self) -> bool {
        matches!(self, BrightnessRequest::Dropped)
    }
}

/// Completion signal of a running animation
#[derive(Debug)]
pub struct TweenHandle {
    target: u32,
    done: oneshot::Receiver<u32>,
}

impl TweenHandle {
    /// Value the animation is heading to
    pub fn target(&self) -> u32 {
        self.target
    }

    /// Wait for the animation to settle
    ///
    /// Returns `None` if it was superseded by a newer request or shut down.
    pub async fn finished(self) -> Option<u32> {
        self.done.await.ok()
    }
}

/// Snapshot of the controller state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklightState {
    pub min: u32,
    pub max: u32,
    /// Always within `min..=max`.
    pub current: u32,
    pub tweening_enabled: bool,
    pub tween_duration: Duration,
}

impl BacklightState {
    fn clamp(&self, requested: i64) -> u32 {
        requested.clamp(i64::from(self.min), i64::from(self.max)) as u32
    }
}

struct Shared {
    state: Mutex<BacklightState>,
    /// One permit: held while a PWM write is outstanding
    write_slot: Arc<Semaphore>,
    /// Bumped by every accepted request; older animations stop when they see it
    generation: AtomicU64,
    actuator: Arc<dyn Actuator>,
    bus: Arc<EventBus>,
    pin: u8,
}

impl Shared {
    fn write_in_flight(&self) -> bool {
        self.write_slot.available_permits() == 0
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_current(&self, value: u32) {
        self.state.lock().current = value;
    }

    async fn write(&self, value: u32) {
        match self.actuator.write_pwm(self.pin, value).await {
            Ok(()) => tracing::trace!("Backlight pwm {} written", value),
            Err(HardwareError::Unavailable) => {
                tracing::debug!("Backlight pwm {} not written, hardware unavailable", value)
            }
            Err(e) => tracing::warn!("Backlight write failed: {}", e),
        }
    }
}

struct Tween {
    generation: u64,
    from: u32,
    to: u32,
    duration: Duration,
}

/// Brightness controller bound to one PWM pin
pub struct BrightnessController {
    shared: Arc<Shared>,
    tween_task: Mutex<Option<JoinHandle<()>>>,
}

impl BrightnessController {
    /// Create the controller and run the one-time pin setup
    ///
    /// Setup failures are logged; the controller works state-only without
    /// hardware. The backlight is assumed to be at full brightness.
    pub async fn new(
        settings: &BacklightSettings,
        actuator: Arc<dyn Actuator>,
        bus: Arc<EventBus>,
    ) -> Result<Self> {
        let (min, max) = (settings.min_brightness, settings.max_brightness);
        if min >= max {
            return Err(Error::InvalidRange { min, max });
        }

        let pin = settings.pwm_pin;
        if let Err(e) = actuator.set_pin_mode(pin, PinMode::Pwm).await {
            log_setup_failure("pwm mode", &e);
        }
        if let Err(e) = actuator.set_pwm_range(settings.pwm_range).await {
            log_setup_failure("pwm range", &e);
        }

        let state = BacklightState {
            min,
            max,
            current: max,
            tweening_enabled: settings.tweening_enabled,
            tween_duration: settings.tween_duration().max(Duration::from_millis(1)),
        };
        tracing::info!(
            "Backlight on pin {} ({}..={}, tweening {})",
            pin,
            min,
            max,
            state.tweening_enabled
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                write_slot: Arc::new(Semaphore::new(1)),
                generation: AtomicU64::new(0),
                actuator,
                bus,
                pin,
            }),
            tween_task: Mutex::new(None),
        })
    }

    /// Request a new brightness
    ///
    /// The value is clamped into range. With tweening off the value is
    /// written once, published on `backlight` and handed to `on_done`
    /// before this returns. With tweening on an animation is started and
    /// `on_done` runs when it settles.
    pub async fn set_brightness(&self, requested: i64, on_done: Option<OnDone>) -> BrightnessRequest {
        let (target, from, tweening, duration) = {
            let state = self.shared.state.lock();
            (
                state.clamp(requested),
                state.current,
                state.tweening_enabled,
                state.tween_duration,
            )
        };

        if target == from {
            return BrightnessRequest::Unchanged;
        }
        if self.shared.write_in_flight() {
            tracing::debug!("Backlight request {} dropped, write in flight", target);
            return BrightnessRequest::Dropped;
        }

        if !tweening {
            let Ok(permit) = self.shared.write_slot.clone().try_acquire_owned() else {
                return BrightnessRequest::Dropped;
            };
            // stops any animation still between frames
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            self.shared.set_current(target);
            self.shared.write(target).await;
            drop(permit);

            self.shared.bus.emit_backlight(BacklightTopic::Changed, target);
            if let Some(on_done) = on_done {
                on_done(target);
            }
            return BrightnessRequest::Applied(target);
        }

        // frames only move `current` while holding the slot
        let Ok(permit) = self.shared.write_slot.clone().try_acquire_owned() else {
            return BrightnessRequest::Dropped;
        };
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let from = self.shared.state.lock().current;
        drop(permit);
        if target == from {
            return BrightnessRequest::Unchanged;
        }

        let tween = Tween {
            generation,
            from,
            to: target,
            duration,
        };
        let (done_tx, done_rx) = oneshot::channel();
        tracing::debug!("Backlight tween {} -> {} over {:?}", from, target, duration);

        let task = tokio::spawn(run_tween(self.shared.clone(), tween, on_done, done_tx));
        // a superseded animation exits on its own at its next frame
        *self.tween_task.lock() = Some(task);

        BrightnessRequest::Tweening(TweenHandle {
            target,
            done: done_rx,
        })
    }

    /// Current (optimistic) brightness
    pub fn current(&self) -> u32 {
        self.shared.state.lock().current
    }

    /// Allowed range, inclusive
    pub fn range(&self) -> (u32, u32) {
        let state = self.shared.state.lock();
        (state.min, state.max)
    }

    pub fn state(&self) -> BacklightState {
        self.shared.state.lock().clone()
    }

    /// Whether a PWM write is outstanding
    pub fn is_write_in_flight(&self) -> bool {
        self.shared.write_in_flight()
    }

    pub fn tweening_enabled(&self) -> bool {
        self.shared.state.lock().tweening_enabled
    }

    pub fn set_tweening(&self, enabled: bool) {
        self.shared.state.lock().tweening_enabled = enabled;
    }

    pub fn tween_duration(&self) -> Duration {
        self.shared.state.lock().tween_duration
    }

    /// Set the animation length; zero is raised to one millisecond
    pub fn set_tween_duration(&self, duration: Duration) {
        self.shared.state.lock().tween_duration = duration.max(Duration::from_millis(1));
    }

    /// Whether writes reach a physical backlight
    pub fn is_available(&self) -> bool {
        self.shared.actuator.is_available()
    }

    /// Stop any running animation
    pub fn shutdown(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.tween_task.lock().take() {
            task.abort();
        }
        tracing::debug!("Backlight controller shut down");
    }
}

impl Drop for BrightnessController {
    fn drop(&mut self) {
        if let Some(task) = self.tween_task.lock().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for BrightnessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrightnessController")
            .field("pin", &self.shared.pin)
            .field("state", &self.state())
            .field("write_in_flight", &self.is_write_in_flight())
            .finish()
    }
}

fn log_setup_failure(step: &str, error: &HardwareError) {
    if error.is_unavailable() {
        tracing::info!("Backlight {} skipped, hardware unavailable", step);
    } else {
        tracing::warn!("Backlight {} setup failed: {}", step, error);
    }
}

/// Animation driver
///
/// Samples the curve every frame. A sample is applied only when the write
/// slot is free; otherwise it is discarded. The final value always waits
/// for the slot and is published once its write completes.
async fn run_tween(
    shared: Arc<Shared>,
    tween: Tween,
    on_done: Option<OnDone>,
    done: oneshot::Sender<u32>,
) {
    let started = Instant::now();
    let mut frames = tokio::time::interval(FRAME_INTERVAL);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        frames.tick().await;
        if !shared.is_current(tween.generation) {
            tracing::debug!("Backlight tween to {} superseded", tween.to);
            return;
        }

        let progress = started.elapsed().as_secs_f64() / tween.duration.as_secs_f64();
        if progress >= 1.0 {
            break;
        }

        let value = easing::interpolate(tween.from, tween.to, progress);
        if value == shared.state.lock().current {
            continue;
        }
        let Ok(permit) = shared.write_slot.clone().try_acquire_owned() else {
            tracing::trace!("Backlight step {} skipped, write in flight", value);
            continue;
        };
        if !shared.is_current(tween.generation) {
            return;
        }

        shared.set_current(value);
        let step = shared.clone();
        tokio::spawn(async move {
            step.write(value).await;
            step.bus.emit_backlight(BacklightTopic::Tween, value);
            drop(permit);
        });
    }

    let Ok(permit) = shared.write_slot.clone().acquire_owned().await else {
        return;
    };
    if !shared.is_current(tween.generation) {
        return;
    }

    shared.set_current(tween.to);
    shared.write(tween.to).await;
    drop(permit);

    shared.bus.emit_backlight(BacklightTopic::TweenDone, tween.to);
    shared.bus.emit_backlight(BacklightTopic::Changed, tween.to);
    if let Some(on_done) = on_done {
        on_done(tween.to);
    }
    let _ = done.send(tween.to);
}
