//! Button tracker
//!
//! Keeps the pressed/released state of the four buttons and publishes every
//! transition on the event bus under all of its topics.
//!
//! Each edge notification triggers a level read, and the level decides the
//! state. A read that matches the stored state is a no-op, which is what
//! debounces duplicate and noisy interrupts.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;
use tingbot_core::{ButtonError, ButtonEvent, ButtonName, Direction, EventBus, HardwareError};
use tingbot_settings::ButtonSettings;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::actuator::{Actuator, EdgeNotification, PinMode};

/// Number of buttons on the board
pub const BUTTON_COUNT: usize = 4;

/// State of one button
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonState {
    pub number: usize,
    pub pin: u8,
    pub name: ButtonName,
    pub isdown: bool,
    /// Raw level sample behind the last transition.
    pub value: Option<i64>,
    pub changed: DateTime<Utc>,
    pub changed_before: DateTime<Utc>,
}

impl ButtonState {
    fn new(number: usize, pin: u8, name: ButtonName, now: DateTime<Utc>) -> Self {
        Self {
            number,
            pin,
            name,
            isdown: false,
            value: None,
            changed: now,
            changed_before: now,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::from_isdown(self.isdown)
    }

    /// Time between the last two transitions
    ///
    /// Right after a release this is how long the button was held.
    pub fn press_duration(&self) -> chrono::Duration {
        self.changed - self.changed_before
    }

    fn to_event(&self) -> ButtonEvent {
        ButtonEvent {
            number: self.number,
            pin: self.pin,
            name: self.name,
            isdown: self.isdown,
            direction: self.direction(),
            value: self.value,
            changed: self.changed,
            changed_before: self.changed_before,
        }
    }
}

/// Button states plus the transitions recorded while a fan-out was running
struct Board {
    buttons: [ButtonState; BUTTON_COUNT],
    pending: VecDeque<ButtonEvent>,
    publishing: bool,
}

struct Inner {
    /// Serializes transitions across threads. Reentrant so a subscriber can
    /// simulate a press from inside a button handler; such a transition is
    /// queued and published once the current fan-out has finished.
    board: ReentrantMutex<RefCell<Board>>,
    bus: Arc<EventBus>,
    actuator: Arc<dyn Actuator>,
    active_low: bool,
}

/// Clears the publishing flag even if a handler panics
struct Publishing<'a>(&'a RefCell<Board>);

impl Drop for Publishing<'_> {
    fn drop(&mut self) {
        let mut board = self.0.borrow_mut();
        board.publishing = false;
        board.pending.clear();
    }
}

impl Inner {
    /// Raw level that means `isdown` with this wiring
    fn level_for(&self, isdown: bool) -> bool {
        isdown != self.active_low
    }

    fn number_for_pin(&self, pin: u8) -> Option<usize> {
        let guard = self.board.lock();
        let number = guard.borrow().buttons.iter().position(|b| b.pin == pin);
        number
    }

    fn snapshot(&self) -> [ButtonState; BUTTON_COUNT] {
        let guard = self.board.lock();
        let buttons = guard.borrow().buttons.clone();
        buttons
    }

    /// Record a transition and publish it; false if the level did not change
    fn apply(&self, number: usize, isdown: bool, value: Option<i64>) -> bool {
        let guard = self.board.lock();
        let event = {
            let mut board = guard.borrow_mut();
            let button = &mut board.buttons[number];
            if button.isdown == isdown {
                return false;
            }
            button.isdown = isdown;
            button.value = value;
            button.changed_before = button.changed;
            button.changed = Utc::now();
            let event = button.to_event();

            if board.publishing {
                tracing::trace!("Button {} {} queued", event.number, event.direction);
                board.pending.push_back(event);
                return true;
            }
            board.publishing = true;
            event
        };

        let _publishing = Publishing(&*guard);
        let mut next = Some(event);
        while let Some(event) = next {
            tracing::debug!("Button {} ({}) {}", event.number, event.name, event.direction);
            self.bus.emit_button(event);
            next = guard.borrow_mut().pending.pop_front();
        }
        true
    }

    async fn handle_edge(&self, pin: u8, raw: Option<i64>) -> Result<bool, ButtonError> {
        let number = self
            .number_for_pin(pin)
            .ok_or(ButtonError::UnknownPin { pin })?;

        let level = match self.actuator.read_level(pin).await {
            Ok(level) => level,
            Err(e) => match raw {
                Some(raw) => {
                    tracing::debug!("Level read on pin {} failed ({}), using edge sample", pin, e);
                    raw != 0
                }
                None => {
                    log_read_failure(pin, &e);
                    return Ok(false);
                }
            },
        };

        let isdown = level != self.active_low;
        Ok(self.apply(number, isdown, Some(i64::from(level))))
    }
}

fn log_read_failure(pin: u8, error: &HardwareError) {
    if error.is_unavailable() {
        tracing::debug!("Edge on pin {} ignored, hardware unavailable", pin);
    } else {
        tracing::warn!("Edge on pin {} ignored: {}", pin, error);
    }
}

/// Tracker for the four board buttons
pub struct ButtonTracker {
    inner: Arc<Inner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl ButtonTracker {
    /// Configure the pins and start listening for edges
    ///
    /// Without hardware the tracker still works through
    /// [`simulate_down`](Self::simulate_down) and
    /// [`simulate_up`](Self::simulate_up).
    pub async fn new(
        settings: &ButtonSettings,
        actuator: Arc<dyn Actuator>,
        bus: Arc<EventBus>,
    ) -> Self {
        let now = Utc::now();
        let buttons: [ButtonState; BUTTON_COUNT] = std::array::from_fn(|number| {
            ButtonState::new(number, settings.pins[number], ButtonName::ALL[number], now)
        });

        for pin in settings.pins {
            if let Err(e) = actuator.set_pin_mode(pin, PinMode::Input).await {
                if e.is_unavailable() {
                    tracing::debug!("Input mode for pin {} skipped, hardware unavailable", pin);
                } else {
                    tracing::warn!("Input mode for pin {} failed: {}", pin, e);
                }
            }
        }

        let inner = Arc::new(Inner {
            board: ReentrantMutex::new(RefCell::new(Board {
                buttons,
                pending: VecDeque::new(),
                publishing: false,
            })),
            bus,
            actuator: actuator.clone(),
            active_low: settings.active_low,
        });

        let listener = match actuator.watch_edges(&settings.pins) {
            Ok(edges) => Some(tokio::spawn(listen(inner.clone(), edges))),
            Err(HardwareError::Unavailable) => {
                tracing::info!("Button edges unavailable, simulation only");
                None
            }
            Err(e) => {
                tracing::warn!("Button edges unavailable: {}", e);
                None
            }
        };
        tracing::info!("Buttons on pins {:?}", settings.pins);

        Self {
            inner,
            listener: Mutex::new(listener),
        }
    }

    /// Process one edge notification for `pin`
    ///
    /// Returns whether a transition was recorded.
    pub async fn handle_edge(&self, pin: u8, raw: Option<i64>) -> Result<bool, ButtonError> {
        self.inner.handle_edge(pin, raw).await
    }

    /// Force button `number` down, as if it was pressed
    pub fn simulate_down(&self, number: usize) -> Result<bool, ButtonError> {
        self.simulate(number, true)
    }

    /// Force button `number` up, as if it was released
    pub fn simulate_up(&self, number: usize) -> Result<bool, ButtonError> {
        self.simulate(number, false)
    }

    fn simulate(&self, number: usize, isdown: bool) -> Result<bool, ButtonError> {
        if number >= BUTTON_COUNT {
            return Err(ButtonError::InvalidArgument {
                number,
                max: BUTTON_COUNT - 1,
            });
        }
        let level = self.inner.level_for(isdown);
        Ok(self.inner.apply(number, isdown, Some(i64::from(level))))
    }

    /// Snapshot of one button
    pub fn state(&self, number: usize) -> Result<ButtonState, ButtonError> {
        self.states()
            .get(number)
            .cloned()
            .ok_or(ButtonError::InvalidArgument {
                number,
                max: BUTTON_COUNT - 1,
            })
    }

    /// Snapshot of all buttons, left to right
    pub fn states(&self) -> [ButtonState; BUTTON_COUNT] {
        self.inner.snapshot()
    }

    /// Whether edges come from real hardware
    pub fn is_listening(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop listening for edges
    pub fn shutdown(&self) {
        if let Some(task) = self.listener.lock().take() {
            task.abort();
        }
        tracing::debug!("Button tracker shut down");
    }
}

impl Drop for ButtonTracker {
    fn drop(&mut self) {
        if let Some(task) = self.listener.lock().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ButtonTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ButtonTracker")
            .field("buttons", &self.states())
            .field("active_low", &self.inner.active_low)
            .finish()
    }
}

async fn listen(inner: Arc<Inner>, mut edges: mpsc::UnboundedReceiver<EdgeNotification>) {
    while let Some(edge) = edges.recv().await {
        if let Err(e) = inner.handle_edge(edge.pin, edge.raw).await {
            tracing::warn!("Edge dropped: {}", e);
        }
    }
    tracing::debug!("Edge stream closed");
}
