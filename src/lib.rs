//! # Tingbot
//!
//! Controller for the Tingbot single-board device: the four front buttons
//! and the PWM backlight, with every change published on a topic event bus.
//!
//! ## Architecture
//!
//! Tingbot is organized as a workspace with multiple crates:
//!
//! 1. **tingbot-core** - Errors, typed events, the event bus
//! 2. **tingbot-hardware** - GPIO actuators, brightness controller, button tracker
//! 3. **tingbot-settings** - Configuration and persistence
//! 4. **tingbot** - The [`Tingbot`] facade and the daemon binary
//!
//! ## Example
//!
//! ```no_run
//! use tingbot::{Config, Tingbot};
//!
//! # async fn run() -> tingbot::Result<()> {
//! let tingbot = Tingbot::new(&Config::default()).await?;
//! tingbot.on("button-left:down", |event| println!("{}", event.description()));
//! tingbot.set_backlight(20_000, None).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

pub use tingbot_core::{
    BacklightEvent, BacklightTopic, ButtonError, ButtonEvent, ButtonName, Direction, Error,
    EventBus, HardwareError, Published, Result, SubscriptionId, TingbotEvent,
};
pub use tingbot_hardware::{
    probe_actuator, Actuator, BacklightState, BrightnessController, BrightnessRequest,
    ButtonState, ButtonTracker, GpioCommandActuator, OnDone, RecordingActuator, TweenHandle,
    UnavailableActuator, BUTTON_COUNT,
};
pub use tingbot_settings::{
    BacklightSettings, ButtonSettings, Config, HardwareSettings, Module, SettingsError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// A running controller
///
/// Owns the event bus and whichever modules the configuration enables.
/// Dropping it, or calling [`shutdown`](Self::shutdown), stops the
/// background tasks.
pub struct Tingbot {
    bus: Arc<EventBus>,
    actuator: Arc<dyn Actuator>,
    backlight: Option<BrightnessController>,
    buttons: Option<ButtonTracker>,
}

impl Tingbot {
    /// Start the enabled modules on the GPIO hardware of this host
    ///
    /// Falls back to state-only operation when no GPIO tool is found.
    pub async fn new(config: &Config) -> Result<Self> {
        let actuator = probe_actuator(&config.hardware).await;
        Self::with_actuator(config, actuator).await
    }

    /// Start the enabled modules on an explicit actuator
    pub async fn with_actuator(config: &Config, actuator: Arc<dyn Actuator>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        let bus = Arc::new(EventBus::new());

        let backlight = if config.is_enabled(Module::Backlight) {
            Some(BrightnessController::new(&config.backlight, actuator.clone(), bus.clone()).await?)
        } else {
            None
        };

        let buttons = if config.is_enabled(Module::Buttons) {
            Some(ButtonTracker::new(&config.buttons, actuator.clone(), bus.clone()).await)
        } else {
            None
        };

        tracing::info!(
            "Tingbot {} started on {} (modules: {:?})",
            VERSION,
            actuator.name(),
            config.modules
        );

        Ok(Self {
            bus,
            actuator,
            backlight,
            buttons,
        })
    }

    /// Call `handler` for every event published on `topic`
    pub fn on<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(TingbotEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(topic, handler)
    }

    /// Call `handler` for the next event published on `topic` only
    pub fn once<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(TingbotEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe_once(topic, handler)
    }

    /// Remove a handler; false if it was already gone
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Request a backlight brightness
    ///
    /// See [`BrightnessController::set_brightness`].
    pub async fn set_backlight(
        &self,
        value: i64,
        on_done: Option<OnDone>,
    ) -> Result<BrightnessRequest> {
        let backlight = self
            .backlight
            .as_ref()
            .ok_or_else(|| Error::ModuleDisabled(Module::Backlight.to_string()))?;
        Ok(backlight.set_brightness(value, on_done).await)
    }

    pub fn backlight(&self) -> Option<&BrightnessController> {
        self.backlight.as_ref()
    }

    pub fn buttons(&self) -> Option<&ButtonTracker> {
        self.buttons.as_ref()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Whether an actual GPIO tool was found
    pub fn is_hardware_available(&self) -> bool {
        self.actuator.is_available()
    }

    /// Stop the background tasks of every module
    pub fn shutdown(&self) {
        if let Some(backlight) = &self.backlight {
            backlight.shutdown();
        }
        if let Some(buttons) = &self.buttons {
            buttons.shutdown();
        }
        tracing::info!("Tingbot shut down");
    }
}

impl std::fmt::Debug for Tingbot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tingbot")
            .field("actuator", &self.actuator.name())
            .field("backlight", &self.backlight)
            .field("buttons", &self.buttons)
            .finish()
    }
}

/// Initialize logging with the default configuration
///
/// Console output filtered by `RUST_LOG`, at `info` unless overridden.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
