//! # Tingbot Hardware
//!
//! The hardware-facing half of the controller:
//!
//! 1. **actuator** - async GPIO/PWM trait, host probing, the no-hardware fallback
//! 2. **gpio** - driver for the wiringPi `gpio` command-line tool
//! 3. **backlight** - clamped, throttled, eased brightness control
//! 4. **buttons** - debounced button transitions fanned out on the event bus
//! 5. **recording** - in-memory actuator for tests and software-only runs

pub mod actuator;
pub mod backlight;
pub mod buttons;
pub mod easing;
pub mod gpio;
pub mod recording;

pub use actuator::{
    probe_actuator, Actuator, EdgeNotification, HardwareResult, PinMode, UnavailableActuator,
};
pub use backlight::{
    BacklightState, BrightnessController, BrightnessRequest, OnDone, TweenHandle, FRAME_INTERVAL,
};
pub use buttons::{ButtonState, ButtonTracker, BUTTON_COUNT};
pub use gpio::GpioCommandActuator;
pub use recording::RecordingActuator;
