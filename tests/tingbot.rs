use parking_lot::Mutex;
use std::sync::Arc;
use tingbot::{
    BrightnessRequest, Config, Error, Module, RecordingActuator, Tingbot, TingbotEvent,
    UnavailableActuator,
};

async fn start(config: Config) -> (Tingbot, Arc<RecordingActuator>) {
    let actuator = Arc::new(RecordingActuator::new());
    let tingbot = Tingbot::with_actuator(&config, actuator.clone())
        .await
        .expect("valid config");
    (tingbot, actuator)
}

#[tokio::test]
async fn test_default_config_starts_both_modules() {
    let (tingbot, actuator) = start(Config::default()).await;
    assert!(tingbot.backlight().is_some());
    assert!(tingbot.buttons().is_some());
    assert!(tingbot.is_hardware_available());
    assert_eq!(tingbot.backlight().map(|b| b.current()), Some(65536));
    assert!(actuator.pwm_writes().is_empty());
}

#[tokio::test]
async fn test_module_selection() {
    let mut config = Config::default();
    config.modules = vec![Module::Buttons];
    let (tingbot, _) = start(config).await;

    assert!(tingbot.backlight().is_none());
    assert!(tingbot.buttons().is_some());
    assert!(matches!(
        tingbot.set_backlight(100, None).await,
        Err(Error::ModuleDisabled(module)) if module == "backlight"
    ));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = Config::default();
    config.modules.clear();
    let result = Tingbot::with_actuator(&config, Arc::new(UnavailableActuator)).await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_set_backlight_publishes_through_facade() {
    let (tingbot, actuator) = start(Config::default()).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    tingbot.on("backlight", move |event| {
        if let TingbotEvent::Backlight(backlight) = event {
            s.lock().push(backlight.value);
        }
    });

    let request = tingbot.set_backlight(-5, None).await.expect("enabled");
    assert!(matches!(request, BrightnessRequest::Applied(0)));
    assert_eq!(*seen.lock(), vec![0]);
    assert_eq!(actuator.last_pwm(), Some(0));
}

#[tokio::test]
async fn test_once_and_off() {
    let (tingbot, _) = start(Config::default()).await;
    let buttons = tingbot.buttons().expect("buttons enabled");

    let presses = Arc::new(Mutex::new(0));
    let p = presses.clone();
    let every = tingbot.on("button#2:down", move |_| *p.lock() += 1);
    let first = Arc::new(Mutex::new(None));
    let f = first.clone();
    tingbot.once("button:down", move |event| *f.lock() = Some(event));

    buttons.simulate_down(2).expect("valid button");
    buttons.simulate_up(2).expect("valid button");
    assert!(tingbot.off(every));
    assert!(!tingbot.off(every));
    buttons.simulate_down(2).expect("valid button");

    assert_eq!(*presses.lock(), 1);
    match first.lock().take() {
        Some(TingbotEvent::Button(event)) => assert_eq!(event.number, 2),
        other => panic!("expected a button event, got {:?}", other),
    };
}

#[tokio::test]
async fn test_shutdown_stops_edges() {
    let (tingbot, actuator) = start(Config::default()).await;
    tingbot.shutdown();
    tokio::task::yield_now().await;

    let buttons = tingbot.buttons().expect("buttons enabled");
    assert!(!buttons.is_listening());
    actuator.drive(17, false);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!buttons.state(0).expect("valid button").isdown);
}

#[tokio::test]
async fn test_starts_from_saved_config() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("tingbot").join("config.toml");

    let mut config = Config::default();
    config.backlight.max_brightness = 1000;
    config.backlight.tweening_enabled = true;
    config.save_to_file(&path).expect("saved");

    let loaded = Config::load_from_file(&path).expect("loaded");
    let (tingbot, _) = start(loaded).await;
    let backlight = tingbot.backlight().expect("backlight enabled");
    assert_eq!(backlight.range(), (0, 1000));
    assert!(backlight.tweening_enabled());
}
