use std::sync::Arc;
use tingbot::{init_logging, Config, Tingbot, TingbotEvent, BUILD_DATE, VERSION};

/// Brightness change per left/right press
const BRIGHTNESS_STEP: i64 = 8192;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("tingbot {} (built {})", VERSION, BUILD_DATE);

    let config = Config::load_or_default()?;
    let tingbot = Arc::new(Tingbot::new(&config).await?);
    if !tingbot.is_hardware_available() {
        tracing::warn!("No GPIO hardware found, running state-only");
    }

    tingbot.on("button", |event| {
        if let TingbotEvent::Button(button) = &event {
            tracing::info!(
                "{} {} (pin {})",
                button.name,
                button.direction,
                button.pin
            );
        }
    });
    tingbot.on("backlight", |event| tracing::info!("{}", event.description()));

    // handlers run on the publishing thread, so brightness steps are spawned
    for (topic, step) in [
        ("button-left:down", -BRIGHTNESS_STEP),
        ("button-right:down", BRIGHTNESS_STEP),
    ] {
        let handle = tokio::runtime::Handle::current();
        let weak = Arc::downgrade(&tingbot);
        tingbot.on(topic, move |_| {
            let Some(tingbot) = weak.upgrade() else {
                return;
            };
            handle.spawn(async move {
                let Some(current) = tingbot.backlight().map(|b| i64::from(b.current())) else {
                    return;
                };
                if let Err(e) = tingbot.set_backlight(current + step, None).await {
                    tracing::warn!("Brightness step ignored: {}", e);
                }
            });
        });
    }

    tokio::signal::ctrl_c().await?;
    tingbot.shutdown();

    Ok(())
}
