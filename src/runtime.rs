// Event loop: zenoh subscribers in, coordinator, fire-and-forget publishes out
// Inbound samples are decoded at the boundary and handled one at a time in
// arrival order. A periodic tick drives the localization watchdog.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::time::interval;
use tracing::{info, warn};
use zenoh::sample::Sample;

// local imports
use crate::catalog::Catalog;
use crate::config::{
    ConsoleConfig, LOOP_HZ, POSE_TIMEOUT, TOPIC_HEALTH, TOPIC_PATH, TOPIC_POSE, TOPIC_UI_EVENT,
    TOPIC_UI_REQUEST, TOPIC_VEHICLE_STATE, TOPIC_VOICE,
};
use crate::coordinator::{Coordinator, InboundEvent};
use crate::messages::{decode, Validate};
use crate::transport::{LogTransport, Transport, ZenohTransport};

/// Decode a sample or log why it was dropped
fn decode_sample<T: DeserializeOwned + Validate>(topic: &str, sample: &Sample) -> Option<T> {
    let payload = sample.payload().to_bytes();
    match decode::<T>(topic, &payload) {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

pub async fn run(
    config: ConsoleConfig,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let catalog = match config.destinations.clone() {
        Some(records) => Catalog::from_records(records),
        None => Catalog::campus(),
    };

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    let transport: Arc<dyn Transport> = if dry_run {
        info!("Dry run: publishes are logged, not sent");
        Arc::new(LogTransport)
    } else {
        Arc::new(ZenohTransport::new(session.clone()))
    };

    info!("Setting up subscribers...");
    let sub_pose = session.declare_subscriber(TOPIC_POSE).await?;
    let sub_path = session.declare_subscriber(TOPIC_PATH).await?;
    let sub_state = session.declare_subscriber(TOPIC_VEHICLE_STATE).await?;
    let sub_voice = session.declare_subscriber(TOPIC_VOICE).await?;
    let sub_ui = session.declare_subscriber(TOPIC_UI_REQUEST).await?;

    let mut coordinator = Coordinator::new(&config, catalog, transport)?;
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Console started: {}Hz housekeeping, {}ms localization timeout",
        LOOP_HZ,
        POSE_TIMEOUT.as_millis()
    );
    info!(
        "Subscribed to: {}, {}, {}, {}, {}",
        TOPIC_POSE, TOPIC_PATH, TOPIC_VEHICLE_STATE, TOPIC_VOICE, TOPIC_UI_REQUEST
    );
    info!("Publishing UI snapshots to: {}, health to: {}", TOPIC_UI_EVENT, TOPIC_HEALTH);

    coordinator.announce();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        // One event per iteration, handled to completion before the next
        let event = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            _ = tick.tick() => {
                coordinator.tick(Instant::now());
                continue;
            }
            Ok(sample) = sub_pose.recv_async() => {
                decode_sample(TOPIC_POSE, &sample).map(InboundEvent::Pose)
            }
            Ok(sample) = sub_path.recv_async() => {
                decode_sample(TOPIC_PATH, &sample).map(InboundEvent::Path)
            }
            Ok(sample) = sub_state.recv_async() => {
                decode_sample(TOPIC_VEHICLE_STATE, &sample).map(InboundEvent::VehicleState)
            }
            Ok(sample) = sub_voice.recv_async() => {
                decode_sample(TOPIC_VOICE, &sample).map(InboundEvent::Utterance)
            }
            Ok(sample) = sub_ui.recv_async() => {
                decode_sample(TOPIC_UI_REQUEST, &sample).map(InboundEvent::Ui)
            }
        };

        if let Some(event) = event {
            coordinator.handle(event, Instant::now());
        }
    }

    // No orphaned stop timer
    coordinator.shutdown();
    Ok(())
}
