// Redundant, repeating emergency stop
// The downstream consumer may drop or ignore any single message, so every
// channel is re-sent at a fixed interval until the sequence is cancelled.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{STOP_REPEAT_INTERVAL, TOPIC_BRAKE, TOPIC_MANUAL_CONTROL, TOPIC_NAV_CMD};
use crate::messages::{BoolMsg, BrakeMsg, VelAngle};
use crate::transport::{publish_json, Transport};

/// Send one round of stop commands on all three channels
pub fn send_stop(transport: &dyn Transport) {
    let results = [
        publish_json(transport, TOPIC_NAV_CMD, &VelAngle::EMERGENCY_BRAKE),
        publish_json(transport, TOPIC_MANUAL_CONTROL, &BoolMsg { data: true }),
        publish_json(transport, TOPIC_BRAKE, &BrakeMsg::FULL),
    ];
    for e in results.into_iter().filter_map(Result::err) {
        warn!("Stop command not sent: {}", e);
    }
}

/// Hand control back after a stop: autonomy enabled, brake released
pub fn send_release(transport: &dyn Transport) {
    let results = [
        publish_json(transport, TOPIC_MANUAL_CONTROL, &BoolMsg { data: false }),
        publish_json(transport, TOPIC_BRAKE, &BrakeMsg::RELEASED),
    ];
    for e in results.into_iter().filter_map(Result::err) {
        warn!("Release command not sent: {}", e);
    }
}

/// Owns the single repeating stop timer
pub struct StopSequencer {
    transport: Arc<dyn Transport>,
    handle: Option<JoinHandle<()>>,
}

impl StopSequencer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            handle: None,
        }
    }

    /// Begin stopping: send now, then every `STOP_REPEAT_INTERVAL`.
    /// No-op while already running. Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            debug!("Stop sequence already running");
            return;
        }

        info!(
            "Starting stop sequence, repeating every {}ms",
            STOP_REPEAT_INTERVAL.as_millis()
        );
        let transport = self.transport.clone();
        self.handle = Some(tokio::spawn(async move {
            let mut tick = interval(STOP_REPEAT_INTERVAL);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately
                tick.tick().await;
                send_stop(transport.as_ref());
            }
        }));
    }

    /// Stop repeating. Returns whether a sequence was running; no-op otherwise.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                info!("Stop sequence cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Number of live timers: 0 or 1
    pub fn active_timers(&self) -> usize {
        usize::from(self.is_running())
    }
}

impl Drop for StopSequencer {
    fn drop(&mut self) {
        // No orphaned timer outlives its owner
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use std::time::Duration;
    use tokio::time::sleep;

    fn sequencer() -> (StopSequencer, RecordingTransport) {
        let bus = RecordingTransport::new();
        (StopSequencer::new(Arc::new(bus.clone())), bus)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_immediately_then_repeats() {
        let (mut stop, bus) = sequencer();
        stop.start();

        sleep(Duration::from_millis(10)).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), 1);
        assert_eq!(bus.count(TOPIC_MANUAL_CONTROL), 1);
        assert_eq!(bus.count(TOPIC_BRAKE), 1);
        assert_eq!(bus.on_topic(TOPIC_BRAKE)[0]["data"], 255);
        assert!(bus.on_topic(TOPIC_NAV_CMD)[0]["vel"].as_f64().unwrap() < 0.0);

        sleep(STOP_REPEAT_INTERVAL).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), 2);

        sleep(STOP_REPEAT_INTERVAL * 2).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let (mut stop, bus) = sequencer();
        stop.start();
        stop.start();
        assert_eq!(stop.active_timers(), 1);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_stops_sending() {
        let (mut stop, bus) = sequencer();
        assert!(!stop.cancel());

        stop.start();
        sleep(Duration::from_millis(10)).await;
        assert!(stop.cancel());
        assert!(!stop.cancel());
        assert_eq!(stop.active_timers(), 0);

        let sent = bus.count(TOPIC_NAV_CMD);
        sleep(STOP_REPEAT_INTERVAL * 3).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_cancel() {
        let (mut stop, bus) = sequencer();
        stop.start();
        sleep(Duration::from_millis(10)).await;
        stop.cancel();
        stop.start();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(stop.active_timers(), 1);
        assert_eq!(bus.count(TOPIC_NAV_CMD), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timer() {
        let (mut stop, bus) = sequencer();
        stop.start();
        sleep(Duration::from_millis(10)).await;
        drop(stop);

        sleep(STOP_REPEAT_INTERVAL * 2).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), 1);
    }

    #[test]
    fn test_release_channels() {
        let bus = RecordingTransport::new();
        send_release(&bus);
        assert_eq!(bus.on_topic(TOPIC_MANUAL_CONTROL)[0]["data"], false);
        assert_eq!(bus.on_topic(TOPIC_BRAKE)[0]["data"], 0);
        assert_eq!(bus.count(TOPIC_NAV_CMD), 0);
    }
}
