// Navigation state coordinator
// Owns vehicle state, path state and the stop sequencer. Inbound events are
// handled one at a time, each to completion; every mutation is followed by a
// read-only snapshot for the map/UI.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Destination};
use crate::config::{
    ConsoleConfig, FOLLOW_ZOOM, POSE_TIMEOUT, TOPIC_CLICKED_POINT, TOPIC_HEALTH, TOPIC_HELP,
    TOPIC_REGISTER, TOPIC_UI_EVENT, TOPIC_VEHICLE_STATE,
};
use crate::messages::{
    ClickedPoint, ConsoleHealth, HelpRequest, MarkerArray, PoseMessage, Registration, UiEvent,
    UiRequest,
};
use crate::path::PathTracker;
use crate::state::{Effect, VehicleState, VehicleStateMachine, VehicleStateUpdate};
use crate::stop::{send_release, StopSequencer};
use crate::transform::{AffineTransform, GeoPosition, LocalPosition, TransformError};
use crate::transport::{publish_json, Transport};
use crate::voice::{CommandDispatcher, CommandIntent, Dispatch, Utterance};

/// Everything the coordinator reacts to
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Pose(PoseMessage),
    Path(MarkerArray),
    VehicleState(VehicleStateUpdate),
    Utterance(Utterance),
    Ui(UiRequest),
}

/// Where an intent came from. Voice destinations need a spoken confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    Voice,
    Panel,
}

pub struct Coordinator {
    cart_name: String,
    transform: AffineTransform,
    catalog: Catalog,
    selectable: Vec<Destination>,
    machine: VehicleStateMachine,
    tracker: PathTracker,
    dispatcher: CommandDispatcher,
    stop: StopSequencer,
    transport: Arc<dyn Transport>,
    pending_goto: Option<Destination>,
    help_requested: bool,
    last_pose_at: Option<Instant>,
    pose_health: ConsoleHealth,
    link_up: bool,
}

impl Coordinator {
    pub fn new(
        config: &ConsoleConfig,
        catalog: Catalog,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, TransformError> {
        Ok(Self {
            cart_name: config.cart_name.clone(),
            transform: AffineTransform::from_matrix(config.transform)?,
            selectable: catalog.enabled(),
            catalog,
            machine: VehicleStateMachine::new(),
            tracker: PathTracker::new(),
            dispatcher: CommandDispatcher::new(&config.wake_word, config.match_threshold),
            stop: StopSequencer::new(transport.clone()),
            transport,
            pending_goto: None,
            help_requested: false,
            last_pose_at: None,
            pose_health: ConsoleHealth::PoseStale, // Stale until the first pose
            link_up: true,
        })
    }

    /// Register with the backend and push the initial snapshot
    pub fn announce(&self) {
        info!(
            "Cart {} ready with {} destinations, wake word \"{}\"",
            self.cart_name,
            self.catalog.len(),
            self.dispatcher.wake_word()
        );
        self.send(
            TOPIC_REGISTER,
            &Registration {
                name: self.cart_name.clone(),
            },
        );
        self.emit_state();
        self.emit(UiEvent::Selection { destination: None });
    }

    pub fn handle(&mut self, event: InboundEvent, now: Instant) {
        match event {
            InboundEvent::Pose(msg) => self.on_pose(&msg, now),
            InboundEvent::Path(msg) => self.on_path(&msg),
            InboundEvent::VehicleState(update) => self.on_vehicle_state(update),
            InboundEvent::Utterance(utterance) => self.on_utterance(&utterance, now),
            InboundEvent::Ui(UiRequest::Select { name }) => self.select_destination(&name),
            InboundEvent::Ui(req) => self.on_intent(req.into(), IntentSource::Panel),
        }
    }

    pub fn on_pose(&mut self, msg: &PoseMessage, now: Instant) {
        let position = msg.position();
        self.last_pose_at = Some(now);

        let center = self.transform.to_geo(position);
        self.emit(UiEvent::CartPosition { position: center });

        if !self.machine.state().may_move() {
            return;
        }
        if self.tracker.update(&position).is_some() {
            debug!("Nearest path index {:?}", self.tracker.nearest());
            self.emit_remaining_path();
            self.emit(UiEvent::Camera {
                center,
                zoom: FOLLOW_ZOOM,
            });
        }
    }

    pub fn on_path(&mut self, msg: &MarkerArray) {
        self.tracker.set_full_path(msg.positions());
        let path = self.to_geo_path(self.tracker.full_path());
        self.emit(UiEvent::FullPath { path });
    }

    pub fn on_vehicle_state(&mut self, update: VehicleStateUpdate) {
        debug!("Vehicle state update: {:?}", update);
        let effects = self.machine.external_update(update);
        self.apply(effects);
    }

    pub fn on_utterance(&mut self, utterance: &Utterance, now: Instant) {
        let Some(outcome) = self.dispatcher.on_utterance(utterance, &self.selectable, now) else {
            return;
        };
        match outcome {
            Dispatch::Intent(intent) => self.on_intent(intent, IntentSource::Voice),
            Dispatch::DestinationNotFound(query) => {
                self.emit(UiEvent::warning(format!("Location \"{}\" not found.", query)))
            }
            Dispatch::Unrecognized(command) => {
                self.emit(UiEvent::warning(format!("Command \"{}\" not recognized.", command)))
            }
            Dispatch::Ignored => {}
        }
    }

    pub fn on_intent(&mut self, intent: CommandIntent, source: IntentSource) {
        match intent {
            CommandIntent::Stop => self.emergency_stop(),
            CommandIntent::Resume => self.resume(),
            CommandIntent::Help => self.toggle_help(),
            CommandIntent::GoTo { name } => match source {
                IntentSource::Panel => self.select_destination(&name),
                IntentSource::Voice => self.propose_destination(&name),
            },
            CommandIntent::Confirm => self.confirm(),
            CommandIntent::Cancel => self.cancel(),
        }
    }

    /// Touch selection: navigate right away
    pub fn select_destination(&mut self, name: &str) {
        let Some(destination) = self.catalog.get(name).cloned() else {
            warn!("Unknown destination {}", name);
            self.emit(UiEvent::warning(format!("Location \"{}\" not found.", name)));
            return;
        };
        if destination.disabled {
            self.emit(UiEvent::warning(format!(
                "{} is not available right now.",
                destination.display_name
            )));
            return;
        }
        self.navigate(&destination);
    }

    /// Voice selection: hold until confirmed
    fn propose_destination(&mut self, name: &str) {
        let Some(destination) = self.catalog.get(name).cloned() else {
            return;
        };
        info!("Awaiting confirmation for {}", destination.name);
        self.emit(UiEvent::info(format!(
            "Say \"{} confirm\" to go to {}.",
            self.dispatcher.wake_word(),
            destination.display_name
        )));
        self.pending_goto = Some(destination);
    }

    fn navigate(&mut self, destination: &Destination) {
        self.pending_goto = None;
        let effects = self.machine.request_navigate(destination);
        if !effects.is_empty() {
            self.apply(effects);
        }
    }

    pub fn confirm(&mut self) {
        match self.pending_goto.take() {
            Some(destination) => self.navigate(&destination),
            None => self.emit(UiEvent::info("Nothing to confirm.")),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(destination) = self.pending_goto.take() {
            info!("Cancelled trip to {}", destination.name);
            self.emit(UiEvent::info(format!(
                "Trip to {} cancelled.",
                destination.display_name
            )));
        }
    }

    pub fn emergency_stop(&mut self) {
        let effects = self.machine.emergency_stop();
        self.apply(effects);
    }

    pub fn resume(&mut self) {
        let effects = self.machine.resume();
        if !effects.is_empty() {
            self.apply(effects);
        }
    }

    fn toggle_help(&mut self) {
        self.help_requested = !self.help_requested;
        info!("Help requested: {}", self.help_requested);
        self.send(
            TOPIC_HELP,
            &HelpRequest {
                name: self.cart_name.clone(),
                help_requested: self.help_requested,
            },
        );
        self.emit(UiEvent::info(if self.help_requested {
            "Help is on the way."
        } else {
            "Help request cancelled."
        }));
    }

    /// Periodic housekeeping: link and localization watchdogs, stale utterance expiry
    pub fn tick(&mut self, now: Instant) -> ConsoleHealth {
        self.dispatcher.expire_stale(now);

        let link_up = self.transport.is_link_up();
        if link_up != self.link_up {
            if link_up {
                info!("Vehicle link restored");
                self.emit(UiEvent::info("Connection restored."));
            } else {
                warn!("Vehicle link down, publishes are failing");
                self.emit(UiEvent::warning("Connection to vehicle lost."));
            }
            self.link_up = link_up;
        }

        let pose_age = self.last_pose_at.map(|at| now.duration_since(at));
        let pose_health = match pose_age {
            Some(age) if age <= POSE_TIMEOUT => ConsoleHealth::Ok,
            _ => ConsoleHealth::PoseStale,
        };
        if pose_health != self.pose_health {
            if pose_health == ConsoleHealth::Ok {
                info!("Localization restored");
                self.emit(UiEvent::info("Localization restored."));
            } else {
                warn!("Localization stale ({:?} old)", pose_age.unwrap_or_default());
                self.emit(UiEvent::warning("Lost localization."));
            }
            self.pose_health = pose_health;
        }

        let health = self.health();
        self.send(TOPIC_HEALTH, &health);
        health
    }

    /// Cancel the stop timer; the cart is left as it is
    pub fn shutdown(&mut self) {
        if self.stop.cancel() {
            info!("Stop sequence cancelled on shutdown");
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PublishState(state) => {
                    self.send(TOPIC_VEHICLE_STATE, &VehicleStateUpdate::from(state))
                }
                Effect::NavigateTo(geo) => self.send_goal(geo),
                Effect::StartStopSequence => self.stop.start(),
                Effect::CancelStopSequence => {
                    if self.stop.cancel() {
                        send_release(self.transport.as_ref());
                    }
                }
                Effect::ClearRemainingPath => {
                    self.tracker.mark_reached();
                    self.emit_remaining_path();
                }
                Effect::DestinationChanged(destination) => {
                    self.emit(UiEvent::Selection { destination })
                }
            }
        }
        self.emit_state();
    }

    fn send_goal(&self, geo: GeoPosition) {
        let local = self.transform.to_local(geo);
        info!("Target coordinates: {}, {} -> ({:.2}, {:.2})", geo.lat, geo.lng, local.x, local.y);
        self.send(TOPIC_CLICKED_POINT, &ClickedPoint { point: local.into() });
    }

    fn emit_state(&self) {
        self.emit(UiEvent::VehicleState {
            state: self.machine.state(),
            awaiting_confirmation: self.machine.awaiting_confirmation(),
        });
    }

    fn emit_remaining_path(&self) {
        self.emit(UiEvent::RemainingPath {
            path: self.to_geo_path(self.tracker.remaining_path()),
            progress_percent: self.tracker.progress_percent(),
        });
    }

    fn to_geo_path(&self, path: &[LocalPosition]) -> Vec<GeoPosition> {
        path.iter().map(|p| self.transform.to_geo(*p)).collect()
    }

    fn emit(&self, event: UiEvent) {
        self.send(TOPIC_UI_EVENT, &event);
    }

    /// Fire-and-forget publish; failures are logged, never propagated
    fn send<T: Serialize + ?Sized>(&self, topic: &str, msg: &T) {
        if let Err(e) = publish_json(self.transport.as_ref(), topic, msg) {
            warn!("{}", e);
        }
    }

    pub fn state(&self) -> VehicleState {
        self.machine.state()
    }

    pub fn remaining_path(&self) -> &[LocalPosition] {
        self.tracker.remaining_path()
    }

    pub fn current_destination(&self) -> Option<&Destination> {
        self.machine.current_destination()
    }

    pub fn pending_destination(&self) -> Option<&Destination> {
        self.pending_goto.as_ref()
    }

    pub fn help_requested(&self) -> bool {
        self.help_requested
    }

    pub fn health(&self) -> ConsoleHealth {
        if self.link_up {
            self.pose_health
        } else {
            ConsoleHealth::TransportDown
        }
    }

    pub fn stop_sequence_running(&self) -> bool {
        self.stop.is_running()
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TOPIC_BRAKE, TOPIC_MANUAL_CONTROL, TOPIC_NAV_CMD};
    use crate::messages::{Marker, Point, Pose, PoseWithCovariance};
    use serde_json::Value;
    use std::time::Duration;

    fn setup() -> (Coordinator, RecordingBus) {
        let bus = RecordingBus::new();
        let coordinator = Coordinator::new(
            &ConsoleConfig::default(),
            Catalog::campus(),
            Arc::new(bus.clone()),
        )
        .unwrap();
        (coordinator, bus)
    }

    type RecordingBus = crate::transport::RecordingTransport;

    fn pose(x: f64, y: f64) -> PoseMessage {
        PoseMessage {
            pose: PoseWithCovariance {
                pose: Pose {
                    position: Point { x, y, z: 0.0 },
                },
                covariance: Vec::new(),
            },
        }
    }

    fn straight_path() -> MarkerArray {
        MarkerArray {
            markers: (0..4)
                .map(|i| Marker {
                    pose: Pose {
                        position: Point {
                            x: i as f64,
                            y: 0.0,
                            z: 0.0,
                        },
                    },
                })
                .collect(),
        }
    }

    fn said(text: &str) -> Utterance {
        Utterance {
            text: text.to_string(),
            is_final: true,
        }
    }

    fn ui_events(bus: &RecordingBus, kind: &str) -> Vec<Value> {
        bus.on_topic(TOPIC_UI_EVENT)
            .into_iter()
            .filter(|e| e["type"] == kind)
            .collect()
    }

    fn state(is_navigating: bool, reached_destination: bool, stopped: bool) -> VehicleState {
        VehicleState {
            is_navigating,
            reached_destination,
            stopped,
        }
    }

    #[tokio::test]
    async fn test_panel_selection_publishes_goal() {
        let (mut c, bus) = setup();
        c.handle(
            InboundEvent::Ui(UiRequest::Select {
                name: "festival".to_string(),
            }),
            Instant::now(),
        );

        assert_eq!(c.state(), state(true, false, false));
        let goals = bus.on_topic(TOPIC_CLICKED_POINT);
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0]["point"]["z"], 0.0);

        // The goal is the destination expressed in the vehicle frame
        let local = LocalPosition::new(
            goals[0]["point"]["x"].as_f64().unwrap(),
            goals[0]["point"]["y"].as_f64().unwrap(),
        );
        let geo = c.transform().to_geo(local);
        let festival = Catalog::campus().get("festival").unwrap().position;
        assert!((geo.lat - festival.lat).abs() < 1e-9);
        assert!((geo.lng - festival.lng).abs() < 1e-9);

        let published = bus.on_topic(TOPIC_VEHICLE_STATE);
        assert_eq!(published[0]["is_navigating"], true);
        assert_eq!(published[0]["reached_destination"], false);
        assert_eq!(ui_events(&bus, "selection").last().unwrap()["destination"], "festival");

        // Second selection while navigating is ignored
        c.select_destination("king");
        assert_eq!(bus.count(TOPIC_CLICKED_POINT), 1);
        assert_eq!(c.current_destination().unwrap().name, "festival");
    }

    #[tokio::test]
    async fn test_pose_tracks_only_while_navigating() {
        let (mut c, bus) = setup();
        let now = Instant::now();
        c.on_path(&straight_path());
        assert_eq!(ui_events(&bus, "full_path")[0]["path"].as_array().unwrap().len(), 4);

        c.on_pose(&pose(1.1, 0.0), now);
        assert_eq!(ui_events(&bus, "cart_position").len(), 1);
        assert!(ui_events(&bus, "remaining_path").is_empty());
        assert!(c.remaining_path().is_empty());

        c.select_destination("festival");
        c.on_pose(&pose(1.1, 0.0), now);
        assert_eq!(
            c.remaining_path(),
            &[
                LocalPosition::new(1.0, 0.0),
                LocalPosition::new(2.0, 0.0),
                LocalPosition::new(3.0, 0.0)
            ]
        );
        let remaining = ui_events(&bus, "remaining_path");
        assert_eq!(remaining[0]["path"].as_array().unwrap().len(), 3);
        let camera = ui_events(&bus, "camera");
        assert_eq!(camera[0]["zoom"], FOLLOW_ZOOM);
    }

    #[tokio::test]
    async fn test_reached_destination_clears_path() {
        let (mut c, bus) = setup();
        let now = Instant::now();
        c.on_path(&straight_path());
        c.select_destination("festival");
        c.on_pose(&pose(1.1, 0.0), now);
        assert_eq!(c.remaining_path().len(), 3);

        c.handle(
            InboundEvent::VehicleState(VehicleStateUpdate {
                is_navigating: Some(true),
                reached_destination: Some(true),
                stopped: Some(false),
            }),
            now,
        );
        assert!(c.remaining_path().is_empty());
        assert!(c.current_destination().is_none());

        // Still navigating per the bus, but the path stays cleared
        c.on_pose(&pose(0.0, 0.0), now);
        assert!(c.remaining_path().is_empty());

        let last = ui_events(&bus, "remaining_path").pop().unwrap();
        assert!(last["path"].as_array().unwrap().is_empty());
        assert_eq!(last["progress_percent"], 100.0);
        assert_eq!(ui_events(&bus, "selection").last().unwrap()["destination"], Value::Null);
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_stop_and_resume() {
        let (mut c, bus) = setup();
        let now = Instant::now();
        c.select_destination("festival");

        c.on_utterance(&said("james stahp"), now);
        assert_eq!(c.state(), state(false, false, true));
        assert!(c.stop_sequence_running());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), 1);
        assert_eq!(bus.count(TOPIC_BRAKE), 1);

        c.on_utterance(&said("james resume"), now);
        assert_eq!(c.state(), state(true, false, false));
        assert!(!c.stop_sequence_running());

        // Release sent once, goal re-sent for the same trip
        let manual: Vec<_> = bus.on_topic(TOPIC_MANUAL_CONTROL);
        assert_eq!(manual.last().unwrap()["data"], false);
        assert_eq!(bus.on_topic(TOPIC_BRAKE).last().unwrap()["data"], 0);
        assert_eq!(bus.count(TOPIC_CLICKED_POINT), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_wake_phrase() {
        let bus = RecordingBus::new();
        let config = ConsoleConfig {
            wake_word: "Hey James".to_string(),
            ..ConsoleConfig::default()
        };
        let mut c = Coordinator::new(&config, Catalog::campus(), Arc::new(bus.clone())).unwrap();
        let now = Instant::now();

        c.on_utterance(&said("james stop"), now);
        assert!(!c.stop_sequence_running());

        c.on_utterance(&said("hey james, stop"), now);
        assert!(c.stop_sequence_running());
        assert_eq!(c.state(), state(false, true, true));
        c.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_unstop_cancels_stop_stream() {
        let (mut c, bus) = setup();
        c.select_destination("festival");
        c.emergency_stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), 1);

        c.on_vehicle_state(state(true, false, false).into());
        assert!(!c.stop_sequence_running());
        assert_eq!(bus.on_topic(TOPIC_BRAKE).last().unwrap()["data"], 0);

        // Resume is a no-op now and must not restart anything
        c.resume();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(c.state(), state(true, false, false));
        assert_eq!(bus.count(TOPIC_NAV_CMD), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_stop_keeps_one_timer() {
        let (mut c, bus) = setup();
        c.emergency_stop();
        c.emergency_stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(bus.count(TOPIC_NAV_CMD), 1);

        c.shutdown();
        assert!(!c.stop_sequence_running());
        c.shutdown();
    }

    #[tokio::test]
    async fn test_voice_goto_needs_confirmation() {
        let (mut c, bus) = setup();
        let now = Instant::now();

        c.on_utterance(&said("go to festival"), now);
        assert!(c.pending_destination().is_none());

        c.on_utterance(&said("james go to festival"), now);
        assert_eq!(c.pending_destination().unwrap().name, "festival");
        assert_eq!(c.state(), VehicleState::IDLE);
        assert_eq!(bus.count(TOPIC_CLICKED_POINT), 0);

        c.on_utterance(&said("james confirm"), now);
        assert!(c.pending_destination().is_none());
        assert_eq!(c.state(), state(true, false, false));
        assert_eq!(bus.count(TOPIC_CLICKED_POINT), 1);
    }

    #[tokio::test]
    async fn test_voice_cancel_and_empty_confirm() {
        let (mut c, bus) = setup();
        let now = Instant::now();

        c.on_utterance(&said("james go to king hall"), now);
        assert_eq!(c.pending_destination().unwrap().name, "king");
        c.on_utterance(&said("james cancel"), now);
        assert!(c.pending_destination().is_none());

        c.on_utterance(&said("james confirm"), now);
        assert_eq!(c.state(), VehicleState::IDLE);
        assert_eq!(bus.count(TOPIC_CLICKED_POINT), 0);
        let notices = ui_events(&bus, "notice");
        assert_eq!(notices.last().unwrap()["text"], "Nothing to confirm.");
    }

    #[tokio::test]
    async fn test_noise_only_warns() {
        let (mut c, bus) = setup();
        let now = Instant::now();

        c.on_utterance(&said("james banana"), now);
        c.on_utterance(&said("james go to the moon"), now);
        assert_eq!(c.state(), VehicleState::IDLE);
        assert!(!c.stop_sequence_running());

        let notices = ui_events(&bus, "notice");
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n["level"] == "warning"));
        assert_eq!(bus.count(TOPIC_VEHICLE_STATE), 0);
    }

    #[tokio::test]
    async fn test_unknown_or_disabled_selection() {
        let bus = RecordingBus::new();
        let mut destinations = Catalog::campus().all().to_vec();
        destinations[0].disabled = true;
        let disabled = destinations[0].name.clone();
        let mut c = Coordinator::new(
            &ConsoleConfig::default(),
            Catalog::new(destinations),
            Arc::new(bus.clone()),
        )
        .unwrap();

        c.select_destination(&disabled);
        c.select_destination("nowhere");
        assert_eq!(c.state(), VehicleState::IDLE);
        assert_eq!(ui_events(&bus, "notice").len(), 2);
    }

    #[tokio::test]
    async fn test_help_toggles() {
        let (mut c, bus) = setup();
        c.handle(InboundEvent::Ui(UiRequest::Help), Instant::now());
        assert!(c.help_requested());
        c.on_intent(CommandIntent::Help, IntentSource::Voice);
        assert!(!c.help_requested());

        let help = bus.on_topic(TOPIC_HELP);
        assert_eq!(help[0]["help_requested"], true);
        assert_eq!(help[1]["help_requested"], false);
        assert_eq!(help[0]["name"], "James");
    }

    #[tokio::test]
    async fn test_pose_watchdog() {
        let (mut c, bus) = setup();
        let t0 = Instant::now();
        assert_eq!(c.tick(t0), ConsoleHealth::PoseStale);

        c.on_pose(&pose(0.0, 0.0), t0);
        assert_eq!(c.tick(t0 + Duration::from_millis(100)), ConsoleHealth::Ok);
        assert_eq!(c.tick(t0 + POSE_TIMEOUT), ConsoleHealth::Ok);
        assert_eq!(
            c.tick(t0 + POSE_TIMEOUT + Duration::from_millis(1)),
            ConsoleHealth::PoseStale
        );
        assert_eq!(c.health(), ConsoleHealth::PoseStale);

        // One notice per transition
        assert_eq!(ui_events(&bus, "notice").len(), 2);
        assert_eq!(bus.count(TOPIC_HEALTH), 4);
    }

    #[tokio::test]
    async fn test_link_outage_is_reported() {
        let (mut c, bus) = setup();
        let t0 = Instant::now();
        c.on_pose(&pose(0.0, 0.0), t0);
        assert_eq!(c.tick(t0), ConsoleHealth::Ok);

        bus.set_link_up(false);
        assert_eq!(c.tick(t0), ConsoleHealth::TransportDown);
        assert_eq!(c.tick(t0), ConsoleHealth::TransportDown);
        let notices = ui_events(&bus, "notice");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0]["level"], "warning");
        assert_eq!(notices[0]["text"], "Connection to vehicle lost.");

        bus.set_link_up(true);
        assert_eq!(c.tick(t0), ConsoleHealth::Ok);
        let notices = ui_events(&bus, "notice");
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[1]["level"], "info");
        assert_eq!(notices[1]["text"], "Connection restored.");

        let health: Vec<_> = bus.on_topic(TOPIC_HEALTH);
        assert_eq!(health, vec!["ok", "transport_down", "transport_down", "ok"]);
    }

    #[tokio::test]
    async fn test_remote_state_echo_is_idempotent() {
        let (mut c, bus) = setup();
        c.select_destination("festival");
        let echo = bus.on_topic(TOPIC_VEHICLE_STATE)[0].clone();
        let update: VehicleStateUpdate = serde_json::from_value(echo).unwrap();

        c.on_vehicle_state(update);
        c.on_vehicle_state(update);
        assert_eq!(c.state(), state(true, false, false));
        assert_eq!(c.current_destination().unwrap().name, "festival");
        assert_eq!(bus.count(TOPIC_VEHICLE_STATE), 1);
    }

    #[test]
    fn test_announce_registers_cart() {
        let (c, bus) = setup();
        c.announce();
        assert_eq!(bus.on_topic(TOPIC_REGISTER)[0]["name"], "James");
        let snapshot = ui_events(&bus, "vehicle_state");
        assert_eq!(snapshot[0]["state"]["reached_destination"], true);
    }
}
