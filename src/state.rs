// Vehicle navigation/stop/resume state machine
// Transitions return the effects to carry out; publishing and timers are the caller's job.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::Destination;
use crate::transform::GeoPosition;

/// Composite vehicle state as exchanged on the vehicle-state topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleState {
    pub is_navigating: bool,
    pub reached_destination: bool,
    pub stopped: bool,
}

impl VehicleState {
    /// Idle, at rest
    pub const IDLE: VehicleState = VehicleState {
        is_navigating: false,
        reached_destination: true,
        stopped: false,
    };

    /// Not navigating, not stopped, not arrived: never produced by well-formed input
    pub fn is_degenerate(&self) -> bool {
        !self.is_navigating && !self.stopped && !self.reached_destination
    }

    /// Cart may move only when navigating and not stopped
    pub fn may_move(&self) -> bool {
        self.is_navigating && !self.stopped
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::IDLE
    }
}

/// Possibly partial snapshot received from the bus; missing fields keep their value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VehicleStateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_navigating: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reached_destination: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped: Option<bool>,
}

impl VehicleStateUpdate {
    pub fn merged(&self, current: VehicleState) -> VehicleState {
        VehicleState {
            is_navigating: self.is_navigating.unwrap_or(current.is_navigating),
            reached_destination: self.reached_destination.unwrap_or(current.reached_destination),
            stopped: self.stopped.unwrap_or(current.stopped),
        }
    }
}

impl From<VehicleState> for VehicleStateUpdate {
    fn from(state: VehicleState) -> Self {
        Self {
            is_navigating: Some(state.is_navigating),
            reached_destination: Some(state.reached_destination),
            stopped: Some(state.stopped),
        }
    }
}

/// Side effects requested by a transition, in the order they must happen
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Publish the new local state on the vehicle-state topic
    PublishState(VehicleState),
    /// Send a navigation goal
    NavigateTo(GeoPosition),
    StartStopSequence,
    CancelStopSequence,
    /// Remaining path must be emptied (destination reached)
    ClearRemainingPath,
    /// Current destination changed (selection highlight)
    DestinationChanged(Option<String>),
}

#[derive(Debug, Default)]
pub struct VehicleStateMachine {
    state: VehicleState,
    current_destination: Option<Destination>,
    awaiting_confirmation: bool,
}

impl VehicleStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> VehicleState {
        self.state
    }

    pub fn current_destination(&self) -> Option<&Destination> {
        self.current_destination.as_ref()
    }

    /// True between a local transition and the next update from the bus
    pub fn awaiting_confirmation(&self) -> bool {
        self.awaiting_confirmation
    }

    fn set_local(&mut self, state: VehicleState) {
        self.state = state;
        self.awaiting_confirmation = true;
    }

    /// Start navigating to `destination`; ignored while already navigating
    pub fn request_navigate(&mut self, destination: &Destination) -> Vec<Effect> {
        if self.state.is_navigating {
            info!("Already navigating, ignoring request for {}", destination.name);
            return Vec::new();
        }

        info!("Navigating to {}", destination.name);
        self.set_local(VehicleState {
            is_navigating: true,
            reached_destination: false,
            ..self.state
        });
        self.current_destination = Some(destination.clone());

        vec![
            Effect::NavigateTo(destination.position),
            Effect::PublishState(self.state),
            Effect::DestinationChanged(Some(destination.name.clone())),
        ]
    }

    /// Authoritative update from the bus. Always applied, last write wins.
    pub fn external_update(&mut self, update: VehicleStateUpdate) -> Vec<Effect> {
        let previous = self.state;
        let mut next = update.merged(previous);

        if next.is_degenerate() {
            warn!("Received inconsistent vehicle state {:?}, treating as idle", next);
            next = VehicleState::IDLE;
        }

        self.state = next;
        self.awaiting_confirmation = false;

        let mut effects = Vec::new();
        if previous.stopped && !next.stopped {
            // Stop lifted elsewhere; resume() would now be a no-op
            info!("Stop cleared by vehicle state update");
            effects.push(Effect::CancelStopSequence);
        }
        if next.reached_destination && !previous.reached_destination {
            info!("Destination reached");
            effects.push(Effect::ClearRemainingPath);
            if self.current_destination.take().is_some() {
                effects.push(Effect::DestinationChanged(None));
            }
        }
        effects
    }

    /// Always allowed. Keeps the destination so that resume continues the trip.
    pub fn emergency_stop(&mut self) -> Vec<Effect> {
        warn!("Emergency stop requested");
        self.set_local(VehicleState {
            is_navigating: false,
            stopped: true,
            ..self.state
        });
        vec![Effect::StartStopSequence, Effect::PublishState(self.state)]
    }

    /// Leave the stopped state; ignored when not stopped
    pub fn resume(&mut self) -> Vec<Effect> {
        if !self.state.stopped {
            info!("Not stopped, ignoring resume");
            return Vec::new();
        }

        info!("Resuming");
        self.set_local(VehicleState {
            is_navigating: true,
            stopped: false,
            ..self.state
        });

        let mut effects = vec![Effect::CancelStopSequence, Effect::PublishState(self.state)];
        if let Some(destination) = &self.current_destination {
            effects.push(Effect::NavigateTo(destination.position));
        }
        effects
    }
}
