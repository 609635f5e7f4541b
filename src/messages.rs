// Define message types exchanged on the bus
// Payloads are JSON. Inbound messages are decoded into explicit types and
// validated; anything malformed is rejected at the boundary.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::state::VehicleState;
use crate::transform::{GeoPosition, LocalPosition};
use crate::voice::CommandIntent;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed payload on {topic}: {source}")]
    Json {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid payload on {topic}: {reason}")]
    Invalid { topic: String, reason: String },
}

/// Field-level checks beyond what the JSON shape guarantees
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Decode and validate one payload received on `topic`
pub fn decode<T: DeserializeOwned + Validate>(
    topic: &str,
    payload: &[u8],
) -> Result<T, DecodeError> {
    let msg: T = serde_json::from_slice(payload).map_err(|source| DecodeError::Json {
        topic: topic.to_string(),
        source,
    })?;
    msg.validate().map_err(|reason| DecodeError::Invalid {
        topic: topic.to_string(),
        reason,
    })?;
    Ok(msg)
}

/// geometry_msgs/Point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    fn check(&self) -> Result<(), String> {
        if self.x.is_finite() && self.y.is_finite() && self.z.is_finite() {
            Ok(())
        } else {
            Err(format!("non-finite point {:?}", self))
        }
    }
}

impl From<Point> for LocalPosition {
    fn from(p: Point) -> Self {
        LocalPosition::new(p.x, p.y)
    }
}

impl From<LocalPosition> for Point {
    fn from(p: LocalPosition) -> Self {
        Point { x: p.x, y: p.y, z: 0.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseWithCovariance {
    pub pose: Pose,
    #[serde(default)]
    pub covariance: Vec<f64>,
}

/// Localization output (PoseWithCovarianceStamped, header ignored)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseMessage {
    pub pose: PoseWithCovariance,
}

impl PoseMessage {
    pub fn position(&self) -> LocalPosition {
        self.pose.pose.position.into()
    }
}

impl Validate for PoseMessage {
    fn validate(&self) -> Result<(), String> {
        self.pose.pose.position.check()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marker {
    pub pose: Pose,
}

/// Planned path as a marker list; only positions are used, in list order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerArray {
    pub markers: Vec<Marker>,
}

impl MarkerArray {
    pub fn positions(&self) -> Vec<LocalPosition> {
        self.markers.iter().map(|m| m.pose.position.into()).collect()
    }
}

impl Validate for MarkerArray {
    fn validate(&self) -> Result<(), String> {
        self.markers.iter().try_for_each(|m| m.pose.position.check())
    }
}

impl Validate for crate::state::VehicleStateUpdate {}

impl Validate for crate::voice::Utterance {}

/// Navigation goal (PointStamped)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickedPoint {
    pub point: Point,
}

/// Stop channel 1: velocity/angle command. Negative velocity = emergency brake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelAngle {
    pub vel: f32,
    pub angle: f32,
}

impl VelAngle {
    pub const EMERGENCY_BRAKE: VelAngle = VelAngle { vel: -1.0, angle: 0.0 };
}

/// std_msgs/Bool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoolMsg {
    pub data: bool,
}

/// std_msgs/UInt8, brake pressure 0..=255
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrakeMsg {
    pub data: u8,
}

impl BrakeMsg {
    pub const FULL: BrakeMsg = BrakeMsg { data: 255 };
    pub const RELEASED: BrakeMsg = BrakeMsg { data: 0 };
}

/// Request from the touch panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiRequest {
    Select { name: String },
    Stop,
    Resume,
    Help,
    Confirm,
    Cancel,
}

impl Validate for UiRequest {}

impl From<UiRequest> for CommandIntent {
    fn from(req: UiRequest) -> Self {
        match req {
            UiRequest::Select { name } => CommandIntent::GoTo { name },
            UiRequest::Stop => CommandIntent::Stop,
            UiRequest::Resume => CommandIntent::Resume,
            UiRequest::Help => CommandIntent::Help,
            UiRequest::Confirm => CommandIntent::Confirm,
            UiRequest::Cancel => CommandIntent::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Read-only snapshot pushed to the map/UI after every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    VehicleState {
        state: VehicleState,
        awaiting_confirmation: bool,
    },
    CartPosition {
        position: GeoPosition,
    },
    FullPath {
        path: Vec<GeoPosition>,
    },
    RemainingPath {
        path: Vec<GeoPosition>,
        progress_percent: f64,
    },
    Camera {
        center: GeoPosition,
        zoom: f64,
    },
    Selection {
        destination: Option<String>,
    },
    Notice {
        level: NoticeLevel,
        text: String,
    },
}

impl UiEvent {
    pub fn info(text: impl Into<String>) -> Self {
        UiEvent::Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        UiEvent::Notice {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }
}

/// Cart announcement for the backend bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
}

/// Help toggle for the backend bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpRequest {
    pub name: String,
    pub help_requested: bool,
}

/// Health status published by the console
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleHealth {
    Ok,
    PoseStale,
    /// Publishes are failing; takes priority over localization status
    TransportDown,
}
