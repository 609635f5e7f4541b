// Timeouts, topics, thresholds and the optional JSON config file
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::catalog::DestinationRecord;

// Runtime loop frequency (watchdog + debounce housekeeping)
pub const LOOP_HZ: u64 = 10;

// Localization watchdog: pose older than this is stale
pub const POSE_TIMEOUT: Duration = Duration::from_secs(2);

// Stop sequencer re-send period
pub const STOP_REPEAT_INTERVAL: Duration = Duration::from_millis(1900);

// Voice pipeline
pub const DEFAULT_WAKE_WORD: &str = "james";
pub const MAX_COMMAND_WORDS: usize = 5;
pub const MATCH_THRESHOLD: f64 = 0.6;
pub const UTTERANCE_DEBOUNCE: Duration = Duration::from_millis(1500);

// Map camera zoom while following the cart
pub const FOLLOW_ZOOM: f64 = 19.0;

pub const DEFAULT_CART_NAME: &str = "James";

// Inbound topics (ROS topics as exposed by the zenoh bridge)
pub const TOPIC_POSE: &str = "pcl_pose"; // localization
pub const TOPIC_PATH: &str = "visual_path"; // planned path markers
pub const TOPIC_VEHICLE_STATE: &str = "vehicle_state"; // bidirectional
pub const TOPIC_VOICE: &str = "jacart/voice/utterance"; // recognizer output
pub const TOPIC_UI_REQUEST: &str = "jacart/ui/request"; // touch panel

// Outbound topics
pub const TOPIC_CLICKED_POINT: &str = "clicked_point"; // navigation goal
pub const TOPIC_NAV_CMD: &str = "nav_cmd"; // stop channel 1: velocity/angle
pub const TOPIC_MANUAL_CONTROL: &str = "set_manual_control"; // stop channel 2
pub const TOPIC_BRAKE: &str = "brake_cmd"; // stop channel 3
pub const TOPIC_UI_EVENT: &str = "jacart/ui/event";
pub const TOPIC_REGISTER: &str = "jacart/backend/register";
pub const TOPIC_HELP: &str = "jacart/backend/help";
pub const TOPIC_HEALTH: &str = "jacart/console/health";

/// Affine map from the vehicle frame to (lng, lat), fitted on campus.
pub const CAMPUS_TRANSFORM: [[f64; 3]; 3] = [
    [-0.00000156, 0.00001108, -78.86214758],
    [-0.00000849, -0.00000137, 38.43388357],
    [0.0, 0.0, 1.0],
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings that may be overridden per cart. Every field has a default so an
/// empty `{}` file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub cart_name: String,
    pub wake_word: String,
    pub match_threshold: f64,
    pub transform: [[f64; 3]; 3],
    pub destinations: Option<Vec<DestinationRecord>>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            cart_name: DEFAULT_CART_NAME.to_string(),
            wake_word: DEFAULT_WAKE_WORD.to_string(),
            match_threshold: MATCH_THRESHOLD,
            transform: CAMPUS_TRANSFORM,
            destinations: None,
        }
    }
}

impl ConsoleConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
