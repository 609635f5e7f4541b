// Static destination catalog, loaded once at start-up and read-only afterwards

use serde::{Deserialize, Serialize};

use crate::transform::GeoPosition;

/// Catalog entry as stored on disk: `{name, displayName, lat, long, url?, disabled?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationRecord {
    pub name: String,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    pub lat: f64,
    pub long: f64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub name: String,
    pub display_name: String,
    pub position: GeoPosition,
    pub url: Option<String>,
    pub disabled: bool,
}

impl From<DestinationRecord> for Destination {
    fn from(record: DestinationRecord) -> Self {
        Self {
            display_name: record.display_name.unwrap_or_else(|| record.name.clone()),
            name: record.name,
            position: GeoPosition::new(record.lat, record.long),
            url: record.url,
            disabled: record.disabled,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    destinations: Vec<Destination>,
}

impl Catalog {
    pub fn new(destinations: Vec<Destination>) -> Self {
        Self { destinations }
    }

    pub fn from_records(records: Vec<DestinationRecord>) -> Self {
        Self::new(records.into_iter().map(Destination::from).collect())
    }

    /// Stops served on the JMU campus loop
    pub fn campus() -> Self {
        let stop = |name: &str, display: &str, lat: f64, long: f64| Destination {
            name: name.to_string(),
            display_name: display.to_string(),
            position: GeoPosition::new(lat, long),
            url: None,
            disabled: false,
        };
        Self::new(vec![
            stop("festival", "Festival", 38.431957, -78.860981),
            stop("chesapeake", "Chesapeake Hall", 38.433347, -78.863156),
            stop("ehall", "E-Hall", 38.433152, -78.861414),
            stop("king", "King Hall", 38.434637, -78.862598),
            stop("rmh", "Hospital", 38.435491, -78.869914),
        ])
    }

    pub fn all(&self) -> &[Destination] {
        &self.destinations
    }

    /// Destinations that may be selected
    pub fn enabled(&self) -> Vec<Destination> {
        self.destinations.iter().filter(|d| !d.disabled).cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}
