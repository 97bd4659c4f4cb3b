/// Application configuration
///
/// A small JSON file in the data directory holding the map defaults and
/// the home coordinates used by the location provider. Written with
/// defaults on first run so users can find and edit it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::finds::Coordinates;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Initial map center
    pub map_center: Coordinates,
    /// Initial map zoom level
    pub map_zoom: f32,
    /// Where "drop a pin here" resolves on machines without a location
    /// source; None disables the add-find flow with a permission notice
    pub home_location: Option<Coordinates>,
}

impl Default for AppConfig {
    fn default() -> Self {
        // Michigan, zoom 7
        let center = Coordinates {
            lat: 44.8,
            lng: -85.5,
        };
        AppConfig {
            map_center: center,
            map_zoom: 7.0,
            home_location: Some(center),
        }
    }
}

impl AppConfig {
    /// Load the config file, writing defaults when it doesn't exist.
    /// An unreadable file falls back to defaults with a warning rather
    /// than blocking startup.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("⚠️  Ignoring invalid config {}: {e}", path.display());
                    AppConfig::default()
                }
            },
            Err(_) => {
                let config = AppConfig::default();
                if let Ok(json) = serde_json::to_string_pretty(&config) {
                    if let Err(e) = std::fs::write(path, json) {
                        eprintln!("⚠️  Could not write default config: {e}");
                    }
                }
                config
            }
        }
    }
}
