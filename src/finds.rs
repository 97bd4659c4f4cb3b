/// Core data model for rock finds
///
/// These types flow between the storage layer, the map, and the UI:
/// - RockType: the fixed five-value enumeration with its pin color table
/// - Coordinates: a validated lat/lng pair
/// - Find / NewFind: a stored find and the pre-insert shape of one

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed set of rock types a find can be labeled with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RockType {
    Petoskey,
    Quartz,
    Copper,
    Agate,
    Other,
}

/// All rock types in the order they appear in the form's picker.
/// The first entry is the form's default selection.
pub const ROCK_TYPES: [RockType; 5] = [
    RockType::Petoskey,
    RockType::Quartz,
    RockType::Copper,
    RockType::Agate,
    RockType::Other,
];

impl RockType {
    /// The stored / displayed name of this rock type
    pub fn as_str(self) -> &'static str {
        match self {
            RockType::Petoskey => "Petoskey",
            RockType::Quartz => "Quartz",
            RockType::Copper => "Copper",
            RockType::Agate => "Agate",
            RockType::Other => "Other",
        }
    }

    /// Parse a stored rock type name.
    /// Returns an error for anything outside the five-value enumeration.
    pub fn parse(s: &str) -> Result<Self, UnknownRockType> {
        match s {
            "Petoskey" => Ok(RockType::Petoskey),
            "Quartz" => Ok(RockType::Quartz),
            "Copper" => Ok(RockType::Copper),
            "Agate" => Ok(RockType::Agate),
            "Other" => Ok(RockType::Other),
            other => Err(UnknownRockType(other.to_string())),
        }
    }
}

impl std::fmt::Display for RockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored rock_type value outside the enumeration (corrupt or foreign row)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rock type: {0}")]
pub struct UnknownRockType(pub String);

/// Maps a rock type to its pin color on the map.
/// Total over the enumeration; every type has exactly one color.
pub fn pin_color(rock_type: RockType) -> &'static str {
    // Blue, Green, Gold, Orange, Gray
    match rock_type {
        RockType::Petoskey => "#2563EB",
        RockType::Quartz => "#16A34A",
        RockType::Copper => "#D97706",
        RockType::Agate => "#F97316",
        RockType::Other => "#6B7280",
    }
}

/// A latitude/longitude pair in degrees
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Build a coordinate pair, rejecting values outside
    /// [-90, 90] latitude or [-180, 180] longitude.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let coords = Coordinates { lat, lng };
        coords.is_valid().then_some(coords)
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A user-submitted observation as stored by the backend
///
/// `id` is assigned by the backend on insert and is the sole key used to
/// correlate a find with its on-screen marker. All fields are immutable
/// once the record exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Find {
    pub id: Uuid,
    pub user_id: Uuid,
    pub rock_type: RockType,
    /// Optional free text; None when the user left the note empty
    pub note: Option<String>,
    /// Object-store key of the photo, namespaced by user id
    pub photo_path: String,
    pub lat: f64,
    pub lng: f64,
    /// Assigned by the backend; the feed's sort key (descending)
    pub created_at: DateTime<Utc>,
}

/// A find as submitted for insertion, before the backend assigns
/// `id` and `created_at`
#[derive(Debug, Clone, PartialEq)]
pub struct NewFind {
    pub user_id: Uuid,
    pub rock_type: RockType,
    pub note: Option<String>,
    pub photo_path: String,
    pub lat: f64,
    pub lng: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rock_type_round_trip() {
        for rock_type in ROCK_TYPES {
            assert_eq!(RockType::parse(rock_type.as_str()), Ok(rock_type));
        }
    }

    #[test]
    fn test_unknown_rock_type_rejected() {
        let err = RockType::parse("Granite").unwrap_err();
        assert_eq!(err, UnknownRockType("Granite".to_string()));
    }

    #[test]
    fn test_pin_color_is_total() {
        for rock_type in ROCK_TYPES {
            let color = pin_color(rock_type);
            assert!(color.starts_with('#'));
            assert_eq!(color.len(), 7);
        }
    }

    #[test]
    fn test_copper_pin_color() {
        assert_eq!(pin_color(RockType::Copper), "#D97706");
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinates::new(44.8, -85.5).is_some());
        assert!(Coordinates::new(90.0, 180.0).is_some());
        assert!(Coordinates::new(90.1, 0.0).is_none());
        assert!(Coordinates::new(0.0, -180.5).is_none());
    }
}
