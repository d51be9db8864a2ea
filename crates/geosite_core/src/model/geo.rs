//! Coordinate value types.
//!
//! # Responsibility
//! - Represent one location in geodetic, UTM and project-local frames.
//! - Validate raw latitude/longitude input before it enters the core.
//!
//! # Invariants
//! - `GeoPoint::latitude` is in `[-90, 90]`, `longitude` in `[-180, 180]`.
//! - `UtmCoordinate` is only produced by the projector, never hand-edited.
//! - `CoordinateBundle::local` is `None` exactly when no project origin applies.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Datum tag used when none is configured.
pub const DEFAULT_DATUM: Datum = Datum::Etrs89;

/// Validation error for raw geodetic input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoPointError {
    InvalidLatitude(f64),
    InvalidLongitude(f64),
}

impl Display for GeoPointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLatitude(value) => {
                write!(f, "latitude out of range [-90, 90]: {value}")
            }
            Self::InvalidLongitude(value) => {
                write!(f, "longitude out of range [-180, 180]: {value}")
            }
        }
    }
}

impl Error for GeoPointError {}

/// WGS84 latitude/longitude in decimal degrees.
///
/// Deserialization runs the same range check as [`GeoPoint::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = GeoPointError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl GeoPoint {
    /// Creates a range-checked point.
    ///
    /// # Errors
    /// - `InvalidLatitude` when latitude is NaN or outside `[-90, 90]`.
    /// - `InvalidLongitude` when longitude is NaN or outside `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoPointError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoPointError::InvalidLatitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoPointError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Hemisphere letter of a UTM coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hemisphere {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
}

impl Hemisphere {
    pub fn as_char(self) -> char {
        match self {
            Self::North => 'N',
            Self::South => 'S',
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "N" | "n" => Some(Self::North),
            "S" | "s" => Some(Self::South),
            _ => None,
        }
    }
}

/// Reference datum tag; selects the ellipsoid used by the projector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Datum {
    #[serde(rename = "ETRS89")]
    Etrs89,
    #[serde(rename = "WGS84")]
    Wgs84,
}

impl Datum {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Etrs89 => "ETRS89",
            Self::Wgs84 => "WGS84",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ETRS89" => Some(Self::Etrs89),
            "WGS84" => Some(Self::Wgs84),
            _ => None,
        }
    }

    /// Semi-major axis in meters and flattening of the datum ellipsoid.
    pub fn ellipsoid(self) -> (f64, f64) {
        match self {
            // GRS80
            Self::Etrs89 => (6_378_137.0, 1.0 / 298.257_222_101),
            Self::Wgs84 => (6_378_137.0, 1.0 / 298.257_223_563),
        }
    }
}

impl Default for Datum {
    fn default() -> Self {
        DEFAULT_DATUM
    }
}

/// Projected UTM position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtmCoordinate {
    /// Meters, including the 500 000 m false easting.
    pub easting: f64,
    /// Meters, including the 10 000 000 m false northing in the south.
    pub northing: f64,
    /// Zone number in `1..=60`.
    pub zone: u8,
    pub hemisphere: Hemisphere,
    pub datum: Datum,
}

/// Project-local planar position in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalCoordinate {
    pub x: f64,
    pub y: f64,
    /// Independent height; never derived from latitude/longitude.
    pub z: f64,
}

/// Local frame definition of one project.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectOrigin {
    pub origin: GeoPoint,
    /// Counter-clockwise positive, in degrees.
    pub rotation_degrees: f64,
}

/// All three representations of one placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateBundle {
    pub geo: GeoPoint,
    pub utm: UtmCoordinate,
    pub local: Option<LocalCoordinate>,
}

impl CoordinateBundle {
    /// Returns a copy with the local height replaced.
    ///
    /// A bundle without local frame stays without one; the height of such
    /// items travels separately to persistence.
    pub fn with_height(mut self, z: f64) -> Self {
        if let Some(local) = self.local.as_mut() {
            local.z = z;
        }
        self
    }

    /// Local height, `0.0` when no local frame is present.
    pub fn height(&self) -> f64 {
        self.local.map_or(0.0, |local| local.z)
    }
}

#[cfg(test)]
mod tests {
    use super::{Datum, GeoPoint, GeoPointError, Hemisphere};

    #[test]
    fn geo_point_rejects_out_of_range_values() {
        assert_eq!(
            GeoPoint::new(91.0, 0.0),
            Err(GeoPointError::InvalidLatitude(91.0))
        );
        assert_eq!(
            GeoPoint::new(0.0, -180.5),
            Err(GeoPointError::InvalidLongitude(-180.5))
        );
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn deserialization_is_range_checked() {
        let point: GeoPoint = serde_json::from_str(r#"{"latitude":40.5,"longitude":-3.5}"#).unwrap();
        assert_eq!(point, GeoPoint::new(40.5, -3.5).unwrap());

        let err = serde_json::from_str::<GeoPoint>(r#"{"latitude":95.0,"longitude":0.0}"#)
            .unwrap_err();
        assert!(err.to_string().contains("latitude out of range"));
        assert!(serde_json::from_str::<GeoPoint>(r#"{"latitude":0.0,"longitude":181.0}"#).is_err());
    }

    #[test]
    fn datum_and_hemisphere_parse_tags() {
        assert_eq!(Datum::parse(" etrs89 "), Some(Datum::Etrs89));
        assert_eq!(Datum::parse("WGS84"), Some(Datum::Wgs84));
        assert_eq!(Datum::parse("ED50"), None);
        assert_eq!(Hemisphere::parse("s"), Some(Hemisphere::South));
        assert_eq!(Hemisphere::North.as_char(), 'N');
    }
}
