//! Coordinate text parsing.
//!
//! # Responsibility
//! - Extract local and geodetic values from capture sidecar files.
//! - Turn the extracted values into a bundle plus its provenance tag.
//!
//! # Invariants
//! - `position = [x, y, z];` takes precedence over individual entries.
//! - Geodetic values win over local ones when both are present.
//! - Local values need a project origin to produce a bundle.

use crate::geodesy::bundle::BundleBuilder;
use crate::model::geo::{CoordinateBundle, GeoPoint, GeoPointError, LocalCoordinate, ProjectOrigin};
use crate::model::item::CoordinateSource;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const NUMBER: &str = r"([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)";

static POSITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)position\s*=\s*\[\s*{NUMBER}\s*,\s*{NUMBER}\s*,\s*{NUMBER}\s*\]"
    ))
    .expect("valid position regex")
});
static X_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b[xX]\s*:\s*{NUMBER}")).expect("valid x regex"));
static Y_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b[yY]\s*:\s*{NUMBER}")).expect("valid y regex"));
static Z_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b[zZ]\s*:\s*{NUMBER}")).expect("valid z regex"));
static LAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:latitude|lat)\s*:\s*{NUMBER}")).expect("valid latitude regex")
});
static LNG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:longitude|lon|lng)\s*:\s*{NUMBER}"))
        .expect("valid longitude regex")
});

/// Error while importing coordinates from text.
#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    /// Text contains no recognizable coordinate entry.
    NoCoordinates,
    InvalidNumber { field: &'static str, value: String },
    InvalidPoint(GeoPointError),
    /// Local x/y found but the project has no origin.
    MissingOrigin,
    /// Table header lacks a required column; `available` lists the header.
    MissingColumn {
        column: &'static str,
        available: Vec<String>,
    },
    InvalidZone(u8),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read coordinate file: {err}"),
            Self::NoCoordinates => write!(f, "no coordinates found in file"),
            Self::InvalidNumber { field, value } => {
                write!(f, "invalid number for `{field}`: `{value}`")
            }
            Self::InvalidPoint(err) => write!(f, "{err}"),
            Self::MissingOrigin => {
                write!(f, "local coordinates require a project origin")
            }
            Self::MissingColumn { column, available } => write!(
                f,
                "no `{column}` column found; available columns: {}",
                available.join(", ")
            ),
            Self::InvalidZone(zone) => write!(f, "utm zone must be within 1..=60, got {zone}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::InvalidPoint(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<GeoPointError> for ImportError {
    fn from(value: GeoPointError) -> Self {
        Self::InvalidPoint(value)
    }
}

/// Layout a coordinate file used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateFormat {
    /// `position = [x, y, z];`
    PositionArray,
    /// Individual `Key: value` entries.
    Fields,
}

/// Values extracted from a coordinate file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedCoordinates {
    pub format: CoordinateFormat,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ParsedCoordinates {
    fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.z.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
    }
}

/// Parses coordinate entries from free-form text.
///
/// # Errors
/// - `NoCoordinates` when neither format matches.
/// - `InvalidNumber` when a matched value does not parse as `f64`.
pub fn parse_coordinate_text(text: &str) -> Result<ParsedCoordinates, ImportError> {
    if let Some(caps) = POSITION_RE.captures(text) {
        return Ok(ParsedCoordinates {
            format: CoordinateFormat::PositionArray,
            x: Some(number(&caps, 1, "x")?),
            y: Some(number(&caps, 2, "y")?),
            z: Some(number(&caps, 3, "z")?),
            latitude: None,
            longitude: None,
        });
    }

    let parsed = ParsedCoordinates {
        format: CoordinateFormat::Fields,
        x: field(&X_RE, text, "x")?,
        y: field(&Y_RE, text, "y")?,
        z: field(&Z_RE, text, "z")?,
        latitude: field(&LAT_RE, text, "latitude")?,
        longitude: field(&LNG_RE, text, "longitude")?,
    };
    if parsed.is_empty() {
        return Err(ImportError::NoCoordinates);
    }
    Ok(parsed)
}

/// Reads and parses a coordinate file.
pub fn read_coordinate_file(path: &Path) -> Result<ParsedCoordinates, ImportError> {
    let text = std::fs::read_to_string(path)?;
    parse_coordinate_text(&text)
}

/// Builds the bundle described by parsed values.
///
/// Height defaults to `0.0` when the file has no `z`.
///
/// # Errors
/// - `InvalidPoint` when geodetic values, or local values resolved through
///   the origin, fall outside the valid latitude/longitude range.
/// - `MissingOrigin` for local values without a project origin.
pub fn resolve_import(
    parsed: &ParsedCoordinates,
    origin: Option<&ProjectOrigin>,
    builder: &BundleBuilder,
) -> Result<(CoordinateBundle, CoordinateSource), ImportError> {
    let z = parsed.z.unwrap_or(0.0);

    if let (Some(latitude), Some(longitude)) = (parsed.latitude, parsed.longitude) {
        let geo = GeoPoint::new(latitude, longitude)?;
        return Ok((
            builder.build_at_height(geo, origin, z),
            CoordinateSource::Geo,
        ));
    }

    if let (Some(x), Some(y)) = (parsed.x, parsed.y) {
        let origin = origin.ok_or(ImportError::MissingOrigin)?;
        let local = LocalCoordinate { x, y, z };
        return Ok((builder.build_from_local(&local, origin)?, CoordinateSource::Local));
    }

    Err(ImportError::NoCoordinates)
}

fn field(re: &Regex, text: &str, name: &'static str) -> Result<Option<f64>, ImportError> {
    re.captures(text)
        .map(|caps| number(&caps, 1, name))
        .transpose()
}

fn number(caps: &Captures<'_>, group: usize, field: &'static str) -> Result<f64, ImportError> {
    let raw = caps.get(group).map_or("", |m| m.as_str());
    raw.parse::<f64>().map_err(|_| ImportError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_coordinate_text, resolve_import, CoordinateFormat, ImportError};
    use crate::geodesy::bundle::BundleBuilder;
    use crate::model::geo::{GeoPoint, ProjectOrigin};
    use crate::model::item::CoordinateSource;

    #[test]
    fn position_array_takes_precedence() {
        let parsed =
            parse_coordinate_text("Lat: 10.0\nLng: 20.0\nposition = [1.5, -2.25, 3e1];").unwrap();
        assert_eq!(parsed.format, CoordinateFormat::PositionArray);
        assert_eq!(parsed.x, Some(1.5));
        assert_eq!(parsed.y, Some(-2.25));
        assert_eq!(parsed.z, Some(30.0));
        assert_eq!(parsed.latitude, None);
    }

    #[test]
    fn individual_entries_are_recognized() {
        let parsed =
            parse_coordinate_text("X: 12.5\nY: -4\nZ: 1.75\nLatitude: 40.4\nLongitude: -3.7\n")
                .unwrap();
        assert_eq!(parsed.format, CoordinateFormat::Fields);
        assert_eq!(parsed.x, Some(12.5));
        assert_eq!(parsed.y, Some(-4.0));
        assert_eq!(parsed.z, Some(1.75));
        assert_eq!(parsed.latitude, Some(40.4));
        assert_eq!(parsed.longitude, Some(-3.7));
    }

    #[test]
    fn text_without_coordinates_is_rejected() {
        assert!(matches!(
            parse_coordinate_text("camera: ricoh theta"),
            Err(ImportError::NoCoordinates)
        ));
    }

    #[test]
    fn geodetic_values_win_over_local_ones() {
        let parsed = parse_coordinate_text("X: 5\nY: 5\nlat: 40.0\nlng: -3.0").unwrap();
        let (bundle, source) =
            resolve_import(&parsed, None, &BundleBuilder::default()).unwrap();
        assert_eq!(source, CoordinateSource::Geo);
        assert_eq!(bundle.geo, GeoPoint::new(40.0, -3.0).unwrap());
        assert!(bundle.local.is_none());
    }

    #[test]
    fn local_values_require_origin() {
        let parsed = parse_coordinate_text("position = [10, 0, 2];").unwrap();
        let builder = BundleBuilder::default();
        assert!(matches!(
            resolve_import(&parsed, None, &builder),
            Err(ImportError::MissingOrigin)
        ));

        let origin = ProjectOrigin {
            origin: GeoPoint::new(40.0, -3.0).unwrap(),
            rotation_degrees: 0.0,
        };
        let (bundle, source) = resolve_import(&parsed, Some(&origin), &builder).unwrap();
        assert_eq!(source, CoordinateSource::Local);
        let local = bundle.local.unwrap();
        assert!((local.x - 10.0).abs() < 1e-6);
        assert!(local.y.abs() < 1e-6);
        assert_eq!(local.z, 2.0);
    }

    #[test]
    fn local_values_far_from_origin_are_rejected() {
        let parsed = parse_coordinate_text("position = [0, 20000000, 0];").unwrap();
        let origin = ProjectOrigin {
            origin: GeoPoint::new(40.0, -3.0).unwrap(),
            rotation_degrees: 0.0,
        };
        assert!(matches!(
            resolve_import(&parsed, Some(&origin), &BundleBuilder::default()),
            Err(ImportError::InvalidPoint(_))
        ));
    }

    #[test]
    fn out_of_range_latitude_is_reported() {
        let parsed = parse_coordinate_text("lat: 95\nlng: 0").unwrap();
        assert!(matches!(
            resolve_import(&parsed, None, &BundleBuilder::default()),
            Err(ImportError::InvalidPoint(_))
        ));
    }
}
