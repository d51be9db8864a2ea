//! Flat coordinate field mapping shared by storage rows and JSON payloads.
//!
//! Field names follow the backend schema (`geo_latitude`, `utm_zone`, ...).

use crate::model::geo::{
    CoordinateBundle, Datum, GeoPoint, Hemisphere, LocalCoordinate, UtmCoordinate,
};
use serde::{Deserialize, Serialize};

/// Flattened coordinate columns of one item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoordinateFields {
    pub geo_latitude: Option<f64>,
    pub geo_longitude: Option<f64>,
    pub utm_easting: Option<f64>,
    pub utm_northing: Option<f64>,
    pub utm_zone: Option<u8>,
    pub utm_hemisphere: Option<String>,
    pub utm_datum: Option<String>,
    pub project_x: Option<f64>,
    pub project_y: Option<f64>,
    #[serde(default)]
    pub project_z: f64,
}

impl CoordinateFields {
    pub fn from_bundle(bundle: &CoordinateBundle, z: f64) -> Self {
        Self {
            geo_latitude: Some(bundle.geo.latitude),
            geo_longitude: Some(bundle.geo.longitude),
            utm_easting: Some(bundle.utm.easting),
            utm_northing: Some(bundle.utm.northing),
            utm_zone: Some(bundle.utm.zone),
            utm_hemisphere: Some(bundle.utm.hemisphere.as_char().to_string()),
            utm_datum: Some(bundle.utm.datum.tag().to_string()),
            project_x: bundle.local.map(|local| local.x),
            project_y: bundle.local.map(|local| local.y),
            project_z: z,
        }
    }

    /// Key/value pairs for form-encoded request bodies; absent fields are skipped.
    pub fn to_form_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(10);
        let mut push = |key: &'static str, value: Option<String>| {
            if let Some(value) = value {
                pairs.push((key, value));
            }
        };
        push("geo_latitude", self.geo_latitude.map(|v| v.to_string()));
        push("geo_longitude", self.geo_longitude.map(|v| v.to_string()));
        push("utm_easting", self.utm_easting.map(|v| v.to_string()));
        push("utm_northing", self.utm_northing.map(|v| v.to_string()));
        push("utm_zone", self.utm_zone.map(|v| v.to_string()));
        push("utm_hemisphere", self.utm_hemisphere.clone());
        push("utm_datum", self.utm_datum.clone());
        push("project_x", self.project_x.map(|v| v.to_string()));
        push("project_y", self.project_y.map(|v| v.to_string()));
        push("project_z", Some(self.project_z.to_string()));
        pairs
    }

    /// Rebuilds the bundle; `Ok(None)` for unplaced items.
    ///
    /// # Errors
    /// Returns a message when the geodetic point is out of range or the UTM
    /// columns are incomplete for a placed item.
    pub fn to_bundle(&self) -> Result<Option<CoordinateBundle>, String> {
        let (Some(latitude), Some(longitude)) = (self.geo_latitude, self.geo_longitude) else {
            return Ok(None);
        };
        let geo = GeoPoint::new(latitude, longitude).map_err(|err| err.to_string())?;

        let utm = match (
            self.utm_easting,
            self.utm_northing,
            self.utm_zone,
            self.utm_hemisphere.as_deref(),
        ) {
            (Some(easting), Some(northing), Some(zone), Some(hemisphere)) => UtmCoordinate {
                easting,
                northing,
                zone,
                hemisphere: Hemisphere::parse(hemisphere)
                    .ok_or_else(|| format!("invalid utm_hemisphere `{hemisphere}`"))?,
                datum: match self.utm_datum.as_deref() {
                    Some(tag) => {
                        Datum::parse(tag).ok_or_else(|| format!("invalid utm_datum `{tag}`"))?
                    }
                    None => Datum::default(),
                },
            },
            _ => return Err("placed item has incomplete utm columns".to_string()),
        };

        let local = match (self.project_x, self.project_y) {
            (Some(x), Some(y)) => Some(LocalCoordinate {
                x,
                y,
                z: self.project_z,
            }),
            _ => None,
        };

        Ok(Some(CoordinateBundle { geo, utm, local }))
    }
}
