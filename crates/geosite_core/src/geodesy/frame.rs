//! Project-local planar frame.
//!
//! # Responsibility
//! - Convert WGS84 points to a site frame defined by origin + rotation.
//! - Convert site-frame x/y back to WGS84 for coordinate imports.
//!
//! # Invariants
//! - Distances use the flat meters-per-degree approximation below, not
//!   geodesics. Recorded site coordinates depend on this exact contract.
//! - The planar delta is rotated by `-rotation_degrees` (counter-clockwise
//!   positive).
//! - `z` is carried through untouched.
//! - The inverse only yields range-checked points; far-off local values
//!   are rejected rather than wrapped.

use crate::model::geo::{GeoPoint, GeoPointError, LocalCoordinate, ProjectOrigin};

/// Meters per degree of latitude; longitude scales by `cos(origin_lat)`.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Site-frame conversions for one project origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectFrame {
    origin: ProjectOrigin,
}

impl ProjectFrame {
    pub fn new(origin: ProjectOrigin) -> Self {
        Self { origin }
    }

    pub fn origin(&self) -> &ProjectOrigin {
        &self.origin
    }

    /// Local coordinate of `geo` at height `z`.
    pub fn to_local(&self, geo: GeoPoint, z: f64) -> LocalCoordinate {
        let origin = self.origin.origin;
        let dy_north = (geo.latitude - origin.latitude) * METERS_PER_DEGREE;
        let dx_east = (geo.longitude - origin.longitude)
            * METERS_PER_DEGREE
            * origin.latitude.to_radians().cos();

        let angle = (-self.origin.rotation_degrees).to_radians();
        let (sin, cos) = angle.sin_cos();

        LocalCoordinate {
            x: dx_east * cos - dy_north * sin,
            y: dx_east * sin + dy_north * cos,
            z,
        }
    }

    /// Inverse of [`ProjectFrame::to_local`]; height is ignored.
    ///
    /// # Errors
    /// - `GeoPointError` when the offset leaves the valid latitude/longitude
    ///   range.
    pub fn to_geo(&self, local: &LocalCoordinate) -> Result<GeoPoint, GeoPointError> {
        let origin = self.origin.origin;
        let angle = self.origin.rotation_degrees.to_radians();
        let (sin, cos) = angle.sin_cos();

        let dx_east = local.x * cos - local.y * sin;
        let dy_north = local.x * sin + local.y * cos;

        GeoPoint::new(
            origin.latitude + dy_north / METERS_PER_DEGREE,
            origin.longitude + dx_east / (METERS_PER_DEGREE * origin.latitude.to_radians().cos()),
        )
    }
}

/// Local coordinate for an optional origin; `None` when the project has none.
pub fn to_local(geo: GeoPoint, origin: Option<&ProjectOrigin>, z: f64) -> Option<LocalCoordinate> {
    origin.map(|origin| ProjectFrame::new(*origin).to_local(geo, z))
}

#[cfg(test)]
mod tests {
    use super::{to_local, ProjectFrame, METERS_PER_DEGREE};
    use crate::model::geo::{GeoPoint, GeoPointError, LocalCoordinate, ProjectOrigin};

    fn origin(rotation_degrees: f64) -> ProjectOrigin {
        ProjectOrigin {
            origin: GeoPoint {
                latitude: 40.0,
                longitude: -3.0,
            },
            rotation_degrees,
        }
    }

    #[test]
    fn zero_rotation_is_scaled_planar_delta() {
        let frame = ProjectFrame::new(origin(0.0));
        let local = frame.to_local(
            GeoPoint {
                latitude: 40.001,
                longitude: -2.999,
            },
            1.5,
        );
        let expected_x = 0.001 * METERS_PER_DEGREE * 40f64.to_radians().cos();
        let expected_y = 0.001 * METERS_PER_DEGREE;
        assert!((local.x - expected_x).abs() < 1e-6);
        assert!((local.y - expected_y).abs() < 1e-6);
        assert_eq!(local.z, 1.5);
    }

    #[test]
    fn ninety_degree_rotation_maps_north_onto_x_axis() {
        let frame = ProjectFrame::new(origin(90.0));
        let local = frame.to_local(
            GeoPoint {
                latitude: 40.001,
                longitude: -3.0,
            },
            0.0,
        );
        // Pure north delta, frame rotated counter-clockwise by 90 deg.
        assert!((local.x - 111.32).abs() < 1e-6, "{}", local.x);
        assert!(local.y.abs() < 1e-6, "{}", local.y);
    }

    #[test]
    fn to_geo_inverts_to_local() {
        let frame = ProjectFrame::new(origin(37.5));
        let point = GeoPoint {
            latitude: 40.0123,
            longitude: -3.0217,
        };
        let back = frame.to_geo(&frame.to_local(point, 0.0)).unwrap();
        assert!((back.latitude - point.latitude).abs() < 1e-10);
        assert!((back.longitude - point.longitude).abs() < 1e-10);

        let origin_geo = frame
            .to_geo(&LocalCoordinate {
                x: 0.0,
                y: 0.0,
                z: 9.0,
            })
            .unwrap();
        assert_eq!(origin_geo, origin(0.0).origin);
    }

    #[test]
    fn offsets_beyond_the_globe_are_rejected() {
        let frame = ProjectFrame::new(origin(0.0));
        let north = frame.to_geo(&LocalCoordinate {
            x: 0.0,
            y: 20_000_000.0,
            z: 0.0,
        });
        assert!(matches!(north, Err(GeoPointError::InvalidLatitude(lat)) if lat > 90.0));

        let east = frame.to_geo(&LocalCoordinate {
            x: 20_000_000.0,
            y: 0.0,
            z: 0.0,
        });
        assert!(matches!(east, Err(GeoPointError::InvalidLongitude(_))));
    }

    #[test]
    fn missing_origin_yields_none() {
        let point = GeoPoint {
            latitude: 1.0,
            longitude: 1.0,
        };
        assert!(to_local(point, None, 0.0).is_none());
        assert!(to_local(point, Some(&origin(0.0)), 0.0).is_some());
    }
}
