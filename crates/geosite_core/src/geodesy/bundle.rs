//! Coordinate bundle builder.
//!
//! # Responsibility
//! - Produce the full `{geo, utm, local}` record for one placement.
//!
//! # Invariants
//! - This is the only place where UTM and local coordinates are computed for
//!   items; capture, sync and import all go through it.
//! - Building from a geodetic point never fails; absent origin yields
//!   `local = None`.
//! - Building from local or UTM input fails when the inverse leaves the
//!   valid latitude/longitude range.

use crate::geodesy::frame::{to_local, ProjectFrame};
use crate::geodesy::utm::GeodeticProjector;
use crate::model::geo::{
    CoordinateBundle, Datum, GeoPoint, GeoPointError, LocalCoordinate, ProjectOrigin,
    UtmCoordinate,
};

/// Builds coordinate bundles with one configured datum.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleBuilder {
    projector: GeodeticProjector,
}

impl BundleBuilder {
    pub fn new(datum: Datum) -> Self {
        Self {
            projector: GeodeticProjector::new(datum),
        }
    }

    pub fn projector(&self) -> &GeodeticProjector {
        &self.projector
    }

    /// Builds a bundle at zero height.
    pub fn build(&self, geo: GeoPoint, origin: Option<&ProjectOrigin>) -> CoordinateBundle {
        self.build_at_height(geo, origin, 0.0)
    }

    /// Builds a bundle with an explicit local height.
    pub fn build_at_height(
        &self,
        geo: GeoPoint,
        origin: Option<&ProjectOrigin>,
        z: f64,
    ) -> CoordinateBundle {
        CoordinateBundle {
            geo,
            utm: self.projector.to_utm(geo),
            local: to_local(geo, origin, z),
        }
    }

    /// Builds a bundle from a project-local coordinate.
    ///
    /// The geodetic point is recovered through the frame inverse, then the
    /// bundle is rebuilt forward so all three frames agree.
    pub fn build_from_local(
        &self,
        local: &LocalCoordinate,
        origin: &ProjectOrigin,
    ) -> Result<CoordinateBundle, GeoPointError> {
        let geo = ProjectFrame::new(*origin).to_geo(local)?;
        Ok(self.build_at_height(geo, Some(origin), local.z))
    }

    /// Builds a bundle from a UTM position by inverting the projection.
    ///
    /// The projected UTM values are recomputed from the recovered point, so
    /// zone and hemisphere follow the point rather than the input.
    pub fn build_from_utm(
        &self,
        utm: &UtmCoordinate,
        origin: Option<&ProjectOrigin>,
        z: f64,
    ) -> Result<CoordinateBundle, GeoPointError> {
        let inverse = self.projector.to_geo(utm);
        let geo = GeoPoint::new(inverse.latitude, inverse.longitude)?;
        Ok(self.build_at_height(geo, origin, z))
    }
}
