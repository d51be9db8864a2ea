//! SQLite-backed persistence client.
//!
//! # Responsibility
//! - Serve the item and project-metadata contracts from a local database.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Reads reject malformed rows instead of masking them.
//! - Coordinate updates touch only coordinate columns of the target item.

use crate::model::geo::{CoordinateBundle, GeoPoint};
use crate::model::item::{
    CoordinateSource, FileRef, IncidentDetails, ItemId, ItemKind, ItemPayload, MapItem,
    ProjectId, Severity,
};
use crate::persistence::wire::CoordinateFields;
use crate::persistence::{
    DeclaredOrigin, PersistenceClient, PersistenceError, PersistenceResult, ProjectMetadataSource,
};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    project_id,
    kind,
    label,
    description,
    incident_type,
    severity,
    geo_latitude,
    geo_longitude,
    utm_easting,
    utm_northing,
    utm_zone,
    utm_hemisphere,
    utm_datum,
    project_x,
    project_y,
    project_z,
    coordinate_source
FROM map_items";

/// Local persistence client over one migrated connection.
#[derive(Clone, Copy)]
pub struct SqlitePersistence<'conn> {
    conn: &'conn Connection,
    incidents_enabled: bool,
}

impl<'conn> SqlitePersistence<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            incidents_enabled: true,
        }
    }

    /// Toggles the incidents endpoint; disabled reports `Unavailable`.
    pub fn with_incidents_endpoint(mut self, enabled: bool) -> Self {
        self.incidents_enabled = enabled;
        self
    }

    /// Creates a project row if it does not exist yet.
    pub fn ensure_project(&self, project: ProjectId, name: &str) -> PersistenceResult<()> {
        self.conn.execute(
            "INSERT INTO projects (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO NOTHING;",
            params![project, name],
        )?;
        Ok(())
    }

    fn list_kind(&self, project: ProjectId, kind: ItemKind) -> PersistenceResult<Vec<MapItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ITEM_SELECT_SQL}
             WHERE project_id = ?1 AND kind = ?2
             ORDER BY created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![project, kind.as_str()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn insert_item(
        &self,
        project: ProjectId,
        payload: ItemPayload,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem> {
        let item = MapItem {
            id: Uuid::new_v4(),
            project_id: project,
            payload,
            bundle: Some(bundle.with_height(z)),
            height: z,
            source: CoordinateSource::Manual,
        };
        let fields = CoordinateFields::from_bundle(bundle, z);
        let (description, incident_type, severity) = match &item.payload {
            ItemPayload::Incident(details) => (
                Some(details.description.as_str()),
                Some(details.incident_type.as_str()),
                Some(details.severity.as_str()),
            ),
            _ => (None, None, None),
        };

        self.conn.execute(
            "INSERT INTO map_items (
                uuid, project_id, kind, label, description, incident_type, severity,
                geo_latitude, geo_longitude, utm_easting, utm_northing, utm_zone,
                utm_hemisphere, utm_datum, project_x, project_y, project_z, coordinate_source
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18);",
            params![
                item.id.to_string(),
                project,
                item.kind().as_str(),
                item.payload.label(),
                description,
                incident_type,
                severity,
                fields.geo_latitude,
                fields.geo_longitude,
                fields.utm_easting,
                fields.utm_northing,
                fields.utm_zone,
                fields.utm_hemisphere,
                fields.utm_datum,
                fields.project_x,
                fields.project_y,
                fields.project_z,
                item.source.as_str(),
            ],
        )?;

        info!(
            "event=item_create module=persistence status=ok kind={} item_id={}",
            item.kind().as_str(),
            item.id
        );
        Ok(item)
    }
}

impl PersistenceClient for SqlitePersistence<'_> {
    fn list_photos360(&self, project: ProjectId) -> PersistenceResult<Vec<MapItem>> {
        self.list_kind(project, ItemKind::Photo360)
    }

    fn list_gallery_images(&self, project: ProjectId) -> PersistenceResult<Vec<MapItem>> {
        self.list_kind(project, ItemKind::GalleryImage)
    }

    fn list_incidents(&self, project: ProjectId) -> PersistenceResult<Vec<MapItem>> {
        if !self.incidents_enabled {
            return Err(PersistenceError::Unavailable("incidents"));
        }
        self.list_kind(project, ItemKind::Incident)
    }

    fn upload_photo360(
        &self,
        project: ProjectId,
        file: &FileRef,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem> {
        self.insert_item(project, ItemPayload::Photo360(label_only(file)), bundle, z)
    }

    fn upload_gallery_image(
        &self,
        project: ProjectId,
        file: &FileRef,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem> {
        self.insert_item(project, ItemPayload::GalleryImage(label_only(file)), bundle, z)
    }

    fn create_incident(
        &self,
        project: ProjectId,
        details: &IncidentDetails,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem> {
        if !self.incidents_enabled {
            return Err(PersistenceError::Unavailable("incidents"));
        }
        if details.title.trim().is_empty() {
            return Err(PersistenceError::Rejected(
                "incident title is required".to_string(),
            ));
        }
        self.insert_item(project, ItemPayload::Incident(details.clone()), bundle, z)
    }

    fn update_coordinates(
        &self,
        project: ProjectId,
        kind: ItemKind,
        id: ItemId,
        bundle: &CoordinateBundle,
        source: CoordinateSource,
    ) -> PersistenceResult<()> {
        let fields = CoordinateFields::from_bundle(bundle, bundle.height());
        let local_height = bundle.local.map(|local| local.z);
        let changed = self.conn.execute(
            "UPDATE map_items
             SET
                geo_latitude = ?1,
                geo_longitude = ?2,
                utm_easting = ?3,
                utm_northing = ?4,
                utm_zone = ?5,
                utm_hemisphere = ?6,
                utm_datum = ?7,
                project_x = ?8,
                project_y = ?9,
                project_z = COALESCE(?10, project_z),
                coordinate_source = ?11,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?12 AND kind = ?13 AND project_id = ?14;",
            params![
                fields.geo_latitude,
                fields.geo_longitude,
                fields.utm_easting,
                fields.utm_northing,
                fields.utm_zone,
                fields.utm_hemisphere,
                fields.utm_datum,
                fields.project_x,
                fields.project_y,
                local_height,
                source.as_str(),
                id.to_string(),
                kind.as_str(),
                project,
            ],
        )?;

        if changed == 0 {
            warn!(
                "event=item_update_coordinates module=persistence status=error kind={} item_id={} error_code=not_found",
                kind.as_str(),
                id
            );
            return Err(PersistenceError::NotFound { kind, id });
        }
        Ok(())
    }
}

impl ProjectMetadataSource for SqlitePersistence<'_> {
    fn declared_origin(&self, project: ProjectId) -> PersistenceResult<DeclaredOrigin> {
        let row = self
            .conn
            .query_row(
                "SELECT map_origin_lat, map_origin_lng, map_rotation FROM projects WHERE id = ?1;",
                [project],
                |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((latitude, longitude, rotation_degrees)) = row else {
            return Ok(DeclaredOrigin::default());
        };
        let origin = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(
                GeoPoint::new(latitude, longitude)
                    .map_err(|err| PersistenceError::InvalidData(err.to_string()))?,
            ),
            _ => None,
        };
        Ok(DeclaredOrigin {
            origin,
            rotation_degrees,
        })
    }

    fn save_declared_origin(
        &self,
        project: ProjectId,
        declared: &DeclaredOrigin,
    ) -> PersistenceResult<()> {
        self.conn.execute(
            "INSERT INTO projects (id, map_origin_lat, map_origin_lng, map_rotation)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                map_origin_lat = excluded.map_origin_lat,
                map_origin_lng = excluded.map_origin_lng,
                map_rotation = excluded.map_rotation;",
            params![
                project,
                declared.origin.map(|origin| origin.latitude),
                declared.origin.map(|origin| origin.longitude),
                declared.rotation_degrees,
            ],
        )?;
        Ok(())
    }
}

fn label_only(file: &FileRef) -> FileRef {
    FileRef::new(file.file_name.clone(), Vec::new())
}

fn parse_item_row(row: &Row<'_>) -> PersistenceResult<MapItem> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        PersistenceError::InvalidData(format!("invalid uuid `{uuid_text}` in map_items.uuid"))
    })?;

    let kind_text: String = row.get("kind")?;
    let kind = ItemKind::parse(&kind_text).ok_or_else(|| {
        PersistenceError::InvalidData(format!("invalid kind `{kind_text}` in map_items.kind"))
    })?;

    let label: String = row.get("label")?;
    let payload = match kind {
        ItemKind::Photo360 => ItemPayload::Photo360(FileRef::new(label, Vec::new())),
        ItemKind::GalleryImage => ItemPayload::GalleryImage(FileRef::new(label, Vec::new())),
        ItemKind::Incident => {
            let severity_text: Option<String> = row.get("severity")?;
            let severity = match severity_text.as_deref() {
                Some(value) => Severity::parse(value).ok_or_else(|| {
                    PersistenceError::InvalidData(format!(
                        "invalid severity `{value}` in map_items.severity"
                    ))
                })?,
                None => Severity::default(),
            };
            ItemPayload::Incident(IncidentDetails {
                title: label,
                description: row.get::<_, Option<String>>("description")?.unwrap_or_default(),
                incident_type: row
                    .get::<_, Option<String>>("incident_type")?
                    .unwrap_or_default(),
                severity,
            })
        }
    };

    let fields = CoordinateFields {
        geo_latitude: row.get("geo_latitude")?,
        geo_longitude: row.get("geo_longitude")?,
        utm_easting: row.get("utm_easting")?,
        utm_northing: row.get("utm_northing")?,
        utm_zone: row.get("utm_zone")?,
        utm_hemisphere: row.get("utm_hemisphere")?,
        utm_datum: row.get("utm_datum")?,
        project_x: row.get("project_x")?,
        project_y: row.get("project_y")?,
        project_z: row.get("project_z")?,
    };
    let bundle = fields
        .to_bundle()
        .map_err(|message| PersistenceError::InvalidData(format!("item {id}: {message}")))?;

    let source_text: String = row.get("coordinate_source")?;
    let source = CoordinateSource::parse(&source_text).ok_or_else(|| {
        PersistenceError::InvalidData(format!(
            "invalid coordinate_source `{source_text}` in map_items.coordinate_source"
        ))
    })?;

    Ok(MapItem {
        id,
        project_id: row.get("project_id")?,
        payload,
        bundle,
        height: fields.project_z,
        source,
    })
}
