#![allow(dead_code)]

use geosite_core::{
    CoordinateBundle, CoordinateSource, FileRef, IncidentDetails, ItemId, ItemKind, ItemPayload,
    MapItem, PersistenceClient, PersistenceError, PersistenceResult, ProjectId,
};
use std::cell::{Cell, RefCell};
use uuid::Uuid;

/// In-memory client with switchable failures.
#[derive(Default)]
pub struct ScriptedClient {
    pub items: Vec<MapItem>,
    pub failing_lists: Vec<ItemKind>,
    pub incidents_unavailable: bool,
    pub fail_writes: Cell<bool>,
    pub writes: Cell<usize>,
    pub updates: RefCell<Vec<(ItemId, CoordinateBundle, CoordinateSource)>>,
}

impl ScriptedClient {
    fn list(&self, project: ProjectId, kind: ItemKind) -> PersistenceResult<Vec<MapItem>> {
        if kind == ItemKind::Incident && self.incidents_unavailable {
            return Err(PersistenceError::Unavailable("incidents"));
        }
        if self.failing_lists.contains(&kind) {
            return Err(PersistenceError::Transport("503 service unavailable".to_string()));
        }
        Ok(self
            .items
            .iter()
            .filter(|item| item.project_id == project && item.kind() == kind)
            .cloned()
            .collect())
    }

    fn write(&self) -> PersistenceResult<()> {
        self.writes.set(self.writes.get() + 1);
        if self.fail_writes.get() {
            return Err(PersistenceError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    fn created(
        &self,
        project: ProjectId,
        payload: ItemPayload,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem> {
        self.write()?;
        Ok(MapItem {
            id: Uuid::new_v4(),
            project_id: project,
            payload,
            bundle: Some(bundle.with_height(z)),
            height: z,
            source: CoordinateSource::Manual,
        })
    }
}

impl PersistenceClient for ScriptedClient {
    fn list_photos360(&self, project: ProjectId) -> PersistenceResult<Vec<MapItem>> {
        self.list(project, ItemKind::Photo360)
    }

    fn list_gallery_images(&self, project: ProjectId) -> PersistenceResult<Vec<MapItem>> {
        self.list(project, ItemKind::GalleryImage)
    }

    fn list_incidents(&self, project: ProjectId) -> PersistenceResult<Vec<MapItem>> {
        self.list(project, ItemKind::Incident)
    }

    fn upload_photo360(
        &self,
        project: ProjectId,
        file: &FileRef,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem> {
        self.created(project, ItemPayload::Photo360(file.clone()), bundle, z)
    }

    fn upload_gallery_image(
        &self,
        project: ProjectId,
        file: &FileRef,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem> {
        self.created(project, ItemPayload::GalleryImage(file.clone()), bundle, z)
    }

    fn create_incident(
        &self,
        project: ProjectId,
        details: &IncidentDetails,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem> {
        self.created(project, ItemPayload::Incident(details.clone()), bundle, z)
    }

    fn update_coordinates(
        &self,
        _project: ProjectId,
        _kind: ItemKind,
        id: ItemId,
        bundle: &CoordinateBundle,
        source: CoordinateSource,
    ) -> PersistenceResult<()> {
        self.write()?;
        self.updates.borrow_mut().push((id, *bundle, source));
        Ok(())
    }
}

pub fn placed_item(project: ProjectId, kind: ItemKind, bundle: Option<CoordinateBundle>) -> MapItem {
    let payload = match kind {
        ItemKind::Photo360 => ItemPayload::Photo360(FileRef::new("pano.jpg", Vec::new())),
        ItemKind::GalleryImage => ItemPayload::GalleryImage(FileRef::new("img.jpg", Vec::new())),
        ItemKind::Incident => ItemPayload::Incident(IncidentDetails::new("leak")),
    };
    MapItem {
        id: Uuid::new_v4(),
        project_id: project,
        payload,
        bundle,
        height: bundle.map_or(0.0, |bundle| bundle.height()),
        source: CoordinateSource::Manual,
    }
}
