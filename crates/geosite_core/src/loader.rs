//! Project item loading with per-category degradation.
//!
//! # Invariants
//! - Categories load independently; one failing category never aborts the
//!   others.
//! - A failing category contributes no items and one recorded degradation.

use crate::model::item::{ItemKind, MapItem, ProjectId};
use crate::persistence::{PersistenceClient, PersistenceError};
use crate::store::item_store::MapItemStore;
use log::{info, warn};

/// Items of one project plus the categories that could not be loaded.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub items: Vec<MapItem>,
    pub degraded: Vec<(ItemKind, PersistenceError)>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }

    /// Categories that failed to load, excluding partial-data outcomes.
    pub fn failed_kinds(&self) -> Vec<ItemKind> {
        self.degraded_kinds(false)
    }

    /// Categories this deployment has no data source for.
    pub fn unavailable_kinds(&self) -> Vec<ItemKind> {
        self.degraded_kinds(true)
    }

    fn degraded_kinds(&self, partial: bool) -> Vec<ItemKind> {
        self.degraded
            .iter()
            .filter(|(_, err)| err.is_partial_data() == partial)
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Builds a store from the loaded items; foreign-project rows are dropped.
    pub fn into_store(self, project: ProjectId) -> MapItemStore {
        let mut store = MapItemStore::new(project);
        for item in self.items {
            let id = item.id;
            if !store.insert(item) {
                warn!(
                    "event=project_load module=loader status=skipped project_id={} item_id={}",
                    project, id
                );
            }
        }
        store
    }
}

/// Loads photos360, gallery images and incidents of `project`.
pub fn load_project_items<C: PersistenceClient + ?Sized>(
    client: &C,
    project: ProjectId,
) -> LoadReport {
    let mut report = LoadReport::default();
    for kind in ItemKind::ALL {
        let result = match kind {
            ItemKind::Photo360 => client.list_photos360(project),
            ItemKind::GalleryImage => client.list_gallery_images(project),
            ItemKind::Incident => client.list_incidents(project),
        };
        match result {
            Ok(mut items) => report.items.append(&mut items),
            Err(err) => {
                warn!(
                    "event=project_load module=loader status=degraded project_id={} kind={} partial={} error={}",
                    project,
                    kind.as_str(),
                    err.is_partial_data(),
                    err
                );
                report.degraded.push((kind, err));
            }
        }
    }
    info!(
        "event=project_load module=loader status=ok project_id={} items={} degraded={}",
        project,
        report.items.len(),
        report.degraded.len()
    );
    report
}
