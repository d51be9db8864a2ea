//! Owned map item collection.
//!
//! # Invariants
//! - Each item has one committed state (`MapItem::bundle`) and one displayed
//!   marker position, which may run ahead of the committed state while a drag
//!   update is in flight.
//! - Items are never removed by the core.

use crate::model::geo::{CoordinateBundle, GeoPoint};
use crate::model::item::{CoordinateSource, ItemId, ItemKind, MapItem, ProjectId};
use std::collections::BTreeMap;

/// Per-kind counters for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemStats {
    pub photos360: usize,
    pub gallery_images: usize,
    pub incidents: usize,
    /// Items that have a committed placement.
    pub with_coordinates: usize,
}

#[derive(Debug, Clone)]
struct StoreEntry {
    item: MapItem,
    displayed: Option<GeoPoint>,
}

/// Map items of one project keyed by identity.
#[derive(Debug, Clone)]
pub struct MapItemStore {
    project_id: ProjectId,
    entries: BTreeMap<ItemId, StoreEntry>,
}

impl MapItemStore {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            entries: BTreeMap::new(),
        }
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&MapItem> {
        self.entries.get(&id).map(|entry| &entry.item)
    }

    /// Position of the on-screen marker, possibly ahead of the committed one.
    pub fn displayed_position(&self, id: ItemId) -> Option<GeoPoint> {
        self.entries.get(&id).and_then(|entry| entry.displayed)
    }

    /// Items in identity order.
    pub fn items(&self) -> impl Iterator<Item = &MapItem> {
        self.entries.values().map(|entry| &entry.item)
    }

    pub fn items_of_kind(&self, kind: ItemKind) -> impl Iterator<Item = &MapItem> {
        self.items().filter(move |item| item.kind() == kind)
    }

    pub fn stats(&self) -> ItemStats {
        self.items().fold(ItemStats::default(), |mut stats, item| {
            match item.kind() {
                ItemKind::Photo360 => stats.photos360 += 1,
                ItemKind::GalleryImage => stats.gallery_images += 1,
                ItemKind::Incident => stats.incidents += 1,
            }
            if item.bundle.is_some() {
                stats.with_coordinates += 1;
            }
            stats
        })
    }

    /// Inserts or replaces an item; the marker shows its committed position.
    ///
    /// Returns `false` when the item belongs to another project.
    pub(crate) fn insert(&mut self, item: MapItem) -> bool {
        if item.project_id != self.project_id {
            return false;
        }
        let displayed = item.position();
        self.entries.insert(item.id, StoreEntry { item, displayed });
        true
    }

    pub(crate) fn move_marker(&mut self, id: ItemId, position: GeoPoint) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.displayed = Some(position);
                true
            }
            None => false,
        }
    }

    /// Puts the marker back on the committed position and returns it.
    pub(crate) fn reset_marker(&mut self, id: ItemId) -> Option<GeoPoint> {
        let entry = self.entries.get_mut(&id)?;
        entry.displayed = entry.item.position();
        entry.displayed
    }

    /// Replaces the committed bundle without touching the marker.
    pub(crate) fn commit_bundle(
        &mut self,
        id: ItemId,
        bundle: CoordinateBundle,
        source: CoordinateSource,
    ) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                if let Some(local) = bundle.local {
                    entry.item.height = local.z;
                }
                entry.item.bundle = Some(bundle);
                entry.item.source = source;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MapItemStore;
    use crate::geodesy::bundle::BundleBuilder;
    use crate::model::geo::GeoPoint;
    use crate::model::item::{
        CoordinateSource, FileRef, IncidentDetails, ItemPayload, MapItem,
    };
    use uuid::Uuid;

    fn item(project_id: i64, payload: ItemPayload, placed: bool) -> MapItem {
        let bundle = BundleBuilder::default().build(GeoPoint::new(40.0, -3.0).unwrap(), None);
        MapItem {
            id: Uuid::new_v4(),
            project_id,
            payload,
            bundle: placed.then_some(bundle),
            height: 0.0,
            source: CoordinateSource::Manual,
        }
    }

    #[test]
    fn insert_rejects_foreign_project_items() {
        let mut store = MapItemStore::new(1);
        let foreign = item(2, ItemPayload::Photo360(FileRef::new("a.jpg", vec![])), true);
        assert!(!store.insert(foreign));
        assert!(store.is_empty());
    }

    #[test]
    fn stats_count_kinds_and_placements() {
        let mut store = MapItemStore::new(1);
        store.insert(item(1, ItemPayload::Photo360(FileRef::new("a.jpg", vec![])), true));
        store.insert(item(1, ItemPayload::GalleryImage(FileRef::new("b.jpg", vec![])), false));
        store.insert(item(1, ItemPayload::Incident(IncidentDetails::new("crack")), true));

        let stats = store.stats();
        assert_eq!(stats.photos360, 1);
        assert_eq!(stats.gallery_images, 1);
        assert_eq!(stats.incidents, 1);
        assert_eq!(stats.with_coordinates, 2);
    }

    #[test]
    fn marker_moves_independently_of_committed_bundle() {
        let mut store = MapItemStore::new(1);
        let placed = item(1, ItemPayload::Photo360(FileRef::new("a.jpg", vec![])), true);
        let id = placed.id;
        store.insert(placed);

        let moved = GeoPoint::new(40.5, -3.5).unwrap();
        assert!(store.move_marker(id, moved));
        assert_eq!(store.displayed_position(id), Some(moved));
        assert_eq!(
            store.get(id).and_then(|item| item.position()),
            Some(GeoPoint::new(40.0, -3.0).unwrap())
        );
        assert!(!store.move_marker(Uuid::new_v4(), moved));
    }
}
