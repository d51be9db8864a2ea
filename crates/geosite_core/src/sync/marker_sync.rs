//! Optimistic marker updates with rollback.
//!
//! # Responsibility
//! - Move markers immediately on drag end or coordinate import.
//! - Persist the new bundle and reconcile the store with the response.
//!
//! # Invariants
//! - Every update carries a per-item sequence number; a response whose
//!   sequence is not newer than the last applied one, or that was already
//!   resolved, is discarded.
//! - While the latest update is unresolved, only its response may move or
//!   revert the marker.
//! - A failed latest update reverts the marker to the last committed
//!   position and leaves the committed bundle unchanged.
//! - Once the latest update is resolved, the marker always shows the
//!   committed position; a late older success moves it there.
//! - Drags keep the item's committed height.

use crate::geodesy::bundle::BundleBuilder;
use crate::model::geo::{CoordinateBundle, GeoPoint, ProjectOrigin};
use crate::model::item::{CoordinateSource, ItemId, ItemKind, ProjectId};
use crate::persistence::{PersistenceClient, PersistenceError, PersistenceResult};
use crate::store::item_store::MapItemStore;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Update that cannot be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncError {
    UnknownItem(ItemId),
    /// Item has no marker to drag.
    NotPlaced(ItemId),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownItem(id) => write!(f, "unknown item: {id}"),
            Self::NotPlaced(id) => write!(f, "item has no position yet: {id}"),
        }
    }
}

impl Error for SyncError {}

/// In-flight coordinate update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateTicket {
    pub id: ItemId,
    pub kind: ItemKind,
    pub seq: u64,
    pub bundle: CoordinateBundle,
    pub source: CoordinateSource,
}

impl UpdateTicket {
    pub fn send<C: PersistenceClient + ?Sized>(
        &self,
        client: &C,
        project: ProjectId,
    ) -> PersistenceResult<()> {
        client.update_coordinates(project, self.kind, self.id, &self.bundle, self.source)
    }
}

/// How a response was applied.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Bundle committed; `latest` tells whether the marker was also settled.
    ///
    /// `realigned` is set when an older update succeeded after the latest one
    /// had already been rolled back and the marker moved to the new
    /// committed position.
    Committed {
        id: ItemId,
        latest: bool,
        realigned: Option<GeoPoint>,
    },
    /// Latest update failed; marker reverted to `restored`.
    RolledBack {
        id: ItemId,
        restored: Option<GeoPoint>,
        error: PersistenceError,
    },
    /// Older update failed; nothing changed.
    Superseded { id: ItemId, error: PersistenceError },
    /// Response older than the applied state, or already resolved; discarded.
    Stale { id: ItemId, seq: u64 },
}

#[derive(Debug, Clone, Default)]
struct SeqState {
    issued: u64,
    applied: u64,
    /// Issued sequences whose response has not arrived yet.
    awaiting: BTreeSet<u64>,
}

impl SeqState {
    fn latest_resolved(&self) -> bool {
        !self.awaiting.contains(&self.issued)
    }
}

/// Tracks per-item update sequences.
#[derive(Debug, Default)]
pub struct MarkerSyncEngine {
    seqs: HashMap<ItemId, SeqState>,
}

impl MarkerSyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of updates issued for `id` whose responses are still awaited.
    pub fn pending(&self, id: ItemId) -> usize {
        self.seqs.get(&id).map_or(0, |state| state.awaiting.len())
    }

    /// Starts an update for a dragged marker.
    ///
    /// The marker moves to `point` at once; the returned ticket carries the
    /// bundle to persist.
    ///
    /// # Errors
    /// - `UnknownItem` when the store has no such item.
    /// - `NotPlaced` when the item has no marker.
    pub fn drag_end(
        &mut self,
        store: &mut MapItemStore,
        builder: &BundleBuilder,
        origin: Option<&ProjectOrigin>,
        id: ItemId,
        point: GeoPoint,
    ) -> Result<UpdateTicket, SyncError> {
        let item = store.get(id).ok_or(SyncError::UnknownItem(id))?;
        if store.displayed_position(id).is_none() {
            return Err(SyncError::NotPlaced(id));
        }
        let bundle = builder.build_at_height(point, origin, item.height);
        let kind = item.kind();
        Ok(self.issue(store, id, kind, bundle, CoordinateSource::Manual))
    }

    /// Starts an update that assigns an externally computed bundle, e.g. from
    /// a coordinate file. Unplaced items are allowed.
    pub fn assign_coordinates(
        &mut self,
        store: &mut MapItemStore,
        id: ItemId,
        bundle: CoordinateBundle,
        source: CoordinateSource,
    ) -> Result<UpdateTicket, SyncError> {
        let kind = store.get(id).ok_or(SyncError::UnknownItem(id))?.kind();
        Ok(self.issue(store, id, kind, bundle, source))
    }

    fn issue(
        &mut self,
        store: &mut MapItemStore,
        id: ItemId,
        kind: ItemKind,
        bundle: CoordinateBundle,
        source: CoordinateSource,
    ) -> UpdateTicket {
        let state = self.seqs.entry(id).or_default();
        state.issued += 1;
        state.awaiting.insert(state.issued);
        store.move_marker(id, bundle.geo);
        debug!(
            "event=marker_update module=sync status=start item_id={} seq={} source={}",
            id,
            state.issued,
            source.as_str()
        );
        UpdateTicket {
            id,
            kind,
            seq: state.issued,
            bundle,
            source,
        }
    }

    /// Applies the persistence response of `ticket`.
    pub fn resolve(
        &mut self,
        store: &mut MapItemStore,
        ticket: &UpdateTicket,
        result: PersistenceResult<()>,
    ) -> SyncOutcome {
        let id = ticket.id;
        let state = self.seqs.entry(id).or_default();
        let awaited = state.awaiting.remove(&ticket.seq);
        if !awaited || ticket.seq <= state.applied {
            debug!(
                "event=marker_update module=sync status=stale item_id={} seq={} applied={}",
                id, ticket.seq, state.applied
            );
            return SyncOutcome::Stale {
                id,
                seq: ticket.seq,
            };
        }
        let latest = ticket.seq == state.issued;

        match result {
            Ok(()) => {
                state.applied = ticket.seq;
                store.commit_bundle(id, ticket.bundle, ticket.source);
                let realigned = if latest {
                    store.move_marker(id, ticket.bundle.geo);
                    None
                } else if state.latest_resolved() {
                    // Latest update already failed; marker sits on the old
                    // committed position.
                    store.move_marker(id, ticket.bundle.geo);
                    Some(ticket.bundle.geo)
                } else {
                    None
                };
                info!(
                    "event=marker_update module=sync status=ok item_id={} seq={} latest={} realigned={}",
                    id,
                    ticket.seq,
                    latest,
                    realigned.is_some()
                );
                SyncOutcome::Committed {
                    id,
                    latest,
                    realigned,
                }
            }
            Err(error) if latest => {
                let restored = store.reset_marker(id);
                warn!(
                    "event=marker_update module=sync status=error item_id={} seq={} action=rollback error={}",
                    id, ticket.seq, error
                );
                SyncOutcome::RolledBack {
                    id,
                    restored,
                    error,
                }
            }
            Err(error) => {
                warn!(
                    "event=marker_update module=sync status=error item_id={} seq={} action=superseded error={}",
                    id, ticket.seq, error
                );
                SyncOutcome::Superseded { id, error }
            }
        }
    }

    /// Drags, persists and reconciles in one step.
    pub fn apply_drag<C: PersistenceClient + ?Sized>(
        &mut self,
        client: &C,
        store: &mut MapItemStore,
        builder: &BundleBuilder,
        origin: Option<&ProjectOrigin>,
        id: ItemId,
        point: GeoPoint,
    ) -> Result<SyncOutcome, SyncError> {
        let ticket = self.drag_end(store, builder, origin, id, point)?;
        let result = ticket.send(client, store.project_id());
        Ok(self.resolve(store, &ticket, result))
    }

    /// Assigns, persists and reconciles in one step.
    pub fn apply_assignment<C: PersistenceClient + ?Sized>(
        &mut self,
        client: &C,
        store: &mut MapItemStore,
        id: ItemId,
        bundle: CoordinateBundle,
        source: CoordinateSource,
    ) -> Result<SyncOutcome, SyncError> {
        let ticket = self.assign_coordinates(store, id, bundle, source)?;
        let result = ticket.send(client, store.project_id());
        Ok(self.resolve(store, &ticket, result))
    }
}

#[cfg(test)]
mod tests {
    use super::{MarkerSyncEngine, SyncError, SyncOutcome};
    use crate::geodesy::bundle::BundleBuilder;
    use crate::model::geo::{GeoPoint, LocalCoordinate, ProjectOrigin};
    use crate::model::item::{CoordinateSource, FileRef, ItemId, ItemPayload, MapItem};
    use crate::persistence::PersistenceError;
    use crate::store::item_store::MapItemStore;
    use uuid::Uuid;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude).unwrap()
    }

    fn store_with_item(placed: bool) -> (MapItemStore, ItemId) {
        let mut store = MapItemStore::new(7);
        let bundle = BundleBuilder::default().build(point(40.0, -3.0), None);
        let item = MapItem {
            id: Uuid::new_v4(),
            project_id: 7,
            payload: ItemPayload::Photo360(FileRef::new("pano.jpg", vec![])),
            bundle: placed.then_some(bundle),
            height: 0.0,
            source: CoordinateSource::Manual,
        };
        let id = item.id;
        assert!(store.insert(item));
        (store, id)
    }

    #[test]
    fn failed_drag_rolls_marker_back_to_committed_position() {
        let (mut store, id) = store_with_item(true);
        let builder = BundleBuilder::default();
        let mut engine = MarkerSyncEngine::new();

        let ticket = engine
            .drag_end(&mut store, &builder, None, id, point(40.001, -3.001))
            .unwrap();
        assert_eq!(store.displayed_position(id), Some(point(40.001, -3.001)));

        let outcome = engine.resolve(
            &mut store,
            &ticket,
            Err(PersistenceError::Transport("timeout".to_string())),
        );
        assert!(matches!(
            outcome,
            SyncOutcome::RolledBack { restored: Some(p), .. } if p == point(40.0, -3.0)
        ));
        assert_eq!(store.displayed_position(id), Some(point(40.0, -3.0)));
        assert_eq!(store.get(id).unwrap().position(), Some(point(40.0, -3.0)));
    }

    #[test]
    fn older_response_after_newer_commit_is_discarded() {
        let (mut store, id) = store_with_item(true);
        let builder = BundleBuilder::default();
        let mut engine = MarkerSyncEngine::new();

        let first = engine
            .drag_end(&mut store, &builder, None, id, point(40.1, -3.1))
            .unwrap();
        let second = engine
            .drag_end(&mut store, &builder, None, id, point(40.2, -3.2))
            .unwrap();
        assert_eq!(engine.pending(id), 2);

        assert!(matches!(
            engine.resolve(&mut store, &second, Ok(())),
            SyncOutcome::Committed { latest: true, .. }
        ));
        assert!(matches!(
            engine.resolve(&mut store, &first, Ok(())),
            SyncOutcome::Stale { seq: 1, .. }
        ));
        assert_eq!(store.get(id).unwrap().position(), Some(point(40.2, -3.2)));
        assert_eq!(store.displayed_position(id), Some(point(40.2, -3.2)));
        assert_eq!(engine.pending(id), 0);
    }

    #[test]
    fn superseded_failure_keeps_newer_marker_position() {
        let (mut store, id) = store_with_item(true);
        let builder = BundleBuilder::default();
        let mut engine = MarkerSyncEngine::new();

        let first = engine
            .drag_end(&mut store, &builder, None, id, point(40.1, -3.1))
            .unwrap();
        engine
            .drag_end(&mut store, &builder, None, id, point(40.2, -3.2))
            .unwrap();

        let outcome = engine.resolve(
            &mut store,
            &first,
            Err(PersistenceError::Transport("reset".to_string())),
        );
        assert!(matches!(outcome, SyncOutcome::Superseded { .. }));
        assert_eq!(store.displayed_position(id), Some(point(40.2, -3.2)));
        assert_eq!(store.get(id).unwrap().position(), Some(point(40.0, -3.0)));
        assert_eq!(engine.pending(id), 1);
    }

    #[test]
    fn older_success_after_rolled_back_latest_moves_marker_to_commit() {
        let (mut store, id) = store_with_item(true);
        let builder = BundleBuilder::default();
        let mut engine = MarkerSyncEngine::new();

        let first = engine
            .drag_end(&mut store, &builder, None, id, point(40.01, -3.01))
            .unwrap();
        let second = engine
            .drag_end(&mut store, &builder, None, id, point(40.02, -3.02))
            .unwrap();

        assert!(matches!(
            engine.resolve(
                &mut store,
                &second,
                Err(PersistenceError::Transport("timeout".to_string())),
            ),
            SyncOutcome::RolledBack { restored: Some(p), .. } if p == point(40.0, -3.0)
        ));
        assert_eq!(engine.pending(id), 1);

        let outcome = engine.resolve(&mut store, &first, Ok(()));
        assert!(matches!(
            outcome,
            SyncOutcome::Committed { latest: false, realigned: Some(p), .. }
                if p == point(40.01, -3.01)
        ));
        let committed = store.get(id).unwrap().position();
        assert_eq!(committed, Some(point(40.01, -3.01)));
        assert_eq!(store.displayed_position(id), committed);
        assert_eq!(engine.pending(id), 0);
    }

    #[test]
    fn older_success_while_latest_in_flight_keeps_marker_ahead() {
        let (mut store, id) = store_with_item(true);
        let builder = BundleBuilder::default();
        let mut engine = MarkerSyncEngine::new();

        let first = engine
            .drag_end(&mut store, &builder, None, id, point(40.01, -3.01))
            .unwrap();
        let second = engine
            .drag_end(&mut store, &builder, None, id, point(40.02, -3.02))
            .unwrap();

        assert!(matches!(
            engine.resolve(&mut store, &first, Ok(())),
            SyncOutcome::Committed {
                latest: false,
                realigned: None,
                ..
            }
        ));
        assert_eq!(store.displayed_position(id), Some(point(40.02, -3.02)));

        engine.resolve(
            &mut store,
            &second,
            Err(PersistenceError::Transport("timeout".to_string())),
        );
        assert_eq!(store.displayed_position(id), Some(point(40.01, -3.01)));
        assert_eq!(store.get(id).unwrap().position(), Some(point(40.01, -3.01)));
    }

    #[test]
    fn repeated_response_is_discarded() {
        let (mut store, id) = store_with_item(true);
        let builder = BundleBuilder::default();
        let mut engine = MarkerSyncEngine::new();

        let ticket = engine
            .drag_end(&mut store, &builder, None, id, point(40.1, -3.1))
            .unwrap();
        engine.resolve(
            &mut store,
            &ticket,
            Err(PersistenceError::Transport("timeout".to_string())),
        );
        assert!(matches!(
            engine.resolve(&mut store, &ticket, Ok(())),
            SyncOutcome::Stale { seq: 1, .. }
        ));
        assert_eq!(store.displayed_position(id), Some(point(40.0, -3.0)));
        assert_eq!(engine.pending(id), 0);
    }

    #[test]
    fn drag_keeps_committed_height() {
        let mut store = MapItemStore::new(7);
        let origin = ProjectOrigin {
            origin: point(40.0, -3.0),
            rotation_degrees: 0.0,
        };
        let builder = BundleBuilder::default();
        let item = MapItem {
            id: Uuid::new_v4(),
            project_id: 7,
            payload: ItemPayload::GalleryImage(FileRef::new("a.jpg", vec![])),
            bundle: Some(builder.build_at_height(point(40.0, -3.0), Some(&origin), 4.5)),
            height: 4.5,
            source: CoordinateSource::Manual,
        };
        let id = item.id;
        store.insert(item);

        let mut engine = MarkerSyncEngine::new();
        let ticket = engine
            .drag_end(&mut store, &builder, Some(&origin), id, point(40.001, -3.0))
            .unwrap();
        assert_eq!(ticket.bundle.height(), 4.5);
        engine.resolve(&mut store, &ticket, Ok(()));
        assert_eq!(store.get(id).unwrap().height, 4.5);
    }

    #[test]
    fn unplaced_items_cannot_be_dragged_but_can_be_assigned() {
        let (mut store, id) = store_with_item(false);
        let builder = BundleBuilder::default();
        let mut engine = MarkerSyncEngine::new();

        assert_eq!(
            engine
                .drag_end(&mut store, &builder, None, id, point(40.0, -3.0))
                .unwrap_err(),
            SyncError::NotPlaced(id)
        );
        let unknown = Uuid::new_v4();
        assert_eq!(
            engine
                .drag_end(&mut store, &builder, None, unknown, point(40.0, -3.0))
                .unwrap_err(),
            SyncError::UnknownItem(unknown)
        );

        let origin = ProjectOrigin {
            origin: point(40.0, -3.0),
            rotation_degrees: 0.0,
        };
        let local = LocalCoordinate {
            x: 10.0,
            y: 20.0,
            z: 1.0,
        };
        let bundle = builder.build_from_local(&local, &origin).unwrap();
        let ticket = engine
            .assign_coordinates(&mut store, id, bundle, CoordinateSource::Local)
            .unwrap();
        assert!(matches!(
            engine.resolve(&mut store, &ticket, Ok(())),
            SyncOutcome::Committed { latest: true, .. }
        ));
        let item = store.get(id).unwrap();
        assert_eq!(item.source, CoordinateSource::Local);
        assert_eq!(item.height, 1.0);
        assert_eq!(store.displayed_position(id), Some(bundle.geo));
    }
}
