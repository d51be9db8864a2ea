//! Event-driven map workspace.
//!
//! # Responsibility
//! - Own the state of one open project: origin, items, capture session and
//!   marker sync.
//! - Turn map events into core operations and report the outcome as UI
//!   signals.
//!
//! # Invariants
//! - Events are processed strictly in arrival order.
//! - Raw latitude/longitude values are validated before any operation runs.
//! - Every failed user action yields exactly one `OperationFailed` signal.

use crate::geodesy::bundle::BundleBuilder;
use crate::import::batch::{apply_batch, parse_batch_table, BatchOptions, BatchReport};
use crate::import::coords_file::{parse_coordinate_text, resolve_import};
use crate::loader::load_project_items;
use crate::model::geo::{CoordinateBundle, GeoPoint, ProjectOrigin};
use crate::model::item::{ItemId, ItemKind, ProjectId};
use crate::persistence::PersistenceClient;
use crate::session::capture::{CaptureForm, CaptureSession, CaptureState, SubmitOutcome};
use crate::store::item_store::MapItemStore;
use crate::store::origin::OriginStore;
use crate::sync::marker_sync::{MarkerSyncEngine, SyncOutcome};
use crate::sync::reposition::{recalculate_items, reposition_project, RecalculationReport};
use log::{debug, warn};
use std::collections::VecDeque;

/// Input from the map surface and forms.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    SelectTool(ItemKind),
    Click { latitude: f64, longitude: f64 },
    TempMarkerMoved { latitude: f64, longitude: f64 },
    ItemDragEnd {
        id: ItemId,
        latitude: f64,
        longitude: f64,
    },
    Submit(CaptureForm),
    Cancel,
    /// Coordinate file contents chosen for an existing item.
    ImportCoordinates { id: ItemId, text: String },
    /// Delimited table of `name, x, y[, z]` rows for the project's media.
    ImportBatch { text: String, options: BatchOptions },
}

/// Instruction for the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiSignal {
    ToolArmed(ItemKind),
    FormOpened {
        mode: ItemKind,
        bundle: CoordinateBundle,
    },
    TemporaryMarkerMoved(CoordinateBundle),
    ItemCreated(ItemId),
    /// Marker must be drawn at `position`; `None` removes it.
    MarkerMoved {
        id: ItemId,
        position: Option<GeoPoint>,
    },
    ItemCommitted(ItemId),
    OperationFailed(String),
    CaptureReset,
    OriginChanged(ProjectOrigin),
    BatchImported(BatchReport),
    ItemsRecalculated(RecalculationReport),
}

/// One open project.
pub struct MapWorkspace<C: PersistenceClient> {
    client: C,
    origin: Option<ProjectOrigin>,
    builder: BundleBuilder,
    store: MapItemStore,
    session: CaptureSession,
    engine: MarkerSyncEngine,
    queue: VecDeque<MapEvent>,
}

impl<C: PersistenceClient> MapWorkspace<C> {
    pub fn new(
        client: C,
        project: ProjectId,
        origin: Option<ProjectOrigin>,
        builder: BundleBuilder,
    ) -> Self {
        Self {
            client,
            origin,
            builder,
            store: MapItemStore::new(project),
            session: CaptureSession::new(),
            engine: MarkerSyncEngine::new(),
            queue: VecDeque::new(),
        }
    }

    /// Replaces the store with the project's items; returns the categories
    /// that failed to load.
    ///
    /// Categories without a data source count as empty, not failed.
    pub fn load(&mut self) -> Vec<ItemKind> {
        let project = self.store.project_id();
        let report = load_project_items(&self.client, project);
        let failed = report.failed_kinds();
        self.store = report.into_store(project);
        failed
    }

    pub fn project_id(&self) -> ProjectId {
        self.store.project_id()
    }

    pub fn origin(&self) -> Option<&ProjectOrigin> {
        self.origin.as_ref()
    }

    /// Saves a new origin and, when `recalculate` is set, rebuilds every
    /// placed item's coordinates in the new frame.
    ///
    /// A failed save leaves the origin and all items unchanged.
    pub fn reposition<O: OriginStore + ?Sized>(
        &mut self,
        origins: &mut O,
        origin: ProjectOrigin,
        recalculate: bool,
    ) -> Vec<UiSignal> {
        let mut signals = Vec::new();
        let result = reposition_project(
            &mut self.engine,
            &self.client,
            origins,
            &mut self.store,
            origin,
            recalculate,
            &self.builder,
        );
        match result {
            Ok((report, outcomes)) => {
                self.origin = Some(origin);
                signals.push(UiSignal::OriginChanged(origin));
                if recalculate {
                    for outcome in outcomes {
                        applied_signals(outcome, &self.store, &mut signals);
                    }
                    signals.push(UiSignal::ItemsRecalculated(report));
                }
            }
            Err(err) => {
                warn!(
                    "event=reposition module=workspace status=error project_id={} error={}",
                    self.store.project_id(),
                    err
                );
                signals.push(UiSignal::OperationFailed(err.to_string()));
            }
        }
        signals
    }

    /// Rebuilds every placed item's coordinates for the current origin.
    pub fn recalculate(&mut self) -> Vec<UiSignal> {
        let Some(origin) = self.origin else {
            return vec![UiSignal::OperationFailed(
                "project has no origin; position it first".to_string(),
            )];
        };
        let (report, outcomes) = recalculate_items(
            &mut self.engine,
            &self.client,
            &mut self.store,
            &origin,
            &self.builder,
        );
        let mut signals = Vec::new();
        for outcome in outcomes {
            applied_signals(outcome, &self.store, &mut signals);
        }
        signals.push(UiSignal::ItemsRecalculated(report));
        signals
    }

    pub fn store(&self) -> &MapItemStore {
        &self.store
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn push(&mut self, event: MapEvent) {
        self.queue.push_back(event);
    }

    /// Processes queued events in FIFO order.
    pub fn pump(&mut self) -> Vec<UiSignal> {
        let mut signals = Vec::new();
        while let Some(event) = self.queue.pop_front() {
            self.handle(event, &mut signals);
        }
        signals
    }

    fn handle(&mut self, event: MapEvent, signals: &mut Vec<UiSignal>) {
        match event {
            MapEvent::SelectTool(mode) => match self.session.select_tool(mode) {
                CaptureState::Armed(mode) => signals.push(UiSignal::ToolArmed(*mode)),
                _ => signals.push(UiSignal::CaptureReset),
            },
            MapEvent::Click {
                latitude,
                longitude,
            } => {
                let Some(point) = validated(latitude, longitude, signals) else {
                    return;
                };
                let origin = self.origin.as_ref();
                let placed = self.session.click(point, &self.builder, origin).copied();
                if let (Some(bundle), Some(mode)) = (placed, self.session.mode()) {
                    signals.push(UiSignal::FormOpened { mode, bundle });
                }
            }
            MapEvent::TempMarkerMoved {
                latitude,
                longitude,
            } => {
                let Some(point) = validated(latitude, longitude, signals) else {
                    return;
                };
                let origin = self.origin.as_ref();
                let moved = self.session.move_temporary(point, &self.builder, origin).copied();
                if let Some(bundle) = moved {
                    signals.push(UiSignal::TemporaryMarkerMoved(bundle));
                }
            }
            MapEvent::ItemDragEnd {
                id,
                latitude,
                longitude,
            } => {
                let Some(point) = validated(latitude, longitude, signals) else {
                    if let Some(position) = self.store.displayed_position(id) {
                        signals.push(UiSignal::MarkerMoved {
                            id,
                            position: Some(position),
                        });
                    }
                    return;
                };
                match self.engine.drag_end(
                    &mut self.store,
                    &self.builder,
                    self.origin.as_ref(),
                    id,
                    point,
                ) {
                    Ok(ticket) => {
                        signals.push(UiSignal::MarkerMoved {
                            id,
                            position: Some(point),
                        });
                        let result = ticket.send(&self.client, self.store.project_id());
                        let outcome = self.engine.resolve(&mut self.store, &ticket, result);
                        sync_signals(outcome, signals);
                    }
                    Err(err) => signals.push(UiSignal::OperationFailed(err.to_string())),
                }
            }
            MapEvent::Submit(form) => {
                match self.session.submit(form, &self.client, &mut self.store) {
                    Ok(SubmitOutcome::Created { id, attached }) => {
                        signals.push(UiSignal::ItemCreated(id));
                        if attached {
                            signals.push(UiSignal::CaptureReset);
                        }
                    }
                    Ok(SubmitOutcome::Discarded { .. }) => {}
                    Err(err) => signals.push(UiSignal::OperationFailed(err.to_string())),
                }
            }
            MapEvent::Cancel => {
                self.session.cancel();
                signals.push(UiSignal::CaptureReset);
            }
            MapEvent::ImportCoordinates { id, text } => {
                let resolved = parse_coordinate_text(&text)
                    .and_then(|parsed| resolve_import(&parsed, self.origin.as_ref(), &self.builder));
                let (bundle, source) = match resolved {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        signals.push(UiSignal::OperationFailed(err.to_string()));
                        return;
                    }
                };
                match self
                    .engine
                    .assign_coordinates(&mut self.store, id, bundle, source)
                {
                    Ok(ticket) => {
                        signals.push(UiSignal::MarkerMoved {
                            id,
                            position: Some(bundle.geo),
                        });
                        let result = ticket.send(&self.client, self.store.project_id());
                        let outcome = self.engine.resolve(&mut self.store, &ticket, result);
                        sync_signals(outcome, signals);
                    }
                    Err(err) => signals.push(UiSignal::OperationFailed(err.to_string())),
                }
            }
            MapEvent::ImportBatch { text, options } => {
                let table = match parse_batch_table(&text) {
                    Ok(table) => table,
                    Err(err) => {
                        signals.push(UiSignal::OperationFailed(err.to_string()));
                        return;
                    }
                };
                let (report, outcomes) = apply_batch(
                    &mut self.engine,
                    &self.client,
                    &mut self.store,
                    &table,
                    &options,
                    self.origin.as_ref(),
                    &self.builder,
                );
                for outcome in outcomes {
                    applied_signals(outcome, &self.store, signals);
                }
                signals.push(UiSignal::BatchImported(report));
            }
        }
    }
}

fn validated(latitude: f64, longitude: f64, signals: &mut Vec<UiSignal>) -> Option<GeoPoint> {
    match GeoPoint::new(latitude, longitude) {
        Ok(point) => Some(point),
        Err(err) => {
            debug!("event=map_event module=workspace status=rejected error={}", err);
            signals.push(UiSignal::OperationFailed(err.to_string()));
            None
        }
    }
}

/// Signals for an update whose marker move was not announced beforehand.
fn applied_signals(outcome: SyncOutcome, store: &MapItemStore, signals: &mut Vec<UiSignal>) {
    if let SyncOutcome::Committed {
        id,
        realigned: None,
        ..
    } = outcome
    {
        signals.push(UiSignal::MarkerMoved {
            id,
            position: store.displayed_position(id),
        });
    }
    sync_signals(outcome, signals);
}

fn sync_signals(outcome: SyncOutcome, signals: &mut Vec<UiSignal>) {
    match outcome {
        SyncOutcome::Committed { id, realigned, .. } => {
            if let Some(position) = realigned {
                signals.push(UiSignal::MarkerMoved {
                    id,
                    position: Some(position),
                });
            }
            signals.push(UiSignal::ItemCommitted(id));
        }
        SyncOutcome::RolledBack {
            id,
            restored,
            error,
        } => {
            signals.push(UiSignal::MarkerMoved {
                id,
                position: restored,
            });
            signals.push(UiSignal::OperationFailed(error.to_string()));
        }
        SyncOutcome::Superseded { .. } | SyncOutcome::Stale { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::{sync_signals, UiSignal};
    use crate::model::geo::GeoPoint;
    use crate::persistence::PersistenceError;
    use crate::sync::marker_sync::SyncOutcome;
    use uuid::Uuid;

    #[test]
    fn realigned_commit_redraws_marker_before_commit_signal() {
        let id = Uuid::new_v4();
        let position = GeoPoint::new(40.01, -3.01).unwrap();
        let mut signals = Vec::new();
        sync_signals(
            SyncOutcome::Committed {
                id,
                latest: false,
                realigned: Some(position),
            },
            &mut signals,
        );
        assert_eq!(
            signals,
            vec![
                UiSignal::MarkerMoved {
                    id,
                    position: Some(position),
                },
                UiSignal::ItemCommitted(id),
            ]
        );
    }

    #[test]
    fn superseded_and_stale_outcomes_are_silent() {
        let id = Uuid::new_v4();
        let mut signals = Vec::new();
        sync_signals(
            SyncOutcome::Superseded {
                id,
                error: PersistenceError::Transport("reset".to_string()),
            },
            &mut signals,
        );
        sync_signals(SyncOutcome::Stale { id, seq: 1 }, &mut signals);
        assert!(signals.is_empty());
    }
}
