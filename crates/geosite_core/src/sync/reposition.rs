//! Project repositioning and coordinate recalculation.
//!
//! # Responsibility
//! - Save a new project origin/rotation.
//! - Rebuild every placed item's bundle for the current origin and persist it
//!   through the marker update protocol.
//!
//! # Invariants
//! - Items imported as local coordinates keep their x/y/z; their geodetic
//!   and UTM values move with the frame.
//! - All other items keep their geodetic position; only their local x/y is
//!   recomputed.
//! - A failing item is reported and skipped; the others are still updated.
//! - Nothing is recalculated when the new origin cannot be saved.

use crate::geodesy::bundle::BundleBuilder;
use crate::model::geo::{CoordinateBundle, GeoPointError, ProjectOrigin};
use crate::model::item::{CoordinateSource, ItemId, MapItem};
use crate::persistence::{PersistenceClient, PersistenceResult};
use crate::store::item_store::MapItemStore;
use crate::store::origin::OriginStore;
use crate::sync::marker_sync::{MarkerSyncEngine, SyncOutcome};
use log::{info, warn};

/// Counters of one recalculation pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecalculationReport {
    pub total_items: usize,
    pub updated: usize,
    pub errors: Vec<(ItemId, String)>,
}

/// Bundle of `item` in the frame of `origin`; `None` for unplaced items.
///
/// # Errors
/// - `GeoPointError` when local coordinates land outside the valid range in
///   the new frame.
pub fn recalculated_bundle(
    item: &MapItem,
    origin: &ProjectOrigin,
    builder: &BundleBuilder,
) -> Result<Option<CoordinateBundle>, GeoPointError> {
    let Some(bundle) = item.bundle else {
        return Ok(None);
    };
    match (item.source, bundle.local) {
        (CoordinateSource::Local, Some(local)) => {
            builder.build_from_local(&local, origin).map(Some)
        }
        _ => Ok(Some(builder.build_at_height(bundle.geo, Some(origin), item.height))),
    }
}

/// Recalculates every placed item of `store` for `origin`.
pub fn recalculate_items<C: PersistenceClient + ?Sized>(
    engine: &mut MarkerSyncEngine,
    client: &C,
    store: &mut MapItemStore,
    origin: &ProjectOrigin,
    builder: &BundleBuilder,
) -> (RecalculationReport, Vec<SyncOutcome>) {
    let mut report = RecalculationReport {
        total_items: store.len(),
        ..RecalculationReport::default()
    };
    let planned: Vec<_> = store
        .items()
        .map(|item| (item.id, item.source, recalculated_bundle(item, origin, builder)))
        .collect();

    let mut outcomes = Vec::with_capacity(planned.len());
    for (id, source, rebuilt) in planned {
        let bundle = match rebuilt {
            Ok(Some(bundle)) => bundle,
            Ok(None) => continue,
            Err(err) => {
                warn!(
                    "event=recalculate module=sync status=skipped item_id={} error={}",
                    id, err
                );
                report.errors.push((id, err.to_string()));
                continue;
            }
        };
        match engine.apply_assignment(client, store, id, bundle, source) {
            Ok(outcome) => {
                match &outcome {
                    SyncOutcome::Committed { .. } => report.updated += 1,
                    SyncOutcome::RolledBack { error, .. }
                    | SyncOutcome::Superseded { error, .. } => {
                        report.errors.push((id, error.to_string()));
                    }
                    SyncOutcome::Stale { .. } => {}
                }
                outcomes.push(outcome);
            }
            Err(err) => report.errors.push((id, err.to_string())),
        }
    }

    info!(
        "event=recalculate module=sync status={} project_id={} items={} updated={} errors={}",
        if report.errors.is_empty() { "ok" } else { "partial" },
        store.project_id(),
        report.total_items,
        report.updated,
        report.errors.len()
    );
    (report, outcomes)
}

/// Saves `origin` for the store's project, then optionally recalculates.
///
/// # Errors
/// Returns the save failure; no item is touched in that case.
pub fn reposition_project<C: PersistenceClient + ?Sized, O: OriginStore + ?Sized>(
    engine: &mut MarkerSyncEngine,
    client: &C,
    origins: &mut O,
    store: &mut MapItemStore,
    origin: ProjectOrigin,
    recalculate: bool,
    builder: &BundleBuilder,
) -> PersistenceResult<(RecalculationReport, Vec<SyncOutcome>)> {
    origins.save_origin(store.project_id(), origin)?;
    info!(
        "event=reposition module=sync status=ok project_id={} origin_lat={} origin_lng={} rotation={} recalculate={}",
        store.project_id(),
        origin.origin.latitude,
        origin.origin.longitude,
        origin.rotation_degrees,
        recalculate
    );
    if !recalculate {
        return Ok((RecalculationReport::default(), Vec::new()));
    }
    Ok(recalculate_items(engine, client, store, &origin, builder))
}
