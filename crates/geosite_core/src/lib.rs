//! Core of the geosite placement toolkit.
//!
//! Converts between WGS84, UTM and project-local frames, drives the
//! placement and drag workflows, and persists map items.

pub mod config;
pub mod db;
pub mod geodesy;
pub mod import;
pub mod loader;
pub mod logging;
pub mod model;
pub mod persistence;
pub mod session;
pub mod store;
pub mod sync;
pub mod workspace;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use geodesy::bundle::BundleBuilder;
pub use geodesy::frame::ProjectFrame;
pub use geodesy::utm::GeodeticProjector;
pub use import::{
    apply_batch, parse_batch_table, parse_coordinate_text, read_batch_file, resolve_import,
    BatchOptions, BatchReport, BatchTable, CoordinateType, ImportError, ParsedCoordinates,
};
pub use loader::{load_project_items, LoadReport};
pub use logging::{default_log_level, init_logging, logging_status, LogInitError};
pub use model::geo::{
    CoordinateBundle, Datum, GeoPoint, GeoPointError, Hemisphere, LocalCoordinate,
    ProjectOrigin, UtmCoordinate,
};
pub use model::item::{
    CoordinateSource, FileRef, IncidentDetails, ItemId, ItemKind, ItemPayload, MapItem,
    ProjectId, Severity,
};
pub use persistence::{
    PersistenceClient, PersistenceError, PersistenceResult, SqlitePersistence,
};
pub use session::{CaptureError, CaptureForm, CaptureSession, CaptureState, ValidationError};
pub use store::item_store::{ItemStats, MapItemStore};
pub use store::origin::{resolve_origin, CachedOriginStore, OriginStore};
pub use sync::{
    recalculate_items, reposition_project, MarkerSyncEngine, RecalculationReport, SyncError,
    SyncOutcome,
};
pub use workspace::{MapEvent, MapWorkspace, UiSignal};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
