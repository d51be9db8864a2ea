//! Persistence boundary for project items and project metadata.
//!
//! # Responsibility
//! - Define the client contract capture, sync and loading depend on.
//! - Classify failures into transport errors and partial-data outcomes.
//!
//! # Invariants
//! - `update_coordinates` is idempotent for the same bundle.
//! - An unavailable list endpoint reports `Unavailable`, which callers treat
//!   as an empty category rather than a failure.

use crate::db::DbError;
use crate::model::geo::{CoordinateBundle, GeoPoint};
use crate::model::item::{
    CoordinateSource, FileRef, IncidentDetails, ItemId, ItemKind, MapItem, ProjectId,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite;
pub mod wire;

pub use sqlite::SqlitePersistence;
pub use wire::CoordinateFields;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Failure reported by a persistence client.
#[derive(Debug)]
pub enum PersistenceError {
    /// Network or server failure.
    Transport(String),
    /// Endpoint does not exist for this deployment.
    Unavailable(&'static str),
    /// Target item does not exist.
    NotFound { kind: ItemKind, id: ItemId },
    /// Request refused by the backend.
    Rejected(String),
    /// Local storage failure.
    Db(DbError),
    /// Stored data cannot be mapped back into the domain model.
    InvalidData(String),
}

impl PersistenceError {
    /// Whether this error only means "this category has no data source".
    pub fn is_partial_data(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl Display for PersistenceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "transport failure: {message}"),
            Self::Unavailable(endpoint) => write!(f, "endpoint unavailable: {endpoint}"),
            Self::NotFound { kind, id } => write!(f, "{} not found: {id}", kind.as_str()),
            Self::Rejected(message) => write!(f, "request rejected: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored item data: {message}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for PersistenceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Item operations offered by the backend, scoped per project.
pub trait PersistenceClient {
    fn list_photos360(&self, project: ProjectId) -> PersistenceResult<Vec<MapItem>>;
    fn list_gallery_images(&self, project: ProjectId) -> PersistenceResult<Vec<MapItem>>;
    fn list_incidents(&self, project: ProjectId) -> PersistenceResult<Vec<MapItem>>;

    fn upload_photo360(
        &self,
        project: ProjectId,
        file: &FileRef,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem>;

    fn upload_gallery_image(
        &self,
        project: ProjectId,
        file: &FileRef,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem>;

    /// Creates an incident; `details.title` must not be blank.
    fn create_incident(
        &self,
        project: ProjectId,
        details: &IncidentDetails,
        bundle: &CoordinateBundle,
        z: f64,
    ) -> PersistenceResult<MapItem>;

    fn update_coordinates(
        &self,
        project: ProjectId,
        kind: ItemKind,
        id: ItemId,
        bundle: &CoordinateBundle,
        source: CoordinateSource,
    ) -> PersistenceResult<()>;
}

/// Origin fields a project declares in its own metadata.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeclaredOrigin {
    pub origin: Option<GeoPoint>,
    pub rotation_degrees: Option<f64>,
}

/// Project metadata access used by origin resolution.
pub trait ProjectMetadataSource {
    fn declared_origin(&self, project: ProjectId) -> PersistenceResult<DeclaredOrigin>;
    fn save_declared_origin(
        &self,
        project: ProjectId,
        declared: &DeclaredOrigin,
    ) -> PersistenceResult<()>;
}
