//! Project origin resolution.
//!
//! # Responsibility
//! - Resolve a project's local frame from a session cache and its metadata.
//! - Persist origin changes to both.
//!
//! # Invariants
//! - Precedence is: session cache, then project metadata, then none.
//! - Origin point and rotation resolve independently; rotation defaults to
//!   0 degrees.
//! - Without an origin point there is no local frame.

use crate::model::geo::ProjectOrigin;
use crate::model::item::ProjectId;
use crate::persistence::{DeclaredOrigin, PersistenceResult, ProjectMetadataSource};
use log::warn;
use std::collections::HashMap;

/// Source of per-project local frames.
pub trait OriginStore {
    fn get_origin(&self, project: ProjectId) -> Option<ProjectOrigin>;
    fn save_origin(&mut self, project: ProjectId, origin: ProjectOrigin) -> PersistenceResult<()>;
}

/// Combines cached and declared origin fields by precedence.
pub fn resolve_origin(
    cached: Option<&DeclaredOrigin>,
    metadata: Option<&DeclaredOrigin>,
) -> Option<ProjectOrigin> {
    let origin = cached
        .and_then(|declared| declared.origin)
        .or_else(|| metadata.and_then(|declared| declared.origin))?;
    let rotation_degrees = cached
        .and_then(|declared| declared.rotation_degrees)
        .or_else(|| metadata.and_then(|declared| declared.rotation_degrees))
        .unwrap_or(0.0);

    Some(ProjectOrigin {
        origin,
        rotation_degrees,
    })
}

/// Origin store with a session-lifetime cache in front of project metadata.
pub struct CachedOriginStore<M: ProjectMetadataSource> {
    metadata: M,
    cache: HashMap<ProjectId, DeclaredOrigin>,
}

impl<M: ProjectMetadataSource> CachedOriginStore<M> {
    pub fn new(metadata: M) -> Self {
        Self {
            metadata,
            cache: HashMap::new(),
        }
    }

    /// Sets cached fields only; metadata is left untouched.
    pub fn cache_origin(&mut self, project: ProjectId, declared: DeclaredOrigin) {
        self.cache.insert(project, declared);
    }
}

impl<M: ProjectMetadataSource> OriginStore for CachedOriginStore<M> {
    fn get_origin(&self, project: ProjectId) -> Option<ProjectOrigin> {
        let metadata = match self.metadata.declared_origin(project) {
            Ok(declared) => Some(declared),
            Err(err) => {
                warn!(
                    "event=origin_resolve module=store status=degraded project_id={} error={}",
                    project, err
                );
                None
            }
        };
        resolve_origin(self.cache.get(&project), metadata.as_ref())
    }

    fn save_origin(&mut self, project: ProjectId, origin: ProjectOrigin) -> PersistenceResult<()> {
        let declared = DeclaredOrigin {
            origin: Some(origin.origin),
            rotation_degrees: Some(origin.rotation_degrees),
        };
        self.metadata.save_declared_origin(project, &declared)?;
        self.cache.insert(project, declared);
        Ok(())
    }
}
