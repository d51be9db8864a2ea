//! Map item domain model.
//!
//! # Responsibility
//! - Define the three placeable item variants and their payloads.
//! - Carry the last server-confirmed coordinate bundle of each item.
//!
//! # Invariants
//! - `id` is stable and assigned by persistence on creation.
//! - `bundle` is replaced only by confirmed writes (capture or sync commit).
//! - Incident titles are never empty once persisted.

use crate::model::geo::{CoordinateBundle, GeoPoint};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a map item.
pub type ItemId = Uuid;

/// Identifier of the owning project.
pub type ProjectId = i64;

/// Item category; also the capture mode a placement tool arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Photo360,
    GalleryImage,
    Incident,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [Self::Photo360, Self::GalleryImage, Self::Incident];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo360 => "photo360",
            Self::GalleryImage => "gallery_image",
            Self::Incident => "incident",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "photo360" | "360" => Some(Self::Photo360),
            "gallery_image" | "image" => Some(Self::GalleryImage),
            "incident" => Some(Self::Incident),
            _ => None,
        }
    }
}

/// How an item's coordinates were last obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSource {
    /// Placed or dragged on the map.
    #[default]
    Manual,
    /// Imported as project-local x/y/z.
    Local,
    /// Imported as UTM easting/northing.
    Utm,
    /// Imported as latitude/longitude.
    Geo,
}

impl CoordinateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Local => "local",
            Self::Utm => "utm",
            Self::Geo => "geo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "local" => Some(Self::Local),
            "utm" => Some(Self::Utm),
            "geo" => Some(Self::Geo),
            _ => None,
        }
    }
}

/// Incident severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Reference to an uploaded (or to-be-uploaded) media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub file_name: String,
    /// Raw file content for uploads; empty for listed items.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl FileRef {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// User-entered incident fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentDetails {
    pub title: String,
    pub description: String,
    pub incident_type: String,
    pub severity: Severity,
}

impl IncidentDetails {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            incident_type: "defect".to_string(),
            severity: Severity::default(),
        }
    }
}

/// Type-specific item payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemPayload {
    Photo360(FileRef),
    GalleryImage(FileRef),
    Incident(IncidentDetails),
}

impl ItemPayload {
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Photo360(_) => ItemKind::Photo360,
            Self::GalleryImage(_) => ItemKind::GalleryImage,
            Self::Incident(_) => ItemKind::Incident,
        }
    }

    /// Short human label (file name or incident title).
    pub fn label(&self) -> &str {
        match self {
            Self::Photo360(file) | Self::GalleryImage(file) => file.file_name.as_str(),
            Self::Incident(details) => details.title.as_str(),
        }
    }
}

/// One placeable project item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapItem {
    pub id: ItemId,
    pub project_id: ProjectId,
    pub payload: ItemPayload,
    /// Last server-confirmed placement; `None` until the item is placed.
    pub bundle: Option<CoordinateBundle>,
    /// Height in meters, kept even when the project has no local frame.
    pub height: f64,
    pub source: CoordinateSource,
}

impl MapItem {
    pub fn kind(&self) -> ItemKind {
        self.payload.kind()
    }

    pub fn position(&self) -> Option<GeoPoint> {
        self.bundle.map(|bundle| bundle.geo)
    }
}
