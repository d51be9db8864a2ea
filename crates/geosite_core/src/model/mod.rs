//! Domain model for geo-tagged site items.
//!
//! # Responsibility
//! - Define the coordinate value types shared by projection, sync and storage.
//! - Define the map item variants (360 photo, gallery image, incident).
//!
//! # Invariants
//! - Coordinate bundles are immutable values; items replace them wholesale.
//! - `GeoPoint` values are range-checked at construction and when
//!   deserialized.

pub mod geo;
pub mod item;
