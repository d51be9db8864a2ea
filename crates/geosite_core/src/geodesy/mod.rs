//! Coordinate transformation engine.
//!
//! # Responsibility
//! - Project WGS84 points to UTM and back (`utm`).
//! - Map WGS84 points into project-local frames (`frame`).
//! - Combine both into coordinate bundles (`bundle`).
//!
//! # Invariants
//! - Every function here is pure and reentrant.
//! - No geoid correction or datum shift is performed.

pub mod bundle;
pub mod frame;
pub mod utm;
