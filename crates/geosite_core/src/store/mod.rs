//! In-memory state owned by the core.
//!
//! # Responsibility
//! - Hold the project's map items keyed by identity (`item_store`).
//! - Resolve the project's local frame origin (`origin`).
//!
//! # Invariants
//! - Item state changes only through capture submission, sync commits and
//!   loading; rendering code reads but never writes.

pub mod item_store;
pub mod origin;
