//! Skillyard storage engine: per-tenant reader/writer locking and safe
//! file primitives.
//!
//! Callers acquire the namespace lock through [`LockTable`] and perform
//! I/O with the [`ops`] primitives inside the guarded closure. Path-scope
//! validation lives in `skillyard_core::scope` so the execution sandbox
//! can share it.

pub mod lock;
pub mod ops;

pub use lock::LockTable;
