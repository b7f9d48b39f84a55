//! Skillyard core: shared foundation for the storage engine, package
//! manager and execution sandbox — error taxonomy, tenant namespaces,
//! configuration, path-scope validation and observability.

pub mod config;
pub mod error;
pub mod namespace;
pub mod observability;
pub mod scope;
pub mod skill;

pub use error::{Error, Result};
pub use namespace::Namespace;
