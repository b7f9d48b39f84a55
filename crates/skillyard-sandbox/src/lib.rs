//! Skillyard execution sandbox.
//!
//! Vets a command specification against a fixed security policy, then
//! spawns it with a sanitized environment, pinned working directory,
//! concurrent output draining and a hard wall-clock timeout. Isolation is
//! path- and allowlist-based; there is no kernel-level confinement.

pub mod executor;
pub mod policy;
pub mod validator;

pub use executor::{run, ExecutionLimits, ExecutionResult};
pub use validator::{CommandSpec, SandboxContext, SkillArea, ValidationError};
