//! Tenant namespaces.
//!
//! A namespace is one user operating one agent. It selects both the
//! reader/writer lock and the filesystem roots an operation may touch.
//! Namespaces are created implicitly on first access and never destroyed
//! while the process runs.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Logical subtree for per-tenant skill packages.
pub const SKILLS_AREA: &str = "skills";

/// Logical subtree for generic per-tenant files.
pub const FILES_AREA: &str = "files";

/// Directory name of the shared read-only tools area under the product root.
pub const SHARED_TOOLS_DIR: &str = "skill-creator";

/// Tenant identity: one user operating one agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub user_id: String,
    pub agent_id: String,
}

impl Namespace {
    pub fn new(user_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            agent_id: agent_id.into(),
        }
    }

    /// Lock key for layered skill storage: user and agent together.
    pub fn lock_key(&self) -> String {
        format!("{}/{}", self.user_id, self.agent_id)
    }

    /// Lock key for the per-agent workspace, shared across users.
    pub fn agent_key(&self) -> &str {
        &self.agent_id
    }
}

/// Reject identifiers that would change path structure when joined into a
/// filesystem path (user ids, agent ids, skill ids).
pub fn validate_component(id: &str) -> Result<&str> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\']) {
        return Err(Error::Security(format!("Invalid identifier: {}", id)));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_keys() {
        let ns = Namespace::new("u1", "agent-a");
        assert_eq!(ns.lock_key(), "u1/agent-a");
        assert_eq!(ns.agent_key(), "agent-a");
    }

    #[test]
    fn test_distinct_users_get_distinct_lock_keys() {
        let a = Namespace::new("u1", "agent");
        let b = Namespace::new("u2", "agent");
        assert_ne!(a.lock_key(), b.lock_key());
        assert_eq!(a.agent_key(), b.agent_key());
    }

    #[test]
    fn test_validate_component_rejects_path_structure() {
        assert!(validate_component("agent-a").is_ok());
        assert!(validate_component("技能").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(validate_component(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
