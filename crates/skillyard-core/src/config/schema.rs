//! 按领域分组的配置结构体
//!
//! 从环境变量加载，统一 fallback 逻辑。

use std::path::PathBuf;

use super::loader::{env_bool, env_optional, env_or, load_dotenv};
use crate::namespace::SHARED_TOOLS_DIR;

/// 存储根路径配置
///
/// - `product_root`：每个 agent 工作区的根目录
/// - `skill_root`：分层技能存储根目录（baseline / overlay）
/// - `tools_dir`：共享只读工具目录
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub product_root: PathBuf,
    pub skill_root: PathBuf,
    pub tools_dir: PathBuf,
}

impl PathsConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let product_root = env_optional("SKILLYARD_PRODUCT_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(default_product_root);
        let skill_root = env_optional("SKILLYARD_SKILL_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| product_root.join("skill"));
        let tools_dir = env_optional("SKILLYARD_TOOLS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| product_root.join(SHARED_TOOLS_DIR));
        Self {
            product_root,
            skill_root,
            tools_dir,
        }
    }

    /// Explicit roots, for embedding and tests.
    pub fn with_roots(product_root: impl Into<PathBuf>) -> Self {
        let product_root = product_root.into();
        Self {
            skill_root: product_root.join("skill"),
            tools_dir: product_root.join(SHARED_TOOLS_DIR),
            product_root,
        }
    }
}

fn default_product_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("skillyard").join("product"))
        .unwrap_or_else(|| PathBuf::from("./skillyard-product"))
}

/// 日志与审计配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        Self {
            quiet: env_bool("SKILLYARD_QUIET", false),
            log_level: env_or("SKILLYARD_LOG_LEVEL", || "skillyard=info".to_string()),
            log_json: env_bool("SKILLYARD_LOG_JSON", false),
            audit_log: env_optional("SKILLYARD_AUDIT_LOG"),
        }
    }
}
