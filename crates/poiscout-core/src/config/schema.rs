//! 按领域分组的配置结构体
//!
//! 从环境变量加载，统一 fallback 逻辑。各引擎组件只接收结构体，不读取环境变量。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::env_keys::{embedding, library, llm, observability as obv_keys, optimizer, paths, selector};
use super::loader::{env_bool, env_optional, env_or, env_parse, load_dotenv};

/// LLM API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub planner_model: String,
    pub reflection_model: String,
    pub small_model: String,
}

impl LlmConfig {
    /// 从环境变量加载，空值使用默认（会自动加载 .env）
    pub fn from_env() -> Self {
        load_dotenv();
        let model = env_or(llm::MODEL, llm::MODEL_ALIASES, || "gpt-4o".to_string());
        Self {
            api_base: env_or(llm::API_BASE, llm::API_BASE_ALIASES, || {
                "https://api.openai.com/v1".to_string()
            }),
            api_key: env_or(llm::API_KEY, llm::API_KEY_ALIASES, String::new),
            planner_model: env_or(llm::PLANNER_MODEL, &[], || model.clone()),
            reflection_model: env_or(llm::REFLECTION_MODEL, &[], || model.clone()),
            small_model: env_or(llm::SMALL_MODEL, &[], || model.clone()),
            model,
        }
    }

    /// 若 api_key 或 api_base 为空则返回 None
    pub fn try_from_env() -> Option<Self> {
        let cfg = Self::from_env();
        if cfg.api_key.trim().is_empty() || cfg.api_base.trim().is_empty() {
            None
        } else {
            Some(cfg)
        }
    }
}

/// Embedding API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let defaults = Self::default();
        Self {
            model: env_or(embedding::MODEL, embedding::MODEL_ALIASES, || defaults.model),
            dimension: env_parse(embedding::DIMENSION, defaults.dimension),
        }
    }
}

/// 持久化后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    JsonDir,
    Sqlite,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(Self::Memory),
            "json" | "json_dir" | "dir" => Some(Self::JsonDir),
            "sqlite" | "db" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

/// 数据目录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// 默认 `~/.poiscout`
    pub data_root: PathBuf,
    pub store_backend: StoreBackend,
}

impl PathsConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let data_root = env_optional(paths::DATA_ROOT, &[])
            .map(PathBuf::from)
            .unwrap_or_else(default_data_root);
        let store_backend = match env_optional(paths::STORE, &[]) {
            Some(raw) => StoreBackend::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("Unknown {} value '{}', defaulting to sqlite", paths::STORE, raw);
                StoreBackend::Sqlite
            }),
            None => StoreBackend::Sqlite,
        };
        Self {
            data_root,
            store_backend,
        }
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.data_root.join("poiscout.db")
    }

    pub fn json_dir(&self) -> PathBuf {
        self.data_root.join("store")
    }
}

fn default_data_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".poiscout")
}

/// Online optimizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub max_iterations: u32,
    /// Consecutive non-improving iterations before a step is force-resampled.
    pub regularization_threshold: u32,
    /// Mean-quality improvement below which an iteration counts toward
    /// convergence. A drop in quality is always below it.
    pub convergence_epsilon: f64,
    /// Steps dispatched concurrently within one EXECUTE phase.
    pub concurrency: usize,
    pub step_timeout_secs: u64,
    /// Extra attempts after a failed plan or reflection call. Each retry is
    /// sampled hotter.
    pub retries: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            regularization_threshold: 3,
            convergence_epsilon: 0.01,
            concurrency: 4,
            step_timeout_secs: 120,
            retries: 2,
        }
    }
}

impl OptimizerConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let d = Self::default();
        Self {
            max_iterations: env_parse(optimizer::MAX_ITERATIONS, d.max_iterations),
            regularization_threshold: env_parse(
                optimizer::REGULARIZATION_THRESHOLD,
                d.regularization_threshold,
            ),
            convergence_epsilon: env_parse(optimizer::CONVERGENCE_EPSILON, d.convergence_epsilon),
            concurrency: env_parse(optimizer::CONCURRENCY, d.concurrency).max(1),
            step_timeout_secs: env_parse(optimizer::STEP_TIMEOUT_SECS, d.step_timeout_secs),
            retries: env_parse(optimizer::RETRIES, d.retries),
        }
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

/// Skill library / distillation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// θ_div: a candidate more similar than this to any stored skill is rejected.
    pub diversity_threshold: f32,
    pub retrieve_k: usize,
    /// Optimized pool must be at least this many times the initial pool to distill.
    pub min_gain_ratio: f64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            diversity_threshold: 0.87,
            retrieve_k: 8,
            min_gain_ratio: 1.5,
        }
    }
}

impl LibraryConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let d = Self::default();
        Self {
            diversity_threshold: env_parse(library::DIVERSITY_THRESHOLD, d.diversity_threshold),
            retrieve_k: env_parse(library::RETRIEVE_K, d.retrieve_k),
            min_gain_ratio: env_parse(library::MIN_GAIN_RATIO, d.min_gain_ratio),
        }
    }
}

/// Decision tree settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Subsets at or below this size become leaves.
    pub leaf_threshold: usize,
    pub max_depth: usize,
    /// Question candidates generated and scored per node.
    pub question_candidates: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            leaf_threshold: 2,
            max_depth: 5,
            question_candidates: 3,
        }
    }
}

impl SelectorConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let d = Self::default();
        Self {
            leaf_threshold: env_parse(selector::LEAF_THRESHOLD, d.leaf_threshold),
            max_depth: env_parse(selector::MAX_DEPTH, d.max_depth),
            question_candidates: env_parse(selector::QUESTION_CANDIDATES, d.question_candidates)
                .max(1),
        }
    }
}

/// 可观测性配置：quiet、log_level、log_json、audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            Self {
                quiet: env_bool(obv_keys::QUIET, &[], false),
                log_level: env_or(obv_keys::LOG_LEVEL, &[], || "poiscout=info".to_string()),
                log_json: env_bool(obv_keys::LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::AUDIT_LOG, &[]),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(StoreBackend::parse("SQLite"), Some(StoreBackend::Sqlite));
        assert_eq!(StoreBackend::parse("json"), Some(StoreBackend::JsonDir));
        assert_eq!(StoreBackend::parse("mem"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse("redis"), None);
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let opt = OptimizerConfig::default();
        assert_eq!(opt.max_iterations, 5);
        assert_eq!(opt.regularization_threshold, 3);
        assert_eq!(opt.step_timeout(), Duration::from_secs(120));
        assert_eq!(opt.retries, 2);
        let lib = LibraryConfig::default();
        assert!((lib.diversity_threshold - 0.87).abs() < f32::EPSILON);
        assert_eq!(SelectorConfig::default().leaf_threshold, 2);
    }
}
