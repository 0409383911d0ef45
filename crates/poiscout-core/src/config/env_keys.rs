//! 环境变量 key 常量与别名定义
//!
//! 主变量优先使用 `POISCOUT_*`，兼容 `OPENAI_*`。

/// LLM API 配置
pub mod llm {
    pub const API_BASE: &str = "POISCOUT_API_BASE";
    pub const API_BASE_ALIASES: &[&str] = &["OPENAI_API_BASE", "OPENAI_BASE_URL"];

    pub const API_KEY: &str = "POISCOUT_API_KEY";
    pub const API_KEY_ALIASES: &[&str] = &["OPENAI_API_KEY"];

    pub const MODEL: &str = "POISCOUT_MODEL";
    pub const MODEL_ALIASES: &[&str] = &["OPENAI_MODEL"];

    /// Plan / query generation; falls back to MODEL.
    pub const PLANNER_MODEL: &str = "POISCOUT_PLANNER_MODEL";
    /// Reflection and skill summarization; falls back to MODEL.
    pub const REFLECTION_MODEL: &str = "POISCOUT_REFLECTION_MODEL";
    /// Cheap model for per-POI judgements; falls back to MODEL.
    pub const SMALL_MODEL: &str = "POISCOUT_SMALL_MODEL";
}

/// Embedding
pub mod embedding {
    pub const MODEL: &str = "POISCOUT_EMBEDDING_MODEL";
    pub const MODEL_ALIASES: &[&str] = &["EMBEDDING_MODEL"];
    pub const DIMENSION: &str = "POISCOUT_EMBEDDING_DIMENSION";
}

/// 数据目录与存储后端
pub mod paths {
    pub const DATA_ROOT: &str = "POISCOUT_DATA_ROOT";
    /// memory | json | sqlite
    pub const STORE: &str = "POISCOUT_STORE";
}

/// 在线优化
pub mod optimizer {
    pub const MAX_ITERATIONS: &str = "POISCOUT_OPT_ITERATIONS";
    pub const REGULARIZATION_THRESHOLD: &str = "POISCOUT_REGULARIZATION_THRESHOLD";
    pub const CONVERGENCE_EPSILON: &str = "POISCOUT_CONVERGENCE_EPSILON";
    pub const CONCURRENCY: &str = "POISCOUT_STEP_CONCURRENCY";
    pub const STEP_TIMEOUT_SECS: &str = "POISCOUT_STEP_TIMEOUT_SECS";
    pub const RETRIES: &str = "POISCOUT_LLM_RETRIES";
}

/// 经验库（skills）
pub mod library {
    pub const DIVERSITY_THRESHOLD: &str = "POISCOUT_DIVERSITY_THRESHOLD";
    pub const RETRIEVE_K: &str = "POISCOUT_SKILL_TOP_K";
    pub const MIN_GAIN_RATIO: &str = "POISCOUT_MIN_GAIN_RATIO";
}

/// 决策树
pub mod selector {
    pub const LEAF_THRESHOLD: &str = "POISCOUT_LEAF_THRESHOLD";
    pub const MAX_DEPTH: &str = "POISCOUT_TREE_MAX_DEPTH";
    pub const QUESTION_CANDIDATES: &str = "POISCOUT_QUESTION_CANDIDATES";
}

/// 可观测性与日志
pub mod observability {
    pub const QUIET: &str = "POISCOUT_QUIET";
    pub const LOG_LEVEL: &str = "POISCOUT_LOG_LEVEL";
    pub const LOG_JSON: &str = "POISCOUT_LOG_JSON";
    pub const AUDIT_LOG: &str = "POISCOUT_AUDIT_LOG";
}
