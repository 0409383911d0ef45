//! Observability: tracing init and the JSONL audit log.
//!
//! Uses config::ObservabilityConfig for POISCOUT_QUIET, LOG_LEVEL, LOG_JSON, AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Tracing initialization mode.
#[derive(Clone, Copy)]
pub enum TracingMode {
    /// Use POISCOUT_LOG_LEVEL / POISCOUT_QUIET from env
    Default,
    /// Interactive selection: keep engine chatter off the prompt
    Interactive,
}

/// Initialize tracing. Call at process startup.
/// When POISCOUT_QUIET=1, only WARN and above are logged.
pub fn init_tracing(mode: TracingMode) {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let mut level: String = if cfg.quiet {
        "poiscout=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    if matches!(mode, TracingMode::Interactive) {
        level = format!("{},poiscout_search=warn,poiscout_selector=warn", level);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = crate::config::ObservabilityConfig::from_env()
        .audit_log
        .clone()?;
    set_audit_path(&path);
    Some(path)
}

/// Override the audit log destination (tests, CLI `--audit-log`).
pub fn set_audit_path(path: &str) {
    if path.is_empty() {
        return;
    }
    if let Some(parent) = Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut guard) = AUDIT_PATH.lock() {
        *guard = Some(path.to_string());
    }
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn audit(event: &str, fields: serde_json::Value) {
    let Some(path) = get_audit_path() else {
        return;
    };
    let mut record = json!({
        "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "event": event,
    });
    if let (Some(obj), serde_json::Value::Object(extra)) = (record.as_object_mut(), fields) {
        obj.extend(extra);
    }
    append_jsonl(&path, &record);
}

/// Audit: a distilled skill passed the diversity check and was stored
pub fn audit_skill_accepted(skill_id: &str, source_task_id: &str, max_similarity: f32) {
    audit(
        "skill_accepted",
        json!({
            "skill_id": skill_id,
            "source_task_id": source_task_id,
            "max_similarity": max_similarity,
        }),
    );
}

/// Audit: a candidate skill was too close to an existing one
pub fn audit_skill_rejected(source_task_id: &str, max_similarity: f32, threshold: f32) {
    audit(
        "skill_rejected",
        json!({
            "source_task_id": source_task_id,
            "max_similarity": max_similarity,
            "threshold": threshold,
        }),
    );
}

/// Audit: decision tree persisted
pub fn audit_tree_saved(task_id: &str, poi_count: usize, node_count: usize) {
    audit(
        "tree_saved",
        json!({
            "task_id": task_id,
            "poi_count": poi_count,
            "node_count": node_count,
        }),
    );
}

/// Audit: optimizer run ended (converged, exhausted, cancelled or incomplete)
pub fn audit_optimization_finished(
    task_id: &str,
    status: &str,
    iterations: u32,
    pois_before: usize,
    pois_after: usize,
) {
    audit(
        "optimization_finished",
        json!({
            "task_id": task_id,
            "status": status,
            "iterations": iterations,
            "pois_before": pois_before,
            "pois_after": pois_after,
        }),
    );
}
