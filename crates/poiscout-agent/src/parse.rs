//! Strict parsing of model output at the capability boundary.
//!
//! Model text is never trusted: everything is decoded into the closed core
//! types here, and anything that cannot be is either an error or an explicit
//! degraded default with a warning.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use poiscout_core::capability::{Reflection, StepExecution};
use poiscout_core::poi::name_hash;
use poiscout_core::{Poi, SearchPlan, SearchStep, StepVerdict, Verdict};
use serde_json::Value;

/// Pull the JSON payload out of a model reply.
///
/// A ```json fence wins over any other fence. Without a fence, the reply is
/// scanned for an outermost `{..}` or `[..]` span; the earlier one that
/// decodes is taken, so prose like "step [2] is weak" in front of an object
/// does not hide it.
pub fn extract_json_block(content: &str) -> &str {
    let content = content.trim();
    if let Some(body) = fenced(content, "```json").or_else(|| fenced(content, "```")) {
        return body;
    }

    let mut spans: Vec<&str> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = content.find(open)?;
            let end = content.rfind(close)?;
            (start < end).then(|| &content[start..=end])
        })
        .collect();
    spans.sort_by_key(|span| span.as_ptr() as usize);
    spans
        .iter()
        .find(|span| serde_json::from_str::<Value>(span).is_ok())
        .or(spans.first())
        .copied()
        .unwrap_or(content)
}

/// Body of the first fence opened by `marker`. The rest of the opening line
/// (a language tag) is skipped unless the fence closes on that same line.
fn fenced<'a>(content: &'a str, marker: &str) -> Option<&'a str> {
    let rest = &content[content.find(marker)? + marker.len()..];
    let body_start = rest
        .find('\n')
        .filter(|nl| !rest[..*nl].contains("```"))
        .map_or(0, |nl| nl + 1);
    let end = rest[body_start..].find("```")?;
    Some(rest[body_start..body_start + end].trim())
}

fn parse_value(content: &str, what: &str) -> Result<Value> {
    let json_str = extract_json_block(content);
    serde_json::from_str(json_str).with_context(|| format!("Failed to parse {} JSON: {:.200}", what, json_str))
}

fn parse_object(content: &str, what: &str) -> Result<Value> {
    let value = parse_value(content, what)?;
    if !value.is_object() {
        bail!("{} output is not a JSON object", what);
    }
    Ok(value)
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `{"steps":[{"topic","query"}]}` → plan. Steps without a topic are dropped;
/// a missing query falls back to the topic text.
pub fn parse_plan(content: &str) -> Result<SearchPlan> {
    let value = parse_object(content, "plan")?;
    let steps = value
        .get("steps")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("No 'steps' array in plan output"))?;

    let mut plan_steps = Vec::new();
    for step in steps {
        let Some(topic) = str_field(step, &["topic"]) else {
            tracing::warn!("Dropping plan step without topic: {}", step);
            continue;
        };
        let query = str_field(step, &["query", "query_text"]).unwrap_or(topic);
        if plan_steps.iter().any(|s: &SearchStep| s.topic == topic) {
            tracing::warn!(topic, "Dropping duplicate plan topic");
            continue;
        }
        plan_steps.push(SearchStep::new(topic, query));
    }
    if plan_steps.is_empty() {
        bail!("Plan output contains no usable steps");
    }
    Ok(SearchPlan::new(plan_steps))
}

/// `{"query": ".."}`, or a bare line of text.
pub fn parse_query(content: &str) -> Result<String> {
    if let Ok(value) = parse_object(content, "query") {
        if let Some(q) = str_field(&value, &["query", "query_text"]) {
            return Ok(q.to_string());
        }
        bail!("Query output has no 'query' field");
    }
    let line = content
        .lines()
        .map(|l| l.trim().trim_matches(|c| c == '"' || c == '`').trim())
        .find(|l| !l.is_empty())
        .ok_or_else(|| anyhow!("Empty query output"))?;
    Ok(line.to_string())
}

/// Reflection output → verdicts for steps `0..step_count`. Either
/// `{"notes", "verdicts": [..]}` or a bare verdict array.
///
/// Degraded defaults, each logged: an unknown verdict string or a revise
/// without query text becomes `keep`; an out-of-range or repeated step index
/// is dropped.
pub fn parse_reflection(content: &str, step_count: usize) -> Result<Reflection> {
    let value = parse_value(content, "reflection")?;
    let notes = str_field(&value, &["notes", "summary"]).unwrap_or("").to_string();
    let entries = value
        .as_array()
        .or_else(|| value.get("verdicts").and_then(|v| v.as_array()))
        .ok_or_else(|| anyhow!("No 'verdicts' array in reflection output"))?;

    let mut verdicts: Vec<StepVerdict> = Vec::new();
    for entry in entries {
        let Some(step) = entry.get("step").and_then(|v| v.as_u64()).map(|s| s as usize) else {
            tracing::warn!("Reflection verdict without step index: {}", entry);
            continue;
        };
        if step >= step_count {
            tracing::warn!(step, step_count, "Reflection verdict for unknown step");
            continue;
        }
        if verdicts.iter().any(|v| v.step == step) {
            tracing::warn!(step, "Repeated reflection verdict, keeping the first");
            continue;
        }
        let raw = str_field(entry, &["verdict", "action"]).unwrap_or("keep").to_lowercase();
        let verdict = match raw.as_str() {
            "keep" => Verdict::Keep,
            "resample" => Verdict::Resample,
            "revise" => match str_field(entry, &["query", "query_text", "revised_query"]) {
                Some(q) => Verdict::Revise {
                    query_text: q.to_string(),
                },
                None => {
                    tracing::warn!(step, "Revise verdict without query text, keeping step");
                    Verdict::Keep
                }
            },
            other => {
                tracing::warn!(step, verdict = other, "Unknown reflection verdict, keeping step");
                Verdict::Keep
            }
        };
        verdicts.push(StepVerdict { step, verdict });
    }
    Ok(Reflection { verdicts, notes })
}

/// `{"skill": ".."}` or plain text. Empty means "nothing to distill".
pub fn parse_skill_text(content: &str) -> String {
    if let Ok(value) = parse_object(content, "skill") {
        return str_field(&value, &["skill", "text"]).unwrap_or("").to_string();
    }
    content.trim().to_string()
}

/// Question text and its two options.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionText {
    pub question: String,
    pub option_a: String,
    pub option_b: String,
}

pub fn parse_question(content: &str) -> Result<QuestionText> {
    let value = parse_object(content, "question")?;
    let field = |k: &str| {
        str_field(&value, &[k])
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Question output missing '{}'", k))
    };
    let question = QuestionText {
        question: field("question")?,
        option_a: field("option_a")?,
        option_b: field("option_b")?,
    };
    if question.option_a == question.option_b {
        bail!("Question options are identical: '{}'", question.option_a);
    }
    Ok(question)
}

/// Which option a POI fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    A,
    B,
    /// Both or neither; the POI stays reachable from both branches.
    Either,
}

pub fn parse_fit(content: &str) -> Result<Fit> {
    let value = parse_object(content, "classification")?;
    let raw = str_field(&value, &["fits", "fit", "answer"])
        .ok_or_else(|| anyhow!("Classification output missing 'fits'"))?;
    Ok(match raw.to_lowercase().as_str() {
        "a" | "option_a" => Fit::A,
        "b" | "option_b" => Fit::B,
        _ => Fit::Either,
    })
}

/// Stand-in executor output → POIs, recall and quality.
///
/// Recall counts every listed place; only matching places enter the pool and
/// quality is their share of the listing.
pub fn parse_execution(content: &str, topic: &str) -> Result<StepExecution> {
    let value = parse_object(content, "execution")?;
    let listed = value
        .get("pois")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("No 'pois' array in execution output"))?;

    let mut pois: Vec<Poi> = Vec::new();
    let mut recall = 0u32;
    for item in listed {
        let Some(name) = str_field(item, &["name"]) else {
            continue;
        };
        recall += 1;
        if !item.get("matches").and_then(|v| v.as_bool()).unwrap_or(false) {
            continue;
        }
        let id = str_field(item, &["url"])
            .map(|u| u.trim_end_matches('/').to_lowercase())
            .unwrap_or_else(|| name_hash(name));
        if pois.iter().any(|p| p.id == id) {
            continue;
        }
        let mut poi = Poi::new(id, name, topic);
        poi.attributes = item
            .get("attributes")
            .and_then(|v| v.as_object())
            .map(|attrs| {
                attrs
                    .iter()
                    .filter_map(|(k, v)| match v {
                        Value::String(s) if !s.trim().is_empty() => Some((k.clone(), s.trim().to_string())),
                        Value::Number(n) => Some((k.clone(), n.to_string())),
                        Value::Bool(b) => Some((k.clone(), b.to_string())),
                        _ => None,
                    })
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();
        pois.push(poi);
    }
    let quality = if recall == 0 {
        0.0
    } else {
        pois.len() as f64 / recall as f64
    };
    Ok(StepExecution {
        pois,
        recall,
        quality,
    })
}
