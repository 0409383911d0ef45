//! Prompt templates compiled into the binary.
//!
//! Placeholders are `{{name}}`; [`render`] substitutes them in one pass.

pub const PLAN: &str = include_str!("plan.seed.md");
pub const QUERY: &str = include_str!("query.seed.md");
pub const REFLECT: &str = include_str!("reflect.seed.md");
pub const SUMMARIZE: &str = include_str!("summarize.seed.md");
pub const QUESTION: &str = include_str!("question.seed.md");
pub const CLASSIFY: &str = include_str!("classify.seed.md");
pub const EXECUTE: &str = include_str!("execute.seed.md");

/// Replace every `{{key}}` in `template`.
///
/// Substituted values are not rescanned, so user text containing `{{..}}`
/// is left alone.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(key);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_once() {
        let out = render("a {{x}} b {{y}} c {{x}}", &[("x", "{{y}}"), ("y", "2")]);
        assert_eq!(out, "a {{y}} b 2 c {{y}}");
    }

    #[test]
    fn test_unknown_and_unterminated_placeholders_survive() {
        assert_eq!(render("{{nope}} {{open", &[]), "{{nope}} {{open");
    }

    #[test]
    fn test_every_template_placeholder_is_known() {
        let cases: [(&str, &[&str]); 7] = [
            (PLAN, &["request", "skills"]),
            (QUERY, &["topic", "instruction"]),
            (REFLECT, &["request", "plan"]),
            (SUMMARIZE, &["request", "delta", "notes"]),
            (QUESTION, &["request", "history", "count", "pois"]),
            (CLASSIFY, &["request", "history", "question", "option_a", "option_b", "poi"]),
            (EXECUTE, &["request", "topic", "query", "limit"]),
        ];
        for (template, keys) in cases {
            let vars: Vec<(&str, &str)> = keys.iter().map(|k| (*k, "v")).collect();
            let rendered = render(template, &vars);
            assert!(!rendered.contains("{{"), "unfilled placeholder in:\n{}", rendered);
        }
    }
}
