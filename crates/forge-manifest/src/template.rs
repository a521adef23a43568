//! `{{name}}` template rendering for prompt manifests (spec.md §4.C).

use std::collections::HashMap;

/// Substitute every `{{name}}` placeholder in `template` with the matching
/// value from `vars`. Placeholders with no matching variable pass through
/// unchanged, braces included.
#[must_use]
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let name = after_open[..end].trim();
                match vars.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after_open[..end]);
                        out.push_str("}}");
                    }
                }
                rest = &after_open[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after_open;
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Extract the distinct set of variable names referenced by `template`, in
/// first-occurrence order.
#[must_use]
pub fn extract_variables(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            break;
        };
        let name = after_open[..end].trim().to_string();
        if !name.is_empty() && !seen.contains(&name) {
            seen.push(name);
        }
        rest = &after_open[end + 2..];
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_variables_and_passes_through_unknown() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "world".to_string());
        let rendered = render("hello {{name}}, your {{gift}} awaits", &vars);
        assert_eq!(rendered, "hello world, your {{gift}} awaits");
    }

    #[test]
    fn extracts_variables_in_first_occurrence_order() {
        let vars = extract_variables("{{b}} then {{a}} then {{b}} again");
        assert_eq!(vars, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn handles_unterminated_placeholder_gracefully() {
        let rendered = render("broken {{oops", &HashMap::new());
        assert_eq!(rendered, "broken {{oops");
    }
}
