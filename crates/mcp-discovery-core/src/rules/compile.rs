//! Compile raw rules into typed rule engines
//!
//! Compilation never stops at the first problem: every violation is pushed
//! onto the caller's error list with a path such as
//! `toolRules[2].when.name.match`, and the offending rule is dropped.

use serde_json::{Map, Value};

use super::condition::{Condition, FieldOp, InItem};
use super::engine::{Rule, RuleEngine};
use super::fields::{FieldDescriptor, FieldKind, Literal, RuleTarget};
use super::raw::{ConditionalRule, PatternRuleConfig, RawRule};
use crate::patterns::{Pattern, PatternRule, PatternSet};

/// Compile `raw` for target `T`, appending violations to `errors`
pub fn compile_rules<T: RuleTarget>(
    label: &str,
    raw: &[RawRule],
    errors: &mut Vec<String>,
) -> RuleEngine<T> {
    let mut rules = Vec::with_capacity(raw.len());

    for (index, rule) in raw.iter().enumerate() {
        let path = format!("{}[{}]", label, index);
        let before = errors.len();

        let compiled = match rule {
            RawRule::Conditional(rule) => compile_conditional::<T>(&path, rule, errors),
            RawRule::Pattern(rule) => compile_pattern::<T>(&path, rule, errors),
            RawRule::Invalid(value) => {
                errors.push(diagnose_malformed(&path, value));
                None
            }
        };

        if errors.len() == before {
            if let Some(compiled) = compiled {
                rules.push(compiled);
            }
        }
    }

    RuleEngine::new(rules)
}

fn compile_conditional<T: RuleTarget>(
    path: &str,
    rule: &ConditionalRule,
    errors: &mut Vec<String>,
) -> Option<Rule<T>> {
    let when = compile_condition::<T>(&format!("{}.when", path), &rule.when, errors);
    let mut compiled = Rule::new(when?);

    if let Some(set) = &rule.set {
        for (field, value) in compile_set::<T>(&format!("{}.set", path), set, errors) {
            compiled = compiled.with_set(field, value);
        }
    }
    if let Some(push) = &rule.push {
        for (field, values) in compile_push::<T>(&format!("{}.push", path), push, errors) {
            compiled = compiled.with_push(field, values);
        }
    }

    Some(compiled)
}

fn compile_pattern<T: RuleTarget>(
    path: &str,
    rule: &PatternRuleConfig,
    errors: &mut Vec<String>,
) -> Option<Rule<T>> {
    let patterns = compile_patterns(&format!("{}.pattern", path), &rule.pattern.to_vec(), errors)?;

    let mut pattern_rule = PatternRule::new(patterns);
    if let Some(server) = &rule.server {
        pattern_rule = pattern_rule.for_server(server.clone());
    }

    let mut compiled = Rule::new(Condition::Pattern(pattern_rule));
    if let Some(server) = &rule.server {
        compiled = compiled.for_server(server.clone());
    }
    if let Some(enabled) = rule.enabled {
        compiled = compiled.with_set("enabled", Literal::Flag(enabled));
    }
    if !rule.tags.is_empty() {
        match T::descriptor("tags") {
            Some(FieldDescriptor { name, kind: FieldKind::Tags }) => {
                compiled = compiled.with_push(name, rule.tags.clone());
            }
            _ => errors.push(format!("{}.tags: target has no tag list", path)),
        }
    }

    Some(compiled)
}

/// Explain why `value` is neither rule shape
fn diagnose_malformed(path: &str, value: &Value) -> String {
    let Value::Object(map) = value else {
        return format!("{}: rule must be an object", path);
    };

    if map.contains_key("when") {
        return match serde_json::from_value::<ConditionalRule>(value.clone()) {
            Err(e) => format!("{}: {}", path, e),
            Ok(_) => format!("{}: malformed rule", path),
        };
    }

    if let Some(pattern) = map.get("pattern") {
        let well_typed = match pattern {
            Value::String(_) => true,
            Value::Array(items) => items.iter().all(Value::is_string),
            _ => false,
        };
        if !well_typed {
            return format!("{}.pattern: expected a string or a list of strings", path);
        }
        return match serde_json::from_value::<PatternRuleConfig>(value.clone()) {
            Err(e) => format!("{}: {}", path, e),
            Ok(_) => format!("{}: malformed rule", path),
        };
    }

    format!("{}: rule needs either 'when' or 'pattern'", path)
}

fn compile_condition<T: RuleTarget>(
    path: &str,
    value: &Value,
    errors: &mut Vec<String>,
) -> Option<Condition> {
    let Value::Object(map) = value else {
        errors.push(format!("{}: condition must be an object", path));
        return None;
    };

    let mut parts = Vec::with_capacity(map.len());
    let mut valid = true;

    for (key, value) in map {
        let key_path = format!("{}.{}", path, key);
        let part = match key.as_str() {
            "and" | "or" => compile_logical::<T>(&key_path, key == "and", value, errors),
            "not" => compile_condition::<T>(&key_path, value, errors).map(|c| Condition::Not(Box::new(c))),
            field => match T::descriptor(field) {
                Some(descriptor) => compile_operator(&key_path, descriptor, value, errors)
                    .map(|op| Condition::field(descriptor.name, op)),
                None => {
                    errors.push(format!(
                        "{}: unknown field '{}' (expected one of: {})",
                        path,
                        field,
                        field_names::<T>()
                    ));
                    None
                }
            },
        };

        match part {
            Some(part) => parts.push(part),
            None => valid = false,
        }
    }

    if !valid {
        return None;
    }

    Some(match parts.len() {
        0 => Condition::Always,
        1 => parts.remove(0),
        _ => Condition::All(parts),
    })
}

fn compile_logical<T: RuleTarget>(
    path: &str,
    all: bool,
    value: &Value,
    errors: &mut Vec<String>,
) -> Option<Condition> {
    let Value::Array(items) = value else {
        errors.push(format!("{}: expected an array of conditions", path));
        return None;
    };

    let parts: Vec<Option<Condition>> = items
        .iter()
        .enumerate()
        .map(|(i, item)| compile_condition::<T>(&format!("{}[{}]", path, i), item, errors))
        .collect();
    let parts: Option<Vec<Condition>> = parts.into_iter().collect();

    parts.map(|parts| if all { Condition::All(parts) } else { Condition::Any(parts) })
}

fn compile_operator(
    path: &str,
    field: &FieldDescriptor,
    value: &Value,
    errors: &mut Vec<String>,
) -> Option<FieldOp> {
    match value {
        // Shorthand: "/re/" → match, other strings → eq
        Value::String(s) if Pattern::is_regex_literal(s) => {
            compile_patterns(path, std::slice::from_ref(s), errors).map(FieldOp::Match)
        }
        Value::String(_) | Value::Bool(_) => scalar_literal(path, field, value, errors).map(FieldOp::Eq),
        Value::Array(items) => compile_in(path, field, items, errors),
        Value::Object(op) => compile_explicit_operator(path, field, op, errors),
        _ => {
            errors.push(format!(
                "{}: unsupported condition value for {} field '{}'",
                path,
                field.kind.as_str(),
                field.name
            ));
            None
        }
    }
}

fn compile_explicit_operator(
    path: &str,
    field: &FieldDescriptor,
    op: &Map<String, Value>,
    errors: &mut Vec<String>,
) -> Option<FieldOp> {
    if op.len() != 1 {
        errors.push(format!("{}: expected exactly one of eq, match, in", path));
        return None;
    }
    let (name, operand) = op.iter().next()?;
    let op_path = format!("{}.{}", path, name);

    match name.as_str() {
        "eq" => scalar_literal(&op_path, field, operand, errors).map(FieldOp::Eq),
        "match" => {
            let raw = match operand {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => match strings(&op_path, items, errors) {
                    Some(raw) => raw,
                    None => return None,
                },
                _ => {
                    errors.push(format!("{}: expected a pattern or list of patterns", op_path));
                    return None;
                }
            };
            compile_patterns(&op_path, &raw, errors).map(FieldOp::Match)
        }
        "in" => match operand {
            Value::Array(items) => compile_in(&op_path, field, items, errors),
            _ => {
                errors.push(format!("{}: expected an array", op_path));
                None
            }
        },
        other => {
            errors.push(format!("{}: unknown operator '{}'", path, other));
            None
        }
    }
}

fn compile_in(
    path: &str,
    field: &FieldDescriptor,
    items: &[Value],
    errors: &mut Vec<String>,
) -> Option<FieldOp> {
    let mut compiled = Vec::with_capacity(items.len());
    let mut valid = true;

    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{}[{}]", path, i);
        let entry = match item {
            Value::String(s) if Pattern::is_regex_literal(s) => match Pattern::compile(s) {
                Ok(pattern) => Some(InItem::Pattern(pattern)),
                Err(e) => {
                    errors.push(format!("{}: {}", item_path, e));
                    None
                }
            },
            _ => scalar_literal(&item_path, field, item, errors).map(InItem::Exact),
        };
        match entry {
            Some(entry) => compiled.push(entry),
            None => valid = false,
        }
    }

    valid.then_some(FieldOp::In(compiled))
}

/// A scalar literal for comparing against `field`. Tag lists compare
/// against a single tag.
fn scalar_literal(
    path: &str,
    field: &FieldDescriptor,
    value: &Value,
    errors: &mut Vec<String>,
) -> Option<Literal> {
    match (field.kind, value) {
        (FieldKind::Text | FieldKind::Tags, Value::String(s)) => Some(Literal::Text(s.clone())),
        (FieldKind::Flag, Value::Bool(b)) => Some(Literal::Flag(*b)),
        _ => {
            errors.push(format!(
                "{}: expected {} for field '{}'",
                path,
                if field.kind == FieldKind::Flag { "a boolean" } else { "a string" },
                field.name
            ));
            None
        }
    }
}

fn compile_set<T: RuleTarget>(
    path: &str,
    set: &Map<String, Value>,
    errors: &mut Vec<String>,
) -> Vec<(&'static str, Literal)> {
    let mut compiled = Vec::with_capacity(set.len());

    for (key, value) in set {
        let key_path = format!("{}.{}", path, key);
        let Some(field) = T::descriptor(key) else {
            errors.push(format!("{}: unknown field '{}' (expected one of: {})", path, key, field_names::<T>()));
            continue;
        };

        let literal = match (field.kind, value) {
            (FieldKind::Text, Value::String(s)) => Some(Literal::Text(s.clone())),
            (FieldKind::Flag, Value::Bool(b)) => Some(Literal::Flag(*b)),
            (FieldKind::Tags, Value::Array(items)) => strings(&key_path, items, errors).map(Literal::Tags),
            (kind, _) => {
                errors.push(format!("{}: expected a {}", key_path, kind.as_str()));
                None
            }
        };
        if let Some(literal) = literal {
            compiled.push((field.name, literal));
        }
    }

    compiled
}

fn compile_push<T: RuleTarget>(
    path: &str,
    push: &Map<String, Value>,
    errors: &mut Vec<String>,
) -> Vec<(&'static str, Vec<String>)> {
    let mut compiled = Vec::with_capacity(push.len());

    for (key, value) in push {
        let key_path = format!("{}.{}", path, key);
        let Some(field) = T::descriptor(key) else {
            errors.push(format!("{}: unknown field '{}' (expected one of: {})", path, key, field_names::<T>()));
            continue;
        };
        if field.kind != FieldKind::Tags {
            errors.push(format!("{}: push requires a string list field, '{}' is a {}", key_path, key, field.kind.as_str()));
            continue;
        }

        let values = match value {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Array(items) => strings(&key_path, items, errors),
            _ => {
                errors.push(format!("{}: expected a string or list of strings", key_path));
                None
            }
        };
        if let Some(values) = values {
            compiled.push((field.name, values));
        }
    }

    compiled
}

fn compile_patterns(path: &str, raw: &[String], errors: &mut Vec<String>) -> Option<PatternSet> {
    match PatternSet::compile(raw) {
        Ok(set) => Some(set),
        Err(failures) => {
            errors.extend(failures.into_iter().map(|e| format!("{}: {}", path, e)));
            None
        }
    }
}

fn strings(path: &str, items: &[Value], errors: &mut Vec<String>) -> Option<Vec<String>> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::String(s) => out.push(s.clone()),
            _ => {
                errors.push(format!("{}[{}]: expected a string", path, i));
                return None;
            }
        }
    }
    Some(out)
}

fn field_names<T: RuleTarget>() -> String {
    T::fields().iter().map(|f| f.name).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fields::{ServerFields, ToolFields};
    use serde_json::json;

    fn compile_tools(rules: serde_json::Value) -> (RuleEngine<ToolFields>, Vec<String>) {
        let raw: Vec<RawRule> = serde_json::from_value(rules).unwrap();
        let mut errors = Vec::new();
        let engine = compile_rules::<ToolFields>("toolRules", &raw, &mut errors);
        (engine, errors)
    }

    #[test]
    fn test_shorthand_forms() {
        let (engine, errors) = compile_tools(json!([
            { "when": { "server": "github", "name": "/^create_/" }, "push": { "tags": "write" } },
            { "when": { "name": ["list_repos", "/^get_/"] }, "push": { "tags": ["read"] } },
        ]));
        assert!(errors.is_empty(), "{:?}", errors);

        let create = engine.apply(ToolFields::new("github", "create_issue"));
        assert_eq!(create.tags, vec!["write"]);
        let other_server = engine.apply(ToolFields::new("gitlab", "create_issue"));
        assert!(other_server.tags.is_empty());
        assert_eq!(engine.apply(ToolFields::new("github", "get_user")).tags, vec!["read"]);
        assert_eq!(engine.apply(ToolFields::new("github", "list_repos")).tags, vec!["read"]);
    }

    #[test]
    fn test_explicit_operators_and_logic() {
        let (engine, errors) = compile_tools(json!([
            {
                "when": { "and": [
                    { "server": { "eq": "github" } },
                    { "not": { "name": { "match": ["get_*", "list_*"] } } }
                ] },
                "set": { "enabled": false }
            },
            { "when": { "or": [ { "tags": { "in": ["x"] } }, { "name": { "in": ["/^z/"] } } ] },
              "push": { "tags": ["or-hit"] } }
        ]));
        assert!(errors.is_empty(), "{:?}", errors);

        assert!(engine.apply(ToolFields::new("github", "get_issue")).enabled);
        assert!(!engine.apply(ToolFields::new("github", "merge_pr")).enabled);
        assert!(engine.apply(ToolFields::new("jira", "merge_pr")).enabled);
        assert_eq!(engine.apply(ToolFields::new("jira", "zap")).tags, vec!["or-hit"]);
    }

    #[test]
    fn test_pattern_rules() {
        let (engine, errors) = compile_tools(json!([
            { "pattern": ["*create*"], "enabled": true, "tags": ["approved"] },
            { "pattern": "delete_*", "server": "github", "tags": ["danger"] }
        ]));
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(engine.whitelist_mode());

        let create = engine.apply_for_server(ToolFields::new("jira", "create_ticket"), "jira");
        assert!(create.enabled);
        assert_eq!(create.tags, vec!["approved"]);

        let delete = engine.apply_for_server(ToolFields::new("github", "delete_repo"), "github");
        assert!(!delete.enabled);
        assert_eq!(delete.tags, vec!["danger"]);

        assert_eq!(engine.rules()[1].server(), Some("github"));
    }

    #[test]
    fn test_all_violations_reported() {
        let (engine, errors) = compile_tools(json!([
            { "when": { "name": "/(broken/" }, "set": { "enabled": true } },
            { "when": { "colour": "red" } },
            { "when": { "name": "ok" }, "set": { "enabled": "yes" }, "push": { "enabled": [true] } },
            { "when": { "name": { "eq": "a", "match": "b" } } },
            { "when": "not-an-object" },
            { "pattern": ["[unclosed", "/x/z"] },
            { "when": { "name": "fine" }, "push": { "tags": ["ok"] } }
        ]));

        assert_eq!(errors.len(), 8, "{:#?}", errors);
        assert!(errors[0].starts_with("toolRules[0].when.name"));
        assert!(errors[1].contains("unknown field 'colour'"));
        assert!(errors[2].starts_with("toolRules[2].set.enabled"));
        assert!(errors[3].contains("push requires a string list"));
        assert!(errors[4].contains("exactly one of"));
        assert!(errors[5].contains("must be an object"));
        assert!(errors[6].starts_with("toolRules[5].pattern"));
        assert!(errors[7].starts_with("toolRules[5].pattern"));

        // Only the valid rule survives
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_malformed_rules_reported_with_other_violations() {
        let (engine, errors) = compile_tools(json!([
            { "when": { "name": "x" }, "sett": { "enabled": false } },
            { "pattern": 5 },
            { "when": { "name": "/([/" }, "set": { "enabled": false } },
            "get_*",
            { "server": "github" }
        ]));

        assert_eq!(errors.len(), 5, "{:#?}", errors);
        assert!(errors[0].starts_with("toolRules[0]"));
        assert!(errors[0].contains("sett"));
        assert!(errors[1].starts_with("toolRules[1].pattern"));
        assert!(errors[2].starts_with("toolRules[2].when.name"));
        assert!(errors[3].contains("must be an object"));
        assert!(errors[4].contains("either 'when' or 'pattern'"));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_server_rules_reject_tool_only_fields() {
        let raw: Vec<RawRule> = serde_json::from_value(json!([
            { "when": { "server": "x" } },
            { "when": { "name": "experimental" }, "set": { "enabled": false } }
        ]))
        .unwrap();
        let mut errors = Vec::new();
        let engine = compile_rules::<ServerFields>("serverRules", &raw, &mut errors);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unknown field 'server'"));
        assert!(!engine.apply(ServerFields::new("experimental")).enabled);
    }
}
