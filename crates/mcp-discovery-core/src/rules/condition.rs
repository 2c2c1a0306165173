//! Compiled condition trees

use super::fields::{FieldValue, Literal, RuleTarget};
use crate::patterns::{match_rule, Pattern, PatternRule, PatternSet};

/// Field operator
#[derive(Debug, Clone)]
pub enum FieldOp {
    /// Exact equality (tag lists: contains)
    Eq(Literal),
    /// Any glob/regex pattern matches (tag lists: any tag matches)
    Match(PatternSet),
    /// Value is one of the listed items (tag lists: any tag is)
    In(Vec<InItem>),
}

/// One candidate in an `in` list
#[derive(Debug, Clone)]
pub enum InItem {
    Exact(Literal),
    Pattern(Pattern),
}

impl InItem {
    fn matches_scalar(&self, value: FieldValue<'_>) -> bool {
        match (self, value) {
            (InItem::Exact(literal), v) => literal.matches(v),
            (InItem::Pattern(pattern), FieldValue::Text(text)) => pattern.is_match(text),
            (InItem::Pattern(pattern), FieldValue::Flag(flag)) => {
                pattern.is_match(if flag { "true" } else { "false" })
            }
            (InItem::Pattern(_), FieldValue::Tags(_)) => false,
        }
    }
}

/// A condition tree evaluated against a [`RuleTarget`]
#[derive(Debug, Clone)]
pub enum Condition {
    /// `{}`
    Always,
    /// `and`, or several keys in one object
    All(Vec<Condition>),
    /// `or`
    Any(Vec<Condition>),
    /// `not`
    Not(Box<Condition>),
    Field { field: &'static str, op: FieldOp },
    /// Name patterns plus optional server filter
    Pattern(PatternRule),
}

impl Condition {
    pub fn field(field: &'static str, op: FieldOp) -> Self {
        Condition::Field { field, op }
    }

    pub fn evaluate<T: RuleTarget>(&self, target: &T) -> bool {
        match self {
            Condition::Always => true,
            Condition::All(parts) => parts.iter().all(|c| c.evaluate(target)),
            Condition::Any(parts) => parts.iter().any(|c| c.evaluate(target)),
            Condition::Not(inner) => !inner.evaluate(target),
            Condition::Field { field, op } => match target.field(field) {
                Some(value) => evaluate_op(op, value),
                None => false,
            },
            Condition::Pattern(rule) => {
                let Some(FieldValue::Text(name)) = target.field("name") else {
                    return false;
                };
                // Server targets have no `server` field; their own name is
                // what a server filter compares against.
                let server = match target.field("server") {
                    Some(FieldValue::Text(server)) => server,
                    _ => name,
                };
                match_rule(name, server, rule)
            }
        }
    }
}

fn evaluate_op(op: &FieldOp, value: FieldValue<'_>) -> bool {
    match op {
        FieldOp::Eq(literal) => literal.matches(value),
        FieldOp::Match(patterns) => match value {
            FieldValue::Text(text) => patterns.matches(text),
            FieldValue::Flag(flag) => patterns.matches(if flag { "true" } else { "false" }),
            FieldValue::Tags(tags) => tags.iter().any(|t| patterns.matches(t)),
        },
        FieldOp::In(items) => match value {
            FieldValue::Tags(tags) => tags
                .iter()
                .any(|t| items.iter().any(|i| i.matches_scalar(FieldValue::Text(t)))),
            scalar => items.iter().any(|i| i.matches_scalar(scalar)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fields::{ServerFields, ToolFields};

    fn tool(server: &str, name: &str, tags: &[&str]) -> ToolFields {
        let mut t = ToolFields::new(server, name);
        t.tags = tags.iter().map(|s| s.to_string()).collect();
        t
    }

    fn patterns(raw: &[&str]) -> PatternSet {
        PatternSet::compile(raw).unwrap()
    }

    #[test]
    fn test_field_operators() {
        let t = tool("github", "create_issue", &["write"]);

        assert!(Condition::field("server", FieldOp::Eq(Literal::Text("github".into()))).evaluate(&t));
        assert!(Condition::field("name", FieldOp::Match(patterns(&["create_*"]))).evaluate(&t));
        assert!(Condition::field(
            "name",
            FieldOp::In(vec![
                InItem::Exact(Literal::Text("delete_repo".into())),
                InItem::Pattern(Pattern::compile("/issue$/").unwrap()),
            ])
        )
        .evaluate(&t));
        assert!(Condition::field("tags", FieldOp::Eq(Literal::Text("write".into()))).evaluate(&t));
        assert!(!Condition::field("nope", FieldOp::Eq(Literal::Text("x".into()))).evaluate(&t));
    }

    #[test]
    fn test_logical_composition() {
        let t = tool("github", "delete_repo", &[]);
        let on_github = Condition::field("server", FieldOp::Eq(Literal::Text("github".into())));
        let deletes = Condition::field("name", FieldOp::Match(patterns(&["/^delete_/"])));

        assert!(Condition::All(vec![on_github.clone(), deletes.clone()]).evaluate(&t));
        assert!(!Condition::All(vec![on_github.clone(), Condition::Not(Box::new(deletes.clone()))]).evaluate(&t));
        assert!(Condition::Any(vec![Condition::Not(Box::new(on_github)), deletes]).evaluate(&t));
        assert!(Condition::Always.evaluate(&t));
    }

    #[test]
    fn test_pattern_condition_uses_server_name_for_servers() {
        let rule = PatternRule::new(patterns(&["exp*"])).for_server("experimental");
        let cond = Condition::Pattern(rule);
        assert!(cond.evaluate(&ServerFields::new("experimental")));
        assert!(!cond.evaluate(&tool("other", "experimental_tool", &[])));
        assert!(cond.evaluate(&tool("experimental", "explode", &[])));
    }
}
