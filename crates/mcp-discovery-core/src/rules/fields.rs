//! Field descriptor tables and the rule target trait
//!
//! Each entity type that rules can be applied to declares which of its
//! fields are scalar text, boolean flags, or tag lists. Rule compilation
//! checks conditions and mutations against this table, so a rule that names
//! an unknown field or pushes onto a scalar is rejected at load time.

use serde::{Deserialize, Serialize};

/// Kind of a rule-addressable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A string value (`eq`, `match`, `in`)
    Text,
    /// A boolean value (`eq`, `in`)
    Flag,
    /// An ordered, unique list of strings; the only kind `push` accepts
    Tags,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Flag => "boolean",
            FieldKind::Tags => "string list",
        }
    }
}

/// One row of a target's field table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Text }
    }

    pub const fn flag(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Flag }
    }

    pub const fn tags(name: &'static str) -> Self {
        Self { name, kind: FieldKind::Tags }
    }
}

/// Borrowed view of a field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Flag(bool),
    Tags(&'a [String]),
}

/// Owned value used by `eq` conditions and `set` mutations
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Flag(bool),
    Tags(Vec<String>),
}

impl Literal {
    /// Scalar equality against a field. For tag lists, a text literal
    /// means "contains".
    pub fn matches(&self, value: FieldValue<'_>) -> bool {
        match (self, value) {
            (Literal::Text(expected), FieldValue::Text(actual)) => expected == actual,
            (Literal::Flag(expected), FieldValue::Flag(actual)) => *expected == actual,
            (Literal::Text(expected), FieldValue::Tags(tags)) => tags.iter().any(|t| t == expected),
            (Literal::Tags(expected), FieldValue::Tags(tags)) => expected.as_slice() == tags,
            _ => false,
        }
    }
}

/// A record type rules can be evaluated against and applied to
///
/// Field names `and`, `or` and `not` are reserved for logical operators.
pub trait RuleTarget: Clone {
    /// The field table for this target type
    fn fields() -> &'static [FieldDescriptor];

    /// Read a field by name
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;

    /// Overwrite a field. Values are type-checked at compile time, so a
    /// mismatched literal is ignored.
    fn assign(&mut self, name: &str, value: &Literal);

    /// Mutable access to a tag-list field
    fn tags_mut(&mut self, name: &str) -> Option<&mut Vec<String>>;

    fn set_enabled(&mut self, enabled: bool);

    fn descriptor(name: &str) -> Option<&'static FieldDescriptor> {
        Self::fields().iter().find(|f| f.name == name)
    }
}

/// Rule-visible server fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFields {
    pub name: String,
    pub tags: Vec<String>,
    pub enabled: bool,
}

const SERVER_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::text("name"),
    FieldDescriptor::tags("tags"),
    FieldDescriptor::flag("enabled"),
];

impl ServerFields {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            enabled: true,
        }
    }

    /// Seed tags, dropping duplicates while keeping first-seen order
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        for tag in tags {
            push_unique(&mut self.tags, tag);
        }
        self
    }
}

impl RuleTarget for ServerFields {
    fn fields() -> &'static [FieldDescriptor] {
        SERVER_FIELDS
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "name" => Some(FieldValue::Text(&self.name)),
            "tags" => Some(FieldValue::Tags(&self.tags)),
            "enabled" => Some(FieldValue::Flag(self.enabled)),
            _ => None,
        }
    }

    fn assign(&mut self, name: &str, value: &Literal) {
        match (name, value) {
            ("name", Literal::Text(v)) => self.name = v.clone(),
            ("tags", Literal::Tags(v)) => self.tags = v.clone(),
            ("enabled", Literal::Flag(v)) => self.enabled = *v,
            _ => {}
        }
    }

    fn tags_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        match name {
            "tags" => Some(&mut self.tags),
            _ => None,
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Rule-visible tool fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolFields {
    pub name: String,
    pub server: String,
    pub tags: Vec<String>,
    pub enabled: bool,
}

const TOOL_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor::text("name"),
    FieldDescriptor::text("server"),
    FieldDescriptor::tags("tags"),
    FieldDescriptor::flag("enabled"),
];

impl ToolFields {
    pub fn new(server: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            tags: Vec::new(),
            enabled: true,
        }
    }
}

impl RuleTarget for ToolFields {
    fn fields() -> &'static [FieldDescriptor] {
        TOOL_FIELDS
    }

    fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        match name {
            "name" => Some(FieldValue::Text(&self.name)),
            "server" => Some(FieldValue::Text(&self.server)),
            "tags" => Some(FieldValue::Tags(&self.tags)),
            "enabled" => Some(FieldValue::Flag(self.enabled)),
            _ => None,
        }
    }

    fn assign(&mut self, name: &str, value: &Literal) {
        match (name, value) {
            ("name", Literal::Text(v)) => self.name = v.clone(),
            ("server", Literal::Text(v)) => self.server = v.clone(),
            ("tags", Literal::Tags(v)) => self.tags = v.clone(),
            ("enabled", Literal::Flag(v)) => self.enabled = *v,
            _ => {}
        }
    }

    fn tags_mut(&mut self, name: &str) -> Option<&mut Vec<String>> {
        match name {
            "tags" => Some(&mut self.tags),
            _ => None,
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Append `value` unless it is already present
pub(crate) fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
