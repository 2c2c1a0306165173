//! Declarative server and tool rules
//!
//! Rules are authored as JSON/YAML in one of two shapes:
//!
//! ```yaml
//! toolRules:
//!   # condition → mutation
//!   - when: { server: github, name: "/^delete_/" }
//!     set: { enabled: false }
//!   - when: { or: [ { name: { match: "get_*" } }, { tags: { in: [safe] } } ] }
//!     push: { tags: [read-only] }
//!   # pattern list
//!   - pattern: ["*create*"]
//!     server: github
//!     tags: [write]
//! ```
//!
//! Raw rules compile into a [`RuleEngine`] for a [`RuleTarget`]. If any rule
//! explicitly sets `enabled: true` the engine runs in whitelist mode and
//! every entity starts disabled.

mod compile;
mod condition;
mod engine;
mod fields;
mod raw;

pub use compile::compile_rules;
pub use condition::{Condition, FieldOp, InItem};
pub use engine::{Rule, RuleEngine};
pub use fields::{FieldDescriptor, FieldKind, FieldValue, Literal, RuleTarget, ServerFields, ToolFields};
pub use raw::{ConditionalRule, OneOrMany, PatternRuleConfig, RawRule};
