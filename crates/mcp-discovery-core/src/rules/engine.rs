//! Rule application with whitelist/blacklist resolution

use std::marker::PhantomData;

use super::condition::Condition;
use super::fields::{push_unique, Literal, RuleTarget};
use crate::patterns::server_filter_matches;

/// A compiled condition → mutation pair for target type `T`
#[derive(Debug, Clone)]
pub struct Rule<T> {
    when: Condition,
    set: Vec<(&'static str, Literal)>,
    push: Vec<(&'static str, Vec<String>)>,
    server: Option<String>,
    _target: PhantomData<fn(&T)>,
}

impl<T: RuleTarget> Rule<T> {
    /// Create a rule with no mutations
    pub fn new(when: Condition) -> Self {
        Self {
            when,
            set: Vec::new(),
            push: Vec::new(),
            server: None,
            _target: PhantomData,
        }
    }

    /// Overwrite `field` when matched
    pub fn with_set(mut self, field: &'static str, value: Literal) -> Self {
        self.set.push((field, value));
        self
    }

    /// Append unique `values` to tag-list `field` when matched
    pub fn with_push(mut self, field: &'static str, values: Vec<String>) -> Self {
        self.push.push((field, values));
        self
    }

    /// Restrict this rule to one server
    pub fn for_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn applies_to_server(&self, server: &str) -> bool {
        server_filter_matches(self.server.as_deref(), server)
    }

    /// True if this rule explicitly sets `enabled: true`
    pub fn enables(&self) -> bool {
        self.set
            .iter()
            .any(|(field, value)| *field == "enabled" && *value == Literal::Flag(true))
    }

    pub fn matches(&self, target: &T) -> bool {
        self.when.evaluate(target)
    }

    fn mutate(&self, result: &mut T) {
        for (field, value) in &self.set {
            result.assign(field, value);
        }
        for (field, values) in &self.push {
            if let Some(list) = result.tags_mut(field) {
                for value in values {
                    push_unique(list, value.clone());
                }
            }
        }
    }
}

/// An ordered rule set with its whitelist mode resolved once at construction
#[derive(Debug, Clone)]
pub struct RuleEngine<T> {
    rules: Vec<Rule<T>>,
    whitelist: bool,
}

impl<T: RuleTarget> Default for RuleEngine<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: RuleTarget> RuleEngine<T> {
    pub fn new(rules: Vec<Rule<T>>) -> Self {
        // Any explicit allow rule flips the whole set to deny-by-default.
        let whitelist = rules.iter().any(Rule::enables);
        Self { rules, whitelist }
    }

    pub fn whitelist_mode(&self) -> bool {
        self.whitelist
    }

    pub fn rules(&self) -> &[Rule<T>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order
    pub fn apply(&self, entity: T) -> T {
        self.apply_matching(entity, |_| true)
    }

    /// Apply only the rules whose server filter admits `server`. Whitelist
    /// mode is still decided by the whole rule set.
    pub fn apply_for_server(&self, entity: T, server: &str) -> T {
        self.apply_matching(entity, |rule| rule.applies_to_server(server))
    }

    pub fn apply_all(&self, entities: Vec<T>) -> Vec<T> {
        entities.into_iter().map(|e| self.apply(e)).collect()
    }

    fn apply_matching(&self, entity: T, admit: impl Fn(&Rule<T>) -> bool) -> T {
        let mut result = entity.clone();
        result.set_enabled(!self.whitelist);

        // Conditions see the entity as it was seeded, not partial results.
        for rule in self.rules.iter().filter(|r| admit(r)) {
            if rule.matches(&entity) {
                rule.mutate(&mut result);
            }
        }

        result
    }
}
