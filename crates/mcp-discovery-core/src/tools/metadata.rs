//! Per-server tool catalogs with rule-derived state

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ServerConfig;
use crate::logging::Logger;
use crate::mcp::RawTool;
use crate::rules::{RuleEngine, ServerFields, ToolFields};
use crate::types::{summarize, ToolMetadata, ToolParameter};

/// Holds the most recent catalog of every server
///
/// A refresh builds a complete new catalog and swaps it in, so readers see
/// either the old catalog or the new one, never a mix.
pub struct ToolMetadataManager {
    catalogs: RwLock<HashMap<String, Arc<Vec<ToolMetadata>>>>,
    logger: Arc<dyn Logger>,
}

impl ToolMetadataManager {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            catalogs: RwLock::new(HashMap::new()),
            logger,
        }
    }

    /// Apply server rules to a registered server. A server disabled in the
    /// registry stays disabled whatever the rules say.
    pub fn resolve_server(name: &str, config: &ServerConfig, rules: &RuleEngine<ServerFields>) -> ServerFields {
        let seed = ServerFields::new(name).with_tags(config.tags.iter().cloned());
        let mut resolved = rules.apply(seed);
        resolved.enabled = resolved.enabled && config.enabled;
        resolved
    }

    /// Rebuild the catalog of `server` from the upstream tool list
    ///
    /// Every tool starts enabled and untagged, then tool rules scoped to
    /// this server run against its upstream name. Tools of a disabled
    /// server are all disabled.
    pub fn refresh(
        &self,
        server: &str,
        config: &ServerConfig,
        raw_tools: Vec<RawTool>,
        server_rules: &RuleEngine<ServerFields>,
        tool_rules: &RuleEngine<ToolFields>,
    ) -> Arc<Vec<ToolMetadata>> {
        let server_state = Self::resolve_server(server, config, server_rules);
        let mut seen = HashSet::new();
        let mut catalog = Vec::with_capacity(raw_tools.len());

        for raw in raw_tools {
            if !seen.insert(raw.name.clone()) {
                self.logger.warn(&format!(
                    "[ToolMetadataManager] {} lists tool {} more than once, keeping the first",
                    server, raw.name
                ));
                continue;
            }

            let resolved = tool_rules.apply_for_server(ToolFields::new(server, raw.name.as_str()), server);

            catalog.push(ToolMetadata {
                server: server.to_string(),
                name: config.exposed_name(&raw.name),
                summary: summarize(raw.description.as_deref()),
                parameters: ToolParameter::from_schema(&raw.input_schema),
                enabled: server_state.enabled && resolved.enabled,
                tags: resolved.tags,
                upstream_name: raw.name,
                description: raw.description,
                input_schema: raw.input_schema,
            });
        }

        let enabled = catalog.iter().filter(|t| t.enabled).count();
        self.logger.debug(&format!(
            "[ToolMetadataManager] {}: {} tools, {} enabled",
            server,
            catalog.len(),
            enabled
        ));

        let catalog = Arc::new(catalog);
        self.catalogs.write().insert(server.to_string(), catalog.clone());
        catalog
    }

    pub fn catalog(&self, server: &str) -> Option<Arc<Vec<ToolMetadata>>> {
        self.catalogs.read().get(server).cloned()
    }

    pub fn list_tools(&self, server: &str, include_disabled: bool) -> Vec<ToolMetadata> {
        self.catalog(server)
            .map(|catalog| filter_enabled(&catalog, include_disabled))
            .unwrap_or_default()
    }

    /// Look a tool up by exposed name, falling back to its upstream name
    pub fn get_tool_details(&self, server: &str, tool: &str) -> Option<ToolMetadata> {
        let catalog = self.catalog(server)?;
        find_tool(&catalog, tool).cloned()
    }

    /// Every known tool, grouped by server in name order
    pub fn all_tools(&self, include_disabled: bool) -> Vec<ToolMetadata> {
        let catalogs = self.catalogs.read();
        let mut servers: Vec<&String> = catalogs.keys().collect();
        servers.sort();
        servers
            .into_iter()
            .flat_map(|s| filter_enabled(&catalogs[s], include_disabled))
            .collect()
    }

    pub fn tool_count(&self, server: &str) -> usize {
        self.catalog(server).map(|c| c.len()).unwrap_or(0)
    }

    pub fn enabled_count(&self, server: &str) -> usize {
        self.catalog(server)
            .map(|c| c.iter().filter(|t| t.enabled).count())
            .unwrap_or(0)
    }

    pub fn remove(&self, server: &str) -> bool {
        self.catalogs.write().remove(server).is_some()
    }

    pub fn clear(&self) {
        self.catalogs.write().clear();
    }
}

pub(crate) fn filter_enabled(catalog: &[ToolMetadata], include_disabled: bool) -> Vec<ToolMetadata> {
    catalog
        .iter()
        .filter(|t| include_disabled || t.enabled)
        .cloned()
        .collect()
}

pub(crate) fn find_tool<'a>(catalog: &'a [ToolMetadata], tool: &str) -> Option<&'a ToolMetadata> {
    catalog
        .iter()
        .find(|t| t.name == tool)
        .or_else(|| catalog.iter().find(|t| t.upstream_name == tool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::rules::{compile_rules, RawRule};
    use serde_json::json;

    fn manager() -> ToolMetadataManager {
        ToolMetadataManager::new(Arc::new(NoOpLogger::new()))
    }

    fn tool_rules(rules: serde_json::Value) -> RuleEngine<ToolFields> {
        let raw: Vec<RawRule> = serde_json::from_value(rules).unwrap();
        let mut errors = Vec::new();
        let engine = compile_rules("toolRules", &raw, &mut errors);
        assert!(errors.is_empty(), "{:?}", errors);
        engine
    }

    fn server_rules(rules: serde_json::Value) -> RuleEngine<ServerFields> {
        let raw: Vec<RawRule> = serde_json::from_value(rules).unwrap();
        let mut errors = Vec::new();
        let engine = compile_rules("serverRules", &raw, &mut errors);
        assert!(errors.is_empty(), "{:?}", errors);
        engine
    }

    fn raw(names: &[&str]) -> Vec<RawTool> {
        names
            .iter()
            .map(|n| {
                RawTool::new(*n)
                    .with_description(format!("Does {}\nLong form.", n))
                    .with_schema(json!({ "type": "object", "properties": { "id": { "type": "string" } }, "required": ["id"] }))
            })
            .collect()
    }

    #[test]
    fn test_refresh_builds_catalog() {
        let m = manager();
        let rules = tool_rules(json!([
            { "when": { "name": "/^delete_/" }, "set": { "enabled": false } },
            { "when": { "name": "/^get_/" }, "push": { "tags": ["read-only"] } }
        ]));
        let catalog = m.refresh(
            "github",
            &ServerConfig::stdio("gh", ["--stdio"]),
            raw(&["get_issue", "delete_repo"]),
            &RuleEngine::default(),
            &rules,
        );

        assert_eq!(catalog.len(), 2);
        let get = &catalog[0];
        assert!(get.enabled);
        assert_eq!(get.tags, vec!["read-only"]);
        assert_eq!(get.summary, "Does get_issue");
        assert_eq!(get.parameters.len(), 1);
        assert!(get.parameters[0].required);
        assert!(!catalog[1].enabled);

        assert_eq!(m.list_tools("github", false).len(), 1);
        assert_eq!(m.list_tools("github", true).len(), 2);
        assert_eq!(m.tool_count("github"), 2);
        assert_eq!(m.enabled_count("github"), 1);
    }

    #[test]
    fn test_refresh_replaces_catalog_wholesale() {
        let m = manager();
        let rules = tool_rules(json!([{ "when": {}, "push": { "tags": ["seen"] } }]));
        let config = ServerConfig::stdio("svc", Vec::<String>::new());

        m.refresh("svc", &config, raw(&["a", "b"]), &RuleEngine::default(), &rules);
        let second = m.refresh("svc", &config, raw(&["a"]), &RuleEngine::default(), &rules);

        assert_eq!(second.len(), 1);
        // Tags do not accumulate across refreshes
        assert_eq!(second[0].tags, vec!["seen"]);
        assert!(m.get_tool_details("svc", "b").is_none());
    }

    #[test]
    fn test_disabled_server_disables_tools() {
        let m = manager();
        let servers = server_rules(json!([{ "when": { "name": "experimental" }, "set": { "enabled": false } }]));
        let config = ServerConfig::stdio("exp", Vec::<String>::new());

        m.refresh("experimental", &config, raw(&["a", "b", "c"]), &servers, &RuleEngine::default());
        assert!(m.list_tools("experimental", false).is_empty());
        assert_eq!(m.list_tools("experimental", true).len(), 3);

        let registry_disabled = config.clone().disabled();
        let resolved = ToolMetadataManager::resolve_server("other", &registry_disabled, &servers);
        assert!(!resolved.enabled);
    }

    #[test]
    fn test_prefix_and_lookup() {
        let m = manager();
        let config = ServerConfig::stdio("gh", Vec::<String>::new()).with_prefix("gh_");
        let rules = tool_rules(json!([{ "when": { "name": "create_issue" }, "push": { "tags": ["write"] } }]));
        m.refresh("github", &config, raw(&["create_issue"]), &RuleEngine::default(), &rules);

        let by_exposed = m.get_tool_details("github", "gh_create_issue").unwrap();
        assert_eq!(by_exposed.upstream_name, "create_issue");
        // Rules see the upstream name
        assert_eq!(by_exposed.tags, vec!["write"]);
        assert_eq!(m.get_tool_details("github", "create_issue"), Some(by_exposed));
        assert!(m.get_tool_details("jira", "gh_create_issue").is_none());
    }

    #[test]
    fn test_duplicate_upstream_names_keep_first() {
        let m = manager();
        let mut tools = raw(&["dup"]);
        tools.push(RawTool::new("dup").with_description("second"));
        let catalog = m.refresh(
            "svc",
            &ServerConfig::stdio("svc", Vec::<String>::new()),
            tools,
            &RuleEngine::default(),
            &RuleEngine::default(),
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].summary, "Does dup");
    }

    #[test]
    fn test_server_seed_tags_feed_server_rules() {
        let servers = server_rules(json!([
            { "when": { "tags": "local" }, "push": { "tags": ["trusted"] } }
        ]));
        let config = ServerConfig::stdio("fs", Vec::<String>::new()).with_tags(&["local"]);
        let resolved = ToolMetadataManager::resolve_server("filesystem", &config, &servers);
        assert_eq!(resolved.tags, vec!["local", "trusted"]);
        assert!(resolved.enabled);
    }

    #[test]
    fn test_all_tools_orders_by_server() {
        let m = manager();
        let config = ServerConfig::stdio("x", Vec::<String>::new());
        m.refresh("zeta", &config, raw(&["z1"]), &RuleEngine::default(), &RuleEngine::default());
        m.refresh("alpha", &config, raw(&["a1"]), &RuleEngine::default(), &RuleEngine::default());

        let names: Vec<String> = m.all_tools(false).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a1", "z1"]);

        assert!(m.remove("zeta"));
        m.clear();
        assert!(m.all_tools(true).is_empty());
    }
}
