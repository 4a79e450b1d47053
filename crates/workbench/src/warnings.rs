//! Misconnected-field warnings: drift between a rule's stored rule map and
//! the fields its graph actually declares.

use brms_api::{ApiError, RuleDocument, RulesApi};
use brms_core::{find_misconnections, DecisionGraph, MisconnectedField, RuleMap};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

/// Compare the rule map with the one generated from the graph content.
///
/// A rule with no mapped fields and fewer than two graph nodes has nothing
/// to compare and yields no warnings without touching the network. When
/// `rule_map` is absent the stored one is fetched.
pub async fn detect_misconnections(
    api: &dyn RulesApi,
    rule: &RuleDocument,
    rule_map: Option<&RuleMap>,
) -> Result<Vec<MisconnectedField>, ApiError> {
    let has_fields = rule_map.is_some_and(|m| !m.is_empty());
    if !has_fields && DecisionGraph::count_nodes(&rule.content) < 2 {
        debug!(filepath = %rule.filepath, "graph too small to check");
        return Ok(Vec::new());
    }

    let fetched;
    let existing = match rule_map {
        Some(m) => m,
        None => {
            fetched = api
                .get_rule_map(&rule.filepath, &rule.content)
                .await
                .inspect_err(|e| warn!(filepath = %rule.filepath, error = %e, "failed to load rule map"))?;
            &fetched
        }
    };
    let generated = api
        .generate_rule_map(&rule.content)
        .await
        .inspect_err(|e| warn!(filepath = %rule.filepath, error = %e, "failed to generate rule map"))?;

    let warnings = find_misconnections(existing, &generated);
    for w in &warnings {
        warn!(filepath = %rule.filepath, field = %w.field, kind = %w.kind, "misconnected field");
    }
    Ok(warnings)
}

/// SHA-256 of the graph content and rule map, hex encoded.
pub fn fingerprint(content: &Value, rule_map: Option<&RuleMap>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.to_string().as_bytes());
    if let Some(map) = rule_map {
        // RuleMap serialization cannot fail: every field is plain data.
        hasher.update(serde_json::to_string(map).unwrap_or_default().as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Caches the last warnings and only re-checks when the rule changed.
#[derive(Debug, Default)]
pub struct WarningMonitor {
    fingerprint: Option<String>,
    warnings: Vec<MisconnectedField>,
}

impl WarningMonitor {
    pub fn new() -> Self {
        WarningMonitor::default()
    }

    pub fn warnings(&self) -> &[MisconnectedField] {
        &self.warnings
    }

    /// Re-check if the content or rule map differ from the last check.
    /// Returns whether a check ran.
    pub async fn refresh(
        &mut self,
        api: &dyn RulesApi,
        rule: &RuleDocument,
        rule_map: Option<&RuleMap>,
    ) -> Result<bool, ApiError> {
        let fp = fingerprint(&rule.content, rule_map);
        if self.fingerprint.as_deref() == Some(fp.as_str()) {
            return Ok(false);
        }
        self.check(api, rule, rule_map, fp).await?;
        Ok(true)
    }

    /// Re-check unconditionally, as when the rule is saved.
    pub async fn on_save(
        &mut self,
        api: &dyn RulesApi,
        rule: &RuleDocument,
        rule_map: Option<&RuleMap>,
    ) -> Result<(), ApiError> {
        let fp = fingerprint(&rule.content, rule_map);
        self.check(api, rule, rule_map, fp).await
    }

    async fn check(
        &mut self,
        api: &dyn RulesApi,
        rule: &RuleDocument,
        rule_map: Option<&RuleMap>,
        fp: String,
    ) -> Result<(), ApiError> {
        self.warnings = detect_misconnections(api, rule, rule_map).await?;
        self.fingerprint = Some(fp);
        info!(filepath = %rule.filepath, count = self.warnings.len(), "misconnection check complete");
        Ok(())
    }
}
