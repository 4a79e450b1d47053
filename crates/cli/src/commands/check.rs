use std::path::Path;

use brms_core::RuleMap;
use brms_workbench::detect_misconnections;
use serde_json::json;

use super::Ctx;

/// Exits with status 1 when any field is misconnected.
pub(crate) async fn cmd_check(ctx: &Ctx, rule_path: &Path, rule_map_path: Option<&Path>) {
    let rule = ctx.load_rule(rule_path);
    let rule_map: Option<RuleMap> = rule_map_path.map(|path| {
        serde_json::from_value(ctx.read_json(path)).unwrap_or_else(|e| {
            ctx.fail(&format!("error: {} is not a rule map: {}", path.display(), e))
        })
    });

    let warnings = detect_misconnections(ctx.api(), &rule, rule_map.as_ref())
        .await
        .unwrap_or_else(|e| ctx.fail(&format!("check failed: {}", e)));

    if ctx.is_json() {
        ctx.print_json(&json!({
            "filepath": rule.filepath,
            "misconnected": warnings,
        }));
    } else if warnings.is_empty() {
        ctx.say("no misconnected fields");
    } else {
        for w in &warnings {
            match &w.name {
                Some(name) => ctx.say(&format!("{} ({})", w, name)),
                None => ctx.say(&w.to_string()),
            }
        }
    }

    if !warnings.is_empty() {
        std::process::exit(1);
    }
}
