use std::path::Path;

use brms_workbench::{SaveOutcome, ScenarioGenerator};
use serde_json::{json, Map, Value};

use super::Ctx;

fn object(ctx: &Ctx, path: &Path) -> Map<String, Value> {
    match ctx.read_json(path) {
        Value::Object(map) => map,
        _ => ctx.fail(&format!("error: {} must contain a JSON object", path.display())),
    }
}

pub(crate) async fn cmd_simulate(
    ctx: &Ctx,
    rule_path: &Path,
    context_path: &Path,
    expected_path: Option<&Path>,
    save: Option<&str>,
    yes: bool,
) {
    let rule = ctx.load_rule(rule_path);
    let rule_map = ctx.rule_map(&rule).await;
    let mut generator = ScenarioGenerator::new(rule.clone(), &rule_map);
    for (field, value) in object(ctx, context_path) {
        generator.set_input(field, value);
    }
    if let Some(path) = expected_path {
        for (field, value) in object(ctx, path) {
            generator.set_expected(field, value);
        }
    }

    let result = match generator.simulate(ctx.api()).await {
        Ok(r) => r.clone(),
        Err(e) => ctx.fail(&format!("simulation failed: {}", e)),
    };

    if ctx.is_json() && save.is_none() {
        ctx.print_json(&json!({"result": result.result, "trace": result.trace}));
    } else {
        ctx.say(
            &serde_json::to_string_pretty(&result.result)
                .unwrap_or_else(|e| format!("serialization error: {}", e)),
        );
    }

    let Some(name) = save else {
        return;
    };
    if !ctx.confirm(&format!("Save scenario '{}' for {}?", name.trim(), rule.filepath), yes) {
        ctx.fail("save aborted");
    }
    generator.set_scenario_name(name);
    let scenarios = ctx.scenarios(&rule).await;
    match generator.save(ctx.api(), &scenarios).await {
        SaveOutcome::Skipped => ctx.fail(
            "nothing to save: a scenario needs a title and at least one input value",
        ),
        SaveOutcome::Saved { scenario, .. } => {
            if ctx.is_json() {
                ctx.print_json(&json!({
                    "result": result.result,
                    "trace": result.trace,
                    "saved": scenario,
                }));
            } else {
                ctx.say(&format!(
                    "saved scenario '{}' ({})",
                    scenario.title,
                    scenario.id.as_deref().unwrap_or("no id")
                ));
            }
        }
        SaveOutcome::Rejected { error } => ctx.fail(&error.to_string()),
        SaveOutcome::Failed { error, .. } => ctx.fail(&format!("failed to save scenario: {}", error)),
    }
}
