use std::path::Path;

use brms_core::batch_csv::{scenarios_to_csv, template_csv};
use brms_workbench::{import_csv, run_csv_tests};
use serde_json::json;

use super::Ctx;

pub(crate) async fn cmd_template(ctx: &Ctx, rule_path: &Path, out: Option<&Path>) {
    let rule = ctx.load_rule(rule_path);
    let rule_map = ctx.rule_map(&rule).await;
    let text = template_csv(&rule_map)
        .unwrap_or_else(|e| ctx.fail(&format!("failed to build template: {}", e)));
    ctx.emit(out, &text);
}

pub(crate) async fn cmd_export(ctx: &Ctx, rule_path: &Path, out: Option<&Path>) {
    let rule = ctx.load_rule(rule_path);
    let rule_map = ctx.rule_map(&rule).await;
    let scenarios = ctx.scenarios(&rule).await;
    let text = scenarios_to_csv(&scenarios, &rule_map)
        .unwrap_or_else(|e| ctx.fail(&format!("failed to export scenarios: {}", e)));
    ctx.emit(out, &text);
}

/// Exits with status 1 when any row fails.
pub(crate) async fn cmd_test(ctx: &Ctx, rule_path: &Path, csv_path: &Path, report: Option<&Path>) {
    let rule = ctx.load_rule(rule_path);
    let text = ctx.read_text(csv_path);
    let rule_map = ctx.rule_map(&rule).await;
    let results = run_csv_tests(ctx.api(), &rule, Some(&rule_map), &text)
        .await
        .unwrap_or_else(|e| ctx.fail(&format!("csv test failed: {}", e)));

    if let Some(path) = report {
        let csv = results
            .to_csv()
            .unwrap_or_else(|e| ctx.fail(&format!("failed to write report: {}", e)));
        ctx.emit(Some(path), &csv);
    }

    if ctx.is_json() {
        ctx.print_json(&json!({
            "generatedAt": results.generated_at,
            "passed": results.passed(),
            "failed": results.failed(),
            "results": results.results,
        }));
    } else {
        for (title, diff) in &results.results {
            ctx.say(&format!("{}: {}", title, diff.to_text()));
        }
        ctx.say(&format!("{} passed, {} failed", results.passed(), results.failed()));
    }

    if results.failed() > 0 {
        std::process::exit(1);
    }
}

/// Exits with status 1 when any row could not be saved.
pub(crate) async fn cmd_import(ctx: &Ctx, rule_path: &Path, csv_path: &Path, yes: bool) {
    let rule = ctx.load_rule(rule_path);
    let text = ctx.read_text(csv_path);
    let rule_map = ctx.rule_map(&rule).await;
    let existing = ctx.scenarios(&rule).await;

    if !ctx.confirm(
        &format!("Import {} into scenarios of {}?", csv_path.display(), rule.filepath),
        yes,
    ) {
        ctx.fail("import aborted");
    }
    let report = import_csv(ctx.api(), &rule, Some(&rule_map), &text, &existing)
        .await
        .unwrap_or_else(|e| ctx.fail(&format!("csv import failed: {}", e)));

    if ctx.is_json() {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|f| json!({"action": f.action, "scenario": f.target, "error": f.error.to_string()}))
            .collect();
        let succeeded: Vec<_> = report
            .succeeded
            .iter()
            .map(|(action, target)| json!({"action": action, "scenario": target}))
            .collect();
        ctx.print_json(&json!({"succeeded": succeeded, "failed": failed}));
    } else {
        for (action, target) in &report.succeeded {
            ctx.say(&format!("{}d '{}'", action, target));
        }
        for f in &report.failed {
            ctx.say(&format!("failed to {} '{}': {}", f.action, f.target, f.error));
        }
        ctx.say(&format!(
            "{} saved, {} failed",
            report.succeeded.len(),
            report.failed.len()
        ));
    }

    if !report.is_success() {
        std::process::exit(1);
    }
}
