use std::path::Path;

use brms_core::batch_csv::results_to_csv;
use brms_workbench::{run_all, RenameOutcome, ResultsTable, ScenarioViewer, SortOrder};
use serde_json::json;

use super::Ctx;
use crate::SortArg;

pub(crate) async fn cmd_list(ctx: &Ctx, rule_path: &Path, page: usize) {
    let rule = ctx.load_rule(rule_path);
    let viewer = ScenarioViewer::new(ctx.scenarios(&rule).await);
    let index = page.saturating_sub(1);
    let shown = viewer.page(index);

    if ctx.is_json() {
        ctx.print_json(&json!({
            "page": page,
            "pages": viewer.page_count(),
            "total": viewer.scenarios().len(),
            "scenarios": shown,
        }));
        return;
    }
    if viewer.scenarios().is_empty() {
        ctx.say(&format!("no scenarios for {}", rule.filepath));
        return;
    }
    for s in shown {
        ctx.say(&format!(
            "{:<26} {}  ({} inputs, {} expected)",
            s.id.as_deref().unwrap_or("-"),
            s.title,
            s.variables.len(),
            s.expected_results.len()
        ));
    }
    ctx.say(&format!(
        "page {} of {} ({} scenarios)",
        page.max(1),
        viewer.page_count(),
        viewer.scenarios().len()
    ));
}

pub(crate) async fn cmd_run(
    ctx: &Ctx,
    rule_path: &Path,
    errors_only: bool,
    sort: Option<SortArg>,
    report: Option<&Path>,
) {
    let rule = ctx.load_rule(rule_path);
    let scenarios = ctx.scenarios(&rule).await;
    let rows = run_all(ctx.api(), &rule, &scenarios)
        .await
        .unwrap_or_else(|e| ctx.fail(&format!("scenario run failed: {}", e)));

    let mut table = ResultsTable::new(rows);
    table.show_errors_only(errors_only);
    match sort {
        Some(SortArg::Asc) => table.sort_by_title(SortOrder::Ascending),
        Some(SortArg::Desc) => table.sort_by_title(SortOrder::Descending),
        None => {}
    }

    if let Some(path) = report {
        let text = results_to_csv(table.all())
            .unwrap_or_else(|e| ctx.fail(&format!("failed to write report: {}", e)));
        ctx.emit(Some(path), &text);
    }

    if ctx.is_json() {
        ctx.print_json(&json!({
            "passed": table.passed(),
            "failed": table.failed(),
            "results": table.rows(),
        }));
    } else {
        for row in table.rows() {
            let verdict = row.diff.to_text();
            ctx.say(&format!("{}: {}", row.title, verdict));
        }
        ctx.say(&format!("{} passed, {} failed", table.passed(), table.failed()));
    }

    if table.failed() > 0 {
        std::process::exit(1);
    }
}

pub(crate) async fn cmd_rename(ctx: &Ctx, rule_path: &Path, id: &str, title: &str) {
    let rule = ctx.load_rule(rule_path);
    let mut viewer = ScenarioViewer::new(ctx.scenarios(&rule).await);
    match viewer.rename(ctx.api(), id, title).await {
        Ok(RenameOutcome::Unchanged) => ctx.say("title unchanged"),
        Ok(RenameOutcome::Renamed) => {
            if ctx.is_json() {
                ctx.print_json(&json!({"id": id, "title": title.trim()}));
            } else {
                ctx.say(&format!("renamed {} to '{}'", id, title.trim()));
            }
        }
        Err(e) => ctx.fail(&format!("rename failed: {}", e)),
    }
}

pub(crate) async fn cmd_delete(ctx: &Ctx, rule_path: &Path, id: &str, yes: bool) {
    let rule = ctx.load_rule(rule_path);
    let mut viewer = ScenarioViewer::new(ctx.scenarios(&rule).await);
    let title = match viewer.select(id) {
        Ok(_) => viewer.selected().map(|s| s.title.clone()).unwrap_or_default(),
        Err(e) => ctx.fail(&e.to_string()),
    };
    if !ctx.confirm(&format!("Delete scenario '{}'?", title), yes) {
        ctx.fail("delete aborted");
    }
    match viewer.delete(ctx.api(), id).await {
        Ok(()) => {
            if ctx.is_json() {
                ctx.print_json(&json!({"deleted": id, "remaining": viewer.scenarios().len()}));
            } else {
                ctx.say(&format!("deleted '{}'", title));
            }
        }
        Err(e) => ctx.fail(&format!("delete failed: {}", e)),
    }
}
