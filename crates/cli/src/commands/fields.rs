use std::time::Duration;

use brms_workbench::FieldSearch;

use super::Ctx;

pub(crate) async fn cmd_fields(ctx: &Ctx, query: &str) {
    // One query per process, so nothing to debounce.
    let search = FieldSearch::with_delay(Duration::ZERO);
    let fields = match search.search(ctx.api(), query).await {
        Ok(found) => found.unwrap_or_default(),
        Err(e) => ctx.fail(&format!("field search failed: {}", e)),
    };

    if ctx.is_json() {
        ctx.print_json(&fields);
        return;
    }
    if fields.is_empty() {
        ctx.say("no matching fields");
    }
    for f in &fields {
        let kind = f.data_type.as_deref().unwrap_or("");
        ctx.say(&format!("{:<32} {:<24} {}", f.field, f.label(), kind));
    }
}
