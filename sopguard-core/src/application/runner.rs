// sopguard-core/src/application/runner.rs

use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::application::dispatcher::Dispatcher;
use crate::domain::catalog::describe_catalog;
use crate::domain::checklist::Checklist;
use crate::domain::report::ValidationReport;
use crate::domain::table::TableBundle;
use crate::ports::resolver::IntentResolver;

/// Runs every rule of the checklist, in order, one after another.
///
/// A rule that cannot be routed or executed yields a failed record and the
/// batch moves on: nothing here aborts the run.
#[instrument(skip_all, fields(rules = checklist.len(), today = %dispatcher.reference_date()))]
pub async fn run_checklist(
    checklist: &Checklist,
    tables: &TableBundle,
    resolver: &dyn IntentResolver,
    dispatcher: &Dispatcher,
) -> ValidationReport {
    let start = Instant::now();
    let catalog = describe_catalog();
    let mut report = ValidationReport::new(checklist.declares_id(), checklist.declares_severity());

    for rule in checklist.rules() {
        let resolution = resolver.resolve(&rule.text, &catalog).await;
        debug!(?resolution, "Resolver answer for '{}'", rule.text);

        let record = dispatcher
            .execute(&rule.text, resolution, tables)
            .with_rule_metadata(rule);

        let tool = record.tool.as_deref().unwrap_or("-");
        if record.passed {
            info!("✅ PASS [{}] {}", tool, rule.text);
        } else {
            info!("❌ FAIL [{}] {}", tool, rule.text);
        }
        report.push(record);
    }

    info!(
        "🏁 Checklist done: {}/{} passed in {:.2?}",
        report.passed_count(),
        report.total(),
        start.elapsed()
    );
    report
}
