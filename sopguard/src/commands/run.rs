// sopguard/src/commands/run.rs
//
// USE CASE: Validate the stock data against every rule of a checklist.

use anyhow::Context;
use chrono::Local;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, Color, Table as ConsoleTable};
use serde_json::Value as JsonValue;

use sopguard_core::SopGuardError;
use sopguard_core::application::{Dispatcher, run_checklist};
use sopguard_core::domain::report::{ValidationRecord, ValidationReport};
use sopguard_core::domain::{Checklist, TableBundle};
use sopguard_core::infrastructure::config::load_config;
use sopguard_core::infrastructure::{export_report, load_checklist, load_table};

use crate::cli::RunArgs;
use crate::commands::build_resolver;

const FAILURES_SHOWN: usize = 5;

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    let start = std::time::Instant::now();

    // A. Config + entrées : toute erreur ici arrête le run avant la première règle
    let config = load_config(&args.project_dir).with_context(|| {
        format!("Failed to load configuration from {:?}", args.project_dir)
    })?;

    let (checklist, tables) = load_inputs(&args).context("Failed to load input files")?;
    println!(
        "📋 {} rules | stock: {} rows | master: {} | gr: {}",
        checklist.len(),
        tables.stock.len(),
        describe_optional(tables.master.as_ref().map(|t| t.len())),
        describe_optional(tables.gr.as_ref().map(|t| t.len())),
    );

    // B. Resolver + Dispatcher
    let resolver = build_resolver(args.plan.as_deref(), &config)?;
    let today = args
        .as_of
        .or(config.reference_date)
        .unwrap_or_else(|| Local::now().date_naive());
    let dispatcher = Dispatcher::new().with_reference_date(today);

    // C. Run (Application Layer)
    let report = run_checklist(&checklist, &tables, resolver.as_ref(), &dispatcher).await;

    print_summary(&report);

    if let Some(output) = &args.output {
        export_report(&report, output)
            .with_context(|| format!("Failed to write results to {:?}", output))?;
        println!("💾 Results written to {}", output.display());
    }

    println!("⏱️  Finished in {:.2?}", start.elapsed());

    if args.strict && !report.all_passed() {
        eprintln!(
            "\n❌ FAILURE. {} checks failed.",
            report.total() - report.passed_count()
        );
        std::process::exit(1);
    }

    Ok(())
}

fn load_inputs(args: &RunArgs) -> Result<(Checklist, TableBundle), SopGuardError> {
    let checklist = load_checklist(&args.checklist)?;

    let mut tables = TableBundle::new(load_table(&args.stock, args.sheet.as_deref())?);
    if let Some(path) = &args.master {
        tables = tables.with_master(load_table(path, args.master_sheet.as_deref())?);
    }
    if let Some(path) = &args.gr {
        tables = tables.with_gr(load_table(path, args.gr_sheet.as_deref())?);
    }
    Ok((checklist, tables))
}

fn describe_optional(rows: Option<usize>) -> String {
    match rows {
        Some(n) => format!("{} rows", n),
        None => "-".to_string(),
    }
}

fn print_summary(report: &ValidationReport) {
    println!(
        "\nChecks passed: {}/{}",
        report.passed_count(),
        report.total()
    );

    let failures: Vec<&ValidationRecord> = report.failures(FAILURES_SHOWN).collect();
    if failures.is_empty() {
        println!("✨ All checks passed.");
        return;
    }

    let mut table = ConsoleTable::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec![
            Cell::new("Check").add_attribute(Attribute::Bold),
            Cell::new("Tool").add_attribute(Attribute::Bold),
            Cell::new("Result").add_attribute(Attribute::Bold),
        ]);

    for record in failures {
        table.add_row(vec![
            Cell::new(&record.check),
            Cell::new(record.tool.as_deref().unwrap_or("-")),
            Cell::new(failure_summary(record)).fg(Color::Red),
        ]);
    }
    println!("{table}");
}

/// The error message when there is one, otherwise the counters without the
/// example rows.
fn failure_summary(record: &ValidationRecord) -> String {
    if let Some(error) = record.error() {
        return error.to_string();
    }
    let counters: serde_json::Map<String, JsonValue> = record
        .details
        .iter()
        .filter(|(key, _)| key.as_str() != "examples")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    JsonValue::Object(counters).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn test_failure_summary_prefers_error() {
        let rec = ValidationRecord::failure("Rule", None, "unable to route", []);
        assert_eq!(failure_summary(&rec), "unable to route");
    }

    #[test]
    fn test_failure_summary_drops_examples() {
        let mut details = Map::new();
        details.insert("failing_count".into(), json!(3));
        details.insert("examples".into(), json!([{"Current Stock": "-5"}]));
        let rec = ValidationRecord::new("Rule", Some("row_condition".into()), false, details);
        assert_eq!(failure_summary(&rec), r#"{"failing_count":3}"#);
    }

    #[test]
    fn test_describe_optional() {
        assert_eq!(describe_optional(Some(12)), "12 rows");
        assert_eq!(describe_optional(None), "-");
    }
}
