use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const STOCK: &str = "\
Material Code,Batch,Date of Manufacturing,Current Stock
MAT-001,BATCH-2025A,10/15/2025,\"1,200\"
MAT-002,BATCH-2025B,10/20/2025,-5
MAT-003,BATCH-2025C,12/01/2030,40
";

const MASTER: &str = "\
Material Code,Batch,Date of Manufacturing
MAT-001,BATCH-2025A,2025-10-15
MAT-002,BATCH-2025B,2025-10-20
MAT-003,BATCH-2025C,2030-12-01
";

const CHECKLIST: &str = "\
id,severity,checks
1,High,Batch column must exist
2,High,Current stock must be positive
3,Medium,Manufacturing date must not be in the future
4,Low,Manufacturing date must match master documentation
5,Low,The warehouse must be tidy
";

const PLAN: &str = r#"
intents:
  - check: "Batch column must exist"
    tool: column_exists
    args: { column: Batch }
  - check: "Current stock must be positive"
    tool: row_condition
    args: { expr: "`Current Stock` > 0" }
  - check: "Manufacturing date must not be in the future"
    tool: date_not_future
    args: { column: "Date of Manufacturing" }
  - check: "Manufacturing date must match master documentation"
    tool: match_master_on_keys
    args:
      keys: ["Material Code", "Batch"]
      column: "Date of Manufacturing"
"#;

/// Temp project holding the input files of one run.
struct SopGuardTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl SopGuardTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let root = tmp.path().to_path_buf();
        fs::write(root.join("stock.csv"), STOCK)?;
        fs::write(root.join("master.csv"), MASTER)?;
        fs::write(root.join("checklist.csv"), CHECKLIST)?;
        fs::write(root.join("plan.yaml"), PLAN)?;
        Ok(Self { _tmp: tmp, root })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn sopguard(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sopguard"));
        cmd.current_dir(&self.root);
        for key in [
            "LLMFOUNDRY_TOKEN",
            "OPENAI_API_KEY",
            "base_url",
            "OPENAI_BASE_URL",
            "SOPGUARD_REFERENCE_DATE",
        ] {
            cmd.env_remove(key);
        }
        cmd
    }

    fn run_with_plan(&self, extra: &[&str]) -> Command {
        let mut cmd = self.sopguard();
        cmd.args([
            "run",
            "--checklist",
            "checklist.csv",
            "--stock",
            "stock.csv",
            "--master",
            "master.csv",
            "--plan",
            "plan.yaml",
            "--as-of",
            "2025-11-04",
        ]);
        cmd.args(extra);
        cmd
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

#[test]
fn test_tools_prints_catalog() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    let output = env.sopguard().arg("tools").output()?;
    assert!(output.status.success());

    let catalog: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let tools = catalog.as_array().map(Vec::len).unwrap_or_default();
    assert_eq!(tools, 8);
    assert_eq!(catalog[0]["name"], "column_exists");
    assert_eq!(catalog[7]["args"]["required"][0], "keys");
    Ok(())
}

#[test]
fn test_run_with_plan_reports_summary() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    env.run_with_plan(&["--output", "results.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checks passed: 2/5"))
        .stdout(predicate::str::contains("unable to route"));

    let csv = fs::read_to_string(env.path("results.csv"))?;
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("check,tool,passed,details,id,severity"));
    assert!(
        lines
            .next()
            .is_some_and(|l| l.starts_with("Batch column must exist,column_exists,true,"))
    );
    assert_eq!(csv.lines().count(), 6);
    Ok(())
}

#[test]
fn test_run_exports_json_records() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    env.run_with_plan(&["--output", "out/results.json"])
        .assert()
        .success();

    let records = read_json(&env.path("out/results.json"))?;
    assert_eq!(records[1]["tool"], "row_condition");
    assert_eq!(records[1]["passed"], false);
    assert_eq!(records[1]["details"]["failing_count"], 1);
    assert_eq!(records[1]["details"]["examples"][0]["Material Code"], "MAT-002");
    assert_eq!(records[2]["details"]["future_count"], 1);
    assert_eq!(records[3]["passed"], true);
    assert_eq!(records[4]["tool"], serde_json::Value::Null);
    assert_eq!(records[4]["details"]["error"], "unable to route");
    assert_eq!(records[4]["id"], "5");
    Ok(())
}

#[test]
fn test_run_is_deterministic() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    env.run_with_plan(&["--output", "first.json"]).assert().success();
    env.run_with_plan(&["--output", "second.json"]).assert().success();

    assert_eq!(
        fs::read_to_string(env.path("first.json"))?,
        fs::read_to_string(env.path("second.json"))?
    );
    Ok(())
}

#[test]
fn test_strict_mode_fails_on_failed_checks() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    env.run_with_plan(&["--strict"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("3 checks failed"));
    Ok(())
}

#[test]
fn test_run_without_resolver_marks_everything_unrouted() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    env.sopguard()
        .args(["run", "-c", "checklist.csv", "-s", "stock.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checks passed: 0/5"))
        .stderr(predicate::str::contains("LLM routing inactive"));
    Ok(())
}

#[test]
fn test_missing_stock_aborts_before_any_rule() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    env.sopguard()
        .args(["run", "-c", "checklist.csv", "-s", "nope.csv", "--plan", "plan.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load input files"))
        .stdout(predicate::str::contains("Checks passed").not());
    Ok(())
}

#[test]
fn test_checklist_without_checks_column_is_rejected() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    fs::write(env.path("bad.csv"), "rule\nBatch column must exist\n")?;
    env.sopguard()
        .args(["run", "-c", "bad.csv", "-s", "stock.csv"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_corrupt_workbook_is_rejected() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    fs::write(env.path("stock.xlsx"), "PK")?;
    env.sopguard()
        .args(["run", "-c", "checklist.csv", "-s", "stock.xlsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load input files"));
    Ok(())
}

/// Same data as the CSV fixtures, in one workbook with a Stock and a Master sheet.
fn write_workbook(path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let header = ["Material Code", "Batch", "Date of Manufacturing"];
    let rows = [
        ("MAT-001", "BATCH-2025A", (2025, 10, 15), 1200.0),
        ("MAT-002", "BATCH-2025B", (2025, 10, 20), -5.0),
        ("MAT-003", "BATCH-2025C", (2030, 12, 1), 40.0),
    ];

    for (name, with_stock) in [("Stock", true), ("Master", false)] {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        for (col, title) in header.iter().enumerate() {
            sheet.write_string(0, col as u16, *title)?;
        }
        if with_stock {
            sheet.write_string(0, 3, "Current Stock")?;
        }
        for (idx, (material, batch, (y, m, d), stock)) in rows.iter().enumerate() {
            let row = idx as u32 + 1;
            sheet.write_string(row, 0, *material)?;
            sheet.write_string(row, 1, *batch)?;
            sheet.write_datetime_with_format(row, 2, &ExcelDateTime::from_ymd(*y, *m, *d)?, &date)?;
            if with_stock {
                sheet.write_number(row, 3, *stock)?;
            }
        }
    }
    workbook.save(path)?;
    Ok(())
}

#[test]
fn test_run_on_workbook_sheets() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    write_workbook(&env.path("inventory.xlsx"))?;

    env.sopguard()
        .args([
            "run",
            "-c",
            "checklist.csv",
            "-s",
            "inventory.xlsx",
            "--sheet",
            "Stock",
            "-m",
            "inventory.xlsx",
            "--master-sheet",
            "Master",
            "--plan",
            "plan.yaml",
            "--as-of",
            "2025-11-04",
            "-o",
            "results.xlsx",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checks passed: 2/5"));

    assert!(env.path("results.xlsx").exists());
    Ok(())
}

#[test]
fn test_unknown_sheet_is_reported() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    write_workbook(&env.path("inventory.xlsx"))?;

    env.sopguard()
        .args(["run", "-c", "checklist.csv", "-s", "inventory.xlsx", "--sheet", "MB51"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("MB51"));
    Ok(())
}

#[test]
fn test_route_with_plan() -> Result<()> {
    let env = SopGuardTestEnv::new()?;
    let output = env
        .sopguard()
        .args(["route", "current stock must be positive", "--plan", "plan.yaml"])
        .output()?;
    assert!(output.status.success());

    let routed: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(routed["tool"], "row_condition");
    assert_eq!(routed["valid"], true);
    Ok(())
}
