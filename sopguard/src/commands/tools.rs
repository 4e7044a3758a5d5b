// sopguard/src/commands/tools.rs
//
// USE CASE: Print the operation catalog, exactly as the LLM resolver sees it.

use sopguard_core::domain::catalog::describe_catalog;

pub fn execute() -> anyhow::Result<()> {
    let catalog = describe_catalog();
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}
