use crate::output::print_json;
use anyhow::Context;
use onboard_core::config::Config;
use onboard_core::taxonomy::Taxonomy;
use onboard_core::types::WarnLevel;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let taxonomy = Taxonomy::load(root).context("failed to load taxonomy")?;

    let mut warnings = config.validate();
    warnings.extend(taxonomy.validate());

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!(
            "Checked {} roles, {} categories, {} levels, {} stages.",
            taxonomy.roles.len(),
            taxonomy.categories.len(),
            taxonomy.levels.len(),
            taxonomy.stages.len()
        );
        println!("Workspace is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("taxonomy validation found errors");
    }

    Ok(())
}
