use anyhow::Context;
use onboard_core::{config::Config, io, paths, taxonomy};
use std::path::Path;

pub fn run(root: &Path, bare: bool) -> anyhow::Result<()> {
    let product_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "onboarding".to_string());

    println!("Initializing onboarding workspace in: {}", root.display());

    // 1. Create the .onboard directory tree
    let dirs = [paths::ONBOARD_DIR, paths::PROGRESS_DIR, paths::PROFILES_DIR];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    // 2. Write config.yaml if missing
    let config_path = paths::config_path(root);
    if !config_path.exists() {
        let config = Config::new(&product_name);
        config.save(root).context("failed to write config.yaml")?;
        println!("  created: .onboard/config.yaml");
    } else {
        println!("  exists:  .onboard/config.yaml");
    }

    // 3. Write taxonomy.yaml if missing
    let taxonomy_path = paths::taxonomy_path(root);
    if !taxonomy_path.exists() {
        let tx = if bare {
            taxonomy::Taxonomy {
                version: 1,
                roles: vec![],
                categories: vec![],
                levels: vec![],
                stages: vec![],
            }
        } else {
            taxonomy::starter().context("failed to load the bundled starter taxonomy")?
        };
        tx.save(root).context("failed to write taxonomy.yaml")?;
        if bare {
            println!("  created: .onboard/taxonomy.yaml (empty)");
        } else {
            println!("  created: .onboard/taxonomy.yaml (starter roles and flows)");
        }
    } else {
        println!("  exists:  .onboard/taxonomy.yaml");
    }

    println!("\nWorkspace initialized successfully.");
    println!("Next: onboard taxonomy roles");

    Ok(())
}
