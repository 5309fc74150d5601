use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use onboard_core::taxonomy::Taxonomy;
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand definition
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum TaxonomySubcommand {
    /// List the roles a user can pick from
    Roles,

    /// List a role's categories
    Categories {
        /// Role id
        role: String,
    },

    /// List a category's experience levels
    Levels {
        /// Category id
        category: String,
    },

    /// Show the resolved step flow for a selection
    Flow {
        /// Category id
        category: String,
        /// Level id (required when the category uses levels)
        #[arg(long)]
        level: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: TaxonomySubcommand, json: bool) -> anyhow::Result<()> {
    let taxonomy = Taxonomy::load(root).context("failed to load taxonomy")?;
    match subcmd {
        TaxonomySubcommand::Roles => roles(&taxonomy, json),
        TaxonomySubcommand::Categories { role } => categories(&taxonomy, &role, json),
        TaxonomySubcommand::Levels { category } => levels(&taxonomy, &category, json),
        TaxonomySubcommand::Flow { category, level } => {
            flow(&taxonomy, &category, level.as_deref(), json)
        }
    }
}

// ---------------------------------------------------------------------------
// roles
// ---------------------------------------------------------------------------

fn roles(taxonomy: &Taxonomy, json: bool) -> anyhow::Result<()> {
    let mut roles: Vec<_> = taxonomy.roles.iter().filter(|r| r.active).collect();
    roles.sort_by_key(|r| r.sort_order);

    if json {
        return print_json(&roles);
    }
    if roles.is_empty() {
        println!("No roles defined.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = roles
        .iter()
        .map(|r| {
            let categories = taxonomy.categories_for(&r.id).map_or(0, |c| c.len());
            vec![
                r.id.clone(),
                r.name.clone(),
                r.button_label.clone().unwrap_or_default(),
                categories.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "LABEL", "CATEGORIES"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// categories
// ---------------------------------------------------------------------------

fn categories(taxonomy: &Taxonomy, role: &str, json: bool) -> anyhow::Result<()> {
    let categories = taxonomy.categories_for(role)?;

    if json {
        return print_json(&categories);
    }
    if categories.is_empty() {
        println!("No categories for role '{role}'.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = categories
        .iter()
        .map(|c| {
            let levels = taxonomy.levels_for(&c.id).map_or(0, |l| l.len());
            vec![c.id.clone(), c.name.clone(), levels.to_string()]
        })
        .collect();
    print_table(&["ID", "NAME", "LEVELS"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// levels
// ---------------------------------------------------------------------------

fn levels(taxonomy: &Taxonomy, category: &str, json: bool) -> anyhow::Result<()> {
    let levels = taxonomy.levels_for(category)?;

    if json {
        return print_json(&levels);
    }
    if levels.is_empty() {
        println!("Category '{category}' does not use levels.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = levels
        .iter()
        .map(|l| {
            let years = l
                .requirements
                .years_experience
                .map_or_else(|| "-".to_string(), |y| format!("{y}+"));
            let skills = if l.requirements.skills.is_empty() {
                "-".to_string()
            } else {
                l.requirements.skills.join(", ")
            };
            vec![l.id.clone(), l.name.clone(), years, skills]
        })
        .collect();
    print_table(&["ID", "NAME", "YEARS", "EXPECTED SKILLS"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// flow
// ---------------------------------------------------------------------------

fn flow(taxonomy: &Taxonomy, category: &str, level: Option<&str>, json: bool) -> anyhow::Result<()> {
    let flow = taxonomy.flow(category, level)?;

    if json {
        let value = serde_json::json!({
            "flow": flow.name,
            "steps": flow.steps,
        });
        return print_json(&value);
    }

    println!("Flow: {} ({} steps)", flow.name, flow.len());
    let rows: Vec<Vec<String>> = flow
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let requires = if s.requirements.is_empty() {
                "-".to_string()
            } else {
                s.requirements
                    .iter()
                    .map(|r| r.describe())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            vec![
                (i + 1).to_string(),
                s.id.clone(),
                s.name.clone(),
                s.kind.to_string(),
                requires,
            ]
        })
        .collect();
    print_table(&["#", "ID", "NAME", "KIND", "REQUIRES"], rows);
    Ok(())
}
