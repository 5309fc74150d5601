use crate::output::{print_json, print_table};
use anyhow::anyhow;
use clap::Subcommand;
use onboard_core::orchestrator::Orchestrator;
use onboard_core::progress::{OnboardingProgress, ProgressAction};
use serde_json::{Map, Value};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand definition
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ProgressSubcommand {
    /// Show where a user stands in their flow
    Show { user: String, role: String },

    /// Start (or restart) onboarding for a user
    Start {
        user: String,
        role: String,
        /// Category id
        category: String,
        /// Level id (required when the category uses levels)
        #[arg(long)]
        level: Option<String>,
    },

    /// Submit form output for a step and advance
    Complete {
        user: String,
        role: String,
        /// Stage id being submitted
        step: String,
        /// Form values as name=value pairs; values may be JSON
        #[arg(long = "field", value_name = "NAME=VALUE")]
        fields: Vec<String>,
    },

    /// Step back one position for review
    Back { user: String, role: String },

    /// Skip the current stage (optional stages, or conditional ones that do not apply)
    Skip { user: String, role: String },

    /// Return to step 1, keeping collected answers for prefill
    Reset { user: String, role: String },
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ProgressSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ProgressSubcommand::Show { user, role } => show(root, &user, &role, json),
        ProgressSubcommand::Start {
            user,
            role,
            category,
            level,
        } => start(root, &user, &role, &category, level.as_deref(), json),
        ProgressSubcommand::Complete {
            user,
            role,
            step,
            fields,
        } => complete(root, &user, &role, &step, &fields, json),
        ProgressSubcommand::Back { user, role } => back(root, &user, &role, json),
        ProgressSubcommand::Skip { user, role } => skip(root, &user, &role, json),
        ProgressSubcommand::Reset { user, role } => reset(root, &user, &role, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, user: &str, role: &str, json: bool) -> anyhow::Result<()> {
    let engine = Orchestrator::open(root)?;
    let view = engine.snapshot(user, role)?;

    if json {
        return print_json(&view);
    }

    println!("Status: {}", view.status);
    let Some(progress) = &view.progress else {
        println!("\nNo progress yet. Run: onboard progress start {user} {role} <category>");
        return Ok(());
    };

    println!("Flow:   {}", progress.flow);
    if progress.is_completed() {
        println!("Steps:  all {} done", progress.total_steps);
    } else {
        println!(
            "Step:   {} of {}",
            progress.current_step, progress.total_steps
        );
    }
    let done = if progress.completed.is_empty() {
        "(none)".to_string()
    } else {
        progress
            .completed
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("Done:   {done}");
    println!(
        "Seen:   {}",
        progress.last_activity.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if let Some(stage) = &view.current_stage {
        println!("\nCurrent stage: {} [{}]", stage.name, stage.kind);
        if let Some(description) = &stage.description {
            println!("{description}");
        }
        if !stage.form_fields.is_empty() {
            let rows: Vec<Vec<String>> = stage
                .form_fields
                .iter()
                .map(|f| {
                    vec![
                        f.name.clone(),
                        f.label.clone(),
                        f.kind.to_string(),
                        if f.required {
                            "required".to_string()
                        } else {
                            String::new()
                        },
                    ]
                })
                .collect();
            print_table(&["FIELD", "LABEL", "KIND", ""], rows);
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// start
// ---------------------------------------------------------------------------

fn start(
    root: &Path,
    user: &str,
    role: &str,
    category: &str,
    level: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let mut engine = Orchestrator::open(root)?;
    let progress = engine.start(user, role, category, level)?;

    if json {
        return print_json(&progress);
    }
    println!(
        "Started flow '{}' for {user}/{role} ({} steps).",
        progress.flow, progress.total_steps
    );
    println!("Next: onboard progress show {user} {role}");
    Ok(())
}

// ---------------------------------------------------------------------------
// complete
// ---------------------------------------------------------------------------

fn complete(
    root: &Path,
    user: &str,
    role: &str,
    step: &str,
    fields: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let output = parse_fields(fields)?;
    let mut engine = Orchestrator::open(root)?;
    let progress = engine.complete_step(user, role, step, output)?;

    if json {
        return print_json(&progress);
    }

    // A correction appends eviction events after the correction record, so
    // the trailing run of the history is exactly what this call invalidated.
    let mut evicted: Vec<&str> = progress
        .history
        .iter()
        .rev()
        .take_while(|e| e.action == ProgressAction::StageEvicted)
        .filter_map(|e| e.stage_id.as_deref())
        .collect();
    if !evicted.is_empty() {
        evicted.reverse();
        println!("Changed answers invalidated: {}", evicted.join(", "));
    }

    report_position(step, &progress);
    Ok(())
}

/// Parse repeated `--field name=value` pairs into a form payload. Values
/// that parse as JSON keep their type; everything else becomes a string.
fn parse_fields(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut output = Map::new();
    for pair in pairs {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("invalid --field '{pair}' (expected NAME=VALUE)"))?;
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        output.insert(name.to_string(), value);
    }
    Ok(output)
}

fn report_position(step: &str, progress: &OnboardingProgress) {
    if progress.is_completed() {
        println!(
            "Onboarding complete. All {} steps finished.",
            progress.total_steps
        );
    } else {
        println!(
            "Step '{step}' recorded. Now on step {} of {}.",
            progress.current_step, progress.total_steps
        );
    }
}

// ---------------------------------------------------------------------------
// back
// ---------------------------------------------------------------------------

fn back(root: &Path, user: &str, role: &str, json: bool) -> anyhow::Result<()> {
    let mut engine = Orchestrator::open(root)?;
    let progress = engine.previous_step(user, role)?;

    if json {
        return print_json(&progress);
    }
    println!(
        "Now on step {} of {}.",
        progress.current_step, progress.total_steps
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// skip
// ---------------------------------------------------------------------------

fn skip(root: &Path, user: &str, role: &str, json: bool) -> anyhow::Result<()> {
    let mut engine = Orchestrator::open(root)?;
    let progress = engine.skip_step(user, role)?;

    if json {
        return print_json(&progress);
    }
    if progress.is_completed() {
        println!(
            "Onboarding complete. All {} steps finished.",
            progress.total_steps
        );
    } else {
        println!(
            "Skipped. Now on step {} of {}.",
            progress.current_step, progress.total_steps
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// reset
// ---------------------------------------------------------------------------

fn reset(root: &Path, user: &str, role: &str, json: bool) -> anyhow::Result<()> {
    let mut engine = Orchestrator::open(root)?;
    let progress = engine.reset(user, role)?;

    if json {
        return print_json(&progress);
    }
    println!(
        "Progress reset to step 1 of {}. Collected answers were kept.",
        progress.total_steps
    );
    Ok(())
}
