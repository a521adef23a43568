//! `agents register`, `agents unregister`, and `agents status` commands.

use colored::Colorize;
use forge_agents::{get_mcp_registration_summary, register_mcp_all, unregister_mcp_all};
use forge_core::{ForgePaths, Kind};
use forge_manifest::{Manifest, StackManifest};

use crate::output::OutputFormat;
use crate::theme::Theme;

/// Load the stack's own manifest, preferring the name it is preserved
/// under for registry-sourced installs (`source.manifest.json`) and
/// falling back to the local-install candidate names.
fn load_stack_manifest(paths: &ForgePaths, name: &str) -> anyhow::Result<StackManifest> {
    let install_dir = paths.stack_dir(name);
    let candidates = [
        paths.source_manifest_path(Kind::Stack, name),
        install_dir.join("stack.yaml"),
        install_dir.join("manifest.yaml"),
        install_dir.join("stack.json"),
    ];
    let manifest_path = candidates
        .iter()
        .find(|p| p.is_file())
        .ok_or_else(|| anyhow::anyhow!("no stack manifest found for {name} under {}", install_dir.display()))?;

    match forge_manifest::load_manifest(manifest_path, Kind::Stack)? {
        Manifest::Stack(stack) => Ok(stack),
        _ => anyhow::bail!("{name}'s manifest is not a stack manifest"),
    }
}

fn stack_name(stack_id: &str) -> String {
    forge_core::strip_kind_prefix(stack_id).to_string()
}

pub(crate) fn run_register(stack_id: &str, agents: Option<&[String]>, paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    let name = stack_name(stack_id);
    let manifest = load_stack_manifest(paths, &name)?;
    let install_path = paths.stack_dir(&name);
    let outcomes = register_mcp_all(stack_id, &install_path, &manifest, agents);
    print_outcomes("Registration", &outcomes, format);
    Ok(())
}

pub(crate) fn run_unregister(stack_id: &str, agents: Option<&[String]>, format: OutputFormat) -> anyhow::Result<()> {
    let outcomes = unregister_mcp_all(stack_id, agents);
    print_outcomes("Unregistration", &outcomes, format);
    Ok(())
}

pub(crate) fn run_status(stack_id: Option<&str>, format: OutputFormat) -> anyhow::Result<()> {
    let outcomes = get_mcp_registration_summary(stack_id);
    print_outcomes("Registration status", &outcomes, format);
    Ok(())
}

fn print_outcomes(
    title: &str,
    outcomes: &std::collections::HashMap<String, forge_agents::AgentOutcome>,
    format: OutputFormat,
) {
    if format.print_json_or_fallthrough(outcomes) {
        return;
    }
    println!("{}", Theme::header(title));
    let mut agent_ids: Vec<&String> = outcomes.keys().collect();
    agent_ids.sort();
    for agent_id in agent_ids {
        let outcome = &outcomes[agent_id];
        if outcome.skipped == Some(true) {
            let reason = outcome.reason.as_deref().unwrap_or("skipped");
            println!("  {} {agent_id}: {}", "-".dimmed(), reason.dimmed());
        } else if outcome.success {
            println!("  {} {agent_id}", "✓".green());
        } else {
            let reason = outcome.error.as_deref().unwrap_or("unknown error");
            println!("  {} {agent_id}: {reason}", "✗".red());
        }
    }
}
