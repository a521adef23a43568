//! `search` and `index` commands.

use colored::Colorize;
use forge_core::{ForgePaths, Kind};
use forge_registry::RegistryClient;

use crate::output::OutputFormat;
use crate::theme::Theme;

pub(crate) async fn run_search(query: &str, kind: Option<&str>, paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    let kind = kind.map(parse_kind).transpose()?;
    let client = RegistryClient::new(paths.clone());
    let index = client.fetch_index(false).await?;
    let matches = client.search(&index, query, kind);

    if format.print_json_or_fallthrough(&matches) {
        return Ok(());
    }
    if matches.is_empty() {
        println!("{}", Theme::info(&format!("No packages match {query:?}")));
        return Ok(());
    }

    println!("{}", Theme::header(&format!("Matches for {query:?}")));
    for descriptor in matches {
        println!(
            "  {} {} — {}",
            descriptor.id.cyan(),
            format!("v{}", descriptor.version).dimmed(),
            descriptor.description
        );
    }
    Ok(())
}

fn parse_kind(raw: &str) -> anyhow::Result<Kind> {
    match raw {
        "stack" => Ok(Kind::Stack),
        "prompt" => Ok(Kind::Prompt),
        "runtime" => Ok(Kind::Runtime),
        "binary" => Ok(Kind::Binary),
        "agent" => Ok(Kind::Agent),
        other => anyhow::bail!("unknown package kind {other:?} (expected stack|prompt|runtime|binary|agent)"),
    }
}

pub(crate) async fn run_index(paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    let config = forge_config::init_config(paths)?;
    let index = forge_mcp::index_all(paths, &config).await?;
    std::fs::create_dir_all(
        paths
            .tool_index_path()
            .parent()
            .ok_or_else(|| anyhow::anyhow!("tool index path has no parent directory"))?,
    )?;
    std::fs::write(paths.tool_index_path(), serde_json::to_vec_pretty(&index)?)?;

    if format.print_json_or_fallthrough(&index) {
        return Ok(());
    }
    println!("{}", Theme::header("Tool index"));
    for (stack_id, result) in &index.stacks {
        if let Some(error) = &result.error {
            println!("  {} {stack_id}: {error}", "✗".red());
        } else {
            println!("  {} {stack_id}: {} tools", "✓".green(), result.tools.len());
        }
    }
    Ok(())
}
