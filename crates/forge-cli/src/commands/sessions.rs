//! `sessions import`, `sessions search`, and `sessions stats` commands.

use colored::Colorize;
use forge_core::ForgePaths;
use forge_session::{import_directory, search, shared, stats, ImportOptions, Provider};

use crate::output::OutputFormat;
use crate::theme::Theme;

fn parse_provider(raw: &str) -> anyhow::Result<Provider> {
    match raw {
        "claude" => Ok(Provider::Claude),
        "codex" => Ok(Provider::Codex),
        "gemini" => Ok(Provider::Gemini),
        other => anyhow::bail!("unknown provider {other:?} (expected claude|codex|gemini)"),
    }
}

pub(crate) fn run_import(
    provider: &str,
    path: &str,
    skip_existing: bool,
    skip_dead: bool,
    paths: &ForgePaths,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let provider = parse_provider(provider)?;
    let db = shared(paths)?;
    let options = ImportOptions {
        skip_existing,
        skip_dead,
        infer_titles: true,
    };
    let summary = import_directory(&db, provider, std::path::Path::new(path), options)?;

    if format.print_json_or_fallthrough(&summary) {
        return Ok(());
    }
    println!("{}", Theme::header("Import summary"));
    println!("  imported sessions: {}", summary.imported_sessions);
    println!("  imported turns: {}", summary.imported_turns);
    println!("  skipped (existing): {}", summary.skipped_existing);
    println!("  skipped (dead): {}", summary.skipped_dead);
    if !summary.errors.is_empty() {
        println!("{}", Theme::warning(&format!("{} transcript(s) failed to import:", summary.errors.len())));
        for error in &summary.errors {
            println!("    {error}");
        }
    }
    Ok(())
}

pub(crate) fn run_search(query: &str, paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    let db = shared(paths)?;
    let hits = search(&db, query)?;

    if format.print_json_or_fallthrough(&hits) {
        return Ok(());
    }
    if hits.is_empty() {
        println!("{}", Theme::info(&format!("No turns match {query:?}")));
        return Ok(());
    }
    println!("{}", Theme::header(&format!("Matches for {query:?}")));
    for hit in &hits {
        let title = hit.session_title.as_deref().unwrap_or("(untitled)");
        println!("  {} {title}", hit.session_id.cyan());
        println!("    {}", hit.user_highlight.dimmed());
    }
    Ok(())
}

pub(crate) fn run_stats(paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    let db = shared(paths)?;
    let summary = stats(&db)?;

    if format.print_json_or_fallthrough(&summary) {
        return Ok(());
    }
    println!("{}", Theme::header("Session database stats"));
    println!("  sessions: {}", summary.total_sessions);
    println!("  turns: {}", summary.total_turns);
    println!("  total cost (USD): {:.4}", summary.total_cost_usd);
    Ok(())
}
