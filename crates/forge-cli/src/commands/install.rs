//! `install`, `uninstall`, `update`, `update-all`, and `list` commands.

use colored::Colorize;
use forge_core::ForgePaths;
use forge_installer::{install, install_from_local, list_installed, uninstall, update, update_all, InstallOptions, InstallOutcome, Phase, ProgressEvent};
use forge_registry::RegistryClient;
use indicatif::{ProgressBar, ProgressStyle};

use crate::output::OutputFormat;
use crate::theme::Theme;

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
    bar.enable_steady_tick(std::time::Duration::from_millis(100));
    bar
}

fn phase_message(event: &ProgressEvent) -> String {
    let verb = match event.phase {
        Phase::Resolving => "resolving",
        Phase::Downloading => "downloading",
        Phase::Extracting => "extracting",
        Phase::Installing => "installing",
        Phase::Lockfile => "writing lockfile for",
        Phase::Installed => "installed",
    };
    format!("{verb} {}", event.package)
}

pub(crate) async fn run_install(
    id: &str,
    local: Option<&str>,
    force: bool,
    paths: &ForgePaths,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(source) = local {
        let record = install_from_local(std::path::Path::new(source), paths)?;
        if !format.print_json_or_fallthrough(&record) {
            println!("{}", Theme::success(&format!("installed {} from {source}", record.id)));
        }
        return Ok(());
    }

    let client = RegistryClient::new(paths.clone());
    let bar = progress_bar();
    let on_progress = |event: ProgressEvent| bar.set_message(phase_message(&event));
    let options = InstallOptions {
        force,
        on_progress: Some(&on_progress),
    };
    let outcome = install(id, paths, &client, &forge_installer::SystemCommandRunner, options).await?;
    bar.finish_and_clear();

    print_outcome(&outcome, format);
    Ok(())
}

pub(crate) fn run_uninstall(id: &str, paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    uninstall(id, paths)?;
    if !format.print_json_or_fallthrough(&serde_json::json!({"id": id, "uninstalled": true})) {
        println!("{}", Theme::success(&format!("uninstalled {id}")));
    }
    Ok(())
}

pub(crate) async fn run_update(id: &str, paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    let client = RegistryClient::new(paths.clone());
    let bar = progress_bar();
    let on_progress = |event: ProgressEvent| bar.set_message(phase_message(&event));
    let outcome = update(id, paths, &client, &forge_installer::SystemCommandRunner, Some(&on_progress)).await?;
    bar.finish_and_clear();
    print_outcome(&outcome, format);
    Ok(())
}

pub(crate) async fn run_update_all(paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    let client = RegistryClient::new(paths.clone());
    let bar = progress_bar();
    let on_progress = |event: ProgressEvent| bar.set_message(phase_message(&event));
    let outcomes = update_all(paths, &client, &forge_installer::SystemCommandRunner, Some(&on_progress)).await?;
    bar.finish_and_clear();

    if format.print_json_or_fallthrough(&outcomes) {
        return Ok(());
    }
    println!("{}", Theme::header("Update summary"));
    for outcome in &outcomes {
        print_outcome(outcome, format);
    }
    Ok(())
}

fn print_outcome(outcome: &InstallOutcome, format: OutputFormat) {
    if format.print_json_or_fallthrough(outcome) {
        return;
    }
    if outcome.success {
        if outcome.already_installed {
            println!("{}", Theme::info(&format!("{} already installed", outcome.id)));
        } else {
            println!("{}", Theme::success(&format!("installed {}", outcome.id)));
        }
    } else {
        let reason = outcome.error.as_deref().unwrap_or("unknown error");
        println!("{}", Theme::error(&format!("{} failed: {reason}", outcome.id)));
    }
}

pub(crate) fn run_list(paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    let records = list_installed(paths)?;
    if format.print_json_or_fallthrough(&records) {
        return Ok(());
    }
    if records.is_empty() {
        println!("{}", Theme::info("No packages installed"));
        return Ok(());
    }

    println!("{}", Theme::header("Installed packages"));
    println!("{:>8} {:<28} {:<12} {}", "KIND".dimmed(), "ID".dimmed(), "VERSION".dimmed(), "INSTALLED".dimmed());
    println!("{}", Theme::separator());
    for record in &records {
        println!(
            "{:>8} {:<28} {:<12} {}",
            format!("{:?}", record.kind).to_lowercase(),
            record.id,
            record.version,
            record.installed_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
