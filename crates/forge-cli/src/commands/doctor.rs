//! `doctor` — system health checks (spec.md §6, ambient diagnostics).

use colored::Colorize;
use forge_core::ForgePaths;

pub(crate) fn run_doctor(paths: &ForgePaths) -> anyhow::Result<()> {
    println!("{}", "Forge Doctor - System Health Check".cyan().bold());
    println!();

    print!("  Checking home directory... ");
    if paths.root().is_dir() {
        println!("{}", "OK".green());
        println!("    {}", paths.root().display());
    } else {
        println!("{}", "WARN".yellow());
        println!("    {} does not exist yet (run any install command to create it)", paths.root().display());
    }

    print!("  Checking central config... ");
    match forge_config::init_config(paths) {
        Ok(config) => {
            println!("{}", "OK".green());
            println!(
                "    stacks: {}  runtimes: {}  binaries: {}  secrets: {}",
                config.stacks.len(),
                config.runtimes.len(),
                config.binaries.len(),
                config.secrets.len()
            );
        }
        Err(e) => println!("{} ({e})", "FAIL".red()),
    }

    print!("  Checking installed packages against manifest.json... ");
    match forge_installer::list_installed(paths) {
        Ok(records) => {
            let mut drift = Vec::new();
            for record in &records {
                let manifest_path = paths.install_dir(record.kind, &record.name).join("manifest.json");
                if !manifest_path.is_file() {
                    drift.push(record.id.clone());
                }
            }
            if drift.is_empty() {
                println!("{} ({} packages)", "OK".green(), records.len());
            } else {
                println!("{}", "WARN".yellow());
                for id in &drift {
                    println!("    missing manifest.json: {id}");
                }
            }
        }
        Err(e) => println!("{} ({e})", "FAIL".red()),
    }

    print!("  Checking session database... ");
    match forge_session::shared(paths) {
        Ok(db) => match forge_session::stats(&db) {
            Ok(stats) => println!("{} ({} sessions, {} turns)", "OK".green(), stats.total_sessions, stats.total_turns),
            Err(e) => println!("{} ({e})", "WARN".yellow()),
        },
        Err(e) => println!("{} ({e})", "FAIL".red()),
    }

    print!("  Checking registered agent clients... ");
    let summary = forge_agents::get_mcp_registration_summary(None);
    println!("{} ({} agent clients known)", "OK".green(), summary.len());

    println!();
    println!("{}", "Doctor finished.".green().bold());
    Ok(())
}
