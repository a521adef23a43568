//! `config show`, `config validate`, and `config paths` commands.

use colored::Colorize;
use forge_core::ForgePaths;

use crate::output::OutputFormat;
use crate::theme::Theme;

pub(crate) fn run_show(paths: &ForgePaths, format: OutputFormat) -> anyhow::Result<()> {
    let config = forge_config::init_config(paths)?;
    if format.print_json_or_fallthrough(&config) {
        return Ok(());
    }
    println!("{}", Theme::header("Central configuration"));
    println!("  schema version: {}", config.schema_version);
    println!("  runtimes: {}", config.runtimes.len());
    println!("  stacks: {}", config.stacks.len());
    println!("  binaries: {}", config.binaries.len());
    println!("  secrets: {}", config.secrets.len());
    Ok(())
}

pub(crate) fn run_validate(paths: &ForgePaths) -> anyhow::Result<()> {
    match forge_config::init_config(paths) {
        Ok(config) => {
            println!("{}", Theme::success("config document is valid"));
            for (name, secret) in &config.secrets {
                if secret.required && !secret.configured {
                    println!("{}", Theme::warning(&format!("required secret {name} is not yet configured")));
                }
            }
            Ok(())
        }
        Err(e) => {
            println!("{}", Theme::error(&format!("config document is invalid: {e}")));
            Err(e.into())
        }
    }
}

pub(crate) fn run_paths(paths: &ForgePaths) {
    println!("{}", Theme::header("Resolved paths"));
    println!("  home:    {}", paths.root().display());
    println!("  config:  {}", paths.config_path().display());
    println!("  db:      {}", paths.db_path().display());
    println!("  cache:   {}", paths.cache_dir().display());
    println!("  secrets: {}", paths.secrets_path().display());
}
