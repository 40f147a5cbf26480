use {anyhow::Result, clap::Subcommand, jfp_config::JfpConfig, serde::Serialize};

use crate::output::print_json;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file path in use (or where one would be created).
    Path,
    /// Print the effective configuration.
    Show,
    /// Write a config file with every default spelled out.
    Init {
        /// Replace an existing config file.
        #[arg(long)]
        force: bool,
    },
}

pub(crate) fn handle_config(action: ConfigAction, config: &JfpConfig, json: bool) -> Result<bool> {
    match action {
        ConfigAction::Path => {
            let found = jfp_config::find_config_file();
            let path = found
                .clone()
                .unwrap_or_else(jfp_config::find_or_default_config_path);
            if json {
                #[derive(Serialize)]
                struct ConfigPath {
                    path: std::path::PathBuf,
                    exists: bool,
                    config_dir: std::path::PathBuf,
                    cache_dir: std::path::PathBuf,
                }
                print_json(&ConfigPath {
                    path,
                    exists: found.is_some(),
                    config_dir: jfp_config::config_dir(),
                    cache_dir: config.registry.resolved_cache_dir(),
                })?;
            } else {
                println!("{}", path.display());
                if found.is_none() {
                    eprintln!("(not created yet; defaults are in effect)");
                }
            }
        },
        ConfigAction::Show => {
            if json {
                print_json(config)?;
            } else {
                print!("{}", toml::to_string_pretty(config)?);
            }
        },
        ConfigAction::Init { force } => {
            if let Some(existing) = jfp_config::find_config_file()
                && !force
            {
                eprintln!(
                    "{} already exists; pass --force to overwrite it",
                    existing.display()
                );
                return Ok(false);
            }
            let path = jfp_config::save_config(&JfpConfig::default())?;
            if json {
                print_json(&serde_json::json!({ "path": path }))?;
            } else {
                println!("Wrote {}", path.display());
            }
        },
    }
    Ok(true)
}
