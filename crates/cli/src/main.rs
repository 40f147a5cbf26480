mod config_commands;
mod doctor_commands;
mod export_commands;
mod output;
mod registry_commands;
mod skill_commands;

use std::{path::PathBuf, process::ExitCode};

use {
    clap::{CommandFactory, Parser, Subcommand},
    clap_complete::Shell,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "jfp",
    version,
    about = "Browse the JeffreysPrompts catalog and install prompts as skills"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print machine-readable JSON.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/jfp/).
    #[arg(long, global = true, env = "JFP_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Custom cache directory for the catalog and library downloads.
    #[arg(long, global = true, env = "JFP_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List prompts in the catalog.
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Only featured prompts.
        #[arg(long)]
        featured: bool,
    },
    /// Show one prompt.
    Show {
        id: String,
        /// Print only the prompt body.
        #[arg(long)]
        raw: bool,
    },
    /// List bundles.
    Bundles,
    /// List categories with prompt counts.
    Categories,
    /// List tags with prompt counts.
    Tags,
    /// Revalidate the cached catalog now.
    Refresh,
    /// Catalog cache and install status.
    Status,
    /// Install prompts or a bundle as skills.
    Install {
        /// Prompt or bundle ids.
        ids: Vec<String>,
        /// Install every prompt in the catalog.
        #[arg(long, conflicts_with_all = ["ids", "bundle"])]
        all: bool,
        /// Install one bundle as a combined skill.
        #[arg(long, conflicts_with = "ids")]
        bundle: Option<String>,
        #[command(flatten)]
        target: skill_commands::TargetArgs,
        #[command(flatten)]
        opts: skill_commands::SyncArgs,
    },
    /// Update installed skills from the catalog.
    Update {
        /// Only the project root.
        #[arg(long, conflicts_with = "personal")]
        project: bool,
        /// Only the personal root.
        #[arg(long)]
        personal: bool,
        #[command(flatten)]
        opts: skill_commands::SyncArgs,
        /// Include a line diff for updated skills.
        #[arg(long)]
        diff: bool,
    },
    /// Remove installed skills.
    Uninstall {
        #[arg(required = true)]
        ids: Vec<String>,
        #[command(flatten)]
        target: skill_commands::TargetArgs,
        #[command(flatten)]
        opts: skill_commands::SyncArgs,
    },
    /// List installed skills.
    Installed {
        #[command(flatten)]
        target: skill_commands::TargetArgs,
    },
    /// Write prompts to markdown files or stdout.
    Export {
        /// Prompt ids; none (or `all`) exports the whole catalog.
        ids: Vec<String>,
        #[arg(long, short, value_enum, default_value = "md")]
        format: export_commands::ExportFormat,
        /// Directory for the exported files.
        #[arg(long, short, default_value = ".")]
        output_dir: PathBuf,
        /// Print to stdout instead of writing files.
        #[arg(long, conflicts_with = "output_dir")]
        stdout: bool,
    },
    /// Download the full library (requires JFP_TOKEN).
    Sync,
    /// Check configuration and install roots.
    Doctor,
    /// Configuration helpers.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Print a shell completion script.
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(ref dir) = cli.config_dir {
        jfp_config::set_config_dir(dir.clone());
    }
    if let Some(ref dir) = cli.cache_dir {
        jfp_config::set_cache_dir(dir.clone());
    }
    let config = jfp_config::discover_and_load();
    let json = cli.json || config.output.json;
    debug!(version = VERSION, json, "jfp starting");

    let ok = match cli.command {
        Commands::List {
            category,
            tag,
            featured,
        } => {
            registry_commands::list(&config, json, category.as_deref(), tag.as_deref(), featured)
                .await?
        },
        Commands::Show { id, raw } => registry_commands::show(&config, json, &id, raw).await?,
        Commands::Bundles => registry_commands::bundles(&config, json).await?,
        Commands::Categories => registry_commands::categories(&config, json).await?,
        Commands::Tags => registry_commands::tags(&config, json).await?,
        Commands::Refresh => registry_commands::refresh(&config, json).await?,
        Commands::Status => registry_commands::status(&config, json)?,
        Commands::Sync => registry_commands::sync(&config, json).await?,
        Commands::Export {
            ids,
            format,
            output_dir,
            stdout,
        } => {
            let target = if stdout {
                export_commands::ExportTarget::Stdout
            } else {
                export_commands::ExportTarget::Dir(output_dir)
            };
            export_commands::export(&config, json, &ids, format, target).await?
        },
        Commands::Install {
            ids,
            all,
            bundle,
            target,
            opts,
        } => {
            let selection = skill_commands::selection(ids, all, bundle)?;
            skill_commands::install(&config, json, selection, target, opts).await?
        },
        Commands::Update {
            project,
            personal,
            opts,
            diff,
        } => skill_commands::update(&config, json, project, personal, opts, diff).await?,
        Commands::Uninstall { ids, target, opts } => {
            skill_commands::uninstall(&config, json, &ids, target, opts)?
        },
        Commands::Installed { target } => skill_commands::installed(&config, json, target)?,
        Commands::Doctor => doctor_commands::handle_doctor(&config, json)?,
        Commands::Config { action } => config_commands::handle_config(action, &config, json)?,
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "jfp", &mut std::io::stdout());
            true
        },
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
