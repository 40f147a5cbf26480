//! Read paths over the catalog plus `refresh`, `status` and `sync`.

use {
    anyhow::{Context, Result},
    jfp_config::JfpConfig,
    jfp_registry::{
        BackgroundRefresh, EnvAuthorizer, LibrarySync, Prompt, PromptFilter, RegistryLoadResult,
        RegistryLoader, RegistrySource,
    },
    serde::Serialize,
    tracing::debug,
};

use crate::{
    VERSION,
    output::{BOLD, CYAN, DIM, RESET, print_json, print_warnings},
    skill_commands,
};

/// Load the catalog. Fallback warnings go to stderr in every output mode so
/// `--json` stdout stays a single document.
pub(crate) async fn load(config: &JfpConfig) -> Result<RegistryLoadResult> {
    let loader = RegistryLoader::new(config, VERSION).context("cannot set up catalog client")?;
    let result = loader.load().await;
    debug!(
        source = %result.source,
        prompts = result.registry.prompts.len(),
        stale = result.stale,
        "catalog loaded"
    );
    print_warnings(&result.warnings);
    Ok(result)
}

/// Give a background refresh the chance to land its cache write before exit.
pub(crate) async fn settle(refresh: Option<BackgroundRefresh>) {
    let Some(refresh) = refresh else {
        return;
    };
    match refresh.finish().await {
        Some(summary) => debug!(
            source = %summary.source,
            prompts = summary.prompt_count,
            "background refresh finished"
        ),
        None => debug!("background refresh did not finish"),
    }
}

#[derive(Serialize)]
struct PromptRow<'a> {
    id: &'a str,
    title: &'a str,
    category: Option<&'a str>,
    tags: &'a [String],
    featured: bool,
    local: bool,
}

impl<'a> From<&'a Prompt> for PromptRow<'a> {
    fn from(p: &'a Prompt) -> Self {
        Self {
            id: &p.id,
            title: &p.title,
            category: p.category.as_deref(),
            tags: &p.tags,
            featured: p.featured,
            local: p.is_local,
        }
    }
}

pub(crate) async fn list(
    config: &JfpConfig,
    json: bool,
    category: Option<&str>,
    tag: Option<&str>,
    featured: bool,
) -> Result<bool> {
    let mut loaded = load(config).await?;
    let prompts = loaded.registry.filter(&PromptFilter {
        category,
        tag,
        featured_only: featured,
    });

    if json {
        let rows: Vec<PromptRow<'_>> = prompts.iter().map(|p| PromptRow::from(*p)).collect();
        print_json(&rows)?;
    } else if prompts.is_empty() {
        println!("No prompts match.");
    } else {
        let width = prompts.iter().map(|p| p.id.len()).max().unwrap_or(0);
        for p in &prompts {
            let category = p.category.as_deref().unwrap_or("-");
            let marker = if p.is_local {
                " (local)"
            } else {
                ""
            };
            println!(
                "{BOLD}{:<width$}{RESET}  {}{marker} {DIM}[{category}]{RESET}",
                p.id, p.title
            );
        }
        println!("{DIM}{} prompt(s), source: {}{RESET}", prompts.len(), loaded.source);
    }

    settle(loaded.background_refresh.take()).await;
    Ok(true)
}

pub(crate) async fn show(config: &JfpConfig, json: bool, id: &str, raw: bool) -> Result<bool> {
    let mut loaded = load(config).await?;
    let found = match loaded.registry.get_prompt(id) {
        Some(prompt) if json => {
            print_json(prompt)?;
            true
        },
        Some(prompt) if raw => {
            println!("{}", prompt.content);
            true
        },
        Some(prompt) => {
            println!("{BOLD}{}{RESET} {DIM}({}){RESET}", prompt.title, prompt.id);
            if let Some(desc) = &prompt.description {
                println!("{desc}");
            }
            if let Some(cat) = &prompt.category {
                println!("{DIM}category:{RESET} {cat}");
            }
            if !prompt.tags.is_empty() {
                println!("{DIM}tags:{RESET} {}", prompt.tags.join(", "));
            }
            println!("{DIM}version:{RESET} {}\n", prompt.version_or_default());
            println!("{}", prompt.content);
            true
        },
        None => {
            eprintln!("prompt '{id}' not found");
            false
        },
    };
    settle(loaded.background_refresh.take()).await;
    Ok(found)
}

pub(crate) async fn bundles(config: &JfpConfig, json: bool) -> Result<bool> {
    let mut loaded = load(config).await?;
    let registry = &loaded.registry;

    if json {
        print_json(&registry.bundles)?;
    } else if registry.bundles.is_empty() {
        println!("No bundles.");
    } else {
        for bundle in &registry.bundles {
            let resolved = registry.prompts_for_bundle(bundle).len();
            println!(
                "{BOLD}{}{RESET}  {} {DIM}v{} · {resolved} prompt(s){RESET}",
                bundle.id,
                bundle.title,
                bundle.version_or_default()
            );
            if let Some(desc) = &bundle.description {
                println!("  {DIM}{desc}{RESET}");
            }
        }
    }
    settle(loaded.background_refresh.take()).await;
    Ok(true)
}

pub(crate) async fn categories(config: &JfpConfig, json: bool) -> Result<bool> {
    let mut loaded = load(config).await?;
    print_counts(json, &loaded.registry.categories())?;
    settle(loaded.background_refresh.take()).await;
    Ok(true)
}

pub(crate) async fn tags(config: &JfpConfig, json: bool) -> Result<bool> {
    let mut loaded = load(config).await?;
    print_counts(json, &loaded.registry.tags())?;
    settle(loaded.background_refresh.take()).await;
    Ok(true)
}

fn print_counts(json: bool, counts: &[(String, usize)]) -> Result<()> {
    if json {
        #[derive(Serialize)]
        struct Row<'a> {
            name: &'a str,
            count: usize,
        }
        let rows: Vec<_> = counts
            .iter()
            .map(|(name, count)| Row { name, count: *count })
            .collect();
        return print_json(&rows);
    }
    for (name, count) in counts {
        println!("{name:<24} {count}");
    }
    Ok(())
}

pub(crate) async fn refresh(config: &JfpConfig, json: bool) -> Result<bool> {
    let loader = RegistryLoader::new(config, VERSION).context("cannot set up catalog client")?;
    let result = loader.refresh().await;
    let ok = result.warnings.is_empty();

    if json {
        #[derive(Serialize)]
        struct Refreshed<'a> {
            source: RegistrySource,
            prompts: usize,
            bundles: usize,
            local: usize,
            warnings: &'a [String],
        }
        print_json(&Refreshed {
            source: result.source,
            prompts: result.registry.prompts.len(),
            bundles: result.registry.bundles.len(),
            local: result.local_count,
            warnings: &result.warnings,
        })?;
    } else {
        print_warnings(&result.warnings);
        let what = match result.source {
            RegistrySource::Remote => "catalog updated",
            RegistrySource::Cache if ok => "catalog already up to date",
            RegistrySource::Cache => "kept cached catalog",
            RegistrySource::Bundled => "using bundled catalog",
        };
        println!(
            "{what}: {} prompt(s), {} bundle(s)",
            result.registry.prompts.len(),
            result.registry.bundles.len()
        );
    }
    Ok(ok)
}

pub(crate) fn status(config: &JfpConfig, json: bool) -> Result<bool> {
    let loader = RegistryLoader::new(config, VERSION).context("cannot set up catalog client")?;
    let status = loader.status();
    let roots = skill_commands::root_summaries(config)?;

    if json {
        #[derive(Serialize)]
        struct Status<'a> {
            registry: &'a jfp_registry::RegistryStatus,
            roots: &'a [skill_commands::RootSummary],
        }
        print_json(&Status {
            registry: &status,
            roots: &roots,
        })?;
        return Ok(true);
    }

    println!("{BOLD}Catalog{RESET}");
    println!("  url:        {}", status.url);
    println!("  cache:      {}", status.cache_dir.display());
    match &status.meta {
        Some(meta) if status.cached => {
            let age = status.age_secs.unwrap_or_default();
            let freshness = if status.stale {
                "stale"
            } else {
                "fresh"
            };
            println!(
                "  cached:     {} prompt(s), fetched {age}s ago ({freshness}, ttl {}s)",
                meta.prompt_count, status.ttl_secs
            );
            if let Some(etag) = &meta.etag {
                println!("  etag:       {etag}");
            }
        },
        _ => println!("  cached:     no (bundled snapshot until first fetch)"),
    }
    match (&status.library_path, status.library_prompts) {
        (Some(path), Some(count)) => {
            println!("  library:    {count} prompt(s) at {}", path.display())
        },
        _ => println!("  library:    not downloaded"),
    }
    if let Some(dir) = &status.local_dir {
        println!("  local:      {}", dir.display());
    }

    println!("\n{BOLD}Installed skills{RESET}");
    for root in &roots {
        println!(
            "  {CYAN}{:<9}{RESET} {} skill(s) at {}",
            root.label,
            root.installed,
            root.path.display()
        );
    }
    Ok(true)
}

pub(crate) async fn sync(config: &JfpConfig, json: bool) -> Result<bool> {
    let sync = LibrarySync::new(
        config.registry.library_url.clone(),
        config.registry.resolved_cache_dir(),
        std::time::Duration::from_millis(config.registry.timeout_ms),
        VERSION,
    )
    .context("cannot set up library client")?;
    let report = sync
        .download(&EnvAuthorizer)
        .await
        .context("library sync failed")?;

    if json {
        print_json(&report)?;
    } else {
        println!(
            "Library synced: {} prompt(s), {} bundle(s) → {}",
            report.prompt_count,
            report.bundle_count,
            report.path.display()
        );
    }
    Ok(true)
}
