//! Inspect a descriptor directory without a host framework
//!
//! Every `ADD_PANEL` key is served by a placeholder factory that mounts a
//! single `index` route, so the tool shows how dashboards, panels and
//! groups compose without the host's handler code.
//!
//! Usage:
//!   dashreg [--config <file>] [--dir <descriptors>] check
//!   dashreg routes
//!   dashreg tree
//!   dashreg resolve /project/overview/

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;

use dashboard_registry::utils::{init_logging, init_logging_from_config};
use dashboard_registry::{index_only, load_site, PanelFactories, RouteTarget, SiteConfig, SiteRouter};

#[derive(Parser, Debug)]
#[command(name = "dashreg", about = "Dashboard registry inspection tool")]
struct Args {
    /// Site configuration (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Descriptor directory; overrides `descriptors_dir` from the config
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Log filter (RUST_LOG takes precedence)
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load descriptors and report errors and warnings
    Check,
    /// Print the flattened route table
    Routes,
    /// Print the composed route tree as JSON
    Tree,
    /// Resolve a request path
    Resolve { path: String },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, base) = match &args.config {
        Some(path) => {
            let config = SiteConfig::from_file(path)?;
            let base = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            (config, base)
        }
        None => (SiteConfig::default(), PathBuf::from(".")),
    };
    if let Some(dir) = &args.dir {
        config.descriptors_dir = dir.to_string_lossy().into_owned();
    }

    match args.log.as_deref() {
        Some(filter) => init_logging(Some(filter)),
        None => init_logging_from_config(config.logging.as_ref()),
    }
    debug!("Configuration: {:?}", config);

    let factories = PanelFactories::new().with_fallback(index_only());
    let (site, report) = load_site(&config, &base, &factories)?;

    match args.command {
        Command::Check => {
            println!(
                "{} descriptors applied, {} skipped",
                report.applied.len(),
                report.skipped.len()
            );
            for slug in site.enumerate_dashboards() {
                println!("dashboard {}: {}", slug, site.enumerate_panels(slug.as_str()).len());
            }
            let composed = site.route_table();
            for warning in report.warnings.iter().chain(composed.warnings.iter()) {
                println!("warning: {}", warning);
            }
            if !report.contributions.is_empty() {
                println!(
                    "host contributions: {}",
                    serde_json::to_string(&report.contributions)?
                );
            }
        }
        Command::Routes => {
            for entry in site.route_table().routes() {
                let target = match &entry.target {
                    RouteTarget::Handler { handler } => handler.to_string(),
                    RouteTarget::Redirect { location } => format!("-> {}", location),
                };
                println!(
                    "{:<48} {:<32} {}",
                    entry.path,
                    entry.name.as_deref().unwrap_or("-"),
                    target
                );
            }
        }
        Command::Tree => {
            println!("{}", site.route_table().to_json()?);
        }
        Command::Resolve { path } => {
            let router = SiteRouter::new(site);
            let resolved = router
                .resolve(&path)
                .with_context(|| format!("No route matches {}", path))?;
            match &resolved.target {
                RouteTarget::Handler { handler } => println!("handler: {}", handler),
                RouteTarget::Redirect { location } => println!("redirect: {}", location),
            }
            if let Some(name) = resolved.qualified_name() {
                println!("name: {}", name);
            }
            for (key, value) in &resolved.kwargs {
                println!("{} = {}", key, value);
            }
            let permissions: Vec<&str> = resolved.permissions.iter().map(|p| p.as_str()).collect();
            if !permissions.is_empty() {
                println!("permissions: {}", permissions.join(", "));
            }
        }
    }

    Ok(())
}
