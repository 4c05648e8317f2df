use std::io::IsTerminal;
use std::path::Path;
use std::process::Command;
use anyhow::{Context, Result, bail};
use chrono::Utc;
use colored::{Color, Colorize};
use dialoguer::{Confirm, Input};
use graft::config::{Aliases, InitOptions, ProjectConfig, init_project};
use graft::error::GraftError;
use graft::installer::{
    ConflictResolver, FileOutcome, InstallContext, InstallReport, KeepExisting, Overwrite, install_units,
    missing_packages, project_status,
};
use graft::provenance::Drift;
use graft::registry::{InstallUnit, Registry, RegistrySource, load_registry};
use graft::resolver::{Resolution, build_tree, resolve};
use graft::transform::TextTransformer;
use graft::util::{PackageManager, get_config_path};
use tracing::warn;
use crate::cli::{CLI, GraftCommand};

pub fn execute(cli: CLI) -> Result<()> {
    let root = match cli.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()?,
    };
    let registry = cli.registry;
    match cli.command {
        GraftCommand::Init { yes, model, components_alias, lib_alias } => {
            execute_init(&root, registry, yes, model, components_alias, lib_alias)
        }
        GraftCommand::Add { names, category, force, yes } => {
            execute_add(&root, registry.as_deref(), names, category, force, yes)
        }
        GraftCommand::Bootstrap { force, skip_install } => {
            execute_bootstrap(&root, registry, force, skip_install)
        }
        GraftCommand::Tree { name, json, depth } => {
            execute_tree(&root, registry.as_deref(), &name, json, depth)
        }
        GraftCommand::List { category, json } => {
            execute_list(&root, registry.as_deref(), category, json)
        }
        GraftCommand::Status { json } => {
            execute_status(&root, registry.as_deref(), json)
        }
    }
}

fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

fn load_project(root: &Path) -> Result<ProjectConfig> {
    let path = get_config_path(root);
    if !path.exists() {
        bail!("graft.json not found in {}. Run `graft init` to create one.", root.display())
    }
    Ok(ProjectConfig::load(path)?)
}

/// Picks the registry: the `--registry` flag, then the project's recorded source.
fn registry_source(root: &Path, flag: Option<&str>, config: Option<&ProjectConfig>) -> Result<RegistrySource> {
    let source = flag
        .map(str::to_string)
        .or_else(|| config.and_then(|c| c.registry.clone()))
        .ok_or_else(|| GraftError::registry_load("(none)", "no registry source configured"))?;
    Ok(RegistrySource::parse(&source, root))
}

fn open_registry(root: &Path, flag: Option<&str>, config: Option<&ProjectConfig>) -> Result<(RegistrySource, Registry)> {
    let source = registry_source(root, flag, config)?;
    let registry = load_registry(&source)?;
    Ok((source, registry))
}

pub fn execute_init(
    root: &Path,
    registry: Option<String>,
    yes: bool,
    model: Option<String>,
    components_alias: Option<String>,
    lib_alias: Option<String>,
) -> Result<()> {
    let defaults = Aliases::default();
    let prompt = !yes && interactive() && !get_config_path(root).exists();
    let mut aliases = Aliases {
        components: components_alias.unwrap_or(defaults.components),
        lib: lib_alias.unwrap_or(defaults.lib),
    };
    if prompt {
        aliases.components = Input::<String>::new()
            .with_prompt("Import alias for components")
            .default(aliases.components)
            .interact_text()?;
        aliases.lib = Input::<String>::new()
            .with_prompt("Import alias for library modules")
            .default(aliases.lib)
            .interact_text()?;
    }
    let options = InitOptions { model, aliases, registry };
    let config = init_project(root, &options)?;
    println!("{} {}", "Initialized".green().bold(), get_config_path(root).display());
    println!("  components: {} -> {}", config.aliases.components, config.unit_dir(root, graft::UnitKind::Component).display());
    println!("  lib:        {} -> {}", config.aliases.lib, config.unit_dir(root, graft::UnitKind::Lib).display());
    if config.registry.is_none() {
        println!("  {}", "no registry recorded; pass --registry to `graft add`".dimmed());
    }
    Ok(())
}

/// Asks before overwriting each conflicting file.
struct PromptResolver;

impl ConflictResolver for PromptResolver {
    fn confirm_overwrite(&mut self, path: &Path, drift: &Drift) -> bool {
        let answer = Confirm::new()
            .with_prompt(format!("Overwrite {} ({})?", path.display(), drift.describe()))
            .default(false)
            .interact();
        match answer {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "prompt failed, keeping existing file");
                false
            }
        }
    }
}

fn conflict_resolver(force: bool, yes: bool) -> Box<dyn ConflictResolver> {
    if force {
        Box::new(Overwrite)
    } else if yes || !interactive() {
        Box::new(KeepExisting)
    } else {
        Box::new(PromptResolver)
    }
}

/// Installs the units and commits the project config. Returns the report
/// together with whether the config was saved.
fn run_install(
    root: &Path,
    source: &RegistrySource,
    registry: &Registry,
    config: &mut ProjectConfig,
    units: &[InstallUnit<'_>],
    force: bool,
    yes: bool,
) -> Result<(InstallReport, bool)> {
    let transformer = TextTransformer::default();
    let now = Utc::now();
    let mut resolver = conflict_resolver(force, yes);
    let report = {
        let ctx = InstallContext {
            registry,
            source,
            transformer: &transformer,
            config: &*config,
            project_root: root,
            now,
        };
        install_units(&ctx, units, resolver.as_mut())
    };
    let committed = report.commit(config, &get_config_path(root), registry, &source.to_string(), now)?;
    Ok((report, committed))
}

fn print_resolution_warnings(resolution: &Resolution<'_>) {
    for missing in &resolution.not_found {
        let mut line = format!("{} component `{}` not found", "warning:".yellow().bold(), missing.name);
        if !missing.suggestions.is_empty() {
            line.push_str(&format!(" (did you mean: {}?)", missing.suggestions.join(", ")));
        }
        println!("{line}");
    }
    for dep in &resolution.unresolved {
        println!(
            "{} `{}` depends on unknown {} `{}`, skipped",
            "warning:".yellow().bold(),
            dep.from,
            dep.kind,
            dep.name
        );
    }
}

fn print_report(root: &Path, report: &InstallReport) {
    for unit in &report.units {
        let label = format!("{}@{}", unit.name, unit.version);
        if let Some(err) = &unit.error {
            println!("{} {label} ({}): {err}", "✗".red().bold(), unit.kind);
            continue;
        }
        let conflicts: Vec<_> = unit.conflicts().collect();
        if !conflicts.is_empty() {
            println!("{} {label} ({}): {} file(s) kept", "!".yellow().bold(), unit.kind, conflicts.len());
            for (path, drift) in conflicts {
                let conflict = GraftError::WriteConflict {
                    path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
                    reason: drift.describe(),
                };
                println!("    {conflict}");
                if let Some(hint) = conflict.hint() {
                    println!("    {}", hint.dimmed());
                }
            }
            continue;
        }
        let changed = unit
            .files
            .iter()
            .any(|f| matches!(f, FileOutcome::Written(_) | FileOutcome::Overwritten(_)));
        if changed {
            println!("{} {label} ({})", "✓".green().bold(), unit.kind);
        } else {
            println!("{} {label} ({}) up to date", "·".dimmed(), unit.kind);
        }
    }
    println!(
        "{} written, {} up to date, {} conflict(s)",
        report.written_count(),
        report.up_to_date_count(),
        report.conflict_count()
    );
}

/// Fails the command when any write failed, after everything was reported.
fn check_write_errors(report: &InstallReport, committed: bool) -> Result<()> {
    if !committed || report.has_write_errors() {
        let failed: Vec<_> = report.failed().map(|u| u.name.as_str()).collect();
        bail!(
            "write errors while installing {}; graft.json was left unchanged",
            failed.join(", ")
        );
    }
    Ok(())
}

pub fn execute_add(
    root: &Path,
    registry: Option<&str>,
    mut names: Vec<String>,
    category: Option<String>,
    force: bool,
    yes: bool,
) -> Result<()> {
    let mut config = load_project(root)?;
    let (source, registry) = open_registry(root, registry, Some(&config))?;
    if let Some(category) = &category {
        let in_category = registry.components_in_category(category);
        if in_category.is_empty() {
            bail!("no components in category `{category}`");
        }
        names.extend(in_category.iter().map(|c| c.name.clone()));
    }
    if names.is_empty() {
        bail!("nothing to add; name at least one component or pass --category");
    }

    let resolution = resolve(&registry, &names);
    print_resolution_warnings(&resolution);
    if resolution.is_empty() {
        if let Some(first) = resolution.not_found.into_iter().next() {
            return Err(GraftError::from(first).into());
        }
        bail!("nothing to install");
    }

    let (report, committed) = run_install(root, &source, &registry, &mut config, resolution.units(), force, yes)?;
    print_report(root, &report);

    let missing = missing_packages(root, &resolution.external_packages)?;
    if !missing.is_empty() {
        let manager = PackageManager::detect(root);
        println!("{} {}", "next:".cyan().bold(), manager.install_command(&missing));
    }
    check_write_errors(&report, committed)
}

pub fn execute_bootstrap(root: &Path, registry: Option<String>, force: bool, skip_install: bool) -> Result<()> {
    if !get_config_path(root).exists() {
        let options = InitOptions { registry: registry.clone(), ..InitOptions::default() };
        init_project(root, &options)?;
        println!("{} {}", "Initialized".green().bold(), get_config_path(root).display());
    }
    let mut config = load_project(root)?;
    let (source, registry) = open_registry(root, registry.as_deref(), Some(&config))?;
    let names: Vec<&str> = registry.components.iter().map(|c| c.name.as_str()).collect();
    let resolution = resolve(&registry, &names);
    print_resolution_warnings(&resolution);

    let (report, committed) = run_install(root, &source, &registry, &mut config, resolution.units(), force, true)?;
    print_report(root, &report);
    check_write_errors(&report, committed)?;

    let missing = missing_packages(root, &resolution.external_packages)?;
    if missing.is_empty() {
        return Ok(());
    }
    let manager = PackageManager::detect(root);
    if skip_install {
        println!("{} {}", "next:".cyan().bold(), manager.install_command(&missing));
        return Ok(());
    }
    println!("{} {}", "running".cyan().bold(), manager.install_command(&missing));
    let status = Command::new(manager.program())
        .args(manager.add_args(&missing))
        .current_dir(root)
        .status()
        .with_context(|| format!("failed to run {}", manager.program()))?;
    if !status.success() {
        bail!("{} exited with {status}", manager.program());
    }
    Ok(())
}

/// The project config when there is one; tree and list also work outside a project.
fn optional_project(root: &Path) -> Result<Option<ProjectConfig>> {
    let path = get_config_path(root);
    if path.exists() {
        Ok(Some(ProjectConfig::load(path)?))
    } else {
        Ok(None)
    }
}

pub fn execute_tree(root: &Path, registry: Option<&str>, name: &str, json: bool, depth: usize) -> Result<()> {
    let config = optional_project(root)?;
    let (_, registry) = open_registry(root, registry, config.as_ref())?;
    let tree = build_tree(&registry, name, depth).map_err(GraftError::from)?;
    let packages = resolve(&registry, &[name]).external_packages;
    if json {
        let out = serde_json::json!({ "tree": tree, "externalPackages": packages });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    print!("{}", tree.render());
    if packages.is_empty() {
        return Ok(());
    }
    println!("{} {}", "packages:".bold(), packages.join(", "));
    if config.is_some() {
        let missing = missing_packages(root, &packages)?;
        if !missing.is_empty() {
            let manager = PackageManager::detect(root);
            println!("{} {}", "next:".cyan().bold(), manager.install_command(&missing));
        }
    }
    Ok(())
}

pub fn execute_list(root: &Path, registry: Option<&str>, category: Option<String>, json: bool) -> Result<()> {
    let config = optional_project(root)?;
    let (_, registry) = open_registry(root, registry, config.as_ref())?;
    let installed = |name: &str| {
        config
            .as_ref()
            .is_some_and(|c| c.is_installed(graft::UnitKind::Component, name))
    };
    let entries = match &category {
        Some(category) => registry.components_in_category(category),
        None => registry.components.iter().collect(),
    };

    if json {
        let list: Vec<_> = entries
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "title": c.title,
                    "category": c.category,
                    "version": c.version,
                    "installed": installed(&c.name),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No components");
        return Ok(());
    }
    let mut categories: Vec<&str> = entries.iter().map(|c| c.category.as_str()).collect();
    categories.sort();
    categories.dedup();
    for cat in categories {
        let heading = if cat.is_empty() { "uncategorized" } else { cat };
        println!("{}", heading.bold());
        for entry in entries.iter().filter(|c| c.category == cat) {
            let mark = if installed(&entry.name) { "✓".green().to_string() } else { " ".to_string() };
            println!("  {mark} {} {}", entry.name, entry.version.dimmed());
        }
    }
    Ok(())
}

pub fn execute_status(root: &Path, registry: Option<&str>, json: bool) -> Result<()> {
    let config = load_project(root)?;
    let (_, registry) = open_registry(root, registry, Some(&config))?;
    let files = project_status(root, &config, &registry)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }
    if files.is_empty() {
        println!("No installed files");
        return Ok(());
    }
    let mut attention = 0;
    for file in &files {
        let (label, color) = match &file.drift {
            Drift::UpToDate { modified: false } => ("up to date", Color::Green),
            Drift::UpToDate { modified: true } => ("modified", Color::Yellow),
            Drift::Outdated { .. } | Drift::Ahead { .. } => ("outdated", Color::Yellow),
            Drift::Untracked => ("untracked", Color::BrightBlack),
        };
        if !matches!(file.drift, Drift::UpToDate { modified: false } | Drift::Untracked) {
            attention += 1;
        }
        println!(
            "{} {}  {}",
            format!("{label:<12}").color(color),
            file.path.display(),
            file.drift.describe().dimmed()
        );
    }
    println!("{} file(s), {attention} need attention", files.len());
    Ok(())
}
