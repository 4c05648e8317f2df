use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use crate::config::ProjectConfig;
use crate::error::{GraftError, Result};
use crate::provenance::{Drift, Provenance, classify, extract_origin, stamp};
use crate::registry::{InstallUnit, Registry, SourceProvider, UnitKind};
use crate::transform::{ImportTransformer, TransformContext};
use crate::util::{is_script, is_stylesheet, target_extension};

/// What to do with one target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteDecision {
    /// Nothing there yet.
    Write,
    /// Stamped with the current version; leave it.
    UpToDate,
    /// Untracked, or stamped with another version. Needs confirmation.
    Conflict(Drift),
}

/// Decides whether a target may be written, given its current content.
pub fn decide(existing: Option<&str>, current_version: &str) -> WriteDecision {
    match existing {
        None => WriteDecision::Write,
        Some(content) => match classify(content, current_version) {
            Drift::UpToDate { .. } => WriteDecision::UpToDate,
            drift => WriteDecision::Conflict(drift),
        },
    }
}

/// Answers whether a conflicting file may be overwritten.
pub trait ConflictResolver {
    fn confirm_overwrite(&mut self, path: &Path, drift: &Drift) -> bool;
}

/// Never overwrites; conflicts are reported.
pub struct KeepExisting;

impl ConflictResolver for KeepExisting {
    fn confirm_overwrite(&mut self, _path: &Path, _drift: &Drift) -> bool {
        false
    }
}

/// Overwrites every conflict (`--force`).
pub struct Overwrite;

impl ConflictResolver for Overwrite {
    fn confirm_overwrite(&mut self, path: &Path, drift: &Drift) -> bool {
        warn!(path = %path.display(), state = %drift.describe(), "overwriting");
        true
    }
}

/// Everything an install batch reads from.
pub struct InstallContext<'a> {
    pub registry: &'a Registry,
    pub source: &'a dyn SourceProvider,
    pub transformer: &'a dyn ImportTransformer,
    pub config: &'a ProjectConfig,
    pub project_root: &'a Path,
    pub now: DateTime<Utc>,
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Written(PathBuf),
    Overwritten(PathBuf),
    UpToDate(PathBuf),
    /// Left alone because overwriting was not confirmed.
    Conflict { path: PathBuf, drift: Drift },
}

/// Result of installing one component or library module.
#[derive(Debug)]
pub struct UnitReport {
    pub kind: UnitKind,
    pub name: String,
    pub version: String,
    pub files: Vec<FileOutcome>,
    /// The error that stopped this unit; later files were not attempted.
    pub error: Option<GraftError>,
}

impl UnitReport {
    /// Every file is written or already up to date.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
            && self
                .files
                .iter()
                .all(|f| !matches!(f, FileOutcome::Conflict { .. }))
    }

    pub fn conflicts(&self) -> impl Iterator<Item = (&Path, &Drift)> {
        self.files.iter().filter_map(|f| match f {
            FileOutcome::Conflict { path, drift } => Some((path.as_path(), drift)),
            _ => None,
        })
    }
}

/// Result of a whole batch, in install order.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub units: Vec<UnitReport>,
}

impl InstallReport {
    /// Any write failed. The config must not be committed then.
    pub fn has_write_errors(&self) -> bool {
        self.units
            .iter()
            .any(|u| matches!(u.error, Some(GraftError::WriteIo { .. })))
    }

    pub fn failed(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| u.error.is_some())
    }

    pub fn conflict_count(&self) -> usize {
        self.units.iter().map(|u| u.conflicts().count()).sum()
    }

    pub fn written_count(&self) -> usize {
        self.units
            .iter()
            .flat_map(|u| &u.files)
            .filter(|f| matches!(f, FileOutcome::Written(_) | FileOutcome::Overwritten(_)))
            .count()
    }

    pub fn up_to_date_count(&self) -> usize {
        self.units
            .iter()
            .flat_map(|u| &u.files)
            .filter(|f| matches!(f, FileOutcome::UpToDate(_)))
            .count()
    }

    /// Records complete units in the config and saves it.
    ///
    /// Returns `Ok(false)` without touching the config when any write in the
    /// batch failed, so a retry starts from the pre-batch state.
    pub fn commit(
        &self,
        config: &mut ProjectConfig,
        config_path: &Path,
        registry: &Registry,
        source_label: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if self.has_write_errors() {
            warn!("write errors in batch, project config left unchanged");
            return Ok(false);
        }
        for unit in self.units.iter().filter(|u| u.is_complete()) {
            match unit.kind {
                UnitKind::Component => config.record_component(&unit.name, &unit.version, source_label, now),
                UnitKind::Lib => config.record_lib(&unit.name),
            }
        }
        config.registry_version = registry.registry_version.clone();
        config.save(config_path)?;
        Ok(true)
    }
}

/// Installs units in the given order. A failing unit does not stop the ones after it.
pub fn install_units(
    ctx: &InstallContext<'_>,
    units: &[InstallUnit<'_>],
    resolver: &mut dyn ConflictResolver,
) -> InstallReport {
    let mut report = InstallReport::default();
    for unit in units {
        let unit_report = install_unit(ctx, unit, resolver);
        if let Some(err) = &unit_report.error {
            warn!(unit = %unit.name, kind = %unit.kind, error = %err, "install failed");
        }
        report.units.push(unit_report);
    }
    report
}

/// Installs one unit's files in mapping order, stopping at the first error.
pub fn install_unit(
    ctx: &InstallContext<'_>,
    unit: &InstallUnit<'_>,
    resolver: &mut dyn ConflictResolver,
) -> UnitReport {
    let mut report = UnitReport {
        kind: unit.kind,
        name: unit.name.to_string(),
        version: unit.version.to_string(),
        files: Vec::new(),
        error: None,
    };
    info!(unit = %unit.name, kind = %unit.kind, version = %unit.version, "installing");
    let Some(package) = ctx.registry.package(unit.package) else {
        report.error = Some(GraftError::registry_load(
            unit.package,
            format!("package of {} `{}` is not declared", unit.kind, unit.name),
        ));
        return report;
    };
    let root = ctx.config.unit_dir(ctx.project_root, unit.kind);
    let date = ctx.now.date_naive();

    for file in unit.files {
        let raw = match ctx.source.read_source(package, &file.source_path) {
            Ok(raw) => raw,
            Err(err) => {
                report.error = Some(err);
                break;
            }
        };
        let tctx = TransformContext {
            registry: ctx.registry,
            unit: *unit,
            file,
            aliases: &ctx.config.aliases,
        };
        let transformed = ctx.transformer.transform(&raw, &tctx);
        let path = root.join(target_extension(&file.target_path, ctx.config.tsx));

        let existing = match std::fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                report.error = Some(GraftError::WriteIo { path, source });
                break;
            }
        };
        let overwrite = match decide(existing.as_deref(), unit.version) {
            WriteDecision::Write => false,
            WriteDecision::UpToDate => {
                debug!(path = %path.display(), "up to date");
                report.files.push(FileOutcome::UpToDate(path));
                continue;
            }
            WriteDecision::Conflict(drift) => {
                if !resolver.confirm_overwrite(&path, &drift) {
                    warn!(path = %path.display(), state = %drift.describe(), "conflict, keeping existing file");
                    report.files.push(FileOutcome::Conflict { path, drift });
                    continue;
                }
                true
            }
        };

        let origin = format!("{}/{}", unit.package, file.source_path);
        let stamped = stamp(&transformed, &origin, unit.version, date);
        if let Err(source) = write_file(&path, &stamped) {
            report.error = Some(GraftError::WriteIo { path, source });
            break;
        }
        debug!(path = %path.display(), "wrote");
        report.files.push(if overwrite {
            FileOutcome::Overwritten(path)
        } else {
            FileOutcome::Written(path)
        });
    }
    report
}

fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
}

/// Name part of a package identifier: `zod@3` -> `zod`, `@scope/pkg@1` -> `@scope/pkg`.
pub fn package_name(identifier: &str) -> &str {
    let search_from = usize::from(identifier.starts_with('@'));
    match identifier[search_from..].find('@') {
        Some(at) => &identifier[..search_from + at],
        None => identifier,
    }
}

/// External packages not yet declared in the project's `package.json`.
pub fn missing_packages<P: AsRef<Path>>(root: P, packages: &[String]) -> Result<Vec<String>> {
    let manifest = root.as_ref().join("package.json");
    let declared: Vec<String> = if manifest.exists() {
        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&manifest)?)?;
        ["dependencies", "devDependencies", "peerDependencies"]
            .iter()
            .filter_map(|section| value.get(section).and_then(|s| s.as_object()))
            .flat_map(|deps| deps.keys().cloned())
            .collect()
    } else {
        Vec::new()
    };
    Ok(packages
        .iter()
        .filter(|p| !declared.iter().any(|d| d == package_name(p)))
        .cloned()
        .collect())
}

/// An installed file found on disk, with its drift against the registry.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedFile {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    pub drift: Drift,
}

/// Walks the alias directories and classifies every script and stylesheet.
///
/// Files whose origin is no longer in the registry are compared against the
/// registry version.
pub fn project_status<P: AsRef<Path>>(
    root: P,
    config: &ProjectConfig,
    registry: &Registry,
) -> Result<Vec<TrackedFile>> {
    let root = root.as_ref();
    let versions: HashMap<String, &str> = registry
        .components
        .iter()
        .map(InstallUnit::from)
        .chain(registry.lib.values().map(InstallUnit::from))
        .flat_map(|u| {
            u.files
                .iter()
                .map(move |f| (format!("{}/{}", u.package, f.source_path), u.version))
        })
        .collect();

    let mut found = BTreeMap::new();
    for kind in [UnitKind::Component, UnitKind::Lib] {
        let dir = config.unit_dir(root, kind);
        if !dir.exists() {
            continue;
        }
        for entry in WalkDir::new(&dir) {
            let entry = entry.map_err(|e| GraftError::Io(e.into()))?;
            let path = entry.path();
            let name = path.to_string_lossy();
            if !entry.file_type().is_file() || !(is_script(&name) || is_stylesheet(&name)) {
                continue;
            }
            let content = std::fs::read_to_string(path)?;
            let provenance = extract_origin(&content);
            let current = provenance
                .as_ref()
                .and_then(|p| versions.get(&p.origin).copied())
                .unwrap_or(&registry.registry_version);
            let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            found.insert(
                relative.clone(),
                TrackedFile {
                    path: relative,
                    drift: classify(&content, current),
                    provenance,
                },
            );
        }
    }
    Ok(found.into_values().collect())
}
