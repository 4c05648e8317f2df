use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{GraftError, Result};
use crate::util::{is_contained_path, to_kebab_case};

/// File name of the registry manifest inside a registry root.
pub const REGISTRY_MANIFEST: &str = "registry.json";

/// Maximum number of suggestions reported for an unknown component.
pub const MAX_SUGGESTIONS: usize = 5;

/// One source file of a component or library module and where it lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMapping {
    /// Path relative to the owning package directory.
    pub source_path: String,
    /// Path relative to the alias root the unit installs under.
    pub target_path: String,
    /// Declares that the file has no package-scoped imports; the transformer skips it.
    #[serde(default)]
    pub no_imports: bool,
}

/// An installable component as declared in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Name of the registry package the sources live in.
    pub package: String,
    pub files: Vec<FileMapping>,
    /// Library modules this component imports.
    #[serde(default)]
    pub internal_dependencies: Vec<String>,
    /// Other components this component composes.
    #[serde(default)]
    pub registry_dependencies: Vec<String>,
    /// External packages the target project must depend on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub version: String,
}

/// A shared, non-UI source unit (types, services, hooks, utilities).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibModule {
    /// Filled from the key of the `lib` map when loading.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub package: String,
    pub files: Vec<FileMapping>,
    #[serde(default)]
    pub internal_dependencies: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Defaults to the registry version.
    #[serde(default)]
    pub version: String,
}

/// How imports of a registry package map onto the project's aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PackageKind {
    /// A barrel of components, rooted at the components alias.
    Components,
    /// A single component; subpaths go through its file mappings.
    Component,
    /// Library modules, rooted at the lib alias.
    Lib,
}

/// A package namespace the registry publishes sources under, e.g. `@acme/ui`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPackage {
    pub name: String,
    /// Directory of the package sources, relative to the registry root.
    #[serde(default)]
    pub dir: String,
    pub kind: PackageKind,
    /// Component a `component` package maps to.
    #[serde(default)]
    pub component: Option<String>,
    /// Library module a `lib` package maps to. When absent the first subpath
    /// segment names the module.
    #[serde(default)]
    pub module: Option<String>,
}

/// The registry catalog. Loaded once per command and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    pub registry_version: String,
    #[serde(default)]
    pub packages: Vec<RegistryPackage>,
    #[serde(default)]
    pub components: Vec<RegistryEntry>,
    #[serde(default)]
    pub lib: BTreeMap<String, LibModule>,
}

/// Whether a resolved unit is a component or a library module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Component,
    Lib,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Component => "component",
            UnitKind::Lib => "lib",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A borrowed view over either a component or a library module.
#[derive(Debug, Clone, Copy)]
pub struct InstallUnit<'a> {
    pub kind: UnitKind,
    pub name: &'a str,
    pub package: &'a str,
    pub version: &'a str,
    pub files: &'a [FileMapping],
}

impl<'a> InstallUnit<'a> {
    pub fn is_multi_file(&self) -> bool {
        self.files.len() > 1
    }

    /// The first mapping, which is the unit's entry point.
    pub fn primary(&self) -> Option<&'a FileMapping> {
        self.files.first()
    }
}

impl<'a> From<&'a RegistryEntry> for InstallUnit<'a> {
    fn from(entry: &'a RegistryEntry) -> Self {
        InstallUnit {
            kind: UnitKind::Component,
            name: &entry.name,
            package: &entry.package,
            version: &entry.version,
            files: &entry.files,
        }
    }
}

impl<'a> From<&'a LibModule> for InstallUnit<'a> {
    fn from(module: &'a LibModule) -> Self {
        InstallUnit {
            kind: UnitKind::Lib,
            name: &module.name,
            package: &module.package,
            version: &module.version,
            files: &module.files,
        }
    }
}

impl Registry {
    /// Parses and validates a manifest. `location` is only used in error messages.
    pub fn from_json(text: &str, location: &str) -> Result<Registry> {
        let mut registry: Registry = serde_json::from_str(text)
            .map_err(|e| GraftError::registry_load(location, e))?;
        let registry_version = registry.registry_version.clone();
        for (name, module) in registry.lib.iter_mut() {
            module.name = name.clone();
            if module.version.is_empty() {
                module.version = registry_version.clone();
            }
        }
        registry
            .validate()
            .map_err(|reason| GraftError::registry_load(location, reason))?;
        Ok(registry)
    }

    /// Schema checks. Dependency names are deliberately not checked here; the
    /// resolver reports them when they are actually needed.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.registry_version.trim().is_empty() {
            return Err("`registryVersion` must not be empty".to_string());
        }
        let mut package_names = HashSet::new();
        for package in &self.packages {
            if package.name.is_empty() {
                return Err("package with empty name".to_string());
            }
            if !package_names.insert(package.name.as_str()) {
                return Err(format!("duplicate package `{}`", package.name));
            }
            if package.kind == PackageKind::Component && package.component.is_none() {
                return Err(format!("package `{}` has kind `component` but no `component`", package.name));
            }
            if !package.dir.is_empty() && !is_contained_path(&package.dir) {
                return Err(format!("package `{}` dir escapes the registry root", package.name));
            }
        }
        let mut component_names = HashSet::new();
        for entry in &self.components {
            if entry.name.trim().is_empty() {
                return Err("component with empty name".to_string());
            }
            if !component_names.insert(entry.name.to_lowercase()) {
                return Err(format!("duplicate component `{}`", entry.name));
            }
            if entry.version.trim().is_empty() {
                return Err(format!("component `{}` has no version", entry.name));
            }
        }
        let units = self
            .components
            .iter()
            .map(InstallUnit::from)
            .chain(self.lib.values().map(InstallUnit::from));
        for unit in units {
            if unit.name.is_empty() {
                return Err("lib module with empty name".to_string());
            }
            if unit.files.is_empty() {
                return Err(format!("{} `{}` declares no files", unit.kind, unit.name));
            }
            if !package_names.contains(unit.package) {
                return Err(format!("{} `{}` references unknown package `{}`", unit.kind, unit.name, unit.package));
            }
            for file in unit.files {
                if !is_contained_path(&file.source_path) || !is_contained_path(&file.target_path) {
                    return Err(format!(
                        "{} `{}` maps `{}` -> `{}` outside its root",
                        unit.kind, unit.name, file.source_path, file.target_path
                    ));
                }
            }
        }
        Ok(())
    }

    /// Finds a component by name or display title, ignoring case.
    pub fn find_component(&self, query: &str) -> Option<&RegistryEntry> {
        let query = query.trim();
        let kebab = to_kebab_case(query);
        self.components.iter().find(|c| {
            c.name.eq_ignore_ascii_case(query)
                || (!c.title.is_empty() && c.title.eq_ignore_ascii_case(query))
                || c.name.eq_ignore_ascii_case(&kebab)
        })
    }

    /// Up to five component names whose name or title contains the query.
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.components
            .iter()
            .filter(|c| {
                let name = c.name.to_lowercase();
                let title = c.title.to_lowercase();
                name.contains(&query)
                    || (!title.is_empty() && title.contains(&query))
                    || query.contains(&name)
            })
            .map(|c| c.name.clone())
            .take(MAX_SUGGESTIONS)
            .collect()
    }

    /// Looks up a dependency by exact component name, then case-insensitively.
    pub fn component(&self, name: &str) -> Option<&RegistryEntry> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.components.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn lib_module(&self, name: &str) -> Option<&LibModule> {
        self.lib.get(name)
    }

    pub fn package(&self, name: &str) -> Option<&RegistryPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Matches an import specifier against the known package names.
    ///
    /// Returns the package and the subpath after it (without the leading `/`).
    /// The longest matching name wins, so `@acme/ui-table` is not taken for `@acme/ui`.
    pub fn package_for_specifier<'s>(&self, specifier: &'s str) -> Option<(&RegistryPackage, &'s str)> {
        self.packages
            .iter()
            .filter_map(|p| {
                let rest = specifier.strip_prefix(p.name.as_str())?;
                if rest.is_empty() {
                    Some((p, rest))
                } else {
                    rest.strip_prefix('/').map(|sub| (p, sub))
                }
            })
            .max_by_key(|(p, _)| p.name.len())
    }

    pub fn components_in_category(&self, category: &str) -> Vec<&RegistryEntry> {
        self.components
            .iter()
            .filter(|c| c.category.eq_ignore_ascii_case(category))
            .collect()
    }

    pub fn categories(&self) -> BTreeSet<&str> {
        self.components
            .iter()
            .filter(|c| !c.category.is_empty())
            .map(|c| c.category.as_str())
            .collect()
    }
}

/// Where a registry is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
    /// A directory holding `registry.json` and the package sources.
    Local { root: PathBuf, manifest: PathBuf },
    /// A base URL serving `registry.json` and the package sources.
    Remote { base_url: String, manifest_url: String },
}

impl RegistrySource {
    /// Parses a `--registry` argument. URLs are remote, everything else is a
    /// local directory or manifest file, resolved against `cwd`.
    pub fn parse<P: AsRef<Path>>(source: &str, cwd: P) -> RegistrySource {
        let source = source.trim();
        if source.starts_with("http://") || source.starts_with("https://") {
            let trimmed = source.trim_end_matches('/');
            if trimmed.ends_with(".json") {
                let base = trimmed.rsplit_once('/').map(|(b, _)| b).unwrap_or(trimmed);
                RegistrySource::Remote {
                    base_url: base.to_string(),
                    manifest_url: trimmed.to_string(),
                }
            } else {
                RegistrySource::Remote {
                    base_url: trimmed.to_string(),
                    manifest_url: format!("{trimmed}/{REGISTRY_MANIFEST}"),
                }
            }
        } else {
            let path = cwd.as_ref().join(source);
            if path.extension().is_some_and(|ext| ext == "json") {
                let root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| path.clone());
                RegistrySource::Local { root, manifest: path }
            } else {
                let manifest = path.join(REGISTRY_MANIFEST);
                RegistrySource::Local { root: path, manifest }
            }
        }
    }

    pub fn location(&self) -> String {
        match self {
            RegistrySource::Local { manifest, .. } => manifest.display().to_string(),
            RegistrySource::Remote { manifest_url, .. } => manifest_url.clone(),
        }
    }
}

impl fmt::Display for RegistrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrySource::Local { root, .. } => write!(f, "{}", root.display()),
            RegistrySource::Remote { base_url, .. } => f.write_str(base_url),
        }
    }
}

/// Supplies the raw text of registry source files.
pub trait SourceProvider {
    fn read_source(&self, package: &RegistryPackage, source_path: &str) -> Result<String>;
}

impl SourceProvider for RegistrySource {
    fn read_source(&self, package: &RegistryPackage, source_path: &str) -> Result<String> {
        match self {
            RegistrySource::Local { root, .. } => {
                let path = root.join(&package.dir).join(source_path);
                debug!(path = %path.display(), "reading registry source");
                std::fs::read_to_string(&path)
                    .map_err(|e| GraftError::registry_load(path.display().to_string(), e))
            }
            RegistrySource::Remote { base_url, .. } => {
                let url = if package.dir.is_empty() {
                    format!("{base_url}/{source_path}")
                } else {
                    format!("{base_url}/{}/{source_path}", package.dir.trim_matches('/'))
                };
                debug!(%url, "fetching registry source");
                fetch_text(&url)
            }
        }
    }
}

fn fetch_text(url: &str) -> Result<String> {
    let response = reqwest::blocking::get(url)
        .map_err(|e| GraftError::registry_load(url, e))?;
    if !response.status().is_success() {
        return Err(GraftError::registry_load(url, format!("HTTP {}", response.status())));
    }
    response.text().map_err(|e| GraftError::registry_load(url, e))
}

/// Loads and validates the registry manifest from a local or remote source.
pub fn load_registry(source: &RegistrySource) -> Result<Registry> {
    let location = source.location();
    debug!(%location, "loading registry");
    let text = match source {
        RegistrySource::Local { manifest, .. } => std::fs::read_to_string(manifest)
            .map_err(|e| GraftError::registry_load(&location, e))?,
        RegistrySource::Remote { manifest_url, .. } => fetch_text(manifest_url)?,
    };
    Registry::from_json(&text, &location)
}
