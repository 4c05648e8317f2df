use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use crate::error::{GraftError, Result};
use crate::registry::UnitKind;
use crate::util::get_config_path;

/// Import roots installed code lives under, e.g. `@/components/ui` and `@/lib`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Aliases {
    pub components: String,
    pub lib: String,
}

impl Default for Aliases {
    fn default() -> Self {
        Aliases {
            components: "@/components/ui".to_string(),
            lib: "@/lib".to_string(),
        }
    }
}

/// Provenance of one installed component, as recorded in `graft.json`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentVersion {
    pub version: String,
    pub installed_at: DateTime<Utc>,
    /// Registry the component was installed from.
    pub source: String,
}

/// Represents the contents of a `graft.json` file.
///
/// This is the record of what has been installed into the project. Files on
/// disk may have been edited since; the provenance headers track that.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Data model variant the project was initialized for.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_true")]
    pub tsx: bool,
    #[serde(default)]
    pub src_dir: bool,
    #[serde(default)]
    pub aliases: Aliases,
    /// Registry source used when `--registry` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default)]
    pub installed_lib: Vec<String>,
    #[serde(default)]
    pub installed_components: Vec<String>,
    #[serde(default)]
    pub component_versions: BTreeMap<String, ComponentVersion>,
    #[serde(default)]
    pub registry_version: String,
}

fn default_model() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

/// Options for `graft init`.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub model: Option<String>,
    pub aliases: Aliases,
    pub registry: Option<String>,
}

impl ProjectConfig {
    /// Creates a config for the project at `root`, detecting a `src/` directory
    /// and a `tsconfig.json`.
    pub fn detect<P: AsRef<Path>>(root: P) -> ProjectConfig {
        let root = root.as_ref();
        ProjectConfig {
            model: default_model(),
            tsx: root.join("tsconfig.json").exists(),
            src_dir: root.join("src").is_dir(),
            aliases: Aliases::default(),
            registry: None,
            installed_lib: Vec::new(),
            installed_components: Vec::new(),
            component_versions: BTreeMap::new(),
            registry_version: String::new(),
        }
    }

    /// Loads a `ProjectConfig` from a file path.
    ///
    /// # Errors
    /// Returns an error if the file can't be read, deserialized, or if its
    /// installed set and version records disagree.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ProjectConfig> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: ProjectConfig = serde_json::from_str(&text).map_err(|e| GraftError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.check_consistency().map_err(|reason| GraftError::Config {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Saves the config as pretty JSON.
    ///
    /// The file is written to a temporary sibling and renamed into place, so a
    /// reader never sees a half-written config.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(path).map_err(|e| GraftError::Io(e.error))?;
        debug!(path = %path.display(), "saved project config");
        Ok(())
    }

    fn check_consistency(&self) -> std::result::Result<(), String> {
        check_aliases(&self.aliases)?;
        for name in &self.installed_components {
            if !self.component_versions.contains_key(name) {
                return Err(format!("`{name}` is installed but has no entry in componentVersions"));
            }
        }
        for name in self.component_versions.keys() {
            if !self.installed_components.contains(name) {
                return Err(format!("`{name}` has a version record but is not in installedComponents"));
            }
        }
        Ok(())
    }

    pub fn is_installed(&self, kind: UnitKind, name: &str) -> bool {
        match kind {
            UnitKind::Component => self.installed_components.iter().any(|n| n == name),
            UnitKind::Lib => self.installed_lib.iter().any(|n| n == name),
        }
    }

    /// Records a component together with its version entry.
    pub fn record_component(&mut self, name: &str, version: &str, source: &str, at: DateTime<Utc>) {
        if !self.installed_components.iter().any(|n| n == name) {
            self.installed_components.push(name.to_string());
            self.installed_components.sort();
        }
        self.component_versions.insert(
            name.to_string(),
            ComponentVersion {
                version: version.to_string(),
                installed_at: at,
                source: source.to_string(),
            },
        );
    }

    pub fn record_lib(&mut self, name: &str) {
        if !self.installed_lib.iter().any(|n| n == name) {
            self.installed_lib.push(name.to_string());
            self.installed_lib.sort();
        }
    }

    /// The directory imports starting with `alias` resolve to.
    ///
    /// `@/` and `~/` point at the project's source root (`src/` when `srcDir`
    /// is set); anything else is taken relative to the project root.
    pub fn alias_dir<P: AsRef<Path>>(&self, root: P, alias: &str) -> PathBuf {
        let root = root.as_ref();
        let base = if self.src_dir { root.join("src") } else { root.to_path_buf() };
        let alias = alias.trim_end_matches('/');
        match alias.strip_prefix("@/").or_else(|| alias.strip_prefix("~/")) {
            Some(rest) => base.join(rest),
            None if alias == "@" || alias == "~" => base,
            None => root.join(alias.trim_start_matches("./")),
        }
    }

    /// Where units of the given kind are installed.
    pub fn unit_dir<P: AsRef<Path>>(&self, root: P, kind: UnitKind) -> PathBuf {
        match kind {
            UnitKind::Component => self.alias_dir(root, &self.aliases.components),
            UnitKind::Lib => self.alias_dir(root, &self.aliases.lib),
        }
    }
}

/// Aliases must stay inside the project: no absolute paths, no `..` segments.
pub fn check_aliases(aliases: &Aliases) -> std::result::Result<(), String> {
    for alias in [&aliases.components, &aliases.lib] {
        let trimmed = alias.trim();
        if trimmed.is_empty() {
            return Err("aliases must not be empty".to_string());
        }
        if trimmed.starts_with('/') || trimmed.starts_with('\\') || Path::new(trimmed).is_absolute() {
            return Err(format!("alias `{alias}` must be relative to the project"));
        }
        if trimmed.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(format!("alias `{alias}` points outside the project"));
        }
    }
    Ok(())
}

/// Creates the alias directories under the project root.
pub fn ensure_alias_dirs<P: AsRef<Path>>(root: P, config: &ProjectConfig) -> Result<()> {
    let root = root.as_ref();
    for kind in [UnitKind::Component, UnitKind::Lib] {
        std::fs::create_dir_all(config.unit_dir(root, kind))?;
    }
    Ok(())
}

/// Initializes a project: creates a minimal `package.json` when there is
/// none, writes `graft.json` and creates the alias directories.
///
/// An existing `graft.json` is kept, so re-running init never forgets what
/// was installed.
pub fn init_project<P: AsRef<Path>>(root: P, options: &InitOptions) -> Result<ProjectConfig> {
    let root = root.as_ref();
    let config_path = get_config_path(root);
    if !config_path.exists() {
        check_aliases(&options.aliases).map_err(|reason| GraftError::Config {
            path: config_path.clone(),
            reason,
        })?;
    }
    std::fs::create_dir_all(root)?;
    let manifest = root.join("package.json");
    if !manifest.exists() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase().replace(' ', "-"))
            .unwrap_or_else(|| "app".to_string());
        let package = serde_json::json!({
            "name": name,
            "version": "0.1.0",
            "private": true,
            "dependencies": {}
        });
        std::fs::write(&manifest, serde_json::to_string_pretty(&package)? + "\n")?;
        info!(path = %manifest.display(), "created package.json");
    }
    let config = if config_path.exists() {
        info!(path = %config_path.display(), "project already initialized");
        let mut config = ProjectConfig::load(&config_path)?;
        if options.registry.is_some() {
            config.registry = options.registry.clone();
            config.save(&config_path)?;
        }
        config
    } else {
        let mut config = ProjectConfig::detect(root);
        if let Some(model) = &options.model {
            config.model = model.clone();
        }
        config.aliases = options.aliases.clone();
        config.registry = options.registry.clone();
        config.save(&config_path)?;
        config
    };
    ensure_alias_dirs(root, &config)?;
    Ok(config)
}
