use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};
use semver::Version;

/// Name of the per-project config file.
pub const CONFIG_FILE_NAME: &str = "graft.json";

/// File extensions treated as stylesheets by the import transformer.
pub const STYLE_EXTENSIONS: [&str; 4] = ["css", "scss", "sass", "less"];

/// File extensions probed when resolving extension-less script specifiers.
pub const SCRIPT_EXTENSIONS: [&str; 6] = ["tsx", "ts", "jsx", "js", "mjs", "cjs"];

/// Converts an identifier to kebab-case.
///
/// A dash is inserted only where a lowercase letter or digit is followed by an
/// uppercase letter, so runs of capitals stay together: `VForm` becomes `vform`.
/// `_` and spaces become dashes.
pub fn to_kebab_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 4);
    let mut prev: Option<char> = None;
    for c in input.chars() {
        if c == '_' || c == ' ' || c == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev = Some('-');
            continue;
        }
        if c.is_uppercase() {
            if let Some(p) = prev {
                if p.is_lowercase() || p.is_ascii_digit() {
                    out.push('-');
                }
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

/// Converts a kebab-, snake- or space-separated name to PascalCase.
pub fn to_pascal_case(input: &str) -> String {
    input
        .split(['-', '_', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Whether a path has a stylesheet extension.
pub fn is_stylesheet(path: &str) -> bool {
    extension_of(path)
        .map(|ext| STYLE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Whether a path has a script extension.
pub fn is_script(path: &str) -> bool {
    extension_of(path)
        .map(|ext| SCRIPT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// The extension of the last path segment, if any.
pub fn extension_of(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() { None } else { Some(ext) }
}

/// Strips a script extension (`.ts`, `.tsx`, ...) and leaves everything else alone.
pub fn strip_script_extension(path: &str) -> &str {
    match extension_of(path) {
        Some(ext) if is_script(path) => &path[..path.len() - ext.len() - 1],
        _ => path,
    }
}

/// Maps `.ts`/`.tsx` to `.js`/`.jsx` for projects that do not use TypeScript.
pub fn target_extension(path: &str, tsx: bool) -> String {
    if tsx {
        return path.to_string();
    }
    if let Some(stem) = path.strip_suffix(".tsx") {
        format!("{stem}.jsx")
    } else if let Some(stem) = path.strip_suffix(".ts") {
        if stem.ends_with(".d") {
            path.to_string()
        } else {
            format!("{stem}.js")
        }
    } else {
        path.to_string()
    }
}

/// Normalizes a forward-slash path, resolving `.` and `..` segments.
///
/// Returns `None` when the path escapes its root.
pub fn normalize_slash_path(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    Some(parts.join("/"))
}

/// The directory part of a forward-slash path (`""` for a bare file name).
pub fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Builds a relative import specifier from the file at `from` to the file at `to`.
///
/// Both are forward-slash paths relative to the same root. Script extensions
/// are dropped from the result; stylesheet extensions are kept.
pub fn relative_specifier(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = parent_of(from).split('/').filter(|s| !s.is_empty()).collect();
    let to = strip_script_extension(to);
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let ups = from_dir.len() - common;
    let rest = to_parts[common..].join("/");
    if ups == 0 {
        format!("./{rest}")
    } else {
        format!("{}{rest}", "../".repeat(ups))
    }
}

/// Whether a relative path stays inside its root.
pub fn is_contained_path(path: &str) -> bool {
    let p = Path::new(path);
    !p.is_absolute()
        && !path.starts_with('/')
        && p.components().all(|c| !matches!(c, Component::ParentDir | Component::Prefix(_)))
}

/// Compares two registry versions.
///
/// Semantic versions are compared by precedence; anything else falls back to
/// equality, returning `None` when the strings differ.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    match (Version::parse(a.trim_start_matches('v')), Version::parse(b.trim_start_matches('v'))) {
        (Ok(a), Ok(b)) => Some(a.cmp(&b)),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

/// Returns the path to `graft.json` in the given project root.
pub fn get_config_path<P: AsRef<Path>>(root: P) -> PathBuf {
    root.as_ref().join(CONFIG_FILE_NAME)
}

/// Package manager used by the target project, detected from its lockfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    pub fn detect<P: AsRef<Path>>(root: P) -> PackageManager {
        let root = root.as_ref();
        if root.join("pnpm-lock.yaml").exists() {
            PackageManager::Pnpm
        } else if root.join("yarn.lock").exists() {
            PackageManager::Yarn
        } else if root.join("bun.lockb").exists() || root.join("bun.lock").exists() {
            PackageManager::Bun
        } else {
            PackageManager::Npm
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    /// Arguments that add the given packages to the project manifest.
    pub fn add_args(&self, packages: &[String]) -> Vec<String> {
        let verb = match self {
            PackageManager::Npm => "install",
            _ => "add",
        };
        std::iter::once(verb.to_string())
            .chain(packages.iter().cloned())
            .collect()
    }

    /// The full command line, for printing as a next step.
    pub fn install_command(&self, packages: &[String]) -> String {
        format!("{} {}", self.program(), self.add_args(packages).join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_to_kebab_case_splits_words() {
        assert_eq!(to_kebab_case("InputBlockEditor"), "input-block-editor");
        assert_eq!(to_kebab_case("FileImage"), "file-image");
        assert_eq!(to_kebab_case("input_block editor"), "input-block-editor");
    }

    #[test]
    fn test_to_kebab_case_keeps_capital_runs_together() {
        assert_eq!(to_kebab_case("VForm"), "vform");
        assert_eq!(to_kebab_case("HTMLParser"), "htmlparser");
        assert_eq!(to_kebab_case("Heading2Text"), "heading2-text");
    }

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("input-block-editor"), "InputBlockEditor");
        assert_eq!(to_pascal_case("file_image"), "FileImage");
    }

    #[test]
    fn test_casing_round_trip() {
        for name in ["InputBlockEditor", "FileImage", "Button", "DataTable2Row"] {
            assert_eq!(to_pascal_case(&to_kebab_case(name)), name);
        }
    }

    #[test]
    fn test_relative_specifier() {
        assert_eq!(relative_specifier("table/table.tsx", "table/table-row.tsx"), "./table-row");
        assert_eq!(relative_specifier("table/table.tsx", "table/table.css"), "./table.css");
        assert_eq!(relative_specifier("a/b/c.ts", "a/d.ts"), "../d");
        assert_eq!(relative_specifier("c.ts", "x/d.ts"), "./x/d");
    }

    #[test]
    fn test_normalize_slash_path() {
        assert_eq!(normalize_slash_path("src/Table/../Table/Row").unwrap(), "src/Table/Row");
        assert!(normalize_slash_path("../outside").is_none());
    }

    #[test]
    fn test_target_extension() {
        assert_eq!(target_extension("input.tsx", false), "input.jsx");
        assert_eq!(target_extension("types.ts", false), "types.js");
        assert_eq!(target_extension("env.d.ts", false), "env.d.ts");
        assert_eq!(target_extension("input.tsx", true), "input.tsx");
    }

    #[test]
    fn test_is_contained_path() {
        assert!(is_contained_path("src/Input.tsx"));
        assert!(!is_contained_path("../Input.tsx"));
        assert!(!is_contained_path("/etc/passwd"));
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.2.0", "1.10.0"), Some(Ordering::Less));
        assert_eq!(compare_versions("v2.0.0", "2.0.0"), Some(Ordering::Equal));
        assert_eq!(compare_versions("abc", "abc"), Some(Ordering::Equal));
        assert_eq!(compare_versions("abc", "def"), None);
    }

    #[test]
    fn test_detect_package_manager() {
        let dir = tempdir().unwrap();
        assert_eq!(PackageManager::detect(dir.path()), PackageManager::Npm);
        std::fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        let pm = PackageManager::detect(dir.path());
        assert_eq!(pm, PackageManager::Pnpm);
        assert_eq!(
            pm.install_command(&["clsx".to_string(), "zod".to_string()]),
            "pnpm add clsx zod"
        );
    }
}
