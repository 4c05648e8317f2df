//! Import specifier rewriting for installed files.
//!
//! The transformer works on the text of import and export statements, not on a
//! syntax tree. Each rewrite step is a [`RewritePass`]; [`TextTransformer`]
//! runs them in order behind the [`ImportTransformer`] trait, so the installer
//! only depends on the trait.
//!
//! Only the specifier between the quotes is ever replaced. A file without any
//! matching statement comes back byte-identical.

mod cross_package;
mod intra_component;
mod path_casing;
mod stylesheet;

use std::borrow::Cow;
use std::ops::Range;
use std::sync::LazyLock;
use regex::{Captures, Regex};
use tracing::debug;
use crate::config::Aliases;
use crate::registry::{FileMapping, InstallUnit, Registry};
use crate::util::{normalize_slash_path, parent_of, strip_script_extension};

pub use cross_package::CrossPackagePass;
pub use intra_component::IntraComponentPass;
pub use path_casing::{PathCasingPass, has_preserve_casing_marker};
pub use stylesheet::StylesheetPass;

/// Leading comment marker that turns off path-casing normalization for a file.
pub const PRESERVE_CASING_MARKER: &str = "@graft-preserve-casing";

static IMPORT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        \b(?:import|export)\b[^;'"`()=]*?\bfrom\s*['"](?P<from>[^'"\r\n]+)['"]
        | \bimport\s*['"](?P<side>[^'"\r\n]+)['"]
        | \b(?:import|require)\s*\(\s*['"](?P<dynamic>[^'"\r\n]+)['"]\s*\)
        "#,
    )
    .expect("import pattern is valid")
});

static KEYWORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:import|export)\b").expect("keyword pattern is valid"));

static TYPE_ONLY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:import|export)\s+type[\s{*]").expect("type-only pattern is valid")
});

/// The syntactic form an import specifier was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from "..."`, `export { x } from "..."`
    Value,
    /// `import type { T } from "..."`, `export type { T } from "..."`
    TypeOnly,
    /// `import "..."`
    SideEffect,
    /// `import("...")`, `require("...")`
    Dynamic,
}

/// One import specifier occurrence in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef<'c> {
    pub specifier: &'c str,
    pub kind: ImportKind,
    /// Byte range of the specifier, without quotes.
    pub span: Range<usize>,
}

impl ImportRef<'_> {
    pub fn is_relative(&self) -> bool {
        self.specifier.starts_with("./") || self.specifier.starts_with("../")
    }
}

fn import_from_captures<'c>(caps: &Captures<'c>) -> Option<ImportRef<'c>> {
    let (m, kind) = if let Some(m) = caps.name("from") {
        let statement = &caps.get(0)?.as_str()[..m.start() - caps.get(0)?.start()];
        let kind = if is_type_only_statement(statement) {
            ImportKind::TypeOnly
        } else {
            ImportKind::Value
        };
        (m, kind)
    } else if let Some(m) = caps.name("side") {
        (m, ImportKind::SideEffect)
    } else {
        (caps.name("dynamic")?, ImportKind::Dynamic)
    };
    Some(ImportRef {
        specifier: m.as_str(),
        kind,
        span: m.range(),
    })
}

/// The match may run across a statement without a trailing semicolon, so only
/// the last `import`/`export` keyword in it decides.
fn is_type_only_statement(statement: &str) -> bool {
    let start = KEYWORD_PATTERN
        .find_iter(statement)
        .last()
        .map(|m| m.start())
        .unwrap_or(0);
    TYPE_ONLY_PATTERN.is_match(&statement[start..])
}

/// Lists every import specifier in the file, in source order.
pub fn scan_imports(content: &str) -> Vec<ImportRef<'_>> {
    IMPORT_PATTERN
        .captures_iter(content)
        .filter_map(|caps| import_from_captures(&caps))
        .collect()
}

/// Replaces specifiers for which `rewrite` returns a new value.
///
/// Borrows the input unchanged when nothing was replaced.
pub fn rewrite_imports<'c, F>(content: &'c str, mut rewrite: F) -> Cow<'c, str>
where
    F: FnMut(&ImportRef<'_>) -> Option<String>,
{
    let mut out = String::new();
    let mut last = 0;
    for import in scan_imports(content) {
        let Some(replacement) = rewrite(&import) else {
            continue;
        };
        if replacement == import.specifier {
            continue;
        }
        out.push_str(&content[last..import.span.start]);
        out.push_str(&replacement);
        last = import.span.end;
    }
    if last == 0 {
        return Cow::Borrowed(content);
    }
    out.push_str(&content[last..]);
    Cow::Owned(out)
}

/// Cheap check that lets files without any import syntax skip every pass.
pub fn might_contain_imports(content: &str) -> bool {
    content.contains("import") || content.contains("from") || content.contains("require")
}

/// Everything a pass needs to know about the file being installed.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub registry: &'a Registry,
    /// The component or library module that owns the file.
    pub unit: InstallUnit<'a>,
    /// The file's own mapping, one of `unit.files`.
    pub file: &'a FileMapping,
    pub aliases: &'a Aliases,
}

impl<'a> TransformContext<'a> {
    /// Finds the file of the current unit a relative specifier points at.
    ///
    /// Extension-less specifiers match script files and `index` files of
    /// directories; specifiers with an extension must match exactly.
    pub fn sibling(&self, specifier: &str) -> Option<&'a FileMapping> {
        let base = parent_of(&self.file.source_path);
        let joined = normalize_slash_path(&format!("{base}/{specifier}"))?;
        let files = self.unit.files;
        files
            .iter()
            .find(|f| f.source_path == joined)
            .or_else(|| {
                files.iter().find(|f| {
                    let stem = strip_script_extension(&f.source_path);
                    stem != f.source_path
                        && (stem == joined || stem.strip_suffix("/index") == Some(joined.as_str()))
                })
            })
    }
}

/// One isolated rewrite step.
pub trait RewritePass {
    fn name(&self) -> &'static str;

    /// Rewrites `content`, borrowing it back unchanged when nothing applies.
    fn rewrite<'c>(&self, content: &'c str, ctx: &TransformContext<'_>) -> Cow<'c, str>;
}

/// Produces the text to write for one registry source file.
pub trait ImportTransformer {
    fn transform<'c>(&self, content: &'c str, ctx: &TransformContext<'_>) -> Cow<'c, str>;
}

/// Regex-based transformer running the four passes in order: cross-package,
/// intra-component, path casing, stylesheet.
pub struct TextTransformer {
    passes: Vec<Box<dyn RewritePass>>,
}

impl TextTransformer {
    pub fn with_passes(passes: Vec<Box<dyn RewritePass>>) -> Self {
        TextTransformer { passes }
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

impl Default for TextTransformer {
    fn default() -> Self {
        TextTransformer::with_passes(vec![
            Box::new(CrossPackagePass),
            Box::new(IntraComponentPass),
            Box::new(PathCasingPass),
            Box::new(StylesheetPass),
        ])
    }
}

impl ImportTransformer for TextTransformer {
    fn transform<'c>(&self, content: &'c str, ctx: &TransformContext<'_>) -> Cow<'c, str> {
        if ctx.file.no_imports || !might_contain_imports(content) {
            return Cow::Borrowed(content);
        }
        let mut current = Cow::Borrowed(content);
        for pass in &self.passes {
            let next = match pass.rewrite(&current, ctx) {
                Cow::Borrowed(_) => None,
                Cow::Owned(text) => Some(text),
            };
            if let Some(text) = next {
                debug!(pass = pass.name(), file = %ctx.file.source_path, "rewrote imports");
                current = Cow::Owned(text);
            }
        }
        current
    }
}

/// Joins an alias root and a path below it.
pub(crate) fn join_alias(alias: &str, rest: &str) -> String {
    let alias = alias.trim_end_matches('/');
    let rest = rest.trim_matches('/');
    if rest.is_empty() {
        alias.to_string()
    } else {
        format!("{alias}/{rest}")
    }
}

/// The import path of a target file: script extension and trailing `/index` dropped.
pub(crate) fn import_path(target: &str) -> &str {
    let stem = strip_script_extension(target);
    if stem == target {
        return target;
    }
    match stem.strip_suffix("/index") {
        Some(dir) => dir,
        None if stem == "index" => "",
        None => stem,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::Aliases;
    use crate::registry::Registry;

    pub fn aliases() -> Aliases {
        Aliases {
            components: "@/components/ui".to_string(),
            lib: "@/lib/x".to_string(),
        }
    }

    pub fn registry() -> Registry {
        Registry::from_json(
            r#"{
            "registryVersion": "3.1.0",
            "packages": [
                { "name": "@acme/ui", "dir": "packages/ui", "kind": "components" },
                { "name": "@acme/table", "dir": "packages/table", "kind": "component", "component": "table" },
                { "name": "@acme/types", "dir": "packages/types", "kind": "lib", "module": "types" },
                { "name": "@acme/lib", "dir": "packages/lib", "kind": "lib" }
            ],
            "components": [
                { "name": "button", "package": "@acme/ui", "version": "3.1.0",
                  "files": [{ "sourcePath": "src/Button.tsx", "targetPath": "button.tsx" }] },
                { "name": "input-block-editor", "package": "@acme/ui", "version": "3.1.0",
                  "files": [{ "sourcePath": "src/InputBlockEditor.tsx", "targetPath": "input-block-editor.tsx" }] },
                { "name": "table", "package": "@acme/table", "version": "3.1.0",
                  "files": [
                    { "sourcePath": "src/Table.tsx", "targetPath": "table/table.tsx" },
                    { "sourcePath": "src/parts/TableHeader.tsx", "targetPath": "table/table-header.tsx" },
                    { "sourcePath": "src/parts/TableRow/index.tsx", "targetPath": "table/table-row.tsx" },
                    { "sourcePath": "src/styles/Table.css", "targetPath": "table/table.css" }
                  ] }
            ],
            "lib": {
                "types": { "package": "@acme/types", "files": [{ "sourcePath": "index.ts", "targetPath": "types.ts" }] },
                "services": { "package": "@acme/lib", "files": [
                    { "sourcePath": "services/index.ts", "targetPath": "services.ts" },
                    { "sourcePath": "services/types.ts", "targetPath": "services-types.ts" }
                ] }
            }
        }"#,
            "test",
        )
        .unwrap()
    }
}
