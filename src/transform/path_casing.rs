use std::borrow::Cow;
use crate::util::{is_stylesheet, strip_script_extension, to_kebab_case};
use super::{PRESERVE_CASING_MARKER, RewritePass, TransformContext, rewrite_imports};

/// Kebab-cases relative import paths of single-file units, so `./FileImage`
/// becomes `./file-image` to match the project's file naming.
///
/// Multi-file units are handled by the intra-component pass and anything it
/// skipped is intentionally left alone.
pub struct PathCasingPass;

impl RewritePass for PathCasingPass {
    fn name(&self) -> &'static str {
        "path-casing"
    }

    fn rewrite<'c>(&self, content: &'c str, ctx: &TransformContext<'_>) -> Cow<'c, str> {
        if ctx.unit.is_multi_file() || has_preserve_casing_marker(content) {
            return Cow::Borrowed(content);
        }
        rewrite_imports(content, |import| {
            if !import.is_relative() || is_stylesheet(import.specifier) {
                return None;
            }
            Some(kebab_relative(import.specifier))
        })
    }
}

fn kebab_relative(specifier: &str) -> String {
    specifier
        .split('/')
        .map(|segment| match segment {
            "." | ".." | "" => segment.to_string(),
            _ => {
                let stem = strip_script_extension(segment);
                to_kebab_case(stem) + &segment[stem.len()..]
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether the file's leading comments carry the preserve-casing marker.
///
/// Only the header is inspected: blank lines, directives and comments before
/// the first line of code.
pub fn has_preserve_casing_marker(content: &str) -> bool {
    let mut in_block = false;
    for line in content.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if in_block {
            if line.contains(PRESERVE_CASING_MARKER) {
                return true;
            }
            if line.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if line.starts_with("//") {
            if line.contains(PRESERVE_CASING_MARKER) {
                return true;
            }
            continue;
        }
        if line.starts_with("/*") {
            if line.contains(PRESERVE_CASING_MARKER) {
                return true;
            }
            in_block = !line.contains("*/");
            continue;
        }
        if line.starts_with("\"use ") || line.starts_with("'use ") {
            continue;
        }
        return false;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InstallUnit;
    use crate::transform::test_support::{aliases, registry};

    fn run(content: &str) -> String {
        let registry = registry();
        let aliases = aliases();
        let unit = InstallUnit::from(&registry.components[1]);
        let ctx = TransformContext { registry: &registry, unit, file: &unit.files[0], aliases: &aliases };
        PathCasingPass.rewrite(content, &ctx).into_owned()
    }

    #[test]
    fn test_relative_helpers_are_kebab_cased() {
        assert_eq!(
            run("import { FileImage } from \"./FileImage\";\nimport { fmt } from '../utils/FormatDate.ts';\n"),
            "import { FileImage } from \"./file-image\";\nimport { fmt } from '../utils/format-date.ts';\n"
        );
    }

    #[test]
    fn test_packages_and_stylesheets_are_skipped() {
        let content = "import React from \"react\";\nimport \"./Editor.css\";\n";
        assert_eq!(run(content), content);
    }

    #[test]
    fn test_marker_disables_pass() {
        let content = "\"use client\";\n/**\n * @graft-preserve-casing\n */\nimport { VForm } from \"./VForm\";\n";
        assert_eq!(run(content), content);
        let line = "// @graft-preserve-casing\nimport { VForm } from \"./VForm\";\n";
        assert_eq!(run(line), line);
    }

    #[test]
    fn test_marker_after_code_does_not_count() {
        let content = "import { VForm } from \"./VForm\";\n// @graft-preserve-casing\n";
        assert!(!has_preserve_casing_marker(content));
        assert_eq!(run(content), "import { VForm } from \"./vform\";\n// @graft-preserve-casing\n");
    }
}
