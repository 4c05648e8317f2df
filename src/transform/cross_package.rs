use std::borrow::Cow;
use crate::registry::{FileMapping, PackageKind, RegistryPackage};
use crate::util::{parent_of, strip_script_extension, to_kebab_case};
use super::{ImportKind, ImportRef, RewritePass, TransformContext, import_path, join_alias, rewrite_imports};

/// Rewrites imports of registry packages (`@acme/ui`, `@acme/lib/services`)
/// to the project's alias roots.
pub struct CrossPackagePass;

impl RewritePass for CrossPackagePass {
    fn name(&self) -> &'static str {
        "cross-package"
    }

    fn rewrite<'c>(&self, content: &'c str, ctx: &TransformContext<'_>) -> Cow<'c, str> {
        rewrite_imports(content, |import| rewrite_specifier(import, ctx))
    }
}

fn rewrite_specifier(import: &ImportRef<'_>, ctx: &TransformContext<'_>) -> Option<String> {
    let (package, subpath) = ctx.registry.package_for_specifier(import.specifier)?;
    let rewritten = match package.kind {
        PackageKind::Components => components_target(ctx, subpath),
        PackageKind::Component => component_target(ctx, package, subpath),
        PackageKind::Lib => lib_target(ctx, package, subpath, import.kind == ImportKind::TypeOnly),
    };
    Some(rewritten)
}

/// `@acme/ui` -> components root; `@acme/ui/DataTable` -> that component's entry file.
fn components_target(ctx: &TransformContext<'_>, subpath: &str) -> String {
    let alias = &ctx.aliases.components;
    if subpath.is_empty() {
        return join_alias(alias, "");
    }
    let (first, rest) = subpath.split_once('/').unwrap_or((subpath, ""));
    if let Some(entry) = ctx.registry.find_component(strip_script_extension(first)) {
        if let Some(found) = lookup_or_primary(&entry.files, rest) {
            return join_alias(alias, import_path(&found.target_path));
        }
    }
    join_alias(alias, &kebab_path(subpath))
}

/// Single-component packages resolve subpaths through the component's own mappings.
fn component_target(ctx: &TransformContext<'_>, package: &RegistryPackage, subpath: &str) -> String {
    let alias = &ctx.aliases.components;
    let entry = package
        .component
        .as_deref()
        .and_then(|name| ctx.registry.component(name));
    let Some(entry) = entry else {
        return join_alias(alias, &kebab_path(subpath));
    };
    match lookup_or_primary(&entry.files, subpath) {
        Some(found) => join_alias(alias, import_path(&found.target_path)),
        None => {
            let dir = entry.files.first().map(|f| parent_of(&f.target_path)).unwrap_or("");
            join_alias(alias, &format!("{dir}/{}", kebab_path(subpath)))
        }
    }
}

/// Library packages either pin a module or name it in the first subpath segment.
/// Type-only imports prefer the module's `-types` file when it has one.
fn lib_target(ctx: &TransformContext<'_>, package: &RegistryPackage, subpath: &str, type_only: bool) -> String {
    let alias = &ctx.aliases.lib;
    let (module_name, rest) = match package.module.as_deref() {
        Some(module) => (module, subpath),
        None => subpath.split_once('/').unwrap_or((subpath, "")),
    };
    if module_name.is_empty() {
        return join_alias(alias, "");
    }
    let module = ctx
        .registry
        .lib_module(module_name)
        .or_else(|| ctx.registry.lib_module(&to_kebab_case(module_name)));
    let Some(module) = module else {
        return join_alias(alias, &kebab_path(&format!("{module_name}/{rest}")));
    };
    if rest.is_empty() && type_only {
        if let Some(types) = types_split(&module.files) {
            return join_alias(alias, import_path(&types.target_path));
        }
    }
    match lookup_or_primary(&module.files, rest) {
        Some(found) => join_alias(alias, import_path(&found.target_path)),
        None => {
            let dir = module.files.first().map(|f| parent_of(&f.target_path)).unwrap_or("");
            join_alias(alias, &format!("{dir}/{}", kebab_path(rest)))
        }
    }
}

/// The mapping whose target stem ends in `-types`, if the module splits its types out.
fn types_split(files: &[FileMapping]) -> Option<&FileMapping> {
    files
        .iter()
        .find(|f| strip_script_extension(&f.target_path).ends_with("-types"))
}

/// An empty subpath means the entry file; otherwise look the subpath up.
fn lookup_or_primary<'f>(files: &'f [FileMapping], subpath: &str) -> Option<&'f FileMapping> {
    if subpath.is_empty() {
        files.first()
    } else {
        lookup_subpath(files, subpath)
    }
}

/// Matches a package subpath against source paths, tolerating a `src/` prefix,
/// `index` files, a missing script extension and casing differences.
fn lookup_subpath<'f>(files: &'f [FileMapping], subpath: &str) -> Option<&'f FileMapping> {
    let wanted = to_kebab_case(strip_script_extension(subpath.trim_matches('/')));
    files.iter().find(|f| {
        source_keys(&f.source_path)
            .iter()
            .any(|key| to_kebab_case(key).eq_ignore_ascii_case(&wanted))
    })
}

fn source_keys(source: &str) -> Vec<&str> {
    let stem = strip_script_extension(source);
    let mut keys = vec![stem];
    if let Some(rest) = stem.strip_prefix("src/") {
        keys.push(rest);
    }
    for key in keys.clone() {
        if let Some(dir) = key.strip_suffix("/index") {
            keys.push(dir);
        }
    }
    if let Some(file) = stem.rsplit('/').next() {
        if file != "index" {
            keys.push(file);
        }
    }
    keys
}

fn kebab_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let stem = strip_script_extension(segment);
            to_kebab_case(stem) + &segment[stem.len()..]
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InstallUnit;
    use crate::transform::test_support::{aliases, registry};

    fn run(content: &str) -> String {
        let registry = registry();
        let aliases = aliases();
        let unit = InstallUnit::from(&registry.components[0]);
        let ctx = TransformContext { registry: &registry, unit, file: &unit.files[0], aliases: &aliases };
        CrossPackagePass.rewrite(content, &ctx).into_owned()
    }

    #[test]
    fn test_types_package_goes_to_lib_alias() {
        assert_eq!(
            run("import { User } from \"@acme/types\";"),
            "import { User } from \"@/lib/x/types\";"
        );
        assert_eq!(
            run("import type { User } from '@acme/lib/types';"),
            "import type { User } from '@/lib/x/types';"
        );
    }

    #[test]
    fn test_component_export_goes_to_components_alias() {
        assert_eq!(
            run("import { Button } from \"@acme/ui\";"),
            "import { Button } from \"@/components/ui\";"
        );
        assert_eq!(
            run("import { InputBlockEditor } from \"@acme/ui/InputBlockEditor\";"),
            "import { InputBlockEditor } from \"@/components/ui/input-block-editor\";"
        );
        assert_eq!(
            run("export * from \"@acme/ui/internal/FocusRing\";"),
            "export * from \"@/components/ui/internal/focus-ring\";"
        );
    }

    #[test]
    fn test_type_only_imports_use_types_split() {
        assert_eq!(
            run("import type { Service } from \"@acme/lib/services\";\nimport { api } from \"@acme/lib/services\";"),
            "import type { Service } from \"@/lib/x/services-types\";\nimport { api } from \"@/lib/x/services\";"
        );
    }

    #[test]
    fn test_multi_file_package_uses_mapping_table() {
        assert_eq!(
            run("import { Table } from \"@acme/table\";\nimport { TableRow } from \"@acme/table/parts/TableRow\";\nimport(\"@acme/table/TableHeader\");"),
            "import { Table } from \"@/components/ui/table/table\";\nimport { TableRow } from \"@/components/ui/table/table-row\";\nimport(\"@/components/ui/table/table-header\");"
        );
    }

    #[test]
    fn test_unrelated_packages_untouched() {
        let content = "import React from 'react';\nimport { x } from \"@acme/uikit\";";
        assert_eq!(run(content), content);
    }
}
