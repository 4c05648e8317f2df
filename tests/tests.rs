use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use graft::*;

const MANIFEST: &str = r#"{
    "registryVersion": "1.0.0",
    "packages": [
        { "name": "@acme/ui", "dir": "packages/ui", "kind": "components" },
        { "name": "@acme/lib", "dir": "packages/lib", "kind": "lib" }
    ],
    "components": [
        {
            "name": "button", "title": "Button", "category": "actions", "package": "@acme/ui",
            "files": [{ "sourcePath": "src/Button.tsx", "targetPath": "button.tsx" }],
            "internalDependencies": ["utils"], "dependencies": ["clsx"], "version": "1.0.0"
        },
        {
            "name": "input-group", "title": "Input Group", "category": "forms", "package": "@acme/ui",
            "files": [{ "sourcePath": "src/InputGroup.tsx", "targetPath": "input-group.tsx" }],
            "registryDependencies": ["button"], "version": "1.0.0"
        }
    ],
    "lib": {
        "utils": { "package": "@acme/lib", "files": [{ "sourcePath": "utils/index.ts", "targetPath": "utils.ts" }] }
    }
}"#;

const BUTTON: &str = "\"use client\";\nimport { cn } from \"@acme/lib/utils\";\n\nexport function Button() {\n  return cn(\"btn\");\n}\n";
const INPUT_GROUP: &str = "import { Button } from \"@acme/ui/button\";\nimport { FieldLabel } from \"./FieldLabel\";\n\nexport function InputGroup() {}\n";
const UTILS: &str = "export function cn(...names: string[]) {\n  return names.join(\" \");\n}\n";

/// Writes the fixture registry and an initialized project into a temp dir.
fn setup_tests() -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let registry_root = temp_dir.path().join("registry");
    fs::create_dir_all(registry_root.join("packages/ui/src")).unwrap();
    fs::create_dir_all(registry_root.join("packages/lib/utils")).unwrap();
    fs::write(registry_root.join("registry.json"), MANIFEST).unwrap();
    fs::write(registry_root.join("packages/ui/src/Button.tsx"), BUTTON).unwrap();
    fs::write(registry_root.join("packages/ui/src/InputGroup.tsx"), INPUT_GROUP).unwrap();
    fs::write(registry_root.join("packages/lib/utils/index.ts"), UTILS).unwrap();

    let project = temp_dir.path().join("app");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("tsconfig.json"), "{}").unwrap();
    let options = InitOptions {
        registry: Some(registry_root.display().to_string()),
        ..InitOptions::default()
    };
    init_project(&project, &options).unwrap();
    (temp_dir, registry_root, project)
}

/// Resolves `names`, installs them and commits the config.
fn install(
    project: &Path,
    registry_root: &Path,
    names: &[&str],
    resolver: &mut dyn ConflictResolver,
) -> (InstallReport, bool) {
    let source = RegistrySource::parse(&registry_root.display().to_string(), project);
    let registry = load_registry(&source).unwrap();
    let config_path = get_config_path(project);
    let mut config = ProjectConfig::load(&config_path).unwrap();
    let resolution = resolve(&registry, names);
    let transformer = graft::transform::TextTransformer::default();
    let now = chrono::Utc::now();
    let report = {
        let ctx = InstallContext {
            registry: &registry,
            source: &source,
            transformer: &transformer,
            config: &config,
            project_root: project,
            now,
        };
        install_units(&ctx, resolution.units(), resolver)
    };
    let committed = report
        .commit(&mut config, &config_path, &registry, "fixture", now)
        .unwrap();
    (report, committed)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use graft::*;
    use graft::provenance::{Drift, extract_origin};
    use crate::{install, setup_tests};

    #[test]
    fn test_install_writes_closure_dependencies_first() {
        let (_dir, registry_root, project) = setup_tests();
        let (report, committed) = install(&project, &registry_root, &["Input Group"], &mut KeepExisting);
        assert!(committed);
        let order: Vec<&str> = report.units.iter().map(|u| u.name.as_str()).collect();
        let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(pos("utils") < pos("button"));
        assert!(pos("button") < pos("input-group"));
        assert_eq!(report.written_count(), 3);

        let button = fs::read_to_string(project.join("components/ui/button.tsx")).unwrap();
        assert!(button.starts_with("\"use client\";\n/**\n * @graft-origin @acme/ui/src/Button.tsx"));
        assert!(button.contains("from \"@/lib/utils\""));

        let group = fs::read_to_string(project.join("components/ui/input-group.tsx")).unwrap();
        assert!(group.contains("from \"@/components/ui/button\""));
        assert!(group.contains("from \"./field-label\""));
        assert_eq!(extract_origin(&group).unwrap().version, "1.0.0");

        let utils = fs::read_to_string(project.join("lib/utils.ts")).unwrap();
        assert!(utils.ends_with(UTILS_BODY));

        let config = ProjectConfig::load(get_config_path(&project)).unwrap();
        assert_eq!(config.installed_components, vec!["button", "input-group"]);
        assert_eq!(config.installed_lib, vec!["utils"]);
        assert_eq!(config.component_versions["button"].source, "fixture");
        assert_eq!(config.registry_version, "1.0.0");
    }

    const UTILS_BODY: &str = "return names.join(\" \");\n}\n";

    #[test]
    fn test_second_install_is_up_to_date() {
        let (_dir, registry_root, project) = setup_tests();
        install(&project, &registry_root, &["input-group"], &mut KeepExisting);
        let before = fs::read_to_string(project.join("components/ui/button.tsx")).unwrap();
        let (report, committed) = install(&project, &registry_root, &["input-group"], &mut KeepExisting);
        assert!(committed);
        assert_eq!(report.written_count(), 0);
        assert_eq!(report.up_to_date_count(), 3);
        assert_eq!(fs::read_to_string(project.join("components/ui/button.tsx")).unwrap(), before);
    }

    #[test]
    fn test_user_owned_file_is_kept() {
        let (_dir, registry_root, project) = setup_tests();
        let target = project.join("components/ui/button.tsx");
        fs::write(&target, "export const Button = () => null;\n").unwrap();

        let (report, committed) = install(&project, &registry_root, &["input-group"], &mut KeepExisting);
        assert!(committed);
        assert_eq!(report.conflict_count(), 1);
        let (path, drift) = report
            .units
            .iter()
            .flat_map(|u| u.conflicts())
            .next()
            .unwrap();
        assert_eq!(path, target.as_path());
        assert_eq!(drift, &Drift::Untracked);
        assert_eq!(fs::read_to_string(&target).unwrap(), "export const Button = () => null;\n");

        let config = ProjectConfig::load(get_config_path(&project)).unwrap();
        assert!(!config.is_installed(UnitKind::Component, "button"));
        assert!(config.is_installed(UnitKind::Component, "input-group"));
    }

    #[test]
    fn test_force_overwrites_conflicts() {
        let (_dir, registry_root, project) = setup_tests();
        let target = project.join("components/ui/button.tsx");
        fs::write(&target, "export const Button = () => null;\n").unwrap();

        let (report, _) = install(&project, &registry_root, &["button"], &mut Overwrite);
        assert!(
            report
                .units
                .iter()
                .flat_map(|u| &u.files)
                .any(|f| matches!(f, FileOutcome::Overwritten(p) if p == &target))
        );
        assert!(extract_origin(&fs::read_to_string(&target).unwrap()).is_some());
    }

    #[test]
    fn test_write_failure_leaves_config_unchanged() {
        let (_dir, registry_root, project) = setup_tests();
        let config_path = get_config_path(&project);
        let before = fs::read_to_string(&config_path).unwrap();
        fs::remove_dir_all(project.join("lib")).unwrap();
        fs::write(project.join("lib"), "not a directory").unwrap();

        let (report, committed) = install(&project, &registry_root, &["button"], &mut KeepExisting);
        assert!(!committed);
        assert!(report.has_write_errors());
        let failed: Vec<_> = report.failed().map(|u| u.name.as_str()).collect();
        assert_eq!(failed, vec!["utils"]);
        assert!(project.join("components/ui/button.tsx").exists());
        assert_eq!(fs::read_to_string(&config_path).unwrap(), before);
    }

    #[test]
    fn test_status_reports_local_edits() {
        let (_dir, registry_root, project) = setup_tests();
        install(&project, &registry_root, &["button"], &mut KeepExisting);
        let target = project.join("components/ui/button.tsx");
        let edited = fs::read_to_string(&target).unwrap().replace("\"btn\"", "\"btn btn-primary\"");
        fs::write(&target, edited).unwrap();
        fs::write(project.join("components/ui/mine.tsx"), "export {};\n").unwrap();

        let config = ProjectConfig::load(get_config_path(&project)).unwrap();
        let source = RegistrySource::parse(&registry_root.display().to_string(), &project);
        let registry = load_registry(&source).unwrap();
        let files = project_status(&project, &config, &registry).unwrap();
        let drift = |name: &str| {
            files
                .iter()
                .find(|f| f.path.ends_with(name))
                .map(|f| f.drift.clone())
                .unwrap()
        };
        assert_eq!(drift("button.tsx"), Drift::UpToDate { modified: true });
        assert_eq!(drift("utils.ts"), Drift::UpToDate { modified: false });
        assert_eq!(drift("mine.tsx"), Drift::Untracked);
    }

    #[test]
    fn test_missing_packages_after_install() {
        let (_dir, registry_root, project) = setup_tests();
        let source = RegistrySource::parse(&registry_root.display().to_string(), &project);
        let registry = load_registry(&source).unwrap();
        let resolution = resolve(&registry, &["input-group"]);
        assert_eq!(resolution.external_packages, vec!["clsx"]);
        assert_eq!(missing_packages(&project, &resolution.external_packages).unwrap(), vec!["clsx"]);
    }
}
