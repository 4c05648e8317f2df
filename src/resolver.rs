//! Dependency closure over the registry.
//!
//! Nodes are keyed by a namespaced id (`component:input`, `lib:types`) so a
//! component and a library module that share a bare name stay distinct. The
//! visited set is what makes resolution terminate on cyclic manifests; the
//! display tree has its own depth bound, which is presentation only.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use serde::Serialize;
use tracing::{debug, warn};
use crate::error::GraftError;
use crate::registry::{InstallUnit, LibModule, Registry, RegistryEntry, UnitKind};

/// Depth used by `graft tree` when `--depth` is not given.
pub const DEFAULT_TREE_DEPTH: usize = 3;

/// Namespaced identity of a closure member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub kind: UnitKind,
    pub name: String,
}

impl NodeId {
    pub fn component(name: &str) -> Self {
        NodeId { kind: UnitKind::Component, name: name.to_string() }
    }

    pub fn lib(name: &str) -> Self {
        NodeId { kind: UnitKind::Lib, name: name.to_string() }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// A requested name that matched no component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentNotFound {
    pub name: String,
    pub suggestions: Vec<String>,
}

impl From<ComponentNotFound> for GraftError {
    fn from(value: ComponentNotFound) -> Self {
        GraftError::ComponentNotFound {
            name: value.name,
            suggestions: value.suggestions,
        }
    }
}

/// A dependency name declared by a unit that the registry does not contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDependency {
    pub from: String,
    pub name: String,
    pub kind: UnitKind,
}

/// The closure of a request, in resolution order (dependencies first).
#[derive(Debug, Default)]
pub struct Resolution<'r> {
    pub components: Vec<&'r RegistryEntry>,
    pub lib_modules: Vec<&'r LibModule>,
    pub external_packages: Vec<String>,
    pub not_found: Vec<ComponentNotFound>,
    pub unresolved: Vec<UnresolvedDependency>,
    order: Vec<InstallUnit<'r>>,
}

impl<'r> Resolution<'r> {
    /// Every unit of the closure, dependencies before their dependents.
    pub fn units(&self) -> &[InstallUnit<'r>] {
        &self.order
    }

    /// Namespaced ids of the closure, for set comparisons.
    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.order
            .iter()
            .map(|u| NodeId { kind: u.kind, name: u.name.to_string() })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

struct Walker<'r> {
    registry: &'r Registry,
    visited: HashSet<NodeId>,
    externals: BTreeSet<String>,
    resolution: Resolution<'r>,
}

impl<'r> Walker<'r> {
    fn visit_component(&mut self, entry: &'r RegistryEntry) {
        if !self.visited.insert(NodeId::component(&entry.name)) {
            return;
        }
        let from = NodeId::component(&entry.name).to_string();
        for name in &entry.internal_dependencies {
            match self.registry.lib_module(name) {
                Some(module) => self.visit_lib(module),
                None => self.unresolved(&from, name, UnitKind::Lib),
            }
        }
        for name in &entry.registry_dependencies {
            match self.registry.component(name) {
                Some(dep) => self.visit_component(dep),
                None => self.unresolved(&from, name, UnitKind::Component),
            }
        }
        self.externals.extend(entry.dependencies.iter().cloned());
        self.resolution.components.push(entry);
        self.resolution.order.push(InstallUnit::from(entry));
    }

    fn visit_lib(&mut self, module: &'r LibModule) {
        if !self.visited.insert(NodeId::lib(&module.name)) {
            return;
        }
        let from = NodeId::lib(&module.name).to_string();
        for name in &module.internal_dependencies {
            match self.registry.lib_module(name) {
                Some(dep) => self.visit_lib(dep),
                None => self.unresolved(&from, name, UnitKind::Lib),
            }
        }
        self.externals.extend(module.dependencies.iter().cloned());
        self.resolution.lib_modules.push(module);
        self.resolution.order.push(InstallUnit::from(module));
    }

    fn unresolved(&mut self, from: &str, name: &str, kind: UnitKind) {
        warn!(%from, dependency = %name, %kind, "dependency not found in registry");
        self.resolution.unresolved.push(UnresolvedDependency {
            from: from.to_string(),
            name: name.to_string(),
            kind,
        });
    }
}

/// Resolves the requested component names into their full closure.
///
/// Unknown names are collected in `not_found` with suggestions; the other
/// names still resolve.
pub fn resolve<'r, S: AsRef<str>>(registry: &'r Registry, requested: &[S]) -> Resolution<'r> {
    let mut walker = Walker {
        registry,
        visited: HashSet::new(),
        externals: BTreeSet::new(),
        resolution: Resolution::default(),
    };
    for name in requested {
        let name = name.as_ref();
        match registry.find_component(name) {
            Some(entry) => {
                debug!(requested = %name, component = %entry.name, "resolving");
                walker.visit_component(entry);
            }
            None => walker.resolution.not_found.push(ComponentNotFound {
                name: name.to_string(),
                suggestions: registry.suggestions(name),
            }),
        }
    }
    let mut resolution = walker.resolution;
    resolution.external_packages = walker.externals.into_iter().collect();
    resolution
}

/// Display tree of one component's closure.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub name: String,
    pub kind: UnitKind,
    pub version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
    /// Children exist below the depth limit.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    /// The node already appears on the path from the root.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub circular: bool,
    /// The name is declared as a dependency but missing from the registry.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,
}

impl TreeNode {
    fn leaf(id: &NodeId, version: &str) -> Self {
        TreeNode {
            name: id.name.clone(),
            kind: id.kind,
            version: version.to_string(),
            children: Vec::new(),
            truncated: false,
            circular: false,
            missing: false,
        }
    }

    /// Renders the tree with box-drawing guides, one node per line.
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.label());
        self.render_children("", &mut out);
        out
    }

    fn label(&self) -> String {
        let mut label = match self.kind {
            UnitKind::Component => self.name.clone(),
            UnitKind::Lib => format!("{} (lib)", self.name),
        };
        if !self.version.is_empty() {
            label.push_str(&format!(" @{}", self.version));
        }
        if self.circular {
            label.push_str(" (circular)");
        }
        if self.missing {
            label.push_str(" (missing)");
        }
        if self.truncated {
            label.push_str(" …");
        }
        label
    }

    fn render_children(&self, prefix: &str, out: &mut String) {
        let count = self.children.len();
        for (i, child) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            out.push_str(&format!("{prefix}{branch}{}\n", child.label()));
            let next = format!("{prefix}{}", if last { "    " } else { "│   " });
            child.render_children(&next, out);
        }
    }
}

/// Builds the display tree for one component, cut off below `max_depth` levels.
pub fn build_tree(registry: &Registry, name: &str, max_depth: usize) -> Result<TreeNode, ComponentNotFound> {
    let entry = registry.find_component(name).ok_or_else(|| ComponentNotFound {
        name: name.to_string(),
        suggestions: registry.suggestions(name),
    })?;
    let mut path = Vec::new();
    Ok(component_node(registry, entry, 0, max_depth, &mut path))
}

fn component_node(
    registry: &Registry,
    entry: &RegistryEntry,
    depth: usize,
    max_depth: usize,
    path: &mut Vec<NodeId>,
) -> TreeNode {
    let id = NodeId::component(&entry.name);
    let mut node = TreeNode::leaf(&id, &entry.version);
    if path.contains(&id) {
        node.circular = true;
        return node;
    }
    let has_children = !entry.internal_dependencies.is_empty() || !entry.registry_dependencies.is_empty();
    if depth >= max_depth {
        node.truncated = has_children;
        return node;
    }
    path.push(id);
    for lib in &entry.internal_dependencies {
        node.children.push(match registry.lib_module(lib) {
            Some(module) => lib_node(registry, module, depth + 1, max_depth, path),
            None => missing_node(NodeId::lib(lib)),
        });
    }
    for dep in &entry.registry_dependencies {
        node.children.push(match registry.component(dep) {
            Some(dep) => component_node(registry, dep, depth + 1, max_depth, path),
            None => missing_node(NodeId::component(dep)),
        });
    }
    path.pop();
    node
}

fn lib_node(
    registry: &Registry,
    module: &LibModule,
    depth: usize,
    max_depth: usize,
    path: &mut Vec<NodeId>,
) -> TreeNode {
    let id = NodeId::lib(&module.name);
    let mut node = TreeNode::leaf(&id, &module.version);
    if path.contains(&id) {
        node.circular = true;
        return node;
    }
    if depth >= max_depth {
        node.truncated = !module.internal_dependencies.is_empty();
        return node;
    }
    path.push(id);
    for lib in &module.internal_dependencies {
        node.children.push(match registry.lib_module(lib) {
            Some(dep) => lib_node(registry, dep, depth + 1, max_depth, path),
            None => missing_node(NodeId::lib(lib)),
        });
    }
    path.pop();
    node
}

fn missing_node(id: NodeId) -> TreeNode {
    let mut node = TreeNode::leaf(&id, "");
    node.missing = true;
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::from_json(
            r#"{
            "registryVersion": "2.0.0",
            "packages": [
                { "name": "@acme/ui", "kind": "components" },
                { "name": "@acme/lib", "kind": "lib" }
            ],
            "components": [
                { "name": "form", "package": "@acme/ui", "version": "2.0.0",
                  "files": [{ "sourcePath": "Form.tsx", "targetPath": "form.tsx" }],
                  "registryDependencies": ["input", "button"], "internalDependencies": ["hooks"],
                  "dependencies": ["react-hook-form"] },
                { "name": "input", "package": "@acme/ui", "version": "2.0.0",
                  "files": [{ "sourcePath": "Input.tsx", "targetPath": "input.tsx" }],
                  "registryDependencies": ["form"], "internalDependencies": ["types"],
                  "dependencies": ["clsx"] },
                { "name": "button", "package": "@acme/ui", "version": "2.0.0",
                  "files": [{ "sourcePath": "Button.tsx", "targetPath": "button.tsx" }],
                  "dependencies": ["clsx"] },
                { "name": "types", "title": "Type Badge", "package": "@acme/ui", "version": "2.0.0",
                  "files": [{ "sourcePath": "Types.tsx", "targetPath": "types.tsx" }],
                  "internalDependencies": ["types"] }
            ],
            "lib": {
                "types": { "package": "@acme/lib", "files": [{ "sourcePath": "types.ts", "targetPath": "types.ts" }],
                           "internalDependencies": ["hooks"] },
                "hooks": { "package": "@acme/lib", "files": [{ "sourcePath": "hooks.ts", "targetPath": "hooks.ts" }],
                           "internalDependencies": ["types"], "dependencies": ["react"] }
            }
        }"#,
            "test",
        )
        .unwrap()
    }

    #[test]
    fn test_cycles_terminate_with_deduplicated_closure() {
        let registry = registry();
        let resolution = resolve(&registry, &["form"]);
        let names: Vec<_> = resolution.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"form") && names.contains(&"input") && names.contains(&"button"));
        assert_eq!(resolution.lib_modules.len(), 2);
        assert_eq!(resolution.external_packages, vec!["clsx", "react", "react-hook-form"]);
        assert!(resolution.not_found.is_empty());
    }

    #[test]
    fn test_dependencies_come_before_dependents() {
        let registry = registry();
        let resolution = resolve(&registry, &["form"]);
        let order: Vec<String> = resolution
            .units()
            .iter()
            .map(|u| format!("{}:{}", u.kind, u.name))
            .collect();
        let pos = |id: &str| order.iter().position(|o| o == id).unwrap();
        assert!(pos("lib:hooks") < pos("component:form"));
        assert!(pos("lib:types") < pos("component:input"));
        assert!(pos("component:button") < pos("component:form"));
        assert_eq!(order.last().unwrap(), "component:form");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let registry = registry();
        let first = resolve(&registry, &["input", "button"]);
        let second = resolve(&registry, &["button", "input"]);
        assert_eq!(first.node_ids(), second.node_ids());
        assert_eq!(first.external_packages, second.external_packages);
    }

    #[test]
    fn test_component_and_lib_with_same_name_stay_distinct() {
        let registry = registry();
        let resolution = resolve(&registry, &["types"]);
        let ids = resolution.node_ids();
        assert!(ids.contains(&NodeId::component("types")));
        assert!(ids.contains(&NodeId::lib("types")));
        assert!(ids.contains(&NodeId::lib("hooks")));
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_unknown_names_do_not_block_siblings() {
        let registry = registry();
        let resolution = resolve(&registry, &["buton", "input"]);
        assert_eq!(resolution.not_found.len(), 1);
        assert_eq!(resolution.not_found[0].name, "buton");
        assert!(resolution.components.iter().any(|c| c.name == "input"));
    }

    #[test]
    fn test_missing_dependencies_are_reported_lazily() {
        let mut registry = registry();
        registry.components[2].registry_dependencies.push("ghost".to_string());
        let resolution = resolve(&registry, &["button"]);
        assert_eq!(resolution.unresolved.len(), 1);
        assert_eq!(resolution.unresolved[0].from, "component:button");
        assert_eq!(resolution.unresolved[0].name, "ghost");
        assert_eq!(resolution.components.len(), 1);
    }

    #[test]
    fn test_tree_is_bounded_and_marks_cycles() {
        let registry = registry();
        let tree = build_tree(&registry, "form", 1).unwrap();
        assert_eq!(tree.children.len(), 3);
        let input = tree.children.iter().find(|c| c.name == "input").unwrap();
        assert!(input.truncated);
        assert!(input.children.is_empty());

        let deep = build_tree(&registry, "form", DEFAULT_TREE_DEPTH).unwrap();
        let input = deep.children.iter().find(|c| c.name == "input").unwrap();
        let back = input.children.iter().find(|c| c.name == "form").unwrap();
        assert!(back.circular);
        assert!(deep.render().contains("└── "));
    }

    #[test]
    fn test_tree_unknown_component() {
        let registry = registry();
        let err = build_tree(&registry, "inpt", 3).unwrap_err();
        assert_eq!(err.name, "inpt");
    }
}
