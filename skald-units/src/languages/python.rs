use crate::{CodeUnit, ExtractOptions, ImportRef};

use super::LanguageSupport;
use super::helpers::{child_by_field, dotted_name, node_range, node_text, whole_lines};

#[derive(Debug)]
pub struct PythonSupport;

impl LanguageSupport for PythonSupport {
    fn id(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn extract_units(
        &self,
        tree: &tree_sitter::Tree,
        source: &str,
        options: &ExtractOptions,
    ) -> Vec<CodeUnit> {
        let mut units = Vec::new();
        let mut scope: Vec<String> = Vec::new();

        walk_block(tree.root_node(), source, options, &mut scope, &mut units);

        units
    }

    fn extract_imports(&self, tree: &tree_sitter::Tree, source: &str) -> Vec<ImportRef> {
        let mut imports = Vec::new();
        let mut stack = vec![tree.root_node()];

        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" => {
                    let mut cursor = node.walk();
                    for name in node.children_by_field_name("name", &mut cursor) {
                        if let Some(module) = imported_name(name, source) {
                            imports.push(ImportRef {
                                module: module.to_string(),
                                level: 0,
                                names: Vec::new(),
                                span: node_range(node),
                            });
                        }
                    }
                }
                "import_from_statement" => {
                    if let Some(import) = from_import(node, source) {
                        imports.push(import);
                    }
                }
                _ => {
                    let mut cursor = node.walk();
                    let children: Vec<_> = node.named_children(&mut cursor).collect();
                    stack.extend(children.into_iter().rev());
                }
            }
        }

        imports
    }
}

/// Module path of a `dotted_name` or the `name` of an `aliased_import`.
fn imported_name<'a>(node: tree_sitter::Node<'_>, source: &'a str) -> Option<&'a str> {
    match node.kind() {
        "dotted_name" => Some(node_text(node, source)),
        "aliased_import" => child_by_field(node, "name").map(|n| node_text(n, source)),
        _ => None,
    }
}

/// `from <module> import <names>`, with relative prefixes counted.
fn from_import(node: tree_sitter::Node<'_>, source: &str) -> Option<ImportRef> {
    let module_node = child_by_field(node, "module_name")?;
    let (module, level) = match module_node.kind() {
        "relative_import" => {
            let mut level = 0;
            let mut module = "";
            let mut cursor = module_node.walk();
            for child in module_node.named_children(&mut cursor) {
                match child.kind() {
                    "import_prefix" => level = node_text(child, source).matches('.').count(),
                    "dotted_name" => module = node_text(child, source),
                    _ => {}
                }
            }
            (module, level)
        }
        _ => (node_text(module_node, source), 0),
    };

    let mut names = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.id() == module_node.id() {
            continue;
        }
        if child.kind() == "wildcard_import" {
            names.push("*".to_string());
        } else if let Some(name) = imported_name(child, source) {
            names.push(name.to_string());
        }
    }

    Some(ImportRef {
        module: module.to_string(),
        level,
        names,
        span: node_range(node),
    })
}

/// Visit the statements of a module or block.
///
/// Without `include_nested` only the direct children are inspected, so only
/// top-level definitions are found. With it, every compound statement is
/// descended into as well.
fn walk_block(
    block: tree_sitter::Node<'_>,
    source: &str,
    options: &ExtractOptions,
    scope: &mut Vec<String>,
    units: &mut Vec<CodeUnit>,
) {
    let mut cursor = block.walk();
    for child in block.named_children(&mut cursor) {
        match child.kind() {
            "function_definition" | "decorated_definition" | "class_definition" => {
                visit_definition(child, source, options, scope, units);
            }
            _ if options.include_nested => walk_block(child, source, options, scope, units),
            _ => {}
        }
    }
}

fn visit_definition(
    node: tree_sitter::Node<'_>,
    source: &str,
    options: &ExtractOptions,
    scope: &mut Vec<String>,
    units: &mut Vec<CodeUnit>,
) {
    match node.kind() {
        "function_definition" => {
            let Some(name_node) = child_by_field(node, "name") else {
                return;
            };
            let name = node_text(name_node, source).to_string();

            units.push(CodeUnit {
                qualified_name: dotted_name(scope, &name),
                code: whole_lines(node, source),
                span: node_range(node),
                name: name.clone(),
            });

            if options.include_nested {
                if let Some(body) = child_by_field(node, "body") {
                    scope.push(name);
                    walk_block(body, source, options, scope, units);
                    scope.pop();
                }
            }
        }
        // Decorators are not part of the unit; the `def` line is the declaration.
        "decorated_definition" => {
            if let Some(inner) = child_by_field(node, "definition") {
                visit_definition(inner, source, options, scope, units);
            }
        }
        "class_definition" if options.include_nested => {
            let Some(name_node) = child_by_field(node, "name") else {
                return;
            };
            if let Some(body) = child_by_field(node, "body") {
                scope.push(node_text(name_node, source).to_string());
                walk_block(body, source, options, scope, units);
                scope.pop();
            }
        }
        _ => {}
    }
}
