//! Extraction engine
//!
//! A stateful [`Visitor`] that walks one unit's [`SyntaxTree`] and fills a
//! [`TranslationUnit`]. Scope is tracked with two stacks of arena indices:
//! one for namespaces and one for the class bodies currently open.
//!
//! Nodes from included files never become classes. Their class names are
//! recorded so relationships to them can be drawn by name. A second definition
//! of an identity within the unit (preprocessor alternatives) is merged into
//! the first one.

use tracing::{debug, trace};

use crate::core::{
    walk, Class, ClassId, ClassParent, Construct, FileId, Member, NamespaceId, NodeId, Operation,
    Parameter, SyntaxNode, SyntaxTree, TranslationUnit, TypeDescriptor, Visit, Visitor,
    NodeKind,
};

use super::types::build_type;

/// Per-unit extraction state
pub struct Engine {
    unit: TranslationUnit,
    namespaces: Vec<NamespaceId>,
    classes: Vec<ClassId>,
    global: Option<NamespaceId>,
    /// Namespace and class names open in included files
    included_scope: Vec<String>,
}

impl Engine {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            unit: TranslationUnit::new(filename),
            namespaces: Vec::new(),
            classes: Vec::new(),
            global: None,
            included_scope: Vec::new(),
        }
    }

    /// Walk `tree` and return the finished unit
    pub fn run(mut self, tree: &SyntaxTree) -> TranslationUnit {
        walk(tree, &mut self);
        debug!(
            classes = self.unit.class_count(),
            namespaces = self.unit.namespace_count(),
            "Extraction completed"
        );
        self.unit
    }

    fn current_class(&self) -> Option<ClassId> {
        self.classes.last().copied()
    }

    /// Where a new class attaches: enclosing class, namespace, or the global namespace
    fn class_parent(&mut self) -> ClassParent {
        if let Some(outer) = self.current_class() {
            return ClassParent::Class(outer);
        }
        if let Some(ns) = self.namespaces.last() {
            return ClassParent::Namespace(*ns);
        }
        let global = match self.global {
            Some(global) => global,
            None => {
                let global = self.unit.add_namespace("", None);
                self.global = Some(global);
                global
            }
        };
        ClassParent::Namespace(global)
    }

    fn enter_namespace(&mut self, node: &SyntaxNode) -> Visit {
        let parent = self.namespaces.last().copied();
        let id = self.unit.add_namespace(node.spelling.clone(), parent);
        self.namespaces.push(id);
        Visit::Continue
    }

    fn enter_class(&mut self, tree: &SyntaxTree, id: NodeId) -> Visit {
        let node = tree.node(id);
        if !node.is_definition {
            trace!(name = node.spelling.as_str(), "Skipping forward declaration");
            return Visit::SkipChildren;
        }
        let Some(kind) = node.kind.class_kind() else {
            return Visit::Continue;
        };

        let template_params: Vec<String> = tree
            .children(id)
            .iter()
            .map(|child| tree.node(*child))
            .filter(|child| child.kind.is_template_parameter() && !child.spelling.is_empty())
            .map(|child| child.spelling.clone())
            .collect();

        let usr = node.usr.clone().unwrap_or_default();
        if let Some(existing) = self.unit.classes_by_usr().get(&usr).copied() {
            debug!(usr = usr.as_str(), "Repeated definition, merging into the first one");
            self.classes.push(existing);
            return Visit::Continue;
        }

        let mut class = Class::new(node.spelling.clone(), usr.clone(), kind);
        class.is_template =
            matches!(node.kind, NodeKind::ClassTemplate(_)) || !template_params.is_empty();
        class.template_params = template_params;

        let parent = self.class_parent();
        let class_id = self.unit.add_class(class, parent);
        if !usr.is_empty() {
            self.unit.register(usr, class_id);
        }
        trace!(name = node.spelling.as_str(), "Class extracted");
        self.classes.push(class_id);
        Visit::Continue
    }

    fn add_member(&mut self, tree: &SyntaxTree, node: &SyntaxNode) -> Visit {
        let Some(class) = self.current_class() else {
            return Visit::SkipChildren;
        };
        let ty = node
            .ty
            .map(|ty| build_type(tree, ty))
            .unwrap_or_default();
        let mut member = Member::new(node.spelling.clone(), ty)
            .with_access(node.access)
            .with_static(node.storage_static || node.kind == NodeKind::VarDecl);
        member.usr = node.usr.clone();
        let class = self.unit.class_mut(class);
        if class.member(&member.name).is_none() {
            class.members.push(member);
        }
        Visit::SkipChildren
    }

    fn add_operation(&mut self, tree: &SyntaxTree, id: NodeId) -> Visit {
        let Some(class) = self.current_class() else {
            return Visit::SkipChildren;
        };
        let node = tree.node(id);
        let return_type = if node.kind.has_return_type() {
            node.result_type
                .map(|ty| build_type(tree, ty))
                .unwrap_or_default()
        } else {
            TypeDescriptor::default()
        };

        let params = tree
            .children(id)
            .iter()
            .map(|child| tree.node(*child))
            .filter(|child| child.kind == NodeKind::ParmDecl)
            .map(|param| {
                let ty = param
                    .ty
                    .map(|ty| build_type(tree, ty))
                    .unwrap_or_default();
                Parameter::new(ty, param.spelling.clone())
            })
            .collect();

        let operation = Operation {
            name: node.spelling.clone(),
            return_type,
            params,
            is_static: node.is_static,
            is_const: node.is_const,
            is_virtual: node.is_virtual || node.is_pure_virtual,
            is_pure_virtual: node.is_pure_virtual,
            is_inline: node.is_inline,
            access: node.access,
            usr: node.usr.clone().unwrap_or_default(),
        };
        let class = self.unit.class_mut(class);
        if !class.has_operation(&operation) {
            class.operations.push(operation);
        }
        Visit::SkipChildren
    }

    fn add_base(&mut self, tree: &SyntaxTree, node: &SyntaxNode) -> Visit {
        let Some(class) = self.current_class() else {
            return Visit::SkipChildren;
        };
        let resolved = node
            .referenced
            .and_then(|decl| tree.node(decl).usr.clone())
            .filter(|usr| !usr.is_empty());
        let base = match resolved {
            Some(usr) => usr,
            None => {
                let placeholder = if node.spelling.is_empty() {
                    node.ty
                        .map(|ty| tree.type_info(ty).spelling.clone())
                        .unwrap_or_default()
                } else {
                    node.spelling.clone()
                };
                debug!(
                    base = placeholder.as_str(),
                    "Base has no identity, using spelled type as placeholder"
                );
                placeholder
            }
        };
        let class = self.unit.class_mut(class);
        if !base.is_empty() && !class.bases.contains(&base) {
            class.bases.push(base);
        }
        Visit::SkipChildren
    }

    /// Record class names from an included file without extracting them
    fn enter_included(&mut self, node: &SyntaxNode, construct: Construct) -> Visit {
        match construct {
            Construct::Namespace => {
                self.included_scope.push(node.spelling.clone());
                Visit::Continue
            }
            Construct::Class => {
                if let Some(usr) = node.usr.as_deref() {
                    let name = self.included_name(&node.spelling);
                    self.unit.add_external(usr, name);
                }
                if node.is_definition && node.kind.class_kind().is_some() {
                    self.included_scope.push(node.spelling.clone());
                    Visit::Continue
                } else {
                    Visit::SkipChildren
                }
            }
            Construct::Other => Visit::Continue,
            _ => Visit::SkipChildren,
        }
    }

    /// Qualified name of a class declared at the current included scope
    fn included_name(&self, name: &str) -> String {
        let outer = self
            .namespaces
            .last()
            .map(|ns| self.unit.namespace_path(*ns))
            .unwrap_or_default();
        std::iter::once(outer.as_str())
            .chain(self.included_scope.iter().map(String::as_str))
            .chain(std::iter::once(name))
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("::")
    }
}

impl Visitor for Engine {
    fn enter(&mut self, tree: &SyntaxTree, id: NodeId, construct: Construct) -> Visit {
        let node = tree.node(id);
        if node.file != FileId::MAIN {
            return self.enter_included(node, construct);
        }
        match construct {
            Construct::Namespace => self.enter_namespace(node),
            Construct::Class => self.enter_class(tree, id),
            Construct::Field => self.add_member(tree, node),
            Construct::Operation => self.add_operation(tree, id),
            Construct::BaseSpecifier => self.add_base(tree, node),
            Construct::Other => Visit::Continue,
        }
    }

    fn leave(&mut self, tree: &SyntaxTree, id: NodeId, construct: Construct) {
        if tree.node(id).file != FileId::MAIN {
            if matches!(construct, Construct::Namespace | Construct::Class) {
                self.included_scope.pop();
            }
            return;
        }
        match construct {
            Construct::Namespace => {
                self.namespaces.pop();
            }
            Construct::Class if tree.node(id).kind.class_kind().is_some() => {
                self.classes.pop();
            }
            _ => {}
        }
    }
}

/// Run the engine over one tree
pub fn extract_tree(tree: &SyntaxTree) -> TranslationUnit {
    Engine::new(tree.main_file()).run(tree)
}
