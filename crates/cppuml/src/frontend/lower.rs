//! Lowering of tree-sitter C++ syntax into a [`SyntaxTree`]
//!
//! Declarations are lowered in source order. Names are looked up lexically:
//! a type spelled `X` inside `a::B` is tried as `a::B::X`, `a::X`, then `X`.
//! Identities follow clang's USR shapes closely enough that the same entity
//! gets the same identity in every unit that declares it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use tree_sitter::{Node, Parser, Tree};

use super::treesitter::{collect_diagnostics, normalize, parse_source};
use super::SearchPaths;
use crate::core::{
    Access, ClassKind, Diagnostic, FileId, NodeId, NodeKind, ParsedUnit, SyntaxNode, TreeBuilder,
    TypeId, TypeInfo, TypeKind,
};

const MAX_INCLUDE_DEPTH: usize = 32;

/// A name visible to lookup
#[derive(Debug, Clone)]
enum Symbol {
    Record {
        usr: String,
        node: NodeId,
    },
    Enum {
        usr: String,
    },
    Alias {
        canonical: TypeKind,
        declaration: Option<String>,
    },
    TemplateParam,
}

#[derive(Debug, Clone)]
struct Scope {
    /// `None` for scopes that add no lookup segment (anonymous namespaces)
    name: Option<String>,
    usr: String,
}

#[derive(Debug, Clone)]
struct TemplateParam {
    name: String,
    kind: NodeKind,
    line: u32,
}

impl TemplateParam {
    fn encoding(&self) -> &'static str {
        match self.kind {
            NodeKind::NonTypeTemplateParameter => "#N",
            NodeKind::TemplateTemplateParameter => "#t",
            _ => "#T",
        }
    }
}

fn template_signature(params: &[TemplateParam]) -> String {
    let encoded: String = params.iter().map(TemplateParam::encoding).collect();
    format!(">{}{}", params.len(), encoded)
}

struct SourceFile<'s> {
    id: FileId,
    path: &'s Path,
    source: &'s str,
}

impl SourceFile<'_> {
    fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }
}

/// Result of walking a declarator chain
struct Declared<'t> {
    ty: Option<TypeId>,
    name: Option<Node<'t>>,
    function: Option<Node<'t>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct DeclFlags {
    is_static: bool,
    is_inline: bool,
    is_virtual: bool,
}

struct MemberContext<'c> {
    class_name: &'c str,
    access: Access,
    template: &'c [TemplateParam],
}

pub(super) struct Lowering<'p> {
    parser: &'p mut Parser,
    search: &'p SearchPaths,
    builder: TreeBuilder,
    symbols: HashMap<String, Symbol>,
    scopes: Vec<Scope>,
    template_params: Vec<Vec<String>>,
    visited: HashSet<PathBuf>,
    diagnostics: Vec<Diagnostic>,
    main_path: PathBuf,
    depth: usize,
}

impl<'p> Lowering<'p> {
    pub(super) fn new(parser: &'p mut Parser, search: &'p SearchPaths, main_path: &Path) -> Self {
        let mut visited = HashSet::new();
        visited.insert(canonical(main_path));
        Self {
            parser,
            search,
            builder: TreeBuilder::new(main_path.display().to_string()),
            symbols: HashMap::new(),
            scopes: Vec::new(),
            template_params: Vec::new(),
            visited,
            diagnostics: Vec::new(),
            main_path: main_path.to_path_buf(),
            depth: 0,
        }
    }

    pub(super) fn lower_main(&mut self, source: &str, tree: &Tree) {
        let main_path = self.main_path.clone();
        let file = SourceFile {
            id: FileId::MAIN,
            path: &main_path,
            source,
        };
        self.lower_file(&file, tree);
    }

    pub(super) fn finish(self) -> ParsedUnit {
        ParsedUnit::new(self.builder.build()).with_diagnostics(self.diagnostics)
    }

    fn lower_file(&mut self, file: &SourceFile<'_>, tree: &Tree) {
        let root = tree.root_node();
        let file_name = file.path.display().to_string();
        collect_diagnostics(root, &file_name, file.source, &mut self.diagnostics);
        let parent = self.builder.root();
        self.lower_items(file, parent, root);
    }

    // ---- scope and lookup ----

    fn scope_usr(&self) -> String {
        self.scopes
            .last()
            .map(|scope| scope.usr.clone())
            .unwrap_or_else(|| "c:".to_string())
    }

    fn lookup_path(&self) -> Vec<&str> {
        self.scopes.iter().filter_map(|s| s.name.as_deref()).collect()
    }

    fn qualify(&self, name: &str) -> String {
        let mut path = self.lookup_path();
        path.push(name);
        path.join("::")
    }

    fn register(&mut self, name: &str, symbol: Symbol) {
        let key = self.qualify(name);
        trace!(key = key.as_str(), "Registered symbol");
        self.symbols.insert(key, symbol);
    }

    fn lookup(&self, key: &str, global: bool) -> Option<Symbol> {
        if !global
            && !key.contains("::")
            && self
                .template_params
                .iter()
                .any(|frame| frame.iter().any(|param| param == key))
        {
            return Some(Symbol::TemplateParam);
        }
        if global {
            return self.symbols.get(key).cloned();
        }
        let path = self.lookup_path();
        (0..=path.len()).rev().find_map(|depth| {
            let candidate = if depth == 0 {
                key.to_string()
            } else {
                format!("{}::{}", path[..depth].join("::"), key)
            };
            self.symbols.get(&candidate).cloned()
        })
    }

    // ---- namespace level ----

    fn lower_items(&mut self, file: &SourceFile<'_>, parent: NodeId, container: Node<'_>) {
        let mut cursor = container.walk();
        for child in container.named_children(&mut cursor) {
            self.lower_item(file, parent, child);
        }
    }

    fn lower_item(&mut self, file: &SourceFile<'_>, parent: NodeId, node: Node<'_>) {
        match node.kind() {
            "namespace_definition" => self.lower_namespace(file, parent, node),
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.lower_class(file, parent, node, &[]);
            }
            "enum_specifier" => self.lower_enum(file, parent, node, Access::None),
            "template_declaration" => self.lower_template(file, parent, node, None),
            "declaration" => {
                if let Some(ty) = node.child_by_field_name("type") {
                    self.lower_type_definition(file, parent, ty, Access::None);
                }
            }
            "alias_declaration" => self.lower_alias(file, parent, node, Access::None),
            "type_definition" => self.lower_typedef(file, parent, node, Access::None),
            "linkage_specification" => {
                if let Some(body) = node.child_by_field_name("body") {
                    if body.kind() == "declaration_list" {
                        self.lower_items(file, parent, body);
                    } else {
                        self.lower_item(file, parent, body);
                    }
                }
            }
            "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif"
            | "preproc_elifdef" | "ERROR" => self.lower_items(file, parent, node),
            "preproc_include" => self.lower_include(file, parent, node),
            _ => {}
        }
    }

    fn lower_namespace(&mut self, file: &SourceFile<'_>, parent: NodeId, node: Node<'_>) {
        let segments: Vec<String> = match node.child_by_field_name("name") {
            Some(name) => file
                .text(name)
                .split("::")
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };
        let line = line_of(node);

        let mut current = parent;
        let mut pushed = 0;
        if segments.is_empty() {
            let usr = format!("{}@aN", self.scope_usr());
            current = self.builder.add_node(
                current,
                SyntaxNode::new(NodeKind::Namespace, "")
                    .with_usr(usr.clone())
                    .in_file(file.id, line)
                    .definition(),
            );
            self.scopes.push(Scope { name: None, usr });
            pushed = 1;
        }
        for segment in segments {
            let usr = format!("{}@N@{}", self.scope_usr(), segment);
            current = self.builder.add_node(
                current,
                SyntaxNode::new(NodeKind::Namespace, segment.clone())
                    .with_usr(usr.clone())
                    .in_file(file.id, line)
                    .definition(),
            );
            self.scopes.push(Scope {
                name: Some(segment),
                usr,
            });
            pushed += 1;
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.lower_items(file, current, body);
        }
        for _ in 0..pushed {
            self.scopes.pop();
        }
    }

    fn lower_include(&mut self, file: &SourceFile<'_>, parent: NodeId, node: Node<'_>) {
        let Some(path_node) = node.child_by_field_name("path") else {
            return;
        };
        let raw = file.text(path_node).trim();
        let (name, including_dir) = if path_node.kind() == "system_lib_string" {
            (raw.trim_start_matches('<').trim_end_matches('>'), None)
        } else {
            (raw.trim_matches('"'), file.path.parent())
        };
        if self.depth >= MAX_INCLUDE_DEPTH {
            debug!(include = name, "Include depth limit reached, skipping");
            return;
        }
        let Some(resolved) = self.search.resolve(name, including_dir) else {
            trace!(include = name, "Header not found, skipping");
            return;
        };
        if !self.visited.insert(canonical(&resolved)) {
            return;
        }
        let source = match std::fs::read_to_string(&resolved) {
            Ok(source) => source,
            Err(e) => {
                debug!(header = %resolved.display(), error = %e, "Unreadable header, skipping");
                return;
            }
        };
        let Some(tree) = parse_source(self.parser, &source) else {
            debug!(header = %resolved.display(), "Header produced no tree, skipping");
            return;
        };

        let id = self.builder.add_file(resolved.display().to_string());
        let header = SourceFile {
            id,
            path: &resolved,
            source: &source,
        };
        let file_name = resolved.display().to_string();
        collect_diagnostics(tree.root_node(), &file_name, &source, &mut self.diagnostics);

        self.depth += 1;
        self.lower_items(&header, parent, tree.root_node());
        self.depth -= 1;
    }

    // ---- records ----

    /// Lower a class, struct or union; anonymous records produce no node
    fn lower_class(
        &mut self,
        file: &SourceFile<'_>,
        parent: NodeId,
        node: Node<'_>,
        template: &[TemplateParam],
    ) -> Option<NodeId> {
        let kind = match node.kind() {
            "class_specifier" => ClassKind::Class,
            "struct_specifier" => ClassKind::Struct,
            _ => ClassKind::Union,
        };
        let name = last_segment(file, node.child_by_field_name("name")?);

        let segment = if !template.is_empty() {
            format!("@ST{}@{}", template_signature(template), name)
        } else if kind == ClassKind::Union {
            format!("@U@{}", name)
        } else {
            format!("@S@{}", name)
        };
        let usr = format!("{}{}", self.scope_usr(), segment);
        let node_kind = if template.is_empty() {
            match kind {
                ClassKind::Class => NodeKind::ClassDecl,
                ClassKind::Struct => NodeKind::StructDecl,
                ClassKind::Union => NodeKind::UnionDecl,
            }
        } else {
            NodeKind::ClassTemplate(kind)
        };

        let body = node.child_by_field_name("body");
        let mut syntax = SyntaxNode::new(node_kind, name.clone())
            .with_usr(usr.clone())
            .in_file(file.id, line_of(node));
        if body.is_some() {
            syntax = syntax.definition();
        }
        let id = self.builder.add_node(parent, syntax);
        self.register(
            &name,
            Symbol::Record {
                usr: usr.clone(),
                node: id,
            },
        );
        let Some(body) = body else {
            return Some(id);
        };

        for param in template {
            self.builder.add_node(
                id,
                SyntaxNode::new(param.kind, param.name.clone()).in_file(file.id, param.line),
            );
        }
        if let Some(clause) = child_of_kind(node, "base_class_clause") {
            self.lower_bases(file, id, clause, kind);
        }

        self.scopes.push(Scope {
            name: Some(name.clone()),
            usr,
        });
        let mut access = kind.default_access();
        self.lower_members(file, id, body, &name, &mut access);
        self.scopes.pop();
        Some(id)
    }

    fn lower_bases(&mut self, file: &SourceFile<'_>, class: NodeId, clause: Node<'_>, kind: ClassKind) {
        let mut access = kind.default_access();
        let mut is_virtual = false;
        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            match child.kind() {
                "access_specifier" => access = parse_access(file.text(child)).unwrap_or(access),
                "virtual" => is_virtual = true,
                "," => {
                    access = kind.default_access();
                    is_virtual = false;
                }
                "type_identifier" | "qualified_identifier" | "template_type" => {
                    let spelled = normalize(file.text(child));
                    let (key, global) = lookup_key(&spelled);
                    let mut base = SyntaxNode::new(NodeKind::BaseSpecifier, spelled)
                        .with_access(access)
                        .in_file(file.id, line_of(child));
                    base.is_virtual = is_virtual;
                    if let Some(Symbol::Record { node, .. }) = self.lookup(&key, global) {
                        base = base.with_referenced(node);
                    }
                    self.builder.add_node(class, base);
                }
                _ => {}
            }
        }
    }

    fn lower_members(
        &mut self,
        file: &SourceFile<'_>,
        class: NodeId,
        body: Node<'_>,
        class_name: &str,
        access: &mut Access,
    ) {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            match child.kind() {
                "access_specifier" => {
                    if let Some(label) = parse_access(file.text(child)) {
                        *access = label;
                    }
                }
                "field_declaration" | "declaration" | "function_definition" => {
                    let ctx = MemberContext {
                        class_name,
                        access: *access,
                        template: &[],
                    };
                    self.lower_declaration(file, class, child, &ctx);
                }
                "template_declaration" => {
                    self.lower_template(file, class, child, Some((class_name, *access)));
                }
                "alias_declaration" => self.lower_alias(file, class, child, *access),
                "type_definition" => self.lower_typedef(file, class, child, *access),
                "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif"
                | "preproc_elifdef" => self.lower_members(file, class, child, class_name, access),
                _ => {}
            }
        }
    }

    /// Lower a record or enum definition used as a declaration's type
    fn lower_type_definition(
        &mut self,
        file: &SourceFile<'_>,
        parent: NodeId,
        ty: Node<'_>,
        access: Access,
    ) {
        if ty.child_by_field_name("body").is_none() {
            return;
        }
        match ty.kind() {
            "enum_specifier" => self.lower_enum(file, parent, ty, access),
            _ if is_record_specifier(ty) => {
                self.lower_class(file, parent, ty, &[]);
            }
            _ => {}
        }
    }

    fn lower_enum(&mut self, file: &SourceFile<'_>, parent: NodeId, node: Node<'_>, access: Access) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = last_segment(file, name);
        let usr = format!("{}@E@{}", self.scope_usr(), name);
        let mut syntax = SyntaxNode::new(NodeKind::EnumDecl, name.clone())
            .with_usr(usr.clone())
            .with_access(access)
            .in_file(file.id, line_of(node));
        if node.child_by_field_name("body").is_some() {
            syntax = syntax.definition();
        }
        self.builder.add_node(parent, syntax);
        self.register(&name, Symbol::Enum { usr });
    }

    fn lower_alias(&mut self, file: &SourceFile<'_>, parent: NodeId, node: Node<'_>, access: Access) {
        let (Some(name), Some(descriptor)) = (
            node.child_by_field_name("name"),
            node.child_by_field_name("type"),
        ) else {
            return;
        };
        let name = normalize(file.text(name));
        let ty = self.lower_type_descriptor(file, descriptor);
        self.add_alias(file, parent, node, name, ty, access);
    }

    fn lower_typedef(&mut self, file: &SourceFile<'_>, parent: NodeId, node: Node<'_>, access: Access) {
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        self.lower_type_definition(file, parent, type_node, access);
        let base = self.lower_base_type(file, type_node, has_const(file, node));

        let mut cursor = node.walk();
        let declarators: Vec<Node<'_>> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        for declarator in declarators {
            let declared = self.apply_declarator(file, Some(base), Some(declarator));
            let (Some(name), Some(ty)) = (declared.name, declared.ty) else {
                continue;
            };
            let name = last_segment(file, name);
            self.add_alias(file, parent, node, name, ty, access);
        }
    }

    fn add_alias(
        &mut self,
        file: &SourceFile<'_>,
        parent: NodeId,
        node: Node<'_>,
        name: String,
        ty: TypeId,
        access: Access,
    ) {
        let info = self.builder.type_info(ty);
        let canonical = if info.kind == TypeKind::Typedef {
            info.canonical_kind
        } else {
            info.kind
        };
        let declaration = info.declaration.clone();
        let usr = format!("{}@T@{}", self.scope_usr(), name);
        self.builder.add_node(
            parent,
            SyntaxNode::new(NodeKind::TypeAlias, name.clone())
                .with_usr(usr)
                .with_access(access)
                .with_type(ty)
                .in_file(file.id, line_of(node))
                .definition(),
        );
        self.register(
            &name,
            Symbol::Alias {
                canonical,
                declaration,
            },
        );
    }

    // ---- templates ----

    fn lower_template(
        &mut self,
        file: &SourceFile<'_>,
        parent: NodeId,
        node: Node<'_>,
        member: Option<(&str, Access)>,
    ) {
        let params = self.template_parameters(file, node.child_by_field_name("parameters"));
        self.template_params.push(
            params
                .iter()
                .filter(|param| !param.name.is_empty())
                .map(|param| param.name.clone())
                .collect(),
        );

        let mut cursor = node.walk();
        let inner: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() != "template_parameter_list")
            .collect();
        for child in inner {
            match (child.kind(), member) {
                ("class_specifier" | "struct_specifier" | "union_specifier", _) => {
                    self.lower_class(file, parent, child, &params);
                }
                ("template_declaration", _) => self.lower_template(file, parent, child, member),
                ("alias_declaration", _) => {
                    let access = member.map(|(_, access)| access).unwrap_or(Access::None);
                    self.lower_alias(file, parent, child, access);
                }
                (
                    "field_declaration" | "declaration" | "function_definition",
                    Some((class_name, access)),
                ) => {
                    let ctx = MemberContext {
                        class_name,
                        access,
                        template: &params,
                    };
                    self.lower_declaration(file, parent, child, &ctx);
                }
                _ => {}
            }
        }
        self.template_params.pop();
    }

    fn template_parameters(&self, file: &SourceFile<'_>, list: Option<Node<'_>>) -> Vec<TemplateParam> {
        let Some(list) = list else {
            return Vec::new();
        };
        let mut params = Vec::new();
        let mut cursor = list.walk();
        for child in list.named_children(&mut cursor) {
            let (kind, name) = match child.kind() {
                "type_parameter_declaration"
                | "variadic_type_parameter_declaration"
                | "optional_type_parameter_declaration" => {
                    (NodeKind::TemplateTypeParameter, type_parameter_name(file, child))
                }
                "parameter_declaration"
                | "optional_parameter_declaration"
                | "variadic_parameter_declaration" => {
                    let name = child
                        .child_by_field_name("declarator")
                        .and_then(declarator_name)
                        .map(|name| last_segment(file, name))
                        .unwrap_or_default();
                    (NodeKind::NonTypeTemplateParameter, name)
                }
                "template_template_parameter_declaration" => {
                    let mut inner = child.walk();
                    let name = child
                        .named_children(&mut inner)
                        .find(|c| c.kind().ends_with("type_parameter_declaration"))
                        .map(|c| type_parameter_name(file, c))
                        .unwrap_or_default();
                    (NodeKind::TemplateTemplateParameter, name)
                }
                _ => continue,
            };
            params.push(TemplateParam {
                name,
                kind,
                line: line_of(child),
            });
        }
        params
    }

    // ---- members ----

    /// Lower a member declaration: data members, methods and special members
    fn lower_declaration(
        &mut self,
        file: &SourceFile<'_>,
        class: NodeId,
        decl: Node<'_>,
        ctx: &MemberContext<'_>,
    ) {
        let type_node = decl.child_by_field_name("type");
        if let Some(ty) = type_node {
            self.lower_type_definition(file, class, ty, ctx.access);
        }
        let base = type_node.map(|ty| self.lower_base_type(file, ty, has_const(file, decl)));
        let flags = decl_flags(file, decl);
        let is_definition = decl.kind() == "function_definition";

        let mut cursor = decl.walk();
        let declarators: Vec<Node<'_>> = decl
            .children_by_field_name("declarator", &mut cursor)
            .collect();
        if let Some(ty) = type_node.filter(|ty| declarators.is_empty() && is_record_specifier(*ty)) {
            match (ty.child_by_field_name("name"), ty.child_by_field_name("body")) {
                (_, None) => {
                    self.lower_class(file, class, ty, &[]);
                }
                // Members of an anonymous union or struct belong to the enclosing class
                (None, Some(body)) => {
                    let mut access = ctx.access;
                    self.lower_members(file, class, body, ctx.class_name, &mut access);
                }
                _ => {}
            }
        }
        for declarator in declarators {
            if declarator.kind() == "operator_cast" {
                self.lower_conversion(file, class, decl, declarator, flags, ctx, is_definition);
                continue;
            }
            let declared = self.apply_declarator(file, base, Some(declarator));
            match declared.function {
                Some(function) if !is_function_pointer(function) => {
                    let method = Method {
                        decl,
                        function,
                        result: declared.ty,
                        has_type: type_node.is_some(),
                        flags,
                        is_definition,
                    };
                    self.lower_method(file, class, method, ctx);
                }
                Some(function) => {
                    let (Some(type_node), Some(name)) = (type_node, declarator_name(function)) else {
                        continue;
                    };
                    let name = last_segment(file, name);
                    let spelled = file.text(function).replacen(name.as_str(), "", 1);
                    let spelling = normalize(&format!("{} {}", file.text(type_node), spelled));
                    let ty = self
                        .builder
                        .add_type(TypeInfo::new(TypeKind::Unexposed, spelling));
                    self.add_field(file, class, decl, name, ty, flags, ctx);
                }
                None if decl.kind() == "field_declaration" && ctx.template.is_empty() => {
                    let (Some(name), Some(ty)) = (declared.name, declared.ty) else {
                        continue;
                    };
                    let name = last_segment(file, name);
                    self.add_field(file, class, decl, name, ty, flags, ctx);
                }
                None => {}
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_field(
        &mut self,
        file: &SourceFile<'_>,
        class: NodeId,
        decl: Node<'_>,
        name: String,
        ty: TypeId,
        flags: DeclFlags,
        ctx: &MemberContext<'_>,
    ) {
        let (kind, usr) = if flags.is_static {
            (NodeKind::VarDecl, format!("{}@{}", self.scope_usr(), name))
        } else {
            (NodeKind::FieldDecl, format!("{}@FI@{}", self.scope_usr(), name))
        };
        let mut node = SyntaxNode::new(kind, name)
            .with_usr(usr)
            .with_access(ctx.access)
            .with_type(ty)
            .in_file(file.id, line_of(decl))
            .definition();
        node.storage_static = flags.is_static;
        self.builder.add_node(class, node);
    }

    fn lower_method(&mut self, file: &SourceFile<'_>, class: NodeId, method: Method<'_>, ctx: &MemberContext<'_>) {
        let Some(name_node) = method.function.child_by_field_name("declarator") else {
            return;
        };
        let (kind, name) = match name_node.kind() {
            "destructor_name" => (NodeKind::Destructor, normalize(file.text(name_node))),
            "operator_name" => (NodeKind::CxxMethod, normalize(file.text(name_node))),
            _ => {
                let name = last_segment(file, name_node);
                if method.has_type {
                    (NodeKind::CxxMethod, name)
                } else if name == ctx.class_name {
                    (NodeKind::Constructor, name)
                } else {
                    debug!(name = name.as_str(), "Skipping macro invocation in class body");
                    return;
                }
            }
        };
        let kind = if kind == NodeKind::CxxMethod && !ctx.template.is_empty() {
            NodeKind::FunctionTemplate
        } else {
            kind
        };

        let params = self.parameters(file, method.function);
        let is_const = has_const(file, method.function);
        let overrides = child_of_kind(method.function, "virtual_specifier").is_some();
        let is_pure = is_pure_specifier(file, method.decl, method.function);

        let signature: Vec<String> = params
            .iter()
            .map(|(_, ty, _)| self.builder.type_info(*ty).spelling.clone())
            .collect();
        let prefix = if kind == NodeKind::FunctionTemplate {
            format!("@FT@{}", template_signature(ctx.template))
        } else {
            "@F@".to_string()
        };
        let usr = format!(
            "{}{}{}#{}{}",
            self.scope_usr(),
            prefix,
            name,
            signature.join("#"),
            if is_const { "#1" } else { "" }
        );

        let mut node = SyntaxNode::new(kind, name)
            .with_usr(usr)
            .with_access(ctx.access)
            .in_file(file.id, line_of(method.decl));
        node.is_definition = method.is_definition;
        node.is_static = method.flags.is_static;
        node.is_const = is_const;
        node.is_virtual = method.flags.is_virtual || overrides || is_pure;
        node.is_pure_virtual = is_pure;
        node.is_inline = method.is_definition || method.flags.is_inline;
        if kind.has_return_type() {
            if let Some(result) = method.result {
                node = node.with_result_type(result);
            }
        }
        let id = self.builder.add_node(class, node);
        self.add_operation_children(file, id, ctx.template, params);
    }

    #[allow(clippy::too_many_arguments)]
    fn lower_conversion(
        &mut self,
        file: &SourceFile<'_>,
        class: NodeId,
        decl: Node<'_>,
        cast: Node<'_>,
        flags: DeclFlags,
        ctx: &MemberContext<'_>,
        is_definition: bool,
    ) {
        let Some(type_node) = cast.child_by_field_name("type") else {
            return;
        };
        let base = self.lower_base_type(file, type_node, has_const(file, cast));
        let declared = self.apply_declarator(file, Some(base), cast.child_by_field_name("declarator"));
        let Some(function) = declared.function else {
            return;
        };
        let name = normalize(&format!("operator {}", file.text(type_node)));
        let is_const = has_const(file, function);
        let params = self.parameters(file, function);
        let usr = format!(
            "{}@F@{}#{}",
            self.scope_usr(),
            name.replace(' ', ""),
            if is_const { "1" } else { "" }
        );

        let mut node = SyntaxNode::new(NodeKind::ConversionFunction, name)
            .with_usr(usr)
            .with_access(ctx.access)
            .in_file(file.id, line_of(decl));
        node.is_definition = is_definition;
        node.is_const = is_const;
        node.is_virtual = flags.is_virtual;
        node.is_inline = is_definition || flags.is_inline;
        if let Some(result) = declared.ty {
            node = node.with_result_type(result);
        }
        let id = self.builder.add_node(class, node);
        self.add_operation_children(file, id, &[], params);
    }

    fn add_operation_children(
        &mut self,
        file: &SourceFile<'_>,
        operation: NodeId,
        template: &[TemplateParam],
        params: Vec<(String, TypeId, u32)>,
    ) {
        for param in template {
            self.builder.add_node(
                operation,
                SyntaxNode::new(param.kind, param.name.clone()).in_file(file.id, param.line),
            );
        }
        for (name, ty, line) in params {
            self.builder.add_node(
                operation,
                SyntaxNode::new(NodeKind::ParmDecl, name)
                    .with_type(ty)
                    .in_file(file.id, line),
            );
        }
    }

    fn parameters(&mut self, file: &SourceFile<'_>, function: Node<'_>) -> Vec<(String, TypeId, u32)> {
        let Some(list) = function.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut cursor = list.walk();
        let children: Vec<Node<'_>> = list
            .named_children(&mut cursor)
            .filter(|child| {
                matches!(
                    child.kind(),
                    "parameter_declaration"
                        | "optional_parameter_declaration"
                        | "variadic_parameter_declaration"
                )
            })
            .collect();

        let mut params = Vec::new();
        for param in &children {
            let Some(type_node) = param.child_by_field_name("type") else {
                continue;
            };
            let declarator = param.child_by_field_name("declarator");
            if children.len() == 1 && declarator.is_none() && file.text(type_node) == "void" {
                return Vec::new();
            }
            let base = self.lower_base_type(file, type_node, has_const(file, *param));
            let declared = self.apply_declarator(file, Some(base), declarator);
            let name = declared
                .name
                .map(|name| last_segment(file, name))
                .unwrap_or_default();
            params.push((name, declared.ty.unwrap_or(base), line_of(*param)));
        }
        params
    }

    // ---- types ----

    fn lower_type_descriptor(&mut self, file: &SourceFile<'_>, descriptor: Node<'_>) -> TypeId {
        let Some(type_node) = descriptor.child_by_field_name("type") else {
            let spelling = normalize(file.text(descriptor));
            return self.builder.add_type(TypeInfo::new(TypeKind::Unexposed, spelling));
        };
        let base = self.lower_base_type(file, type_node, has_const(file, descriptor));
        self.apply_declarator(file, Some(base), descriptor.child_by_field_name("declarator"))
            .ty
            .unwrap_or(base)
    }

    fn lower_base_type(&mut self, file: &SourceFile<'_>, node: Node<'_>, is_const: bool) -> TypeId {
        let mut info = match node.kind() {
            "primitive_type" | "sized_type_specifier" | "placeholder_type_specifier" => {
                TypeInfo::new(TypeKind::Builtin, normalize(file.text(node)))
            }
            "type_identifier" | "qualified_identifier" | "template_type" => {
                self.named_type(file, node)
            }
            "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier" => {
                match node.child_by_field_name("name") {
                    Some(name) => self.named_type(file, name),
                    None => TypeInfo::new(TypeKind::Record, "(anonymous)"),
                }
            }
            "dependent_type" => TypeInfo::new(TypeKind::Unexposed, normalize(file.text(node)))
                .with_template_args(None),
            _ => TypeInfo::new(TypeKind::Unexposed, normalize(file.text(node))),
        };
        if is_const {
            info.is_const = true;
            info.spelling = format!("const {}", info.spelling);
        }
        self.builder.add_type(info)
    }

    fn named_type(&mut self, file: &SourceFile<'_>, node: Node<'_>) -> TypeInfo {
        let spelling = normalize(file.text(node));
        let (key, global) = lookup_key(&spelling);
        let args = match argument_list(node) {
            Some(list) => self.template_arguments(file, list),
            None => Vec::new(),
        };
        let info = match self.lookup(&key, global) {
            Some(Symbol::Record { usr, .. }) => {
                TypeInfo::new(TypeKind::Record, spelling).with_declaration(usr)
            }
            Some(Symbol::Enum { usr }) => TypeInfo::new(TypeKind::Enum, spelling).with_declaration(usr),
            Some(Symbol::Alias {
                canonical,
                declaration,
            }) => {
                let mut info = TypeInfo::new(TypeKind::Typedef, spelling).with_canonical(canonical);
                info.declaration = declaration;
                info
            }
            Some(Symbol::TemplateParam) => TypeInfo::new(TypeKind::TemplateTypeParm, spelling),
            None => TypeInfo::new(TypeKind::Unexposed, spelling),
        };
        info.with_template_args(Some(args))
    }

    fn template_arguments(&mut self, file: &SourceFile<'_>, list: Node<'_>) -> Vec<TypeId> {
        let mut cursor = list.walk();
        let children: Vec<Node<'_>> = list.named_children(&mut cursor).collect();
        children
            .into_iter()
            .map(|arg| {
                if arg.kind() == "type_descriptor" {
                    self.lower_type_descriptor(file, arg)
                } else {
                    let spelling = normalize(file.text(arg));
                    self.builder.add_type(TypeInfo::new(TypeKind::Invalid, spelling))
                }
            })
            .collect()
    }

    /// Apply the type operators of a declarator chain to `base`
    ///
    /// Stops at the declared name or at a function declarator, whichever
    /// comes first.
    fn apply_declarator<'t>(
        &mut self,
        file: &SourceFile<'_>,
        base: Option<TypeId>,
        declarator: Option<Node<'t>>,
    ) -> Declared<'t> {
        let mut declared = Declared {
            ty: base,
            name: None,
            function: None,
        };
        let mut current = declarator;
        while let Some(node) = current {
            match node.kind() {
                "pointer_declarator" | "abstract_pointer_declarator" => {
                    declared.ty = declared.ty.map(|ty| self.builder.pointer_to(ty));
                    current = node.child_by_field_name("declarator");
                }
                "reference_declarator" | "abstract_reference_declarator" => {
                    let rvalue = child_of_kind(node, "&&").is_some();
                    declared.ty = declared.ty.map(|ty| self.reference_to(ty, rvalue));
                    current = node.named_child(0);
                }
                "array_declarator" | "abstract_array_declarator" => {
                    let size = node
                        .child_by_field_name("size")
                        .map(|size| normalize(file.text(size)))
                        .unwrap_or_default();
                    declared.ty = declared.ty.map(|ty| self.array_of(ty, &size));
                    current = node.child_by_field_name("declarator");
                }
                "init_declarator" => current = node.child_by_field_name("declarator"),
                "parenthesized_declarator" | "variadic_declarator" | "attributed_declarator" => {
                    current = node.named_child(0);
                }
                "function_declarator" | "abstract_function_declarator" => {
                    declared.function = Some(node);
                    break;
                }
                _ => {
                    declared.name = Some(node);
                    break;
                }
            }
        }
        declared
    }

    fn reference_to(&mut self, pointee: TypeId, rvalue: bool) -> TypeId {
        if !rvalue {
            return self.builder.lvalue_ref_to(pointee);
        }
        let spelling = format!("{} &&", self.builder.type_info(pointee).spelling);
        self.builder
            .add_type(TypeInfo::new(TypeKind::RValueReference, spelling).with_pointee(pointee))
    }

    fn array_of(&mut self, element: TypeId, size: &str) -> TypeId {
        let spelling = format!("{}[{}]", self.builder.type_info(element).spelling, size);
        self.builder
            .add_type(TypeInfo::new(TypeKind::ConstantArray, spelling))
    }
}

struct Method<'t> {
    decl: Node<'t>,
    function: Node<'t>,
    result: Option<TypeId>,
    has_type: bool,
    flags: DeclFlags,
    is_definition: bool,
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn is_record_specifier(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "class_specifier" | "struct_specifier" | "union_specifier"
    )
}

fn line_of(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

fn child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Unqualified name of a declarator or class name
fn last_segment(file: &SourceFile<'_>, node: Node<'_>) -> String {
    match node.kind() {
        "qualified_identifier" => match node.child_by_field_name("name") {
            Some(name) => last_segment(file, name),
            None => normalize(file.text(node)),
        },
        "template_type" => match node.child_by_field_name("name") {
            Some(name) => normalize(file.text(name)),
            None => normalize(file.text(node)),
        },
        _ => normalize(file.text(node)),
    }
}

/// Core name node of a declarator chain
fn declarator_name(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        let next = match current.kind() {
            "pointer_declarator" | "array_declarator" | "init_declarator" | "function_declarator" => {
                current.child_by_field_name("declarator")
            }
            "reference_declarator"
            | "parenthesized_declarator"
            | "variadic_declarator"
            | "attributed_declarator" => current.named_child(0),
            kind if kind.starts_with("abstract_") => None,
            _ => return Some(current),
        };
        current = next?;
    }
}

fn type_parameter_name(file: &SourceFile<'_>, node: Node<'_>) -> String {
    if let Some(name) = node.child_by_field_name("name") {
        return normalize(file.text(name));
    }
    child_of_kind(node, "type_identifier")
        .map(|name| normalize(file.text(name)))
        .unwrap_or_default()
}

/// Template argument list of a possibly qualified type name
fn argument_list(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "template_type" => node.child_by_field_name("arguments"),
        "qualified_identifier" => node.child_by_field_name("name").and_then(argument_list),
        _ => None,
    }
}

/// Lookup key of a spelled type name: template arguments and whitespace
/// removed, leading `::` reported as global
fn lookup_key(spelled: &str) -> (String, bool) {
    let mut key = String::with_capacity(spelled.len());
    let mut depth = 0usize;
    for c in spelled.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if depth == 0 && !c.is_whitespace() => key.push(c),
            _ => {}
        }
    }
    match key.strip_prefix("::") {
        Some(rest) => (rest.to_string(), true),
        None => (key, false),
    }
}

fn parse_access(text: &str) -> Option<Access> {
    if text.contains("public") {
        Some(Access::Public)
    } else if text.contains("protected") {
        Some(Access::Protected)
    } else if text.contains("private") {
        Some(Access::Private)
    } else {
        None
    }
}

/// Whether `node` carries a direct `const` qualifier
fn has_const(file: &SourceFile<'_>, node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| child.kind() == "type_qualifier" && file.text(child) == "const");
    found
}

fn decl_flags(file: &SourceFile<'_>, decl: Node<'_>) -> DeclFlags {
    let mut flags = DeclFlags::default();
    let mut cursor = decl.walk();
    for child in decl.children(&mut cursor) {
        match child.kind() {
            "storage_class_specifier" => match file.text(child) {
                "static" => flags.is_static = true,
                "inline" => flags.is_inline = true,
                _ => {}
            },
            "virtual" | "virtual_function_specifier" => flags.is_virtual = true,
            _ => {}
        }
    }
    flags
}

/// `= 0` after the function declarator
fn is_pure_specifier(file: &SourceFile<'_>, decl: Node<'_>, function: Node<'_>) -> bool {
    let tail = file
        .source
        .get(function.end_byte()..decl.end_byte())
        .unwrap_or("");
    let compact: String = tail.chars().filter(|c| !c.is_whitespace()).collect();
    compact.starts_with("=0")
}

/// `R (*name)(Args)` declares a pointer, not a function
fn is_function_pointer(function: Node<'_>) -> bool {
    function
        .child_by_field_name("declarator")
        .is_some_and(|inner| inner.kind() == "parenthesized_declarator")
}
