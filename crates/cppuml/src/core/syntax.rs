//! Provider-neutral syntax tree
//!
//! A tree provider lowers whatever it parses into a [`SyntaxTree`]: an arena
//! of [`SyntaxNode`]s and [`TypeInfo`] handles addressed by index. Consumers
//! walk it with a [`Visitor`] that decides per node whether to descend.

use serde::Serialize;

use super::{Access, ClassKind};

/// Index of a node within a [`SyntaxTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub usize);

/// Index of a type handle within a [`SyntaxTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TypeId(pub usize);

/// Index of a source file within a [`SyntaxTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FileId(pub usize);

impl FileId {
    /// The unit's main file
    pub const MAIN: FileId = FileId(0);
}

/// Kind tag of a syntax node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    TranslationUnit,
    Namespace,
    ClassDecl,
    StructDecl,
    UnionDecl,
    ClassTemplate(ClassKind),
    FieldDecl,
    VarDecl,
    CxxMethod,
    Constructor,
    Destructor,
    ConversionFunction,
    FunctionTemplate,
    FunctionDecl,
    ParmDecl,
    BaseSpecifier,
    TemplateTypeParameter,
    NonTypeTemplateParameter,
    TemplateTemplateParameter,
    TypeAlias,
    EnumDecl,
    FriendDecl,
    Other,
}

/// What a node means to model extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Construct {
    Namespace,
    Class,
    Field,
    Operation,
    BaseSpecifier,
    Other,
}

impl NodeKind {
    pub fn construct(self) -> Construct {
        match self {
            NodeKind::Namespace => Construct::Namespace,
            NodeKind::ClassDecl
            | NodeKind::StructDecl
            | NodeKind::UnionDecl
            | NodeKind::ClassTemplate(_) => Construct::Class,
            NodeKind::FieldDecl | NodeKind::VarDecl => Construct::Field,
            NodeKind::CxxMethod
            | NodeKind::Constructor
            | NodeKind::Destructor
            | NodeKind::ConversionFunction
            | NodeKind::FunctionTemplate => Construct::Operation,
            NodeKind::BaseSpecifier => Construct::BaseSpecifier,
            _ => Construct::Other,
        }
    }

    /// Declaration form of a class-like node
    pub fn class_kind(self) -> Option<ClassKind> {
        match self {
            NodeKind::ClassDecl => Some(ClassKind::Class),
            NodeKind::StructDecl => Some(ClassKind::Struct),
            NodeKind::UnionDecl => Some(ClassKind::Union),
            NodeKind::ClassTemplate(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn is_template_parameter(self) -> bool {
        matches!(
            self,
            NodeKind::TemplateTypeParameter
                | NodeKind::NonTypeTemplateParameter
                | NodeKind::TemplateTemplateParameter
        )
    }

    /// Constructors and destructors have no return type in the model
    pub fn has_return_type(self) -> bool {
        !matches!(self, NodeKind::Constructor | NodeKind::Destructor)
    }
}

/// Kind of a raw type handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    Invalid,
    Builtin,
    Record,
    Enum,
    Pointer,
    LValueReference,
    RValueReference,
    Typedef,
    TemplateTypeParm,
    ConstantArray,
    Unexposed,
}

impl TypeKind {
    pub fn is_reference(self) -> bool {
        matches!(self, TypeKind::LValueReference | TypeKind::RValueReference)
    }
}

/// Raw type handle as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub kind: TypeKind,
    /// Kind after alias resolution
    pub canonical_kind: TypeKind,
    pub spelling: String,
    pub is_const: bool,
    /// Pointee of pointers and references
    pub pointee: Option<TypeId>,
    /// `None` when the provider cannot report template arguments
    pub template_args: Option<Vec<TypeId>>,
    /// Identity of the declaration this type names
    pub declaration: Option<String>,
}

impl TypeInfo {
    pub fn new(kind: TypeKind, spelling: impl Into<String>) -> Self {
        Self {
            kind,
            canonical_kind: kind,
            spelling: spelling.into(),
            is_const: false,
            pointee: None,
            template_args: Some(Vec::new()),
            declaration: None,
        }
    }

    pub fn with_canonical(mut self, kind: TypeKind) -> Self {
        self.canonical_kind = kind;
        self
    }

    pub fn const_qualified(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn with_pointee(mut self, pointee: TypeId) -> Self {
        self.pointee = Some(pointee);
        self
    }

    pub fn with_template_args(mut self, args: Option<Vec<TypeId>>) -> Self {
        self.template_args = args;
        self
    }

    pub fn with_declaration(mut self, usr: impl Into<String>) -> Self {
        self.declaration = Some(usr.into());
        self
    }
}

/// One node of the tree with its declaration attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    /// Declared name; for base specifiers the spelled type text
    pub spelling: String,
    pub usr: Option<String>,
    pub file: FileId,
    pub line: u32,
    pub is_definition: bool,
    pub access: Access,
    pub is_static: bool,
    pub is_const: bool,
    pub is_virtual: bool,
    pub is_pure_virtual: bool,
    pub is_inline: bool,
    /// Static storage for variables
    pub storage_static: bool,
    pub ty: Option<TypeId>,
    pub result_type: Option<TypeId>,
    /// Declaration a base specifier refers to
    pub referenced: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, spelling: impl Into<String>) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            usr: None,
            file: FileId::MAIN,
            line: 0,
            is_definition: false,
            access: Access::None,
            is_static: false,
            is_const: false,
            is_virtual: false,
            is_pure_virtual: false,
            is_inline: false,
            storage_static: false,
            ty: None,
            result_type: None,
            referenced: None,
            children: Vec::new(),
        }
    }

    pub fn with_usr(mut self, usr: impl Into<String>) -> Self {
        self.usr = Some(usr.into());
        self
    }

    pub fn in_file(mut self, file: FileId, line: u32) -> Self {
        self.file = file;
        self.line = line;
        self
    }

    pub fn definition(mut self) -> Self {
        self.is_definition = true;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_type(mut self, ty: TypeId) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn with_result_type(mut self, ty: TypeId) -> Self {
        self.result_type = Some(ty);
        self
    }

    pub fn with_referenced(mut self, node: NodeId) -> Self {
        self.referenced = Some(node);
        self
    }
}

/// Arena-backed syntax tree for one translation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    types: Vec<TypeInfo>,
    files: Vec<String>,
}

impl SyntaxTree {
    /// Start building a tree whose main file is `main_file`
    pub fn builder(main_file: impl Into<String>) -> TreeBuilder {
        TreeBuilder::new(main_file)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    pub fn type_info(&self, id: TypeId) -> &TypeInfo {
        &self.types[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn file_name(&self, id: FileId) -> &str {
        &self.files[id.0]
    }

    pub fn main_file(&self) -> &str {
        self.file_name(FileId::MAIN)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Builds a [`SyntaxTree`] node by node
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    tree: SyntaxTree,
}

impl TreeBuilder {
    pub fn new(main_file: impl Into<String>) -> Self {
        let main_file = main_file.into();
        let root = SyntaxNode::new(NodeKind::TranslationUnit, main_file.clone());
        Self {
            tree: SyntaxTree {
                nodes: vec![root],
                types: Vec::new(),
                files: vec![main_file],
            },
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn add_file(&mut self, name: impl Into<String>) -> FileId {
        self.tree.files.push(name.into());
        FileId(self.tree.files.len() - 1)
    }

    pub fn add_type(&mut self, info: TypeInfo) -> TypeId {
        self.tree.types.push(info);
        TypeId(self.tree.types.len() - 1)
    }

    /// Append `node` as the last child of `parent`
    pub fn add_node(&mut self, parent: NodeId, node: SyntaxNode) -> NodeId {
        let id = NodeId(self.tree.nodes.len());
        self.tree.nodes.push(node);
        self.tree.nodes[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        self.tree.node(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SyntaxNode {
        &mut self.tree.nodes[id.0]
    }

    pub fn type_info(&self, id: TypeId) -> &TypeInfo {
        self.tree.type_info(id)
    }

    pub fn builtin(&mut self, spelling: &str) -> TypeId {
        self.add_type(TypeInfo::new(TypeKind::Builtin, spelling))
    }

    pub fn record(&mut self, spelling: &str, usr: &str) -> TypeId {
        self.add_type(TypeInfo::new(TypeKind::Record, spelling).with_declaration(usr))
    }

    pub fn pointer_to(&mut self, pointee: TypeId) -> TypeId {
        let spelling = format!("{} *", self.type_info(pointee).spelling);
        self.add_type(TypeInfo::new(TypeKind::Pointer, spelling).with_pointee(pointee))
    }

    pub fn lvalue_ref_to(&mut self, pointee: TypeId) -> TypeId {
        let spelling = format!("{} &", self.type_info(pointee).spelling);
        self.add_type(TypeInfo::new(TypeKind::LValueReference, spelling).with_pointee(pointee))
    }

    pub fn build(self) -> SyntaxTree {
        self.tree
    }
}

/// Instruction returned by [`Visitor::enter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    SkipChildren,
}

/// Depth-first tree visitor
pub trait Visitor {
    fn enter(&mut self, tree: &SyntaxTree, id: NodeId, construct: Construct) -> Visit;

    /// Called after the children of a node entered with [`Visit::Continue`]
    fn leave(&mut self, _tree: &SyntaxTree, _id: NodeId, _construct: Construct) {}
}

enum Frame {
    Enter(NodeId),
    Leave(NodeId, Construct),
}

/// Walk every descendant of the root in pre-order
///
/// Uses an explicit stack, so nesting depth is bounded by memory only.
pub fn walk<V: Visitor + ?Sized>(tree: &SyntaxTree, visitor: &mut V) {
    let mut stack: Vec<Frame> = tree
        .children(tree.root())
        .iter()
        .rev()
        .map(|id| Frame::Enter(*id))
        .collect();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(id) => {
                let construct = tree.node(id).kind.construct();
                if visitor.enter(tree, id, construct) == Visit::Continue {
                    stack.push(Frame::Leave(id, construct));
                    stack.extend(tree.children(id).iter().rev().map(|c| Frame::Enter(*c)));
                }
            }
            Frame::Leave(id, construct) => visitor.leave(tree, id, construct),
        }
    }
}
