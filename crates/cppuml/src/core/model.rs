//! Unified Model of classes, namespaces and relationships
//!
//! Namespaces and classes live in per-unit arenas and refer to each other
//! through [`NamespaceId`] and [`ClassId`]. Ownership follows the child lists
//! (`classes`, `namespaces`, `nested`); the `parent`, `namespace` and `outer`
//! fields are back-references used only to compute qualified names.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Access level of a member or operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub enum Access {
    Public,
    Protected,
    Private,
    #[default]
    None,
}

impl Access {
    /// PlantUML visibility symbol
    pub fn symbol(self) -> char {
        match self {
            Access::Public => '+',
            Access::Protected => '#',
            Access::Private => '-',
            Access::None => '~',
        }
    }
}

/// Structured type: base name, qualifiers, pointer depth and template arguments
///
/// `name` is empty for the return type of constructors and destructors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub template_args: Vec<TypeDescriptor>,
    pub is_const: bool,
    pub is_reference: bool,
    pub pointer_depth: u32,
    /// Identity of the declaration the underlying type names, if known
    pub declaration: Option<String>,
}

impl TypeDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn with_reference(mut self) -> Self {
        self.is_reference = true;
        self
    }

    pub fn with_pointer_depth(mut self, depth: u32) -> Self {
        self.pointer_depth = depth;
        self
    }

    pub fn with_template_args(mut self, args: Vec<TypeDescriptor>) -> Self {
        self.template_args = args;
        self
    }

    pub fn with_declaration(mut self, usr: impl Into<String>) -> Self {
        self.declaration = Some(usr.into());
        self
    }

    /// True for the empty descriptor of constructors and destructors
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.template_args.is_empty() && self.pointer_depth == 0
    }

    /// True when the type is held through a pointer or reference
    pub fn is_indirect(&self) -> bool {
        self.is_reference || self.pointer_depth > 0
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            write!(f, "const ")?;
        }
        write!(f, "{}", self.name)?;
        if !self.template_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.template_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        for _ in 0..self.pointer_depth {
            write!(f, "*")?;
        }
        if self.is_reference {
            write!(f, "&")?;
        }
        Ok(())
    }
}

/// Data member of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub name: String,
    pub ty: TypeDescriptor,
    pub access: Access,
    pub is_static: bool,
    pub default_value: Option<String>,
    pub usr: Option<String>,
}

impl Member {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            access: Access::None,
            is_static: false,
            default_value: None,
            usr: None,
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Parameter of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub ty: TypeDescriptor,
    pub name: String,
    pub default_value: Option<String>,
}

impl Parameter {
    pub fn new(ty: TypeDescriptor, name: impl Into<String>) -> Self {
        Self {
            ty,
            name: name.into(),
            default_value: None,
        }
    }
}

/// Member function of a class
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Operation {
    pub name: String,
    pub return_type: TypeDescriptor,
    pub params: Vec<Parameter>,
    pub is_static: bool,
    pub is_const: bool,
    pub is_virtual: bool,
    pub is_pure_virtual: bool,
    pub is_inline: bool,
    pub access: Access,
    pub usr: String,
}

impl Operation {
    pub fn new(name: impl Into<String>, return_type: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            return_type,
            ..Self::default()
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Mark the operation pure virtual, which implies virtual
    pub fn pure_virtual(mut self) -> Self {
        self.is_virtual = true;
        self.is_pure_virtual = true;
        self
    }

    /// Same name, parameter types and constness; overloads differ here
    pub fn same_signature(&self, other: &Operation) -> bool {
        self.name == other.name
            && self.is_const == other.is_const
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty.to_string() == b.ty.to_string())
    }
}

/// Declaration form of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub enum ClassKind {
    #[default]
    Class,
    Struct,
    Union,
}

impl ClassKind {
    /// Access level members get before any access label
    pub fn default_access(self) -> Access {
        match self {
            ClassKind::Class => Access::Private,
            ClassKind::Struct | ClassKind::Union => Access::Public,
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassKind::Class => write!(f, "class"),
            ClassKind::Struct => write!(f, "struct"),
            ClassKind::Union => write!(f, "union"),
        }
    }
}

/// Index of a namespace within its translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NamespaceId(pub usize);

/// Index of a class within its translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClassId(pub usize);

/// A class, struct or union definition
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Class {
    pub name: String,
    /// Canonical identity; empty when the provider assigned none
    pub usr: String,
    pub kind: ClassKind,
    pub is_template: bool,
    pub template_params: Vec<String>,
    /// Base identities in declaration order, or placeholder type text
    pub bases: Vec<String>,
    pub members: Vec<Member>,
    pub operations: Vec<Operation>,
    pub nested: Vec<ClassId>,
    pub namespace: Option<NamespaceId>,
    pub outer: Option<ClassId>,
}

impl Class {
    pub fn new(name: impl Into<String>, usr: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            usr: usr.into(),
            kind,
            ..Self::default()
        }
    }

    /// Name used on output; nameless classes show as `anonymous`
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "anonymous"
        } else {
            &self.name
        }
    }

    /// Identity used as a relationship endpoint
    pub fn identity(&self) -> &str {
        if self.usr.is_empty() {
            &self.name
        } else {
            &self.usr
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|o| o.name == name)
    }

    /// True when an operation with the same signature is already present
    pub fn has_operation(&self, operation: &Operation) -> bool {
        self.operations.iter().any(|o| o.same_signature(operation))
    }

    /// Append what `donor` has and `self` lacks
    ///
    /// Members match by name, operations by signature, bases by identity.
    /// Nothing already present is replaced.
    pub fn fill_in(&mut self, donor: &Class) {
        for member in &donor.members {
            if self.member(&member.name).is_none() {
                self.members.push(member.clone());
            }
        }
        for operation in &donor.operations {
            if !self.has_operation(operation) {
                self.operations.push(operation.clone());
            }
        }
        for base in &donor.bases {
            if !self.bases.contains(base) {
                self.bases.push(base.clone());
            }
        }
        if donor.is_template {
            self.is_template = true;
        }
        if self.template_params.is_empty() {
            self.template_params = donor.template_params.clone();
        }
    }
}

/// A namespace, possibly the synthesized empty-name global one
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Namespace {
    pub name: String,
    pub classes: Vec<ClassId>,
    pub namespaces: Vec<NamespaceId>,
    pub parent: Option<NamespaceId>,
}

/// Kind of relationship between two classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelationshipKind {
    Inheritance,
    Association,
    Aggregation,
    Composition,
    Dependency,
}

impl RelationshipKind {
    /// PlantUML connector token
    pub fn connector(self) -> &'static str {
        match self {
            RelationshipKind::Inheritance => "<|--",
            RelationshipKind::Association => "-->",
            RelationshipKind::Aggregation => "o--",
            RelationshipKind::Composition => "*--",
            RelationshipKind::Dependency => "..>",
        }
    }
}

/// Explicit relationship fact between two identities
///
/// For inheritance the source is the derived class and the target its base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub source: String,
    pub target: String,
    pub label: Option<String>,
}

impl Relationship {
    pub fn new(kind: RelationshipKind, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }

    pub fn inheritance(derived: impl Into<String>, base: impl Into<String>) -> Self {
        Self::new(RelationshipKind::Inheritance, derived, base)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Severity of a provider diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Message reported by the tree provider while parsing a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.file, self.line, self.column, self.severity, self.message
        )
    }
}

/// Where a new class is attached in its unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassParent {
    Class(ClassId),
    Namespace(NamespaceId),
}

/// The model of one parsed source unit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TranslationUnit {
    pub filename: String,
    namespaces: Vec<Namespace>,
    classes: Vec<Class>,
    top_level: Vec<NamespaceId>,
    classes_by_usr: BTreeMap<String, ClassId>,
    /// Qualified names of classes declared only in included files
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    external_names: BTreeMap<String, String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TranslationUnit {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// Create a namespace under `parent`, or at the top level
    pub fn add_namespace(
        &mut self,
        name: impl Into<String>,
        parent: Option<NamespaceId>,
    ) -> NamespaceId {
        let id = NamespaceId(self.namespaces.len());
        self.namespaces.push(Namespace {
            name: name.into(),
            parent,
            ..Namespace::default()
        });
        match parent {
            Some(parent) => self.namespaces[parent.0].namespaces.push(id),
            None => self.top_level.push(id),
        }
        id
    }

    /// Insert a class and link it into its parent's child list
    ///
    /// Nested classes share the namespace of their enclosing class.
    pub fn add_class(&mut self, mut class: Class, parent: ClassParent) -> ClassId {
        let id = ClassId(self.classes.len());
        match parent {
            ClassParent::Class(outer) => {
                class.outer = Some(outer);
                class.namespace = self.classes[outer.0].namespace;
                self.classes.push(class);
                self.classes[outer.0].nested.push(id);
            }
            ClassParent::Namespace(ns) => {
                class.namespace = Some(ns);
                self.classes.push(class);
                self.namespaces[ns.0].classes.push(id);
            }
        }
        id
    }

    /// Register a class under its identity; the first registration wins
    pub fn register(&mut self, usr: impl Into<String>, id: ClassId) -> bool {
        let usr = usr.into();
        if usr.is_empty() || self.classes_by_usr.contains_key(&usr) {
            return false;
        }
        self.classes_by_usr.insert(usr, id);
        true
    }

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id.0]
    }

    pub fn namespace(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id.0]
    }

    /// Every class of the unit in creation order
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes.iter().enumerate().map(|(i, c)| (ClassId(i), c))
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    pub fn top_level(&self) -> &[NamespaceId] {
        &self.top_level
    }

    /// Unit-local identity map
    pub fn classes_by_usr(&self) -> &BTreeMap<String, ClassId> {
        &self.classes_by_usr
    }

    pub fn find_class(&self, usr: &str) -> Option<&Class> {
        self.classes_by_usr.get(usr).map(|id| self.class(*id))
    }

    /// Remember the spelled name of a class declared in an included file
    pub fn add_external(&mut self, usr: impl Into<String>, qualified_name: impl Into<String>) {
        let usr = usr.into();
        if !usr.is_empty() {
            self.external_names
                .entry(usr)
                .or_insert_with(|| qualified_name.into());
        }
    }

    pub fn external_name(&self, usr: &str) -> Option<&str> {
        self.external_names.get(usr).map(String::as_str)
    }

    /// `a::b` for a namespace; the global namespace contributes no segment
    pub fn namespace_path(&self, id: NamespaceId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(ns) = current {
            let namespace = self.namespace(ns);
            if !namespace.name.is_empty() {
                segments.push(namespace.name.as_str());
            }
            current = namespace.parent;
        }
        segments.reverse();
        segments.join("::")
    }

    /// Namespace path of the namespace a class lives in
    pub fn class_namespace_path(&self, id: ClassId) -> String {
        self.class(id)
            .namespace
            .map(|ns| self.namespace_path(ns))
            .unwrap_or_default()
    }

    /// Fully qualified name such as `a::b::Outer::Inner`
    pub fn qualified_name(&self, id: ClassId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(class_id) = current {
            let class = self.class(class_id);
            names.push(class.display_name());
            current = class.outer;
        }
        names.reverse();
        let ns_path = self.class_namespace_path(id);
        if ns_path.is_empty() {
            names.join("::")
        } else {
            format!("{}::{}", ns_path, names.join("::"))
        }
    }
}

/// Address of a class within a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClassRef {
    pub unit: usize,
    pub class: ClassId,
}

/// Merged, read-only model across every unit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Project {
    pub units: Vec<TranslationUnit>,
    pub classes_by_usr: BTreeMap<String, ClassRef>,
    pub relationships: Vec<Relationship>,
}

impl Project {
    pub fn class(&self, at: ClassRef) -> &Class {
        self.units[at.unit].class(at.class)
    }

    /// Canonical class for an identity
    pub fn resolve(&self, usr: &str) -> Option<(ClassRef, &Class)> {
        self.classes_by_usr
            .get(usr)
            .map(|at| (*at, self.class(*at)))
    }

    pub fn qualified_name(&self, at: ClassRef) -> String {
        self.units[at.unit].qualified_name(at.class)
    }

    /// Spelled name of an identity only included files declare
    pub fn external_name(&self, usr: &str) -> Option<&str> {
        self.units.iter().find_map(|unit| unit.external_name(usr))
    }

    pub fn namespace_path(&self, at: ClassRef) -> String {
        self.units[at.unit].class_namespace_path(at.class)
    }

    /// Classes that appear in the diagram, in render order
    ///
    /// Each identity contributes its canonical copy; classes without identity
    /// all appear. Sorted by name, then identity, then position.
    pub fn classes(&self) -> Vec<(ClassRef, &Class)> {
        let mut classes: Vec<(ClassRef, &Class)> = Vec::new();
        for (unit_index, unit) in self.units.iter().enumerate() {
            for (id, class) in unit.classes() {
                let at = ClassRef {
                    unit: unit_index,
                    class: id,
                };
                let canonical = class.usr.is_empty()
                    || self.classes_by_usr.get(&class.usr) == Some(&at);
                if canonical {
                    classes.push((at, class));
                }
            }
        }
        classes.sort_by(|(a_ref, a), (b_ref, b)| {
            (a.name.as_str(), a.usr.as_str(), *a_ref).cmp(&(b.name.as_str(), b.usr.as_str(), *b_ref))
        });
        classes
    }

    pub fn class_count(&self) -> usize {
        self.classes().len()
    }
}
