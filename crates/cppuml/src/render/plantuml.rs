//! PlantUML renderer
//!
//! Emits a finished [`Project`] as PlantUML class-diagram text. Output is
//! byte-identical for identical input: classes are emitted in
//! [`Project::classes`] order and relationships in derivation order.
//!
//! Classes are named by their short name unless two classes in the diagram
//! share it, in which case both are written by their quoted qualified name.
//! Endpoints declared only in included files use their spelled name; anything
//! else that is not a plain name is quoted.

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use anyhow::Result;
use tracing::{debug, span, Level};

use crate::core::{
    Class, ClassKind, ClassRef, Member, Operation, Project, Relationship, RelationshipKind,
    RenderConfig, Renderer, ResolveConfig, TranslationUnit, UmlError,
};
use crate::resolve::resolve;

/// Replace `<` and `>` with entities; nothing else is escaped
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Quote a name PlantUML would not read as a single bare class name
fn plantuml_name(text: &str) -> String {
    let bare = !text.is_empty()
        && !text.chars().any(|c| {
            c.is_whitespace() || matches!(c, ':' | '@' | '#' | '$' | '"' | ',' | '(' | ')' | '*' | '&')
        });
    if bare {
        escape(text)
    } else {
        quoted(text)
    }
}

fn quoted(text: &str) -> String {
    format!("\"{}\"", escape(&text.replace('"', "'")))
}

fn short_name(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified)
}

/// Names of classes and relationship endpoints within one diagram
struct Naming<'a> {
    project: &'a Project,
    grouped: bool,
    /// Short names shared by classes with different qualified names
    ambiguous: BTreeSet<String>,
}

impl<'a> Naming<'a> {
    fn new(project: &'a Project, classes: &[(ClassRef, &Class)], grouped: bool) -> Self {
        let mut qualified_by_short: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (at, class) in classes {
            qualified_by_short
                .entry(class.display_name().to_string())
                .or_default()
                .insert(project.qualified_name(*at));
        }
        for relationship in &project.relationships {
            for identity in [&relationship.source, &relationship.target] {
                if project.resolve(identity).is_some() {
                    continue;
                }
                if let Some(qualified) = project.external_name(identity) {
                    qualified_by_short
                        .entry(short_name(qualified).to_string())
                        .or_default()
                        .insert(qualified.to_string());
                }
            }
        }
        let ambiguous = qualified_by_short
            .into_iter()
            .filter(|(_, qualified)| qualified.len() > 1)
            .map(|(short, _)| short)
            .collect();
        Self {
            project,
            grouped,
            ambiguous,
        }
    }

    /// Name in an ungrouped class block header
    fn block(&self, at: ClassRef, class: &Class) -> String {
        if self.ambiguous.contains(class.display_name()) {
            quoted(&self.project.qualified_name(at))
        } else {
            escape(class.display_name())
        }
    }

    fn endpoint(&self, identity: &str) -> String {
        if let Some((at, class)) = self.project.resolve(identity) {
            return if self.grouped {
                escape(&self.project.qualified_name(at))
            } else {
                self.block(at, class)
            };
        }
        match self.project.external_name(identity) {
            Some(qualified) if self.grouped => escape(qualified),
            Some(qualified) if self.ambiguous.contains(short_name(qualified)) => quoted(qualified),
            Some(qualified) => plantuml_name(short_name(qualified)),
            None => plantuml_name(identity),
        }
    }
}

/// PlantUML text renderer
#[derive(Debug, Clone, Default)]
pub struct PlantUmlRenderer {
    config: RenderConfig,
}

impl PlantUmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render a whole project
    pub fn render_project(&self, project: &Project) -> String {
        let render_span = span!(Level::INFO, "render_plantuml", units = project.units.len());
        let _enter = render_span.enter();

        let mut lines = vec![
            "@startuml".to_string(),
            format!("title {}", escape(&self.config.title)),
        ];
        if self.config.hide_attribute_icons {
            lines.push("skinparam classAttributeIconSize 0".to_string());
        }
        if self.config.group_namespaces {
            lines.push("set separator ::".to_string());
        }
        lines.push(String::new());

        let classes = project.classes();
        let naming = Naming::new(project, &classes, self.config.group_namespaces);
        if self.config.group_namespaces {
            self.grouped_blocks(project, &classes, &mut lines);
        } else {
            for (at, class) in &classes {
                class_block(class, &naming.block(*at, class), &mut lines);
            }
        }

        for relationship in &project.relationships {
            let mut line = format!(
                "{} {} {}",
                naming.endpoint(relationship_left(relationship)),
                relationship.kind.connector(),
                naming.endpoint(relationship_right(relationship)),
            );
            if let Some(label) = &relationship.label {
                line.push_str(" : ");
                line.push_str(&escape(label));
            }
            lines.push(line);
        }

        lines.push(String::new());
        lines.push("@enduml".to_string());
        debug!(
            classes = classes.len(),
            relationships = project.relationships.len(),
            "Rendering completed"
        );

        let mut output = lines.join("\n");
        output.push('\n');
        output
    }

    /// Validate the configuration, then write the diagram to `out`
    pub fn write_project<W: io::Write>(&self, project: &Project, out: &mut W) -> Result<(), UmlError> {
        self.config.validate()?;
        let text = self.render_project(project);
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| UmlError::render_error(format!("cannot write diagram: {}", e)))
    }

    /// Render one unit on its own
    pub fn render_unit(&self, unit: &TranslationUnit) -> String {
        let project = resolve(vec![unit.clone()], &ResolveConfig::default());
        self.render_project(&project)
    }

    fn grouped_blocks(
        &self,
        project: &Project,
        classes: &[(ClassRef, &Class)],
        lines: &mut Vec<String>,
    ) {
        let mut groups: BTreeMap<String, Vec<(ClassRef, &Class)>> = BTreeMap::new();
        for (at, class) in classes {
            groups
                .entry(project.namespace_path(*at))
                .or_default()
                .push((*at, *class));
        }

        if let Some(global) = groups.remove("") {
            for (at, class) in global {
                block_in_namespace(project, at, class, lines);
            }
        }
        for (path, members) in groups {
            lines.push(format!("namespace {} {{", escape(&path)));
            for (at, class) in members {
                block_in_namespace(project, at, class, lines);
            }
            lines.push("}".to_string());
            lines.push(String::new());
        }
    }
}

impl Renderer for PlantUmlRenderer {
    fn render(&self, project: &Project) -> Result<String> {
        self.config.validate()?;
        Ok(self.render_project(project))
    }

    fn name(&self) -> &'static str {
        "plantuml"
    }

    fn format(&self) -> &'static str {
        "plantuml"
    }
}

/// Inheritance reads `base <|-- derived`; every other kind `source -> target`
fn relationship_left(relationship: &Relationship) -> &str {
    match relationship.kind {
        RelationshipKind::Inheritance => &relationship.target,
        _ => &relationship.source,
    }
}

fn relationship_right(relationship: &Relationship) -> &str {
    match relationship.kind {
        RelationshipKind::Inheritance => &relationship.source,
        _ => &relationship.target,
    }
}

/// Inside a namespace block a class is named relative to its namespace
fn block_in_namespace(project: &Project, at: ClassRef, class: &Class, lines: &mut Vec<String>) {
    let qualified = project.qualified_name(at);
    let ns_path = project.namespace_path(at);
    let relative = if ns_path.is_empty() {
        qualified.as_str()
    } else {
        qualified
            .strip_prefix(ns_path.as_str())
            .and_then(|rest| rest.strip_prefix("::"))
            .unwrap_or(qualified.as_str())
    };
    class_block(class, &escape(relative), lines);
}

/// `name` is written as given
fn class_block(class: &Class, name: &str, lines: &mut Vec<String>) {
    let keyword = match class.kind {
        ClassKind::Struct => "struct",
        ClassKind::Class | ClassKind::Union => "class",
    };
    let mut header = format!("{} {}", keyword, name);
    if class.kind == ClassKind::Union {
        header.push_str(" <<union>>");
    }
    if class.is_template {
        header.push_str(" <<template>>");
    }
    header.push_str(" {");
    lines.push(header);

    for member in &class.members {
        lines.push(member_line(member));
    }
    for operation in &class.operations {
        lines.push(operation_line(operation));
    }
    lines.push("}".to_string());
    lines.push(String::new());
}

fn member_line(member: &Member) -> String {
    let mut line = format!(
        "    {} {} {}",
        member.access.symbol(),
        escape(&member.ty.to_string()),
        escape(&member.name)
    );
    if member.is_static {
        line.push_str(" {static}");
    }
    if let Some(value) = &member.default_value {
        line.push_str(" = ");
        line.push_str(&escape(value));
    }
    line
}

fn operation_line(operation: &Operation) -> String {
    let mut line = format!("    {} ", operation.access.symbol());
    if operation.is_static {
        line.push_str("{static} ");
    }
    if !operation.return_type.is_empty() {
        line.push_str(&escape(&operation.return_type.to_string()));
        line.push(' ');
    }
    line.push_str(&escape(&operation.name));

    let params: Vec<String> = operation
        .params
        .iter()
        .map(|param| {
            let ty = escape(&param.ty.to_string());
            if param.name.is_empty() {
                ty
            } else {
                format!("{} {}", ty, escape(&param.name))
            }
        })
        .collect();
    line.push('(');
    line.push_str(&params.join(", "));
    line.push(')');

    if operation.is_const {
        line.push_str(" const");
    }
    if operation.is_pure_virtual {
        line.push_str(" = 0");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Access, ClassParent, Parameter, TypeDescriptor};

    fn point_unit() -> TranslationUnit {
        let mut unit = TranslationUnit::new("point.cpp");
        let global = unit.add_namespace("", None);
        let mut point = Class::new("Point", "c:@S@Point", ClassKind::Struct);
        point.members.push(
            Member::new("x", TypeDescriptor::named("double")).with_access(Access::Public),
        );
        point.members.push(
            Member::new("y", TypeDescriptor::named("double")).with_access(Access::Public),
        );
        let mut distance =
            Operation::new("distance", TypeDescriptor::named("double")).with_access(Access::Public);
        distance.is_const = true;
        point.operations.push(distance);
        let id = unit.add_class(point, ClassParent::Namespace(global));
        unit.register("c:@S@Point", id);
        unit
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("std::vector<int>"), "std::vector&lt;int&gt;");
        assert_eq!(escape("a & b \"c\""), "a & b \"c\"");
    }

    #[test]
    fn test_render_point() {
        let output = PlantUmlRenderer::new().render_unit(&point_unit());
        let expected = "@startuml\n\
title UML Diagram\n\
skinparam classAttributeIconSize 0\n\
\n\
struct Point {\n\
\x20   + double x\n\
\x20   + double y\n\
\x20   + double distance() const\n\
}\n\
\n\
\n\
@enduml\n";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_render_operation_details() {
        let boxed = TypeDescriptor::named("Box").with_template_args(vec![TypeDescriptor::named("T")]);
        let value = TypeDescriptor::named("T").with_const().with_reference();
        let mut op = Operation::new("make", boxed)
            .with_access(Access::Protected)
            .with_param(Parameter::new(TypeDescriptor::named("int"), "size"))
            .with_param(Parameter::new(value, ""))
            .pure_virtual();
        op.is_static = true;
        assert_eq!(
            operation_line(&op),
            "    # {static} Box&lt;T&gt; make(int size, const T&) = 0"
        );

        let ctor = Operation::new("Box", TypeDescriptor::default()).with_access(Access::Public);
        assert_eq!(operation_line(&ctor), "    + Box()");
    }

    #[test]
    fn test_render_member_details() {
        let member = Member::new("count", TypeDescriptor::named("int"))
            .with_access(Access::Private)
            .with_static(true)
            .with_default("0");
        assert_eq!(member_line(&member), "    - int count {static} = 0");
    }

    #[test]
    fn test_render_relationship_connectors() {
        let mut project = Project::default();
        project.relationships = vec![
            Relationship::inheritance("c:@S@B", "c:@S@A"),
            Relationship::new(RelationshipKind::Association, "Car", "Engine").with_label("engine"),
            Relationship::new(RelationshipKind::Aggregation, "Car", "Person"),
            Relationship::new(RelationshipKind::Composition, "Car", "Wheel"),
            Relationship::new(RelationshipKind::Dependency, "Car", "Map<K>"),
        ];
        let output = PlantUmlRenderer::new().render_project(&project);
        assert!(output.contains("\"c:@S@A\" <|-- \"c:@S@B\"\n"));
        assert!(output.contains("Car --> Engine : engine\n"));
        assert!(output.contains("Car o-- Person\n"));
        assert!(output.contains("Car *-- Wheel\n"));
        assert!(output.contains("Car ..> Map&lt;K&gt;\n"));
    }

    #[test]
    fn test_render_namespace_groups() {
        let mut unit = TranslationUnit::new("ui.cpp");
        let global = unit.add_namespace("", None);
        let ui = unit.add_namespace("ui", None);
        let app = unit.add_class(
            Class::new("App", "c:@S@App", ClassKind::Class),
            ClassParent::Namespace(global),
        );
        let window = unit.add_class(
            Class::new("Window", "c:@N@ui@S@Window", ClassKind::Class),
            ClassParent::Namespace(ui),
        );
        unit.class_mut(app).bases.push("c:@N@ui@S@Window".to_string());
        unit.register("c:@S@App", app);
        unit.register("c:@N@ui@S@Window", window);

        let renderer =
            PlantUmlRenderer::with_config(RenderConfig::new().with_namespace_groups(true));
        let output = renderer.render_unit(&unit);
        assert!(output.contains("set separator ::\n"));
        let app_pos = output.find("class App {").unwrap();
        let ns_pos = output.find("namespace ui {\nclass Window {").unwrap();
        assert!(app_pos < ns_pos);
        assert!(output.contains("ui::Window <|-- App\n"));
    }

    #[test]
    fn test_renderer_trait_validates_config() {
        let renderer = PlantUmlRenderer::with_config(RenderConfig::new().with_title(""));
        assert!(renderer.render(&Project::default()).is_err());

        let renderer = PlantUmlRenderer::new();
        assert_eq!(renderer.name(), "plantuml");
        assert_eq!(renderer.format(), "plantuml");
        let output = renderer.render(&Project::default()).unwrap();
        assert!(output.starts_with("@startuml\ntitle UML Diagram\n"));
        assert!(output.ends_with("@enduml\n"));
    }

    fn two_namespaces_unit() -> TranslationUnit {
        let mut unit = TranslationUnit::new("x.cpp");
        let a = unit.add_namespace("a", None);
        let b = unit.add_namespace("b", None);
        let first = unit.add_class(
            Class::new("X", "c:@N@a@S@X", ClassKind::Class),
            ClassParent::Namespace(a),
        );
        let second = unit.add_class(
            Class::new("X", "c:@N@b@S@X", ClassKind::Class),
            ClassParent::Namespace(b),
        );
        unit.class_mut(second).bases.push("c:@N@a@S@X".to_string());
        unit.register("c:@N@a@S@X", first);
        unit.register("c:@N@b@S@X", second);
        unit
    }

    #[test]
    fn test_same_short_name_uses_qualified_names() {
        let output = PlantUmlRenderer::new().render_unit(&two_namespaces_unit());
        assert!(output.contains("class \"a::X\" {\n}\n"));
        assert!(output.contains("class \"b::X\" {\n}\n"));
        assert!(output.contains("\"a::X\" <|-- \"b::X\"\n"));
        assert!(!output.contains("X <|-- X"));

        let renderer =
            PlantUmlRenderer::with_config(RenderConfig::new().with_namespace_groups(true));
        let output = renderer.render_unit(&two_namespaces_unit());
        assert!(output.contains("namespace a {\nclass X {\n"));
        assert!(output.contains("a::X <|-- b::X\n"));
    }

    #[test]
    fn test_included_base_uses_spelled_name() {
        let mut unit = TranslationUnit::new("circle.cpp");
        let global = unit.add_namespace("", None);
        let mut circle = Class::new("Circle", "c:@S@Circle", ClassKind::Class);
        circle.bases.push("c:@N@geo@S@Shape".to_string());
        circle.bases.push("c:@S@Circle2".to_string());
        let id = unit.add_class(circle, ClassParent::Namespace(global));
        unit.register("c:@S@Circle", id);
        unit.add_external("c:@N@geo@S@Shape", "geo::Shape");

        let output = PlantUmlRenderer::new().render_unit(&unit);
        assert!(output.contains("Shape <|-- Circle\n"));
        assert!(output.contains("\"c:@S@Circle2\" <|-- Circle\n"));

        let renderer =
            PlantUmlRenderer::with_config(RenderConfig::new().with_namespace_groups(true));
        assert!(renderer.render_unit(&unit).contains("geo::Shape <|-- Circle\n"));
    }

    #[test]
    fn test_included_name_clashing_with_class() {
        let mut unit = TranslationUnit::new("shape.cpp");
        let global = unit.add_namespace("", None);
        let mut shape = Class::new("Shape", "c:@S@Shape", ClassKind::Class);
        shape.bases.push("c:@N@geo@S@Shape".to_string());
        let id = unit.add_class(shape, ClassParent::Namespace(global));
        unit.register("c:@S@Shape", id);
        unit.add_external("c:@N@geo@S@Shape", "geo::Shape");

        let output = PlantUmlRenderer::new().render_unit(&unit);
        assert!(output.contains("class \"Shape\" {\n"));
        assert!(output.contains("\"geo::Shape\" <|-- \"Shape\"\n"));
    }

    struct ClosedSink;

    impl io::Write for ClosedSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_project() {
        let renderer = PlantUmlRenderer::new();
        let mut buffer = Vec::new();
        renderer.write_project(&Project::default(), &mut buffer).unwrap();
        assert!(String::from_utf8(buffer).unwrap().ends_with("@enduml\n"));

        let err = renderer
            .write_project(&Project::default(), &mut ClosedSink)
            .unwrap_err();
        assert!(matches!(err, UmlError::RenderError { .. }));
        assert!(err.to_string().contains("sink closed"));

        let renderer = PlantUmlRenderer::with_config(RenderConfig::new().with_title(""));
        let err = renderer
            .write_project(&Project::default(), &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, UmlError::ConfigError { .. }));
    }

    #[test]
    fn test_union_and_anonymous() {
        let mut unit = TranslationUnit::new("u.cpp");
        let global = unit.add_namespace("", None);
        unit.add_class(Class::new("", "", ClassKind::Union), ClassParent::Namespace(global));
        let output = PlantUmlRenderer::new().render_unit(&unit);
        assert!(output.contains("class anonymous <<union>> {\n"));
    }
}
