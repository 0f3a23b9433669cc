//! End-to-end tests: C++ sources through extraction, resolution and rendering

use std::path::PathBuf;

use cppuml::prelude::*;
use cppuml::{extract_source, RelationshipKind};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn fixtures(names: &[&str]) -> Vec<PathBuf> {
    names.iter().map(|name| fixture(name)).collect()
}

fn relationship_lines(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter(|line| {
            ["<|--", "-->", "o--", "*--", "..>"]
                .iter()
                .any(|connector| line.contains(connector))
        })
        .collect()
}

// ============================================================================
// Single unit scenarios
// ============================================================================

#[test]
fn test_point_renders_exactly() {
    let unit = extract_source(
        "point.cpp",
        "struct Point { double x; double y; double distance() const; };",
    )
    .unwrap();
    let output = PlantUmlRenderer::new().render_unit(&unit);

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
fn test_single_class_has_one_block_and_no_relationships() {
    let unit = extract_source(
        "widget.cpp",
        "class Widget { int width; public: void resize(int w, int h); };",
    )
    .unwrap();
    let output = PlantUmlRenderer::new().render_unit(&unit);

    assert_eq!(output.matches(" {\n").count(), 1);
    assert!(relationship_lines(&output).is_empty());
    assert!(output.contains("    - int width\n"));
    assert!(output.contains("    + void resize(int w, int h)\n"));
}

#[test]
fn test_simple_inheritance() {
    let unit = extract_source("ab.cpp", "class A {}; class B : public A {};").unwrap();
    let output = PlantUmlRenderer::new().render_unit(&unit);

    assert!(output.contains("class A {\n}\n"));
    assert!(output.contains("class B {\n}\n"));
    assert_eq!(relationship_lines(&output), vec!["A <|-- B"]);
}

#[test]
fn test_preprocessor_alternatives_merge() {
    let unit = extract_source(
        "config.cpp",
        "#ifdef WIDE\nstruct S { int a; void set(int v); };\n#else\nstruct S { int b; void set(long v); };\n#endif\n",
    )
    .unwrap();
    assert_eq!(unit.class_count(), 1);

    let output = PlantUmlRenderer::new().render_unit(&unit);
    assert_eq!(output.matches("struct S {").count(), 1);
    assert!(output.contains(
        "struct S {\n    + int a\n    + int b\n    + void set(int v)\n    + void set(long v)\n}\n"
    ));
}

#[test]
fn test_anonymous_union_members_are_rendered() {
    let unit = extract_source(
        "w.cpp",
        "struct W { union { int i; float f; }; int z; };",
    )
    .unwrap();
    let output = PlantUmlRenderer::new().render_unit(&unit);
    assert!(output.contains("struct W {\n    + int i\n    + float f\n    + int z\n}\n"));
    assert_eq!(unit.class_count(), 1);
}

#[test]
fn test_declaration_order_is_preserved() {
    let unit = extract_source(
        "order.cpp",
        "class Order { int zeta; int alpha; int mid; public: void second(); void first(); };",
    )
    .unwrap();
    let class = unit.find_class("c:@S@Order").unwrap();

    let members: Vec<&str> = class.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(members, vec!["zeta", "alpha", "mid"]);
    let operations: Vec<&str> = class.operations.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(operations, vec!["second", "first"]);

    let output = PlantUmlRenderer::new().render_unit(&unit);
    let zeta = output.find("zeta").unwrap();
    let alpha = output.find("alpha").unwrap();
    let second = output.find("second()").unwrap();
    let first = output.find("first()").unwrap();
    assert!(zeta < alpha);
    assert!(second < first);
}

// ============================================================================
// Multiple inheritance
// ============================================================================

#[test]
fn test_diamond_relationships_in_declaration_order() {
    let pipeline = Pipeline::treesitter();
    let (project, failures) = pipeline
        .run_project(&fixtures(&["drawable.cpp"]), &[])
        .unwrap();
    assert!(failures.is_empty());

    let from_drawable: Vec<&str> = project
        .relationships
        .iter()
        .filter(|r| r.kind == RelationshipKind::Inheritance && r.source == "c:@S@Drawable")
        .map(|r| r.target.as_str())
        .collect();
    assert_eq!(
        from_drawable,
        vec!["c:@S@BaseA", "c:@S@BaseB", "c:@S@IPrintable"]
    );
}

#[test]
fn test_diamond_renders_exactly() {
    let output = Pipeline::treesitter()
        .run(&fixtures(&["drawable.cpp"]), &[])
        .unwrap();

    let expected = "@startuml\n\
title UML Diagram\n\
skinparam classAttributeIconSize 0\n\
\n\
class BaseA {\n\
}\n\
\n\
class BaseB {\n\
}\n\
\n\
class Drawable {\n\
\x20   + void print() const\n\
\x20   + void draw()\n\
}\n\
\n\
class IPrintable {\n\
\x20   + void print() const = 0\n\
}\n\
\n\
BaseA <|-- Drawable\n\
BaseB <|-- Drawable\n\
IPrintable <|-- Drawable\n\
\n\
@enduml\n";
    assert_eq!(output, expected);
}

// ============================================================================
// Cross-unit resolution
// ============================================================================

#[test]
fn test_class_defined_in_two_units_renders_once() {
    let output = Pipeline::treesitter()
        .run(&fixtures(&["circle.cpp", "square.cpp"]), &[])
        .unwrap();

    assert_eq!(output.matches("struct Style {").count(), 1);
    assert!(output.contains("class Circle {"));
    assert!(output.contains("class Square {"));
}

#[test]
fn test_fill_in_completes_first_copy() {
    let paths = fixtures(&["circle.cpp", "square.cpp"]);
    let pipeline = Pipeline::treesitter();
    let (project, _) = pipeline.run_project(&paths, &[]).unwrap();
    let (at, style) = project.resolve("c:@S@Style").unwrap();
    assert_eq!(at.unit, 0);
    let members: Vec<&str> = style.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(members, vec!["color", "width"]);

    let pipeline =
        Pipeline::treesitter().with_resolve_config(ResolveConfig::new().with_fill_in(false));
    let (project, _) = pipeline.run_project(&paths, &[]).unwrap();
    let (_, style) = project.resolve("c:@S@Style").unwrap();
    assert_eq!(style.members.len(), 1);
}

#[test]
fn test_header_classes_resolve_but_are_not_rendered() {
    let output = Pipeline::treesitter()
        .run(&fixtures(&["circle.cpp", "square.cpp"]), &[])
        .unwrap();

    assert!(!output.contains("class Shape {"));
    assert!(!output.contains("struct Vec2 {"));
    assert_eq!(
        relationship_lines(&output),
        vec!["Shape <|-- Circle", "Shape <|-- Square"]
    );
}

#[test]
fn test_same_name_in_two_namespaces() {
    let source = "namespace a { class X {}; }\nnamespace b { class X : public a::X {}; }\n";
    let unit = extract_source("x.cpp", source).unwrap();

    let output = PlantUmlRenderer::new().render_unit(&unit);
    assert!(output.contains("class \"a::X\" {\n}\n"));
    assert!(output.contains("class \"b::X\" {\n}\n"));
    assert_eq!(relationship_lines(&output), vec!["\"a::X\" <|-- \"b::X\""]);

    let grouped = PlantUmlRenderer::with_config(RenderConfig::new().with_namespace_groups(true))
        .render_unit(&unit);
    assert_eq!(relationship_lines(&grouped), vec!["a::X <|-- b::X"]);
}

#[test]
fn test_namespace_grouping() {
    let pipeline = Pipeline::treesitter()
        .with_render_config(RenderConfig::new().with_namespace_groups(true));
    let output = pipeline
        .run(&fixtures(&["circle.cpp", "square.cpp"]), &[])
        .unwrap();

    assert!(output.contains("set separator ::\n"));
    let style = output.find("struct Style {").unwrap();
    let block = output.find("namespace geo {\n").unwrap();
    let circle = output.find("class Circle {").unwrap();
    assert!(style < block);
    assert!(block < circle);
    assert!(output.contains("Shape <|-- geo::Circle\n"));
}

// ============================================================================
// Member relationships and escaping
// ============================================================================

#[test]
fn test_member_associations() {
    let output = Pipeline::treesitter()
        .run(&fixtures(&["garage.cpp"]), &[])
        .unwrap();
    assert_eq!(
        relationship_lines(&output),
        vec![
            "Car --> Engine : engine",
            "Car --> Engine : spare",
            "Car --> Engine : reference",
        ]
    );
}

#[test]
fn test_member_ownership_policy() {
    let pipeline = Pipeline::treesitter().with_resolve_config(
        ResolveConfig::new().with_member_relations(MemberRelationPolicy::Ownership),
    );
    let output = pipeline.run(&fixtures(&["garage.cpp"]), &[]).unwrap();
    assert_eq!(
        relationship_lines(&output),
        vec![
            "Car *-- Engine : engine",
            "Car o-- Engine : spare",
            "Car o-- Engine : reference",
        ]
    );

    let pipeline = Pipeline::treesitter().with_resolve_config(
        ResolveConfig::new().with_member_relations(MemberRelationPolicy::None),
    );
    let output = pipeline.run(&fixtures(&["garage.cpp"]), &[]).unwrap();
    assert!(relationship_lines(&output).is_empty());
}

#[test]
fn test_template_arguments_are_escaped() {
    let output = Pipeline::treesitter()
        .run(&fixtures(&["garage.cpp"]), &[])
        .unwrap();

    assert!(output.contains("    - std::vector&lt;int&gt; mileage\n"));
    assert!(output.contains("    - Engine* spare\n"));
    assert!(output.contains("    - const Engine& reference\n"));
    for line in output.lines().filter(|line| line.starts_with("    ")) {
        assert!(!line.contains('<') && !line.contains('>'), "unescaped: {}", line);
    }
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_identical_input_gives_identical_output() {
    let paths = fixtures(&["circle.cpp", "square.cpp", "drawable.cpp", "garage.cpp"]);
    let pipeline = Pipeline::treesitter();
    let first = pipeline.run(&paths, &[]).unwrap();
    let second = pipeline.run(&paths, &[]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_failing_unit_is_skipped() {
    let mut paths = fixtures(&["drawable.cpp"]);
    paths.push(fixture("does_not_exist.cpp"));

    let pipeline = Pipeline::treesitter();
    let report = pipeline.extract_all(&paths, &[]);
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].1,
        UmlError::ProviderFailure { .. }
    ));

    let output = pipeline.run(&paths, &[]).unwrap();
    assert!(output.contains("class Drawable {"));
}
