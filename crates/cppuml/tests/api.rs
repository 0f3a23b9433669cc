//! Integration tests for the public API

use std::fs;
use std::path::{Path, PathBuf};

use cppuml::prelude::*;
use cppuml::{
    extract_file, extract_source, generate, NodeKind, ParsedUnit, SyntaxNode, SyntaxTree,
};

/// Provider that serves a fixed tree regardless of the input
struct FixedProvider;

impl SyntaxProvider for FixedProvider {
    fn parse(&self, path: &Path, _flags: &[String]) -> Result<ParsedUnit, UmlError> {
        let mut builder = SyntaxTree::builder(path.display().to_string());
        let root = builder.root();
        let int = builder.builtin("int");
        let account = builder.add_node(
            root,
            SyntaxNode::new(NodeKind::ClassDecl, "Account")
                .with_usr("c:@S@Account")
                .definition(),
        );
        builder.add_node(
            account,
            SyntaxNode::new(NodeKind::FieldDecl, "balance")
                .with_usr("c:@S@Account@FI@balance")
                .with_access(Access::Private)
                .with_type(int),
        );
        Ok(ParsedUnit::new(builder.build()))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[test]
fn test_extract_source_counts_classes() {
    let unit = extract_source("pair.cpp", "class A {}; class B : public A {};").unwrap();
    assert_eq!(unit.class_count(), 2);
    let b = unit.find_class("c:@S@B").unwrap();
    assert_eq!(b.bases, vec!["c:@S@A"]);
    assert_eq!(b.kind, ClassKind::Class);
}

#[test]
fn test_extract_file_reads_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("widget.cpp");
    fs::write(&path, "struct Widget { int width; };\n").unwrap();

    let unit = extract_file(&path, &[]).unwrap();
    assert_eq!(unit.filename, path.display().to_string());
    let widget = unit.find_class("c:@S@Widget").unwrap();
    assert_eq!(widget.member("width").unwrap().access, Access::Public);
}

#[test]
fn test_extract_file_honours_include_flags() {
    let dir = tempfile::tempdir().unwrap();
    let include = dir.path().join("include");
    fs::create_dir(&include).unwrap();
    fs::write(include.join("base.h"), "#pragma once\nclass Base {};\n").unwrap();
    let path = dir.path().join("derived.cpp");
    fs::write(&path, "#include \"base.h\"\nclass Derived : Base {};\n").unwrap();

    let without = extract_file(&path, &[]).unwrap();
    assert_eq!(without.find_class("c:@S@Derived").unwrap().bases, vec!["Base"]);

    let flags = vec![format!("-I{}", include.display())];
    let with = extract_file(&path, &flags).unwrap();
    assert_eq!(with.find_class("c:@S@Derived").unwrap().bases, vec!["c:@S@Base"]);
    assert!(with.find_class("c:@S@Base").is_none());
}

#[test]
fn test_generate_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.cpp");
    fs::write(&path, "class A {};\n").unwrap();

    let diagram = generate(&[path], &[], cppuml::DEFAULT_TITLE).unwrap();
    assert!(diagram.starts_with("@startuml\ntitle UML Diagram\n"));
}

#[test]
fn test_custom_provider_through_pipeline() {
    let pipeline = Pipeline::new(FixedProvider);
    assert_eq!(pipeline.provider().name(), "fixed");

    let output = pipeline.run(&[PathBuf::from("anything.cpp")], &[]).unwrap();
    assert!(output.contains("class Account {\n    - int balance\n}\n"));
}

#[test]
fn test_renderer_trait_object() {
    let renderer: Box<dyn Renderer> = Box::new(PlantUmlRenderer::new());
    assert_eq!(renderer.name(), "plantuml");
    assert_eq!(renderer.format(), "plantuml");

    let unit = extract_source("a.cpp", "class A {};").unwrap();
    let project = cppuml::resolve::resolve(vec![unit], &ResolveConfig::default());
    let output = renderer.render(&project).unwrap();
    assert!(output.contains("class A {"));
}

#[test]
fn test_renderer_trait_validates_config() {
    let renderer = PlantUmlRenderer::with_config(RenderConfig::new().with_title(""));
    assert!(Renderer::render(&renderer, &Project::default()).is_err());
}

#[test]
fn test_member_relation_policy_parsing() {
    assert_eq!(
        "ownership".parse::<MemberRelationPolicy>().unwrap(),
        MemberRelationPolicy::Ownership
    );
    assert!("sometimes".parse::<MemberRelationPolicy>().is_err());
    assert_eq!(MemberRelationPolicy::default(), MemberRelationPolicy::Association);
}
