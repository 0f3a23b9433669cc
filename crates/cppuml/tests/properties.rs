//! Property tests for escaping, ordering and determinism

use proptest::prelude::*;

use cppuml::extract_source;
use cppuml::render::{escape, PlantUmlRenderer};

fn member_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z][a-z0-9]{0,6}".prop_map(|s| format!("m_{}", s)), 1..12)
        .prop_map(|names| names.into_iter().collect())
}

fn class_source(name: &str, members: &[String]) -> String {
    let fields: String = members.iter().map(|m| format!("int {}; ", m)).collect();
    format!("class {} {{ {}}};", name, fields)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_escape_removes_angle_brackets(text in "[^&]*") {
        let escaped = escape(&text);
        prop_assert!(!escaped.contains('<'));
        prop_assert!(!escaped.contains('>'));
        prop_assert_eq!(escaped.replace("&lt;", "<").replace("&gt;", ">"), text);
    }

    #[test]
    fn test_escape_is_identity_without_brackets(text in "[^<>]*") {
        prop_assert_eq!(escape(&text), text);
    }

    #[test]
    fn test_members_keep_declaration_order(members in member_names()) {
        let unit = extract_source("gen.cpp", &class_source("Generated", &members)).unwrap();
        let class = unit.find_class("c:@S@Generated").unwrap();
        let names: Vec<String> = class.members.iter().map(|m| m.name.clone()).collect();
        prop_assert_eq!(names, members);
    }

    #[test]
    fn test_render_is_deterministic(members in member_names()) {
        let source = format!(
            "{} class Derived : public Generated {{ Generated* parent; }};",
            class_source("Generated", &members)
        );
        let first = PlantUmlRenderer::new()
            .render_unit(&extract_source("gen.cpp", &source).unwrap());
        let second = PlantUmlRenderer::new()
            .render_unit(&extract_source("gen.cpp", &source).unwrap());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_single_class_has_no_relationships(members in member_names()) {
        let unit = extract_source("gen.cpp", &class_source("Lonely", &members)).unwrap();
        let output = PlantUmlRenderer::new().render_unit(&unit);
        prop_assert_eq!(output.matches("class Lonely {").count(), 1);
        prop_assert!(!output.contains("<|--"));
        prop_assert!(!output.contains("-->"));
    }
}
