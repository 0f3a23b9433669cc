//! Cross-reference resolution
//!
//! Merges per-unit identity maps into one [`Project`] and derives the explicit
//! relationship list. Runs once, after every unit has been extracted.
//!
//! Duplicate identities keep the first copy seen, in unit order. When fill-in
//! is enabled, later copies contribute what the first one lacks; nothing that
//! is already present is ever replaced.

use tracing::{debug, info, span, Level};

use crate::core::{
    Class, ClassRef, MemberRelationPolicy, Project, Relationship, RelationshipKind, ResolveConfig,
    TranslationUnit,
};

/// Merge `units` into a project and derive its relationships
pub fn resolve(units: Vec<TranslationUnit>, config: &ResolveConfig) -> Project {
    let resolve_span = span!(Level::INFO, "resolve_project", units = units.len());
    let _enter = resolve_span.enter();

    let mut project = Project {
        units,
        ..Project::default()
    };
    merge_identities(&mut project, config);
    project.relationships = derive_relationships(&project, config);

    info!(
        classes = project.classes_by_usr.len(),
        relationships = project.relationships.len(),
        "Project resolved"
    );
    project
}

fn merge_identities(project: &mut Project, config: &ResolveConfig) {
    let mut duplicates = 0usize;
    for unit_index in 0..project.units.len() {
        let entries: Vec<(String, ClassRef)> = project.units[unit_index]
            .classes_by_usr()
            .iter()
            .map(|(usr, id)| {
                (
                    usr.clone(),
                    ClassRef {
                        unit: unit_index,
                        class: *id,
                    },
                )
            })
            .collect();

        for (usr, at) in entries {
            match project.classes_by_usr.get(&usr).copied() {
                None => {
                    project.classes_by_usr.insert(usr, at);
                }
                Some(canonical) => {
                    duplicates += 1;
                    if config.fill_in_duplicates {
                        let donor = project.class(at).clone();
                        project.units[canonical.unit]
                            .class_mut(canonical.class)
                            .fill_in(&donor);
                    }
                    debug!(usr = usr.as_str(), unit = unit_index, "Duplicate identity merged");
                }
            }
        }
    }
    if duplicates > 0 {
        debug!(duplicates, "Identities seen in more than one unit");
    }
}

fn derive_relationships(project: &Project, config: &ResolveConfig) -> Vec<Relationship> {
    let mut relationships = Vec::new();
    for (_, class) in project.classes() {
        let source = class.identity();
        for base in &class.bases {
            if !project.classes_by_usr.contains_key(base) {
                debug!(base = base.as_str(), "Base not found in project, keeping placeholder");
            }
            relationships.push(Relationship::inheritance(source, base.as_str()));
        }

        if config.member_relations == MemberRelationPolicy::None {
            continue;
        }
        for member in &class.members {
            let Some(target) = member.ty.declaration.as_deref() else {
                continue;
            };
            if !project.classes_by_usr.contains_key(target) {
                continue;
            }
            let kind = match config.member_relations {
                MemberRelationPolicy::Ownership if member.ty.is_indirect() => {
                    RelationshipKind::Aggregation
                }
                MemberRelationPolicy::Ownership => RelationshipKind::Composition,
                _ => RelationshipKind::Association,
            };
            relationships
                .push(Relationship::new(kind, source, target).with_label(member.name.as_str()));
        }
    }
    relationships
}
