//! Type descriptor builder
//!
//! Converts a raw [`TypeInfo`] handle into a [`TypeDescriptor`]. Never fails:
//! missing information degrades to the best name available.

use tracing::debug;

use crate::core::{SyntaxTree, TypeDescriptor, TypeId, TypeInfo, TypeKind};

/// Bound on pointer layers and template nesting
const MAX_TYPE_DEPTH: u32 = 64;

/// Build the descriptor for `ty`
///
/// Reference-ness comes from the canonical kind, so an alias of a reference
/// type is still a reference.
pub fn build_type(tree: &SyntaxTree, ty: TypeId) -> TypeDescriptor {
    build_at_depth(tree, ty, 0)
}

fn build_at_depth(tree: &SyntaxTree, ty: TypeId, depth: u32) -> TypeDescriptor {
    let top = tree.type_info(ty);
    let is_reference = top.canonical_kind.is_reference();

    let mut current = top;
    if current.kind.is_reference() {
        if let Some(pointee) = current.pointee {
            current = tree.type_info(pointee);
        }
    }

    let mut pointer_depth = 0;
    while current.kind == TypeKind::Pointer && pointer_depth < MAX_TYPE_DEPTH {
        match current.pointee {
            Some(pointee) => {
                pointer_depth += 1;
                current = tree.type_info(pointee);
            }
            None => break,
        }
    }

    let (spelled_const, name) = strip_const(&current.spelling);
    let is_const = top.is_const || current.is_const || spelled_const;

    let template_args = build_template_args(tree, current, depth);
    let name = if template_args.is_empty() {
        name.to_string()
    } else {
        strip_template_suffix(name).to_string()
    };

    TypeDescriptor {
        name,
        template_args,
        is_const,
        is_reference,
        pointer_depth,
        declaration: current.declaration.clone(),
    }
}

fn build_template_args(tree: &SyntaxTree, info: &TypeInfo, depth: u32) -> Vec<TypeDescriptor> {
    let Some(args) = info.template_args.as_ref() else {
        debug!(
            spelling = info.spelling.as_str(),
            "Template arguments unavailable, recording none"
        );
        return Vec::new();
    };
    if depth >= MAX_TYPE_DEPTH {
        return Vec::new();
    }
    args.iter()
        .filter(|arg| tree.type_info(**arg).kind != TypeKind::Invalid)
        .map(|arg| build_at_depth(tree, *arg, depth + 1))
        .collect()
}

/// Split a leading `const ` or trailing ` const` off a spelling
fn strip_const(spelling: &str) -> (bool, &str) {
    let trimmed = spelling.trim();
    if let Some(rest) = trimmed.strip_prefix("const ") {
        return (true, rest.trim_start());
    }
    if let Some(rest) = trimmed.strip_suffix(" const") {
        return (true, rest.trim_end());
    }
    (false, trimmed)
}

/// `std::map<K, V>` becomes `std::map`
fn strip_template_suffix(name: &str) -> &str {
    match name.find('<') {
        Some(pos) if name.ends_with('>') => name[..pos].trim_end(),
        _ => name,
    }
}
