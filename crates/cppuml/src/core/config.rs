//! Configuration for resolving and rendering a project
//!
//! There is no configuration file. The CLI maps its flags onto these structs
//! and library callers build them directly.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::UmlError;

/// Default diagram title
pub const DEFAULT_TITLE: &str = "UML Diagram";

/// How typed members turn into relationships
///
/// Only class-typed members are considered; builtins and unknown types never
/// produce a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize)]
pub enum MemberRelationPolicy {
    /// Derive no relationships from members
    None,
    /// Every member typed by a known class yields an Association
    #[default]
    Association,
    /// By-value members yield Composition, pointers and references Aggregation
    Ownership,
}

impl MemberRelationPolicy {
    /// Get all valid policy names
    pub fn variants() -> &'static [&'static str] {
        &["none", "association", "ownership"]
    }
}

impl FromStr for MemberRelationPolicy {
    type Err = UmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(MemberRelationPolicy::None),
            "association" => Ok(MemberRelationPolicy::Association),
            "ownership" => Ok(MemberRelationPolicy::Ownership),
            other => Err(UmlError::config_error(format!(
                "unknown member relation policy '{}', expected one of: {}",
                other,
                Self::variants().join(", ")
            ))),
        }
    }
}

impl fmt::Display for MemberRelationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRelationPolicy::None => write!(f, "none"),
            MemberRelationPolicy::Association => write!(f, "association"),
            MemberRelationPolicy::Ownership => write!(f, "ownership"),
        }
    }
}

/// Options for the cross-reference resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveConfig {
    /// Relationship policy for typed members
    pub member_relations: MemberRelationPolicy,
    /// Fill in members a later copy of a class has and the first one lacks
    pub fill_in_duplicates: bool,
}

impl ResolveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member_relations(mut self, policy: MemberRelationPolicy) -> Self {
        self.member_relations = policy;
        self
    }

    pub fn with_fill_in(mut self, enabled: bool) -> Self {
        self.fill_in_duplicates = enabled;
        self
    }
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            member_relations: MemberRelationPolicy::default(),
            fill_in_duplicates: true,
        }
    }
}

/// Options for the PlantUML renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Diagram title, escaped on output
    pub title: String,
    /// Emit `skinparam classAttributeIconSize 0`
    pub hide_attribute_icons: bool,
    /// Wrap classes in `namespace` blocks
    pub group_namespaces: bool,
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_attribute_icons(mut self, show: bool) -> Self {
        self.hide_attribute_icons = !show;
        self
    }

    pub fn with_namespace_groups(mut self, group: bool) -> Self {
        self.group_namespaces = group;
        self
    }

    /// Check the configuration before rendering
    ///
    /// The title occupies a single output line, so it must be non-empty and
    /// contain no line breaks.
    pub fn validate(&self) -> Result<(), UmlError> {
        if self.title.trim().is_empty() {
            return Err(UmlError::config_error("title must not be empty"));
        }
        if self.title.contains(['\n', '\r']) {
            return Err(UmlError::config_error("title must fit on a single line"));
        }
        Ok(())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            hide_attribute_icons: true,
            group_namespaces: false,
        }
    }
}
