//! Core renderer trait for diagram output
//!
//! A renderer turns a finished [`Project`] into text. PlantUML is the only
//! notation shipped; others would implement the same trait.

use anyhow::Result;

use super::Project;

/// Core trait for project renderers
///
/// # Example
/// ```
/// use cppuml::core::{Project, Renderer};
/// use cppuml::render::PlantUmlRenderer;
///
/// let renderer = PlantUmlRenderer::new();
/// let output = renderer.render(&Project::default()).unwrap();
/// assert!(output.starts_with("@startuml"));
/// ```
pub trait Renderer: Send + Sync {
    /// Render the project into the output format
    fn render(&self, project: &Project) -> Result<String>;

    /// Get the name of this renderer
    fn name(&self) -> &'static str;

    /// Get the supported output format
    fn format(&self) -> &'static str;
}
