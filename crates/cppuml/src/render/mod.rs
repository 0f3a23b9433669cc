//! Diagram renderers

mod plantuml;

pub use plantuml::{escape, PlantUmlRenderer};
