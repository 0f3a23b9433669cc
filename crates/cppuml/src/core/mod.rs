//! Core abstractions for model extraction
//!
//! The Unified Model, the provider-neutral syntax tree, and the traits that
//! connect providers and renderers to the pipeline.

mod config;
mod error;
pub mod logging;
mod model;
mod provider;
mod renderer;
mod syntax;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use model::*;
pub use provider::*;
pub use renderer::*;
pub use syntax::*;
