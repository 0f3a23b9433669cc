//! Command-line interface for the cppuml utility
//!
//! Provides a CLI to turn C++ sources into PlantUML class diagrams and to
//! inspect the extracted model.

use anyhow::{anyhow, Context, Result};
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing::debug;

use cppuml::core::logging::init_logging;
use cppuml::frontend::TreeSitterProvider;
use cppuml::pipeline::{ExtractionReport, Pipeline};
use cppuml::{
    MemberRelationPolicy, Project, RenderConfig, ResolveConfig, SyntaxProvider, UmlError,
    DEFAULT_TITLE,
};

/// cppuml - Turn C++ class declarations into PlantUML class diagrams
#[derive(Parser)]
#[command(name = "cppuml")]
#[command(about = "Extract a class model from C++ sources and render it as PlantUML")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Set log level (trace|debug|info|warn|error|off)
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Set log format (compact|pretty|json)
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Log level options
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

/// Log format options
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

/// Source files plus pass-through compiler flags
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SourceArgs {
    /// C++ source files, one translation unit each
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Compiler flags for the front-end, given after `--` (e.g. -- -Iinclude)
    #[arg(last = true, allow_hyphen_values = true)]
    pub flags: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a PlantUML class diagram
    Generate {
        #[command(flatten)]
        sources: SourceArgs,

        /// Output file for the diagram (use - for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Diagram title
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,

        /// Keep PlantUML's attribute visibility icons
        #[arg(long)]
        show_attribute_icons: bool,

        /// Wrap classes in namespace blocks
        #[arg(long)]
        group_namespaces: bool,

        /// Relationships derived from class-typed members
        #[arg(long, default_value = "association", value_parser = member_relation_parser())]
        member_relations: MemberRelationPolicy,

        /// Keep only the first copy of a class seen in several units
        #[arg(long)]
        no_fill_in: bool,
    },

    /// List extracted classes
    List {
        #[command(flatten)]
        sources: SourceArgs,

        /// Show in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Dump the merged model as JSON
    Dump {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Report syntax diagnostics and failing units
    Check {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

/// Accepts the policy names the library understands
fn member_relation_parser() -> impl TypedValueParser<Value = MemberRelationPolicy> {
    PossibleValuesParser::new(MemberRelationPolicy::variants().iter().copied())
        .try_map(|name| name.parse::<MemberRelationPolicy>())
}

/// One line of `cppuml list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassEntry {
    pub qualified_name: String,
    pub kind: String,
    pub usr: String,
    pub file: String,
}

/// Main CLI application
pub struct CppUmlApp {
    verbose: bool,
}

impl CppUmlApp {
    /// Create a new application instance with default settings
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Run the application with the given CLI arguments
    pub fn run(&mut self, cli: Cli) -> Result<()> {
        // Explicit flags win; init_logging falls back to the environment
        if let Err(e) = init_logging(
            cli.log_level.map(|level| level.as_str()),
            cli.log_format.map(|format| format.as_str()),
        ) {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        self.verbose = cli.verbose;
        if self.verbose {
            eprintln!("cppuml v{}", env!("CARGO_PKG_VERSION"));
        }

        match cli.command {
            Commands::Generate {
                sources,
                output,
                title,
                show_attribute_icons,
                group_namespaces,
                member_relations,
                no_fill_in,
            } => {
                let resolve_config = ResolveConfig::new()
                    .with_member_relations(member_relations)
                    .with_fill_in(!no_fill_in);
                let render_config = RenderConfig::new()
                    .with_title(title)
                    .with_attribute_icons(show_attribute_icons)
                    .with_namespace_groups(group_namespaces);
                self.generate_command(sources, output, resolve_config, render_config)
            }
            Commands::List { sources, json } => self.list_command(sources, json),
            Commands::Dump { sources } => self.dump_command(sources),
            Commands::Check { sources } => self.check_command(sources),
        }
    }

    /// Handle the generate command
    fn generate_command(
        &self,
        sources: SourceArgs,
        output: Option<PathBuf>,
        resolve_config: ResolveConfig,
        render_config: RenderConfig,
    ) -> Result<()> {
        render_config.validate()?;
        debug!(units = sources.files.len(), flags = ?sources.flags, "Generating diagram");
        let pipeline = Pipeline::treesitter()
            .with_resolve_config(resolve_config)
            .with_render_config(render_config);

        let project = self.project(&pipeline, &sources)?;
        self.write_output(&pipeline, &project, output)?;
        if self.verbose {
            eprintln!(
                "Rendered {} classes and {} relationships",
                project.class_count(),
                project.relationships.len()
            );
        }
        Ok(())
    }

    /// Handle the list command
    fn list_command(&self, sources: SourceArgs, json: bool) -> Result<()> {
        let pipeline = Pipeline::treesitter();
        let project = self.project(&pipeline, &sources)?;
        let entries = class_entries(&project);
        if json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            print!("{}", format_entries(&entries));
        }
        Ok(())
    }

    /// Handle the dump command
    fn dump_command(&self, sources: SourceArgs) -> Result<()> {
        let pipeline = Pipeline::treesitter();
        let project = self.project(&pipeline, &sources)?;
        println!("{}", serde_json::to_string_pretty(&project)?);
        Ok(())
    }

    /// Handle the check command
    fn check_command(&self, sources: SourceArgs) -> Result<()> {
        let pipeline = Pipeline::treesitter();
        let report = pipeline.extract_all(&sources.files, &sources.flags);
        print!("{}", format_check(&report));
        if report.is_complete() {
            Ok(())
        } else {
            Err(anyhow!(
                "{} of {} units failed",
                report.failures.len(),
                sources.files.len()
            ))
        }
    }

    /// Extract and resolve, reporting per-unit failures on stderr
    fn project(
        &self,
        pipeline: &Pipeline<TreeSitterProvider>,
        sources: &SourceArgs,
    ) -> Result<Project> {
        match pipeline.run_project(&sources.files, &sources.flags) {
            Ok((project, failures)) => {
                for (path, error) in &failures {
                    eprintln!("Skipping {}: {}", path.display(), error);
                }
                if self.verbose {
                    eprintln!(
                        "Extracted {} of {} units with the {} front-end",
                        project.units.len(),
                        sources.files.len(),
                        pipeline.provider().name()
                    );
                }
                Ok(project)
            }
            Err(UmlError::NoUnits) => Err(anyhow!(
                "none of the {} units could be extracted",
                sources.files.len()
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Render the diagram to a file, or to stdout for `-` or no path
    pub fn write_output(
        &self,
        pipeline: &Pipeline<TreeSitterProvider>,
        project: &Project,
        output: Option<PathBuf>,
    ) -> Result<()> {
        match output {
            Some(path) if path.to_string_lossy() != "-" => {
                pipeline
                    .write_file(project, &path)
                    .with_context(|| format!("Failed to write output file '{}'", path.display()))?;
            }
            _ => pipeline.write(project, &mut io::stdout().lock())?,
        }
        Ok(())
    }
}

impl Default for CppUmlApp {
    fn default() -> Self {
        Self::new()
    }
}

/// One entry per class in render order
pub fn class_entries(project: &Project) -> Vec<ClassEntry> {
    project
        .classes()
        .into_iter()
        .map(|(at, class)| ClassEntry {
            qualified_name: project.qualified_name(at),
            kind: class.kind.to_string(),
            usr: class.usr.clone(),
            file: project.units[at.unit].filename.clone(),
        })
        .collect()
}

pub fn format_entries(entries: &[ClassEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{}\t{}\t{}\n", entry.qualified_name, entry.kind, entry.usr))
        .collect()
}

/// Diagnostics per unit, then failures, then a summary line
pub fn format_check(report: &ExtractionReport) -> String {
    let mut lines = Vec::new();
    let mut diagnostics = 0;
    for unit in &report.units {
        for diagnostic in &unit.diagnostics {
            lines.push(diagnostic.to_string());
            diagnostics += 1;
        }
    }
    for (path, error) in &report.failures {
        lines.push(format!("{}: failed: {}", path.display(), error));
    }
    lines.push(format!(
        "{} units checked, {} diagnostics, {} failed",
        report.units.len() + report.failures.len(),
        diagnostics,
        report.failures.len()
    ));
    let mut output = lines.join("\n");
    output.push('\n');
    output
}
