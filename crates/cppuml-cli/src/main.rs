//! cppuml CLI - Turn C++ class declarations into PlantUML class diagrams

mod cli;

use clap::Parser;

fn main() {
    let cli_args = cli::Cli::parse();

    // Logging is initialised in run() once the flags are known
    let mut app = cli::CppUmlApp::new();

    if let Err(e) = app.run(cli_args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
