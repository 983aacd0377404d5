//! Entry point wiring the CLI surface, path discovery and the render run.
//!
//! - `main` parses CLI input, initialises tracing, and dispatches.
//! - `run_where` backs the `where` subcommand.

mod cli;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;
use paths::AppPaths;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Where) => run_where(),
        None => run::run(cli.run),
    }
}

fn run_where() -> Result<()> {
    let paths = AppPaths::discover()?;
    println!("Configuration:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!("  config file: {}", paths.config_file().display());
    println!("  share dir:   {}", paths.share_dir().display());
    println!("Font search roots:");
    for root in paths.font_roots() {
        println!("  {}", root.display());
    }
    Ok(())
}
