//! Alsvid command-line interface.
//!
//! Two entry points behind one binary: `alsvid reduce` runs the QBF-driven
//! reduction loop over a circuit, `alsvid exact` computes the exact minimum
//! gate count of a small specification bottom-up.

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{exact, reduce};

/// Alsvid - QBF-driven gate-count minimisation for Boolean circuits
#[derive(Parser)]
#[command(name = "alsvid")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reduce a circuit through QBF exact synthesis of subcircuits
    Reduce(reduce::ReduceArgs),

    /// Compute the exact minimum gate count of a specification
    Exact(exact::ExactArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Reduce(args) => reduce::execute(args),
        Commands::Exact(args) => exact::execute(args),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
