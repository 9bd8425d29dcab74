//! cloudgen CLI: compile an application schema into an infrastructure graph.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "cloudgen",
    version,
    about = "Compile an application schema into a cross-referenced infrastructure resource graph"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: cloudgen::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    cloudgen::logging::init(cli.verbose);
    if let Err(e) = cloudgen::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
