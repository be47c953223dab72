#![forbid(unsafe_code)]
#![allow(unreachable_pub)]

use clap::{Parser, Subcommand};

mod build_tree;
mod prove;
mod verify;

#[derive(Parser, Debug)]
#[command(name = "allowlist")]
#[command(about = "Merkle allowlist tree and claim-proof tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    BuildTree(build_tree::Cli),
    Prove(prove::Cli),
    Verify(verify::Cli),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::BuildTree(args) => build_tree::run(args)?,
        Commands::Prove(args) => prove::run(args)?,
        Commands::Verify(args) => verify::run(args)?,
    }

    Ok(())
}
